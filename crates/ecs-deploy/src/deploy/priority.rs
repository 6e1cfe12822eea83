//! Listener rule priority allocation

use crate::aws::ElbOperations;
use ecs_deploy_common::ListenerId;
use ecs_deploy_common::defaults::{BASE_RULE_PRIORITY, FALLBACK_RULE_PRIORITY};
use tracing::{info, warn};

/// Next free priority given the priorities already on a listener.
///
/// Only all-digit priorities count; the default rule reports "default" and
/// is ignored. With no numbered rules the result is `BASE_RULE_PRIORITY + 1`.
pub fn next_priority_from<'a>(priorities: impl IntoIterator<Item = &'a str>) -> u32 {
    priorities
        .into_iter()
        .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|p| p.parse::<u32>().ok())
        .max()
        .unwrap_or(BASE_RULE_PRIORITY)
        .saturating_add(1)
}

/// Next free priority on `listener`.
///
/// If the rules cannot be listed this returns `FALLBACK_RULE_PRIORITY`
/// instead of failing; rule creation then reports a collision if that
/// priority is taken.
pub async fn next_priority<E: ElbOperations>(elb: &E, listener: &ListenerId) -> u32 {
    match elb.describe_rules(listener).await {
        Ok(rules) => {
            let priority = next_priority_from(
                rules
                    .iter()
                    .filter(|r| !r.is_default)
                    .map(|r| r.priority.as_str()),
            );
            info!(listener = %listener, priority, "Next rule priority determined");
            priority
        }
        Err(e) => {
            warn!(
                listener = %listener,
                error = %e,
                fallback = FALLBACK_RULE_PRIORITY,
                "Could not list listener rules, using fallback priority"
            );
            FALLBACK_RULE_PRIORITY
        }
    }
}
