//! Unique names for test resources

use chrono::Utc;

/// Generate a unique service name for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`, unique even when tests start
/// simultaneously within one process.
///
/// # Example
///
/// ```
/// use ecs_deploy_test_utils::test_service_name;
///
/// let name = test_service_name();
/// assert!(name.starts_with("test-"));
/// ```
pub fn test_service_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{ts}-{counter}")
}
