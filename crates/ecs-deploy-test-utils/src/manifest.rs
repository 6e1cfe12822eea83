//! Deployment manifest fixtures

use chrono::{TimeZone, Utc};
use ecs_deploy_common::{
    DeploymentManifest, ListenerId, RuleId, TargetGroupId, TaskDefinitionId, ZoneId,
};

/// A complete manifest for `service`, with one rule and domain `<service>.example.com`.
///
/// `created_at` is fixed in the past so a manifest written later for the
/// same service never collides with it.
pub fn sample_manifest(service: &str) -> DeploymentManifest {
    let account = "123456789012";
    let region = "us-east-1";
    DeploymentManifest {
        ecs_cluster: "demo-cluster".to_string(),
        service_name: service.to_string(),
        task_definition: TaskDefinitionId::new(format!(
            "arn:aws:ecs:{region}:{account}:task-definition/{service}-api-task:1"
        )),
        target_group: TargetGroupId::new(format!(
            "arn:aws:elasticloadbalancing:{region}:{account}:targetgroup/{service}/73e2d6bc24d8a067"
        )),
        listener: Some(ListenerId::new(format!(
            "arn:aws:elasticloadbalancing:{region}:{account}:listener/app/demo-alb/50dc6c495c0c9188/f2f7dc8efc522ab2"
        ))),
        rules: vec![RuleId::new(format!(
            "arn:aws:elasticloadbalancing:{region}:{account}:listener-rule/app/demo-alb/50dc6c495c0c9188/f2f7dc8efc522ab2/9683b2d02a6cabee"
        ))],
        domain_name: format!("{service}.example.com"),
        dns_api_token: "cf-sample-token".to_string(),
        dns_zone: ZoneId::new("023e105f4ecef8ad9ca31a8372d0c353"),
        load_balancer_dns_name: Some("demo-alb-1234567890.us-east-1.elb.amazonaws.com".to_string()),
        region: Some(region.to_string()),
        created_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single(),
    }
}
