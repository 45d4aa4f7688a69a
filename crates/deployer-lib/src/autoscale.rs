//! Autoscaling configuration
//!
//! Registers the scalable target and puts target-tracking policies under
//! deterministic names, so re-running with the same parameters replaces
//! rather than duplicates. A metric whose target utilization was not
//! supplied is never touched: configuring only CPU tracking leaves a
//! previously configured memory policy exactly as it was. Nothing in this
//! module deletes anything.

use tracing::info;

use crate::error::DeployError;
use crate::models::{AutoscalingConfig, ScalingMetric, ScalingPolicySpec};
use crate::orchestrator::Orchestrator;

/// Deterministic service-scoped resource id
pub fn scalable_resource_id(cluster: &str, service: &str) -> String {
    format!("service/{cluster}/{service}")
}

/// Deterministic per-metric policy name
pub fn policy_name(service: &str, metric: ScalingMetric) -> String {
    format!("{service}-{}-target-tracking", metric.as_str())
}

/// Apply the autoscaling configuration to a service.
pub async fn configure_autoscaling(
    orchestrator: &dyn Orchestrator,
    cluster: &str,
    service: &str,
    config: &AutoscalingConfig,
) -> Result<(), DeployError> {
    let resource_id = scalable_resource_id(cluster, service);

    orchestrator
        .register_scalable_target(&resource_id, config.min_capacity, config.max_capacity)
        .await?;
    info!(
        resource_id = %resource_id,
        min = config.min_capacity,
        max = config.max_capacity,
        "Scalable target registered"
    );

    let metrics = [
        (ScalingMetric::Cpu, config.target_cpu_utilization),
        (ScalingMetric::Memory, config.target_memory_utilization),
    ];
    for (metric, target) in metrics {
        let Some(target_value) = target else {
            continue;
        };
        let policy = ScalingPolicySpec {
            policy_name: policy_name(service, metric),
            resource_id: resource_id.clone(),
            metric,
            target_value,
            scale_in_cooldown_secs: config.scale_in_cooldown_secs,
            scale_out_cooldown_secs: config.scale_out_cooldown_secs,
        };
        orchestrator.put_scaling_policy(&policy).await?;
        info!(
            policy = %policy.policy_name,
            target = target_value,
            "Target-tracking policy in place"
        );
    }

    Ok(())
}
