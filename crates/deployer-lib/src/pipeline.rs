//! End-to-end deployment pipeline
//!
//! Composes the stages strictly in order: fetch remote descriptor, merge,
//! validate, reconcile, then (only when requested and only after the service
//! update landed) autoscaling. Every stage fails fast; no stage retries
//! another's mutation.
//!
//! Concurrent invocations against the same service are not guarded here:
//! the remote's service update is last-write-wins and this tool adds no
//! distributed locking on top.

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::autoscale::configure_autoscaling;
use crate::error::DeployError;
use crate::merge::merge_descriptor;
use crate::models::{DeploymentRequest, RegisteredRevision};
use crate::orchestrator::Orchestrator;
use crate::reconcile::{Reconciler, WaitConfig, WaitOutcome};
use crate::validate::validate_descriptor;

/// How a deployment invocation ended, assuming the revision and service
/// update were submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// Service converged (or the wait was intentionally skipped)
    Stable,
    /// The stability wait ran out; the new revision and service update stand
    TimedOut,
    /// Cancelled during the stability wait; prior mutations stand
    Cancelled,
}

/// Outcome plus the revision that was registered
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentReport {
    pub outcome: DeploymentOutcome,
    pub revision: RegisteredRevision,
}

/// Run one full deployment.
///
/// Ordering invariant: a supplied `desired_count` is applied on the service
/// update inside the Reconciler, which completes before any autoscaling
/// call, so target tracking never immediately fights a stale count.
/// Autoscaling is skipped when the wait timed out or was cancelled; the
/// non-converged rollout is reported instead.
pub async fn run_deployment(
    orchestrator: &dyn Orchestrator,
    request: &DeploymentRequest,
    wait: &WaitConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<DeploymentReport, DeployError> {
    let remote = orchestrator.fetch_task_definition(&request.family).await?;
    info!(
        family = %request.family,
        base_revision = remote.revision,
        "Fetched latest task definition"
    );

    let candidate = merge_descriptor(request, remote)?;
    validate_descriptor(&candidate)?;

    let result = Reconciler::new(orchestrator, wait.clone())
        .run(request, &candidate, shutdown)
        .await?;

    let outcome = match result.wait {
        WaitOutcome::Stable | WaitOutcome::Skipped => {
            if let Some(autoscaling) = &request.autoscaling {
                configure_autoscaling(orchestrator, &request.cluster, &request.service, autoscaling)
                    .await?;
            }
            DeploymentOutcome::Stable
        }
        WaitOutcome::TimedOut { attempts } => {
            warn!(
                service = %request.service,
                attempts,
                "Deployment did not stabilize in time; revision and update remain in place"
            );
            DeploymentOutcome::TimedOut
        }
        WaitOutcome::Cancelled => DeploymentOutcome::Cancelled,
    };

    Ok(DeploymentReport {
        outcome,
        revision: result.revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::{
        AutoscalingConfig, ContainerDefinition, EnvVar, MountPoint, RemoteTaskDefinition,
        ScalingMetric, ServiceDeployment, ServiceStatus,
    };
    use crate::orchestrator::fake::{FakeOrchestrator, RecordedCall};

    fn remote() -> RemoteTaskDefinition {
        RemoteTaskDefinition {
            family: "api".to_string(),
            revision: 7,
            cpu: Some(256),
            memory: Some(512),
            container_definitions: vec![ContainerDefinition {
                name: "api".to_string(),
                image: "registry.example.com/api:1.0.0".to_string(),
                environment: vec![EnvVar {
                    name: "LOG_LEVEL".to_string(),
                    value: "info".to_string(),
                }],
                secrets: vec![],
                mount_points: vec![],
                essential: Some(true),
            }],
            volumes: vec![],
            execution_role_arn: None,
            task_role_arn: None,
            network_mode: Some("awsvpc".to_string()),
            requires_compatibilities: vec!["FARGATE".to_string()],
        }
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            cluster: "production".to_string(),
            service: "api".to_string(),
            family: "api".to_string(),
            container_name: "api".to_string(),
            image: "registry.example.com/api:2.0.0".to_string(),
            cpu: None,
            memory: None,
            desired_count: None,
            environment: None,
            secrets: None,
            mount_points: None,
            volumes: None,
            autoscaling: None,
        }
    }

    fn fast_wait() -> WaitConfig {
        WaitConfig {
            interval: Duration::from_millis(1),
            max_attempts: 5,
        }
    }

    fn unstable() -> ServiceStatus {
        ServiceStatus {
            desired_count: 3,
            running_count: 1,
            deployments: vec![ServiceDeployment {
                status: "PRIMARY".to_string(),
                task_definition: "arn:aws:ecs:us-east-1:123456789012:task-definition/api:8"
                    .to_string(),
                desired_count: 3,
                running_count: 1,
            }],
        }
    }

    #[tokio::test]
    async fn full_scenario_orders_update_before_autoscaling() {
        let orch = FakeOrchestrator::new(remote());
        let (_tx, mut shutdown) = broadcast::channel(1);

        let mut req = request();
        req.cpu = Some(1024);
        req.memory = Some(2048);
        req.desired_count = Some(3);
        req.environment = Some(vec![EnvVar {
            name: "NODE_ENV".to_string(),
            value: "production".to_string(),
        }]);
        req.autoscaling = Some(AutoscalingConfig {
            min_capacity: 1,
            max_capacity: 10,
            target_cpu_utilization: Some(70.0),
            target_memory_utilization: None,
            scale_in_cooldown_secs: 300,
            scale_out_cooldown_secs: 60,
        });

        let report = run_deployment(&orch, &req, &fast_wait(), &mut shutdown)
            .await
            .unwrap();
        assert_eq!(report.outcome, DeploymentOutcome::Stable);
        assert_eq!(report.revision.revision, 8);

        let registered = orch.registered.lock().unwrap();
        let candidate = &registered[0];
        assert_eq!(candidate.cpu, Some(1024));
        assert_eq!(candidate.memory, Some(2048));
        assert_eq!(
            candidate.container_definitions[0].environment,
            vec![EnvVar {
                name: "NODE_ENV".to_string(),
                value: "production".to_string(),
            }]
        );
        drop(registered);

        let calls = orch.recorded_calls();
        let update_at = calls
            .iter()
            .position(|c| matches!(c, RecordedCall::UpdateService { desired_count: Some(3), .. }))
            .expect("service update with desired_count");
        let target_at = calls
            .iter()
            .position(|c| matches!(c, RecordedCall::RegisterScalableTarget { .. }))
            .expect("scalable target registration");
        assert!(update_at < target_at, "desired_count must land before autoscaling");
        assert!(calls.iter().any(|c| matches!(
            c,
            RecordedCall::PutScalingPolicy { metric: ScalingMetric::Cpu, .. }
        )));
    }

    #[tokio::test]
    async fn rerunning_identical_input_registers_identical_content() {
        let orch = FakeOrchestrator::new(remote());
        let (_tx, mut shutdown) = broadcast::channel(1);
        let req = request();

        let first = run_deployment(&orch, &req, &fast_wait(), &mut shutdown)
            .await
            .unwrap();
        let second = run_deployment(&orch, &req, &fast_wait(), &mut shutdown)
            .await
            .unwrap();

        // Two new revisions, byte-identical descriptors.
        assert_eq!(first.revision.revision, 8);
        assert_eq!(second.revision.revision, 9);
        let registered = orch.registered.lock().unwrap();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0], registered[1]);
    }

    #[tokio::test]
    async fn dangling_mount_blocks_every_mutation() {
        let orch = FakeOrchestrator::new(remote());
        let (_tx, mut shutdown) = broadcast::channel(1);
        let mut req = request();
        req.mount_points = Some(vec![MountPoint {
            container_path: "/var/data".to_string(),
            source_volume: "missing".to_string(),
            read_only: false,
        }]);

        let err = run_deployment(&orch, &req, &fast_wait(), &mut shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::DanglingMount { .. }));

        let calls = orch.recorded_calls();
        assert!(!calls.iter().any(|c| matches!(
            c,
            RecordedCall::RegisterTaskDefinition { .. } | RecordedCall::UpdateService { .. }
        )));
    }

    #[tokio::test]
    async fn incompatible_resources_block_every_mutation() {
        let orch = FakeOrchestrator::new(remote());
        let (_tx, mut shutdown) = broadcast::channel(1);
        let mut req = request();
        req.cpu = Some(256);
        req.memory = Some(8192);

        let err = run_deployment(&orch, &req, &fast_wait(), &mut shutdown)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::IncompatibleResources { cpu: 256, memory: 8192 }
        ));
        assert!(!orch.recorded_calls().iter().any(|c| matches!(
            c,
            RecordedCall::RegisterTaskDefinition { .. } | RecordedCall::UpdateService { .. }
        )));
    }

    #[tokio::test]
    async fn timed_out_wait_skips_autoscaling_and_is_distinct() {
        let orch = FakeOrchestrator::new(remote()).with_statuses(vec![unstable(); 10]);
        let (_tx, mut shutdown) = broadcast::channel(1);
        let mut req = request();
        req.autoscaling = Some(AutoscalingConfig {
            min_capacity: 1,
            max_capacity: 10,
            target_cpu_utilization: Some(70.0),
            target_memory_utilization: Some(80.0),
            scale_in_cooldown_secs: 300,
            scale_out_cooldown_secs: 60,
        });

        let report = run_deployment(&orch, &req, &fast_wait(), &mut shutdown)
            .await
            .unwrap();
        assert_eq!(report.outcome, DeploymentOutcome::TimedOut);
        assert!(!orch.recorded_calls().iter().any(|c| matches!(
            c,
            RecordedCall::RegisterScalableTarget { .. } | RecordedCall::PutScalingPolicy { .. }
        )));
    }
}
