//! Service reconciliation
//!
//! Drives a candidate descriptor through registration, service update and
//! the bounded stability wait:
//! `Pending -> Registering -> Updating -> WaitingStable -> {Stable, Failed, TimedOut}`.
//!
//! The only retry anywhere in the pipeline lives here, and it retries the
//! status check, never a mutation. A timed-out wait is reported as its own
//! outcome rather than an error: the revision and service update already
//! happened and are never rolled back, including on cancellation.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::models::{CandidateDescriptor, DeploymentRequest, RegisteredRevision};
use crate::orchestrator::Orchestrator;

/// Stability-wait budget, mirroring the orchestrator CLI's own waiter
/// (40 checks at 15 second intervals).
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Interval between status checks
    pub interval: Duration,
    /// Number of status checks before giving up; 0 skips the wait entirely
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_attempts: 40,
        }
    }
}

/// Reconciliation phases, logged as the run progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    Pending,
    Registering,
    Updating,
    WaitingStable,
    Stable,
    Failed,
    TimedOut,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Pending => "pending",
            DeploymentState::Registering => "registering",
            DeploymentState::Updating => "updating",
            DeploymentState::WaitingStable => "waiting_stable",
            DeploymentState::Stable => "stable",
            DeploymentState::Failed => "failed",
            DeploymentState::TimedOut => "timed_out",
        }
    }
}

/// How the stability wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// All deployments converged
    Stable,
    /// The check budget ran out before convergence; prior mutations stand
    TimedOut { attempts: u32 },
    /// Wait was skipped (`max_attempts == 0`)
    Skipped,
    /// An external cancellation aborted the wait; prior mutations stand
    Cancelled,
}

/// Result of a reconciliation run that got past registration and update
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    pub revision: RegisteredRevision,
    pub wait: WaitOutcome,
}

/// Drives one deployment against the orchestrator.
///
/// Re-running with an unchanged candidate registers a new, content-identical
/// revision; the remote does not deduplicate and neither does this.
pub struct Reconciler<'a> {
    orchestrator: &'a dyn Orchestrator,
    wait: WaitConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(orchestrator: &'a dyn Orchestrator, wait: WaitConfig) -> Self {
        Self { orchestrator, wait }
    }

    /// Register the candidate, repoint the service and wait for stability.
    ///
    /// `desired_count` rides on the service update itself, so it is always
    /// applied before any autoscaling configuration that may follow.
    pub async fn run(
        &self,
        request: &DeploymentRequest,
        candidate: &CandidateDescriptor,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<ReconcileResult, DeployError> {
        let mut state = DeploymentState::Pending;

        state = self.transition(state, DeploymentState::Registering, request);
        let revision = match self.orchestrator.register_task_definition(candidate).await {
            Ok(revision) => revision,
            Err(err) => {
                self.transition(state, DeploymentState::Failed, request);
                return Err(err);
            }
        };
        info!(
            family = %candidate.family,
            revision = revision.revision,
            "Registered new task definition revision"
        );

        state = self.transition(state, DeploymentState::Updating, request);
        if let Err(err) = self
            .orchestrator
            .update_service(
                &request.cluster,
                &request.service,
                &revision.arn,
                request.desired_count,
            )
            .await
        {
            self.transition(state, DeploymentState::Failed, request);
            return Err(err);
        }
        info!(
            service = %request.service,
            revision = revision.revision,
            desired_count = ?request.desired_count,
            "Service updated"
        );

        if self.wait.max_attempts == 0 {
            debug!(service = %request.service, "Stability wait disabled, not polling");
            return Ok(ReconcileResult {
                revision,
                wait: WaitOutcome::Skipped,
            });
        }

        state = self.transition(state, DeploymentState::WaitingStable, request);
        let wait = self.wait_for_stability(request, shutdown).await?;
        let terminal = match &wait {
            WaitOutcome::Stable | WaitOutcome::Skipped => DeploymentState::Stable,
            WaitOutcome::TimedOut { .. } | WaitOutcome::Cancelled => DeploymentState::TimedOut,
        };
        self.transition(state, terminal, request);

        Ok(ReconcileResult { revision, wait })
    }

    /// Bounded status poll. A failed status check counts against the budget
    /// and is retried; it never fails the run on its own.
    async fn wait_for_stability(
        &self,
        request: &DeploymentRequest,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<WaitOutcome, DeployError> {
        let mut attempts = 0u32;

        loop {
            match self
                .orchestrator
                .describe_service(&request.cluster, &request.service)
                .await
            {
                Ok(status) => {
                    if status.is_stable() {
                        info!(
                            service = %request.service,
                            running = status.running_count,
                            "Service is stable"
                        );
                        return Ok(WaitOutcome::Stable);
                    }
                    debug!(
                        service = %request.service,
                        desired = status.desired_count,
                        running = status.running_count,
                        deployments = status.deployments.len(),
                        "Service not yet stable"
                    );
                }
                Err(err) => {
                    warn!(service = %request.service, error = %err, "Status check failed, will retry");
                }
            }

            attempts += 1;
            if attempts >= self.wait.max_attempts {
                warn!(
                    service = %request.service,
                    attempts,
                    "Stability wait budget exhausted"
                );
                return Ok(WaitOutcome::TimedOut { attempts });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.wait.interval) => {}
                _ = shutdown.recv() => {
                    warn!(service = %request.service, "Cancelled while waiting for stability");
                    return Ok(WaitOutcome::Cancelled);
                }
            }
        }
    }

    fn transition(
        &self,
        from: DeploymentState,
        to: DeploymentState,
        request: &DeploymentRequest,
    ) -> DeploymentState {
        info!(
            service = %request.service,
            from = from.as_str(),
            to = to.as_str(),
            "Deployment state transition"
        );
        to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContainerDefinition, RemoteTaskDefinition, ServiceDeployment, ServiceStatus,
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
                environment: vec![],
                secrets: vec![],
                mount_points: vec![],
                essential: Some(true),
            }],
            volumes: vec![],
            execution_role_arn: None,
            task_role_arn: None,
            network_mode: None,
            requires_compatibilities: vec!["FARGATE".to_string()],
        }
    }

    fn candidate() -> CandidateDescriptor {
        CandidateDescriptor {
            family: "api".to_string(),
            cpu: Some(256),
            memory: Some(512),
            container_definitions: remote().container_definitions,
            volumes: vec![],
            execution_role_arn: None,
            task_role_arn: None,
            network_mode: None,
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

    fn unstable() -> ServiceStatus {
        ServiceStatus {
            desired_count: 2,
            running_count: 1,
            deployments: vec![
                ServiceDeployment {
                    status: "PRIMARY".to_string(),
                    task_definition: "arn:aws:ecs:us-east-1:123456789012:task-definition/api:8"
                        .to_string(),
                    desired_count: 2,
                    running_count: 1,
                },
                ServiceDeployment {
                    status: "ACTIVE".to_string(),
                    task_definition: "arn:aws:ecs:us-east-1:123456789012:task-definition/api:7"
                        .to_string(),
                    desired_count: 2,
                    running_count: 1,
                },
            ],
        }
    }

    fn fast_wait(max_attempts: u32) -> WaitConfig {
        WaitConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn registers_updates_and_reaches_stable() {
        let orch = FakeOrchestrator::new(remote()).with_statuses(vec![unstable()]);
        let (_tx, mut shutdown) = broadcast::channel(1);

        let result = Reconciler::new(&orch, fast_wait(10))
            .run(&request(), &candidate(), &mut shutdown)
            .await
            .unwrap();

        assert_eq!(result.revision.revision, 8);
        assert_eq!(result.wait, WaitOutcome::Stable);

        let calls = orch.recorded_calls();
        assert!(matches!(calls[0], RecordedCall::RegisterTaskDefinition { .. }));
        assert!(matches!(calls[1], RecordedCall::UpdateService { .. }));
        assert!(matches!(calls[2], RecordedCall::DescribeService { .. }));
    }

    #[tokio::test]
    async fn desired_count_rides_on_the_update_call() {
        let orch = FakeOrchestrator::new(remote());
        let (_tx, mut shutdown) = broadcast::channel(1);
        let mut req = request();
        req.desired_count = Some(3);

        Reconciler::new(&orch, fast_wait(10))
            .run(&req, &candidate(), &mut shutdown)
            .await
            .unwrap();

        let calls = orch.recorded_calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            RecordedCall::UpdateService { desired_count: Some(3), .. }
        )));
    }

    #[tokio::test]
    async fn register_failure_preserves_remote_message_and_stops() {
        let orch = FakeOrchestrator::new(remote())
            .failing_registration("Invalid setting for container 'api': memory is required");
        let (_tx, mut shutdown) = broadcast::channel(1);

        let err = Reconciler::new(&orch, fast_wait(10))
            .run(&request(), &candidate(), &mut shutdown)
            .await
            .unwrap_err();

        match err {
            DeployError::RemoteRejection { operation, message } => {
                assert_eq!(operation, "RegisterTaskDefinition");
                assert_eq!(
                    message,
                    "Invalid setting for container 'api': memory is required"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!orch
            .recorded_calls()
            .iter()
            .any(|c| matches!(c, RecordedCall::UpdateService { .. })));
    }

    #[tokio::test]
    async fn runs_out_of_wait_budget() {
        let orch =
            FakeOrchestrator::new(remote()).with_statuses(vec![unstable(); 10]);
        let (_tx, mut shutdown) = broadcast::channel(1);

        let result = Reconciler::new(&orch, fast_wait(3))
            .run(&request(), &candidate(), &mut shutdown)
            .await
            .unwrap();

        assert_eq!(result.wait, WaitOutcome::TimedOut { attempts: 3 });
        // Mutations happened and stand.
        let calls = orch.recorded_calls();
        assert!(calls.iter().any(|c| matches!(c, RecordedCall::RegisterTaskDefinition { .. })));
        assert!(calls.iter().any(|c| matches!(c, RecordedCall::UpdateService { .. })));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_poll_only() {
        let orch =
            FakeOrchestrator::new(remote()).with_statuses(vec![unstable(); 10]);
        let (tx, mut shutdown) = broadcast::channel(1);
        tx.send(()).unwrap();

        let result = Reconciler::new(&orch, fast_wait(10))
            .run(&request(), &candidate(), &mut shutdown)
            .await
            .unwrap();

        assert_eq!(result.wait, WaitOutcome::Cancelled);
        assert!(orch
            .recorded_calls()
            .iter()
            .any(|c| matches!(c, RecordedCall::UpdateService { .. })));
    }

    #[tokio::test]
    async fn zero_attempts_skips_the_wait() {
        let orch = FakeOrchestrator::new(remote());
        let (_tx, mut shutdown) = broadcast::channel(1);

        let result = Reconciler::new(&orch, fast_wait(0))
            .run(&request(), &candidate(), &mut shutdown)
            .await
            .unwrap();

        assert_eq!(result.wait, WaitOutcome::Skipped);
        assert!(!orch
            .recorded_calls()
            .iter()
            .any(|c| matches!(c, RecordedCall::DescribeService { .. })));
    }
}
