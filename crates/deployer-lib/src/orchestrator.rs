//! Remote orchestrator capability interface
//!
//! The engine talks to the container orchestrator exclusively through this
//! trait, so the whole pipeline can be exercised against an in-process fake
//! without network access. Implementations surface remote refusals as
//! [`DeployError::RemoteRejection`] with the remote's message preserved
//! verbatim; no implementation retries a mutation.

use async_trait::async_trait;

use crate::error::DeployError;
use crate::models::{
    CandidateDescriptor, RegisteredRevision, RemoteTaskDefinition, ScalingPolicySpec,
    ServiceStatus,
};

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Fetch the latest registered revision for a task-definition family.
    async fn fetch_task_definition(
        &self,
        family: &str,
    ) -> Result<RemoteTaskDefinition, DeployError>;

    /// Register the candidate as a new revision. The remote never
    /// deduplicates: identical content still yields a new revision.
    async fn register_task_definition(
        &self,
        descriptor: &CandidateDescriptor,
    ) -> Result<RegisteredRevision, DeployError>;

    /// Point the service at a revision, optionally setting the desired task
    /// count in the same call.
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition_arn: &str,
        desired_count: Option<i32>,
    ) -> Result<(), DeployError>;

    /// Report the service's current rollout state.
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus, DeployError>;

    /// Register or update the scalable target for a service resource id.
    async fn register_scalable_target(
        &self,
        resource_id: &str,
        min_capacity: i32,
        max_capacity: i32,
    ) -> Result<(), DeployError>;

    /// Create or replace (by name) a target-tracking scaling policy.
    async fn put_scaling_policy(&self, policy: &ScalingPolicySpec) -> Result<(), DeployError>;
}
