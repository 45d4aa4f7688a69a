//! Core data models for the deployment engine

use serde::{Deserialize, Serialize};

/// A container environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// A reference to a secret injected into the container by the orchestrator.
/// Only the identifier travels; the value is never fetched or inspected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    pub value_from: String,
}

/// A container mount point referencing a named volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MountPoint {
    pub container_path: String,
    pub source_volume: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Host-path volume properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HostVolumeProperties {
    pub source_path: String,
}

/// EFS volume properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct EfsVolumeConfiguration {
    pub file_system_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<String>,
}

/// A named task-level volume. Exactly one of `host` /
/// `efs_volume_configuration` must be set; the parser enforces this before
/// anything reaches the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct VolumeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostVolumeProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efs_volume_configuration: Option<EfsVolumeConfiguration>,
}

/// Autoscaling parameters for the target service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscalingConfig {
    pub min_capacity: i32,
    pub max_capacity: i32,
    /// Target average CPU utilization percentage; absent leaves any existing
    /// CPU policy untouched.
    pub target_cpu_utilization: Option<f64>,
    /// Target average memory utilization percentage; absent leaves any
    /// existing memory policy untouched.
    pub target_memory_utilization: Option<f64>,
    pub scale_in_cooldown_secs: i32,
    pub scale_out_cooldown_secs: i32,
}

/// A fully validated deployment request.
///
/// `None` on an optional list field means "leave the remote value alone";
/// `Some(vec![])` means "clear it". The parser is the only producer of this
/// distinction and the merger its only consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub cluster: String,
    pub service: String,
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub desired_count: Option<i32>,
    pub environment: Option<Vec<EnvVar>>,
    pub secrets: Option<Vec<SecretRef>>,
    pub mount_points: Option<Vec<MountPoint>>,
    pub volumes: Option<Vec<VolumeSpec>>,
    pub autoscaling: Option<AutoscalingConfig>,
}

/// A single container entry within a task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub environment: Vec<EnvVar>,
    #[serde(default)]
    pub secrets: Vec<SecretRef>,
    #[serde(default)]
    pub mount_points: Vec<MountPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
}

/// The latest registered task-definition revision for a family, fetched
/// read-only. A new revision is always created; this is never mutated in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTaskDefinition {
    pub family: String,
    pub revision: i32,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub container_definitions: Vec<ContainerDefinition>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub requires_compatibilities: Vec<String>,
}

/// The merged descriptor submitted as a new task-definition revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescriptor {
    pub family: String,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub container_definitions: Vec<ContainerDefinition>,
    pub volumes: Vec<VolumeSpec>,
    pub execution_role_arn: Option<String>,
    pub task_role_arn: Option<String>,
    pub network_mode: Option<String>,
    pub requires_compatibilities: Vec<String>,
}

/// Identifier of a freshly registered task-definition revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredRevision {
    pub arn: String,
    pub revision: i32,
}

/// One rollout tracked by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeployment {
    pub status: String,
    pub task_definition: String,
    pub desired_count: i32,
    pub running_count: i32,
}

/// Point-in-time service state as reported by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub desired_count: i32,
    pub running_count: i32,
    pub deployments: Vec<ServiceDeployment>,
}

impl ServiceStatus {
    /// A service is stable when a single deployment remains and its running
    /// task count matches its desired count.
    pub fn is_stable(&self) -> bool {
        match self.deployments.as_slice() {
            [only] => only.running_count == only.desired_count,
            _ => false,
        }
    }
}

/// Metric dimension tracked by a scaling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMetric {
    Cpu,
    Memory,
}

impl ScalingMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingMetric::Cpu => "cpu",
            ScalingMetric::Memory => "memory",
        }
    }
}

/// A single target-tracking policy to create or replace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicySpec {
    pub policy_name: String,
    pub resource_id: String,
    pub metric: ScalingMetric,
    pub target_value: f64,
    pub scale_in_cooldown_secs: i32,
    pub scale_out_cooldown_secs: i32,
}
