//! AWS-backed implementation of the orchestrator interface
//!
//! Thin translation layer between the engine's models and the ECS /
//! Application Auto Scaling SDKs. Credential and region resolution are the
//! SDK's concern; this code only makes authenticated calls. Remote refusals
//! are passed through verbatim and never retried here.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_applicationautoscaling::types::{
    MetricType, PolicyType, PredefinedMetricSpecification, ScalableDimension, ServiceNamespace,
    TargetTrackingScalingPolicyConfiguration,
};
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types as ecs_types;
use deployer_lib::{
    CandidateDescriptor, ContainerDefinition, DeployError, EfsVolumeConfiguration, EnvVar,
    HostVolumeProperties, MountPoint, Orchestrator, RegisteredRevision, RemoteTaskDefinition,
    ScalingMetric, ScalingPolicySpec, SecretRef, ServiceDeployment, ServiceStatus, VolumeSpec,
};

pub struct AwsOrchestrator {
    ecs: aws_sdk_ecs::Client,
    autoscaling: aws_sdk_applicationautoscaling::Client,
}

impl AwsOrchestrator {
    /// Build clients against the given region, resolving credentials through
    /// the default provider chain.
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            ecs: aws_sdk_ecs::Client::new(&config),
            autoscaling: aws_sdk_applicationautoscaling::Client::new(&config),
        }
    }
}

fn remote(operation: &'static str, err: impl std::error::Error) -> DeployError {
    DeployError::RemoteRejection {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn build_failure(operation: &'static str, err: impl std::fmt::Display) -> DeployError {
    DeployError::RemoteRejection {
        operation,
        message: format!("could not build request: {err}"),
    }
}

#[async_trait]
impl Orchestrator for AwsOrchestrator {
    async fn fetch_task_definition(
        &self,
        family: &str,
    ) -> Result<RemoteTaskDefinition, DeployError> {
        let output = self
            .ecs
            .describe_task_definition()
            .task_definition(family)
            .send()
            .await
            .map_err(|err| remote("DescribeTaskDefinition", err))?;
        let td = output
            .task_definition()
            .ok_or_else(|| DeployError::RemoteRejection {
                operation: "DescribeTaskDefinition",
                message: format!("no task definition returned for family `{family}`"),
            })?;

        Ok(RemoteTaskDefinition {
            family: td.family().unwrap_or(family).to_string(),
            revision: td.revision(),
            cpu: td.cpu().and_then(|c| c.parse().ok()),
            memory: td.memory().and_then(|m| m.parse().ok()),
            container_definitions: td
                .container_definitions()
                .iter()
                .map(container_from_sdk)
                .collect(),
            volumes: td.volumes().iter().map(volume_from_sdk).collect(),
            execution_role_arn: td.execution_role_arn().map(str::to_string),
            task_role_arn: td.task_role_arn().map(str::to_string),
            network_mode: td.network_mode().map(|m| m.as_str().to_string()),
            requires_compatibilities: td
                .requires_compatibilities()
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        })
    }

    async fn register_task_definition(
        &self,
        descriptor: &CandidateDescriptor,
    ) -> Result<RegisteredRevision, DeployError> {
        let containers = descriptor
            .container_definitions
            .iter()
            .map(container_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;
        let volumes = descriptor
            .volumes
            .iter()
            .map(volume_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .ecs
            .register_task_definition()
            .family(&descriptor.family)
            .set_cpu(descriptor.cpu.map(|c| c.to_string()))
            .set_memory(descriptor.memory.map(|m| m.to_string()))
            .set_execution_role_arn(descriptor.execution_role_arn.clone())
            .set_task_role_arn(descriptor.task_role_arn.clone())
            .set_network_mode(
                descriptor
                    .network_mode
                    .as_deref()
                    .map(ecs_types::NetworkMode::from),
            )
            .set_requires_compatibilities(if descriptor.requires_compatibilities.is_empty() {
                None
            } else {
                Some(
                    descriptor
                        .requires_compatibilities
                        .iter()
                        .map(|c| ecs_types::Compatibility::from(c.as_str()))
                        .collect(),
                )
            })
            .set_container_definitions(Some(containers))
            .set_volumes(Some(volumes))
            .send()
            .await
            .map_err(|err| remote("RegisterTaskDefinition", err))?;

        let td = output
            .task_definition()
            .ok_or_else(|| DeployError::RemoteRejection {
                operation: "RegisterTaskDefinition",
                message: "registration returned no task definition".to_string(),
            })?;
        Ok(RegisteredRevision {
            arn: td.task_definition_arn().unwrap_or_default().to_string(),
            revision: td.revision(),
        })
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition_arn: &str,
        desired_count: Option<i32>,
    ) -> Result<(), DeployError> {
        self.ecs
            .update_service()
            .cluster(cluster)
            .service(service)
            .task_definition(task_definition_arn)
            .set_desired_count(desired_count)
            .send()
            .await
            .map_err(|err| remote("UpdateService", err))?;
        Ok(())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus, DeployError> {
        let output = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .services(service)
            .send()
            .await
            .map_err(|err| remote("DescribeServices", err))?;
        let svc = output
            .services()
            .first()
            .ok_or_else(|| DeployError::RemoteRejection {
                operation: "DescribeServices",
                message: format!("service `{service}` not found in cluster `{cluster}`"),
            })?;

        Ok(ServiceStatus {
            desired_count: svc.desired_count(),
            running_count: svc.running_count(),
            deployments: svc
                .deployments()
                .iter()
                .map(|d| ServiceDeployment {
                    status: d.status().unwrap_or_default().to_string(),
                    task_definition: d.task_definition().unwrap_or_default().to_string(),
                    desired_count: d.desired_count(),
                    running_count: d.running_count(),
                })
                .collect(),
        })
    }

    async fn register_scalable_target(
        &self,
        resource_id: &str,
        min_capacity: i32,
        max_capacity: i32,
    ) -> Result<(), DeployError> {
        self.autoscaling
            .register_scalable_target()
            .service_namespace(ServiceNamespace::Ecs)
            .scalable_dimension(ScalableDimension::EcsServiceDesiredCount)
            .resource_id(resource_id)
            .min_capacity(min_capacity)
            .max_capacity(max_capacity)
            .send()
            .await
            .map_err(|err| remote("RegisterScalableTarget", err))?;
        Ok(())
    }

    async fn put_scaling_policy(&self, policy: &ScalingPolicySpec) -> Result<(), DeployError> {
        let metric_type = match policy.metric {
            ScalingMetric::Cpu => MetricType::EcsServiceAverageCpuUtilization,
            ScalingMetric::Memory => MetricType::EcsServiceAverageMemoryUtilization,
        };
        let metric_spec = PredefinedMetricSpecification::builder()
            .predefined_metric_type(metric_type)
            .build()
            .map_err(|err| build_failure("PutScalingPolicy", err))?;
        let configuration = TargetTrackingScalingPolicyConfiguration::builder()
            .target_value(policy.target_value)
            .predefined_metric_specification(metric_spec)
            .scale_in_cooldown(policy.scale_in_cooldown_secs)
            .scale_out_cooldown(policy.scale_out_cooldown_secs)
            .build()
            .map_err(|err| build_failure("PutScalingPolicy", err))?;

        self.autoscaling
            .put_scaling_policy()
            .policy_name(&policy.policy_name)
            .service_namespace(ServiceNamespace::Ecs)
            .scalable_dimension(ScalableDimension::EcsServiceDesiredCount)
            .resource_id(&policy.resource_id)
            .policy_type(PolicyType::TargetTrackingScaling)
            .target_tracking_scaling_policy_configuration(configuration)
            .send()
            .await
            .map_err(|err| remote("PutScalingPolicy", err))?;
        Ok(())
    }
}

fn container_from_sdk(c: &ecs_types::ContainerDefinition) -> ContainerDefinition {
    ContainerDefinition {
        name: c.name().unwrap_or_default().to_string(),
        image: c.image().unwrap_or_default().to_string(),
        environment: c
            .environment()
            .iter()
            .map(|kv| EnvVar {
                name: kv.name().unwrap_or_default().to_string(),
                value: kv.value().unwrap_or_default().to_string(),
            })
            .collect(),
        secrets: c
            .secrets()
            .iter()
            .map(|s| SecretRef {
                name: s.name().to_string(),
                value_from: s.value_from().to_string(),
            })
            .collect(),
        mount_points: c
            .mount_points()
            .iter()
            .map(|m| MountPoint {
                container_path: m.container_path().unwrap_or_default().to_string(),
                source_volume: m.source_volume().unwrap_or_default().to_string(),
                read_only: m.read_only().unwrap_or(false),
            })
            .collect(),
        essential: c.essential(),
    }
}

fn container_to_sdk(
    c: &ContainerDefinition,
) -> Result<ecs_types::ContainerDefinition, DeployError> {
    let secrets = c
        .secrets
        .iter()
        .map(|s| {
            ecs_types::Secret::builder()
                .name(&s.name)
                .value_from(&s.value_from)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| build_failure("RegisterTaskDefinition", err))?;

    Ok(ecs_types::ContainerDefinition::builder()
        .name(&c.name)
        .image(&c.image)
        .set_essential(c.essential)
        .set_environment(Some(
            c.environment
                .iter()
                .map(|kv| {
                    ecs_types::KeyValuePair::builder()
                        .name(&kv.name)
                        .value(&kv.value)
                        .build()
                })
                .collect(),
        ))
        .set_secrets(Some(secrets))
        .set_mount_points(Some(
            c.mount_points
                .iter()
                .map(|m| {
                    ecs_types::MountPoint::builder()
                        .container_path(&m.container_path)
                        .source_volume(&m.source_volume)
                        .read_only(m.read_only)
                        .build()
                })
                .collect(),
        ))
        .build())
}

fn volume_from_sdk(v: &ecs_types::Volume) -> VolumeSpec {
    VolumeSpec {
        name: v.name().unwrap_or_default().to_string(),
        host: v.host().map(|h| HostVolumeProperties {
            source_path: h.source_path().unwrap_or_default().to_string(),
        }),
        efs_volume_configuration: v.efs_volume_configuration().map(|efs| {
            EfsVolumeConfiguration {
                file_system_id: efs.file_system_id().to_string(),
                root_directory: efs.root_directory().map(str::to_string),
            }
        }),
    }
}

fn volume_to_sdk(v: &VolumeSpec) -> Result<ecs_types::Volume, DeployError> {
    let efs = v
        .efs_volume_configuration
        .as_ref()
        .map(|efs| {
            ecs_types::EfsVolumeConfiguration::builder()
                .file_system_id(&efs.file_system_id)
                .set_root_directory(efs.root_directory.clone())
                .build()
        })
        .transpose()
        .map_err(|err| build_failure("RegisterTaskDefinition", err))?;

    Ok(ecs_types::Volume::builder()
        .name(&v.name)
        .set_host(v.host.as_ref().map(|h| {
            ecs_types::HostVolumeProperties::builder()
                .source_path(&h.source_path)
                .build()
        }))
        .set_efs_volume_configuration(efs)
        .build())
}
