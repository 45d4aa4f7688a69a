//! Input parsing and normalization
//!
//! Turns the raw invocation parameters into a typed [`DeploymentRequest`] or
//! fails with a validation error naming the offending field. JSON list
//! fields reject unknown keys outright rather than silently dropping them.
//!
//! An absent or empty list field normalizes to `None` ("leave the remote
//! value alone"); an explicit `[]` normalizes to `Some(vec![])` ("clear it").
//! This is where that distinction is decided, once, for the whole pipeline.

use std::collections::HashSet;

use serde::de::DeserializeOwned;

use crate::error::DeployError;
use crate::models::{
    AutoscalingConfig, DeploymentRequest, EnvVar, MountPoint, SecretRef, VolumeSpec,
};

/// Raw deployment parameters as they arrive from the invocation surface.
/// List-valued fields are still JSON text at this point.
#[derive(Debug, Clone, Default)]
pub struct RawDeploymentInput {
    pub cluster: String,
    pub service: String,
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub desired_count: Option<i32>,
    pub environment_variables: Option<String>,
    pub secrets: Option<String>,
    pub mount_points: Option<String>,
    pub volumes: Option<String>,
    pub autoscaling_enabled: bool,
    pub min_capacity: i32,
    pub max_capacity: i32,
    pub target_cpu_utilization: Option<f64>,
    pub target_memory_utilization: Option<f64>,
    pub scale_in_cooldown_secs: i32,
    pub scale_out_cooldown_secs: i32,
}

/// Validate and normalize raw input into a [`DeploymentRequest`].
///
/// Pure transform: nothing here touches the remote.
pub fn parse_request(input: &RawDeploymentInput) -> Result<DeploymentRequest, DeployError> {
    require_non_empty("cluster", &input.cluster)?;
    require_non_empty("service", &input.service)?;
    require_non_empty("family", &input.family)?;
    require_non_empty("container_name", &input.container_name)?;
    require_non_empty("image", &input.image)?;

    if input.cpu == Some(0) {
        return Err(DeployError::validation("cpu", "must be greater than zero"));
    }
    if input.memory == Some(0) {
        return Err(DeployError::validation("memory", "must be greater than zero"));
    }
    if let Some(count) = input.desired_count {
        if count < 0 {
            return Err(DeployError::validation("desired_count", "must not be negative"));
        }
    }

    let environment: Option<Vec<EnvVar>> =
        parse_json_list("environment_variables", input.environment_variables.as_deref())?;
    if let Some(vars) = &environment {
        let mut seen = HashSet::new();
        for var in vars {
            if !seen.insert(var.name.as_str()) {
                return Err(DeployError::validation(
                    "environment_variables",
                    format!("duplicate variable name `{}`", var.name),
                ));
            }
        }
    }

    let secrets: Option<Vec<SecretRef>> = parse_json_list("secrets", input.secrets.as_deref())?;
    let mount_points: Option<Vec<MountPoint>> =
        parse_json_list("mount_points", input.mount_points.as_deref())?;
    let volumes: Option<Vec<VolumeSpec>> = parse_json_list("volumes", input.volumes.as_deref())?;

    if let Some(vols) = &volumes {
        let mut seen = HashSet::new();
        for vol in vols {
            if !seen.insert(vol.name.as_str()) {
                return Err(DeployError::validation(
                    "volumes",
                    format!("duplicate volume name `{}`", vol.name),
                ));
            }
            match (&vol.host, &vol.efs_volume_configuration) {
                (Some(_), Some(_)) => {
                    return Err(DeployError::validation(
                        "volumes",
                        format!(
                            "volume `{}` sets both host and efsVolumeConfiguration",
                            vol.name
                        ),
                    ));
                }
                (None, None) => {
                    return Err(DeployError::validation(
                        "volumes",
                        format!(
                            "volume `{}` needs exactly one of host or efsVolumeConfiguration",
                            vol.name
                        ),
                    ));
                }
                _ => {}
            }
        }
    }

    let autoscaling = if input.autoscaling_enabled {
        Some(parse_autoscaling(input)?)
    } else {
        None
    };

    Ok(DeploymentRequest {
        cluster: input.cluster.clone(),
        service: input.service.clone(),
        family: input.family.clone(),
        container_name: input.container_name.clone(),
        image: input.image.clone(),
        cpu: input.cpu,
        memory: input.memory,
        desired_count: input.desired_count,
        environment,
        secrets,
        mount_points,
        volumes,
        autoscaling,
    })
}

fn parse_autoscaling(input: &RawDeploymentInput) -> Result<AutoscalingConfig, DeployError> {
    if input.min_capacity < 0 {
        return Err(DeployError::validation("min_capacity", "must not be negative"));
    }
    if input.max_capacity < 1 {
        return Err(DeployError::validation("max_capacity", "must be at least 1"));
    }
    if input.min_capacity > input.max_capacity {
        return Err(DeployError::validation(
            "min_capacity",
            format!(
                "must not exceed max_capacity ({} > {})",
                input.min_capacity, input.max_capacity
            ),
        ));
    }
    for (field, target) in [
        ("target_cpu_utilization", input.target_cpu_utilization),
        ("target_memory_utilization", input.target_memory_utilization),
    ] {
        if let Some(value) = target {
            if !(value > 0.0 && value <= 100.0) {
                return Err(DeployError::validation(
                    field,
                    "must be a percentage in (0, 100]",
                ));
            }
        }
    }
    if input.scale_in_cooldown_secs < 0 {
        return Err(DeployError::validation("scale_in_cooldown", "must not be negative"));
    }
    if input.scale_out_cooldown_secs < 0 {
        return Err(DeployError::validation("scale_out_cooldown", "must not be negative"));
    }

    Ok(AutoscalingConfig {
        min_capacity: input.min_capacity,
        max_capacity: input.max_capacity,
        target_cpu_utilization: input.target_cpu_utilization,
        target_memory_utilization: input.target_memory_utilization,
        scale_in_cooldown_secs: input.scale_in_cooldown_secs,
        scale_out_cooldown_secs: input.scale_out_cooldown_secs,
    })
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), DeployError> {
    if value.trim().is_empty() {
        return Err(DeployError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Absent or blank input stays `None`; `"[]"` becomes `Some(vec![])`.
fn parse_json_list<T: DeserializeOwned>(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<Vec<T>>, DeployError> {
    match raw {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|err| DeployError::validation(field, err.to_string())),
    }
}
