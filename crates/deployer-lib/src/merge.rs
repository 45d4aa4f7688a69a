//! Descriptor merging
//!
//! Merges a [`DeploymentRequest`] over the latest remote task-definition
//! revision to produce the candidate for registration.
//!
//! List-valued container fields (environment, secrets, mount points) are
//! replaced wholesale when the request supplies them, not merged per key.
//! Omitting a field in one deployment after setting it in a prior one does
//! NOT clear it (the parser already mapped "absent" to "no change"), but
//! explicitly supplying an empty list DOES clear it. Task-level volumes are
//! unioned by name with the request winning on collision.

use tracing::debug;

use crate::error::DeployError;
use crate::models::{CandidateDescriptor, DeploymentRequest, RemoteTaskDefinition, VolumeSpec};

/// Merge the request over the remote descriptor.
///
/// Fails with [`DeployError::ContainerNotFound`] when the targeted container
/// does not exist in the remote revision. The remote value is consumed, not
/// mutated in place; the result is always registered as a new revision.
pub fn merge_descriptor(
    request: &DeploymentRequest,
    remote: RemoteTaskDefinition,
) -> Result<CandidateDescriptor, DeployError> {
    let RemoteTaskDefinition {
        family,
        revision,
        cpu,
        memory,
        mut container_definitions,
        volumes,
        execution_role_arn,
        task_role_arn,
        network_mode,
        requires_compatibilities,
    } = remote;

    let container = container_definitions
        .iter_mut()
        .find(|c| c.name == request.container_name)
        .ok_or_else(|| DeployError::ContainerNotFound {
            family: family.clone(),
            name: request.container_name.clone(),
        })?;

    container.image = request.image.clone();
    if let Some(environment) = &request.environment {
        container.environment = environment.clone();
    }
    if let Some(secrets) = &request.secrets {
        container.secrets = secrets.clone();
    }
    if let Some(mount_points) = &request.mount_points {
        container.mount_points = mount_points.clone();
    }

    let volumes = union_volumes(volumes, request.volumes.as_deref());

    debug!(
        family = %family,
        base_revision = revision,
        container = %request.container_name,
        "Merged request over remote task definition"
    );

    Ok(CandidateDescriptor {
        family,
        cpu: request.cpu.or(cpu),
        memory: request.memory.or(memory),
        container_definitions,
        volumes,
        execution_role_arn,
        task_role_arn,
        network_mode,
        requires_compatibilities,
    })
}

/// Union by name, remote order first, request wins on collision.
fn union_volumes(remote: Vec<VolumeSpec>, requested: Option<&[VolumeSpec]>) -> Vec<VolumeSpec> {
    let Some(requested) = requested else {
        return remote;
    };

    let mut merged: Vec<VolumeSpec> = remote
        .into_iter()
        .map(|vol| {
            requested
                .iter()
                .find(|req| req.name == vol.name)
                .cloned()
                .unwrap_or(vol)
        })
        .collect();
    for req in requested {
        if !merged.iter().any(|vol| vol.name == req.name) {
            merged.push(req.clone());
        }
    }
    merged
}
