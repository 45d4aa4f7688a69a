//! Pre-submission compatibility checks
//!
//! Runs after merging and strictly before any remote mutation, so a rejected
//! candidate leaves no partial state behind.

use crate::error::DeployError;
use crate::models::CandidateDescriptor;

/// Valid Fargate cpu/memory combinations, cpu units to allowed memory MB.
/// Rows beyond 1024 cpu allow any 1024-step within the range.
const CPU_MEMORY_TABLE: &[(u32, u32, u32)] = &[
    // (cpu, min memory, max memory), memory stepping checked separately
    (1024, 2048, 8192),
    (2048, 4096, 16384),
    (4096, 8192, 30720),
];

/// Check the candidate for cpu/memory legality and mount referential
/// integrity.
pub fn validate_descriptor(candidate: &CandidateDescriptor) -> Result<(), DeployError> {
    if let (Some(cpu), Some(memory)) = (candidate.cpu, candidate.memory) {
        if !is_supported_combination(cpu, memory) {
            return Err(DeployError::IncompatibleResources { cpu, memory });
        }
    }

    for container in &candidate.container_definitions {
        for mount in &container.mount_points {
            let known = candidate
                .volumes
                .iter()
                .any(|vol| vol.name == mount.source_volume);
            if !known {
                return Err(DeployError::DanglingMount {
                    container_path: mount.container_path.clone(),
                    source_volume: mount.source_volume.clone(),
                });
            }
        }
    }

    Ok(())
}

fn is_supported_combination(cpu: u32, memory: u32) -> bool {
    match cpu {
        256 => matches!(memory, 512 | 1024 | 2048),
        512 => matches!(memory, 1024 | 2048 | 3072 | 4096),
        _ => CPU_MEMORY_TABLE
            .iter()
            .find(|(c, _, _)| *c == cpu)
            .map(|(_, min, max)| memory >= *min && memory <= *max && memory % 1024 == 0)
            .unwrap_or(false),
    }
}
