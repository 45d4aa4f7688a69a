//! Deployment engine for ECS-style container orchestrators
//!
//! This crate provides the core reconciliation pipeline:
//! - Input parsing and normalization
//! - Merging a partial request over the remote task definition
//! - Compatibility validation before any mutation
//! - Registration, service update and bounded stability wait
//! - Idempotent autoscaling configuration
//!
//! The remote orchestrator sits behind the [`orchestrator::Orchestrator`]
//! trait, so everything here runs against a fake in tests.

pub mod autoscale;
pub mod error;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod validate;

pub use error::DeployError;
pub use models::*;
pub use orchestrator::Orchestrator;
pub use parser::{parse_request, RawDeploymentInput};
pub use pipeline::{run_deployment, DeploymentOutcome, DeploymentReport};
pub use reconcile::{DeploymentState, ReconcileResult, Reconciler, WaitConfig, WaitOutcome};
