//! Android delivery SDK.
//!
//! `apkship-sdk` automates the last mile of Android app delivery:
//! invoke a project's gradle wrapper, collect the `.apk`/`.aab`
//! packages it produced, stage them into a deterministic output
//! directory, and optionally push the result to a distribution
//! platform (Pgyer or fir.im).
//!
//! # Quick Start
//!
//! ```no_run
//! use apkship_sdk::{BuildTarget, BuildType, Pipeline, PipelineOutcome};
//!
//! fn main() -> Result<(), apkship_sdk::DeliveryError> {
//!     let target = BuildTarget::new("/work/my-app")
//!         .module("app")
//!         .build_type(BuildType::Release);
//!
//!     let pipeline = Pipeline::new()?;
//!     match pipeline.run(&target, &[], None)? {
//!         PipelineOutcome::Built(build) => println!("built, exit {}", build.exit_code),
//!         PipelineOutcome::BuildFailed(build) => eprintln!("failed: {}", build.exit_code),
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **gradle**: task-name/output-location derivation and subprocess
//!   invocation with live output streaming
//! - **artifacts**: package discovery and clean-then-copy staging
//! - **publish**: the two distribution-platform upload protocols
//! - **pipeline**: build → stage → publish orchestration with
//!   per-target serialization
//! - **projects** / **env**: the JSON target registry and toolchain
//!   probes the CLI sits on

pub mod artifacts;
pub mod env;
pub mod gradle;
pub mod pipeline;
pub mod projects;
pub mod publish;
pub mod types;

pub use env::{check_env, EnvCheck};
pub use gradle::{gradle_task, output_location, GradleInvoker};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use projects::{Project, ProjectStore, DEFAULT_REGISTRY_PATH};
pub use publish::{PublishConfig, PublishPlatform, PublishResult, Publisher};
pub use types::{
    BuildLog, BuildResult, BuildTarget, BuildType, ConsoleLog, DeliveryError, NullLog,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
