//! Build-then-publish pipeline.
//!
//! Sequences the gradle invoker and the publish adapter for one
//! target: build, stage, then optionally push the first staged package
//! to a distribution platform. Builds against the same target are
//! serialized through a process-wide single-flight guard; the staging
//! clean-then-copy step makes concurrent builds of one target unsafe.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::gradle::{output_location, GradleInvoker};
use crate::publish::{PublishConfig, PublishResult, Publisher};
use crate::types::{is_package_file, BuildLog, BuildResult, BuildTarget, ConsoleLog, DeliveryError};

/// Terminal state of one pipeline invocation.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The build exited nonzero (or could not be spawned); staging and
    /// publishing were skipped.
    BuildFailed(BuildResult),
    /// The build succeeded and no publish was requested.
    Built(BuildResult),
    /// The build succeeded, a publish was requested, but the staged
    /// output location held no package to upload.
    BuiltNothingToPublish { build: BuildResult, message: String },
    /// Build and publish both succeeded.
    Published { build: BuildResult, publish: PublishResult },
    /// The build succeeded but the publish failed. Staged artifacts
    /// remain in place; there is no retry and no rollback.
    PublishFailed { build: BuildResult, publish: PublishResult },
}

impl PipelineOutcome {
    /// Exit code the outer shell should report: the gradle exit code
    /// for build failures, 1 for publish failures, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineOutcome::BuildFailed(build) => build.exit_code,
            PipelineOutcome::Built(_) | PipelineOutcome::Published { .. } => 0,
            PipelineOutcome::BuiltNothingToPublish { .. } => 0,
            PipelineOutcome::PublishFailed { .. } => 1,
        }
    }
}

static GUARDS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

fn guard_map() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> {
    GUARDS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the exclusive guard for a target path, creating it on first
/// use. Keyed by canonical path so `./app` and `/work/app` share one
/// lock. Entries nobody holds any more are dropped on the way in, so
/// the map stays bounded by the number of in-flight targets.
fn target_guard(path: &Path) -> Arc<Mutex<()>> {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut map = guard_map().lock().unwrap_or_else(|err| err.into_inner());
    map.retain(|_, guard| Arc::strong_count(guard) > 1);
    map.entry(key).or_default().clone()
}

#[cfg(test)]
fn guard_registered(path: &Path) -> bool {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let map = guard_map().lock().unwrap_or_else(|err| err.into_inner());
    map.contains_key(&key)
}

/// Orchestrates build, staging, and optional publish for one target.
pub struct Pipeline {
    publisher: Publisher,
    log: Arc<dyn BuildLog>,
}

impl Pipeline {
    pub fn new() -> Result<Self, DeliveryError> {
        Ok(Self {
            publisher: Publisher::new()?,
            log: Arc::new(ConsoleLog),
        })
    }

    pub fn log(mut self, log: Arc<dyn BuildLog>) -> Self {
        self.log = log;
        self
    }

    /// Runs the pipeline to a terminal state.
    ///
    /// Configuration errors (invalid target path, missing wrapper)
    /// abort before any subprocess; every later failure is reported in
    /// the outcome, never as an `Err`.
    pub fn run(
        &self,
        target: &BuildTarget,
        extra_args: &[String],
        publish: Option<&PublishConfig>,
    ) -> Result<PipelineOutcome, DeliveryError> {
        target.validate()?;

        let guard = target_guard(&target.path);
        let _held = guard.lock().unwrap_or_else(|err| err.into_inner());

        let invoker = GradleInvoker::new(target.clone())
            .extra_args(extra_args)
            .log(self.log.clone());
        let build = match invoker.run() {
            Ok(build) => build,
            // Spawn failure stays inside the orchestrator boundary as a
            // failed build result.
            Err(DeliveryError::Build(message)) => {
                self.log.line(&message);
                return Ok(PipelineOutcome::BuildFailed(BuildResult {
                    exit_code: 1,
                    output: message,
                }));
            }
            Err(other) => return Err(other),
        };

        if !build.succeeded() {
            return Ok(PipelineOutcome::BuildFailed(build));
        }

        let config = match publish {
            Some(config) => config,
            None => return Ok(PipelineOutcome::Built(build)),
        };

        let staged = output_location(target);
        let artifact = match first_package(&staged) {
            Some(artifact) => artifact,
            None => {
                let message = format!(
                    "build succeeded but no .apk/.aab was found in {}; nothing to publish",
                    staged.display()
                );
                self.log.line(&message);
                return Ok(PipelineOutcome::BuiltNothingToPublish { build, message });
            }
        };

        self.log.line(&format!(
            "publishing {} to {}",
            artifact.display(),
            config.platform.as_str()
        ));
        let publish = self.publisher.publish(&artifact, config);
        self.log.line(&publish.message);
        if publish.success {
            if let Some(url) = &publish.download_url {
                self.log.line(&format!("download: {url}"));
            }
            if let Some(url) = &publish.qr_code_url {
                self.log.line(&format!("qr code: {url}"));
            }
            Ok(PipelineOutcome::Published { build, publish })
        } else {
            Ok(PipelineOutcome::PublishFailed { build, publish })
        }
    }
}

/// First package file (name order) in the staged output directory.
fn first_package(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut packages: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_package_file(path))
        .collect();
    packages.sort();
    packages.into_iter().next()
}
