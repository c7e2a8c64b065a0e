//! Core types for apkship-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`DeliveryError`] - Error types for build and delivery operations
//! - [`BuildType`] - Gradle build type selection (Debug or Release)
//! - [`BuildTarget`] - A buildable project (path + module/variant/build type)
//! - [`BuildResult`] - Output from a gradle invocation
//! - [`BuildLog`] - Injected sink for live build output

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error types for apkship-sdk operations.
///
/// Protocol and transport failures during publishing are deliberately
/// NOT represented here: the publish adapter reports those as a failed
/// [`PublishResult`](crate::publish::PublishResult) so they can never
/// escape the pipeline as a fault.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Invalid or missing configuration, rejected before any subprocess
    /// or network call: bad target path, missing gradle wrapper,
    /// duplicate project name.
    #[error("configuration error: {0}")]
    Config(String),

    /// A build invocation could not be started or observed.
    ///
    /// Nonzero gradle exit codes are NOT errors; they are reported in
    /// [`BuildResult::exit_code`]. This variant covers spawn failures
    /// (wrapper missing, not executable).
    #[error("build error: {0}")]
    Build(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    ///
    /// This can occur when reading or writing the project registry.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Gradle build type.
///
/// Serialized exactly as `"Debug"` / `"Release"`; gradle task names and
/// output directories use the same spelling with no case transformation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildType {
    #[default]
    Debug,
    Release,
}

impl BuildType {
    /// Returns the string representation, as it appears in task names
    /// and output paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
        }
    }
}

/// A buildable Android project.
///
/// # Example
///
/// ```
/// use apkship_sdk::{BuildTarget, BuildType};
///
/// let target = BuildTarget::new("/work/my-app")
///     .module("app")
///     .variant("Ver-Dev")
///     .build_type(BuildType::Release);
/// assert_eq!(apkship_sdk::gradle::gradle_task(&target), ":app:assembleVer-DevRelease");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Absolute project root containing the gradle wrapper.
    pub path: PathBuf,
    /// Optional sub-module name (e.g. "app").
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub module: Option<String>,
    /// Optional build variant label, concatenated directly onto the
    /// build type when deriving the task name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub variant: Option<String>,
    /// Build type (Debug or Release).
    #[serde(default)]
    pub build_type: BuildType,
}

impl BuildTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            module: None,
            variant: None,
            build_type: BuildType::Debug,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    /// Rejects a target whose path has no runnable gradle wrapper.
    ///
    /// Called before any subprocess is launched; a failure here is a
    /// configuration error, not a build failure.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        let wrapper = crate::gradle::wrapper_path(&self.path);
        if !wrapper.exists() {
            return Err(DeliveryError::Config(format!(
                "gradle wrapper not found at {}; check the project path",
                wrapper.display()
            )));
        }
        Ok(())
    }
}

/// Result of a gradle invocation. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    /// Exit code of the gradle child process. A killed child (no exit
    /// code) is reported as 1.
    pub exit_code: i32,
    /// Captured build output (stdout and stderr, line-interleaved).
    pub output: String,
}

impl BuildResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Receives build and staging progress lines as they are produced.
///
/// The gradle child's stdout/stderr are pumped through this sink live,
/// so callers can attach a console, a log file, or a test buffer
/// without the SDK writing to process-wide output itself.
pub trait BuildLog: Send + Sync {
    fn line(&self, line: &str);
}

/// Sink that forwards progress to stdout.
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl BuildLog for ConsoleLog {
    fn line(&self, line: &str) {
        println!("{line}");
    }
}

/// Sink that discards progress. Useful for embedding.
#[derive(Debug, Default)]
pub struct NullLog;

impl BuildLog for NullLog {
    fn line(&self, _line: &str) {}
}

/// Extension of a single-device installable package.
pub const APK_EXTENSION: &str = "apk";
/// Extension of an upload-bundle package.
pub const AAB_EXTENSION: &str = "aab";

/// Returns true when the path carries one of the accepted package
/// extensions (`.apk` or `.aab`).
pub fn is_package_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext == APK_EXTENSION || ext == AAB_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_type_spelling_is_preserved() {
        assert_eq!(BuildType::Debug.as_str(), "Debug");
        assert_eq!(BuildType::Release.as_str(), "Release");
    }

    #[test]
    fn build_type_serializes_as_pascal_case() {
        assert_eq!(serde_json::to_string(&BuildType::Release).unwrap(), "\"Release\"");
        let parsed: BuildType = serde_json::from_str("\"Debug\"").unwrap();
        assert_eq!(parsed, BuildType::Debug);
    }

    #[test]
    fn package_extension_check() {
        assert!(is_package_file(Path::new("/out/app-debug.apk")));
        assert!(is_package_file(Path::new("/out/app-release.aab")));
        assert!(!is_package_file(Path::new("/out/app.txt")));
        assert!(!is_package_file(Path::new("/out/apk")));
    }

    #[test]
    fn validate_rejects_path_without_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let target = BuildTarget::new(dir.path());
        let err = target.validate().unwrap_err();
        assert!(matches!(err, DeliveryError::Config(_)));
    }
}
