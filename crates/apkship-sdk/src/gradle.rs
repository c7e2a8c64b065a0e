//! Gradle build invocation.
//!
//! The invoker derives the `assemble` task name and the staged output
//! location from a [`BuildTarget`], launches the project's gradle
//! wrapper as a child process, and streams its output live through the
//! injected [`BuildLog`] sink. A build can run for minutes; callers
//! observe progress line by line rather than only a final result.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::artifacts::{find_artifacts, stage_artifacts};
use crate::types::{BuildLog, BuildResult, BuildTarget, ConsoleLog, DeliveryError};

/// Resolves the platform-appropriate wrapper script inside a project.
pub fn wrapper_path(project_dir: &Path) -> PathBuf {
    let name = if cfg!(windows) { "gradlew.bat" } else { "gradlew" };
    project_dir.join(name)
}

/// Derives the gradle task name for a target.
///
/// `assemble<Variant><BuildType>`, with the variant concatenated
/// directly onto the build type exactly as written (no case
/// transformation), namespaced by the module when one is set.
pub fn gradle_task(target: &BuildTarget) -> String {
    let qualifier = match &target.variant {
        Some(variant) => format!("{variant}{}", target.build_type.as_str()),
        None => target.build_type.as_str().to_string(),
    };
    match &target.module {
        Some(module) => format!(":{module}:assemble{qualifier}"),
        None => format!("assemble{qualifier}"),
    }
}

/// Derives the staged output location for a target:
/// `path[/module][/variant]/<BuildType>`.
///
/// Recomputed from the target on every invocation, never persisted.
pub fn output_location(target: &BuildTarget) -> PathBuf {
    let mut dir = target.path.clone();
    if let Some(module) = &target.module {
        dir.push(module);
    }
    if let Some(variant) = &target.variant {
        dir.push(variant);
    }
    dir.push(target.build_type.as_str());
    dir
}

/// Runs a gradle build for one target and stages its artifacts.
pub struct GradleInvoker {
    target: BuildTarget,
    extra_args: Vec<String>,
    log: Arc<dyn BuildLog>,
}

impl GradleInvoker {
    pub fn new(target: BuildTarget) -> Self {
        Self {
            target,
            extra_args: Vec::new(),
            log: Arc::new(ConsoleLog),
        }
    }

    /// Passthrough arguments appended after the task name.
    pub fn extra_args(mut self, args: &[String]) -> Self {
        self.extra_args = args.to_vec();
        self
    }

    pub fn log(mut self, log: Arc<dyn BuildLog>) -> Self {
        self.log = log;
        self
    }

    /// Launches the wrapper and blocks until the child terminates.
    ///
    /// Exit code 0 triggers artifact discovery and staging into
    /// [`output_location`]; any other exit (including a killed child,
    /// reported as 1) skips both. Spawn failure fails the operation
    /// immediately with [`DeliveryError::Build`].
    pub fn run(&self) -> Result<BuildResult, DeliveryError> {
        let wrapper = wrapper_path(&self.target.path);
        if !wrapper.exists() {
            return Err(DeliveryError::Build(format!(
                "gradle wrapper not found at {}",
                wrapper.display()
            )));
        }

        let task = gradle_task(&self.target);
        self.log.line(&format!("running {} {}", wrapper.display(), task));

        let mut child = Command::new(&wrapper)
            .arg(&task)
            .args(&self.extra_args)
            .current_dir(&self.target.path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                DeliveryError::Build(format!("failed to launch {}: {err}", wrapper.display()))
            })?;

        let captured = Arc::new(Mutex::new(String::new()));
        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, self.log.clone(), captured.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, self.log.clone(), captured.clone()));
        }

        let status = child
            .wait()
            .map_err(|err| DeliveryError::Build(format!("failed to wait for gradle: {err}")))?;
        for handle in pumps {
            let _ = handle.join();
        }

        // A child killed by a signal carries no exit code; treat as failure.
        let exit_code = status.code().unwrap_or(1);

        if exit_code == 0 {
            let artifacts = find_artifacts(&self.target.path, self.target.module.as_deref());
            self.log.line(&format!("found {} artifact(s)", artifacts.len()));
            if artifacts.is_empty() {
                self.log.line("no packages produced; nothing to stage");
            } else {
                let dest = output_location(&self.target);
                self.log.line(&format!("output directory: {}", dest.display()));
                stage_artifacts(&artifacts, &dest, &*self.log);
            }
        }

        let output = captured.lock().unwrap_or_else(|err| err.into_inner()).clone();
        Ok(BuildResult { exit_code, output })
    }
}

// Reads raw bytes rather than `lines()`: gradle output is not
// guaranteed to be UTF-8, and the pump must keep draining the pipe to
// the end regardless, or a chatty child blocks on a full pipe while
// `run` waits on it.
fn pump(
    reader: impl Read + Send + 'static,
    log: Arc<dyn BuildLog>,
    captured: Arc<Mutex<String>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut bytes = Vec::new();
        loop {
            bytes.clear();
            match reader.read_until(b'\n', &mut bytes) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = String::from_utf8_lossy(&bytes);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
            log.line(line);
            let mut buffer = captured.lock().unwrap_or_else(|err| err.into_inner());
            buffer.push_str(line);
            buffer.push('\n');
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuildType;

    #[test]
    fn task_name_without_variant_or_module() {
        let target = BuildTarget::new("/work/app");
        assert_eq!(gradle_task(&target), "assembleDebug");
    }

    #[test]
    fn task_name_concatenates_variant_verbatim() {
        let target = BuildTarget::new("/work/app")
            .variant("Ver-Dev")
            .build_type(BuildType::Release);
        assert_eq!(gradle_task(&target), "assembleVer-DevRelease");
    }

    #[test]
    fn task_name_namespaced_by_module() {
        let target = BuildTarget::new("/work/app")
            .module("app")
            .variant("Free")
            .build_type(BuildType::Debug);
        assert_eq!(gradle_task(&target), ":app:assembleFreeDebug");
    }

    #[test]
    fn output_location_layers_module_variant_build_type() {
        let target = BuildTarget::new("/work/app")
            .module("app")
            .variant("Free")
            .build_type(BuildType::Release);
        assert_eq!(output_location(&target), PathBuf::from("/work/app/app/Free/Release"));

        let bare = BuildTarget::new("/work/app");
        assert_eq!(output_location(&bare), PathBuf::from("/work/app/Debug"));

        let no_variant = BuildTarget::new("/work/app").module("app");
        assert_eq!(output_location(&no_variant), PathBuf::from("/work/app/app/Debug"));
    }

    #[test]
    fn missing_wrapper_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = GradleInvoker::new(BuildTarget::new(dir.path()));
        let err = invoker.run().unwrap_err();
        assert!(matches!(err, DeliveryError::Build(_)));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::Mutex;
        use tempfile::TempDir;

        #[derive(Default)]
        struct MemoryLog(Mutex<Vec<String>>);

        impl BuildLog for MemoryLog {
            fn line(&self, line: &str) {
                self.0.lock().unwrap().push(line.to_string());
            }
        }

        fn write_wrapper(project: &Path, script: &str) {
            let path = project.join("gradlew");
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        #[test]
        fn successful_build_streams_output_and_stages() {
            let project = TempDir::new().unwrap();
            write_wrapper(
                project.path(),
                "#!/bin/sh\n\
                 echo \"task=$1 extra=$2\"\n\
                 mkdir -p build/outputs/apk/debug\n\
                 printf apk > build/outputs/apk/debug/app-debug.apk\n\
                 exit 0\n",
            );

            let log = Arc::new(MemoryLog::default());
            let target = BuildTarget::new(project.path());
            let result = GradleInvoker::new(target.clone())
                .extra_args(&["--stacktrace".to_string()])
                .log(log.clone())
                .run()
                .unwrap();

            assert_eq!(result.exit_code, 0);
            assert!(result.output.contains("task=assembleDebug extra=--stacktrace"));
            assert!(output_location(&target).join("app-debug.apk").exists());

            let lines = log.0.lock().unwrap();
            assert!(lines.iter().any(|l| l.contains("task=assembleDebug")));
        }

        #[test]
        fn failed_build_skips_staging() {
            let project = TempDir::new().unwrap();
            write_wrapper(
                project.path(),
                "#!/bin/sh\n\
                 mkdir -p build/outputs/apk/debug\n\
                 printf apk > build/outputs/apk/debug/app-debug.apk\n\
                 echo boom >&2\n\
                 exit 3\n",
            );

            let target = BuildTarget::new(project.path());
            let result = GradleInvoker::new(target.clone())
                .log(Arc::new(MemoryLog::default()))
                .run()
                .unwrap();

            assert_eq!(result.exit_code, 3);
            assert!(result.output.contains("boom"));
            // Even though a package exists on disk, a failed build must
            // not reach the locator or stager.
            assert!(!output_location(&target).exists());
        }

        #[test]
        fn non_utf8_output_does_not_stop_the_stream() {
            let project = TempDir::new().unwrap();
            // An invalid-UTF-8 line in the middle of the output; every
            // line around it must still reach the sink and the capture.
            write_wrapper(
                project.path(),
                "#!/bin/sh\n\
                 echo before\n\
                 printf '\\377\\376\\n'\n\
                 echo after\n\
                 exit 0\n",
            );

            let log = Arc::new(MemoryLog::default());
            let result = GradleInvoker::new(BuildTarget::new(project.path()))
                .log(log.clone())
                .run()
                .unwrap();

            assert_eq!(result.exit_code, 0);
            assert!(result.output.contains("before"));
            assert!(result.output.contains("after"));
            let lines = log.0.lock().unwrap();
            assert!(lines.iter().any(|l| l == "after"));
        }

        #[test]
        fn wrapper_runs_with_project_as_working_directory() {
            let project = TempDir::new().unwrap();
            write_wrapper(project.path(), "#!/bin/sh\npwd\nexit 0\n");

            let canonical = project.path().canonicalize().unwrap();
            let result = GradleInvoker::new(BuildTarget::new(project.path()))
                .log(Arc::new(MemoryLog::default()))
                .run()
                .unwrap();
            assert!(result.output.contains(canonical.to_str().unwrap()));
        }
    }
}
