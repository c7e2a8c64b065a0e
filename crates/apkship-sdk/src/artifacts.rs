//! Artifact discovery and output staging.
//!
//! After a successful gradle build the produced packages live under
//! `build/outputs/apk` (installable `.apk` files) and
//! `build/outputs/bundle` (`.aab` upload bundles). This module walks
//! those subtrees and mirrors the result into a deterministic
//! destination directory, replacing whatever a previous build left
//! there.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{BuildLog, AAB_EXTENSION, APK_EXTENSION};

/// Recursively collects the package files a build produced.
///
/// Missing output subtrees are not an error; an empty result means "no
/// new artifacts". Directory entries are visited in name order so the
/// result is deterministic for a fixed filesystem state. Read-only.
pub fn find_artifacts(project_dir: &Path, module: Option<&str>) -> Vec<PathBuf> {
    let base = match module {
        Some(module) => project_dir.join(module),
        None => project_dir.to_path_buf(),
    };

    let mut found = Vec::new();
    collect(&base.join("build").join("outputs").join("apk"), APK_EXTENSION, &mut found);
    collect(&base.join("build").join("outputs").join("bundle"), AAB_EXTENSION, &mut found);
    found
}

fn collect(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, extension, out);
        } else if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            out.push(path);
        }
    }
}

/// Stages the discovered artifacts into `dest`, returning how many
/// files were copied.
///
/// Guarantees `dest` contains exactly the current artifact set
/// afterward: an existing destination is emptied first so stale
/// packages from earlier builds cannot be picked up by a later publish
/// step; a missing destination is created with parents. A copy failure
/// for one artifact is logged and skipped, not fatal to the others.
///
/// Zero artifacts is a no-op: the destination is neither created nor
/// altered.
pub fn stage_artifacts(artifacts: &[PathBuf], dest: &Path, log: &dyn BuildLog) -> usize {
    if artifacts.is_empty() {
        return 0;
    }

    if dest.exists() {
        clean_directory(dest, log);
    } else if let Err(err) = fs::create_dir_all(dest) {
        log.line(&format!("failed to create output directory {}: {err}", dest.display()));
        return 0;
    }

    let mut copied = 0;
    for artifact in artifacts {
        let name = match artifact.file_name() {
            Some(name) => name,
            None => continue,
        };
        let target = dest.join(name);
        match fs::copy(artifact, &target) {
            Ok(_) => {
                copied += 1;
                log.line(&format!("staged {} -> {}", artifact.display(), target.display()));
            }
            Err(err) => {
                log.line(&format!("failed to copy {}: {err}", artifact.display()));
            }
        }
    }
    copied
}

/// Removes every entry inside `dir` (files and subdirectories),
/// leaving the directory itself in place. Removal failures are logged
/// and skipped.
fn clean_directory(dir: &Path, log: &dyn BuildLog) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log.line(&format!("failed to read output directory {}: {err}", dir.display()));
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(err) = result {
            log.line(&format!("failed to remove {}: {err}", path.display()));
        }
    }
}
