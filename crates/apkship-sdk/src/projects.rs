//! Registered project store.
//!
//! A small JSON registry of named build targets. Each entry records a
//! project path plus default module/variant/build-type, and converts
//! to a [`BuildTarget`] for the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::gradle::wrapper_path;
use crate::types::{BuildTarget, BuildType, DeliveryError};

/// Default registry location, relative to the working directory.
pub const DEFAULT_REGISTRY_PATH: &str = "config/projects.json";

/// A registered buildable project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub build_type: BuildType,
}

impl Project {
    /// Converts the entry to a build target, letting the caller
    /// override any of the stored defaults.
    pub fn target(
        &self,
        module: Option<String>,
        variant: Option<String>,
        build_type: Option<BuildType>,
    ) -> BuildTarget {
        BuildTarget {
            path: self.path.clone(),
            module: module.or_else(|| self.module.clone()),
            variant: variant.or_else(|| self.variant.clone()),
            build_type: build_type.unwrap_or(self.build_type),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    projects: Vec<Project>,
}

/// CRUD over the JSON registry file.
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists every registered project. A missing registry file reads
    /// as empty.
    pub fn list(&self) -> Result<Vec<Project>, DeliveryError> {
        Ok(self.load()?.projects)
    }

    /// Registers a project. Rejects a duplicate name and a path
    /// without a gradle wrapper; both are configuration errors caught
    /// before anything is written.
    pub fn add(&self, project: Project) -> Result<(), DeliveryError> {
        let mut registry = self.load()?;
        if registry.projects.iter().any(|p| p.name == project.name) {
            return Err(DeliveryError::Config(format!(
                "project '{}' already exists",
                project.name
            )));
        }
        let wrapper = wrapper_path(&project.path);
        if !wrapper.exists() {
            return Err(DeliveryError::Config(format!(
                "gradle wrapper not found at {}; check the project path",
                wrapper.display()
            )));
        }
        registry.projects.push(project);
        self.save(&registry)
    }

    pub fn find(&self, name: &str) -> Result<Option<Project>, DeliveryError> {
        Ok(self.load()?.projects.into_iter().find(|p| p.name == name))
    }

    /// Removes a project by name; unknown names are a configuration
    /// error.
    pub fn delete(&self, name: &str) -> Result<(), DeliveryError> {
        let mut registry = self.load()?;
        let before = registry.projects.len();
        registry.projects.retain(|p| p.name != name);
        if registry.projects.len() == before {
            return Err(DeliveryError::Config(format!("project '{name}' not found")));
        }
        self.save(&registry)
    }

    fn load(&self) -> Result<RegistryFile, DeliveryError> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, registry: &RegistryFile) -> Result<(), DeliveryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(registry)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gradle_project(work: &TempDir, name: &str) -> PathBuf {
        let dir = work.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("gradlew"), "#!/bin/sh\n").unwrap();
        dir
    }

    fn sample(name: &str, path: PathBuf) -> Project {
        Project {
            name: name.to_string(),
            path,
            module: Some("app".to_string()),
            variant: None,
            build_type: BuildType::Debug,
        }
    }

    #[test]
    fn missing_registry_reads_empty() {
        let work = TempDir::new().unwrap();
        let store = ProjectStore::open(work.path().join("config/projects.json"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn add_find_delete_round_trip() {
        let work = TempDir::new().unwrap();
        let project_dir = gradle_project(&work, "demo");
        let store = ProjectStore::open(work.path().join("config/projects.json"));

        store.add(sample("demo", project_dir)).unwrap();
        let found = store.find("demo").unwrap().unwrap();
        assert_eq!(found.module.as_deref(), Some("app"));
        assert_eq!(store.list().unwrap().len(), 1);

        store.delete("demo").unwrap();
        assert!(store.find("demo").unwrap().is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let work = TempDir::new().unwrap();
        let project_dir = gradle_project(&work, "demo");
        let store = ProjectStore::open(work.path().join("projects.json"));

        store.add(sample("demo", project_dir.clone())).unwrap();
        let err = store.add(sample("demo", project_dir)).unwrap_err();
        assert!(matches!(err, DeliveryError::Config(_)));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn path_without_wrapper_is_rejected() {
        let work = TempDir::new().unwrap();
        let bare = work.path().join("no-gradle");
        fs::create_dir_all(&bare).unwrap();
        let store = ProjectStore::open(work.path().join("projects.json"));

        let err = store.add(sample("bare", bare)).unwrap_err();
        assert!(err.to_string().contains("gradle wrapper not found"));
    }

    #[test]
    fn deleting_unknown_project_fails() {
        let work = TempDir::new().unwrap();
        let store = ProjectStore::open(work.path().join("projects.json"));
        let err = store.delete("ghost").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn target_applies_overrides_over_stored_defaults() {
        let project = sample("demo", PathBuf::from("/work/demo"));
        let target = project.target(None, Some("Free".to_string()), Some(BuildType::Release));
        assert_eq!(target.module.as_deref(), Some("app"));
        assert_eq!(target.variant.as_deref(), Some("Free"));
        assert_eq!(target.build_type, BuildType::Release);

        let defaults = project.target(None, None, None);
        assert_eq!(defaults.build_type, BuildType::Debug);
    }
}
