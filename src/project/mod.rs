//! Workspace projects and the project registry
//!
//! A [`ProjectSet`] is loaded once per run from the workspace patterns in
//! the configuration and stays immutable afterwards.

pub mod manifest;

pub use manifest::{ProjectManifest, BOOTSTRAP_SCRIPT, MANIFEST_FILE};

use crate::error::{WavestrapError, WavestrapResult};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The per-project build action run after install and link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStep {
    /// Explicit build targets, run in order
    Targets(Vec<String>),
    /// The `osd:bootstrap` script
    Script,
}

/// A single workspace project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Unique name within the workspace
    pub name: String,

    /// Project root directory
    pub root: PathBuf,

    /// Names of workspace projects this project depends on
    pub internal_dependencies: Vec<String>,

    /// Registry dependencies (`name -> range`)
    pub external_dependencies: BTreeMap<String, String>,

    /// Groups other projects and has no installable artifacts of its own
    pub workspace_aggregator: bool,

    /// Declares the `osd:bootstrap` script
    pub bootstrap_script: bool,

    /// Explicit build targets; take precedence over the script
    pub build_targets: Vec<String>,

    /// Executables exposed to dependents, `(command, relative path)`
    pub executables: Vec<(String, String)>,
}

impl Project {
    /// Create a bare project with no dependencies and no bootstrap step
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            internal_dependencies: vec![],
            external_dependencies: BTreeMap::new(),
            workspace_aggregator: false,
            bootstrap_script: false,
            build_targets: vec![],
            executables: vec![],
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.internal_dependencies.push(name.into());
        self
    }

    pub fn with_external(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.external_dependencies.insert(name.into(), range.into());
        self
    }

    pub fn with_build_targets(mut self, targets: &[&str]) -> Self {
        self.build_targets = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_bootstrap_script(mut self) -> Self {
        self.bootstrap_script = true;
        self
    }

    pub fn aggregator(mut self) -> Self {
        self.workspace_aggregator = true;
        self
    }

    /// The bootstrap step to run, if the project declares one
    ///
    /// Build targets win over the script when both are declared.
    pub fn bootstrap_step(&self) -> Option<BootstrapStep> {
        if !self.build_targets.is_empty() {
            Some(BootstrapStep::Targets(self.build_targets.clone()))
        } else if self.bootstrap_script {
            Some(BootstrapStep::Script)
        } else {
            None
        }
    }

    pub fn has_external_dependencies(&self) -> bool {
        !self.external_dependencies.is_empty()
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Ordered collection of workspace projects
#[derive(Debug, Clone, Default)]
pub struct ProjectSet {
    projects: Vec<Arc<Project>>,
    index: HashMap<String, usize>,
}

impl ProjectSet {
    /// Build a set from already constructed projects, keeping their order
    pub fn new(projects: Vec<Project>) -> WavestrapResult<Self> {
        let mut set = Self::default();
        for project in projects {
            if let Some(&existing) = set.index.get(&project.name) {
                return Err(WavestrapError::DuplicateProject {
                    name: project.name.clone(),
                    first: set.projects[existing].root.clone(),
                    second: project.root,
                });
            }
            set.index.insert(project.name.clone(), set.projects.len());
            set.projects.push(Arc::new(project));
        }
        Ok(set)
    }

    /// Build a set from parsed manifests
    ///
    /// Declared dependencies that name another project in the set become
    /// internal dependencies; everything else is external.
    pub fn from_manifests(entries: Vec<(PathBuf, ProjectManifest)>) -> WavestrapResult<Self> {
        let names: std::collections::HashSet<&str> =
            entries.iter().map(|(_, m)| m.name.as_str()).collect();

        let projects = entries
            .iter()
            .map(|(root, manifest)| {
                let mut project = Project::new(manifest.name.clone(), root.clone());
                for (dep, range) in manifest.all_dependencies() {
                    if names.contains(dep.as_str()) && dep != manifest.name {
                        project.internal_dependencies.push(dep);
                    } else {
                        project.external_dependencies.insert(dep, range);
                    }
                }
                project.workspace_aggregator = manifest.is_workspace_aggregator();
                project.bootstrap_script = manifest.has_bootstrap_script();
                project.build_targets = manifest.osd.build_targets.clone();
                project.executables = manifest.executables();
                project
            })
            .collect();

        Self::new(projects)
    }

    /// Discover and load every project matched by `patterns` under `root`
    ///
    /// A pattern is either a directory (`"."`, `"tools/cli"`) or a directory
    /// followed by `/*`, which matches each immediate subdirectory.
    pub async fn load(root: &Path, patterns: &[String]) -> WavestrapResult<Self> {
        let mut dirs: Vec<PathBuf> = Vec::new();

        for pattern in patterns {
            for dir in expand_pattern(root, pattern).await? {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }

        let mut entries = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                debug!("Skipping {}: no {}", dir.display(), MANIFEST_FILE);
                continue;
            }
            let manifest = ProjectManifest::from_file(&manifest_path).await?;
            entries.push((dir, manifest));
        }

        debug!("Loaded {} projects", entries.len());
        Self::from_manifests(entries)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Project>> {
        self.index.get(name).map(|&i| &self.projects[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.projects.iter()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

async fn expand_pattern(root: &Path, pattern: &str) -> WavestrapResult<Vec<PathBuf>> {
    let Some(prefix) = pattern.strip_suffix("/*") else {
        let dir = root.join(pattern);
        if !dir.is_dir() {
            warn!("Workspace pattern {} matches no directory", pattern);
            return Ok(vec![]);
        }
        return Ok(vec![normalize(dir)]);
    };

    let parent = root.join(prefix);
    if !parent.is_dir() {
        warn!("Workspace pattern {} matches no directory", pattern);
        return Ok(vec![]);
    }

    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(&parent)
        .await
        .map_err(|e| WavestrapError::io(format!("reading directory {}", parent.display()), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| WavestrapError::io("reading directory entry", e))?
    {
        let path = entry.path();
        if path.is_dir() {
            found.push(normalize(path));
        }
    }

    // read_dir order is platform dependent
    found.sort();
    Ok(found)
}

/// Drop `.` components so `root/.` and `root` compare equal
fn normalize(path: PathBuf) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, json: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), json).unwrap();
    }

    #[test]
    fn targets_take_precedence_over_script() {
        let project = Project::new("p", "/ws/p")
            .with_bootstrap_script()
            .with_build_targets(&["build"]);
        assert_eq!(
            project.bootstrap_step(),
            Some(BootstrapStep::Targets(vec!["build".to_string()]))
        );

        let script_only = Project::new("s", "/ws/s").with_bootstrap_script();
        assert_eq!(script_only.bootstrap_step(), Some(BootstrapStep::Script));

        assert_eq!(Project::new("n", "/ws/n").bootstrap_step(), None);
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = ProjectSet::new(vec![Project::new("a", "/x/a"), Project::new("a", "/y/a")]);
        assert!(matches!(result, Err(WavestrapError::DuplicateProject { .. })));
    }

    #[test]
    fn internal_and_external_dependencies_split() {
        let core: ProjectManifest =
            serde_json::from_str(r#"{ "name": "core", "dependencies": { "lodash": "^4" } }"#)
                .unwrap();
        let plugin: ProjectManifest = serde_json::from_str(
            r#"{ "name": "plugin", "dependencies": { "core": "link:../core", "react": "^18" } }"#,
        )
        .unwrap();

        let set = ProjectSet::from_manifests(vec![
            (PathBuf::from("/ws/core"), core),
            (PathBuf::from("/ws/plugin"), plugin),
        ])
        .unwrap();

        let plugin = set.get("plugin").unwrap();
        assert_eq!(plugin.internal_dependencies, vec!["core"]);
        assert_eq!(plugin.external_dependencies.len(), 1);
        assert!(plugin.external_dependencies.contains_key("react"));
        assert!(set.get("core").unwrap().internal_dependencies.is_empty());
    }

    #[tokio::test]
    async fn load_expands_patterns_in_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_manifest(root, r#"{ "name": "root", "workspaces": ["packages/*"] }"#);
        write_manifest(&root.join("packages/b"), r#"{ "name": "b" }"#);
        write_manifest(&root.join("packages/a"), r#"{ "name": "a" }"#);
        fs::create_dir_all(root.join("packages/empty")).unwrap();

        let set = ProjectSet::load(root, &[".".to_string(), "packages/*".to_string()])
            .await
            .unwrap();

        let names: Vec<&str> = set.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "b"]);
        assert!(set.get("root").unwrap().workspace_aggregator);
    }

    #[tokio::test]
    async fn load_ignores_missing_patterns() {
        let temp = TempDir::new().unwrap();
        let set = ProjectSet::load(temp.path(), &["plugins/*".to_string()])
            .await
            .unwrap();
        assert!(set.is_empty());
    }
}
