//! Process based invoker
//!
//! Runs the configured package manager commands inside project roots and
//! symlinks dependency executables into `node_modules/.bin`.

use crate::config::schema::CommandsConfig;
use crate::error::{WavestrapError, WavestrapResult};
use crate::invoke::{error_output, BuildRequest, InstallOptions, ProjectInvoker};
use crate::project::{BootstrapStep, Project, BOOTSTRAP_SCRIPT};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Invoker running external commands through `tokio::process`
#[derive(Debug, Clone)]
pub struct ShellInvoker {
    install: Vec<String>,
    run: Vec<String>,
}

impl ShellInvoker {
    pub fn new(commands: &CommandsConfig) -> Self {
        Self {
            install: commands.install.clone(),
            run: commands.run.clone(),
        }
    }

    /// Execute `argv` in `dir`, failing with the output tail on non-zero exit
    async fn exec(&self, argv: &[String], dir: &Path) -> WavestrapResult<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| WavestrapError::User("configured command is empty".to_string()))?;
        let command_line = argv.join(" ");
        debug!("Executing in {}: {}", dir.display(), command_line);

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| WavestrapError::command_failed(&command_line, e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(WavestrapError::command_exec(
                format!("{} ({})", command_line, output.status),
                error_output(&stdout, &stderr),
            ))
        }
    }

    async fn run_script(&self, project: &Project, script: &str, source_maps: bool) -> WavestrapResult<()> {
        let mut argv = self.run.clone();
        argv.push(script.to_string());
        if source_maps {
            argv.push("--source-maps".to_string());
        }
        self.exec(&argv, &project.root).await
    }
}

#[async_trait]
impl ProjectInvoker for ShellInvoker {
    async fn install(&self, project: &Project, options: InstallOptions) -> WavestrapResult<()> {
        let mut argv = self.install.clone();
        if options.frozen_lockfile {
            argv.push("--frozen-lockfile".to_string());
        }
        if options.prefer_offline {
            argv.push("--prefer-offline".to_string());
        }
        info!("Installing dependencies for {}", project.name);
        self.exec(&argv, &project.root).await
    }

    async fn link(&self, project: &Project, dependencies: &[Arc<Project>]) -> WavestrapResult<()> {
        let bin_dir = project.root.join("node_modules").join(".bin");

        for dependency in dependencies {
            for (command, relative) in &dependency.executables {
                let source = dependency.root.join(relative);
                if !source.is_file() {
                    warn!(
                        "{} declares executable {} but {} does not exist",
                        dependency.name,
                        command,
                        source.display()
                    );
                    continue;
                }

                tokio::fs::create_dir_all(&bin_dir).await.map_err(|e| {
                    WavestrapError::io(format!("creating {}", bin_dir.display()), e)
                })?;
                let target = bin_dir.join(command);
                link_executable(&source, &target).await?;
                debug!("Linked {} -> {}", target.display(), source.display());
            }
        }
        Ok(())
    }

    async fn build(&self, project: &Project, request: &BuildRequest) -> WavestrapResult<()> {
        match &request.step {
            BootstrapStep::Targets(targets) => {
                for target in targets {
                    info!("Building {} target {}", project.name, target);
                    self.run_script(project, target, request.source_maps).await?;
                }
                Ok(())
            }
            BootstrapStep::Script => {
                info!("Running {} for {}", BOOTSTRAP_SCRIPT, project.name);
                self.run_script(project, BOOTSTRAP_SCRIPT, request.source_maps)
                    .await
            }
        }
    }
}

#[cfg(unix)]
async fn link_executable(source: &Path, target: &Path) -> WavestrapResult<()> {
    use std::os::unix::fs::PermissionsExt;

    if tokio::fs::symlink_metadata(target).await.is_ok() {
        tokio::fs::remove_file(target)
            .await
            .map_err(|e| WavestrapError::io(format!("replacing {}", target.display()), e))?;
    }

    tokio::fs::symlink(source, target).await.map_err(|e| {
        WavestrapError::io(
            format!("linking {} to {}", target.display(), source.display()),
            e,
        )
    })?;

    tokio::fs::set_permissions(source, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| WavestrapError::io(format!("marking {} executable", source.display()), e))
}

#[cfg(not(unix))]
async fn link_executable(source: &Path, target: &Path) -> WavestrapResult<()> {
    warn!(
        "Executable links are only supported on unix, skipping {} -> {}",
        target.display(),
        source.display()
    );
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn invoker(install: &[&str], run: &[&str]) -> ShellInvoker {
        ShellInvoker::new(&CommandsConfig {
            install: install.iter().map(|s| s.to_string()).collect(),
            run: run.iter().map(|s| s.to_string()).collect(),
            ..CommandsConfig::default()
        })
    }

    // `sh -c <script> <arg0> <arg1>...` records the appended arguments
    const RECORD: &[&str] = &["sh", "-c", "echo \"$0 $*\" >> calls.txt"];

    #[tokio::test]
    async fn install_appends_flags() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("core", dir.path());
        let options = InstallOptions {
            frozen_lockfile: true,
            prefer_offline: true,
        };

        invoker(RECORD, &["true"]).install(&project, options).await.unwrap();

        let calls = std::fs::read_to_string(dir.path().join("calls.txt")).unwrap();
        assert_eq!(calls.trim(), "--frozen-lockfile --prefer-offline");
    }

    #[tokio::test]
    async fn build_runs_targets_in_order() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("core", dir.path());
        let request = BuildRequest {
            step: BootstrapStep::Targets(vec!["build:types".to_string(), "build:web".to_string()]),
            source_maps: true,
        };

        invoker(&["true"], RECORD).build(&project, &request).await.unwrap();

        let calls = std::fs::read_to_string(dir.path().join("calls.txt")).unwrap();
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines, vec!["build:types --source-maps", "build:web --source-maps"]);
    }

    #[tokio::test]
    async fn build_runs_bootstrap_script() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("core", dir.path());
        let request = BuildRequest {
            step: BootstrapStep::Script,
            source_maps: false,
        };

        invoker(&["true"], RECORD).build(&project, &request).await.unwrap();

        let calls = std::fs::read_to_string(dir.path().join("calls.txt")).unwrap();
        assert_eq!(calls.trim(), "osd:bootstrap");
    }

    #[tokio::test]
    async fn failing_command_reports_output() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("core", dir.path());
        let failing = invoker(&["sh", "-c", "echo 'cannot resolve left-pad' >&2; exit 3"], &["true"]);

        let err = failing
            .install(&project, InstallOptions::default())
            .await
            .unwrap_err();

        match err {
            WavestrapError::CommandExecution { output, .. } => {
                assert!(output.contains("cannot resolve left-pad"));
            }
            other => panic!("expected command execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_command_rejected() {
        let dir = TempDir::new().unwrap();
        let project = Project::new("core", dir.path());
        let result = invoker(&[], &["true"])
            .install(&project, InstallOptions::default())
            .await;
        assert!(matches!(result, Err(WavestrapError::User(_))));
    }

    #[tokio::test]
    async fn link_symlinks_dependency_executables() {
        let dir = TempDir::new().unwrap();
        let tools_root = dir.path().join("tools");
        std::fs::create_dir_all(tools_root.join("bin")).unwrap();
        std::fs::write(tools_root.join("bin/tool.js"), "#!/usr/bin/env node").unwrap();
        let mut tools = Project::new("tools", &tools_root);
        tools.executables = vec![
            ("tool".to_string(), "bin/tool.js".to_string()),
            ("ghost".to_string(), "bin/missing.js".to_string()),
        ];

        let app_root = dir.path().join("app");
        std::fs::create_dir_all(&app_root).unwrap();
        let app = Project::new("app", &app_root).depends_on("tools");

        let shell = invoker(&["true"], &["true"]);
        let deps = vec![Arc::new(tools)];
        shell.link(&app, &deps).await.unwrap();
        // Relinking replaces the existing link
        shell.link(&app, &deps).await.unwrap();

        let link = app_root.join("node_modules/.bin/tool");
        assert_eq!(std::fs::read_link(&link).unwrap(), tools_root.join("bin/tool.js"));
        assert!(!app_root.join("node_modules/.bin/ghost").exists());
    }
}
