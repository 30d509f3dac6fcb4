//! Integration tests for Wavestrap

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user-wide config
    fn wavestrap(workspace: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("wavestrap");
        cmd.arg("--config")
            .arg(workspace.join("no-global-config.toml"))
            .arg("--workspace")
            .arg(workspace);
        cmd
    }

    fn write_manifest(dir: &Path, manifest: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), manifest).unwrap();
    }

    fn simple_workspace() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_manifest(root, r#"{ "name": "root", "workspaces": ["packages/*"] }"#);
        write_manifest(
            &root.join("packages/core"),
            r#"{ "name": "core", "scripts": { "osd:bootstrap": "tsc" } }"#,
        );
        write_manifest(
            &root.join("packages/plugin"),
            r#"{ "name": "plugin", "dependencies": { "core": "1.0.0" } }"#,
        );
        temp
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("wavestrap")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("dependency-aware workspace bootstrap"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("wavestrap")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("wavestrap"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        wavestrap(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no-global-config.toml"));
    }

    #[test]
    fn config_show_reflects_workspace_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("wavestrap.toml"),
            "[bootstrap]\nsingle_version = \"lodash\"\n",
        )
        .unwrap();

        wavestrap(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[bootstrap]"))
            .stdout(predicate::str::contains("single_version = \"lodash\""));
    }

    #[test]
    fn projects_listed_in_batch_order() {
        let temp = simple_workspace();
        wavestrap(temp.path())
            .args(["projects", "--format", "plain"])
            .assert()
            .success()
            .stdout("root\ncore\nplugin\n");
    }

    #[test]
    fn projects_json_has_batches() {
        let temp = simple_workspace();
        let output = wavestrap(temp.path())
            .args(["projects", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let plugin = rows
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == "plugin")
            .unwrap();
        assert_eq!(plugin["batch"], 2);
        assert_eq!(plugin["dependencies"][0], "core");
    }

    #[test]
    fn cycle_is_reported_with_hint() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_manifest(&root.join("packages/a"), r#"{ "name": "a", "dependencies": { "b": "*" } }"#);
        write_manifest(&root.join("packages/b"), r#"{ "name": "b", "dependencies": { "a": "*" } }"#);

        wavestrap(root)
            .args(["projects"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Dependency cycle detected"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn invalid_manifest_fails() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "{ not json");

        wavestrap(temp.path())
            .args(["projects"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid manifest"));
    }

    #[test]
    fn missing_workspace_rejected() {
        let temp = TempDir::new().unwrap();
        wavestrap(&temp.path().join("nope"))
            .args(["projects"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("is not a directory"));
    }

    #[test]
    fn cache_clear_without_records() {
        let temp = simple_workspace();
        wavestrap(temp.path())
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache records to clear"));
    }

    #[cfg(unix)]
    #[test]
    fn bootstrap_caches_between_runs() {
        let temp = simple_workspace();
        fs::write(
            temp.path().join("wavestrap.toml"),
            "[commands]\nrun = [\"sh\", \"-c\", \"echo run >> ../../runs.txt\"]\n",
        )
        .unwrap();

        wavestrap(temp.path())
            .arg("bootstrap")
            .assert()
            .success()
            .stdout(predicate::str::contains("built"))
            .stdout(predicate::str::contains("Bootstrap complete"));

        wavestrap(temp.path())
            .arg("bootstrap")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached"));

        let runs = fs::read_to_string(temp.path().join("runs.txt")).unwrap();
        assert_eq!(runs.lines().count(), 1);

        wavestrap(temp.path())
            .args(["cache", "status", "--format", "plain"])
            .assert()
            .success()
            .stdout("core valid\n");

        wavestrap(temp.path())
            .args(["bootstrap", "--no-cache"])
            .assert()
            .success();
        let runs = fs::read_to_string(temp.path().join("runs.txt")).unwrap();
        assert_eq!(runs.lines().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn failing_step_exits_nonzero() {
        let temp = simple_workspace();
        fs::write(
            temp.path().join("wavestrap.toml"),
            "[commands]\nrun = [\"sh\", \"-c\", \"exit 7\"]\n",
        )
        .unwrap();

        wavestrap(temp.path())
            .arg("bootstrap")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Build failed for project core"));
    }
}
