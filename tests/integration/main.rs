//! Integration tests for the pipeline CLI

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn pipeline() -> Command {
        cargo_bin_cmd!("dbost-pipeline")
    }

    #[test]
    fn help_displays() {
        pipeline()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("dbost build and release pipeline"));
    }

    #[test]
    fn version_displays() {
        pipeline()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dbost-pipeline"));
    }

    #[test]
    fn status_runs() {
        // Status may report missing Docker on CI hosts, but should not panic
        let _ = pipeline().arg("status").assert();
    }

    #[test]
    fn plan_lists_cross_product() {
        pipeline()
            .args(["plan", "--version-tag", "1.2.3", "--format", "plain"])
            .env_remove("VERSION")
            .assert()
            .success()
            .stdout(predicate::str::contains("ghcr.io/dbost-app/dbost:1.2.3"))
            .stdout(predicate::str::contains(
                "ghcr.io/dbost-app/dbost/migrator:latest",
            ));
    }

    #[test]
    fn plan_collapses_latest() {
        let output = pipeline()
            .args(["plan", "--version-tag", "latest", "--format", "plain"])
            .env_remove("VERSION")
            .output()
            .unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.lines().count(), 4);
    }

    #[test]
    fn plan_version_from_env() {
        pipeline()
            .args(["plan", "--format", "table"])
            .env("VERSION", "9.9.9")
            .assert()
            .success()
            .stdout(predicate::str::contains("9.9.9"))
            .stdout(predicate::str::contains("8 publish operation(s)"));
    }

    #[test]
    fn plan_json_output() {
        pipeline()
            .args(["plan", "--version-tag", "1.0.0", "--format", "json"])
            .env_remove("VERSION")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"reference\""));
    }

    #[test]
    fn run_rejects_missing_project() {
        pipeline()
            .args(["run", "--project", "/does/not/exist"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Project directory not found"));
    }

    #[test]
    fn run_requires_cargo_manifest() {
        let temp = tempfile::TempDir::new().unwrap();

        pipeline()
            .args(["run", "--project", temp.path().to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid project layout"));
    }

    #[test]
    fn explicit_config_must_exist() {
        pipeline()
            .args(["--config", "/does/not/exist.toml", "plan"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn config_overrides_registry() {
        let temp = tempfile::TempDir::new().unwrap();
        let config_path = temp.path().join("pipeline.toml");
        std::fs::write(
            &config_path,
            "[registry]\nhost = \"registry.example.com\"\nnamespace = \"acme\"\n",
        )
        .unwrap();

        pipeline()
            .args([
                "--config",
                config_path.to_str().unwrap(),
                "plan",
                "--version-tag",
                "latest",
                "--format",
                "plain",
            ])
            .env_remove("VERSION")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "registry.example.com/acme/dbost:latest",
            ));
    }

    #[test]
    fn cache_help() {
        pipeline()
            .args(["cache", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache volumes"));
    }
}
