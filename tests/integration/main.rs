//! Integration tests for sparkle-build

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn sparkle_build() -> Command {
        let mut cmd = cargo_bin_cmd!("sparkle-build");
        cmd.env_remove("SPARKLE_BUILD_CONFIG");
        cmd
    }

    #[test]
    fn help_displays() {
        sparkle_build()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--framework"))
            .stdout(predicate::str::contains("--extra-toolchain-args"));
    }

    #[test]
    fn version_displays() {
        sparkle_build()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("sparkle-build"));
    }

    #[test]
    fn unknown_framework_rejected() {
        sparkle_build()
            .args(["--framework", "web"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value 'web'"));
    }

    #[test]
    fn generate_and_clangd_conflict() {
        sparkle_build()
            .args(["--generate-only", "--clangd"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }

    #[test]
    fn invalid_project_config_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("sparkle-build.toml"), "[project\ntarget = 1").unwrap();

        sparkle_build()
            .arg("--root")
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn missing_explicit_config_reported() {
        let temp = TempDir::new().unwrap();

        sparkle_build()
            .arg("--root")
            .arg(temp.path())
            .arg("--config-file")
            .arg(temp.path().join("absent.toml"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("absent.toml"));
    }

    #[test]
    fn missing_root_reported() {
        sparkle_build()
            .args(["--root", "/definitely/not/a/project"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("resolving project root"));
    }
}
