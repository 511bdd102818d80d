//! Integration tests for classweave

mod pipeline;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use classweave::flags::WriterFlags;
    use classweave::unit::{markers, Annotation, ClassHeader, ClassNode, Code, Insn, Method};
    use classweave::unit::{UnitCodec, WireCodec};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn classweave() -> Command {
        cargo_bin_cmd!("classweave")
    }

    /// Command isolated to a temp config, cache and state
    fn isolated(temp: &TempDir) -> Command {
        let config = temp.path().join("config.toml");
        if !config.exists() {
            let cache_dir = temp.path().join("cache");
            std::fs::write(
                &config,
                format!("[cache]\ndir = {:?}\n", cache_dir.display().to_string()),
            )
            .unwrap();
        }
        let mut cmd = classweave();
        cmd.env("CLASSWEAVE_CONFIG", config)
            .env("XDG_STATE_HOME", temp.path().join("state"))
            .env("XDG_DATA_HOME", temp.path().join("data"));
        cmd
    }

    fn write_unit(dir: &Path, internal: &str, privileged: bool) -> PathBuf {
        let mut node = ClassNode::new(ClassHeader::new(internal));
        if privileged {
            node.header
                .annotations
                .push(Annotation::marker(markers::FORCE_PRIVILEGED, false));
        }
        node.body.methods.push(Method::new(
            "run",
            "()V",
            Some(Code::new(vec![Insn::ConstInt(7), Insn::Pop, Insn::Return(None)])),
        ));
        let path = dir.join(format!("{}.cwu", internal.replace('/', "_")));
        std::fs::write(&path, WireCodec.write(&node, WriterFlags::empty()).unwrap()).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        classweave()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("class-unit transformation pipeline"));
    }

    #[test]
    fn version_displays() {
        classweave()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("classweave"));
    }

    #[test]
    fn config_path_honours_env() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                temp.path().join("config.toml").display().to_string(),
            ));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[pipeline]"));
    }

    #[test]
    fn config_init_respects_force() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        isolated(&temp)
            .args(["config", "init", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
    }

    #[test]
    fn invalid_config_shows_hint() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[cache\n").unwrap();
        isolated(&temp)
            .args(["cache", "info"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("config init --force"));
    }

    #[test]
    fn transform_missing_input() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["transform", "nope.cwu", "--name", "pkg.A"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn transform_rejects_foreign_bytes() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("junk.bin");
        std::fs::write(&input, b"\xca\xfe\xba\xbe").unwrap();
        isolated(&temp)
            .arg("transform")
            .arg(&input)
            .args(["--name", "pkg.A"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("bad magic"));
    }

    #[test]
    fn transform_writes_output_and_fills_cache() {
        let temp = TempDir::new().unwrap();
        let input = write_unit(temp.path(), "pkg/A", false);
        let output = temp.path().join("out.cwu");

        isolated(&temp)
            .arg("transform")
            .arg(&input)
            .args(["--name", "pkg.A", "-o"])
            .arg(&output)
            .assert()
            .success()
            .stdout(predicate::str::contains("unchanged"));

        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());

        isolated(&temp)
            .args(["cache", "info"])
            .assert()
            .success()
            .stdout(predicate::str::contains("entries: 1"))
            .stdout(predicate::str::contains("classweave:disk"));

        isolated(&temp)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 cache entries"));

        isolated(&temp)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already empty"));
    }

    #[test]
    fn transform_diverts_privileged_unit() {
        let temp = TempDir::new().unwrap();
        let input = write_unit(temp.path(), "pkg/Hot", true);
        let privileged = temp.path().join("privileged");

        isolated(&temp)
            .arg("transform")
            .arg(&input)
            .args(["--name", "pkg.Hot", "--privileged-dir"])
            .arg(&privileged)
            .assert()
            .success()
            .stdout(predicate::str::contains("privileged domain"));

        let defined = std::fs::read(privileged.join("pkg/Hot.class")).unwrap();
        let header = WireCodec.read_header(&defined).unwrap();
        assert!(header.annotations.is_empty());
    }

    #[test]
    fn inspect_lists_members() {
        let temp = TempDir::new().unwrap();
        let input = write_unit(temp.path(), "pkg/A", true);

        isolated(&temp)
            .arg("inspect")
            .arg(&input)
            .arg("--code")
            .assert()
            .success()
            .stdout(predicate::str::contains("pkg.A"))
            .stdout(predicate::str::contains("ForcePrivileged"))
            .stdout(predicate::str::contains("ldc 7"));
    }

    #[test]
    fn inspect_json() {
        let temp = TempDir::new().unwrap();
        let input = write_unit(temp.path(), "pkg/A", false);

        let out = isolated(&temp)
            .arg("inspect")
            .arg(&input)
            .arg("--json")
            .output()
            .unwrap();
        assert!(out.status.success());
        let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
        assert_eq!(json["header"]["name"], "pkg/A");
        assert_eq!(json["body"]["methods"][0]["name"], "run");
    }
}
