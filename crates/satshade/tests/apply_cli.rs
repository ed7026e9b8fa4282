#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        for dir in ["config", "data", "cache", "icc", "bin"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        Self { root }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path("bin").join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn write_config(&self, session: &Path, generator: &Path, activator: Option<&Path>) {
        let activate = activator.is_some();
        let activator = activator
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "colormgr".to_string());
        let config = format!(
            "version = 1\n\
             [session]\n\
             command = [\"{}\", \"keyword\", \"decoration:screen_shader\", \"{{shader}}\"]\n\
             [profile]\n\
             generator = \"{}\"\n\
             activator = \"{}\"\n\
             activate = {}\n\
             [tools]\n\
             timeout = \"10s\"\n",
            session.display(),
            generator.display(),
            activator,
            activate,
        );
        fs::write(self.path("config/config.toml"), config).unwrap();
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_satshade"))
            .env("SATSHADE_CONFIG_DIR", self.path("config"))
            .env("SATSHADE_DATA_DIR", self.path("data"))
            .env("SATSHADE_CACHE_DIR", self.path("cache"))
            .env("SATSHADE_PROFILE_DIR", self.path("icc"))
            .env("RUST_LOG", "warn")
            .args(args)
            .output()
            .expect("failed to run satshade")
    }

    fn fake_hyprctl(&self) -> PathBuf {
        self.script(
            "hyprctl",
            &format!("echo \"$3\" > \"{}\"\necho ok\n", self.path("loaded").display()),
        )
    }

    fn fake_colprof(&self) -> PathBuf {
        self.script(
            "colprof",
            "while [ \"$1\" != \"-O\" ]; do shift; done\n\
             out=\"$2\"\n\
             head -c 36 /dev/zero > \"$out\"\n\
             printf 'acsp' >> \"$out\"\n\
             head -c 88 /dev/zero >> \"$out\"\n",
        )
    }

    fn fake_colormgr(&self) -> PathBuf {
        self.script(
            "colormgr",
            &format!(
                "echo \"$@\" >> \"{}\"\n\
                 if [ \"$1\" = \"import-profile\" ]; then echo 'Profile ID:    icc-satshade-test'; fi\n",
                self.path("colormgr.log").display()
            ),
        )
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn emit_prints_shader_with_level_literal() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["emit", "0.3"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let source = stdout(&output);
    assert!(source.contains("0.3"));
    assert!(!source.contains("@SATURATION@"));
}

#[test]
fn emit_writes_shader_to_output_path() {
    let sandbox = Sandbox::new();
    let target = sandbox.path("out/shader.frag");
    let output = sandbox.run(&["emit", "1.5", "--output", target.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(fs::read_to_string(&target).unwrap().contains("1.5"));
}

#[test]
fn missing_profiler_degrades_but_keeps_shader() {
    let sandbox = Sandbox::new();
    let hyprctl = sandbox.fake_hyprctl();
    sandbox.write_config(&hyprctl, &sandbox.path("bin/no-such-colprof"), None);

    let output = sandbox.run(&["apply", "0.5"]);

    assert_eq!(output.status.code(), Some(2), "stdout: {}", stdout(&output));
    let artifact = sandbox.path("cache/shaders/saturation.frag");
    assert!(fs::read_to_string(&artifact).unwrap().contains("0.5"));
    let loaded = fs::read_to_string(sandbox.path("loaded")).unwrap();
    assert_eq!(loaded.trim(), artifact.display().to_string());
    assert!(stdout(&output).contains("hint: install"));

    let state = fs::read_to_string(sandbox.path("config/state.toml")).unwrap();
    assert!(state.contains("last_level = 0.5"));
    assert_eq!(fs::read_dir(sandbox.path("icc")).unwrap().count(), 0);
}

#[test]
fn full_toolchain_applies_and_lists_profile() {
    let sandbox = Sandbox::new();
    let hyprctl = sandbox.fake_hyprctl();
    let colprof = sandbox.fake_colprof();
    let colormgr = sandbox.fake_colormgr();
    sandbox.write_config(&hyprctl, &colprof, Some(&colormgr));

    let output = sandbox.run(&["apply", "1.25"]);
    assert!(output.status.success(), "stdout: {}\nstderr: {}", stdout(&output), stderr(&output));

    let calls = fs::read_to_string(sandbox.path("colormgr.log")).unwrap();
    assert!(calls.contains("import-profile"));
    assert!(calls.contains("device-make-profile-default xrandr-eDP-1 icc-satshade-test"));

    let listing = sandbox.run(&["profiles", "list", "--json"]);
    assert!(listing.status.success());
    let json = stdout(&listing);
    assert!(json.contains("custom_saturation_"));
    assert!(json.contains("\"level\": 1.25"));

    let latest = sandbox.run(&["profiles", "latest"]);
    assert!(latest.status.success());
    assert!(stdout(&latest).trim().ends_with(".icc"));
}

#[test]
fn restore_reapplies_recorded_level() {
    let sandbox = Sandbox::new();
    let hyprctl = sandbox.fake_hyprctl();
    let colprof = sandbox.fake_colprof();
    sandbox.write_config(&hyprctl, &colprof, None);

    let missing = sandbox.run(&["restore"]);
    assert_eq!(missing.status.code(), Some(1));
    assert!(stderr(&missing).contains("no saturation level has been applied yet"));

    assert!(sandbox.run(&["apply", "0.75"]).status.success());
    fs::remove_file(sandbox.path("cache/shaders/saturation.frag")).unwrap();

    let restored = sandbox.run(&["restore"]);
    assert!(restored.status.success(), "stdout: {}", stdout(&restored));
    let artifact = fs::read_to_string(sandbox.path("cache/shaders/saturation.frag")).unwrap();
    assert!(artifact.contains("0.75"));
}

#[test]
fn latest_on_empty_store_reports_no_profile() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["profiles", "latest"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No profile found"));
}
