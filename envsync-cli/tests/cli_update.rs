use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn envsync_cmd(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("envsync"));
    cmd.arg("--config").arg(config).env_remove("ENVSYNC_CONFIG");
    cmd
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=envsync",
            "-c",
            "user.email=envsync@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

struct Fixture {
    root: TempDir,
    config: PathBuf,
}

impl Fixture {
    /// Upstream with `master` and `feature/login-form`; config rooted in a tempdir.
    fn new() -> Self {
        let root = TempDir::new().expect("root");
        let upstream = root.path().join("upstream");
        fs::create_dir_all(&upstream).unwrap();
        git(&upstream, &["init", "-q"]);
        git(&upstream, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        fs::write(upstream.join("file1"), "one\n").unwrap();
        git(&upstream, &["add", "file1"]);
        git(&upstream, &["commit", "-q", "-m", "add file1"]);
        git(&upstream, &["branch", "feature/login-form"]);

        let directory = root.path().join("puppet");
        let config = root.path().join("agent.yaml");
        fs::write(
            &config,
            format!(
                "directory: {}\nrepository: {}\nlock_file: {}\nsocket: {}\nignore_branches: leave_me_alone\n",
                directory.display(),
                upstream.display(),
                root.path().join("envsync.lock").display(),
                root.path().join("agent.sock").display(),
            ),
        )
        .unwrap();

        Self { root, config }
    }

    fn env(&self, name: &str) -> PathBuf {
        self.root.path().join("puppet").join("environments").join(name)
    }

    fn socket(&self) -> PathBuf {
        self.root.path().join("agent.sock")
    }
}

#[test]
fn local_update_all_checks_out_every_branch() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.env("stray")).unwrap();

    envsync_cmd(&fx.config)
        .args(["update", "--local"])
        .assert()
        .success()
        .stdout(contains("masterbranch"))
        .stdout(contains("feature__login_form"))
        .stdout(contains("stray"));

    assert!(fx.env("masterbranch").join("file1").exists());
    assert!(fx.env("feature__login_form").join("file1").exists());
    assert!(!fx.env("stray").exists());
    assert!(fx.root.path().join("puppet").join("puppet.conf").exists());
}

#[test]
fn local_single_update_reports_json() {
    let fx = Fixture::new();

    let output = envsync_cmd(&fx.config)
        .args(["update", "feature/login-form", "--local", "--json"])
        .output()
        .expect("run envsync update");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["status"], "Done");
    assert_eq!(report["environment"], "feature__login_form");
    assert_eq!(report["from"], "unknown");
}

#[test]
fn unsafe_branch_is_rejected() {
    let fx = Fixture::new();

    envsync_cmd(&fx.config)
        .args(["update", "master;reboot", "--local"])
        .assert()
        .failure()
        .stderr(contains("not shell safe"));

    assert!(!fx.root.path().join("puppet").join("puppet.git").exists());
}

#[test]
fn unconfirmed_cleanup_is_skipped() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.env("stray")).unwrap();

    envsync_cmd(&fx.config)
        .args(["cleanup", "--confirm", "no", "--local"])
        .assert()
        .success()
        .stdout(contains("skipped"));

    assert!(fx.env("stray").exists());
}

#[test]
fn remote_commands_need_a_running_agent() {
    let fx = Fixture::new();

    envsync_cmd(&fx.config)
        .arg("update")
        .assert()
        .failure()
        .stderr(contains("agent is not running"));

    envsync_cmd(&fx.config)
        .args(["agent", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
}

fn wait_for_socket(socket: &Path, agent: &mut Child) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !socket.exists() {
        if let Some(status) = agent.try_wait().expect("poll agent") {
            panic!("agent exited early: {status}");
        }
        assert!(Instant::now() < deadline, "agent socket never appeared");
        sleep(Duration::from_millis(50));
    }
}

#[test]
fn agent_round_trip_over_socket() {
    let fx = Fixture::new();

    let mut agent = envsync_cmd(&fx.config)
        .args(["agent", "start"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn agent");
    wait_for_socket(&fx.socket(), &mut agent);

    envsync_cmd(&fx.config)
        .args(["update", "master"])
        .assert()
        .success()
        .stdout(contains("masterbranch"));
    assert!(fx.env("masterbranch").join("file1").exists());

    envsync_cmd(&fx.config)
        .args(["agent", "status"])
        .assert()
        .success()
        .stdout(contains("\"jobs_completed\": 1"));

    envsync_cmd(&fx.config)
        .args(["agent", "stop"])
        .assert()
        .success()
        .stdout(contains("stop requested"));

    let status = agent.wait().expect("agent exit");
    assert!(status.success());
}
