//! Config pointer sync against real scratch git repositories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use binhost_core::conf::{rev_git_file, update_binhost_conf};
use binhost_core::PublishError;

fn git(cwd: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// A bare upstream plus a working clone seeded with a committed make.conf.
fn seeded_clone(dir: &Path) -> (PathBuf, PathBuf) {
    let upstream = dir.join("upstream.git");
    git(dir, &["init", "--bare", "-b", "main", "upstream.git"]);
    git(dir, &["clone", "upstream.git", "work"]);

    let work = dir.join("work");
    git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&work, &["config", "user.email", "builder@example.com"]);
    git(&work, &["config", "user.name", "Builder"]);
    fs::write(
        work.join("make.conf"),
        "PORTAGE_BINHOST=\"http://old.example.com/\"\nUSE=\"-cups\"\n",
    )
    .expect("seed make.conf");
    git(&work, &["add", "make.conf"]);
    git(&work, &["commit", "-m", "seed make.conf"]);
    git(&work, &["push", "-u", "origin", "main"]);
    (upstream, work)
}

#[tokio::test]
async fn rev_git_file_pushes_the_new_pointer_upstream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (upstream, work) = seeded_clone(dir.path());

    rev_git_file(
        &work.join("make.conf"),
        "PORTAGE_BINHOST",
        "http://example.com/host/amd64/1.2.3/packages/",
        5,
    )
    .await
    .expect("rev_git_file");

    let published = git(&upstream, &["show", "main:make.conf"]);
    assert!(published
        .contains("PORTAGE_BINHOST=\"http://example.com/host/amd64/1.2.3/packages/\""));
    assert!(published.contains("USE=\"-cups\""), "unrelated lines survive");

    // The working clone is back where it started, work branch gone.
    assert_eq!(git(&work, &["rev-parse", "--abbrev-ref", "HEAD"]).trim(), "main");
    assert_eq!(git(&work, &["branch", "--list", "binhost-update"]).trim(), "");
}

#[tokio::test]
async fn failed_pushes_exhaust_retries_and_restore_the_branch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (upstream, work) = seeded_clone(dir.path());
    // Fetches keep working; only pushes hit the dead URL.
    let dead = dir.path().join("nonexistent.git");
    git(
        &work,
        &["remote", "set-url", "--push", "origin", &dead.display().to_string()],
    );

    let err = rev_git_file(&work.join("make.conf"), "PORTAGE_BINHOST", "http://x/", 2)
        .await
        .expect_err("push must fail");
    match err {
        PublishError::PushFailed { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {other}"),
    }

    let published = git(&upstream, &["show", "main:make.conf"]);
    assert!(
        published.contains("http://old.example.com/"),
        "upstream must be untouched"
    );
    assert_eq!(git(&work, &["rev-parse", "--abbrev-ref", "HEAD"]).trim(), "main");
    assert_eq!(git(&work, &["branch", "--list", "binhost-update"]).trim(), "");
}

#[tokio::test]
async fn binhost_conf_is_seeded_and_committed_without_pushing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path().join("overlay");
    fs::create_dir(&repo).expect("mkdir");
    git(&repo, &["init", "-b", "main"]);
    git(&repo, &["config", "user.email", "builder@example.com"]);
    git(&repo, &["config", "user.name", "Builder"]);

    let conf = repo.join("host/amd64.conf");
    update_binhost_conf(&conf, "PORTAGE_BINHOST", "http://example.com/1/")
        .await
        .expect("first update");

    let text = fs::read_to_string(&conf).expect("conf");
    assert!(text.contains("FULL_BINHOST=\"$PORTAGE_BINHOST\""));
    assert!(text.contains("PORTAGE_BINHOST=\"http://example.com/1/\""));
    assert_eq!(
        git(&repo, &["log", "-1", "--pretty=%s"]).trim(),
        "Update PORTAGE_BINHOST=http://example.com/1/ in amd64.conf"
    );

    update_binhost_conf(&conf, "PORTAGE_BINHOST", "http://example.com/2/")
        .await
        .expect("second update");
    let text = fs::read_to_string(&conf).expect("conf");
    assert_eq!(
        text.lines()
            .filter(|l| l.starts_with("PORTAGE_BINHOST="))
            .count(),
        1,
        "repeated updates keep a single pointer line"
    );
    assert!(text.contains("PORTAGE_BINHOST=\"http://example.com/2/\""));
    assert_eq!(git(&repo, &["rev-list", "--count", "HEAD"]).trim(), "2");
}
