//! Upstream git repository fixtures.
//!
//! Repositories are created with the `git` CLI so fixtures do not share code
//! paths with the toolchain under test. Their filesystem path doubles as the
//! remote URL.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run `git` in `dir` and return trimmed stdout.
///
/// # Panics
/// Panics if git cannot be spawned or exits non-zero.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "`git {args:?}` failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A non-bare repository acting as the remote, with `main` checked out and
/// one initial commit.
pub struct Upstream {
    temp_dir: TempDir,
}

impl Default for Upstream {
    fn default() -> Self {
        Self::new()
    }
}

impl Upstream {
    /// Create the repository with `README.md` committed on `main`.
    pub fn new() -> Self {
        let upstream = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        let run = |args: &[&str]| git(upstream.path(), args);

        run(&["init", "--quiet"]);
        run(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        run(&["config", "user.email", "test@test.com"]);
        run(&["config", "user.name", "Test User"]);
        run(&["config", "commit.gpgsign", "false"]);
        run(&["config", "tag.gpgsign", "false"]);

        upstream.commit_file("README.md", "# Upstream\n");
        upstream
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Remote URL accepted by both libgit2 and the git CLI.
    pub fn url(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    /// Write `name` (creating parent directories) and commit it on the
    /// current branch. Returns the new commit id.
    pub fn commit_file(&self, name: &str, content: &str) -> String {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        git(self.path(), &["add", "--all"]);
        git(self.path(), &["commit", "--quiet", "-m", &format!("update {name}")]);
        self.head()
    }

    /// Remove `name` and commit. Returns the new commit id.
    pub fn remove_file(&self, name: &str) -> String {
        git(self.path(), &["rm", "--quiet", name]);
        git(self.path(), &["commit", "--quiet", "-m", &format!("remove {name}")]);
        self.head()
    }

    pub fn head(&self) -> String {
        git(self.path(), &["rev-parse", "HEAD"])
    }

    /// Create an annotated tag at HEAD.
    pub fn tag(&self, name: &str) {
        git(self.path(), &["tag", "-a", name, "-m", name]);
    }

    /// Create and check out a new branch at HEAD.
    pub fn checkout_new_branch(&self, name: &str) {
        git(self.path(), &["checkout", "--quiet", "-b", name]);
    }

    pub fn checkout(&self, name: &str) {
        git(self.path(), &["checkout", "--quiet", name]);
    }
}
