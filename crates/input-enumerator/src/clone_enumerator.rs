use anyhow::{Context, Result};
use std::str::FromStr;
use tracing::{debug, debug_span};

use crate::git_binary::{CloneMode, Git};
use crate::git_url::GitUrl;
use crate::{CancellationToken, FilesystemEnumerator, Output};

/// A repository to clone and enumerate, as named by a caller (e.g. resolved from a GitHub
/// organization listing) rather than discovered on disk.
pub struct RepoInfo {
    pub name: String,
    pub clone_url: GitUrl,
}

impl RepoInfo {
    pub fn new(name: impl Into<String>, clone_url: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            clone_url: GitUrl::from_str(clone_url)
                .map_err(|e| anyhow::anyhow!("invalid clone URL {clone_url:?}: {e}"))?,
        })
    }
}

/// Clones each of a list of named repositories into a fresh temporary workspace and delegates to
/// [`FilesystemEnumerator`] for the actual content enumeration.
///
/// When Git history is not going to be enumerated, clones are shallow (`--depth=1`) working-tree
/// checkouts; otherwise they are full bare clones, since `FilesystemEnumerator`'s Git-aware
/// enumeration reads directly from the object store and needs no working tree.
///
/// Each clone's temporary directory is removed once that repository has been enumerated, whether
/// enumeration succeeded, failed, or was cancelled partway through.
pub struct CloneEnumerator {
    repos: Vec<RepoInfo>,
    enumerate_git_history: bool,
    include_hidden: bool,
    max_file_size: Option<u64>,
    cancellation: CancellationToken,
}

impl CloneEnumerator {
    pub fn new(repos: Vec<RepoInfo>) -> Self {
        Self {
            repos,
            enumerate_git_history: FilesystemEnumerator::DEFAULT_ENUMERATE_GIT_HISTORY,
            include_hidden: FilesystemEnumerator::DEFAULT_INCLUDE_HIDDEN,
            max_file_size: Some(FilesystemEnumerator::DEFAULT_MAX_FILESIZE),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn enumerate_git_history(&mut self, enumerate_git_history: bool) -> &mut Self {
        self.enumerate_git_history = enumerate_git_history;
        self
    }

    pub fn include_hidden(&mut self, include_hidden: bool) -> &mut Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn max_filesize(&mut self, max_file_size: Option<u64>) -> &mut Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn cancellation(&mut self, cancellation: CancellationToken) -> &mut Self {
        self.cancellation = cancellation;
        self
    }

    pub fn run(&self, output: Output) -> Result<()> {
        let git = Git::new();

        for repo in &self.repos {
            if self.cancellation.is_cancelled() {
                break;
            }

            let _span = debug_span!("clone_enumerator", repo = repo.name.as_str()).entered();
            let workspace = tempfile::tempdir()
                .with_context(|| format!("Failed to create workspace for {}", repo.name))?;
            let clone_mode = if self.enumerate_git_history {
                CloneMode::Bare
            } else {
                CloneMode::Shallow
            };

            debug!("Cloning {} into {}", repo.clone_url, workspace.path().display());
            if let Err(e) = git.create_fresh_clone(&repo.clone_url, workspace.path(), clone_mode) {
                tracing::error!("Failed to clone {}: {e}; skipping", repo.name);
                continue;
            }

            let mut enumerator = FilesystemEnumerator::new(&[workspace.path()])?;
            enumerator
                .enumerate_git_history(self.enumerate_git_history)
                .include_hidden(self.include_hidden)
                .max_filesize(self.max_file_size)
                .cancellation(self.cancellation.clone());

            if let Err(e) = enumerator.run(output.clone()) {
                tracing::error!("Failed to enumerate clone of {}: {e}; skipping", repo.name);
            }

            // `workspace` is dropped here, removing the temporary checkout whether enumeration
            // above succeeded, failed, or was cut short by cancellation.
        }

        Ok(())
    }
}
