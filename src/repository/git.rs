//! libgit2-backed diff source.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{DiffFindOptions, DiffOptions, ErrorCode, FetchOptions, Oid, Repository, Sort};

use super::credentials::Credentials;
use super::source::{CommitRef, Delta, DiffSource};
use crate::error::RepositoryError;
use crate::events::Topic;
use crate::Result;

/// Default remote name.
pub const DEFAULT_REMOTE: &str = "origin";

/// A local working copy tracked by the service.
pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
    remote: String,
    credentials: Credentials,
}

impl GitRepository {
    /// Open an existing working copy.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a non-bare git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|e| RepositoryError::Open {
            path: path.display().to_string(),
            reason: e.message().to_string(),
        })?;
        Self::from_repository(repo, path)
    }

    /// Open the working copy at `path`, cloning `url` into it when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the path holds no repository and no URL is given,
    /// or if cloning fails.
    pub fn open_or_clone(
        path: impl AsRef<Path>,
        url: Option<&str>,
        branch: &str,
        credentials: &Credentials,
    ) -> Result<Self> {
        let path = path.as_ref();
        match Repository::open(path) {
            Ok(repo) => Self::from_repository(repo, path),
            Err(e) if e.code() == ErrorCode::NotFound => {
                let Some(url) = url else {
                    return Err(RepositoryError::Open {
                        path: path.display().to_string(),
                        reason: "no repository found and no remote URL configured".to_string(),
                    }
                    .into());
                };

                tracing::info!(%url, path = %path.display(), %branch, "Cloning repository");
                let mut fetch_options = FetchOptions::new();
                fetch_options.remote_callbacks(credentials.callbacks());

                let repo = RepoBuilder::new()
                    .branch(branch)
                    .fetch_options(fetch_options)
                    .clone(url, path)
                    .map_err(|e| RepositoryError::Clone {
                        url: url.to_string(),
                        reason: e.message().to_string(),
                    })?;
                Self::from_repository(repo, path)
            }
            Err(e) => Err(RepositoryError::Open {
                path: path.display().to_string(),
                reason: e.message().to_string(),
            }
            .into()),
        }
    }

    fn from_repository(repo: Repository, path: &Path) -> Result<Self> {
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| RepositoryError::Open {
                path: path.display().to_string(),
                reason: "bare repositories have no working directory".to_string(),
            })?;

        Ok(Self {
            repo,
            workdir,
            remote: DEFAULT_REMOTE.to_string(),
            credentials: Credentials::default(),
        })
    }

    /// Use a remote other than `origin`.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Use the given credentials for fetches.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Point the local branch at `oid` and force the working tree to match.
    fn fast_forward(&self, branch: &str, oid: Oid) -> std::result::Result<(), git2::Error> {
        let local_ref = format!("refs/heads/{branch}");
        let message = format!("git-events: fast-forward to {oid}");

        match self.repo.find_reference(&local_ref) {
            Ok(mut reference) => {
                if reference.target() == Some(oid) {
                    return Ok(());
                }
                reference.set_target(oid, &message)?;
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                self.repo.reference(&local_ref, oid, true, &message)?;
            }
            Err(e) => return Err(e),
        }

        self.repo.set_head(&local_ref)?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(())
    }
}

impl DiffSource for GitRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn fetch(&mut self, branch: &str) -> Result<()> {
        let fetch_err = |e: git2::Error| RepositoryError::Fetch {
            branch: branch.to_string(),
            reason: e.message().to_string(),
        };

        let mut remote = match self.repo.find_remote(&self.remote) {
            Ok(remote) => remote,
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::debug!(remote = %self.remote, "No remote configured, skipping fetch");
                return Ok(());
            }
            Err(e) => return Err(fetch_err(e).into()),
        };

        let refspec = format!("+refs/heads/{branch}:refs/remotes/{}/{branch}", self.remote);
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.credentials.callbacks());
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)
            .map_err(fetch_err)?;
        drop(remote);

        let tracking = format!("refs/remotes/{}/{branch}", self.remote);
        let oid = self
            .repo
            .find_reference(&tracking)
            .and_then(|r| r.peel_to_commit())
            .map(|c| c.id())
            .map_err(fetch_err)?;

        self.fast_forward(branch, oid).map_err(fetch_err)?;
        tracing::debug!(%branch, tip = %oid, "Fetched branch");
        Ok(())
    }

    fn list_commits(&self, branch: &str) -> Result<Vec<CommitRef>> {
        let history_err = |e: git2::Error| RepositoryError::History {
            branch: branch.to_string(),
            reason: e.message().to_string(),
        };

        let local_ref = format!("refs/heads/{branch}");
        match self.repo.find_reference(&local_ref) {
            Ok(_) => {}
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(history_err(e).into()),
        }

        let mut walk = self.repo.revwalk().map_err(history_err)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)
            .map_err(history_err)?;
        walk.push_ref(&local_ref).map_err(history_err)?;

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid.map_err(history_err)?;
            let commit = self.repo.find_commit(oid).map_err(history_err)?;
            commits.push(CommitRef {
                id: oid.to_string(),
                tree: commit.tree_id().to_string(),
                time: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                    .unwrap_or_default(),
            });
        }
        Ok(commits)
    }

    fn diff_tree_to_tree(&self, old: &CommitRef, new: &CommitRef) -> Result<Vec<Delta>> {
        let find_tree = |id: &str| {
            Oid::from_str(id)
                .and_then(|oid| self.repo.find_tree(oid))
                .map_err(RepositoryError::diff)
        };
        let old_tree = find_tree(&old.tree)?;
        let new_tree = find_tree(&new.tree)?;

        let mut options = DiffOptions::new();
        options.include_typechange(true);
        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut options))
            .map_err(RepositoryError::diff)?;

        let mut find = DiffFindOptions::new();
        find.renames(true).copies(true);
        diff.find_similar(Some(&mut find))
            .map_err(RepositoryError::diff)?;

        let deltas = diff
            .deltas()
            .filter_map(|delta| {
                let status = match delta.status() {
                    git2::Delta::Added => Topic::Added,
                    git2::Delta::Deleted => Topic::Deleted,
                    git2::Delta::Modified | git2::Delta::Typechange => Topic::Modified,
                    git2::Delta::Renamed => Topic::Renamed,
                    git2::Delta::Copied => Topic::Copied,
                    other => {
                        tracing::trace!(status = ?other, "Skipping delta");
                        return None;
                    }
                };
                let path_of = |p: Option<&Path>| p.map(|p| p.to_string_lossy().into_owned());
                let new_path = if status == Topic::Deleted {
                    None
                } else {
                    path_of(delta.new_file().path())
                };
                Some(Delta {
                    new_path,
                    old_path: path_of(delta.old_file().path()),
                    status,
                })
            })
            .collect();

        Ok(deltas)
    }
}
