//! The diff source capability consumed by the extractor and poller.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::events::Topic;
use crate::Result;

/// Reference to one commit and the tree it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    /// Commit id (hex).
    pub id: String,
    /// Tree id (hex).
    pub tree: String,
    /// Committer time.
    pub time: DateTime<Utc>,
}

/// One path-level change between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Path on the new side, absent when the file no longer exists there.
    pub new_path: Option<String>,
    /// Path on the old side, absent for additions.
    pub old_path: Option<String>,
    /// Change classification.
    pub status: Topic,
}

impl Delta {
    /// The path an event for this delta is keyed by.
    ///
    /// Falls back to the old path when the new side has none.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }
}

/// A version-controlled working copy that can be refreshed and diffed.
///
/// Implementations are blocking; callers on the async runtime drive them
/// from `spawn_blocking`.
pub trait DiffSource: Send + 'static {
    /// Root of the checked-out working directory.
    fn workdir(&self) -> &Path;

    /// Bring the tracked branch and working directory up to date with the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be reached or the update fails.
    fn fetch(&mut self, branch: &str) -> Result<()>;

    /// Commits reachable from the branch, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if history cannot be walked.
    fn list_commits(&self, branch: &str) -> Result<Vec<CommitRef>>;

    /// Ordered deltas turning `old`'s tree into `new`'s tree.
    ///
    /// # Errors
    ///
    /// Returns an error if either tree is missing or the diff fails.
    fn diff_tree_to_tree(&self, old: &CommitRef, new: &CommitRef) -> Result<Vec<Delta>>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory diff source for tests.

    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use chrono::{DateTime, Utc};

    use super::{CommitRef, Delta, DiffSource};
    use crate::error::RepositoryError;
    use crate::Result;

    /// Canned history and deltas keyed by `(old id, new id)`.
    #[derive(Default)]
    pub struct MemorySource {
        pub workdir: PathBuf,
        pub commits: Vec<CommitRef>,
        pub diffs: HashMap<(String, String), Vec<Delta>>,
        pub fetches: usize,
        pub fail_fetch: bool,
        /// Runs inside every fetch, while a cycle is in progress.
        pub on_fetch: Option<Box<dyn FnMut() + Send>>,
    }

    impl MemorySource {
        pub fn new(workdir: impl Into<PathBuf>) -> Self {
            Self {
                workdir: workdir.into(),
                ..Default::default()
            }
        }

        /// Append a commit whose diff from the current tip is `deltas`.
        pub fn push_commit(&mut self, id: &str, deltas: Vec<Delta>) -> CommitRef {
            let commit = CommitRef {
                id: id.to_string(),
                tree: format!("tree-{id}"),
                time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
            };
            if let Some(prev_tip) = self.commits.last().map(|c| c.id.clone()) {
                // Every earlier commit diffs to the new one through the previous tip.
                let earlier: Vec<String> = self.commits.iter().map(|c| c.id.clone()).collect();
                for old in earlier {
                    let mut combined = self
                        .diffs
                        .get(&(old.clone(), prev_tip.clone()))
                        .cloned()
                        .unwrap_or_default();
                    combined.extend(deltas.iter().cloned());
                    self.diffs.insert((old, id.to_string()), combined);
                }
            }
            self.commits.push(commit.clone());
            commit
        }
    }

    impl DiffSource for MemorySource {
        fn workdir(&self) -> &Path {
            &self.workdir
        }

        fn fetch(&mut self, branch: &str) -> Result<()> {
            self.fetches += 1;
            if let Some(hook) = self.on_fetch.as_mut() {
                hook();
            }
            if self.fail_fetch {
                return Err(RepositoryError::Fetch {
                    branch: branch.to_string(),
                    reason: "remote unreachable".to_string(),
                }
                .into());
            }
            Ok(())
        }

        fn list_commits(&self, _branch: &str) -> Result<Vec<CommitRef>> {
            Ok(self.commits.clone())
        }

        fn diff_tree_to_tree(&self, old: &CommitRef, new: &CommitRef) -> Result<Vec<Delta>> {
            self.diffs
                .get(&(old.id.clone(), new.id.clone()))
                .cloned()
                .ok_or_else(|| {
                    RepositoryError::diff(format!("no tree for {}..{}", old.id, new.id)).into()
                })
        }
    }
}
