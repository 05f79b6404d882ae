use crate::error::{DeviateError, Result};
use crate::git::{
    BranchDeleter, Change, CheckoutTarget, CommitInfo, Committer, Fetcher, Merger, Pusher, Remote,
    RemoteLister, RemoteRef, RemoteUrlInformer, TagLister,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// A call recorded by [MockRepository]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(String),
    CheckoutAs {
        remote: String,
        branch: String,
        local: String,
    },
    OntoWorkspace {
        remote: String,
        branch: String,
    },
    Push {
        remote: String,
        refname: String,
    },
    PushAll {
        remote: String,
        refnames: Vec<String>,
    },
    DeleteBranch(String),
    Commit(String),
    Merge {
        remote: Option<String>,
        branch: String,
    },
    ListRemote(String),
}

impl Call {
    pub fn checkout_as(remote: &str, branch: &str, local: &str) -> Self {
        Call::CheckoutAs {
            remote: remote.to_string(),
            branch: branch.to_string(),
            local: local.to_string(),
        }
    }

    pub fn push(remote: &str, refname: &str) -> Self {
        Call::Push {
            remote: remote.to_string(),
            refname: refname.to_string(),
        }
    }

    pub fn merge(remote: Option<&str>, branch: &str) -> Self {
        Call::Merge {
            remote: remote.map(|r| r.to_string()),
            branch: branch.to_string(),
        }
    }

    fn is_remote(&self) -> bool {
        matches!(
            self,
            Call::Fetch(_) | Call::Push { .. } | Call::PushAll { .. } | Call::ListRemote(_)
        )
    }
}

/// Outcome [MockRepository] reports for a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    UpToDate,
    Conflict,
}

/// Mock repository for testing without actual git operations
///
/// Records every call, answers `list_remote` from branches registered per URL and
/// can be told to fail on a specific call. When given a workspace directory, an
/// overlay checkout writes the registered fork files there.
#[derive(Default)]
pub struct MockRepository {
    calls: RefCell<Vec<Call>>,
    current: RefCell<Option<String>>,
    remote_branches: HashMap<String, Vec<String>>,
    remote_urls: HashMap<String, String>,
    tags: Vec<String>,
    merges: HashMap<String, MergeOutcome>,
    clean_tree: Cell<bool>,
    failures: Vec<Call>,
    workspace: Option<PathBuf>,
    overlay: Vec<(String, String)>,
    commits: Cell<usize>,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the branches a remote URL advertises
    pub fn with_remote_branches(mut self, url: &str, branches: &[&str]) -> Self {
        self.remote_branches.insert(
            url.to_string(),
            branches.iter().map(|b| b.to_string()).collect(),
        );
        self
    }

    /// Register a configured remote
    pub fn with_remote_url(mut self, name: &str, url: &str) -> Self {
        self.remote_urls.insert(name.to_string(), url.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Outcome of merging `branch`; merges default to up to date
    pub fn with_merge(mut self, branch: &str, outcome: MergeOutcome) -> Self {
        self.merges.insert(branch.to_string(), outcome);
        self
    }

    /// Make every commit report a clean tree
    pub fn with_clean_tree(self) -> Self {
        self.clean_tree.set(true);
        self
    }

    /// Fail when `call` is made: remote calls fail as remote operations, others as local
    pub fn failing_on(mut self, call: Call) -> Self {
        self.failures.push(call);
        self
    }

    /// Files written into `dir` by every overlay checkout
    pub fn with_overlay(mut self, dir: impl Into<PathBuf>, files: &[(&str, &str)]) -> Self {
        self.workspace = Some(dir.into());
        self.overlay = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Branch checked out last, `None` once it was deleted
    pub fn current_branch(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// References pushed so far, as `remote:refname`
    pub fn pushed(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .flat_map(|c| match c {
                Call::Push { remote, refname } => vec![format!("{}:{}", remote, refname)],
                Call::PushAll { remote, refnames } => refnames
                    .iter()
                    .map(|r| format!("{}:{}", remote, r))
                    .collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.borrow_mut().push(call.clone());
        if self.failures.contains(&call) {
            let msg = format!("injected failure: {:?}", call);
            if call.is_remote() {
                return Err(DeviateError::remote(msg));
            }
            return Err(DeviateError::local(msg));
        }
        Ok(())
    }
}

impl Fetcher for MockRepository {
    fn fetch(&self, remote: &Remote) -> Result<()> {
        self.record(Call::Fetch(remote.name.clone()))
    }
}

impl CheckoutTarget for MockRepository {
    fn checkout_as(&self, remote: &Remote, branch: &str, local: &str) -> Result<()> {
        self.record(Call::checkout_as(&remote.name, branch, local))?;
        *self.current.borrow_mut() = Some(local.to_string());
        Ok(())
    }

    fn checkout_onto_workspace(&self, remote: &Remote, branch: &str) -> Result<()> {
        self.record(Call::OntoWorkspace {
            remote: remote.name.clone(),
            branch: branch.to_string(),
        })?;
        if let Some(dir) = &self.workspace {
            for (path, content) in &self.overlay {
                let dest = dir.join(path);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| DeviateError::local(e.to_string()))?;
                }
                fs::write(&dest, content).map_err(|e| DeviateError::local(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl Pusher for MockRepository {
    fn push_all(&self, remote: &Remote, refnames: &[String]) -> Result<()> {
        self.record(Call::PushAll {
            remote: remote.name.clone(),
            refnames: refnames.to_vec(),
        })
    }

    fn push(&self, remote: &Remote, refname: &str) -> Result<()> {
        self.record(Call::push(&remote.name, refname))
    }
}

impl BranchDeleter for MockRepository {
    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.record(Call::DeleteBranch(branch.to_string()))?;
        let mut current = self.current.borrow_mut();
        if current.as_deref() == Some(branch) {
            *current = None;
        }
        Ok(())
    }
}

impl Committer for MockRepository {
    fn commit_changes(&self, message: &str) -> Result<Change<CommitInfo>> {
        self.record(Call::Commit(message.to_string()))?;
        if self.clean_tree.get() {
            return Ok(Change::UpToDate);
        }
        let n = self.commits.get() + 1;
        self.commits.set(n);
        Ok(Change::Changed(CommitInfo {
            hash: format!("{:040x}", n),
            message: message.to_string(),
            author: "mock".to_string(),
            files_changed: 1,
        }))
    }
}

impl Merger for MockRepository {
    fn merge(&self, remote: Option<&Remote>, branch: &str) -> Result<Change<String>> {
        self.record(Call::merge(remote.map(|r| r.name.as_str()), branch))?;
        match self.merges.get(branch).copied().unwrap_or(MergeOutcome::UpToDate) {
            MergeOutcome::Merged => Ok(Change::Changed(format!("merge-{}", branch))),
            MergeOutcome::UpToDate => Ok(Change::UpToDate),
            MergeOutcome::Conflict => Err(DeviateError::local(format!("cannot merge {}", branch))),
        }
    }
}

impl RemoteLister for MockRepository {
    fn list_remote(&self, remote: &Remote) -> Result<Vec<RemoteRef>> {
        self.record(Call::ListRemote(remote.url.clone()))?;
        let branches = self.remote_branches.get(&remote.url).cloned().unwrap_or_default();
        Ok(branches
            .into_iter()
            .map(|b| RemoteRef {
                name: format!("refs/heads/{}", b),
                target: "0".repeat(40),
            })
            .collect())
    }
}

impl RemoteUrlInformer for MockRepository {
    fn remote_url(&self, name: &str) -> Result<String> {
        self.remote_urls
            .get(name)
            .cloned()
            .ok_or_else(|| DeviateError::remote(format!("cannot find remote '{}'", name)))
    }
}

impl TagLister for MockRepository {
    fn list_tags(&self) -> Result<Vec<String>> {
        let mut tags = self.tags.clone();
        tags.sort();
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_mock_records_calls_in_order() {
        let repo = MockRepository::new();
        let upstream = Remote::upstream("git@github.com:knative/serving.git");

        repo.fetch(&upstream).unwrap();
        repo.checkout(&upstream, "main").as_branch("release-next").unwrap();
        repo.delete_branch("release-next").unwrap();

        assert_eq!(
            repo.calls(),
            vec![
                Call::Fetch("upstream".to_string()),
                Call::checkout_as("upstream", "main", "release-next"),
                Call::DeleteBranch("release-next".to_string()),
            ]
        );
        assert_eq!(repo.current_branch(), None);
    }

    #[test]
    fn test_mock_lists_registered_branches() {
        let url = "https://github.com/knative/serving.git";
        let repo = MockRepository::new().with_remote_branches(url, &["main", "release-1.30"]);

        let refs = repo.list_remote(&Remote::upstream(url)).unwrap();
        let branches: Vec<_> = refs.iter().filter_map(|r| r.branch()).collect();
        assert_eq!(branches, vec!["main", "release-1.30"]);
    }

    #[test]
    fn test_mock_injected_failure_kinds() {
        let remote = Remote::downstream("x");
        let repo = MockRepository::new()
            .failing_on(Call::push("downstream", "refs/heads/main"))
            .failing_on(Call::Commit("msg".to_string()));

        let err = repo.push(&remote, "refs/heads/main").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteOperationFailed);
        let err = repo.commit_changes("msg").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalOperationFailed);
    }

    #[test]
    fn test_mock_clean_tree_and_merge_outcomes() {
        let repo = MockRepository::new()
            .with_clean_tree()
            .with_merge("release-1.2", MergeOutcome::Merged);

        assert_eq!(repo.commit_changes("m").unwrap(), Change::UpToDate);
        assert!(repo.merge(None, "release-1.2").unwrap().is_changed());
        assert_eq!(repo.merge(None, "release-1.3").unwrap(), Change::UpToDate);
    }

    #[test]
    fn test_mock_overlay_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = MockRepository::new().with_overlay(dir.path(), &[("openshift/ci", "x")]);

        repo.checkout(&Remote::downstream("d"), "main")
            .onto_workspace()
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("openshift/ci")).unwrap(), "x");
    }
}
