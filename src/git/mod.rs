//! Git operations abstraction layer
//!
//! The sync workflow never talks to libgit2 directly. It depends on a set of
//! small capability traits, bundled as [Repository], so it can run against the
//! real working copy ([repository::Git2Repository]) or an in-memory fake
//! ([mock::MockRepository]).
//!
//! # Already up to date
//!
//! Committing a clean tree or merging a branch that adds nothing are expected
//! outcomes, not failures. They are reported as [Change::UpToDate].
//!
//! # Errors
//!
//! Implementations classify every failure as either
//! [crate::error::DeviateError::RemoteOperationFailed] (network, auth, remote refs)
//! or [crate::error::DeviateError::LocalOperationFailed] (worktree, filesystem).

pub mod address;
mod auth;
pub mod mock;
pub mod repository;

pub use address::{Address, AddressType};
pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;

pub const UPSTREAM: &str = "upstream";
pub const DOWNSTREAM: &str = "downstream";
pub const ORIGIN: &str = "origin";

/// A named git remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Remote {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn upstream(url: impl Into<String>) -> Self {
        Remote::new(UPSTREAM, url)
    }

    pub fn downstream(url: impl Into<String>) -> Self {
        Remote::new(DOWNSTREAM, url)
    }
}

/// Outcome of an operation that may find nothing to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Changed(T),
    UpToDate,
}

impl<T> Change<T> {
    pub fn is_changed(&self) -> bool {
        matches!(self, Change::Changed(_))
    }
}

/// Commit created by [Committer::commit_changes]
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// The commit hash
    pub hash: String,
    /// The commit message
    pub message: String,
    /// The commit author
    pub author: String,
    /// Number of files touched compared to the parent commit
    pub files_changed: usize,
}

impl CommitInfo {
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(7)]
    }
}

/// A reference advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Full reference name, e.g. `refs/heads/main`
    pub name: String,
    pub target: String,
}

impl RemoteRef {
    /// Short branch name, if this reference is a branch
    pub fn branch(&self) -> Option<&str> {
        self.name.strip_prefix("refs/heads/")
    }
}

/// Full reference name of a local branch
pub fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

/// Full reference name of a tag
pub fn tag_ref(tag: &str) -> String {
    format!("refs/tags/{}", tag)
}

pub trait Fetcher {
    /// Fetch a remote, registering it first when the working copy lacks it.
    ///
    /// Nothing new to fetch is a success.
    fn fetch(&self, remote: &Remote) -> Result<()>;
}

pub trait CheckoutTarget {
    /// Check `remote/branch` out as the local branch `local`.
    ///
    /// Fetches the remote, creates `local` tracking `remote/branch` when it does not
    /// exist yet, switches to it, and hard-resets it to the remote commit. Running it
    /// again against an unchanged remote changes nothing; against a moved remote it
    /// moves `local` to the new commit.
    fn checkout_as(&self, remote: &Remote, branch: &str, local: &str) -> Result<()>;

    /// Overlay every file of `branch` onto the working copy.
    ///
    /// Files of the same path are replaced; files absent from the branch are kept.
    fn checkout_onto_workspace(&self, remote: &Remote, branch: &str) -> Result<()>;

    /// Start a checkout of `remote/branch`
    fn checkout(&self, remote: &Remote, branch: &str) -> Checkout<'_, Self>
    where
        Self: Sized,
    {
        Checkout {
            target: self,
            remote: remote.clone(),
            branch: branch.to_string(),
        }
    }
}

pub trait Pusher {
    /// Force-push references (`refname:refname` each) over one connection.
    ///
    /// An empty list pushes nothing.
    fn push_all(&self, remote: &Remote, refnames: &[String]) -> Result<()>;

    /// Force-push a single reference
    fn push(&self, remote: &Remote, refname: &str) -> Result<()> {
        self.push_all(remote, &[refname.to_string()])
    }
}

pub trait BranchDeleter {
    /// Delete a local branch and its reference
    fn delete_branch(&self, branch: &str) -> Result<()>;
}

pub trait Committer {
    /// Stage everything (including deletions and untracked files) and commit
    fn commit_changes(&self, message: &str) -> Result<Change<CommitInfo>>;
}

pub trait Merger {
    /// Merge `branch` (or `remote/branch` after fetching `remote`) into HEAD.
    ///
    /// A failed merge is aborted. Returns the new HEAD hash when the merge
    /// produced a commit.
    fn merge(&self, remote: Option<&Remote>, branch: &str) -> Result<Change<String>>;
}

pub trait RemoteLister {
    /// List references of a remote without touching the working copy
    fn list_remote(&self, remote: &Remote) -> Result<Vec<RemoteRef>>;
}

pub trait RemoteUrlInformer {
    /// URL of a configured remote
    fn remote_url(&self, name: &str) -> Result<String>;
}

pub trait TagLister {
    /// Names of all local tags, sorted
    fn list_tags(&self) -> Result<Vec<String>>;
}

/// Every capability the sync workflow needs from a working copy
pub trait Repository:
    Fetcher
    + CheckoutTarget
    + Pusher
    + BranchDeleter
    + Committer
    + Merger
    + RemoteLister
    + RemoteUrlInformer
    + TagLister
{
}

impl<T> Repository for T where
    T: Fetcher
        + CheckoutTarget
        + Pusher
        + BranchDeleter
        + Committer
        + Merger
        + RemoteLister
        + RemoteUrlInformer
        + TagLister
{
}

/// Pending checkout of `remote/branch`, finished by one of its terminal operations
pub struct Checkout<'r, T: CheckoutTarget + ?Sized> {
    target: &'r T,
    remote: Remote,
    branch: String,
}

impl<'r, T: CheckoutTarget + ?Sized> Checkout<'r, T> {
    /// See [CheckoutTarget::checkout_as]
    pub fn as_branch(self, local: &str) -> Result<()> {
        self.target.checkout_as(&self.remote, &self.branch, local)
    }

    /// See [CheckoutTarget::checkout_onto_workspace]
    pub fn onto_workspace(self) -> Result<()> {
        self.target.checkout_onto_workspace(&self.remote, &self.branch)
    }
}
