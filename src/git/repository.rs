use crate::cancel::CancellationToken;
use crate::error::{DeviateError, Result, ResultExt};
use crate::exec::Executor;
use crate::git::auth::remote_callbacks;
use crate::git::{
    branch_ref, BranchDeleter, Change, CheckoutTarget, CommitInfo, Committer, Fetcher, Merger,
    Pusher, Remote, RemoteLister, RemoteRef, RemoteUrlInformer, TagLister,
};
use git2::build::CheckoutBuilder;
use git2::{
    AutotagOption, BranchType, Direction, ErrorCode, FetchOptions, IndexAddOption, ObjectType, Oid,
    PushOptions, Repository as Git2Repo, ResetType, Signature, StatusOptions, TreeWalkMode,
    TreeWalkResult,
};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_LINK: i32 = 0o120000;

/// Working copy backed by libgit2, with `git merge` delegated to the host tool
pub struct Git2Repository {
    repo: Git2Repo,
    workdir: PathBuf,
    cancel: CancellationToken,
    exec: Executor,
}

impl Git2Repository {
    /// Open the working copy at `path`
    ///
    /// A path that is not a (non-bare) git working copy is a configuration error:
    /// nothing can be synchronized there.
    pub fn open<P: AsRef<Path>>(path: P, cancel: CancellationToken) -> Result<Self> {
        let path = path.as_ref();
        let repo = Git2Repo::open(path).map_err(|e| {
            DeviateError::config(format!("{} - not a git repository: {}", path.display(), e))
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                DeviateError::config(format!("{} - bare repositories are not supported", path.display()))
            })?
            .to_path_buf();
        let exec = Executor::new(&workdir, cancel.clone());

        Ok(Git2Repository {
            repo,
            workdir,
            cancel,
            exec,
        })
    }

    /// Name of the checked out branch, `None` when HEAD is detached or unborn
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(|s| s.to_string())
    }

    /// Commit hash a local branch points to
    pub fn branch_head(&self, branch: &str) -> Result<String> {
        let reference = self
            .repo
            .find_reference(&branch_ref(branch))
            .local_err(format!("cannot find branch '{}'", branch))?;
        let commit = reference
            .peel_to_commit()
            .local_err(format!("branch '{}' has no commit", branch))?;
        Ok(commit.id().to_string())
    }

    fn head_id(&self) -> Result<Oid> {
        let head = self.repo.head().local_err("cannot read HEAD")?;
        let commit = head.peel_to_commit().local_err("HEAD has no commit")?;
        Ok(commit.id())
    }

    fn ensure_remote(&self, remote: &Remote) -> Result<git2::Remote<'_>> {
        match self.repo.find_remote(&remote.name) {
            Ok(found) => Ok(found),
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::debug!(remote = %remote.name, url = %remote.url, "adding remote");
                self.repo
                    .remote(&remote.name, &remote.url)
                    .remote_err(format!("cannot add remote '{}'", remote.name))
            }
            Err(e) => Err(e).remote_err(format!("cannot find remote '{}'", remote.name)),
        }
    }

    fn transfer_failed(&self, err: git2::Error, msg: String) -> DeviateError {
        if self.cancel.is_cancelled() {
            return DeviateError::Cancelled;
        }
        DeviateError::RemoteOperationFailed {
            message: msg,
            source: Some(Box::new(err)),
        }
    }

    /// Tip of `remote/branch` after a fetch, or of the local branch when the
    /// remote has no such branch
    fn snapshot_commit(&self, remote: &Remote, branch: &str) -> Result<git2::Commit<'_>> {
        self.fetch(remote)?;
        let tracking = format!("refs/remotes/{}/{}", remote.name, branch);
        if let Ok(commit) = self
            .repo
            .find_reference(&tracking)
            .and_then(|r| r.peel_to_commit())
        {
            return Ok(commit);
        }
        self.repo
            .find_branch(branch, BranchType::Local)
            .local_err(format!("cannot resolve {}/{}", remote.name, branch))?
            .into_reference()
            .peel_to_commit()
            .local_err(format!("branch '{}' has no commit", branch))
    }

    /// Reload the index when host tools (`git apply --index`, `git merge`) changed it
    fn refresh_index(&self) -> Result<git2::Index> {
        let mut index = self.repo.index().local_err("cannot open index")?;
        index.read(false).local_err("cannot read index")?;
        Ok(index)
    }

    fn overlay_file(&self, rel: &str, oid: Oid, mode: i32) -> Result<()> {
        let blob = self
            .repo
            .find_blob(oid)
            .local_err(format!("cannot read {}", rel))?;
        let dest = self.workdir.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).local_err(format!("cannot create {}", parent.display()))?;
        }
        if dest.symlink_metadata().is_ok() {
            fs::remove_file(&dest).local_err(format!("cannot replace {}", dest.display()))?;
        }
        write_entry(&dest, blob.content(), mode).local_err(format!("cannot write {}", dest.display()))
    }
}

#[cfg(unix)]
fn write_entry(dest: &Path, content: &[u8], mode: i32) -> std::io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::PermissionsExt;

    if mode == MODE_LINK {
        let target = std::ffi::OsStr::from_bytes(content);
        return std::os::unix::fs::symlink(target, dest);
    }
    fs::write(dest, content)?;
    if mode == MODE_EXECUTABLE {
        fs::set_permissions(dest, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn write_entry(dest: &Path, content: &[u8], _mode: i32) -> std::io::Result<()> {
    fs::write(dest, content)
}

impl Fetcher for Git2Repository {
    fn fetch(&self, remote: &Remote) -> Result<()> {
        self.cancel.check()?;
        let mut git_remote = self.ensure_remote(remote)?;
        let url = git_remote.url().unwrap_or(&remote.url).to_string();

        let mut options = FetchOptions::new();
        options.remote_callbacks(remote_callbacks(&url, &self.cancel));
        options.download_tags(AutotagOption::All);

        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", remote.name);
        git_remote
            .fetch(&[refspec.as_str()], Some(&mut options), None)
            .map_err(|e| self.transfer_failed(e, format!("cannot fetch '{}'", remote.name)))?;
        Ok(())
    }
}

impl CheckoutTarget for Git2Repository {
    fn checkout_as(&self, remote: &Remote, branch: &str, local: &str) -> Result<()> {
        self.fetch(remote)?;
        let tracking = format!("{}/{}", remote.name, branch);
        let commit = self
            .repo
            .find_reference(&format!("refs/remotes/{}", tracking))
            .and_then(|r| r.peel_to_commit())
            .local_err(format!("cannot resolve {}", tracking))?;

        if self.repo.find_branch(local, BranchType::Local).is_err() {
            let mut created = self
                .repo
                .branch(local, &commit, false)
                .local_err(format!("cannot create branch '{}'", local))?;
            if let Err(e) = created.set_upstream(Some(&tracking)) {
                tracing::debug!("cannot track {} from {}: {}", tracking, local, e);
            }
        }

        self.refresh_index()?;
        self.repo
            .set_head(&branch_ref(local))
            .local_err(format!("cannot switch to '{}'", local))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(commit.as_object(), ResetType::Hard, Some(&mut checkout))
            .local_err(format!("cannot reset '{}' to {}", local, tracking))
    }

    fn checkout_onto_workspace(&self, remote: &Remote, branch: &str) -> Result<()> {
        let commit = self.snapshot_commit(remote, branch)?;
        let tree = commit
            .tree()
            .local_err(format!("cannot read tree of '{}'", branch))?;

        let mut entries = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    entries.push((format!("{}{}", dir, name), entry.id(), entry.filemode()));
                }
            }
            TreeWalkResult::Ok
        })
        .local_err(format!("cannot walk tree of '{}'", branch))?;

        tracing::debug!(files = entries.len(), branch, "overlaying files onto workspace");
        for (rel, oid, mode) in entries {
            self.overlay_file(&rel, oid, mode)?;
        }
        Ok(())
    }
}

impl Pusher for Git2Repository {
    fn push_all(&self, remote: &Remote, refnames: &[String]) -> Result<()> {
        if refnames.is_empty() {
            return Ok(());
        }
        self.cancel.check()?;
        let mut git_remote = self.ensure_remote(remote)?;
        let url = git_remote.url().unwrap_or(&remote.url).to_string();

        let rejected: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let mut callbacks = remote_callbacks(&url, &self.cancel);
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejected.borrow_mut().push(format!("{}: {}", refname, status));
            }
            Ok(())
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspecs: Vec<String> = refnames.iter().map(|r| format!("+{0}:{0}", r)).collect();
        tracing::debug!(remote = %remote.name, refs = refspecs.len(), "pushing");
        git_remote
            .push(&refspecs, Some(&mut options))
            .map_err(|e| {
                self.transfer_failed(
                    e,
                    format!("cannot push {} reference(s) to '{}'", refspecs.len(), remote.name),
                )
            })?;

        let rejected = rejected.take();
        if !rejected.is_empty() {
            return Err(DeviateError::remote(format!(
                "push to '{}' rejected {}",
                remote.name,
                rejected.join(", ")
            )));
        }
        Ok(())
    }
}

impl BranchDeleter for Git2Repository {
    /// Deleting the checked out branch detaches HEAD at its commit first.
    fn delete_branch(&self, branch: &str) -> Result<()> {
        let mut found = self
            .repo
            .find_branch(branch, BranchType::Local)
            .local_err(format!("cannot find branch '{}'", branch))?;
        if found.is_head() {
            let head = self.head_id()?;
            self.repo
                .set_head_detached(head)
                .local_err("cannot detach HEAD")?;
        }
        found
            .delete()
            .local_err(format!("cannot delete branch '{}'", branch))
    }
}

impl Committer for Git2Repository {
    fn commit_changes(&self, message: &str) -> Result<Change<CommitInfo>> {
        let mut index = self.refresh_index()?;
        let mut status_options = StatusOptions::new();
        status_options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut status_options))
            .local_err("cannot read worktree status")?;
        if statuses.is_empty() {
            return Ok(Change::UpToDate);
        }

        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .local_err("cannot stage changes")?;
        index
            .update_all(["*"].iter(), None)
            .local_err("cannot stage deletions")?;
        index.write().local_err("cannot write index")?;
        let tree_id = index.write_tree().local_err("cannot write tree")?;
        let tree = self.repo.find_tree(tree_id).local_err("cannot find tree")?;

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                return Ok(Change::UpToDate);
            }
        }

        let signature = self
            .repo
            .signature()
            .or_else(|_| Signature::now("deviate", "deviate@localhost"))
            .local_err("cannot create signature")?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .local_err("cannot commit")?;

        let files_changed = match &parent {
            Some(parent) => parent
                .tree()
                .and_then(|old| self.repo.diff_tree_to_tree(Some(&old), Some(&tree), None))
                .map(|diff| diff.deltas().len())
                .unwrap_or(0),
            None => tree.len(),
        };

        Ok(Change::Changed(CommitInfo {
            hash: oid.to_string(),
            message: message.to_string(),
            author: signature.name().unwrap_or("unknown").to_string(),
            files_changed,
        }))
    }
}

impl Merger for Git2Repository {
    fn merge(&self, remote: Option<&Remote>, branch: &str) -> Result<Change<String>> {
        if let Some(remote) = remote {
            self.fetch(remote)?;
        }
        let before = self.head_id()?;
        let target = match remote {
            Some(remote) => format!("{}/{}", remote.name, branch),
            None => branch.to_string(),
        };
        let message = format!("Merge {}", target);

        if let Err(e) = self.exec.run(
            "git",
            &["merge", "--commit", "--quiet", "--log", "-m", &message, &target],
        ) {
            self.exec.run_permissive("git", &["merge", "--abort"]);
            return Err(e).local_err(format!("cannot merge {}", target));
        }

        let after = self.head_id()?;
        if before == after {
            return Ok(Change::UpToDate);
        }
        Ok(Change::Changed(after.to_string()))
    }
}

impl RemoteLister for Git2Repository {
    fn list_remote(&self, remote: &Remote) -> Result<Vec<RemoteRef>> {
        self.cancel.check()?;
        let mut detached = git2::Remote::create_detached(remote.url.as_str())
            .remote_err(format!("invalid remote URL '{}'", remote.url))?;
        let callbacks = remote_callbacks(&remote.url, &self.cancel);
        let connection = detached
            .connect_auth(Direction::Fetch, Some(callbacks), None)
            .map_err(|e| self.transfer_failed(e, format!("cannot connect to '{}'", remote.url)))?;
        let heads = connection
            .list()
            .remote_err(format!("cannot list references of '{}'", remote.url))?;
        let refs: Vec<RemoteRef> = heads
            .iter()
            .map(|head| RemoteRef {
                name: head.name().to_string(),
                target: head.oid().to_string(),
            })
            .collect();
        Ok(refs)
    }
}

impl RemoteUrlInformer for Git2Repository {
    fn remote_url(&self, name: &str) -> Result<String> {
        let remote = self
            .repo
            .find_remote(name)
            .remote_err(format!("cannot find remote '{}'", name))?;
        remote
            .url()
            .map(|u| u.to_string())
            .ok_or_else(|| DeviateError::remote(format!("remote '{}' has no URL", name)))
    }
}

impl TagLister for Git2Repository {
    fn list_tags(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None).local_err("cannot list tags")?;
        let mut names: Vec<String> = tags.iter().flatten().map(|s| s.to_string()).collect();
        names.sort();
        Ok(names)
    }
}
