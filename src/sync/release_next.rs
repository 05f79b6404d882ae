use super::Operation;
use crate::error::Result;
use crate::git::Repository;
use crate::github::PullRequestGateway;
use crate::ui;

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    /// Rebuild `release-next` from upstream's main branch and publish it
    pub(crate) fn sync_release_next(&self) -> Result<()> {
        self.reset_release_next()?;
        self.add_fork_files()?;
        self.apply_patches()?;
        self.push_branch("release-next push", &self.config.branches.release_next)
    }

    /// Hard-reset the local `release-next` to `upstream/<main>`, dropping its history
    fn reset_release_next(&self) -> Result<()> {
        let branches = &self.config.branches;
        tracing::info!(
            "Reset {} branch to upstream/{}",
            ui::name(&branches.release_next),
            ui::name(&branches.main)
        );
        self.repository
            .checkout(&self.config.upstream_remote(), &branches.main)
            .as_branch(&branches.release_next)
    }
}
