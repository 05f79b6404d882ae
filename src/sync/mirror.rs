use super::Operation;
use crate::domain::{missing_releases, Release, ReleaseSearch};
use crate::error::Result;
use crate::git::{Remote, Repository};
use crate::github::PullRequestGateway;
use crate::ui;

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    pub(crate) fn mirror_releases(&self) -> Result<()> {
        tracing::info!("Check if there's an upstream release we need to mirror downstream");

        let missing = self.find_missing_downstream_releases()?;
        if missing.is_empty() {
            tracing::info!("No missing releases found");
        } else {
            tracing::info!(
                "Found missing releases: {}",
                ui::name(ui::format_releases(&missing))
            );
            for release in &missing {
                self.mirror_release(*release)?;
            }
        }

        self.resync_releases(&missing)
    }

    /// Upstream releases without a downstream branch, ascending
    pub(crate) fn find_missing_downstream_releases(&self) -> Result<Vec<Release>> {
        let downstream =
            self.list_releases(&self.config.downstream_remote(), &self.downstream_search)?;
        let upstream = self.upstream_releases()?;
        Ok(missing_releases(&upstream, &downstream))
    }

    pub(crate) fn upstream_releases(&self) -> Result<Vec<Release>> {
        self.list_releases(&self.config.upstream_remote(), &self.upstream_search)
    }

    fn list_releases(&self, remote: &Remote, search: &ReleaseSearch) -> Result<Vec<Release>> {
        let refs = self.repository.list_remote(remote)?;
        tracing::debug!(remote = %remote.name, refs = refs.len(), "listed remote references");
        Ok(search.releases(refs.iter().filter_map(|r| r.branch())))
    }

    fn mirror_release(&self, release: Release) -> Result<()> {
        let upstream_branch = self.upstream_template.render(release);
        let downstream_branch = self.downstream_template.render(release);

        tracing::info!("- Creating new release: {}", ui::name(release));
        let upstream = self.config.upstream_remote();
        self.repository.fetch(&upstream)?;
        self.repository
            .checkout(&upstream, &upstream_branch)
            .as_branch(&downstream_branch)?;

        self.add_fork_files()?;
        self.apply_patches()?;
        self.switch_to_main()?;

        tracing::info!("- Publishing release: {}", ui::name(release));
        self.push_branch("release push", &downstream_branch)
    }
}
