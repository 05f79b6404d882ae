use super::Operation;
use crate::domain::{format_message, Release};
use crate::error::Result;
use crate::git::{branch_ref, Change, Repository};
use crate::github::PullRequestGateway;
use crate::ui;

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    /// Merge upstream fixes into the most recent downstream releases.
    ///
    /// `excluded` holds the releases mirrored by this run; they are up to date already.
    pub(crate) fn resync_releases(&self, excluded: &[Release]) -> Result<()> {
        let resync = &self.config.resync_releases;
        if !resync.enabled {
            return Ok(());
        }

        let candidates: Vec<Release> = self
            .upstream_releases()?
            .into_iter()
            .filter(|r| !excluded.contains(r))
            .collect();
        let releases = trailing(candidates, resync.number_of);
        if releases.is_empty() {
            tracing::info!("No releases to re-sync");
            return Ok(());
        }

        tracing::info!(
            "Re-syncing releases: {}",
            ui::name(ui::format_releases(&releases))
        );
        for release in releases {
            self.resync_release(release)?;
        }
        Ok(())
    }

    fn resync_release(&self, release: Release) -> Result<()> {
        let upstream_branch = self.upstream_template.render(release);
        let downstream_branch = self.downstream_template.render(release);
        let sync_branch = self.config.sync_branch(&downstream_branch);

        tracing::info!("Re-syncing release: {}", ui::name(release));
        self.repository
            .checkout(&self.config.downstream_remote(), &downstream_branch)
            .as_branch(&sync_branch)?;

        let result = self.merge_upstream(&upstream_branch, &downstream_branch, &sync_branch);
        self.discard_branch(&sync_branch);
        result
    }

    fn merge_upstream(
        &self,
        upstream_branch: &str,
        downstream_branch: &str,
        sync_branch: &str,
    ) -> Result<()> {
        let upstream = self.config.upstream_remote();
        match self.repository.merge(Some(&upstream), upstream_branch)? {
            Change::UpToDate => {
                tracing::info!("- no changes detected");
                Ok(())
            }
            Change::Changed(head) => {
                tracing::info!("- changes detected, merged as {}", ui::name(&head));
                self.publish("release re-sync push", &branch_ref(sync_branch))?;

                let messages = &self.config.messages;
                let args = [downstream_branch, upstream_branch];
                self.create_pr(
                    &format_message(&messages.trigger_ci, &args),
                    &format_message(&messages.trigger_ci_body, &args),
                    downstream_branch,
                    sync_branch,
                )
            }
        }
    }

    /// Switch to main and delete a disposable branch; failures are only logged
    fn discard_branch(&self, branch: &str) {
        let result = self
            .switch_to_main()
            .and_then(|_| self.repository.delete_branch(branch));
        if let Err(e) = result {
            tracing::warn!("cannot delete branch {}: {}", ui::name(branch), e);
        }
    }
}

/// The last `n` releases
fn trailing(releases: Vec<Release>, n: usize) -> Vec<Release> {
    let skip = releases.len().saturating_sub(n);
    releases.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::error::ErrorKind;
    use crate::git::mock::{Call, MergeOutcome};
    use crate::git::MockRepository;
    use tempfile::TempDir;

    fn releases(n: u32) -> Vec<Release> {
        (0..n).map(|minor| Release::new(1, minor)).collect()
    }

    fn repo() -> MockRepository {
        MockRepository::new().with_remote_branches(
            UPSTREAM_URL,
            &["main", "release-1.0", "release-1.1", "release-1.2", "release-1.3", "release-1.4"],
        )
    }

    fn enabled(number_of: usize) -> crate::config::Config {
        let mut config = config();
        config.resync_releases.enabled = true;
        config.resync_releases.number_of = number_of;
        config
    }

    fn merges(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Merge { branch, .. } => Some(branch.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_trailing_window() {
        assert_eq!(trailing(releases(5), 2), vec![Release::new(1, 3), Release::new(1, 4)]);
        assert_eq!(trailing(releases(2), 6), releases(2));
        assert!(trailing(releases(3), 0).is_empty());
    }

    #[test]
    fn test_disabled_resync_does_nothing() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, config(), repo());

        op.resync_releases(&[]).unwrap();
        assert!(op.repository().calls().is_empty());
    }

    #[test]
    fn test_window_skips_excluded_releases() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, enabled(2), repo());

        op.resync_releases(&[Release::new(1, 4)]).unwrap();

        assert_eq!(merges(&op.repository().calls()), vec!["release-1.2", "release-1.3"]);
    }

    #[test]
    fn test_up_to_date_release_is_discarded() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, enabled(1), repo());

        op.resync_releases(&[]).unwrap();

        let calls = op.repository().calls();
        assert_eq!(
            &calls[1..],
            &[
                Call::checkout_as("downstream", "release-1.4", "ci/release-1.4"),
                Call::merge(Some("upstream"), "release-1.4"),
                Call::checkout_as("downstream", "main", "main"),
                Call::DeleteBranch("ci/release-1.4".to_string()),
            ]
        );
        assert!(op.repository().pushed().is_empty());
        assert!(op.github().created.borrow().is_empty());
    }

    #[test]
    fn test_changed_release_is_pushed_with_pull_request() {
        let dir = TempDir::new().unwrap();
        let repo = repo().with_merge("release-1.4", MergeOutcome::Merged);
        let op = operation(&dir, enabled(1), repo);

        op.resync_releases(&[]).unwrap();

        assert_eq!(op.repository().pushed(), vec!["downstream:refs/heads/ci/release-1.4"]);
        let created = op.github().created.borrow();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].base, "release-1.4");
        assert_eq!(created[0].head, "ci/release-1.4");
        assert_eq!(
            created[0].title,
            ":robot: Synchronize branch `release-1.4` to `upstream/release-1.4`"
        );
        assert_eq!(
            op.repository().calls().last(),
            Some(&Call::DeleteBranch("ci/release-1.4".to_string()))
        );
    }

    #[test]
    fn test_merge_failure_still_deletes_sync_branch() {
        let dir = TempDir::new().unwrap();
        let repo = repo().with_merge("release-1.4", MergeOutcome::Conflict);
        let op = operation(&dir, enabled(1), repo);

        let err = op.resync_releases(&[]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LocalOperationFailed);
        let calls = op.repository().calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[
                Call::checkout_as("downstream", "main", "main"),
                Call::DeleteBranch("ci/release-1.4".to_string()),
            ]
        );
    }

    #[test]
    fn test_cleanup_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let repo = repo()
            .with_merge("release-1.4", MergeOutcome::Merged)
            .failing_on(Call::DeleteBranch("ci/release-1.4".to_string()));
        let op = operation(&dir, enabled(1), repo);

        assert!(op.resync_releases(&[]).is_ok());
    }
}
