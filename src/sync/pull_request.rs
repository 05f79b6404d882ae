use super::Operation;
use crate::domain::format_message;
use crate::error::Result;
use crate::git::{Address, Repository};
use crate::github::{NewPullRequest, PullRequestGateway};
use crate::ui;

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    pub(crate) fn create_sync_release_next_pr(&self) -> Result<()> {
        let branches = &self.config.branches;
        let body = format_message(
            &self.config.messages.trigger_ci_body,
            &[branches.release_next.as_str(), branches.main.as_str()],
        );
        self.create_pr(
            &self.trigger_ci_message(),
            &body,
            &branches.release_next,
            &self.config.sync_branch(&branches.release_next),
        )
    }

    /// Open a pull request unless an identical one is already open.
    ///
    /// The pull request is looked up by title and sync labels among the open pull
    /// requests of the running identity in the downstream repository.
    pub(crate) fn create_pr(&self, title: &str, body: &str, base: &str, head: &str) -> Result<()> {
        tracing::info!("Create a sync PR for: {}", ui::name(base));
        if self.config.dry_run {
            tracing::info!("{}", ui::notice("- Skipping PR creation, because of dry run"));
            return Ok(());
        }

        let pr = NewPullRequest {
            repo: self.downstream_repository()?,
            title: title.to_string(),
            body: body.to_string(),
            base: base.to_string(),
            head: head.to_string(),
            labels: self.config.sync_labels.clone(),
        };
        if let Some(active) = self.github.find_open(&pr.search())? {
            tracing::info!(
                "The PR for {} is already active: {}",
                ui::name(base),
                ui::notice(&active.url)
            );
            return Ok(());
        }

        let report = self.github.create(&pr)?;
        tracing::info!("Github client: {}", report);
        Ok(())
    }

    /// `owner/name` coordinate of the downstream repository
    fn downstream_repository(&self) -> Result<String> {
        Ok(Address::parse(&self.config.downstream)?.path)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::error::ErrorKind;
    use crate::git::MockRepository;
    use tempfile::TempDir;

    #[test]
    fn test_create_pr_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, config(), MockRepository::new());

        op.create_pr("title", "body", "release-1.2", "ci/release-1.2").unwrap();
        op.create_pr("title", "body", "release-1.2", "ci/release-1.2").unwrap();

        assert_eq!(op.github().created.borrow().len(), 1);
        assert_eq!(op.github().searches.borrow().len(), 2);
    }

    #[test]
    fn test_pull_request_carries_labels_and_repository() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.downstream = "https://github.com/openshift-knative/eventing.git".to_string();
        config.sync_labels = vec!["a".to_string(), "b".to_string()];
        let op = operation(&dir, config, MockRepository::new());

        op.create_sync_release_next_pr().unwrap();

        let created = op.github().created.borrow();
        assert_eq!(created[0].repo, "openshift-knative/eventing");
        assert_eq!(created[0].labels, vec!["a", "b"]);
        assert_eq!(
            created[0].body,
            "This automated PR is to make sure the forked project's `release-next` branch \
             (forked upstream's `main` branch) passes a CI."
        );
    }

    #[test]
    fn test_invalid_downstream_address() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.downstream = ":gibberish?sdss.$".to_string();
        let op = operation(&dir, config, MockRepository::new());

        let err = op.create_sync_release_next_pr().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert!(op.github().searches.borrow().is_empty());
    }
}
