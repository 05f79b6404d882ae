use super::Operation;
use crate::error::Result;
use crate::git::{tag_ref, Repository};
use crate::github::PullRequestGateway;
use crate::ui;

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    /// Publish upstream tags matching `tags.refSpec` to the fork
    pub(crate) fn sync_tags(&self) -> Result<()> {
        if !self.config.tags.synchronize {
            tracing::debug!("tag synchronization disabled");
            return Ok(());
        }
        tracing::info!("- Syncing tags: {}", ui::name(&self.config.tags.ref_spec));

        self.repository.fetch(&self.config.upstream_remote())?;
        let refs: Vec<String> = self
            .repository
            .list_tags()?
            .iter()
            .filter(|t| self.tags_pattern.matches(t))
            .map(|t| tag_ref(t))
            .collect();
        if refs.is_empty() {
            tracing::info!("-- No matching tags");
            return Ok(());
        }
        tracing::debug!(?refs, "tags to synchronize");

        self.publish_all("tag synchronization", &refs)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::git::mock::Call;
    use crate::git::MockRepository;
    use tempfile::TempDir;

    fn repo() -> MockRepository {
        MockRepository::new().with_tags(&["v1.30.0", "knative-v1.30.0", "v1.31.0"])
    }

    #[test]
    fn test_disabled_tags_do_nothing() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, config(), repo());

        op.sync_tags().unwrap();
        assert!(op.repository().calls().is_empty());
    }

    #[test]
    fn test_matching_tags_are_pushed() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.tags.synchronize = true;
        let op = operation(&dir, config, repo());

        op.sync_tags().unwrap();

        let calls = op.repository().calls();
        assert_eq!(calls[0], Call::Fetch("upstream".to_string()));
        assert_eq!(
            calls[1..],
            [Call::PushAll {
                remote: "downstream".to_string(),
                refnames: vec![
                    "refs/tags/v1.30.0".to_string(),
                    "refs/tags/v1.31.0".to_string(),
                ],
            }]
        );
        assert_eq!(
            op.repository().pushed(),
            vec!["downstream:refs/tags/v1.30.0", "downstream:refs/tags/v1.31.0"]
        );
    }

    #[test]
    fn test_no_matching_tags_pushes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.tags.synchronize = true;
        config.tags.ref_spec = "release-*".to_string();
        let op = operation(&dir, config, repo());

        op.sync_tags().unwrap();
        assert_eq!(op.repository().calls(), vec![Call::Fetch("upstream".to_string())]);
    }

    #[test]
    fn test_tags_respect_dry_run() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.tags.synchronize = true;
        config.tags.ref_spec = "knative-*".to_string();
        config.dry_run = true;
        let op = operation(&dir, config, repo());

        op.sync_tags().unwrap();
        assert!(op.repository().pushed().is_empty());
    }
}
