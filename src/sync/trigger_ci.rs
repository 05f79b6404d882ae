use super::Operation;
use crate::domain::format_message;
use crate::error::{Result, ResultExt};
use crate::git::Repository;
use crate::github::PullRequestGateway;
use chrono::{SecondsFormat, Utc};
use std::fs;

/// Marker file rewritten on every run so the CI branch always differs
const CI_MARKER: &str = "ci";

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    /// Push a disposable copy of `release-next` carrying a fresh marker commit
    pub(crate) fn trigger_ci(&self) -> Result<()> {
        tracing::info!("Trigger CI");
        let branches = &self.config.branches;
        let ci_branch = self.config.sync_branch(&branches.release_next);

        self.repository
            .checkout(&self.config.downstream_remote(), &branches.release_next)
            .as_branch(&ci_branch)?;

        let marker = self.project.path.join(CI_MARKER);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        fs::write(&marker, now).local_err(format!("cannot write {}", marker.display()))?;

        self.commit_changes(&self.trigger_ci_message())?;
        self.push_branch("CI trigger push", &ci_branch)
    }

    /// Title of the release-next sync pull request and commit message of the CI trigger
    pub(crate) fn trigger_ci_message(&self) -> String {
        let branches = &self.config.branches;
        format_message(
            &self.config.messages.trigger_ci,
            &[branches.release_next.as_str(), branches.main.as_str()],
        )
    }
}
