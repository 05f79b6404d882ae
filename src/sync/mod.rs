//! The sync workflow
//!
//! [Operation::run] executes a fixed sequence of steps against one working copy:
//!
//! 1. mirror upstream releases missing downstream, then resync recent releases
//! 2. synchronize tags
//! 3. reset `release-next` to upstream's main branch plus fork files and patches
//! 4. push a disposable branch triggering CI on `release-next`
//! 5. open (or find) the pull request for that branch
//!
//! The first failing step stops the run. Whatever the outcome, the working copy is
//! switched back to the main branch before [Operation::run] returns.

mod fork_files;
mod mirror;
mod pull_request;
mod release_next;
mod resync;
mod tags;
mod trigger_ci;

use crate::cancel::CancellationToken;
use crate::config::{Config, Project};
use crate::domain::{ReleaseSearch, ReleaseTemplate};
use crate::error::{sync_failed, Result};
use crate::exec::Executor;
use crate::git::{branch_ref, Change, Repository};
use crate::github::PullRequestGateway;
use crate::ui;

type Step<R, G> = (&'static str, fn(&Operation<R, G>) -> Result<()>);

/// A sync run over one project
pub struct Operation<R: Repository, G: PullRequestGateway> {
    config: Config,
    project: Project,
    repository: R,
    github: G,
    exec: Executor,
    upstream_search: ReleaseSearch,
    downstream_search: ReleaseSearch,
    upstream_template: ReleaseTemplate,
    downstream_template: ReleaseTemplate,
    workflows_glob: glob::Pattern,
    tags_pattern: glob::Pattern,
}

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    /// Prepare a run, compiling the configured searches, templates and globs
    pub fn new(
        config: Config,
        project: Project,
        repository: R,
        github: G,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let exec = Executor::new(&project.path, cancel);
        Ok(Operation {
            upstream_search: config.upstream_search()?,
            downstream_search: config.downstream_search()?,
            upstream_template: config.upstream_template()?,
            downstream_template: config.downstream_template()?,
            workflows_glob: config.workflows_glob()?,
            tags_pattern: config.tags_pattern()?,
            config,
            project,
            repository,
            github,
            exec,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn github(&self) -> &G {
        &self.github
    }

    /// Execute the whole workflow
    ///
    /// A failure is reported as [crate::error::DeviateError::SyncFailed] wrapping
    /// the failing step's error. The working copy ends on the main branch in both
    /// cases, unless switching to it fails too (which is only logged).
    pub fn run(&self) -> Result<()> {
        let span = tracing::info_span!("sync");
        let _enter = span.enter();

        let steps: [Step<R, G>; 5] = [
            ("mirror releases", Self::mirror_releases),
            ("sync tags", Self::sync_tags),
            ("sync release-next", Self::sync_release_next),
            ("trigger CI", Self::trigger_ci),
            ("create sync PR", Self::create_sync_release_next_pr),
        ];
        let result = self.run_steps(&steps);
        if let Err(e) = self.switch_to_main() {
            tracing::warn!(
                "cannot switch back to {}: {}",
                ui::name(&self.config.branches.main),
                e
            );
        }
        result.map_err(sync_failed)
    }

    fn run_steps(&self, steps: &[Step<R, G>]) -> Result<()> {
        for (name, step) in steps {
            tracing::debug!(step = *name, "running step");
            step(self)?;
        }
        Ok(())
    }

    /// Check out the downstream main branch as the local main branch
    pub(crate) fn switch_to_main(&self) -> Result<()> {
        let main = &self.config.branches.main;
        self.repository
            .checkout(&self.config.downstream_remote(), main)
            .as_branch(main)
    }

    pub(crate) fn commit_changes(&self, message: &str) -> Result<()> {
        tracing::info!("- Committing changes: {}", message);
        match self.repository.commit_changes(message)? {
            Change::UpToDate => tracing::info!("-- No changes to commit"),
            Change::Changed(commit) => tracing::info!(
                "-- Committed {} ({} file(s) changed)",
                ui::name(commit.short_hash()),
                commit.files_changed
            ),
        }
        Ok(())
    }

    /// Push a reference downstream, unless this is a dry run
    pub(crate) fn publish(&self, title: &str, refname: &str) -> Result<()> {
        if self.config.dry_run {
            tracing::info!(
                "{}",
                ui::notice(format!("- Skipping {}, because of dry run", title))
            );
            return Ok(());
        }
        tracing::info!("- Pushing {}", ui::name(refname));
        self.repository
            .push(&self.config.downstream_remote(), refname)
    }

    /// Push several references downstream in one go, unless this is a dry run
    pub(crate) fn publish_all(&self, title: &str, refnames: &[String]) -> Result<()> {
        if self.config.dry_run {
            tracing::info!(
                "{}",
                ui::notice(format!("- Skipping {}, because of dry run", title))
            );
            return Ok(());
        }
        tracing::info!("- Pushing {} reference(s)", refnames.len());
        self.repository
            .push_all(&self.config.downstream_remote(), refnames)
    }

    /// Publish a branch, then delete its local copy
    pub(crate) fn push_branch(&self, title: &str, branch: &str) -> Result<()> {
        self.publish(title, &branch_ref(branch))?;
        self.repository.delete_branch(branch)
    }
}
