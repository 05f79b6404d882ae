use crate::domain::{ReleaseSearch, ReleaseTemplate};
use crate::error::{DeviateError, Result};
use crate::git::{Remote, RemoteUrlInformer, DOWNSTREAM, ORIGIN, UPSTREAM};
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding configuration fields
pub const ENV_PREFIX: &str = "DEVIATE";

/// Default name of the configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = ".deviate.yaml";

/// Represents the complete configuration of a sync run.
///
/// Every key is optional in the file; missing keys keep their defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub upstream: String,
    pub downstream: String,
    pub dry_run: bool,
    pub github_workflows_removal_glob: String,
    pub resync_releases: ResyncReleases,
    pub branches: Branches,
    pub tags: Tags,
    pub messages: Messages,
    pub sync_labels: Vec<String>,
}

/// Resyncing of already mirrored releases
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResyncReleases {
    pub enabled: bool,
    pub number_of: usize,
}

impl Default for ResyncReleases {
    fn default() -> Self {
        ResyncReleases {
            enabled: false,
            number_of: 6,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Branches {
    pub main: String,
    pub release_next: String,
    /// Prefix of disposable CI and resync branches
    pub synch_ci: String,
    pub release_templates: ReleaseTemplates,
    pub searches: Searches,
}

impl Default for Branches {
    fn default() -> Self {
        Branches {
            main: "main".to_string(),
            release_next: "release-next".to_string(),
            synch_ci: "ci/".to_string(),
            release_templates: ReleaseTemplates::default(),
            searches: Searches::default(),
        }
    }
}

/// Templates rendering a release into a branch name
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReleaseTemplates {
    pub upstream: String,
    pub downstream: String,
}

/// Returns the default release branch template.
fn default_release_template() -> String {
    "release-{{ .Major }}.{{ .Minor }}".to_string()
}

impl Default for ReleaseTemplates {
    fn default() -> Self {
        ReleaseTemplates {
            upstream: default_release_template(),
            downstream: default_release_template(),
        }
    }
}

/// Regular expressions finding release branches
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Searches {
    pub upstream_releases: String,
    pub downstream_releases: String,
}

/// Returns the default release branch search expression.
fn default_release_search() -> String {
    r"^release-(\d+)\.(\d+)$".to_string()
}

impl Default for Searches {
    fn default() -> Self {
        Searches {
            upstream_releases: default_release_search(),
            downstream_releases: default_release_search(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Tags {
    pub synchronize: bool,
    /// Glob selecting the tags to synchronize
    pub ref_spec: String,
}

impl Default for Tags {
    fn default() -> Self {
        Tags {
            synchronize: false,
            ref_spec: "v*".to_string(),
        }
    }
}

/// Commit messages and pull request texts, with positional `%s` markers
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Messages {
    pub trigger_ci: String,
    pub trigger_ci_body: String,
    pub apply_fork_files: String,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            trigger_ci: ":robot: Synchronize branch `%s` to `upstream/%s`".to_string(),
            trigger_ci_body: "This automated PR is to make sure the forked project's `%s` \
                branch (forked upstream's `%s` branch) passes a CI."
                .to_string(),
            apply_fork_files: ":open_file_folder: Apply fork specific files".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            upstream: String::new(),
            downstream: String::new(),
            dry_run: false,
            github_workflows_removal_glob: "knative-*.y?ml".to_string(),
            resync_releases: ResyncReleases::default(),
            branches: Branches::default(),
            tags: Tags::default(),
            messages: Messages::default(),
            sync_labels: vec!["kind/sync-fork-to-upstream".to_string()],
        }
    }
}

/// Locations of a project being synchronized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub config_path: PathBuf,
    /// Root of the git working copy
    pub path: PathBuf,
}

impl Project {
    /// A project rooted at `path`, or at the directory holding the config file
    pub fn new(config_path: impl Into<PathBuf>, path: Option<PathBuf>) -> Self {
        let config_path = config_path.into();
        let path = path.unwrap_or_else(|| {
            config_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        Project { config_path, path }
    }
}

impl Config {
    /// Loads the configuration of a project.
    ///
    /// Order of precedence, lowest first:
    /// 1. Built-in defaults
    /// 2. The YAML config file
    /// 3. `DEVIATE_*` environment variables
    /// 4. The `upstream`/`downstream` (or `origin`) git remotes, for empty remote URLs
    ///
    /// The result is validated before it is returned.
    ///
    /// # Returns
    /// * `Ok(Config)` - A validated configuration
    /// * `Err(ConfigurationInvalid)` - The file is unreadable or malformed, or validation fails
    pub fn load(project: &Project, informer: &impl RemoteUrlInformer) -> Result<Config> {
        let mut config = Config::from_file(&project.config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.default_from_git(informer);
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file over the built-in defaults
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeviateError::config(format!("{} - config file can't be read: {}", path.display(), e))
        })?;
        Config::from_yaml(&content).map_err(|e| match e {
            DeviateError::ConfigurationInvalid(msg) => {
                DeviateError::config(format!("{} - {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Config> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| DeviateError::config(format!("config file have invalid format: {}", e)))
    }

    /// Apply `DEVIATE_*` overrides, reading variables through `lookup`.
    ///
    /// Variable names are the field path in SCREAMING_SNAKE_CASE, e.g.
    /// `DEVIATE_BRANCHES_RELEASE_NEXT`. `DEVIATE_SYNC_LABELS` is comma separated.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |field: &str| lookup(&format!("{}_{}", ENV_PREFIX, field));

        set_string(&mut self.upstream, var("UPSTREAM"));
        set_string(&mut self.downstream, var("DOWNSTREAM"));
        set_bool(&mut self.dry_run, "DRY_RUN", var("DRY_RUN"))?;
        set_string(
            &mut self.github_workflows_removal_glob,
            var("GITHUB_WORKFLOWS_REMOVAL_GLOB"),
        );

        set_bool(
            &mut self.resync_releases.enabled,
            "RESYNC_RELEASES_ENABLED",
            var("RESYNC_RELEASES_ENABLED"),
        )?;
        if let Some(value) = var("RESYNC_RELEASES_NUMBER_OF") {
            self.resync_releases.number_of = value.trim().parse().map_err(|_| {
                DeviateError::config(format!(
                    "{}_RESYNC_RELEASES_NUMBER_OF: '{}' is not a number",
                    ENV_PREFIX, value
                ))
            })?;
        }

        let branches = &mut self.branches;
        set_string(&mut branches.main, var("BRANCHES_MAIN"));
        set_string(&mut branches.release_next, var("BRANCHES_RELEASE_NEXT"));
        set_string(&mut branches.synch_ci, var("BRANCHES_SYNCH_CI"));
        set_string(
            &mut branches.release_templates.upstream,
            var("BRANCHES_RELEASE_TEMPLATES_UPSTREAM"),
        );
        set_string(
            &mut branches.release_templates.downstream,
            var("BRANCHES_RELEASE_TEMPLATES_DOWNSTREAM"),
        );
        set_string(
            &mut branches.searches.upstream_releases,
            var("BRANCHES_SEARCHES_UPSTREAM_RELEASES"),
        );
        set_string(
            &mut branches.searches.downstream_releases,
            var("BRANCHES_SEARCHES_DOWNSTREAM_RELEASES"),
        );

        set_bool(&mut self.tags.synchronize, "TAGS_SYNCHRONIZE", var("TAGS_SYNCHRONIZE"))?;
        set_string(&mut self.tags.ref_spec, var("TAGS_REF_SPEC"));

        set_string(&mut self.messages.trigger_ci, var("MESSAGES_TRIGGER_CI"));
        set_string(&mut self.messages.trigger_ci_body, var("MESSAGES_TRIGGER_CI_BODY"));
        set_string(&mut self.messages.apply_fork_files, var("MESSAGES_APPLY_FORK_FILES"));

        if let Some(labels) = var("SYNC_LABELS") {
            self.sync_labels = labels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Fill empty remote URLs from the working copy's git remotes.
    ///
    /// `downstream` falls back to `origin`. Every value taken is logged as a warning.
    pub fn default_from_git(&mut self, informer: &impl RemoteUrlInformer) {
        if self.upstream.is_empty() {
            if let Ok(url) = informer.remote_url(UPSTREAM) {
                tracing::warn!(
                    "Using upstream remote URL as upstream remote: {}",
                    style(&url).yellow()
                );
                self.upstream = url;
            }
        }
        if self.downstream.is_empty() {
            if let Ok(url) = informer.remote_url(DOWNSTREAM) {
                tracing::warn!(
                    "Using downstream remote URL as downstream remote: {}",
                    style(&url).yellow()
                );
                self.downstream = url;
            } else if let Ok(url) = informer.remote_url(ORIGIN) {
                tracing::warn!(
                    "Using origin remote URL as downstream remote: {}",
                    style(&url).yellow()
                );
                self.downstream = url;
            }
        }
    }

    /// Check required fields and that every pattern and template compiles
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("upstream", &self.upstream),
            ("downstream", &self.downstream),
            ("githubWorkflowsRemovalGlob", &self.github_workflows_removal_glob),
            ("branches.main", &self.branches.main),
            ("branches.releaseNext", &self.branches.release_next),
            ("branches.synchCi", &self.branches.synch_ci),
            ("branches.releaseTemplates.upstream", &self.branches.release_templates.upstream),
            ("branches.releaseTemplates.downstream", &self.branches.release_templates.downstream),
            ("branches.searches.upstreamReleases", &self.branches.searches.upstream_releases),
            ("branches.searches.downstreamReleases", &self.branches.searches.downstream_releases),
            ("tags.refSpec", &self.tags.ref_spec),
            ("messages.triggerCi", &self.messages.trigger_ci),
            ("messages.triggerCiBody", &self.messages.trigger_ci_body),
            ("messages.applyForkFiles", &self.messages.apply_fork_files),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DeviateError::config(format!("{}: non zero value required", field)));
            }
        }
        if self.sync_labels.is_empty() || self.sync_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(DeviateError::config("syncLabels: non zero value required"));
        }

        self.upstream_search()?;
        self.downstream_search()?;
        self.upstream_template()?;
        self.downstream_template()?;
        self.workflows_glob()?;
        self.tags_pattern()?;
        Ok(())
    }

    pub fn upstream_remote(&self) -> Remote {
        Remote::upstream(&self.upstream)
    }

    pub fn downstream_remote(&self) -> Remote {
        Remote::downstream(&self.downstream)
    }

    pub fn upstream_search(&self) -> Result<ReleaseSearch> {
        ReleaseSearch::new(&self.branches.searches.upstream_releases)
    }

    pub fn downstream_search(&self) -> Result<ReleaseSearch> {
        ReleaseSearch::new(&self.branches.searches.downstream_releases)
    }

    pub fn upstream_template(&self) -> Result<ReleaseTemplate> {
        ReleaseTemplate::new(&self.branches.release_templates.upstream)
    }

    pub fn downstream_template(&self) -> Result<ReleaseTemplate> {
        ReleaseTemplate::new(&self.branches.release_templates.downstream)
    }

    /// Glob matching upstream workflow file names to remove
    pub fn workflows_glob(&self) -> Result<glob::Pattern> {
        compile_glob("githubWorkflowsRemovalGlob", &self.github_workflows_removal_glob)
    }

    /// Glob matching tag names to synchronize
    pub fn tags_pattern(&self) -> Result<glob::Pattern> {
        compile_glob("tags.refSpec", &self.tags.ref_spec)
    }

    /// Name of the disposable branch used to sync `branch`
    pub fn sync_branch(&self, branch: &str) -> String {
        format!("{}{}", self.branches.synch_ci, branch)
    }
}

fn compile_glob(field: &str, pattern: &str) -> Result<glob::Pattern> {
    glob::Pattern::new(pattern)
        .map_err(|e| DeviateError::config(format!("{}: invalid glob '{}': {}", field, pattern, e)))
}

fn set_string(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_bool(field: &mut bool, name: &str, value: Option<String>) -> Result<()> {
    let value = match value {
        Some(v) => v,
        None => return Ok(()),
    };
    *field = match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
        "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
        other => {
            return Err(DeviateError::config(format!(
                "{}_{}: '{}' is not a boolean",
                ENV_PREFIX, name, other
            )))
        }
    };
    Ok(())
}
