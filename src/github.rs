//! Pull request gateway
//!
//! Pull requests are managed through the `gh` command line client, which brings its
//! own authentication (`GH_TOKEN` or `gh auth login`). The gateway is a trait so
//! the sync workflow can be exercised with a recording fake.

use crate::cancel::CancellationToken;
use crate::error::{DeviateError, Result, ResultExt};
use crate::exec::Executor;
use serde::Deserialize;
use std::path::PathBuf;

/// An open pull request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub url: String,
}

/// Search for an open pull request authored by the running identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSearch {
    /// Repository coordinate, e.g. `openshift-knative/serving`
    pub repo: String,
    pub title: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub repo: String,
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
    pub labels: Vec<String>,
}

impl NewPullRequest {
    /// The search that finds this pull request once opened
    pub fn search(&self) -> PrSearch {
        PrSearch {
            repo: self.repo.clone(),
            title: self.title.clone(),
            labels: self.labels.clone(),
        }
    }
}

pub trait PullRequestGateway {
    /// First open pull request matching the search, `None` when there is none
    fn find_open(&self, search: &PrSearch) -> Result<Option<PullRequest>>;

    /// Open a pull request, returning the client's report (usually its URL)
    fn create(&self, pr: &NewPullRequest) -> Result<String>;
}

/// [PullRequestGateway] running `gh`
pub struct GhCli {
    exec: Executor,
}

impl GhCli {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        let exec = Executor::new(dir, cancel)
            .with_env("NO_COLOR", "1")
            .with_env("GH_NO_UPDATE_NOTIFIER", "1")
            .with_env("GH_PROMPT_DISABLED", "1");
        GhCli { exec }
    }

    fn run(&self, args: &[String]) -> Result<Vec<u8>> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.exec.run("gh", &args)
    }
}

impl PullRequestGateway for GhCli {
    fn find_open(&self, search: &PrSearch) -> Result<Option<PullRequest>> {
        let out = self
            .run(&list_args(search))
            .github_err(format!("cannot list pull requests of {}", search.repo))?;
        parse_list(&out)
    }

    fn create(&self, pr: &NewPullRequest) -> Result<String> {
        let out = self
            .run(&create_args(pr))
            .github_err(format!("cannot open pull request {} -> {}", pr.head, pr.base))?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }
}

/// Arguments of `gh pr list` for a search
pub fn list_args(search: &PrSearch) -> Vec<String> {
    let mut args = strings(&[
        "pr",
        "list",
        "--repo",
        &search.repo,
        "--state",
        "open",
        "--author",
        "@me",
        "--search",
        &search.title,
        "--json",
        "url",
    ]);
    push_labels(&mut args, &search.labels);
    args
}

/// Arguments of `gh pr create`
pub fn create_args(pr: &NewPullRequest) -> Vec<String> {
    let mut args = strings(&[
        "pr", "create", "--repo", &pr.repo, "--body", &pr.body, "--title", &pr.title, "--base",
        &pr.base, "--head", &pr.head,
    ]);
    push_labels(&mut args, &pr.labels);
    args
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn push_labels(args: &mut Vec<String>, labels: &[String]) {
    for label in labels {
        args.push("--label".to_string());
        args.push(label.clone());
    }
}

fn parse_list(out: &[u8]) -> Result<Option<PullRequest>> {
    if out.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let prs: Vec<PullRequest> = serde_json::from_slice(out).map_err(|e| {
        DeviateError::GithubClientFailed {
            message: "cannot parse pull request list".to_string(),
            source: Some(Box::new(e)),
        }
    })?;
    Ok(prs.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_pr() -> NewPullRequest {
        NewPullRequest {
            repo: "openshift-knative/serving".to_string(),
            title: ":robot: Synchronize branch `release-next` to `upstream/main`".to_string(),
            body: "body".to_string(),
            base: "release-next".to_string(),
            head: "ci/release-next".to_string(),
            labels: vec!["kind/sync-fork-to-upstream".to_string(), "ok".to_string()],
        }
    }

    #[test]
    fn test_list_args() {
        let args = list_args(&new_pr().search());
        assert_eq!(
            args,
            vec![
                "pr",
                "list",
                "--repo",
                "openshift-knative/serving",
                "--state",
                "open",
                "--author",
                "@me",
                "--search",
                ":robot: Synchronize branch `release-next` to `upstream/main`",
                "--json",
                "url",
                "--label",
                "kind/sync-fork-to-upstream",
                "--label",
                "ok",
            ]
        );
    }

    #[test]
    fn test_create_args() {
        let args = create_args(&new_pr());
        assert_eq!(&args[..4], &["pr", "create", "--repo", "openshift-knative/serving"]);
        let base = args.iter().position(|a| a == "--base").unwrap();
        assert_eq!(args[base + 1], "release-next");
        let head = args.iter().position(|a| a == "--head").unwrap();
        assert_eq!(args[head + 1], "ci/release-next");
        assert_eq!(args.iter().filter(|a| *a == "--label").count(), 2);
    }

    #[test]
    fn test_parse_list() {
        let found = parse_list(br#"[{"url":"https://github.com/o/r/pull/7"},{"url":"x"}]"#).unwrap();
        assert_eq!(
            found,
            Some(PullRequest {
                url: "https://github.com/o/r/pull/7".to_string()
            })
        );
        assert_eq!(parse_list(b"[]\n").unwrap(), None);
        assert_eq!(parse_list(b"").unwrap(), None);
    }

    #[test]
    fn test_parse_list_garbage_is_client_failure() {
        let err = parse_list(b"not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GithubClientFailed);
    }
}
