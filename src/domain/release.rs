use crate::error::{DeviateError, Result};
use regex::Regex;
use std::fmt;

/// A release line identifier, e.g. `1.31`
///
/// Ordering is lexicographic on `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Release {
    pub major: u32,
    pub minor: u32,
}

impl Release {
    /// Create a new release
    pub fn new(major: u32, minor: u32) -> Self {
        Release { major, minor }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Regular expression that recognizes release branches
///
/// The expression must capture the major and minor numbers in its first two groups,
/// e.g. `^release-(\d+)\.(\d+)$`.
#[derive(Debug, Clone)]
pub struct ReleaseSearch {
    re: Regex,
}

impl ReleaseSearch {
    pub fn new(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|e| {
            DeviateError::config(format!("invalid release search '{}': {}", pattern, e))
        })?;
        // captures_len counts the implicit whole-match group
        if re.captures_len() < 3 {
            return Err(DeviateError::config(format!(
                "release search '{}' must capture major and minor numbers",
                pattern
            )));
        }
        Ok(ReleaseSearch { re })
    }

    /// Extract a release from a branch name, if the branch is a release branch
    pub fn find(&self, branch: &str) -> Option<Release> {
        let caps = self.re.captures(branch)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        Some(Release::new(major, minor))
    }

    /// Collect the distinct releases found in `branches`, ascending
    pub fn releases<'a>(&self, branches: impl IntoIterator<Item = &'a str>) -> Vec<Release> {
        let mut releases: Vec<Release> = branches.into_iter().filter_map(|b| self.find(b)).collect();
        releases.sort();
        releases.dedup();
        releases
    }
}

/// Every release of `upstream` absent from `downstream`, ascending
pub fn missing_releases(upstream: &[Release], downstream: &[Release]) -> Vec<Release> {
    let mut missing: Vec<Release> = upstream
        .iter()
        .filter(|r| !downstream.contains(r))
        .copied()
        .collect();
    missing.sort();
    missing
}
