//! Terminal styling for log lines and the final report.

use crate::domain::Release;
use console::{style, StyledObject};

/// Highlight a branch, release, or file name
pub fn name<D>(value: D) -> StyledObject<D> {
    style(value).blue()
}

/// Highlight a URL or a warning
pub fn notice<D>(value: D) -> StyledObject<D> {
    style(value).yellow()
}

/// Render releases as a quoted list, e.g. `["1.30" "1.31"]`
pub fn format_releases(releases: &[Release]) -> String {
    let quoted: Vec<String> = releases.iter().map(|r| format!("\"{}\"", r)).collect();
    format!("[{}]", quoted.join(" "))
}

/// Format and print an error chain in red.
pub fn display_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", style("ERROR:").red().bold(), err);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_releases() {
        let releases = vec![Release::new(1, 30), Release::new(1, 31)];
        assert_eq!(format_releases(&releases), "[\"1.30\" \"1.31\"]");
        assert_eq!(format_releases(&[]), "[]");
    }

    #[test]
    fn test_name_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(name("release-next").to_string(), "release-next");
        assert_eq!(notice("https://x").to_string(), "https://x");
    }
}
