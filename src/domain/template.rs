use crate::domain::Release;
use crate::error::{DeviateError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*\.([A-Za-z]+)\s*\}\}").expect("valid placeholder regex"))
}

/// Branch naming template (e.g. `release-{{ .Major }}.{{ .Minor }}`)
#[derive(Debug, Clone)]
pub struct ReleaseTemplate {
    pub pattern: String,
}

impl ReleaseTemplate {
    /// Create a template, rejecting placeholders other than `.Major` and `.Minor`
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        for caps in placeholder_re().captures_iter(&pattern) {
            let field = &caps[1];
            if field != "Major" && field != "Minor" {
                return Err(DeviateError::config(format!(
                    "unknown placeholder '{}' in release template '{}'",
                    field, pattern
                )));
            }
        }
        Ok(ReleaseTemplate { pattern })
    }

    /// Render the branch name of a release
    /// Example: pattern="release-{{ .Major }}.{{ .Minor }}", release=1.31 -> "release-1.31"
    pub fn render(&self, release: Release) -> String {
        placeholder_re()
            .replace_all(&self.pattern, |caps: &regex::Captures| match &caps[1] {
                "Major" => release.major.to_string(),
                _ => release.minor.to_string(),
            })
            .into_owned()
    }
}

/// Substitute positional `%s` markers in a message template.
///
/// Surplus markers are left untouched; surplus arguments are ignored.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("%s"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_template() {
        let tpl = ReleaseTemplate::new("release-{{ .Major }}.{{ .Minor }}").unwrap();
        assert_eq!(tpl.render(Release::new(1, 31)), "release-1.31");
    }

    #[test]
    fn test_render_compact_placeholders() {
        let tpl = ReleaseTemplate::new("release-v{{.Major}}.{{.Minor}}").unwrap();
        assert_eq!(tpl.render(Release::new(0, 9)), "release-v0.9");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        assert!(ReleaseTemplate::new("release-{{ .Patch }}").is_err());
    }

    #[test]
    fn test_format_message() {
        let msg = format_message(
            ":robot: Synchronize branch `%s` to `upstream/%s`",
            &["release-next", "main"],
        );
        assert_eq!(msg, ":robot: Synchronize branch `release-next` to `upstream/main`");
    }

    #[test]
    fn test_format_message_without_markers() {
        assert_eq!(format_message("Sync", &["a", "b"]), "Sync");
    }

    #[test]
    fn test_format_message_missing_arguments() {
        assert_eq!(format_message("%s and %s", &["a"]), "a and %s");
    }
}
