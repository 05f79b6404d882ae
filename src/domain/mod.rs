//! Domain logic - pure release rules independent of git operations

pub mod release;
pub mod template;

pub use release::{missing_releases, Release, ReleaseSearch};
pub use template::{format_message, ReleaseTemplate};
