pub mod cancel;
pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod git;
pub mod github;
pub mod sync;
pub mod ui;

pub use error::{DeviateError, ErrorKind, Result};
