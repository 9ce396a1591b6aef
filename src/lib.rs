//! hmr-spec: a compact notation for hot-reload update tests and the
//! interpreter that drives them.
//!
//! A spec lists source files whose lines are tagged with update labels and
//! the html each update must render. [`syntax`] parses it, [`compile`]
//! reduces it to per-label file contents and expectation steps, and
//! [`runtime`] replays the updates against a build server and a page through
//! the [`command`] vocabulary.

pub use crate::errors::{ErrorKind, SpecError};

pub mod build;
pub mod cli;
pub mod collab;
pub mod command;
pub mod compile;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod helpers;
pub mod outline;
pub mod page;
pub mod runtime;
pub mod syntax;
pub mod vfs;
