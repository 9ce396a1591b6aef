//! Collaborator contracts.
//!
//! The controller never rebuilds files or renders pages itself. It talks to a
//! [`BuildServer`] that owns the shadowed source tree and to an [`Automation`]
//! session that owns the rendered page. A [`Launcher`] opens both when the
//! Running phase starts.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::errors::SpecError;

// ============================================================================
// FILE CHANGES
// ============================================================================

/// New content for one file, or its removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Write(String),
    Remove,
}

/// The removal sentinel.
pub const REMOVE: FileChange = FileChange::Remove;

impl FileChange {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileChange::Write(text) => Some(text),
            FileChange::Remove => None,
        }
    }
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileChange::Write(text) => write!(f, "{} bytes", text.len()),
            FileChange::Remove => f.write_str("<rm>"),
        }
    }
}

/// Path (relative to the app's source dir) to change, ordered by path.
pub type ChangeSet = BTreeMap<String, FileChange>;

// ============================================================================
// CONTRACTS
// ============================================================================

/// The live build server.
pub trait BuildServer {
    /// Replace the whole source tree. Returns every path that changed.
    fn reset(&mut self, files: &BTreeMap<String, String>) -> Result<Vec<String>, SpecError>;

    /// Apply changes and block until the next rebuild has completed. A failed
    /// rebuild is returned as a build error.
    fn write_files(&mut self, changes: &ChangeSet) -> Result<(), SpecError>;

    /// Block until the named condition holds.
    fn wait(&mut self, what: &str) -> Result<(), SpecError>;

    fn base_url(&self) -> &Url;

    /// Closing twice is a no-op.
    fn close(&mut self) -> Result<(), SpecError>;
}

/// An addressable page session.
pub trait Automation {
    /// Resolve `path` from the session root and call it with `args`.
    ///
    /// A non-callable target with no arguments yields its value. A
    /// non-callable target with arguments is a forwarding error.
    fn invoke(&mut self, path: &[String], args: &[Value]) -> Result<Value, SpecError>;

    fn close(&mut self) -> Result<(), SpecError> {
        Ok(())
    }
}

/// Both collaborators of one invocation.
pub struct Session {
    pub build: Box<dyn BuildServer>,
    pub page: Box<dyn Automation>,
}

/// Opens a [`Session`] when the first non-init command arrives.
pub trait Launcher {
    fn launch(&mut self, config: &Config) -> Result<Session, SpecError>;
}

impl<F> Launcher for F
where
    F: FnMut(&Config) -> Result<Session, SpecError>,
{
    fn launch(&mut self, config: &Config) -> Result<Session, SpecError> {
        self(config)
    }
}
