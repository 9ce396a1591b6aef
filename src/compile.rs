//! Compilation of parsed specs.
//!
//! - [`content::compile_file_content`] reduces a file block to one text per label.
//! - [`steps::compile_steps`] reduces the expectations to one entry per label.
//! - [`html::normalize_html`] is applied to every html step and to every
//!   queried page before comparison.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::errors::{ErrorReporting, SpecError};
use crate::runtime::{Callable, SubProcedure};
use crate::syntax::{Document, Label};

pub mod content;
pub mod html;
pub mod steps;

pub use content::compile_file_content;
pub use html::normalize_html;
pub use steps::compile_steps;

/// Label to fully assembled file text. Text-compiled content always has `*`.
pub type CompiledContent = BTreeMap<Label, String>;

/// One step of an expectation entry.
#[derive(Clone)]
pub enum Step {
    /// Rendered output must equal this (normalized) html.
    Html(String),
    /// Procedure driven by the controller.
    Sub(SubProcedure),
    /// Plain function handed the automation session.
    Function(Callable),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Html(_) => "html",
            Step::Sub(_) => "sub",
            Step::Function(_) => "function",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Html(html) => f.debug_tuple("Html").field(html).finish(),
            Step::Sub(_) => f.write_str("Sub(<procedure>)"),
            Step::Function(_) => f.write_str("Function(<callable>)"),
        }
    }
}

/// Everything that runs after one update.
#[derive(Clone, Default)]
pub struct ExpectEntry {
    pub steps: Vec<Step>,
    pub before: Option<SubProcedure>,
    pub after: Option<SubProcedure>,
    pub description: Option<String>,
}

impl ExpectEntry {
    /// Append another entry for the same label.
    pub fn merge(&mut self, other: ExpectEntry) -> Result<(), &'static str> {
        if let Some(before) = other.before {
            if self.before.is_some() {
                return Err("before");
            }
            self.before = Some(before);
        }
        if let Some(after) = other.after {
            if self.after.is_some() {
                return Err("after");
            }
            self.after = Some(after);
        }
        if self.description.is_none() {
            self.description = other.description;
        }
        self.steps.extend(other.steps);
        Ok(())
    }

    pub fn view(&self) -> EntryView {
        EntryView {
            description: self.description.clone(),
            before: self.before.is_some(),
            after: self.after.is_some(),
            steps: self
                .steps
                .iter()
                .map(|step| StepView {
                    kind: step.kind(),
                    html: match step {
                        Step::Html(html) => Some(html.clone()),
                        _ => None,
                    },
                })
                .collect(),
        }
    }
}

impl fmt::Debug for ExpectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectEntry")
            .field("steps", &self.steps)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("description", &self.description)
            .finish()
    }
}

/// A whole document, compiled.
#[derive(Debug, Clone, Default)]
pub struct CompiledSpec {
    pub title: Option<String>,
    pub files: BTreeMap<String, CompiledContent>,
    pub expects: Vec<(Label, ExpectEntry)>,
}

impl CompiledSpec {
    pub fn view(&self) -> CompiledView {
        CompiledView {
            title: self.title.clone(),
            files: self.files.clone(),
            expects: self
                .expects
                .iter()
                .map(|(label, entry)| (label.clone(), entry.view()))
                .collect(),
        }
    }
}

pub fn compile_document(
    document: &Document,
    subs: &[SubProcedure],
    ctx: &impl ErrorReporting,
) -> Result<CompiledSpec, SpecError> {
    let files = document
        .files
        .iter()
        .map(|file| (file.path.clone(), compile_file_content(&file.content)))
        .collect();
    let expects = match &document.expectations {
        Some(expectations) => compile_steps(expectations, subs, ctx)?,
        None => Vec::new(),
    };
    Ok(CompiledSpec {
        title: document.title.clone(),
        files,
        expects,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub files: BTreeMap<String, CompiledContent>,
    pub expects: Vec<(Label, EntryView)>,
}

/// Serializable shape of an entry, procedures reduced to their kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub before: bool,
    pub after: bool,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}
