//! Syntax module for the hmr-spec notation
//!
//! A spec describes how source files evolve across hot-reload updates and
//! what each update must render:
//!
//! ```text
//! # title
//! ---- App.svelte ----
//! <h1>always</h1>
//! ::0 <p>only in update 0</p>
//! ::1::
//!   <p>only in update 1</p>
//! ::
//! ****
//! <h1>always</h1>
//! ::0 <p>only in update 0</p>
//! ::1 <p>only in update 1</p>
//! ```
//!
//! This module holds the AST the parser produces. Compilation to per-label
//! content and steps lives in [`crate::compile`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod parser;

/// Represents a span in the source code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ============================================================================
// LABELS
// ============================================================================

/// Names one hot-reload update. `*` is the universal label.
///
/// Labels order numerically when both are integers, otherwise
/// lexicographically, with integer labels first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub const UNIVERSAL: &'static str = "*";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn universal() -> Self {
        Self(Self::UNIVERSAL.to_string())
    }

    pub fn is_universal(&self) -> bool {
        self.0 == Self::UNIVERSAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for Label {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<usize> for Label {
    fn from(value: usize) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for Label {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// AST
// ============================================================================

/// An interpolation hole `${N}` referencing the caller's sub-procedure `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMarker {
    /// Index into the sub-procedures supplied with the spec text.
    pub slot: usize,
    /// Byte offset of the hole inside the owning part's text.
    pub offset: usize,
}

/// One fragment of conditional text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// `None` for unconditional text.
    pub condition: Option<Label>,
    pub text: String,
    /// `Some(true)` for a `::label::` block, `Some(false)` for an inline
    /// `::label text` line, `None` for unconditional text.
    pub block: Option<bool>,
    pub subs: Vec<SubMarker>,
    /// Text following a block opener (`::0:: description`).
    pub description: Option<String>,
    pub span: Span,
}

impl Part {
    pub fn unconditional(text: impl Into<String>, span: Span) -> Self {
        Self {
            condition: None,
            text: text.into(),
            block: None,
            subs: Vec::new(),
            description: None,
            span,
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

/// Ordered fragments plus the labels they mention, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalText {
    pub parts: Vec<Part>,
    pub conditions: Vec<Label>,
}

impl ConditionalText {
    pub fn push(&mut self, part: Part) {
        if let Some(label) = &part.condition {
            if !self.conditions.contains(label) {
                self.conditions.push(label.clone());
            }
        }
        self.parts.push(part);
    }
}

/// `---- <path> ----` and the content that follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBlock {
    pub path: String,
    pub content: ConditionalText,
    pub span: Span,
}

/// A parsed spec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub title: Option<String>,
    pub files: Vec<FileBlock>,
    /// Everything after the `****` divider.
    pub expectations: Option<ConditionalText>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_order_numerically_first() {
        let mut labels: Vec<Label> = ["10", "b", "2", "*", "a", "0"]
            .into_iter()
            .map(Label::from)
            .collect();
        labels.sort();
        let names: Vec<_> = labels.iter().map(Label::as_str).collect();
        assert_eq!(names, ["0", "2", "10", "*", "a", "b"]);
    }

    #[test]
    fn conditions_are_recorded_once_in_first_seen_order() {
        let mut text = ConditionalText::default();
        for label in ["1", "0", "1"] {
            let mut part = Part::unconditional("x", Span::default());
            part.condition = Some(label.into());
            part.block = Some(false);
            text.push(part);
        }
        assert_eq!(text.conditions, vec![Label::from("1"), Label::from("0")]);
        assert_eq!(text.parts.len(), 3);
    }
}
