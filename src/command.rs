//! The command vocabulary.
//!
//! A procedure talks to the controller only by sending [`Command`] values and
//! reading back a [`Reply`]. The free functions at the bottom of this module
//! are the DSL used to build commands.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::errors::{unsourced, ErrorKind, SpecError};
use crate::runtime::{Callable, Snapshot, SubProcedure};
use crate::syntax::Label;

// ============================================================================
// TAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    Init,
    Templates,
    Specs,
    Expect,
    ExpectBefore,
    ExpectAfter,
    FlushExpects,
    DiscardExpects,
    Change,
    Page,
    InnerText,
    Debug,
    Wait,
}

impl CommandTag {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandTag::Init => "init",
            CommandTag::Templates => "templates",
            CommandTag::Specs => "specs",
            CommandTag::Expect => "expect",
            CommandTag::ExpectBefore => "expect_before",
            CommandTag::ExpectAfter => "expect_after",
            CommandTag::FlushExpects => "flush_expects",
            CommandTag::DiscardExpects => "discard_expects",
            CommandTag::Change => "change",
            CommandTag::Page => "page",
            CommandTag::InnerText => "inner_text",
            CommandTag::Debug => "debug",
            CommandTag::Wait => "wait",
        }
    }

    /// Commands that may be handled without starting the session.
    pub const fn is_setup(&self) -> bool {
        matches!(
            self,
            CommandTag::Init
                | CommandTag::Templates
                | CommandTag::Specs
                | CommandTag::Expect
                | CommandTag::ExpectBefore
                | CommandTag::ExpectAfter
                | CommandTag::DiscardExpects
                | CommandTag::Debug
        )
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Renders a file from an optional argument.
#[derive(Clone)]
pub enum Template {
    Literal(String),
    Render(Rc<dyn Fn(Option<&str>) -> String>),
}

impl Template {
    pub fn render<F>(f: F) -> Self
    where
        F: Fn(Option<&str>) -> String + 'static,
    {
        Template::Render(Rc::new(f))
    }

    pub fn apply(&self, arg: Option<&str>) -> String {
        match self {
            Template::Literal(text) => text.clone(),
            Template::Render(render) => render(arg),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Template::Render(_) => f.write_str("Render(<fn>)"),
        }
    }
}

/// Value of one file in `init` and `change` maps.
#[derive(Debug, Clone)]
pub enum FileValue {
    /// Verbatim, or the argument of the path's registered template.
    Text(String),
    /// Registered as the path's template and rendered with no argument.
    Template(Template),
    Remove,
}

impl From<&str> for FileValue {
    fn from(value: &str) -> Self {
        FileValue::Text(value.to_string())
    }
}

impl From<String> for FileValue {
    fn from(value: String) -> Self {
        FileValue::Text(value)
    }
}

pub type FileMap = BTreeMap<String, FileValue>;

/// One file of an object-form spec.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecSource {
    /// Same text for every label.
    Text(String),
    /// Explicit label to text pairs.
    Labeled(Vec<(Label, String)>),
}

impl From<&str> for SpecSource {
    fn from(value: &str) -> Self {
        SpecSource::Text(value.to_string())
    }
}

#[derive(Clone)]
pub enum SpecsPayload {
    /// Spec text plus the sub-procedures its `${N}` markers refer to.
    Text {
        source: String,
        subs: Vec<SubProcedure>,
    },
    Map(BTreeMap<String, SpecSource>),
}

impl fmt::Debug for SpecsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecsPayload::Text { source, subs } => f
                .debug_struct("Text")
                .field("source", source)
                .field("subs", &subs.len())
                .finish(),
            SpecsPayload::Map(map) => f.debug_tuple("Map").field(map).finish(),
        }
    }
}

#[derive(Clone)]
pub enum ExpectValue {
    Html(String),
    Sub(SubProcedure),
    Function(Callable),
}

impl From<&str> for ExpectValue {
    fn from(value: &str) -> Self {
        ExpectValue::Html(value.to_string())
    }
}

impl From<String> for ExpectValue {
    fn from(value: String) -> Self {
        ExpectValue::Html(value)
    }
}

impl From<SubProcedure> for ExpectValue {
    fn from(value: SubProcedure) -> Self {
        ExpectValue::Sub(value)
    }
}

impl From<Callable> for ExpectValue {
    fn from(value: Callable) -> Self {
        ExpectValue::Function(value)
    }
}

impl fmt::Debug for ExpectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectValue::Html(html) => f.debug_tuple("Html").field(html).finish(),
            ExpectValue::Sub(_) => f.write_str("Sub(<procedure>)"),
            ExpectValue::Function(_) => f.write_str("Function(<callable>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum InitTarget {
    Files(FileMap),
    Label(Label),
}

#[derive(Debug, Clone)]
pub enum ChangeTarget {
    Files(FileMap),
    Label(Label),
}

/// A property/method path on the page session, built segment by segment.
///
/// ```
/// use hmr_spec::command::page;
/// use serde_json::json;
///
/// let command = page().field("keyboard").field("press").call(vec![json!("Backspace")]);
/// assert_eq!(command.tag().as_str(), "page");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagePath {
    segments: Vec<String>,
}

impl PagePath {
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn call(self, args: Vec<Value>) -> Command {
        Command::Page { path: self, args }
    }

    /// Read the target (or call it with no arguments).
    pub fn get(self) -> Command {
        self.call(Vec::new())
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

#[derive(Debug, Clone)]
pub enum Command {
    Init(InitTarget),
    Templates(BTreeMap<String, Template>),
    Specs(SpecsPayload),
    Expect(Vec<(Label, ExpectValue)>),
    ExpectBefore { label: Label, sub: SubProcedure },
    ExpectAfter { label: Label, sub: SubProcedure },
    FlushExpects,
    DiscardExpects,
    Change(ChangeTarget),
    Page { path: PagePath, args: Vec<Value> },
    InnerText { selector: String },
    Debug,
    Wait { what: String },
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::Init(_) => CommandTag::Init,
            Command::Templates(_) => CommandTag::Templates,
            Command::Specs(_) => CommandTag::Specs,
            Command::Expect(_) => CommandTag::Expect,
            Command::ExpectBefore { .. } => CommandTag::ExpectBefore,
            Command::ExpectAfter { .. } => CommandTag::ExpectAfter,
            Command::FlushExpects => CommandTag::FlushExpects,
            Command::DiscardExpects => CommandTag::DiscardExpects,
            Command::Change(_) => CommandTag::Change,
            Command::Page { .. } => CommandTag::Page,
            Command::InnerText { .. } => CommandTag::InnerText,
            Command::Debug => CommandTag::Debug,
            Command::Wait { .. } => CommandTag::Wait,
        }
    }
}

// ============================================================================
// REPLIES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Value(Value),
    Text(String),
    Snapshot(Box<Snapshot>),
}

impl Reply {
    fn kind(&self) -> &'static str {
        match self {
            Reply::Done => "done",
            Reply::Value(_) => "value",
            Reply::Text(_) => "text",
            Reply::Snapshot(_) => "snapshot",
        }
    }

    fn mismatch(&self, expected: &str) -> SpecError {
        unsourced(
            "protocol",
            ErrorKind::UnexpectedReply {
                expected: expected.into(),
                actual: self.kind().into(),
            },
        )
    }

    pub fn into_value(self) -> Result<Value, SpecError> {
        match self {
            Reply::Value(value) => Ok(value),
            Reply::Text(text) => Ok(Value::String(text)),
            other => Err(other.mismatch("value")),
        }
    }

    pub fn into_text(self) -> Result<String, SpecError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Value(Value::String(text)) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_snapshot(self) -> Result<Snapshot, SpecError> {
        match self {
            Reply::Snapshot(snapshot) => Ok(*snapshot),
            other => Err(other.mismatch("snapshot")),
        }
    }
}

// ============================================================================
// DSL
// ============================================================================

pub fn init<I, K, V>(files: I) -> Command
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FileValue>,
{
    Command::Init(InitTarget::Files(file_map(files)))
}

pub fn init_label(label: impl Into<Label>) -> Command {
    Command::Init(InitTarget::Label(label.into()))
}

pub fn templates<I, K>(templates: I) -> Command
where
    I: IntoIterator<Item = (K, Template)>,
    K: Into<String>,
{
    Command::Templates(
        templates
            .into_iter()
            .map(|(path, template)| (path.into(), template))
            .collect(),
    )
}

/// Spec text whose `${N}` markers index into `subs`.
pub fn spec(source: impl Into<String>, subs: Vec<SubProcedure>) -> Command {
    Command::Specs(SpecsPayload::Text {
        source: source.into(),
        subs,
    })
}

pub fn spec_map<I, K, V>(files: I) -> Command
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<SpecSource>,
{
    Command::Specs(SpecsPayload::Map(
        files
            .into_iter()
            .map(|(path, source)| (path.into(), source.into()))
            .collect(),
    ))
}

pub fn expect(label: impl Into<Label>, value: impl Into<ExpectValue>) -> Command {
    Command::Expect(vec![(label.into(), value.into())])
}

pub fn expect_many(entries: Vec<(Label, ExpectValue)>) -> Command {
    Command::Expect(entries)
}

pub fn before(label: impl Into<Label>, sub: SubProcedure) -> Command {
    Command::ExpectBefore {
        label: label.into(),
        sub,
    }
}

pub fn after(label: impl Into<Label>, sub: SubProcedure) -> Command {
    Command::ExpectAfter {
        label: label.into(),
        sub,
    }
}

pub fn flush_expects() -> Command {
    Command::FlushExpects
}

pub fn discard_expects() -> Command {
    Command::DiscardExpects
}

pub fn change(label: impl Into<Label>) -> Command {
    Command::Change(ChangeTarget::Label(label.into()))
}

pub fn change_files<I, K, V>(files: I) -> Command
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FileValue>,
{
    Command::Change(ChangeTarget::Files(file_map(files)))
}

/// Root of a page path. `page().get()` returns the session itself.
pub fn page() -> PagePath {
    PagePath::default()
}

pub fn inner_text(selector: impl Into<String>) -> Command {
    Command::InnerText {
        selector: selector.into(),
    }
}

pub fn debug() -> Command {
    Command::Debug
}

pub fn wait(what: impl Into<String>) -> Command {
    Command::Wait { what: what.into() }
}

fn file_map<I, K, V>(files: I) -> FileMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FileValue>,
{
    files
        .into_iter()
        .map(|(path, value)| (path.into(), value.into()))
        .collect()
}
