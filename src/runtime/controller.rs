//! The effect interpreter.
//!
//! A [`Controller`] owns the state of one invocation. It starts in the Setup
//! phase, where declarations only accumulate. The first command that needs
//! the outside world (a change, a page call, a flush) moves it to Running:
//! the session is launched, the init files are written and the registered
//! expectations are frozen into the remaining set. From then on every change
//! to a label runs each remaining entry up to that label.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::collab::{Automation, BuildServer, ChangeSet, FileChange, Launcher, Session};
use crate::command::{
    ChangeTarget, Command, ExpectValue, FileMap, FileValue, InitTarget, Reply, SpecSource,
    SpecsPayload, Template,
};
use crate::compile::{
    compile_file_content, compile_steps, normalize_html, CompiledContent, EntryView, ExpectEntry,
    Step,
};
use crate::config::Config;
use crate::errors::{
    assertion_failure, unsourced, ErrorKind, ReportContext, SourceContext, SpecError,
};
use crate::runtime::{Dispatch, Procedure, SubProcedure, Yielder};
use crate::syntax::parser::parse;
use crate::syntax::Label;

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone, Default)]
struct State {
    templates: im::HashMap<String, Template>,
    inits: im::OrdMap<String, String>,
    specs: im::OrdMap<String, CompiledContent>,
    /// Insertion ordered, one entry per label.
    expects: im::Vector<(Label, ExpectEntry)>,
    /// Entries not yet run. `None` until Running starts.
    remaining: Option<im::OrdMap<Label, ExpectEntry>>,
    started: bool,
    init_label: Option<Label>,
    cursor: Option<Label>,
}

/// Read-only copy of the controller state, returned by `debug`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub started: bool,
    /// Paths with a registered template.
    pub templates: Vec<String>,
    pub inits: BTreeMap<String, String>,
    pub specs: BTreeMap<String, CompiledContent>,
    pub expects: Vec<(Label, EntryView)>,
    pub remaining_expects: Option<Vec<(Label, EntryView)>>,
    pub init_label: Option<Label>,
    pub cursor: Option<Label>,
}

/// What a finished invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub entries_run: usize,
    pub steps_run: usize,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct Controller<'r> {
    config: &'r Config,
    launcher: &'r mut dyn Launcher,
    session: Option<Session>,
    state: State,
    aborted: Option<SpecError>,
    stats: RunStats,
}

impl<'r> Controller<'r> {
    pub fn new(config: &'r Config, launcher: &'r mut dyn Launcher) -> Self {
        Self {
            config,
            launcher,
            session: None,
            state: State::default(),
            aborted: None,
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Drive `procedure` to completion, then run every entry no change
    /// reached.
    ///
    /// Returns `Ok(false)` when nothing was started and nothing expected.
    pub fn drive(&mut self, procedure: &dyn Procedure) -> Result<bool, SpecError> {
        let result = {
            let mut y = Yielder::new(self);
            procedure.run(&mut y)
        };
        if let Some(error) = self.aborted.take() {
            return Err(error);
        }
        result?;

        if !self.state.started && self.state.expects.is_empty() {
            debug!("no expectations registered, nothing to run");
            return Ok(false);
        }
        self.ensure_started()?;
        let flushed = self.run_due(None);
        if let Some(error) = self.aborted.take() {
            return Err(error);
        }
        flushed?;
        Ok(true)
    }

    /// Release the session. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), SpecError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        if self.config.keep_running {
            info!("watch mode, leaving build server and page open");
            return Ok(());
        }
        let page = session.page.close();
        let build = session.build.close();
        page.and(build)
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = &self.state;
        let mut templates: Vec<String> = state.templates.keys().cloned().collect();
        templates.sort();
        Snapshot {
            started: state.started,
            templates,
            inits: state.inits.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            specs: state.specs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            expects: state
                .expects
                .iter()
                .map(|(label, entry)| (label.clone(), entry.view()))
                .collect(),
            remaining_expects: state.remaining.as_ref().map(|remaining| {
                remaining
                    .iter()
                    .map(|(label, entry)| (label.clone(), entry.view()))
                    .collect()
            }),
            init_label: state.init_label.clone(),
            cursor: state.cursor.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Command handling
    // ------------------------------------------------------------------------

    fn handle(&mut self, command: Command) -> Result<Reply, SpecError> {
        if !command.tag().is_setup() {
            self.ensure_started()?;
        }
        match command {
            Command::Init(target) => self.init(target),
            Command::Templates(templates) => {
                for (path, template) in templates {
                    self.state.templates.insert(path, template);
                }
                Ok(Reply::Done)
            }
            Command::Specs(payload) => self.register_specs(payload),
            Command::Expect(entries) => {
                for (label, value) in entries {
                    let step = match value {
                        ExpectValue::Html(html) => Step::Html(normalize_html(&html)),
                        ExpectValue::Sub(sub) => Step::Sub(sub),
                        ExpectValue::Function(f) => Step::Function(f),
                    };
                    let entry = ExpectEntry {
                        steps: vec![step],
                        ..ExpectEntry::default()
                    };
                    self.register_expect(label, entry)?;
                }
                Ok(Reply::Done)
            }
            Command::ExpectBefore { label, sub } => {
                let entry = ExpectEntry {
                    before: Some(sub),
                    ..ExpectEntry::default()
                };
                self.register_expect(label, entry)?;
                Ok(Reply::Done)
            }
            Command::ExpectAfter { label, sub } => {
                let entry = ExpectEntry {
                    after: Some(sub),
                    ..ExpectEntry::default()
                };
                self.register_expect(label, entry)?;
                Ok(Reply::Done)
            }
            Command::FlushExpects => {
                self.run_due(None)?;
                Ok(Reply::Done)
            }
            Command::DiscardExpects => {
                self.state.expects.clear();
                if let Some(remaining) = self.state.remaining.as_mut() {
                    remaining.clear();
                }
                Ok(Reply::Done)
            }
            Command::Change(ChangeTarget::Label(label)) => {
                let changes = self.resolve(&label);
                self.write(&changes)?;
                self.state.cursor = Some(label.clone());
                self.run_due(Some(&label))?;
                Ok(Reply::Done)
            }
            Command::Change(ChangeTarget::Files(files)) => {
                let changes = self.render_files(files);
                self.write(&changes)?;
                Ok(Reply::Done)
            }
            Command::Page { path, args } => {
                let value = self.page()?.invoke(path.segments(), &args)?;
                Ok(Reply::Value(value))
            }
            Command::InnerText { selector } => {
                let value = self
                    .page()?
                    .invoke(&["$eval".to_string()], &[json!(selector), json!("el => el.innerText")])?;
                Ok(Reply::Text(text_of(value)))
            }
            Command::Debug => Ok(Reply::Snapshot(Box::new(self.snapshot()))),
            Command::Wait { what } => {
                debug!(what = %what, "waiting");
                self.build()?.wait(&what)?;
                Ok(Reply::Done)
            }
        }
    }

    fn init(&mut self, target: InitTarget) -> Result<Reply, SpecError> {
        if self.state.started {
            return Err(unsourced("protocol", ErrorKind::InitAfterStart)
                .with_help("declare init files and the initial update before any change or page call"));
        }
        match target {
            InitTarget::Files(files) => {
                for (path, change) in self.render_files(files) {
                    match change {
                        FileChange::Write(text) => {
                            self.state.inits.insert(path, text);
                        }
                        FileChange::Remove => {
                            self.state.inits.remove(&path);
                        }
                    }
                }
            }
            InitTarget::Label(label) => {
                self.state.inits = self
                    .resolve(&label)
                    .into_iter()
                    .filter_map(|(path, change)| match change {
                        FileChange::Write(text) => Some((path, text)),
                        FileChange::Remove => None,
                    })
                    .collect();
                self.state.init_label = Some(label);
            }
        }
        Ok(Reply::Done)
    }

    fn register_specs(&mut self, payload: SpecsPayload) -> Result<Reply, SpecError> {
        match payload {
            SpecsPayload::Text { source, subs } => {
                let context = SourceContext::from_file("spec", source.as_str());
                let document = parse(&source, &context)?;
                for file in &document.files {
                    self.state
                        .specs
                        .insert(file.path.clone(), compile_file_content(&file.content));
                }
                if let Some(expectations) = &document.expectations {
                    let ctx = ReportContext::new(context, "compile");
                    for (label, entry) in compile_steps(expectations, &subs, &ctx)? {
                        self.register_expect(label, entry)?;
                    }
                }
            }
            SpecsPayload::Map(files) => {
                for (path, source) in files {
                    let content = match source {
                        SpecSource::Text(text) => {
                            CompiledContent::from([(Label::universal(), text)])
                        }
                        SpecSource::Labeled(pairs) => pairs.into_iter().collect(),
                    };
                    self.state.specs.insert(path, content);
                }
            }
        }
        Ok(Reply::Done)
    }

    fn register_expect(&mut self, label: Label, entry: ExpectEntry) -> Result<(), SpecError> {
        if self.state.started {
            return Err(unsourced(
                "protocol",
                ErrorKind::ExpectAfterStart {
                    label: label.to_string(),
                },
            ));
        }
        let existing = self
            .state
            .expects
            .iter()
            .position(|(existing, _)| existing == &label);
        match existing.and_then(|index| self.state.expects.get_mut(index)) {
            Some((_, current)) => current.merge(entry).map_err(|hook| {
                unsourced(
                    "protocol",
                    ErrorKind::DuplicateHook {
                        label: label.to_string(),
                        hook: hook.to_string(),
                    },
                )
            }),
            None => {
                self.state.expects.push_back((label, entry));
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Running phase
    // ------------------------------------------------------------------------

    fn ensure_started(&mut self) -> Result<(), SpecError> {
        if self.state.started {
            return Ok(());
        }
        self.state.started = true;
        self.state.remaining = Some(self.state.expects.iter().cloned().collect());
        info!(
            inits = self.state.inits.len(),
            expects = self.state.expects.len(),
            "starting session"
        );

        let started = self.launch();
        if let Err(error) = &started {
            warn!(%error, "session failed to start");
            self.aborted = Some(error.clone());
        }
        started?;

        let Some(label) = self.state.init_label.clone() else {
            return Ok(());
        };
        let first = self
            .state
            .remaining
            .as_ref()
            .and_then(|remaining| remaining.get_min())
            .map(|(first, _)| first.clone());
        if let Some(first) = first.filter(|first| first < &label) {
            return Err(unsourced(
                "protocol",
                ErrorKind::InvalidCommand {
                    command: "init".to_string(),
                    reason: format!(
                        "initial update {} comes after the first expected update {}",
                        label, first
                    ),
                },
            ));
        }
        self.state.cursor = Some(label.clone());
        self.run_due(Some(&label))
    }

    fn launch(&mut self) -> Result<(), SpecError> {
        let mut session = self.launcher.launch(self.config)?;
        let inits: BTreeMap<String, String> = self
            .state
            .inits
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let changed = session.build.reset(&inits)?;
        debug!(changed = changed.len(), "sources reset");
        self.session = Some(session);
        Ok(())
    }

    /// Run remaining entries in label order, up to and including `upto`.
    ///
    /// With no bound every remaining entry runs, and each label's specs are
    /// written before its entry unless the app already shows that label.
    fn run_due(&mut self, upto: Option<&Label>) -> Result<(), SpecError> {
        loop {
            let next = self
                .state
                .remaining
                .as_ref()
                .and_then(|remaining| remaining.get_min())
                .filter(|(label, _)| upto.map_or(true, |upto| label <= upto))
                .cloned();
            let Some((label, entry)) = next else {
                return Ok(());
            };
            if let Some(remaining) = self.state.remaining.as_mut() {
                remaining.remove(&label);
            }
            let shown = self.state.cursor.as_ref() == Some(&label);
            if upto.is_none() && !shown && !self.state.specs.is_empty() {
                debug!(label = %label, "flushing update");
                let changes = self.resolve(&label);
                self.write(&changes)?;
                self.state.cursor = Some(label.clone());
            }
            self.run_entry(&label, &entry)?;
        }
    }

    fn run_entry(&mut self, label: &Label, entry: &ExpectEntry) -> Result<(), SpecError> {
        info!(label = %label, steps = entry.steps.len(), "running expectations");
        self.stats.entries_run += 1;
        if let Some(before) = &entry.before {
            self.run_sub(before)?;
        }
        for (index, step) in entry.steps.iter().enumerate() {
            self.stats.steps_run += 1;
            match step {
                Step::Html(expected) => self.assert_html(label, index, expected)?,
                Step::Sub(sub) => self.run_sub(sub)?,
                Step::Function(f) => f.call(self.page()?)?,
            }
        }
        if let Some(after) = &entry.after {
            self.run_sub(after)?;
        }
        Ok(())
    }

    fn run_sub(&mut self, sub: &SubProcedure) -> Result<(), SpecError> {
        let mut y = Yielder::new(self);
        sub.run(&mut y)
    }

    fn assert_html(&mut self, label: &Label, step: usize, expected: &str) -> Result<(), SpecError> {
        let selector = self.config.app_root_selector.clone();
        let value = self.page()?.invoke(
            &["$eval".to_string()],
            &[json!(selector), json!("el => el.innerHTML")],
        )?;
        let html = text_of(value);
        let html = html
            .trim_start()
            .strip_prefix(self.config.app_html_prefix.as_str())
            .unwrap_or(&html);
        let actual = normalize_html(html);
        let expected = normalize_html(expected);
        if actual != expected {
            return Err(assertion_failure(label.as_str(), step, &expected, &actual));
        }
        debug!(label = %label, step, "html step passed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Every spec resolved for `label`: its own text, else `*`, else removed.
    fn resolve(&self, label: &Label) -> ChangeSet {
        self.state
            .specs
            .iter()
            .map(|(path, content)| {
                let change = content
                    .get(label)
                    .or_else(|| content.get(&Label::universal()))
                    .map(|text| FileChange::Write(text.clone()))
                    .unwrap_or(FileChange::Remove);
                (path.clone(), change)
            })
            .collect()
    }

    /// Apply registered templates to explicit files.
    fn render_files(&mut self, files: FileMap) -> ChangeSet {
        files
            .into_iter()
            .map(|(path, value)| {
                let change = match value {
                    FileValue::Text(text) => FileChange::Write(match self.state.templates.get(&path) {
                        Some(template) => template.apply(Some(&text)),
                        None => text,
                    }),
                    FileValue::Template(template) => {
                        let text = template.apply(None);
                        self.state.templates.insert(path.clone(), template);
                        FileChange::Write(text)
                    }
                    FileValue::Remove => FileChange::Remove,
                };
                (path, change)
            })
            .collect()
    }

    fn write(&mut self, changes: &ChangeSet) -> Result<(), SpecError> {
        info!(files = changes.len(), "writing files");
        for (path, change) in changes {
            debug!(path = %path, change = %change, "file change");
        }
        self.build()?.write_files(changes)
    }

    // ------------------------------------------------------------------------
    // Session access
    // ------------------------------------------------------------------------

    fn session(&mut self) -> Result<&mut Session, SpecError> {
        self.session.as_mut().ok_or_else(|| {
            unsourced(
                "protocol",
                ErrorKind::Aborted {
                    reason: "the session is not running".to_string(),
                },
            )
        })
    }

    fn page(&mut self) -> Result<&mut dyn Automation, SpecError> {
        Ok(self.session()?.page.as_mut())
    }

    fn build(&mut self) -> Result<&mut dyn BuildServer, SpecError> {
        Ok(self.session()?.build.as_mut())
    }
}

impl Dispatch for Controller<'_> {
    fn dispatch(&mut self, command: Command) -> Result<Reply, SpecError> {
        if let Some(error) = &self.aborted {
            return Err(unsourced(
                "protocol",
                ErrorKind::Aborted {
                    reason: error.to_string(),
                },
            ));
        }
        let tag = command.tag();
        debug!(command = tag.as_str(), started = self.state.started, "dispatch");
        let result = self.handle(command);
        if let Err(error) = &result {
            if error.kind.is_fatal() && self.aborted.is_none() {
                warn!(command = tag.as_str(), %error, "aborting invocation");
                self.aborted = Some(error.clone());
            }
        }
        result
    }
}

/// Page results compared as text. Missing results read as empty.
fn text_of(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
