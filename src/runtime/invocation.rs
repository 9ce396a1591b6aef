//! One test invocation from start to report.

use serde::Serialize;
use tracing::{info, warn};

use crate::collab::Launcher;
use crate::command::{change, init_label, spec};
use crate::config::Config;
use crate::errors::{SourceContext, SpecError};
use crate::runtime::{Controller, Procedure, SubProcedure, Yielder};
use crate::syntax::parser::parse_test;
use crate::syntax::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    /// Nothing was expected and the session never started.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationReport {
    pub title: Option<String>,
    pub outcome: Outcome,
    pub entries_run: usize,
    pub steps_run: usize,
}

/// Runs a procedure against a fresh controller and always releases the
/// session afterwards.
pub struct Invocation<'r> {
    title: Option<String>,
    config: &'r Config,
    launcher: &'r mut dyn Launcher,
}

impl<'r> Invocation<'r> {
    pub fn new(config: &'r Config, launcher: &'r mut dyn Launcher) -> Self {
        Self {
            title: None,
            config,
            launcher,
        }
    }

    pub fn titled(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn run(self, procedure: &dyn Procedure) -> Result<InvocationReport, SpecError> {
        let title = self.title;
        let mut controller = Controller::new(self.config, self.launcher);
        let result = controller.drive(procedure);
        let closed = controller.close();
        if let Err(error) = &closed {
            warn!(%error, "failed to close session");
        }
        let ran = result?;
        closed?;

        let stats = controller.stats();
        let outcome = if ran { Outcome::Passed } else { Outcome::Skipped };
        info!(
            title = title.as_deref().unwrap_or(""),
            ?outcome,
            entries = stats.entries_run,
            steps = stats.steps_run,
            "invocation finished"
        );
        Ok(InvocationReport {
            title,
            outcome,
            entries_run: stats.entries_run,
            steps_run: stats.steps_run,
        })
    }
}

/// Run a whole spec as a test.
///
/// The spec must carry a `# <title>` line. Its files and expectations are
/// registered, the lowest expected update becomes the initial one and every
/// other update is reached with a change, in label order.
pub fn run_spec_test(
    source: &str,
    subs: Vec<SubProcedure>,
    config: &Config,
    launcher: &mut dyn Launcher,
) -> Result<InvocationReport, SpecError> {
    let context = SourceContext::from_file("spec", source);
    let document = parse_test(source, &context)?;

    let mut labels: Vec<Label> = document
        .expectations
        .as_ref()
        .map(|expectations| expectations.conditions.clone())
        .unwrap_or_default();
    labels.sort();

    let source = source.to_string();
    let procedure = move |y: &mut Yielder<'_>| -> Result<(), SpecError> {
        y.send(spec(source.as_str(), subs.clone()))?;
        let mut labels = labels.iter();
        if let Some(first) = labels.next() {
            y.send(init_label(first.clone()))?;
        }
        for label in labels {
            y.send(change(label.clone()))?;
        }
        Ok(())
    };

    Invocation::new(config, launcher)
        .titled(document.title)
        .run(&procedure)
}
