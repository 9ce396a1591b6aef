//! Expectation compilation.
//!
//! Every label mentioned after the `****` divider gets one [`ExpectEntry`].
//! Unconditional text frames each label's html. A label's `::label::` block
//! holding `${N}` markers is split into alternating html and sub steps, each
//! html step re-framed by the unconditional text around the block. Markers on
//! inline `::label ${N}` lines register the label's before hook, then its
//! after hook.

use tracing::warn;

use crate::compile::{normalize_html, ExpectEntry, Step};
use crate::errors::{to_source_span, ErrorKind, ErrorReporting, SpecError};
use crate::runtime::SubProcedure;
use crate::syntax::{ConditionalText, Label, Part};

enum RawStep {
    Text(String),
    Sub(SubProcedure),
}

struct Bucket {
    label: Label,
    lines: Vec<String>,
    steps: Option<Vec<RawStep>>,
    steps_index: usize,
    before: Option<SubProcedure>,
    after: Option<SubProcedure>,
    description: Option<String>,
}

impl Bucket {
    fn new(label: Label) -> Self {
        Self {
            label,
            lines: Vec::new(),
            steps: None,
            steps_index: 0,
            before: None,
            after: None,
            description: None,
        }
    }

    fn register_hook(
        &mut self,
        sub: SubProcedure,
        part: &Part,
        ctx: &impl ErrorReporting,
    ) -> Result<(), SpecError> {
        if self.before.is_none() {
            self.before = Some(sub);
        } else if self.after.is_none() {
            self.after = Some(sub);
        } else {
            return Err(ctx
                .report(
                    ErrorKind::TooManyHooks {
                        label: self.label.to_string(),
                    },
                    to_source_span(part.span),
                )
                .with_help("the first marker is the before hook, the second the after hook"));
        }
        Ok(())
    }

    /// Each text step is spliced between the frame lines seen before and
    /// after the block.
    fn spread(self) -> (Label, ExpectEntry) {
        let steps = match self.steps {
            None => vec![Step::Html(normalize_html(&self.lines.concat()))],
            Some(steps) => {
                let (head, tail) = self.lines.split_at(self.steps_index);
                let head = head.concat();
                let tail = tail.concat();
                steps
                    .into_iter()
                    .map(|step| match step {
                        RawStep::Sub(sub) => Step::Sub(sub),
                        RawStep::Text(text) => {
                            Step::Html(normalize_html(&format!("{}{}{}", head, text, tail)))
                        }
                    })
                    .collect()
            }
        };
        (
            self.label,
            ExpectEntry {
                steps,
                before: self.before,
                after: self.after,
                description: self.description,
            },
        )
    }
}

/// Compile the expectation section against the caller's sub-procedures.
///
/// Entries come out in the order their labels first appear.
pub fn compile_steps(
    expectations: &ConditionalText,
    subs: &[SubProcedure],
    ctx: &impl ErrorReporting,
) -> Result<Vec<(Label, ExpectEntry)>, SpecError> {
    let mut buckets: Vec<Bucket> = expectations
        .conditions
        .iter()
        .cloned()
        .map(Bucket::new)
        .collect();

    for part in &expectations.parts {
        let Some(label) = &part.condition else {
            if let Some(marker) = part.subs.first() {
                return Err(ctx.sub_outside_condition(marker.slot, to_source_span(part.span)));
            }
            buckets
                .iter_mut()
                .for_each(|bucket| bucket.lines.push(part.text.clone()));
            continue;
        };

        let index = match buckets.iter().position(|b| &b.label == label) {
            Some(index) => index,
            None => {
                buckets.push(Bucket::new(label.clone()));
                buckets.len() - 1
            }
        };
        let bucket = &mut buckets[index];
        if bucket.description.is_none() {
            bucket.description = part.description.clone();
        }

        let resolved = resolve_subs(part, subs, ctx)?;
        if resolved.is_empty() {
            bucket.lines.push(part.text.clone());
            continue;
        }

        if part.block == Some(true) {
            if bucket.steps.is_some() {
                return Err(ctx.report(
                    ErrorKind::DuplicateStepBlock {
                        label: label.to_string(),
                    },
                    to_source_span(part.span),
                ));
            }
            bucket.steps = Some(split_steps(part, resolved));
            bucket.steps_index = bucket.lines.len();
        } else {
            if !part.text.trim().is_empty() {
                warn!(
                    label = %label,
                    text = part.text.trim(),
                    "text on a hook line is ignored"
                );
            }
            for (_, sub) in resolved {
                bucket.register_hook(sub, part, ctx)?;
            }
        }
    }

    Ok(buckets.into_iter().map(Bucket::spread).collect())
}

fn resolve_subs(
    part: &Part,
    subs: &[SubProcedure],
    ctx: &impl ErrorReporting,
) -> Result<Vec<(usize, SubProcedure)>, SpecError> {
    part.subs
        .iter()
        .map(|marker| {
            subs.get(marker.slot)
                .map(|sub| (marker.offset, sub.clone()))
                .ok_or_else(|| {
                    ctx.report(
                        ErrorKind::UnknownSub {
                            slot: marker.slot,
                            available: subs.len(),
                        },
                        to_source_span(part.span),
                    )
                })
        })
        .collect()
}

/// Cut a block's text at its markers. Blank text pieces make no step,
/// wherever they fall, not only at the ends of the block.
fn split_steps(part: &Part, markers: Vec<(usize, SubProcedure)>) -> Vec<RawStep> {
    let text = part.text.as_str();
    let mut steps = Vec::new();
    let mut left = 0;
    for (offset, sub) in markers {
        if offset > left {
            steps.push(RawStep::Text(text[left..offset].to_string()));
            left = offset;
        }
        steps.push(RawStep::Sub(sub));
    }
    if left < text.len() {
        steps.push(RawStep::Text(text[left..].to_string()));
    }
    steps.retain(|step| match step {
        RawStep::Text(text) => !text.trim().is_empty(),
        RawStep::Sub(_) => true,
    });
    steps
}
