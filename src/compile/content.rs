//! File content compilation.

use crate::compile::CompiledContent;
use crate::syntax::{ConditionalText, Label};

/// Reduce a file's fragments to `label -> text`.
///
/// `*` gets every unconditional fragment. Each label gets the unconditional
/// fragments interleaved with its own, in declaration order.
pub fn compile_file_content(content: &ConditionalText) -> CompiledContent {
    let mut buckets: Vec<(Label, String)> = std::iter::once(Label::universal())
        .chain(content.conditions.iter().cloned())
        .map(|label| (label, String::new()))
        .collect();

    for part in &content.parts {
        match &part.condition {
            None => buckets
                .iter_mut()
                .for_each(|(_, text)| text.push_str(&part.text)),
            Some(label) => match buckets.iter_mut().find(|(l, _)| l == label) {
                Some((_, text)) => text.push_str(&part.text),
                None => buckets.push((label.clone(), part.text.clone())),
            },
        }
    }

    buckets.into_iter().collect()
}
