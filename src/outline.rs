//! Test names for a compiled spec.
//!
//! A host test runner reports a spec as one test, as one group with a test
//! per update, or as nested groups down to single steps. `Config::detail`
//! picks the level.

use std::fmt;

use serde::Serialize;

use crate::compile::ExpectEntry;
use crate::config::Config;
use crate::syntax::Label;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineNode {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Number of leaves, i.e. reported tests.
    pub fn tests(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(OutlineNode::tests).sum()
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(depth), self.name)?;
        for child in &self.children {
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for OutlineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

pub fn update_name(label: &Label, entry: &ExpectEntry) -> String {
    match &entry.description {
        Some(description) => format!("after update {} ({})", label, description),
        None => format!("after update {}", label),
    }
}

pub fn outline(title: &str, entries: &[(Label, ExpectEntry)], config: &Config) -> OutlineNode {
    let single_update = entries.len() == 1 && !config.describe_by_step();
    if !config.run_tag_as_describe() || single_update {
        return OutlineNode::leaf(title);
    }
    let children = entries
        .iter()
        .map(|(label, entry)| {
            let mut node = OutlineNode::leaf(update_name(label, entry));
            if config.describe_by_step() {
                node.children = entry
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| OutlineNode::leaf(format!("step {} ({})", index, step.kind())))
                    .collect();
            }
            node
        })
        .collect();
    OutlineNode {
        name: title.to_string(),
        children,
    }
}
