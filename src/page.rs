//! In-process page session.
//!
//! [`PageObject`] is a tree of plain values, nested objects and methods.
//! It answers [`Automation::invoke`] the way a scripted browser page would:
//! methods are called, plain values are returned, and anything else is a
//! forwarding error.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::collab::Automation;
use crate::errors::{unsourced, ErrorKind, SpecError};

pub type Method = Box<dyn FnMut(&[Value]) -> Result<Value, String>>;

pub enum Node {
    Value(Value),
    Object(BTreeMap<String, Node>),
    Method(Method),
}

impl Node {
    /// JSON view of the node. Methods show as `"[function]"`.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Value(value) => value.clone(),
            Node::Object(children) => Value::Object(
                children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.to_value()))
                    .collect(),
            ),
            Node::Method(_) => Value::String("[function]".to_string()),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Node::Object(children) => f.debug_map().entries(children.iter()).finish(),
            Node::Method(_) => f.write_str("Method"),
        }
    }
}

#[derive(Debug)]
pub struct PageObject {
    root: Node,
    closed: bool,
}

impl Default for PageObject {
    fn default() -> Self {
        Self {
            root: Node::Object(BTreeMap::new()),
            closed: false,
        }
    }
}

impl PageObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dotted path (`"keyboard.layout"`).
    pub fn with_value(mut self, path: &str, value: Value) -> Self {
        self.insert(path, Node::Value(value));
        self
    }

    /// Set a method at a dotted path (`"keyboard.press"`).
    pub fn with_method<F>(mut self, path: &str, method: F) -> Self
    where
        F: FnMut(&[Value]) -> Result<Value, String> + 'static,
    {
        self.insert(path, Node::Method(Box::new(method)));
        self
    }

    /// Set an empty object at a dotted path.
    pub fn with_object(mut self, path: &str) -> Self {
        self.insert(path, Node::Object(BTreeMap::new()));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Intermediate segments become objects, replacing whatever was there.
    pub fn insert(&mut self, path: &str, node: Node) {
        let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some(last) = segments.pop() else {
            self.root = node;
            return;
        };
        let mut current = &mut self.root;
        for segment in segments {
            if !matches!(current, Node::Object(_)) {
                *current = Node::Object(BTreeMap::new());
            }
            let Node::Object(children) = current else {
                return;
            };
            current = children
                .entry(segment.to_string())
                .or_insert_with(|| Node::Object(BTreeMap::new()));
        }
        if !matches!(current, Node::Object(_)) {
            *current = Node::Object(BTreeMap::new());
        }
        if let Node::Object(children) = current {
            children.insert(last.to_string(), node);
        }
    }
}

impl Automation for PageObject {
    fn invoke(&mut self, path: &[String], args: &[Value]) -> Result<Value, SpecError> {
        let dotted = path.join(".");
        let forwarding = |reason: String| {
            unsourced(
                "page",
                ErrorKind::Forwarding {
                    path: dotted.clone(),
                    reason,
                },
            )
        };

        let mut current = &mut self.root;
        for segment in path {
            current = match current {
                Node::Object(children) => children
                    .get_mut(segment)
                    .ok_or_else(|| forwarding("is undefined".to_string()))?,
                _ => return Err(forwarding("is undefined".to_string())),
            };
        }

        match current {
            Node::Method(method) => method(args).map_err(forwarding),
            other if args.is_empty() => Ok(other.to_value()),
            _ => Err(forwarding("is not a function".to_string())),
        }
    }

    fn close(&mut self) -> Result<(), SpecError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn forwards_nested_method_calls() {
        let pressed = Rc::new(RefCell::new(Vec::new()));
        let log = pressed.clone();
        let mut page = PageObject::new().with_method("keyboard.press", move |args| {
            log.borrow_mut().push(args.to_vec());
            Ok(Value::Null)
        });
        page.invoke(&path(&["keyboard", "press"]), &[json!("Backspace")])
            .unwrap();
        assert_eq!(*pressed.borrow(), vec![vec![json!("Backspace")]]);
    }

    #[test]
    fn returns_method_results() {
        let mut page = PageObject::new().with_method("$eval", |_| Ok(json!("yep")));
        assert_eq!(page.invoke(&path(&["$eval"]), &[]).unwrap(), json!("yep"));
    }

    #[test]
    fn reads_objects_without_arguments() {
        let mut page = PageObject::new().with_value("keyboard.layout", json!("qwerty"));
        let keyboard = page.invoke(&path(&["keyboard"]), &[]).unwrap();
        assert_eq!(keyboard, json!({ "layout": "qwerty" }));
    }

    #[test]
    fn calling_an_object_is_not_a_function() {
        let mut page = PageObject::new().with_object("keyboard");
        let err = page.invoke(&path(&["keyboard"]), &[json!("boom")]).unwrap_err();
        assert!(err.to_string().contains("not a function"), "{}", err);
        assert!(matches!(err.kind, ErrorKind::Forwarding { .. }));
    }

    #[test]
    fn unknown_segments_are_undefined() {
        let mut page = PageObject::new();
        let err = page.invoke(&path(&["mouse", "click"]), &[]).unwrap_err();
        assert!(err.to_string().contains("is undefined"));
    }
}
