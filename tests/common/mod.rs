//! Shared fake app for the integration tests.
//!
//! The app's "render" is the text of `src/App.html`, copied out on every
//! rebuild. Every collaborator call is appended to an event log.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use hmr_spec::build::MemoryBuild;
use hmr_spec::collab::{Automation, Session};
use hmr_spec::config::Config;
use hmr_spec::errors::{unsourced, ErrorKind, SpecError};
use hmr_spec::page::PageObject;
use hmr_spec::runtime::{sub, SubProcedure};
use hmr_spec::vfs::FileSystem;
use serde_json::{json, Value};

pub type Events = Rc<RefCell<Vec<String>>>;

/// Rebuilds fail while `src/App.html` contains this.
pub const BROKEN: &str = "<<syntax error>>";

pub struct FakeApp {
    pub config: Config,
    pub events: Events,
    pub rendered: Rc<RefCell<String>>,
    pub launches: Rc<Cell<usize>>,
    pub fail_launch: bool,
}

impl FakeApp {
    pub fn new() -> Self {
        Self {
            config: Config {
                app_path: "/app".into(),
                app_html_prefix: String::new(),
                ..Config::default()
            },
            events: Rc::new(RefCell::new(Vec::new())),
            rendered: Rc::new(RefCell::new(String::new())),
            launches: Rc::new(Cell::new(0)),
            fail_launch: false,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Events starting with `prefix`, in order.
    pub fn events_of(&self, prefix: &str) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// A sub that logs `name` when run.
    pub fn mark(&self, name: &str) -> SubProcedure {
        let events = self.events.clone();
        let name = name.to_string();
        sub(move |_| {
            events.borrow_mut().push(format!("sub {}", name));
            Ok(())
        })
    }

    pub fn launcher(&self) -> impl FnMut(&Config) -> Result<Session, SpecError> {
        let events = self.events.clone();
        let rendered = self.rendered.clone();
        let launches = self.launches.clone();
        let fail = self.fail_launch;
        move |config: &Config| {
            launches.set(launches.get() + 1);
            events.borrow_mut().push("launch".to_string());
            if fail {
                return Err(unsourced(
                    "launch",
                    ErrorKind::Io {
                        message: "browser not found".to_string(),
                    },
                ));
            }
            let build = {
                let events = events.clone();
                let rendered = rendered.clone();
                MemoryBuild::new(config)?.on_rebuild(move |fs| {
                    events.borrow_mut().push("rebuild".to_string());
                    let html = fs.read(Path::new("src/App.html")).unwrap_or_default();
                    if html.contains(BROKEN) {
                        return Err("Unexpected token (1:1)".to_string());
                    }
                    *rendered.borrow_mut() = html;
                    Ok(())
                })
            };
            let page = RecordingPage::new(events.clone(), rendered.clone());
            Ok(Session {
                build: Box::new(build),
                page: Box::new(page),
            })
        }
    }
}

/// A page whose root element holds whatever the last rebuild rendered.
pub struct RecordingPage {
    inner: PageObject,
    events: Events,
}

impl RecordingPage {
    pub fn new(events: Events, rendered: Rc<RefCell<String>>) -> Self {
        let inner = PageObject::new()
            .with_value("url", json!("http://localhost:8080/"))
            .with_method("$eval", move |_args| Ok(Value::String(rendered.borrow().clone())))
            .with_method("keyboard.press", {
                let events = events.clone();
                move |args| {
                    events.borrow_mut().push(format!("press {}", args[0]));
                    Ok(Value::Null)
                }
            })
            .with_method("goto", {
                let events = events.clone();
                move |args| {
                    events.borrow_mut().push(format!("goto {}", args[0]));
                    Ok(Value::Null)
                }
            });
        Self { inner, events }
    }
}

impl Automation for RecordingPage {
    fn invoke(&mut self, path: &[String], args: &[Value]) -> Result<Value, SpecError> {
        self.inner.invoke(path, args)
    }

    fn close(&mut self) -> Result<(), SpecError> {
        self.events.borrow_mut().push("page closed".to_string());
        self.inner.close()
    }
}
