//! Procedures and the channel they yield through.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::collab::Automation;
use crate::command::{debug, inner_text, Command, PagePath, Reply};
use crate::errors::SpecError;
use crate::runtime::Snapshot;

/// Receives yielded commands. Implemented by the controller.
pub trait Dispatch {
    fn dispatch(&mut self, command: Command) -> Result<Reply, SpecError>;
}

/// The only handle a running procedure has on the controller.
///
/// Every call blocks until the controller has carried out the command. An
/// error returned here may be handled by the procedure, but once the
/// controller has aborted every later call fails.
pub struct Yielder<'a> {
    dispatch: &'a mut dyn Dispatch,
}

impl<'a> Yielder<'a> {
    pub fn new(dispatch: &'a mut dyn Dispatch) -> Self {
        Self { dispatch }
    }

    pub fn send(&mut self, command: Command) -> Result<Reply, SpecError> {
        self.dispatch.dispatch(command)
    }

    /// Call a page path and return its result.
    pub fn page(&mut self, path: PagePath, args: Vec<Value>) -> Result<Value, SpecError> {
        self.send(path.call(args))?.into_value()
    }

    pub fn inner_text(&mut self, selector: &str) -> Result<String, SpecError> {
        self.send(inner_text(selector))?.into_text()
    }

    pub fn snapshot(&mut self) -> Result<Snapshot, SpecError> {
        self.send(debug())?.into_snapshot()
    }

    /// Drive another procedure on the same channel.
    pub fn run(&mut self, sub: &SubProcedure) -> Result<(), SpecError> {
        sub.run(self)
    }
}

/// A step-by-step unit of test logic.
pub trait Procedure {
    fn run(&self, y: &mut Yielder<'_>) -> Result<(), SpecError>;
}

impl<F> Procedure for F
where
    F: Fn(&mut Yielder<'_>) -> Result<(), SpecError>,
{
    fn run(&self, y: &mut Yielder<'_>) -> Result<(), SpecError> {
        self(y)
    }
}

/// A shareable procedure, as embedded in specs and hooks.
#[derive(Clone)]
pub struct SubProcedure(Rc<dyn Procedure>);

impl SubProcedure {
    pub fn new(procedure: impl Procedure + 'static) -> Self {
        Self(Rc::new(procedure))
    }

    pub fn run(&self, y: &mut Yielder<'_>) -> Result<(), SpecError> {
        self.0.run(y)
    }

    /// Whether both handles point at the same procedure.
    pub fn same(&self, other: &SubProcedure) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SubProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<procedure>")
    }
}

pub fn sub<F>(f: F) -> SubProcedure
where
    F: Fn(&mut Yielder<'_>) -> Result<(), SpecError> + 'static,
{
    SubProcedure::new(f)
}

type CallableFn = dyn Fn(&mut dyn Automation) -> Result<(), SpecError>;

/// A plain function step, handed the page session directly.
#[derive(Clone)]
pub struct Callable(Rc<CallableFn>);

impl Callable {
    pub fn call(&self, page: &mut dyn Automation) -> Result<(), SpecError> {
        (self.0)(page)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<callable>")
    }
}

pub fn callable<F>(f: F) -> Callable
where
    F: Fn(&mut dyn Automation) -> Result<(), SpecError> + 'static,
{
    Callable(Rc::new(f))
}
