//! Runtime for hmr-spec procedures.
//!
//! - [`procedure`]: the [`Procedure`] trait and the [`Yielder`] channel.
//! - [`controller`]: the effect interpreter.
//! - [`invocation`]: one test run, from procedure to [`InvocationReport`].

pub mod controller;
pub mod invocation;
pub mod procedure;

pub use controller::{Controller, RunStats, Snapshot};
pub use invocation::{run_spec_test, Invocation, InvocationReport, Outcome};
pub use procedure::{callable, sub, Callable, Dispatch, Procedure, SubProcedure, Yielder};
