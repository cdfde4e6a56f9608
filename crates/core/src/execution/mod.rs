//! Command execution pipeline.
//!
//! One run flows through the submodules in order: a [`session`] opens the
//! job directory, [`params`] resolves and materializes parameters,
//! [`command`] renders the command line, [`executor`] runs it, and
//! [`output`] assembles the declared return values. [`runner`] wires the
//! steps together behind [`CommandRunner::run`](runner::CommandRunner::run).

pub mod command;
pub mod executor;
pub mod output;
pub mod params;
pub mod runner;
pub mod session;
