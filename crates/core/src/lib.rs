//! Execution engine for a registry of pre-configured shell commands.
//!
//! A [`CommandSpec`](spec::CommandSpec) describes a command line template,
//! the parameters it accepts and the outputs it returns. The
//! [`CommandRunner`](execution::runner::CommandRunner) turns a spec plus a
//! caller-supplied [`ParamMap`](execution::params::ParamMap) into one isolated
//! subprocess run inside a throwaway scratch directory.

pub mod error;
pub mod execution;
pub mod registry;
pub mod spec;
pub mod template;
