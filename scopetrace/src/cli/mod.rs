//! Command-line interface
//!
//! - `args`: clap argument definitions
//! - `demo`: instrumented sample workload for `scopetrace demo`
//! - `report`: text rendering of statistics and call trees for `inspect`

pub mod args;
pub mod demo;
pub mod report;

pub use args::{Args, Command, DemoArgs, InspectArgs};
