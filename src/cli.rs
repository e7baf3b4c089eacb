//! CLI domain: parse, route, and presentation only.

pub mod bench;
mod parse;
mod route;

pub use parse::{Cli, Commands};
pub use route::{format_cycle_report, RunContext};
