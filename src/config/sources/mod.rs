//! Configuration sources, in precedence order (lowest first)

pub mod explicit_file;
pub mod global_file;
