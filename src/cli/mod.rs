//! Command-line interface module.

mod args;
pub mod slim;

pub use args::{Cli, Commands, SlimArgs};
