//! Small formatting helpers for terminal output.

pub mod plural;
pub mod size;
