//! Core process state.

mod state;

pub use state::{setup_shutdown_handler, shutdown_flag};
