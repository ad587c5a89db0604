//! Command handlers for CLI subcommands

mod completions;
mod config;
mod run;

pub use completions::handle_completions;
pub use config::handle_config;
pub use run::handle_run;
