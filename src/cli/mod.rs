pub mod args;
pub mod commands;

pub use args::{Cli, Commands, SourceArg};
pub use commands::run;
