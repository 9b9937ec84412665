//! CLI argument parsing.

mod args;
mod validators;

pub use args::{
    CellArgs, Cli, Command, ConfigAction, ImageArgs, ImageModeArgs, LogArgs, ReplayArgs,
    RequestArgs, ScoresArgs,
};
