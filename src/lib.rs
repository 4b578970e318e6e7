pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod kdp;
pub mod labels;
pub mod radar;
pub mod utils;

pub mod cmd {
    pub use super::commands::Cli;
}
