pub mod cli;
pub mod ftp;
pub mod load_config;
pub mod mail;

pub use cli::{run, Cli, Commands};
