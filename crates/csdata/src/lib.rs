#![forbid(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod extract;
pub mod query;
pub mod request;
pub mod results;
pub mod sqlite;
pub mod utils;

pub use cli::app::{Cli, Command};
