#![forbid(unsafe_code)]

//! `staymap` command-line tool.
//!
//! Renders sandbox pages from entity files, prints clustering results, and
//! replays scripted user sessions against the headless sandbox peer.

pub mod cli;
pub mod clusters;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod render;
pub mod replay;

pub use cli::{run, run_from_env};
pub use error::{CliError, Result};
