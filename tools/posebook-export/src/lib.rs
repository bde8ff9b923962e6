//! posebook-export library
//!
//! File-level pose book conversion and editing used by the `posebook-export`
//! binary: format detection, rig loading, settings and the subcommands.

pub mod commands;
pub mod config;
pub mod io;

pub use config::{Config, load_config};
pub use io::{BookFormat, load_book, load_rig, save_book, save_rig};
