//! Core analysis pipeline: discovery, parsing, resolution, graph
//! metrics, git history, rules, and plugins sit behind the command
//! surface in `command` and the thin CLI in `bin/roam.rs`.

pub mod command;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod git;
pub mod graph;
pub mod indexer;
pub mod parsing;
pub mod plugins;
pub mod query;
pub mod resolver;
pub mod rules;
pub mod shared;

pub use errors::{ExitCode, Result, RoamError};
