// ABOUTME: CLI module for the filter-builder tool
// ABOUTME: Exports command line interface components and main application logic

pub mod app;
pub mod args;
pub mod commands;
pub mod config;

pub use app::App;
pub use args::{Args, BuildKind, Commands};
pub use config::Config;
