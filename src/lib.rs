pub mod auth;
pub mod backlog;
pub mod board;
pub mod cli;
pub mod cli_handlers;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod navigator;
pub mod render;
pub mod summarizer;

pub use error::{Error, Result};
pub use models::*;
