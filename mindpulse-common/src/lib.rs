//! # MindPulse Common Library
//!
//! Shared code for the MindPulse services:
//! - Configuration loading and resolution (CLI → ENV → TOML → defaults)
//! - Common error type
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
