//! # MemoClaw Core
//!
//! Shared plumbing for the MemoClaw workspace: the configuration system,
//! the workspace-wide error type, and the fixed-delay retry controller
//! every network call goes through.

pub mod config;
pub mod error;
pub mod retry;

pub use config::MemoClawConfig;
pub use error::{MemoClawError, Result};
pub use retry::with_retry;
