//! # MemoClaw Push
//!
//! ntfy delivery: upload a thumbnail to an ephemeral topic, then publish
//! the notification with its attachment to the user's topic.

pub mod ntfy;

pub use ntfy::{NtfyClient, PushAuth, PushMessage};
