//! # MemoClaw Notify
//!
//! The slot engine: randomized delay windows, per-user per-day slot
//! state, content selection (memory years with face preference, person
//! photos with recency exclusion), and the dispatcher that drives one
//! slot run end to end.

pub mod dispatcher;
pub mod selector;
pub mod state;
pub mod window;

pub use dispatcher::{process_user, run_slot, RunOptions, RunReport, UserOutcome};
pub use selector::{SlotContent, SlotRole};
pub use state::{NotifyState, StateStore, UserSlotState};
pub use window::compute_delay;
