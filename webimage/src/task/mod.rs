//! Load task lifecycle.
//!
//! A [`LoadTask`] is the caller's handle on one outstanding request. The
//! orchestrator keeps every live task in a [`TaskRegistry`] and walks it
//! through the [`Stage`] machine:
//!
//! ```text
//! Lookup ──► Editing ─────────────────────────► Done
//!   │                                            ▲
//!   └──────► Fetching ──► Decoding ──► Editing ──┤
//!                            └───────────────────┘
//!
//! any non-terminal stage ──cancel()──► Cancelled
//! ```

mod handle;
mod id;
mod registry;
mod stage;

pub use handle::LoadTask;
pub(crate) use handle::TaskOwner;
pub use id::TaskId;
pub use registry::TaskRegistry;
pub(crate) use registry::Registration;
pub(crate) use stage::Cancelled;
pub use stage::Stage;
