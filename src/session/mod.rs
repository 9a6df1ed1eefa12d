//! Session layer
//!
//! Fence-bracketed batch application, request/response correlation,
//! completion tokens and the decode-thread hand-off queue.

pub mod engine;
pub mod queue;
pub mod ready;

pub use engine::{SessionState, SyncEngine};
pub use queue::{message_channel, MessageReceiver, MessageSender};
pub use ready::{ReadyToken, TokenRegistry};

#[cfg(test)]
mod tests;
