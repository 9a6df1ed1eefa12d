//! Decode-thread to engine hand-off
//!
//! The codec is stateless, so decoding may run on a dedicated I/O thread.
//! Decoded messages cross to the engine over a bounded single-producer
//! single-consumer channel and are applied on the owning scene's update
//! tick. Registry and batch manager mutation stays single-threaded.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::error::{SyncError, SyncResult};
use crate::protocol::{decode_message, Message};

pub struct MessageSender {
    tx: Sender<Message>,
}

pub struct MessageReceiver {
    rx: Receiver<Message>,
}

/// Creates the SPSC pair. `capacity` bounds how far the decoder may run
/// ahead of the engine tick.
pub fn message_channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = bounded(capacity);
    (MessageSender { tx }, MessageReceiver { rx })
}

impl MessageSender {
    pub fn send(&self, msg: Message) -> SyncResult<()> {
        self.tx
            .send(msg)
            .map_err(|_| SyncError::ChannelClosed("message queue".to_string()))
    }

    /// Decode one wire frame and queue it. Decode failures (version
    /// mismatch, framing corruption) propagate to the I/O loop, which owns
    /// session teardown.
    pub fn decode_and_send(&self, bytes: &[u8]) -> SyncResult<()> {
        self.send(decode_message(bytes)?)
    }
}

impl MessageReceiver {
    pub fn try_recv(&self) -> SyncResult<Option<Message>> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(SyncError::ChannelClosed("message queue".to_string()))
            }
        }
    }

    /// Everything queued right now, without blocking.
    pub fn drain(&self) -> Vec<Message> {
        self.rx.try_iter().collect()
    }
}
