//! The lifecycle a [`crate::channel::Channel`] moves through.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Never opened, or closed and not yet reopened.
    Initial,
    Connected,
    Closing,
    Closed,
    /// Closed by a channel-level error; a fresh `channel.open` on next
    /// use transparently reopens it.
    Error,
}

impl ChannelState {
    fn to_u8(self) -> u8 {
        match self {
            ChannelState::Initial => 0,
            ChannelState::Connected => 1,
            ChannelState::Closing => 2,
            ChannelState::Closed => 3,
            ChannelState::Error => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ChannelState::Connected,
            2 => ChannelState::Closing,
            3 => ChannelState::Closed,
            4 => ChannelState::Error,
            _ => ChannelState::Initial,
        }
    }
}

/// An atomic cell for [`ChannelState`] so status can be read without
/// holding the channel's RPC lock.
pub struct ChannelStatus(AtomicU8);

impl ChannelStatus {
    pub fn new() -> Self {
        ChannelStatus(AtomicU8::new(ChannelState::Initial.to_u8()))
    }

    pub fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ChannelState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.get(), ChannelState::Connected)
    }

    /// Channel is gone and must go through `channel.open` again before
    /// the next operation.
    pub fn needs_reopen(&self) -> bool {
        matches!(self.get(), ChannelState::Initial | ChannelState::Closed | ChannelState::Error)
    }
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self::new()
    }
}
