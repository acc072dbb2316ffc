//! Consumer-tag registry: maps the tags a `basic.consume` call hands
//! out to the delivery and cancellation callbacks the application
//! registered for them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;

pub type DeliveryCallback = Arc<dyn Fn(Message) + Send + Sync>;
pub type CancelCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct Registration {
    on_delivery: DeliveryCallback,
    on_cancel: Option<CancelCallback>,
    no_ack: bool,
}

/// Per-channel table of active consumers, guarded by a single mutex
/// since registration and dispatch both happen off the hot I/O path.
#[derive(Default)]
pub struct ConsumerRegistry {
    consumers: Mutex<HashMap<String, Registration>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        ConsumerRegistry {
            consumers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(
        &self,
        tag: impl Into<String>,
        no_ack: bool,
        on_delivery: DeliveryCallback,
        on_cancel: Option<CancelCallback>,
    ) {
        self.consumers.lock().insert(
            tag.into(),
            Registration {
                on_delivery,
                on_cancel,
                no_ack,
            },
        );
    }

    pub fn remove(&self, tag: &str) {
        self.consumers.lock().remove(tag);
    }

    pub fn is_no_ack(&self, tag: &str) -> bool {
        self.consumers.lock().get(tag).map(|r| r.no_ack).unwrap_or(false)
    }

    /// Dispatch a delivered message to its consumer's callback. Returns
    /// `false` if no consumer is registered for the tag (a programming
    /// error per the delivery/dispatch contract: the caller decides how
    /// to surface that).
    pub fn dispatch(&self, tag: &str, message: Message) -> bool {
        let callback = self.consumers.lock().get(tag).map(|r| r.on_delivery.clone());
        match callback {
            Some(cb) => {
                cb(message);
                true
            }
            None => false,
        }
    }

    /// Invoke the cancel callback for a server-initiated `basic.cancel`
    /// (consumer_cancel_notify). Returns `true` if one was registered.
    pub fn notify_cancelled(&self, tag: &str) -> bool {
        let callback = self.consumers.lock().get(tag).and_then(|r| r.on_cancel.clone());
        match callback {
            Some(cb) => {
                cb(tag);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.consumers.lock().contains_key(tag)
    }
}
