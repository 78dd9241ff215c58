use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Handle for one in-flight request started by a UI element
#[derive(Debug, Clone)]
pub struct TaskTicket {
    pub key: String,
    pub id: u64,
    pub token: CancellationToken,
}

/// One cancellation slot per triggering element. Starting a task on a key
/// cancels whatever was still running there, so only the latest request
/// may write its result back.
#[derive(Debug, Default)]
pub struct TaskSlots {
    slots: Mutex<HashMap<String, (u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl TaskSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a task for `key`, cancelling the previous one
    pub fn begin(&self, key: &str) -> TaskTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        if let Ok(mut slots) = self.slots.lock() {
            if let Some((old_id, old_token)) = slots.insert(key.to_string(), (id, token.clone())) {
                old_token.cancel();
                crate::logger::log_to_file(&format!("[tasks] {} #{} superseded by #{}", key, old_id, id));
            }
        }

        TaskTicket {
            key: key.to_string(),
            id,
            token,
        }
    }

    /// True while the ticket is the latest one for its key and not cancelled
    pub fn is_current(&self, ticket: &TaskTicket) -> bool {
        if ticket.token.is_cancelled() {
            return false;
        }
        self.slots
            .lock()
            .map(|slots| matches!(slots.get(&ticket.key), Some((id, _)) if *id == ticket.id))
            .unwrap_or(false)
    }

    /// Release the slot if the ticket still owns it. Returns whether it did.
    pub fn finish(&self, ticket: &TaskTicket) -> bool {
        let Ok(mut slots) = self.slots.lock() else {
            return false;
        };
        match slots.get(&ticket.key) {
            Some((id, _)) if *id == ticket.id => {
                slots.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }

    /// Cancel everything, e.g. on shutdown
    pub fn cancel_all(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            for (_, (_, token)) in slots.drain() {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_cancels_first() {
        let slots = TaskSlots::new();
        let first = slots.begin("waitlist-form");
        let second = slots.begin("waitlist-form");

        assert!(first.token.is_cancelled());
        assert!(!slots.is_current(&first));
        assert!(slots.is_current(&second));
        assert!(!slots.finish(&first));
        assert!(slots.finish(&second));
        assert!(!slots.finish(&second));
    }

    #[test]
    fn test_keys_are_independent() {
        let slots = TaskSlots::new();
        let form = slots.begin("waitlist-form");
        let counts = slots.begin("counts");

        assert!(slots.is_current(&form));
        assert!(slots.is_current(&counts));

        slots.cancel_all();
        assert!(form.token.is_cancelled());
        assert!(counts.token.is_cancelled());
        assert!(!slots.finish(&counts));
    }
}
