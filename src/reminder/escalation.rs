use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::AbortHandle;

struct Armed {
    generation: u64,
    handle: AbortHandle,
    /// Set once the delay has elapsed. A started task is never aborted, so a
    /// send that went out is always followed by its log entry.
    started: bool,
}

impl Armed {
    fn stop(self) {
        if !self.started {
            self.handle.abort();
        }
    }
}

/// Delayed escalation tasks keyed by reminder id.
///
/// An armed entry means the reminder has been delivered and is waiting for the
/// user to acknowledge it. Cancelling aborts the task while it is still
/// waiting; once it has started it runs to completion and re-checks the
/// reminder itself.
#[derive(Clone, Default)]
pub struct EscalationRegistry {
    tasks: Arc<DashMap<String, Armed>>,
    generation: Arc<AtomicU64>,
}

impl EscalationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless cancelled first. Re-arming a reminder
    /// aborts the previous task if it has not started.
    pub fn arm<F>(&self, reminder_id: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let tasks = self.tasks.clone();
        let id = reminder_id.to_string();

        // The entry stays locked until the handle is stored, so the task
        // cannot look it up before it exists.
        let entry = self.tasks.entry(reminder_id.to_string());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let claimed = match tasks.get_mut(&id) {
                Some(mut armed) if armed.generation == generation => {
                    armed.started = true;
                    true
                }
                _ => false,
            };
            if !claimed {
                return;
            }

            task.await;
            tasks.remove_if(&id, |_, armed| armed.generation == generation);
        });

        let armed = Armed {
            generation,
            handle: handle.abort_handle(),
            started: false,
        };
        match entry {
            Entry::Occupied(mut occupied) => occupied.insert(armed).stop(),
            Entry::Vacant(vacant) => {
                vacant.insert(armed);
            }
        }
    }

    /// Drop the escalation of a reminder. Returns whether one was armed.
    pub fn cancel(&self, reminder_id: &str) -> bool {
        match self.tasks.remove(reminder_id) {
            Some((_, armed)) => {
                armed.stop();
                tracing::debug!("Escalation for reminder {} cancelled", reminder_id);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, reminder_id: &str) -> bool {
        self.tasks.contains_key(reminder_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn cancel_all(&self) {
        let ids: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, armed)) = self.tasks.remove(&id) {
                armed.stop();
            }
        }
    }
}
