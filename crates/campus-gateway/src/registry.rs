use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use campus_db::{Database, InsertHook};
use campus_types::events::LiveEvent;
use campus_types::models::Message;

/// Why a listener could not take an event.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The receiving side is gone; the listener is pruned.
    #[error("listener closed")]
    Closed,

    #[error("listener failed: {0}")]
    Failed(String),
}

/// Receives live events for one group. Must not call `publish` for its own
/// group from inside `deliver`.
pub trait Listener: Send + Sync {
    fn deliver(&self, event: &LiveEvent) -> Result<(), DeliveryError>;
}

impl<F> Listener for F
where
    F: Fn(&LiveEvent) -> Result<(), DeliveryError> + Send + Sync,
{
    fn deliver(&self, event: &LiveEvent) -> Result<(), DeliveryError> {
        self(event)
    }
}

/// Identifies one registration; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    group_id: Uuid,
}

impl SubscriptionHandle {
    pub fn group_id(&self) -> Uuid {
        self.group_id
    }
}

#[derive(Clone)]
struct Entry {
    id: u64,
    listener: Arc<dyn Listener>,
    active: Arc<AtomicBool>,
}

/// Listener set of one group. `pending` holds staged messages in stage order.
/// `delivery` serializes draining it, so each listener sees events in stage
/// order. Neither `pending` nor `listeners` is held while a listener runs,
/// which keeps staging cheap and unsubscribe callable from a listener.
#[derive(Default)]
struct GroupListeners {
    listeners: Mutex<Vec<Entry>>,
    pending: Mutex<VecDeque<Message>>,
    delivery: Mutex<()>,
}

/// Routes each appended message to every live listener of its group.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    groups: RwLock<HashMap<Uuid, Arc<GroupListeners>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed every message the database stores into this registry. Messages
    /// are staged while the store's writer is held and delivered after it is
    /// released, so listeners never run under the database lock.
    pub fn attach(&self, db: &Database) -> anyhow::Result<()> {
        db.on_message_insert(self.clone())
    }

    pub fn subscribe(&self, group_id: Uuid, listener: impl Listener + 'static) -> SubscriptionHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            listener: Arc::new(listener),
            active: Arc::new(AtomicBool::new(true)),
        };

        let mut groups = write(&self.inner.groups);
        let set = groups.entry(group_id).or_default();
        lock(&set.listeners).push(entry);

        debug!("Subscription {} registered for group {}", id, group_id);
        SubscriptionHandle { id, group_id }
    }

    /// Remove a listener. Idempotent, and safe to call from inside `deliver`.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.remove(handle.group_id, &[handle.id]);
    }

    /// Queue `message` for its group without running any listener. Staged
    /// messages of one group are delivered in the order they were staged.
    pub fn stage(&self, message: &Message) {
        if let Some(set) = read(&self.inner.groups).get(&message.group_id) {
            lock(&set.pending).push_back(message.clone());
        }
    }

    /// Deliver everything staged for a group, oldest first. Only this group's
    /// locks are held while listeners run. Returns how many deliveries
    /// were accepted.
    pub fn flush(&self, group_id: Uuid) -> usize {
        let Some(set) = read(&self.inner.groups).get(&group_id).cloned() else {
            return 0;
        };

        let _in_order = lock(&set.delivery);
        let mut delivered = 0;
        loop {
            let next = lock(&set.pending).pop_front();
            let Some(message) = next else { break };
            delivered += self.deliver(&set, &message);
        }
        delivered
    }

    /// Stage and flush in one step. Anything staged earlier for the group goes
    /// out first and is counted too.
    pub fn publish(&self, message: &Message) -> usize {
        self.stage(message);
        self.flush(message.group_id)
    }

    fn deliver(&self, set: &GroupListeners, message: &Message) -> usize {
        let group_id = message.group_id;
        let event = LiveEvent::new(message.clone());
        let snapshot: Vec<Entry> = lock(&set.listeners).clone();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in &snapshot {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| entry.listener.deliver(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(DeliveryError::Closed)) => closed.push(entry.id),
                Ok(Err(e)) => warn!(
                    "Subscription {} failed on message {} in group {}: {}",
                    entry.id, message.id, group_id, e
                ),
                Err(_) => warn!(
                    "Subscription {} panicked on message {} in group {}",
                    entry.id, message.id, group_id
                ),
            }
        }

        if !closed.is_empty() {
            debug!("Pruning {} closed subscriptions in group {}", closed.len(), group_id);
            self.remove(group_id, &closed);
        }

        delivered
    }

    /// Number of live listeners on a group.
    pub fn listener_count(&self, group_id: Uuid) -> usize {
        read(&self.inner.groups)
            .get(&group_id)
            .map_or(0, |set| lock(&set.listeners).len())
    }

    /// Number of groups with at least one listener.
    pub fn group_count(&self) -> usize {
        read(&self.inner.groups).len()
    }

    fn remove(&self, group_id: Uuid, ids: &[u64]) {
        let mut groups = write(&self.inner.groups);
        let Some(set) = groups.get(&group_id) else {
            return;
        };

        let now_empty = {
            let mut listeners = lock(&set.listeners);
            listeners.retain(|entry| {
                if ids.contains(&entry.id) {
                    entry.active.store(false, Ordering::Release);
                    false
                } else {
                    true
                }
            });
            listeners.is_empty()
        };

        if now_empty {
            groups.remove(&group_id);
        }
    }
}

impl InsertHook for Registry {
    fn staged(&self, message: &Message) {
        self.stage(message);
    }

    fn committed(&self, group_id: Uuid) {
        self.flush(group_id);
    }
}

// Listener panics are caught before they can poison these locks; recover the
// guard anyway rather than take the whole registry down.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}
