//! Observer-pattern primitives the bindings are built on: a mutable
//! observable cell, a derived cell, change-subscription guards, and an
//! explicit disposer list executed on binding destruction.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier for one change subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_subscription_id() -> SubscriptionId {
    SubscriptionId(SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ListenerEntry<T> {
    id: SubscriptionId,
    listener: Listener<T>,
}

struct ObservableInner<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<ListenerEntry<T>>>,
}

/// Mutable reactive cell: read, write, subscribe to changes.
///
/// Cloning the cell clones the handle, not the value; all clones share state
/// and subscribers.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                value: RwLock::new(value),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Write the value, then notify subscribers. The listener snapshot is
    /// taken before invocation so no lock is held across callbacks.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();
        let snapshot: Vec<Listener<T>> = {
            let listeners = self.inner.listeners.lock();
            listeners.iter().map(|entry| entry.listener.clone()).collect()
        };
        for listener in snapshot {
            listener(&value);
        }
    }

    /// Register a change listener. Dropping the returned guard unsubscribes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = next_subscription_id();
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            listener: Arc::new(listener),
        });
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|entry| entry.id != id);
            }
        })
    }

    /// Derived cell recomputed from every change of this one
    pub fn derive<U, F>(&self, compute: F) -> Computed<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let initial = compute(&self.get());
        let cell = Observable::new(initial);
        let sink = cell.clone();
        let source = self.subscribe(move |value| sink.set(compute(value)));
        Computed {
            cell,
            _source: source,
        }
    }
}

/// Read-only cell derived from another observable; holds its source
/// subscription for its lifetime
pub struct Computed<T> {
    cell: Observable<T>,
    _source: Subscription,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn get(&self) -> T {
        self.cell.get()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cell.subscribe(listener)
    }
}

/// Guard for a change subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F: FnOnce() + Send + Sync + 'static>(cancel: F) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Explicit disposer list executed when the owning binding is destroyed
#[derive(Default)]
pub struct Disposers {
    actions: Mutex<Vec<Box<dyn FnOnce() + Send + Sync>>>,
}

impl Disposers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` at disposal time
    pub fn defer<F: FnOnce() + Send + Sync + 'static>(&self, action: F) {
        self.actions.lock().push(Box::new(action));
    }

    /// Keep a subscription alive until disposal
    pub fn hold(&self, subscription: Subscription) {
        self.defer(move || drop(subscription));
    }
}

impl Drop for Disposers {
    fn drop(&mut self) {
        for action in self.actions.get_mut().drain(..) {
            action();
        }
    }
}
