use std::collections::BTreeMap;
use std::fmt;

use tokio::task::JoinHandle;

use super::{ConnectError, ConnectionId, Endpoint, OpenStatus};

type Callback = Box<dyn FnOnce(ConnectionId, OpenStatus) + Send>;

/// Open result callback, invoked exactly once.
///
/// A callback dropped without being resolved reports `ShuttingDown`.
pub struct OpenCallback {
    inner: Option<Callback>,
}

impl OpenCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(ConnectionId, OpenStatus) + Send + 'static,
    {
        Self {
            inner: Some(Box::new(callback)),
        }
    }

    pub fn resolve(mut self, id: ConnectionId, status: OpenStatus) {
        if let Some(callback) = self.inner.take() {
            callback(id, status);
        }
    }
}

impl Drop for OpenCallback {
    fn drop(&mut self) {
        if let Some(callback) = self.inner.take() {
            callback(ConnectionId::INVALID, OpenStatus::Failed(ConnectError::ShuttingDown));
        }
    }
}

impl fmt::Debug for OpenCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenCallback")
            .field("resolved", &self.inner.is_none())
            .finish()
    }
}

/// An in-flight connect, possibly shared by several callers
#[derive(Debug)]
pub struct Attempt {
    pub id: ConnectionId,
    pub endpoint: Endpoint,
    callbacks: Vec<OpenCallback>,
    observers: Vec<String>,
    task: Option<JoinHandle<()>>,
}

impl Attempt {
    pub fn new(id: ConnectionId, endpoint: Endpoint) -> Self {
        Self {
            id,
            endpoint,
            callbacks: Vec::new(),
            observers: Vec::new(),
            task: None,
        }
    }

    pub fn join(&mut self, callback: OpenCallback, observer: Option<String>) {
        self.callbacks.push(callback);
        if let Some(name) = observer {
            if !self.observers.contains(&name) {
                self.observers.push(name);
            }
        }
    }

    pub fn set_task(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    pub fn waiting(&self) -> usize {
        self.callbacks.len()
    }

    /// Observers to attach once the connection opens, in request order.
    pub fn observers(&self) -> &[String] {
        &self.observers
    }

    pub fn detach_observer(&mut self, name: &str) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o != name);
        self.observers.len() != before
    }

    /// Stop the connect task and deliver `status` to every waiting caller
    /// in the order they joined.
    pub fn resolve(mut self, status: OpenStatus) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let id = self.id;
        for callback in self.callbacks.drain(..) {
            callback.resolve(id, status.clone());
        }
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let id = self.id;
        for callback in self.callbacks.drain(..) {
            callback.resolve(id, OpenStatus::Failed(ConnectError::ShuttingDown));
        }
    }
}

/// Attempts that have not resolved yet, keyed by connection id
#[derive(Debug, Default)]
pub struct PendingAttempts {
    attempts: BTreeMap<ConnectionId, Attempt>,
}

impl PendingAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, attempt: Attempt) {
        assert!(
            !self.attempts.contains_key(&attempt.id),
            "attempt {} started twice",
            attempt.id
        );
        self.attempts.insert(attempt.id, attempt);
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Attempt> {
        self.attempts.get_mut(&id)
    }

    /// Take the attempt out so it can be resolved; later results for it find nothing.
    pub fn take(&mut self, id: ConnectionId) -> Option<Attempt> {
        self.attempts.remove(&id)
    }

    pub fn drain(&mut self) -> Vec<Attempt> {
        std::mem::take(&mut self.attempts).into_values().collect()
    }

    /// Forget `name` on every attempt, so it is not attached when they open.
    pub fn detach_observer(&mut self, name: &str) -> usize {
        let mut detached = 0;
        for attempt in self.attempts.values_mut() {
            if attempt.detach_observer(name) {
                detached += 1;
            }
        }
        detached
    }
}
