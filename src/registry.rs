//! Connection registry
//!
//! The set of active sessions keyed by display name. Every operation takes
//! the same mutex, so check-then-insert in `register` is atomic and two
//! sessions can never hold the same name.
//!
//! The lock is only ever held for map operations and non-blocking sink
//! enqueues, never across an `.await` or a socket write.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::AppError;
use crate::sink::Sink;
use crate::types::DisplayName;

/// Thread-safe registry of named sessions
#[derive(Debug)]
pub struct Registry<S> {
    sessions: Mutex<HashMap<DisplayName, S>>,
}

impl<S: Sink> Registry<S> {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Claim `name` for `sink`
    ///
    /// Fails with `NameTaken` if another session already holds the name.
    pub fn register(&self, name: &DisplayName, sink: S) -> Result<(), AppError> {
        self.register_with(name, sink, |_| {})
    }

    /// Claim `name` for `sink`, then run `f` on the new sink before the
    /// lock is released
    ///
    /// Anything `f` queues on the sink is ahead of every broadcast that can
    /// see the new session.
    pub fn register_with<F>(&self, name: &DisplayName, sink: S, f: F) -> Result<(), AppError>
    where
        F: FnOnce(&S),
    {
        let mut sessions = self.lock();
        if sessions.contains_key(name) {
            return Err(AppError::NameTaken(name.to_string()));
        }
        f(&sink);
        sessions.insert(name.clone(), sink);
        Ok(())
    }

    /// Release `name`; returns whether anything was removed
    pub fn unregister(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    /// Release `name` and, in the same critical section, hand the remaining
    /// sinks to `f`
    ///
    /// No registration can slip in between the removal and `f`, which is
    /// what keeps a departure notice from racing a newcomer taking the name.
    /// `f` runs only if the name was registered.
    pub fn unregister_with<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(&mut dyn Iterator<Item = &S>),
    {
        let mut sessions = self.lock();
        if sessions.remove(name).is_none() {
            return false;
        }
        f(&mut sessions.values());
        true
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Point-in-time copy of every registered sink
    pub fn all_sinks(&self) -> Vec<S> {
        self.lock().values().cloned().collect()
    }

    pub fn sink_for(&self, name: &str) -> Option<S> {
        self.lock().get(name).cloned()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock can't leave the map half-updated, so
    // poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<DisplayName, S>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Sink> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}
