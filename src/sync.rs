//! Sharing a selector across threads.
//!
//! [`Selector`] is single-threaded by design: a call is a bounded,
//! synchronous computation with no suspension points. When genuinely
//! parallel callers need one cache, [`SharedSelector`] serializes calls
//! through a mutex. The lock is held across the whole miss path, so the
//! derivation runs **at most once** per `(dependents, key)` even when
//! several threads race through the same miss; the losers observe the hit.
//! The cost is that a slow derivation blocks concurrent callers, which is
//! the intended trade for derivations with side effects or real expense.

use std::sync::{Mutex, PoisonError};

use crate::error::SelectorError;
use crate::identity::Dependents;
use crate::key::KeyArgs;
use crate::selector::Selector;

/// A [`Selector`] behind a mutex, safe to share across threads.
pub struct SharedSelector<S, A, D, V> {
    inner: Mutex<Selector<S, A, D, V>>,
}

impl<S, A, D, V> SharedSelector<S, A, D, V>
where
    A: KeyArgs,
    D: Dependents,
    V: Clone,
{
    pub fn new(selector: Selector<S, A, D, V>) -> Self {
        Self {
            inner: Mutex::new(selector),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Selector<S, A, D, V>> {
        // A panic inside a derivation leaves the cache without the failed
        // entry but otherwise intact, so the poison flag carries no signal.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`Selector::select`].
    pub fn select(&self, state: &S, args: A) -> V {
        self.lock().select(state, args)
    }

    /// See [`Selector::try_select`].
    pub fn try_select(&self, state: &S, args: A) -> Result<V, SelectorError> {
        self.lock().try_select(state, args)
    }

    /// Atomic with respect to in-flight calls: they either completed before
    /// the clear or start against the fresh cache.
    pub fn clear_cache(&self) {
        self.lock().clear_cache();
    }

    /// See [`Selector::prune`].
    pub fn prune(&self) {
        self.lock().prune();
    }

    pub fn hits(&self) -> usize {
        self.lock().hits()
    }

    pub fn misses(&self) -> usize {
        self.lock().misses()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
