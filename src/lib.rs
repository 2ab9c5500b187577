//! # treememo: Tree-Keyed Memoization for Derived State
//!
//! **`treememo`** memoizes derivations over large, frequently-replaced state
//! snapshots. A [`Selector`][crate::selector::Selector] wraps a pure
//! derivation together with a *dependents* function that names the slices of
//! state the derivation actually reads; results are cached in a tree keyed
//! first by the identity of each dependent slice, then by a string key
//! derived from the call's arguments.
//!
//! ## Why identity, not equality?
//!
//! Immutable-update state stores replace a slice wholesale whenever anything
//! inside it changes, so "same allocation" is a sound and O(1) proxy for
//! "nothing this derivation read has changed". The cache never compares
//! values: a hit requires only that every dependent slice is the same `Arc`
//! allocation as before, which makes lookups cheap regardless of how large
//! the state is. Invalidation is implicit: replacing a slice routes
//! subsequent calls into a fresh cache branch.
//!
//! ## Key Features
//!
//! - **Identity-keyed cache tree**: O(arity) lookups, and per-argument
//!   result variants ("posts for site X" vs "posts for site Y") that never
//!   cross-invalidate.
//! - **Generation-stamped identities**: with no garbage collector, raw
//!   addresses are not stable identities. The
//!   [`IdentityRegistry`][crate::identity::IdentityRegistry] stamps each
//!   slice with a monotonic token and pins its address with a `Weak` probe,
//!   so a recycled allocation can never impersonate a dead slice.
//! - **Policy-bounded growth**: abandoned branches are reclaimed by an
//!   automatic purge watermark, by
//!   [`prune()`][crate::selector::Selector::prune], or by
//!   [`clear_cache()`][crate::selector::Selector::clear_cache], not by a
//!   collector. Long-running processes should pick a cadence.
//! - **Checked and unchecked modes**: debug builds validate that key
//!   arguments render unambiguously; release builds skip the scan and accept
//!   colliding keys, trading misuse-correctness for call-path speed.
//! - **Single-threaded core, lockable shell**: the selector itself is
//!   synchronous with no suspension points; the
//!   [`SharedSelector`][crate::sync::SharedSelector] wrapper serializes
//!   parallel callers and guarantees at-most-once derivation per key.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use treememo::selector::Selector;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Post {
//!     id: u32,
//!     site: u32,
//! }
//!
//! struct State {
//!     posts: Arc<Vec<Post>>,
//! }
//!
//! let posts_by_site = Selector::new(
//!     // Which slices does the derivation read?
//!     |state: &State, _args: &(u32,)| (Arc::clone(&state.posts),),
//!     // The derivation itself, possibly expensive.
//!     |(posts,): &(Arc<Vec<Post>>,), &(site,): &(u32,)| {
//!         posts.iter().filter(|post| post.site == site).cloned().collect::<Vec<_>>()
//!     },
//! );
//!
//! let state = State {
//!     posts: Arc::new(vec![
//!         Post { id: 1, site: 7 },
//!         Post { id: 2, site: 9 },
//!     ]),
//! };
//!
//! let first = posts_by_site.select(&state, (7,));
//! assert_eq!(first, vec![Post { id: 1, site: 7 }]);
//!
//! // Same state, same args: served from the cache.
//! let second = posts_by_site.select(&state, (7,));
//! assert_eq!(first, second);
//! assert_eq!(posts_by_site.hits(), 1);
//! ```
//!
//! ## Core Components
//!
//! - **[`selector`]**: the memoizing [`Selector`][crate::selector::Selector]
//!   and its call contract.
//! - **[`identity`]**: slice identity stamps and the generation registry.
//! - **[`tree`]**: the token-path cache tree.
//! - **[`key`]**: cache-key derivation from positional arguments.
//! - **[`sync`]**: the mutex-wrapped multi-threaded shell.
//!
//! Dependents tuples support arities 1 through 4; an empty dependents tuple
//! is rejected at compile time, since a selector with nothing to invalidate
//! on would be a plain map, not a selector.

pub mod config;
pub mod error;
pub mod identity;
pub mod key;
pub mod selector;
pub mod sync;
pub mod tree;
