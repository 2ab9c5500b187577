//! Identity stamps for state slices.
//!
//! A selector cache is keyed by *which* slices of state a derivation read,
//! compared by identity rather than by value. Without a garbage collector
//! there is no built-in notion of "same object": a raw address stops being a
//! stable identity the moment the slice is dropped and its allocation is
//! reused. This module implements the arena-and-generation scheme that
//! replaces it:
//!
//! - every distinct live slice gets a monotonically increasing [`Token`] the
//!   first time the registry sees it;
//! - the registry holds a [`Weak`] probe for each slice. While the probe is
//!   held, the allocation's address cannot be reused, so `address + liveness`
//!   identifies the object unambiguously;
//! - a probe with no remaining strong references marks a dead slice; its slot
//!   is replaced with a fresh token on next contact and dropped by
//!   [`IdentityRegistry::purge`].
//!
//! Absent dependents (`Option::None`) all resolve to [`Token::SENTINEL`], so
//! every call with a missing slice at a given tree position shares one cache
//! branch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};

use log::trace;

/// Identity stamp for one dependent slice.
///
/// Tokens are unique per [`IdentityRegistry`] and never reused, including
/// across [`IdentityRegistry::clear`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Token(u64);

impl Token {
    /// Shared stamp for absent dependents.
    pub const SENTINEL: Self = Token(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    /// Return the internal representation of the token.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Probe = Weak<dyn Any + Send + Sync>;

/// Identity of a single dependent as presented at a call site.
pub enum Identity {
    /// A missing slice. Maps to [`Token::SENTINEL`].
    Absent,
    /// A live, `Arc`-held slice.
    Slice { addr: usize, probe: Probe },
}

/// A value usable as one element of a dependents tuple.
///
/// Implemented for `Arc<T>` (identity is the allocation) and for
/// `Option<Arc<T>>` (`None` is the shared absent identity).
pub trait DependencyKey {
    fn identity(&self) -> Identity;
}

impl<T: Send + Sync + 'static> DependencyKey for Arc<T> {
    fn identity(&self) -> Identity {
        let weak: Weak<T> = Arc::downgrade(self);
        let probe: Probe = weak;
        Identity::Slice {
            addr: Arc::as_ptr(self) as usize,
            probe,
        }
    }
}

impl<D: DependencyKey> DependencyKey for Option<D> {
    fn identity(&self) -> Identity {
        match self {
            None => Identity::Absent,
            Some(dep) => dep.identity(),
        }
    }
}

struct Slot {
    probe: Probe,
    token: Token,
}

/// Assigns generation stamps to state-slice identities.
pub struct IdentityRegistry {
    slots: HashMap<usize, Slot>,
    next: u64,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next: 0,
        }
    }

    /// Number of tracked slices, live or dead.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve an identity to its stamp, minting a fresh one for a slice the
    /// registry has not seen (or whose previous occupant of the address has
    /// died).
    pub fn resolve(&mut self, identity: &Identity) -> Token {
        match identity {
            Identity::Absent => Token::SENTINEL,
            Identity::Slice { addr, probe } => {
                if let Some(slot) = self.slots.get(addr) {
                    if slot.probe.strong_count() > 0 {
                        return slot.token;
                    }
                }
                self.next += 1;
                let token = Token(self.next);
                trace!("minted {} for slice at {:#x}", token, addr);
                self.slots.insert(
                    *addr,
                    Slot {
                        probe: probe.clone(),
                        token,
                    },
                );
                token
            }
        }
    }

    /// True if `token` still denotes a live slice. The sentinel is always
    /// live.
    pub fn is_live(&self, token: Token) -> bool {
        token.is_sentinel()
            || self
                .slots
                .values()
                .any(|slot| slot.token == token && slot.probe.strong_count() > 0)
    }

    /// Drops slots whose slice has been dropped, unpinning their allocations.
    ///
    /// After a purge the freed addresses may be reused; a new slice at a
    /// recycled address simply mints a fresh token.
    pub fn purge(&mut self) {
        self.slots.retain(|_, slot| slot.probe.strong_count() > 0);
    }

    /// Forget all slices. Token numbering keeps advancing, so stamps minted
    /// before and after a clear never collide.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Fixed-arity ordered tuple of dependents, resolved to a token path.
///
/// Implemented for tuples of arity 1 through 4. There is deliberately no
/// implementation for `()`: a selector with no dependents has nothing to
/// invalidate on, so an empty tuple is rejected at compile time.
pub trait Dependents {
    const ARITY: usize;

    /// Append one token per tuple element, in order.
    fn write_tokens(&self, registry: &mut IdentityRegistry, out: &mut Vec<Token>);
}

impl<D1: DependencyKey> Dependents for (D1,) {
    const ARITY: usize = 1;

    fn write_tokens(&self, registry: &mut IdentityRegistry, out: &mut Vec<Token>) {
        out.push(registry.resolve(&self.0.identity()));
    }
}

impl<D1: DependencyKey, D2: DependencyKey> Dependents for (D1, D2) {
    const ARITY: usize = 2;

    fn write_tokens(&self, registry: &mut IdentityRegistry, out: &mut Vec<Token>) {
        out.push(registry.resolve(&self.0.identity()));
        out.push(registry.resolve(&self.1.identity()));
    }
}

impl<D1: DependencyKey, D2: DependencyKey, D3: DependencyKey> Dependents for (D1, D2, D3) {
    const ARITY: usize = 3;

    fn write_tokens(&self, registry: &mut IdentityRegistry, out: &mut Vec<Token>) {
        out.push(registry.resolve(&self.0.identity()));
        out.push(registry.resolve(&self.1.identity()));
        out.push(registry.resolve(&self.2.identity()));
    }
}

impl<D1: DependencyKey, D2: DependencyKey, D3: DependencyKey, D4: DependencyKey> Dependents
    for (D1, D2, D3, D4)
{
    const ARITY: usize = 4;

    fn write_tokens(&self, registry: &mut IdentityRegistry, out: &mut Vec<Token>) {
        out.push(registry.resolve(&self.0.identity()));
        out.push(registry.resolve(&self.1.identity()));
        out.push(registry.resolve(&self.2.identity()));
        out.push(registry.resolve(&self.3.identity()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_sentinel() {
        let mut registry = IdentityRegistry::new();
        let dep: Option<Arc<Vec<u32>>> = None;
        assert_eq!(registry.resolve(&dep.identity()), Token::SENTINEL);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_same_slice_same_token() {
        let mut registry = IdentityRegistry::new();
        let slice = Arc::new(vec![1, 2, 3]);

        let a = registry.resolve(&slice.identity());
        let b = registry.resolve(&slice.identity());
        assert_eq!(a, b);

        // A clone shares the allocation, hence the identity.
        let alias = Arc::clone(&slice);
        assert_eq!(registry.resolve(&alias.identity()), a);
    }

    #[test]
    fn test_distinct_slices_distinct_tokens() {
        let mut registry = IdentityRegistry::new();
        let old = Arc::new(vec![1, 2, 3]);
        let new = Arc::new(vec![1, 2, 3]);

        let a = registry.resolve(&old.identity());
        let b = registry.resolve(&new.identity());
        assert_ne!(a, b);
    }

    #[test]
    fn test_dead_slice_is_not_live() {
        let mut registry = IdentityRegistry::new();
        let slice = Arc::new(42u64);
        let token = registry.resolve(&slice.identity());
        assert!(registry.is_live(token));

        drop(slice);
        assert!(!registry.is_live(token));
        assert_eq!(registry.len(), 1);

        registry.purge();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sentinel_always_live() {
        let registry = IdentityRegistry::new();
        assert!(registry.is_live(Token::SENTINEL));
    }

    #[test]
    fn test_tokens_survive_clear() {
        let mut registry = IdentityRegistry::new();
        let first = Arc::new(1u32);
        let a = registry.resolve(&first.identity());

        registry.clear();

        let second = Arc::new(2u32);
        let b = registry.resolve(&second.identity());
        assert_ne!(a, b);
    }

    #[test]
    fn test_tuple_token_paths() {
        let mut registry = IdentityRegistry::new();
        let a = Arc::new(1u32);
        let b = Arc::new(2u32);

        let mut path = Vec::new();
        (Arc::clone(&a), Some(Arc::clone(&b))).write_tokens(&mut registry, &mut path);
        assert_eq!(path.len(), 2);
        assert!(!path[0].is_sentinel());
        assert!(!path[1].is_sentinel());

        let mut absent = Vec::new();
        (Arc::clone(&a), None::<Arc<u32>>).write_tokens(&mut registry, &mut absent);
        assert_eq!(absent[0], path[0]);
        assert_eq!(absent[1], Token::SENTINEL);
    }
}
