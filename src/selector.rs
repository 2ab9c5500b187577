//! The tree-keyed memoizing selector.
//!
//! A [`Selector`] wraps a possibly expensive derivation over a state
//! snapshot so that repeated calls recompute only when the slices the
//! derivation actually reads have been replaced. Callers declare those
//! slices with a *dependents* function; results are cached in a tree keyed
//! first by the identity of each dependent (in order), then by a string key
//! derived from the call's positional arguments.
//!
//! Invalidation is implicit: replacing a slice of state gives it a new
//! identity, which routes subsequent lookups into a fresh cache branch.
//! There is no garbage collector to reclaim the abandoned branch, so growth
//! is bounded by policy rather than by live state: calls past the
//! configured purge watermark prune dead branches, and [`Selector::prune`]
//! and [`Selector::clear_cache`] are available for explicit control. Pick a
//! cadence for one of them in long-running processes.
//!
//! A `Selector` is single-threaded; wrap it in a
//! [`SharedSelector`][crate::sync::SharedSelector] to share it across
//! threads.

use std::cell::RefCell;

use log::{debug, trace};

use crate::config::SelectorConfig;
use crate::error::SelectorError;
use crate::identity::{Dependents, IdentityRegistry};
use crate::key::KeyArgs;
use crate::tree::CacheTree;

type DepsFn<S, A, D> = Box<dyn Fn(&S, &A) -> D + Send>;
type ComputeFn<D, A, V> = Box<dyn Fn(&D, &A) -> V + Send>;
type KeyFn<A> = Box<dyn Fn(&A) -> String + Send>;

/// A memoizing selector over state snapshots of type `S`.
///
/// Type parameters: `A` is the positional-argument tuple, `D` the
/// dependents tuple returned by the dependents function, `V` the derived
/// value. `V: Clone` because cache hits hand out a clone of the stored
/// result; in practice `V` is usually an `Arc` or another cheap handle.
pub struct Selector<S, A, D, V> {
    deps: DepsFn<S, A, D>,
    compute: ComputeFn<D, A, V>,
    key_fn: Option<KeyFn<A>>,
    config: SelectorConfig,
    registry: RefCell<IdentityRegistry>,
    tree: RefCell<CacheTree<V>>,
}

impl<S, A, D, V> Selector<S, A, D, V>
where
    A: KeyArgs,
    D: Dependents,
    V: Clone,
{
    /// Creates a selector from a dependents function and a derivation.
    pub fn new(
        deps: impl Fn(&S, &A) -> D + Send + 'static,
        compute: impl Fn(&D, &A) -> V + Send + 'static,
    ) -> Self {
        Self::with_config(deps, compute, SelectorConfig::default())
    }

    pub fn with_config(
        deps: impl Fn(&S, &A) -> D + Send + 'static,
        compute: impl Fn(&D, &A) -> V + Send + 'static,
        config: SelectorConfig,
    ) -> Self {
        Self {
            deps: Box::new(deps),
            compute: Box::new(compute),
            key_fn: None,
            registry: RefCell::new(IdentityRegistry::new()),
            tree: RefCell::new(CacheTree::new(D::ARITY, config.leaf_capacity())),
            config,
        }
    }

    /// Replaces the default key derivation with a custom one.
    ///
    /// Key-argument validation only applies to the default derivation; a
    /// custom key function takes full responsibility for key uniqueness.
    pub fn with_key_fn(mut self, key_fn: impl Fn(&A) -> String + Send + 'static) -> Self {
        self.key_fn = Some(Box::new(key_fn));
        self
    }

    /// Returns the memoized derivation for `(state, args)`, computing it on
    /// a miss.
    ///
    /// # Panics
    ///
    /// In checked mode, panics if a key argument renders into an ambiguous
    /// segment (see [`SelectorError::InvalidKeyArgument`]). Use
    /// [`try_select`][Self::try_select] to handle that case as an error.
    pub fn select(&self, state: &S, args: A) -> V {
        match self.try_select(state, args) {
            Ok(value) => value,
            Err(e) => panic!("{}", e),
        }
    }

    /// Fallible variant of [`select`][Self::select].
    pub fn try_select(&self, state: &S, args: A) -> Result<V, SelectorError> {
        if self.config.is_checked() && self.key_fn.is_none() {
            args.validate()?;
        }

        let deps = (self.deps)(state, &args);

        let mut path = Vec::with_capacity(D::ARITY);
        {
            let mut registry = self.registry.borrow_mut();
            deps.write_tokens(&mut registry, &mut path);

            if registry.len() > self.config.purge_watermark() {
                registry.purge();
                self.tree
                    .borrow_mut()
                    .retain_tokens(|token| registry.is_live(token));
                debug!("purged identity registry, {} live slices remain", registry.len());
            }
        }

        let key = match &self.key_fn {
            Some(key_fn) => key_fn(&args),
            None => {
                let mut key = String::new();
                args.write_key(&mut key);
                key
            }
        };

        if let Some(value) = self.tree.borrow_mut().get(&path, &key) {
            trace!("hit: path = {:?}, key = {:?}", path, key);
            return Ok(value.clone());
        }
        trace!("miss: path = {:?}, key = {:?}", path, key);

        // Cache borrows are released here, so the derivation may itself call
        // other selectors (or even this one).
        let value = (self.compute)(&deps, &args);
        self.tree.borrow_mut().insert(&path, key, value.clone());
        Ok(value)
    }

    /// Drops every memoized result and every tracked identity.
    pub fn clear_cache(&self) {
        self.tree.borrow_mut().clear();
        self.registry.borrow_mut().clear();
    }

    /// Explicit eviction: drops cache branches whose slice has been dropped.
    pub fn prune(&self) {
        let mut registry = self.registry.borrow_mut();
        registry.purge();
        self.tree
            .borrow_mut()
            .retain_tokens(|token| registry.is_live(token));
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> usize {
        self.tree.borrow().hits()
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> usize {
        self.tree.borrow().misses()
    }

    /// Number of memoized entries currently held.
    pub fn len(&self) -> usize {
        self.tree.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::key::Raw;

    #[derive(Debug, Clone, PartialEq)]
    struct Post {
        id: &'static str,
        site_id: &'static str,
    }

    struct State {
        posts: Arc<Vec<Post>>,
    }

    fn posts_fixture() -> Arc<Vec<Post>> {
        Arc::new(vec![
            Post { id: "p1", site_id: "s1" },
            Post { id: "p2", site_id: "s1" },
            Post { id: "p3", site_id: "s2" },
        ])
    }

    /// Selector from the posts-by-site scenario, with an invocation counter.
    fn posts_by_site(
        calls: Arc<AtomicUsize>,
    ) -> Selector<State, (&'static str,), (Arc<Vec<Post>>,), Vec<Post>> {
        Selector::new(
            |state: &State, _args| (Arc::clone(&state.posts),),
            move |(posts,), (site_id,)| {
                calls.fetch_add(1, Ordering::SeqCst);
                posts
                    .iter()
                    .filter(|post| post.site_id == *site_id)
                    .cloned()
                    .collect()
            },
        )
    }

    #[test]
    fn test_memoization_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = posts_by_site(Arc::clone(&calls));
        let state = State { posts: posts_fixture() };

        let first = selector.select(&state, ("s1",));
        let second = selector.select(&state, ("s1",));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(selector.hits(), 1);
        assert_eq!(selector.misses(), 1);
    }

    #[test]
    fn test_invalidation_on_dependents_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = posts_by_site(Arc::clone(&calls));

        let mut state = State { posts: posts_fixture() };
        selector.select(&state, ("s1",));

        // Replace the slice with a structurally equal but distinct one.
        state.posts = posts_fixture();
        selector.select(&state, ("s1",));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key_independence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = posts_by_site(Arc::clone(&calls));
        let state = State { posts: posts_fixture() };

        let s1 = selector.select(&state, ("s1",));
        let s2 = selector.select(&state, ("s2",));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(s1.len(), 2);
        assert_eq!(s2.len(), 1);

        // Both keys stay retrievable independently.
        assert_eq!(selector.select(&state, ("s1",)), s1);
        assert_eq!(selector.select(&state, ("s2",)), s2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_posts_by_site_scenario() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = posts_by_site(Arc::clone(&calls));
        let state = State { posts: posts_fixture() };

        assert_eq!(
            selector.select(&state, ("s1",)),
            vec![
                Post { id: "p1", site_id: "s1" },
                Post { id: "p2", site_id: "s1" },
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        selector.select(&state, ("s1",));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(
            selector.select(&state, ("s2",)),
            vec![Post { id: "p3", site_id: "s2" }]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let updated = State { posts: posts_fixture() };
        selector.select(&updated, ("s1",));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_absent_dependents_share_a_branch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let selector: Selector<Option<Arc<Vec<Post>>>, (), (Option<Arc<Vec<Post>>>,), usize> =
            Selector::new(
                |state: &Option<Arc<Vec<Post>>>, _args| (state.clone(),),
                move |(posts,), _args| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    posts.as_ref().map_or(0, |posts| posts.len())
                },
            );

        // Two separate calls with an absent slice resolve to the shared
        // sentinel branch: one computation.
        assert_eq!(selector.select(&None, ()), 0);
        assert_eq!(selector.select(&None, ()), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A present slice gets its own branch.
        let present = Some(posts_fixture());
        assert_eq!(selector.select(&present, ()), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_multi_level_dependents() {
        struct Two {
            a: Arc<u32>,
            b: Arc<u32>,
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let selector: Selector<Two, (), (Arc<u32>, Arc<u32>), u32> = Selector::new(
            |state: &Two, _args| (Arc::clone(&state.a), Arc::clone(&state.b)),
            move |(a, b), _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                **a + **b
            },
        );

        let a = Arc::new(1);
        let original = Two { a: Arc::clone(&a), b: Arc::new(10) };
        assert_eq!(selector.select(&original, ()), 11);

        // Change only `b`: the branch under the old `b` is abandoned, the
        // new one is independent.
        let updated = Two { a: Arc::clone(&a), b: Arc::new(20) };
        assert_eq!(selector.select(&updated, ()), 21);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The original identities are still live, so the original branch
        // still hits.
        assert_eq!(selector.select(&original, ()), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_cache_recomputes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = posts_by_site(Arc::clone(&calls));
        let state = State { posts: posts_fixture() };

        selector.select(&state, ("s1",));
        selector.clear_cache();
        assert!(selector.is_empty());

        selector.select(&state, ("s1",));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_prune_drops_dead_branches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = posts_by_site(Arc::clone(&calls));

        let state = State { posts: posts_fixture() };
        selector.select(&state, ("s1",));
        assert_eq!(selector.len(), 1);

        drop(state);
        selector.prune();
        assert!(selector.is_empty());
    }

    #[test]
    fn test_checked_rejects_ambiguous_key_argument() {
        let selector: Selector<u32, (Raw<&'static str>,), (Arc<u32>,), u32> =
            Selector::with_config(
                |_state, _args| (Arc::new(0),),
                |_deps, _args| 0,
                SelectorConfig::default().with_checked(true),
            );

        let err = selector.try_select(&0, (Raw("a,b"),)).unwrap_err();
        assert!(matches!(err, SelectorError::InvalidKeyArgument { index: 0, .. }));
    }

    #[test]
    #[should_panic(expected = "contains the ',' delimiter")]
    fn test_checked_select_panics() {
        let selector: Selector<u32, (Raw<&'static str>,), (Arc<u32>,), u32> =
            Selector::with_config(
                |_state, _args| (Arc::new(0),),
                |_deps, _args| 0,
                SelectorConfig::default().with_checked(true),
            );

        selector.select(&0, (Raw("a,b"),));
    }

    #[test]
    fn test_unchecked_accepts_ambiguous_key_argument() {
        let selector: Selector<u32, (Raw<&'static str>,), (Arc<u32>,), u32> =
            Selector::with_config(
                |_state, _args| (Arc::new(7),),
                |(n,), _args| **n,
                SelectorConfig::default().with_checked(false),
            );

        // Degrades to a colliding key instead of failing.
        assert_eq!(selector.try_select(&0, (Raw("a,b"),)).unwrap(), 7);
    }

    #[test]
    fn test_custom_key_fn_skips_validation() {
        let selector: Selector<u32, (Raw<&'static str>,), (Arc<u32>,), String> =
            Selector::with_config(
                |_state, _args: &(Raw<&'static str>,)| (Arc::new(0),),
                |_deps, (raw,)| raw.0.to_string(),
                SelectorConfig::default().with_checked(true),
            )
            .with_key_fn(|(raw,)| raw.0.replace(',', ";"));

        assert_eq!(selector.select(&0, (Raw("a,b"),)), "a,b");
    }

    #[test]
    fn test_purge_watermark_bounds_growth() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let selector: Selector<Arc<u64>, (), (Arc<u64>,), u64> = Selector::with_config(
            |state, _args| (Arc::clone(state),),
            move |(n,), _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                **n
            },
            SelectorConfig::default().with_purge_watermark(8),
        );

        // Churn through many short-lived states; dead branches are pruned
        // along the way instead of accumulating.
        for i in 0..100 {
            let state = Arc::new(i);
            assert_eq!(selector.select(&state, ()), i);
        }
        assert!(selector.len() <= 9, "len = {}", selector.len());
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }
}
