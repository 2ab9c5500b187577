//! Nested cache keyed by an identity-token path, then by a string key.
//!
//! The tree has a fixed depth equal to the dependents arity. Every level but
//! the last maps a [`Token`] to a deeper level; the last token selects a
//! leaf, a plain string-keyed map of memoized results. Replacing one slice
//! of state mints a fresh token, which routes lookups into a fresh branch —
//! the old branch is simply never visited again and is dropped by
//! [`CacheTree::retain_tokens`] or [`CacheTree::clear`].

use std::collections::HashMap;

use crate::identity::Token;

enum Node<V> {
    Branch(HashMap<Token, Node<V>>),
    Leaf(HashMap<String, V>),
}

impl<V> Node<V> {
    fn is_empty(&self) -> bool {
        match self {
            Node::Branch(map) => map.is_empty(),
            Node::Leaf(map) => map.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Node::Branch(map) => map.values().map(Node::len).sum(),
            Node::Leaf(map) => map.len(),
        }
    }
}

/// A fixed-depth cache tree with hit/miss counters.
pub struct CacheTree<V> {
    root: Node<V>,
    depth: usize,
    leaf_capacity: usize,
    hits: usize,
    misses: usize,
}

impl<V> CacheTree<V> {
    /// Creates a tree for token paths of length `depth`.
    pub fn new(depth: usize, leaf_capacity: usize) -> Self {
        assert!(depth >= 1, "Cache tree depth must be at least 1");

        Self {
            root: Node::Branch(HashMap::new()),
            depth,
            leaf_capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Number of identity-keyed levels.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total number of memoized entries across all leaves.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Drops every memoized entry. Counters are kept.
    pub fn clear(&mut self) {
        self.root = Node::Branch(HashMap::new());
    }

    /// Looks up a memoized result.
    pub fn get(&mut self, path: &[Token], key: &str) -> Option<&V> {
        assert_eq!(
            path.len(),
            self.depth,
            "Token path length {} does not match tree depth {}",
            path.len(),
            self.depth
        );

        let mut node = &self.root;
        for token in path {
            match node {
                Node::Branch(map) => match map.get(token) {
                    Some(child) => node = child,
                    None => {
                        self.misses += 1;
                        return None;
                    }
                },
                Node::Leaf(_) => unreachable!("leaf reached before the last token"),
            }
        }
        match node {
            Node::Leaf(map) => match map.get(key) {
                Some(value) => {
                    self.hits += 1;
                    Some(value)
                }
                None => {
                    self.misses += 1;
                    None
                }
            },
            Node::Branch(_) => unreachable!("token path ended on a branch"),
        }
    }

    /// Stores a result, creating branches along the path as needed.
    pub fn insert(&mut self, path: &[Token], key: String, value: V) {
        assert_eq!(
            path.len(),
            self.depth,
            "Token path length {} does not match tree depth {}",
            path.len(),
            self.depth
        );

        insert_into(&mut self.root, path, key, value, self.leaf_capacity);
    }

    /// Drops every branch keyed by a token for which `live` returns false,
    /// along with branches left empty by the sweep.
    pub fn retain_tokens<F>(&mut self, live: F)
    where
        F: Fn(Token) -> bool,
    {
        fn walk<V, F>(node: &mut Node<V>, live: &F)
        where
            F: Fn(Token) -> bool,
        {
            if let Node::Branch(map) = node {
                map.retain(|token, child| {
                    if !live(*token) {
                        return false;
                    }
                    walk(child, live);
                    !child.is_empty()
                });
            }
        }

        walk(&mut self.root, &live);
    }
}

fn insert_into<V>(node: &mut Node<V>, path: &[Token], key: String, value: V, leaf_capacity: usize) {
    match (node, path) {
        (Node::Branch(map), [token, rest @ ..]) => {
            let child = map.entry(*token).or_insert_with(|| {
                if rest.is_empty() {
                    Node::Leaf(HashMap::with_capacity(leaf_capacity))
                } else {
                    Node::Branch(HashMap::new())
                }
            });
            if rest.is_empty() {
                match child {
                    Node::Leaf(leaf) => {
                        leaf.insert(key, value);
                    }
                    Node::Branch(_) => unreachable!("token path ended on a branch"),
                }
            } else {
                insert_into(child, rest, key, value, leaf_capacity);
            }
        }
        (Node::Leaf(_), _) => unreachable!("leaf reached before the last token"),
        (Node::Branch(_), []) => unreachable!("empty token path"),
    }
}
