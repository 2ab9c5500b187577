//! Selector configuration.

/// Configuration for a [`Selector`][crate::selector::Selector].
///
/// ```
/// use treememo::config::SelectorConfig;
///
/// let config = SelectorConfig::default()
///     .with_checked(true)
///     .with_purge_watermark(256);
/// assert!(config.is_checked());
/// ```
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    checked: Option<bool>,
    leaf_capacity: usize,
    purge_watermark: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            checked: None,
            leaf_capacity: 16,
            purge_watermark: 1024,
        }
    }
}

impl SelectorConfig {
    /// Force key-argument validation on or off.
    ///
    /// Without an override, validation follows `debug_assertions`: on in
    /// debug builds, off in release builds.
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    /// Pre-allocated capacity for each leaf map.
    pub fn with_leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = leaf_capacity;
        self
    }

    /// Number of tracked slice identities above which the selector purges
    /// dead identities and prunes their cache branches during a call.
    pub fn with_purge_watermark(mut self, purge_watermark: usize) -> Self {
        self.purge_watermark = purge_watermark;
        self
    }

    /// Whether key-argument validation is active.
    pub fn is_checked(&self) -> bool {
        self.checked.unwrap_or(cfg!(debug_assertions))
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    pub fn purge_watermark(&self) -> usize {
        self.purge_watermark
    }
}
