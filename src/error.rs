//! Selector error types.

use thiserror::Error;

/// Errors surfaced by checked-mode selectors.
///
/// Unchecked selectors never produce these; misuse degrades to colliding
/// cache keys instead of failing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectorError {
    /// A positional argument rendered into a key segment that contains the
    /// delimiter, making it indistinguishable from multiple arguments.
    #[error("key argument {index} renders to {segment:?}, which contains the ',' delimiter")]
    InvalidKeyArgument { index: usize, segment: String },
}
