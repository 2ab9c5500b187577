//! Cache-key derivation from call arguments.
//!
//! Within one dependents branch, results are stored under a string key
//! derived from the call's positional arguments. The default derivation
//! renders each argument and joins them with [`KEY_DELIMITER`].
//!
//! Primitive arguments render unambiguously. [`Raw`] admits any `Display`
//! type, at the cost of a collision hazard: a rendering that itself contains
//! the delimiter is indistinguishable from two separate arguments
//! (`("a,b",)` vs `("a", "b")`). Checked selectors scan for this and fail;
//! unchecked selectors skip the scan and accept the colliding key.

use std::fmt::{Display, Write};

use crate::error::SelectorError;

/// Delimiter used by the default cache-key derivation.
pub const KEY_DELIMITER: char = ',';

/// One positional argument rendered into the cache key.
pub trait KeySegment {
    fn write_segment(&self, out: &mut String);
}

macro_rules! key_segment_for_integers {
    ($($t:ty),+) => {
        $(
            impl KeySegment for $t {
                fn write_segment(&self, out: &mut String) {
                    let _ = write!(out, "{}", self);
                }
            }
        )+
    };
}

key_segment_for_integers!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl KeySegment for bool {
    fn write_segment(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }
}

impl KeySegment for char {
    fn write_segment(&self, out: &mut String) {
        out.push(*self);
    }
}

impl KeySegment for &str {
    fn write_segment(&self, out: &mut String) {
        out.push_str(self);
    }
}

impl KeySegment for String {
    fn write_segment(&self, out: &mut String) {
        out.push_str(self);
    }
}

/// Escape hatch for arbitrary displayable arguments.
///
/// The rendering is used verbatim, so it may collide with multi-argument
/// keys if it contains [`KEY_DELIMITER`]. Checked selectors reject such
/// renderings at call time.
pub struct Raw<T>(pub T);

impl<T: Display> KeySegment for Raw<T> {
    fn write_segment(&self, out: &mut String) {
        let _ = write!(out, "{}", self.0);
    }
}

/// The full tuple of positional arguments, joined into one cache key.
///
/// Implemented for `()` and for tuples of [`KeySegment`] up to arity 3.
pub trait KeyArgs {
    /// Append the joined key to `out`.
    fn write_key(&self, out: &mut String);

    /// Checked-mode validation of every rendered segment.
    fn validate(&self) -> Result<(), SelectorError>;
}

fn check_segment<K: KeySegment>(index: usize, segment: &K) -> Result<(), SelectorError> {
    let mut rendered = String::new();
    segment.write_segment(&mut rendered);
    if rendered.contains(KEY_DELIMITER) {
        return Err(SelectorError::InvalidKeyArgument {
            index,
            segment: rendered,
        });
    }
    Ok(())
}

impl KeyArgs for () {
    fn write_key(&self, _out: &mut String) {}

    fn validate(&self) -> Result<(), SelectorError> {
        Ok(())
    }
}

impl<K1: KeySegment> KeyArgs for (K1,) {
    fn write_key(&self, out: &mut String) {
        self.0.write_segment(out);
    }

    fn validate(&self) -> Result<(), SelectorError> {
        check_segment(0, &self.0)
    }
}

impl<K1: KeySegment, K2: KeySegment> KeyArgs for (K1, K2) {
    fn write_key(&self, out: &mut String) {
        self.0.write_segment(out);
        out.push(KEY_DELIMITER);
        self.1.write_segment(out);
    }

    fn validate(&self) -> Result<(), SelectorError> {
        check_segment(0, &self.0)?;
        check_segment(1, &self.1)
    }
}

impl<K1: KeySegment, K2: KeySegment, K3: KeySegment> KeyArgs for (K1, K2, K3) {
    fn write_key(&self, out: &mut String) {
        self.0.write_segment(out);
        out.push(KEY_DELIMITER);
        self.1.write_segment(out);
        out.push(KEY_DELIMITER);
        self.2.write_segment(out);
    }

    fn validate(&self) -> Result<(), SelectorError> {
        check_segment(0, &self.0)?;
        check_segment(1, &self.1)?;
        check_segment(2, &self.2)
    }
}
