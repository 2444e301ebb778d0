//! ASCII-case-insensitive `str` wrapper for identity keys.
//!
//! IRC identifiers are case-insensitive: `Foo` and `foo` name the same user,
//! `#Chat` and `#chat` the same channel.  `UniCase` lets a `HashMap` store a
//! name with its original casing while hashing and comparing it without case.
//! Thanks to the `Borrow` implementation, such a map can be probed with a
//! borrowed `&UniCase<str>` (see [`u`]) without allocating a lowercased copy.
//!
//! Unicode case folding is not supported.

#![warn(clippy::all, rust_2018_idioms)]

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Wrapper around string types that hashes and compares ASCII-case-insensitively.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct UniCase<S: ?Sized>(pub S);

impl UniCase<String> {
    /// Wraps an owned string.
    pub fn new(s: impl Into<String>) -> Self {
        UniCase(s.into())
    }

    /// Unwraps the string, with its original casing.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Borrows a `&str` as a `&UniCase<str>`, typically for a map lookup.
pub fn u(s: &str) -> &UniCase<str> {
    // Sound because of #[repr(transparent)]: UniCase<str> and str have the
    // same memory layout.
    unsafe { &*(s as *const str as *const UniCase<str>) }
}

impl<'a> From<&'a str> for &'a UniCase<str> {
    fn from(s: &'a str) -> &'a UniCase<str> {
        u(s)
    }
}

impl From<String> for UniCase<String> {
    fn from(s: String) -> Self {
        UniCase(s)
    }
}

impl<S> AsRef<str> for UniCase<S>
where
    S: AsRef<str> + ?Sized,
{
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Borrow<UniCase<str>> for UniCase<String> {
    fn borrow(&self) -> &UniCase<str> {
        u(self.0.as_str())
    }
}

impl<S> Hash for UniCase<S>
where
    S: AsRef<str> + ?Sized,
{
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        for byte in self.0.as_ref().bytes() {
            hasher.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl<S1, S2> PartialEq<UniCase<S2>> for UniCase<S1>
where
    S1: AsRef<str> + ?Sized,
    S2: AsRef<str> + ?Sized,
{
    fn eq(&self, other: &UniCase<S2>) -> bool {
        self.0.as_ref().eq_ignore_ascii_case(other.0.as_ref())
    }
}

impl<S> Eq for UniCase<S> where S: AsRef<str> + ?Sized {}

impl<S> fmt::Debug for UniCase<S>
where
    S: AsRef<str> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_ref(), f)
    }
}

impl<S> fmt::Display for UniCase<S>
where
    S: AsRef<str> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn eq_ignores_ascii_case() {
        assert_eq!(u("Quentin"), u("quentIN"));
        assert_eq!(UniCase::new("#Chat"), UniCase::new("#chat"));
        assert_ne!(u("#chat"), u("#chat2"));
    }

    #[test]
    fn map_lookup_borrows() {
        let mut map = HashMap::new();
        map.insert(UniCase::new("Guest1"), 1);
        map.insert(UniCase::new("#Rust"), 2);

        assert_eq!(map.get(u("guest1")), Some(&1));
        assert_eq!(map.get(u("GUEST1")), Some(&1));
        assert_eq!(map.get(u("#rust")), Some(&2));
        assert_eq!(map.get(u("#rust2")), None);
    }

    #[test]
    fn keeps_original_casing() {
        let key = UniCase::new("#Chat");
        assert_eq!(key.as_ref(), "#Chat");
        assert_eq!(key.to_string(), "#Chat");
        assert_eq!(key.into_inner(), "#Chat");
    }
}
