//! Passphrase handling for encrypted archives.

use zeroize::Zeroizing;

/// A passphrase offered to the engine for encrypted entries.
///
/// The text is wiped from memory when the value is dropped, and never shows
/// up in debug output.
#[derive(Clone)]
pub struct Passphrase {
    inner: Zeroizing<String>,
}

impl Passphrase {
    /// Creates a new passphrase from a string.
    pub fn new<S: Into<String>>(passphrase: S) -> Self {
        Self {
            inner: Zeroizing::new(passphrase.into()),
        }
    }

    /// Returns the passphrase as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns the passphrase as raw UTF-8 bytes, as zip encryption expects.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Returns true if the passphrase is empty.
    ///
    /// An empty passphrase is treated as no passphrase at all.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the passphrase in characters.
    pub fn len(&self) -> usize {
        self.inner.chars().count()
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passphrase")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl PartialEq for Passphrase {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_str() == other.inner.as_str()
    }
}

impl Eq for Passphrase {}

impl From<&str> for Passphrase {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Passphrase {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_debug() {
        let passphrase = Passphrase::new("secret");
        let debug = format!("{:?}", passphrase);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("len"));
    }

    #[test]
    fn test_passphrase_from_str() {
        let passphrase: Passphrase = "test".into();
        assert_eq!(passphrase.as_str(), "test");
        assert_eq!(passphrase.as_bytes(), b"test");
    }

    #[test]
    fn test_passphrase_from_string() {
        let passphrase: Passphrase = String::from("test").into();
        assert_eq!(passphrase.as_str(), "test");
    }

    #[test]
    fn test_passphrase_len() {
        let passphrase = Passphrase::new("пароль");
        assert_eq!(passphrase.len(), 6);
        assert_eq!(passphrase.as_bytes().len(), 12);
        assert!(!passphrase.is_empty());

        let empty = Passphrase::new("");
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }
}
