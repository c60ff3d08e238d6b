use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for property keys — fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for a property in a panel schema.
/// Wraps a `Spur`, so copies and equality checks cost an index compare.
///
/// The key doubles as the storage path on the element's business data:
/// dot-separated keys (`loopCharacteristics.isSequential`) address nested
/// attributes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropKey(Spur);

impl PropKey {
    /// Intern a new string as a PropKey, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        PropKey(INTERNER.get_or_intern(s))
    }

    /// The interned string.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Whether the key addresses a nested path (`a.b.c`).
    pub fn is_path(&self) -> bool {
        self.as_str().contains('.')
    }
}

impl fmt::Debug for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for PropKey {
    fn from(s: &str) -> Self {
        PropKey::intern(s)
    }
}

impl Serialize for PropKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PropKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PropKey::intern(&s))
    }
}
