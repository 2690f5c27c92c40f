use std::sync::Arc;

/// One step of a path: an object property name or an array index.
///
/// Keys are normalized before they touch the identity cache, so `child("0")`
/// and `child(0)` address the same node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Name(Arc<str>),
    Index(usize),
}

impl Key {
    /// Canonical form: a name that spells a valid index becomes that index.
    pub(crate) fn normalize(self) -> Key {
        match self {
            Key::Name(name) => match canonical_index(&name) {
                Some(index) => Key::Index(index),
                None => Key::Name(name),
            },
            index => index,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(name) => canonical_index(name),
        }
    }
}

// "07" is a property name, not an index
fn canonical_index(name: &str) -> Option<usize> {
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    name.parse().ok()
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{}", name),
            Key::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Key { Key::Name(name.into()) }
}
impl From<String> for Key {
    fn from(name: String) -> Key { Key::Name(name.into()) }
}
impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Key { Key::Name(name) }
}
impl From<usize> for Key {
    fn from(index: usize) -> Key { Key::Index(index) }
}
impl From<u32> for Key {
    fn from(index: u32) -> Key { Key::Index(index as usize) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_names_normalize_to_indices() {
        assert_eq!(Key::from("3").normalize(), Key::Index(3));
        assert_eq!(Key::from("0").normalize(), Key::Index(0));
        // leading zeros stay property names
        assert_eq!(Key::from("07").normalize(), Key::from("07"));
        assert!(matches!(Key::from("length").normalize(), Key::Name(_)));
    }
}
