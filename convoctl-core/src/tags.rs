use std::collections::BTreeSet;
use std::fmt;
use std::iter::FromIterator;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConvoError, Result};

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9 _.\-]{0,49}$").expect("tag regex"));

/// Normalized, ordered set of conversation tags.
///
/// Tags are stored lowercase with a leading `#` and surrounding whitespace
/// removed, so `"#Rust "` and `"rust"` are the same tag.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagSet {
    items: BTreeSet<String>,
}

pub fn normalize_tag(raw: &str) -> String {
    raw.trim().trim_start_matches('#').trim().to_lowercase()
}

/// Validate one tag after normalization.
pub fn validate_tag(raw: &str) -> Result<String> {
    let tag = normalize_tag(raw);
    if TAG_RE.is_match(&tag) {
        Ok(tag)
    } else {
        Err(ConvoError::validation(format!(
            "invalid tag '{}': tags are 1-50 characters of letters, digits, space, '_', '.', '-'",
            raw.trim()
        )))
    }
}

impl TagSet {
    /// Insert a tag, rejecting anything that fails [`validate_tag`].
    pub fn insert(&mut self, tag: &str) -> Result<()> {
        let tag = validate_tag(tag)?;
        self.items.insert(tag);
        Ok(())
    }

    /// Insert a tag read from untrusted input, silently dropping invalid ones.
    pub fn insert_lossy(&mut self, tag: &str) -> bool {
        match validate_tag(tag) {
            Ok(tag) => self.items.insert(tag),
            Err(_) => {
                tracing::debug!(tag, "dropping invalid tag");
                false
            }
        }
    }

    /// Parse a comma-separated tag list (`"rust, #cli"`), dropping invalid entries.
    pub fn from_list(list: &str) -> Self {
        let mut set = TagSet::default();
        for part in list.split(',') {
            if !part.trim().is_empty() {
                set.insert_lossy(part);
            }
        }
        set
    }

    pub fn extend(&mut self, other: &TagSet) {
        self.items.extend(other.items.iter().cloned());
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.items.contains(&normalize_tag(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.items.iter().cloned().collect()
    }
}

impl fmt::Debug for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.iter()).finish()
    }
}

impl FromIterator<String> for TagSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut set = TagSet::default();
        for item in iter {
            set.insert_lossy(&item);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_hash() {
        let set = TagSet::from_list("#Rust, rust ,  CLI");
        assert_eq!(set.to_vec(), vec!["cli".to_string(), "rust".to_string()]);
        assert!(set.contains("#RUST"));
    }

    #[test]
    fn test_rejects_markup_in_tags() {
        let mut set = TagSet::default();
        assert!(set.insert("<script>").is_err());
        assert!(set.insert("").is_err());
        assert!(set.insert(&"x".repeat(51)).is_err());
        assert!(set.insert("machine-learning").is_ok());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_from_list_drops_invalid() {
        let set = TagSet::from_list("good, \"bad\", also good");
        assert_eq!(set.to_vec(), vec!["also good".to_string(), "good".to_string()]);
    }
}
