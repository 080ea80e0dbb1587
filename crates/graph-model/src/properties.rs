//! Named property lists attached to vertices and edges

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// A single property list: key -> value
pub type PropertyList = HashMap<String, String>;

/// Property lists keyed by list name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    lists: HashMap<String, PropertyList>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `value` under `(list, key)`. An empty value deletes the key.
    ///
    /// The list is created on first use and is left in place (possibly empty)
    /// after its last key is deleted.
    pub fn set(&mut self, list: &str, key: &str, value: &str) {
        let entries = self.lists.entry(list.to_string()).or_default();
        if value.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get(&self, list: &str, key: &str) -> Option<&str> {
        self.lists.get(list)?.get(key).map(String::as_str)
    }

    pub fn list(&self, list: &str) -> Option<&PropertyList> {
        self.lists.get(list)
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &PropertyList)> {
        self.lists.iter().map(|(name, list)| (name.as_str(), list))
    }

    pub fn is_empty(&self) -> bool {
        self.lists.values().all(HashMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut props = Properties::new();
        props.set("style", "color", "red");
        props.set("style", "color", "blue");
        assert_eq!(props.get("style", "color"), Some("blue"));
        assert_eq!(props.get("style", "width"), None);
        assert_eq!(props.get("other", "color"), None);
    }

    #[test]
    fn test_empty_value_deletes() {
        let mut props = Properties::new();
        props.set("None", "label", "A");
        props.set("None", "label", "");

        assert_eq!(props.get("None", "label"), None);
        let list = props.list("None").expect("list survives deletion");
        assert!(list.is_empty());
        assert!(props.is_empty());
    }
}
