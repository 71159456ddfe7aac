//! Per-item changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change of one item: values to add, values to delete, or a full replacement.
///
/// When `values_to_replace` is set the add and delete lists are empty; a
/// replacement with an empty list clears the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDelta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_to_add: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_to_delete: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_to_replace: Option<Vec<Value>>,
}

fn push_unique(values: &mut Vec<Value>, value: Value) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn same_values(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len() && left.iter().all(|v| right.contains(v))
}

impl ItemDelta {
    /// Create an empty delta for an item.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values_to_add: Vec::new(),
            values_to_delete: Vec::new(),
            values_to_replace: None,
        }
    }

    pub fn add(name: impl Into<String>, values: Vec<Value>) -> Self {
        let mut delta = Self::new(name);
        delta.add_values(values);
        delta
    }

    pub fn delete(name: impl Into<String>, values: Vec<Value>) -> Self {
        let mut delta = Self::new(name);
        delta.delete_values(values);
        delta
    }

    pub fn replace(name: impl Into<String>, values: Vec<Value>) -> Self {
        let mut delta = Self::new(name);
        delta.replace_values(values);
        delta
    }

    /// Add values. On a replacement delta the values join the replacement set.
    pub fn add_values(&mut self, values: impl IntoIterator<Item = Value>) {
        for value in values {
            match self.values_to_replace.as_mut() {
                Some(replace) => push_unique(replace, value),
                None => {
                    self.values_to_delete.retain(|v| v != &value);
                    push_unique(&mut self.values_to_add, value);
                }
            }
        }
    }

    /// Delete values. On a replacement delta the values leave the replacement set.
    pub fn delete_values(&mut self, values: impl IntoIterator<Item = Value>) {
        for value in values {
            match self.values_to_replace.as_mut() {
                Some(replace) => replace.retain(|v| v != &value),
                None => {
                    self.values_to_add.retain(|v| v != &value);
                    push_unique(&mut self.values_to_delete, value);
                }
            }
        }
    }

    /// Turn this delta into a replacement, discarding adds and deletes.
    pub fn replace_values(&mut self, values: impl IntoIterator<Item = Value>) {
        let mut replace = Vec::new();
        for value in values {
            push_unique(&mut replace, value);
        }
        self.values_to_add.clear();
        self.values_to_delete.clear();
        self.values_to_replace = Some(replace);
    }

    #[must_use]
    pub fn is_replace(&self) -> bool {
        self.values_to_replace.is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values_to_add.is_empty()
            && self.values_to_delete.is_empty()
            && self.values_to_replace.is_none()
    }

    /// Whether this delta adds (or replaces with) a value.
    pub fn adds_value(&self, value: &Value) -> bool {
        self.values_to_add.contains(value)
            || self
                .values_to_replace
                .as_ref()
                .is_some_and(|r| r.contains(value))
    }

    /// Whether this delta deletes a value.
    pub fn deletes_value(&self, value: &Value) -> bool {
        self.values_to_delete.contains(value)
    }

    /// Union another change of the same item into this one, as if `other`
    /// was applied after `self`.
    pub fn merge(&mut self, other: &ItemDelta) {
        if let Some(replace) = &other.values_to_replace {
            self.replace_values(replace.iter().cloned());
            return;
        }
        self.add_values(other.values_to_add.iter().cloned());
        self.delete_values(other.values_to_delete.iter().cloned());
    }

    /// Drop degenerate add+delete pairs of the same value.
    pub fn simplify(&mut self) {
        let both: Vec<Value> = self
            .values_to_add
            .iter()
            .filter(|v| self.values_to_delete.contains(v))
            .cloned()
            .collect();
        self.values_to_add.retain(|v| !both.contains(v));
        self.values_to_delete.retain(|v| !both.contains(v));
    }

    /// Whether applying `self` already achieves everything `other` does.
    pub fn contains(&self, other: &ItemDelta) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.values_to_replace, &other.values_to_replace) {
            (Some(mine), Some(theirs)) => same_values(mine, theirs),
            (None, Some(_)) => false,
            (Some(mine), None) => {
                other.values_to_add.iter().all(|v| mine.contains(v))
                    && other.values_to_delete.iter().all(|v| !mine.contains(v))
            }
            (None, None) => {
                other.values_to_add.iter().all(|v| self.values_to_add.contains(v))
                    && other
                        .values_to_delete
                        .iter()
                        .all(|v| self.values_to_delete.contains(v))
            }
        }
    }

    /// Apply this delta to a list of values.
    pub fn apply_to(&self, values: &mut Vec<Value>) {
        if let Some(replace) = &self.values_to_replace {
            values.clone_from(replace);
            return;
        }
        values.retain(|v| !self.values_to_delete.contains(v));
        for value in &self.values_to_add {
            push_unique(values, value.clone());
        }
    }

    /// Remove the parts of this delta that are no-ops against `current`.
    #[must_use]
    pub fn narrow(&self, current: &[Value]) -> ItemDelta {
        let mut narrowed = ItemDelta::new(self.name.clone());
        if let Some(replace) = &self.values_to_replace {
            if !same_values(replace, current) {
                narrowed.values_to_replace = Some(replace.clone());
            }
            return narrowed;
        }
        narrowed.values_to_add = self
            .values_to_add
            .iter()
            .filter(|v| !current.contains(v))
            .cloned()
            .collect();
        narrowed.values_to_delete = self
            .values_to_delete
            .iter()
            .filter(|v| current.contains(v))
            .cloned()
            .collect();
        narrowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_add_then_delete() {
        let mut delta = ItemDelta::add("groups", vec![json!("pirates"), json!("crew")]);
        delta.merge(&ItemDelta::delete("groups", vec![json!("crew")]));

        assert_eq!(delta.values_to_add, vec![json!("pirates")]);
        assert_eq!(delta.values_to_delete, vec![json!("crew")]);
    }

    #[test]
    fn test_merge_replace_wins() {
        let mut delta = ItemDelta::add("title", vec![json!("Mate")]);
        delta.merge(&ItemDelta::replace("title", vec![json!("Captain")]));
        assert!(delta.is_replace());
        assert!(delta.values_to_add.is_empty());
        assert!(delta.adds_value(&json!("Captain")));

        delta.merge(&ItemDelta::add("title", vec![json!("Admiral")]));
        assert_eq!(
            delta.values_to_replace,
            Some(vec![json!("Captain"), json!("Admiral")])
        );
    }

    #[test]
    fn test_simplify_drops_degenerate_pairs() {
        let mut delta = ItemDelta {
            name: "groups".to_string(),
            values_to_add: vec![json!("a"), json!("b")],
            values_to_delete: vec![json!("b"), json!("c")],
            values_to_replace: None,
        };
        delta.simplify();
        assert_eq!(delta.values_to_add, vec![json!("a")]);
        assert_eq!(delta.values_to_delete, vec![json!("c")]);
    }

    #[test]
    fn test_contains() {
        let big = ItemDelta::add("groups", vec![json!("a"), json!("b")]);
        let small = ItemDelta::add("groups", vec![json!("b")]);
        assert!(big.contains(&small));
        assert!(!small.contains(&big));

        let replace = ItemDelta::replace("groups", vec![json!("b"), json!("a")]);
        assert!(replace.contains(&small));
        assert!(replace.contains(&ItemDelta::replace("groups", vec![json!("a"), json!("b")])));
        assert!(!small.contains(&replace));
        assert!(!big.contains(&ItemDelta::add("title", vec![json!("a")])));
    }

    #[test]
    fn test_apply_and_narrow() {
        let mut values = vec![json!("a"), json!("b")];
        let mut delta = ItemDelta::add("groups", vec![json!("b"), json!("c")]);
        delta.delete_values(vec![json!("a"), json!("z")]);

        let narrowed = delta.narrow(&values);
        assert_eq!(narrowed.values_to_add, vec![json!("c")]);
        assert_eq!(narrowed.values_to_delete, vec![json!("a")]);

        delta.apply_to(&mut values);
        assert_eq!(values, vec![json!("b"), json!("c")]);

        let replace = ItemDelta::replace("groups", vec![json!("c"), json!("b")]);
        assert!(replace.narrow(&values).is_empty());
    }
}
