//! Delta set triple: zero / plus / minus partition of candidate values.

use serde::{Deserialize, Serialize};

/// Candidate values of one item split into unchanged, added and removed.
///
/// A single source never places the same value in more than one set.
/// Merged triples (see [`crate::squeeze`]) may, since different sources
/// can disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaSetTriple<V> {
    #[serde(default = "Vec::new")]
    pub zero_set: Vec<V>,
    #[serde(default = "Vec::new")]
    pub plus_set: Vec<V>,
    #[serde(default = "Vec::new")]
    pub minus_set: Vec<V>,
}

impl<V> Default for DeltaSetTriple<V> {
    fn default() -> Self {
        Self {
            zero_set: Vec::new(),
            plus_set: Vec::new(),
            minus_set: Vec::new(),
        }
    }
}

impl<V> DeltaSetTriple<V> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zero_set.is_empty() && self.plus_set.is_empty() && self.minus_set.is_empty()
    }

    pub fn add_to_zero_set(&mut self, value: V) {
        self.zero_set.push(value);
    }

    pub fn add_to_plus_set(&mut self, value: V) {
        self.plus_set.push(value);
    }

    pub fn add_to_minus_set(&mut self, value: V) {
        self.minus_set.push(value);
    }

    /// Append all sets of `other` to the matching sets of `self`.
    pub fn merge(&mut self, other: DeltaSetTriple<V>) {
        self.zero_set.extend(other.zero_set);
        self.plus_set.extend(other.plus_set);
        self.minus_set.extend(other.minus_set);
    }

    /// Iterate over every value of all three sets.
    pub fn iter_all(&self) -> impl Iterator<Item = &V> {
        self.zero_set
            .iter()
            .chain(self.plus_set.iter())
            .chain(self.minus_set.iter())
    }

    /// Values that remain after the change: zero and plus.
    pub fn non_negative_values(&self) -> impl Iterator<Item = &V> {
        self.zero_set.iter().chain(self.plus_set.iter())
    }

    /// Transform every value, keeping the partition.
    pub fn map<U>(self, mut f: impl FnMut(V) -> U) -> DeltaSetTriple<U> {
        DeltaSetTriple {
            zero_set: self.zero_set.into_iter().map(&mut f).collect(),
            plus_set: self.plus_set.into_iter().map(&mut f).collect(),
            minus_set: self.minus_set.into_iter().map(&mut f).collect(),
        }
    }
}

impl<V: PartialEq + Clone> DeltaSetTriple<V> {
    /// Partition the values of an old and a new state.
    pub fn diff(old: &[V], new: &[V]) -> Self {
        let mut triple = Self::new();
        for value in new {
            if old.contains(value) {
                triple.add_to_zero_set(value.clone());
            } else {
                triple.add_to_plus_set(value.clone());
            }
        }
        for value in old {
            if !new.contains(value) {
                triple.add_to_minus_set(value.clone());
            }
        }
        triple
    }
}
