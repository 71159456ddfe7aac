//! Whole-object changes.

use serde::{Deserialize, Serialize};

use super::item_delta::ItemDelta;
use super::object::{ObjectSnapshot, ObjectType};
use crate::error::{ProjectorError, ProjectorResult};
use crate::idempotency;

/// Kind of object change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Modify,
    Delete,
}

impl ChangeType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Modify => "modify",
            ChangeType::Delete => "delete",
        }
    }
}

/// Payload of an object change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum DeltaChange {
    /// Attach a whole new object.
    Add { object: ObjectSnapshot },
    /// Per-item operations on an existing object.
    Modify { modifications: Vec<ItemDelta> },
    /// Remove the object.
    Delete,
}

/// A change of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDelta {
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    #[serde(flatten)]
    pub change: DeltaChange,
}

impl ObjectDelta {
    /// Create an ADD delta carrying the whole object.
    pub fn add(object: ObjectSnapshot) -> Self {
        Self {
            object_type: object.object_type,
            oid: object.oid.clone(),
            change: DeltaChange::Add { object },
        }
    }

    /// Create a MODIFY delta.
    pub fn modify(
        object_type: ObjectType,
        oid: Option<String>,
        modifications: Vec<ItemDelta>,
    ) -> Self {
        Self {
            object_type,
            oid,
            change: DeltaChange::Modify { modifications },
        }
    }

    /// Create a DELETE delta.
    pub fn delete(object_type: ObjectType, oid: impl Into<String>) -> Self {
        Self {
            object_type,
            oid: Some(oid.into()),
            change: DeltaChange::Delete,
        }
    }

    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        match self.change {
            DeltaChange::Add { .. } => ChangeType::Add,
            DeltaChange::Modify { .. } => ChangeType::Modify,
            DeltaChange::Delete => ChangeType::Delete,
        }
    }

    #[must_use]
    pub fn is_add(&self) -> bool {
        matches!(self.change, DeltaChange::Add { .. })
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self.change, DeltaChange::Delete)
    }

    /// A MODIFY without any effective item change is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.change {
            DeltaChange::Modify { modifications } => modifications.iter().all(ItemDelta::is_empty),
            _ => false,
        }
    }

    /// Object carried by an ADD delta.
    pub fn object_to_add(&self) -> Option<&ObjectSnapshot> {
        match &self.change {
            DeltaChange::Add { object } => Some(object),
            _ => None,
        }
    }

    /// Item modifications of a MODIFY delta.
    pub fn modifications(&self) -> &[ItemDelta] {
        match &self.change {
            DeltaChange::Modify { modifications } => modifications,
            _ => &[],
        }
    }

    /// Find the modification of an item.
    pub fn find_item(&self, name: &str) -> Option<&ItemDelta> {
        self.modifications().iter().find(|m| m.name == name)
    }

    /// Merge one item change into this delta.
    ///
    /// ADD deltas absorb the change into the carried object; DELETE deltas
    /// ignore it.
    pub fn add_modification(&mut self, item: ItemDelta) {
        match &mut self.change {
            DeltaChange::Add { object } => {
                let mut values = object.values(&item.name).to_vec();
                item.apply_to(&mut values);
                object.set_values(item.name, values);
            }
            DeltaChange::Modify { modifications } => {
                match modifications.iter_mut().find(|m| m.name == item.name) {
                    Some(existing) => existing.merge(&item),
                    None => modifications.push(item),
                }
            }
            DeltaChange::Delete => {}
        }
    }

    /// Union `other` (applied after `self`) into this delta.
    pub fn merge(&mut self, other: &ObjectDelta) -> ProjectorResult<()> {
        if self.object_type != other.object_type {
            return Err(ProjectorError::schema(format!(
                "cannot merge {} delta into {} delta",
                other.object_type, self.object_type
            )));
        }
        match &other.change {
            DeltaChange::Delete => {
                self.change = DeltaChange::Delete;
                if self.oid.is_none() {
                    self.oid.clone_from(&other.oid);
                }
                Ok(())
            }
            DeltaChange::Add { .. } if self.is_delete() => {
                *self = other.clone();
                Ok(())
            }
            DeltaChange::Add { .. } => Err(ProjectorError::schema(format!(
                "cannot merge add delta into existing {} delta",
                self.change_type().as_str()
            ))),
            DeltaChange::Modify { modifications } => {
                for item in modifications {
                    self.add_modification(item.clone());
                }
                Ok(())
            }
        }
    }

    /// Drop degenerate add+delete pairs and empty item changes.
    pub fn simplify(&mut self) {
        if let DeltaChange::Modify { modifications } = &mut self.change {
            for item in modifications.iter_mut() {
                item.simplify();
            }
            modifications.retain(|m| !m.is_empty());
        }
    }

    /// Whether applying `self` already achieves everything `other` does.
    pub fn contains(&self, other: &ObjectDelta) -> bool {
        if self.object_type != other.object_type || self.oid != other.oid {
            return false;
        }
        match (&self.change, &other.change) {
            (DeltaChange::Delete, DeltaChange::Delete) => true,
            (DeltaChange::Add { object: mine }, DeltaChange::Add { object: theirs }) => {
                diff_items(mine, theirs).is_empty()
            }
            (DeltaChange::Modify { modifications }, DeltaChange::Modify { .. }) => other
                .modifications()
                .iter()
                .filter(|m| !m.is_empty())
                .all(|theirs| modifications.iter().any(|mine| mine.contains(theirs))),
            _ => false,
        }
    }

    /// Compute the MODIFY delta that turns `old` into `new`.
    pub fn diff(old: &ObjectSnapshot, new: &ObjectSnapshot) -> ObjectDelta {
        ObjectDelta::modify(
            new.object_type,
            new.oid.clone().or_else(|| old.oid.clone()),
            diff_items(old, new),
        )
    }

    /// Apply this delta to an object. `None` means the object does not exist.
    pub fn apply_to(&self, object: Option<&ObjectSnapshot>) -> ProjectorResult<Option<ObjectSnapshot>> {
        match &self.change {
            DeltaChange::Add { object: added } => Ok(Some(added.clone())),
            DeltaChange::Delete => Ok(None),
            DeltaChange::Modify { modifications } => {
                let Some(object) = object else {
                    return Err(ProjectorError::schema(format!(
                        "cannot modify nonexistent {} {}",
                        self.object_type,
                        self.oid.as_deref().unwrap_or("<new>")
                    )));
                };
                let mut result = object.clone();
                for item in modifications {
                    let mut values = result.values(&item.name).to_vec();
                    item.apply_to(&mut values);
                    result.set_values(item.name.clone(), values);
                }
                result.prune_empty();
                Ok(Some(result))
            }
        }
    }

    /// Remove the no-op parts of a MODIFY delta against the current object.
    #[must_use]
    pub fn narrow(&self, current: &ObjectSnapshot) -> ObjectDelta {
        match &self.change {
            DeltaChange::Modify { modifications } => ObjectDelta::modify(
                self.object_type,
                self.oid.clone(),
                modifications
                    .iter()
                    .map(|m| m.narrow(current.values(&m.name)))
                    .filter(|m| !m.is_empty())
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Canonical SHA-256 fingerprint identifying equivalent deltas.
    pub fn fingerprint(&self) -> ProjectorResult<String> {
        let mut canonical = self.clone();
        canonical.simplify();
        if let DeltaChange::Modify { modifications } = &mut canonical.change {
            modifications.sort_by(|a, b| a.name.cmp(&b.name));
        }
        idempotency::fingerprint(&canonical)
    }
}

fn diff_items(old: &ObjectSnapshot, new: &ObjectSnapshot) -> Vec<ItemDelta> {
    let mut names: Vec<&String> = old.items.keys().chain(new.items.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| {
            let before = old.values(name);
            let after = new.values(name);
            let mut delta = ItemDelta::new(name.clone());
            delta.add_values(after.iter().filter(|v| !before.contains(v)).cloned());
            delta.delete_values(before.iter().filter(|v| !after.contains(v)).cloned());
            (!delta.is_empty()).then_some(delta)
        })
        .collect()
}
