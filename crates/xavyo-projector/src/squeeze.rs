//! Squeeze: merge the triples of all constructions per item name.
//!
//! Each construction contributes a triple per item. Depending on what happens
//! to the projection itself, the partitions are remapped before merging:
//!
//! ```text
//!              zero      plus      minus
//!   Kept   ->  zero      plus      minus
//!   Added  ->  plus      plus      (dropped)
//!   Removed -> minus     minus     (dropped)
//! ```
//!
//! Values are not deduplicated; consolidation works per real value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::SyncDecision;
use crate::origin::{ConstructionRef, ItemValueWithOrigin, OriginType};
use crate::triple::DeltaSetTriple;

/// Item name prefix of association items.
pub const ASSOCIATION_PREFIX: &str = "association/";

/// Item name prefix of credential items.
pub const CREDENTIALS_PREFIX: &str = "credentials/";

pub type IvwoTriple = DeltaSetTriple<ItemValueWithOrigin>;

/// A source of values for one projection: an assignment or the outbound mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Construction {
    pub name: String,
    pub origin: OriginType,
    #[serde(default)]
    pub outputs: BTreeMap<String, IvwoTriple>,
}

impl Construction {
    pub fn new(name: impl Into<String>, origin: OriginType) -> Self {
        Self {
            name: name.into(),
            origin,
            outputs: BTreeMap::new(),
        }
    }

    pub fn construction_ref(&self) -> ConstructionRef {
        ConstructionRef::new(self.name.clone(), self.origin)
    }

    /// Merge a triple into the output for an item.
    pub fn add_output(&mut self, item: impl Into<String>, triple: IvwoTriple) {
        self.outputs.entry(item.into()).or_default().merge(triple);
    }
}

/// What happens to the projection the constructions belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqueezeMode {
    Kept,
    Added,
    Removed,
}

impl SqueezeMode {
    /// Mode for a synchronization decision; `None` when nothing is computed.
    #[must_use]
    pub fn for_decision(decision: SyncDecision) -> Option<Self> {
        match decision {
            SyncDecision::Keep => Some(Self::Kept),
            SyncDecision::Add => Some(Self::Added),
            SyncDecision::Delete => Some(Self::Removed),
            SyncDecision::Unlink | SyncDecision::Broken | SyncDecision::Ignore => None,
        }
    }

    /// Remap one construction's triple into the merged triple.
    pub fn remap(self, source: &IvwoTriple, target: &mut IvwoTriple) {
        match self {
            Self::Kept => {
                target.zero_set.extend(source.zero_set.iter().cloned());
                target.plus_set.extend(source.plus_set.iter().cloned());
                target.minus_set.extend(source.minus_set.iter().cloned());
            }
            Self::Added => {
                target.plus_set.extend(source.non_negative_values().cloned());
            }
            Self::Removed => {
                target.minus_set.extend(source.non_negative_values().cloned());
            }
        }
    }
}

/// Merged triples of one projection, split by item family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Squeezed {
    pub attributes: BTreeMap<String, IvwoTriple>,
    pub associations: BTreeMap<String, IvwoTriple>,
    pub credentials: BTreeMap<String, IvwoTriple>,
}

impl Squeezed {
    fn family_mut(&mut self, item: &str) -> &mut BTreeMap<String, IvwoTriple> {
        if item.starts_with(ASSOCIATION_PREFIX) {
            &mut self.associations
        } else if item.starts_with(CREDENTIALS_PREFIX) {
            &mut self.credentials
        } else {
            &mut self.attributes
        }
    }
}

/// Merge the outputs of all constructions.
pub fn squeeze<'a>(
    constructions: impl IntoIterator<Item = &'a Construction>,
    mode: SqueezeMode,
) -> Squeezed {
    let mut squeezed = Squeezed::default();
    for construction in constructions {
        for (item, triple) in &construction.outputs {
            let target = squeezed.family_mut(item).entry(item.clone()).or_default();
            mode.remap(triple, target);
        }
    }
    squeezed
}
