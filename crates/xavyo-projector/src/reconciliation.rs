//! Drift correction for projections whose full remote state is known.
//!
//! Consolidation only reacts to changes. When the whole account is loaded the
//! computed values can also be compared with what the account actually has:
//! missing non-weak values are added, and non-tolerant attributes lose the
//! values no mapping proposes.

use serde_json::Value;
use tracing::debug;

use crate::context::{ProjectionState, SyncDecision};
use crate::definition::ResourceObjectDefinition;
use crate::delta::ItemDelta;
use crate::squeeze::IvwoTriple;

/// Compute reconciliation changes for items not already changed by `computed`.
pub fn reconcile_projection(projection: &ProjectionState, computed: &[ItemDelta]) -> Vec<ItemDelta> {
    if !projection.full_shadow || projection.sync_decision != SyncDecision::Keep {
        return Vec::new();
    }
    let Some(current) = &projection.object_current else {
        return Vec::new();
    };
    let default_definition = ResourceObjectDefinition::default();
    let definition = projection.definition.as_ref().unwrap_or(&default_definition);

    let mut changes = Vec::new();
    let items = projection
        .squeezed_attributes
        .iter()
        .chain(&projection.squeezed_associations);
    for (name, triple) in items {
        if computed.iter().any(|d| &d.name == name) {
            continue;
        }
        let attribute = definition.attribute(name);
        let existing = current.values(name);
        let proposed = proposed_values(triple, false);

        let mut delta = ItemDelta::new(name.clone());
        if attribute.multi_valued {
            delta.add_values(proposed.iter().filter(|v| !existing.contains(v)).cloned());
        } else if let [value] = proposed.as_slice() {
            if existing != std::slice::from_ref(value) {
                delta.replace_values([value.clone()]);
            }
        }

        if !attribute.tolerant && !delta.is_replace() {
            let known = proposed_values(triple, true);
            delta.delete_values(existing.iter().filter(|v| !known.contains(v)).cloned());
        }

        if !delta.is_empty() {
            debug!(projection = %projection.discriminator, item = %name, "Reconciling drifted item");
            changes.push(delta);
        }
    }
    changes
}

/// Distinct values of the zero and plus sets, optionally including weak ones.
fn proposed_values(triple: &IvwoTriple, include_weak: bool) -> Vec<Value> {
    let mut values: Vec<Value> = Vec::new();
    for ivwo in triple.non_negative_values() {
        if (include_weak || !ivwo.is_weak()) && !values.contains(&ivwo.value) {
            values.push(ivwo.value.clone());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Discriminator;
    use crate::definition::AttributeDefinition;
    use crate::delta::ObjectSnapshot;
    use crate::origin::{ConstructionRef, ItemValueWithOrigin, MappingSpec, MappingStrength, OriginType};
    use serde_json::json;
    use xavyo_connector::{ResourceId, ShadowKind};

    fn zero(values: &[(&str, MappingStrength)]) -> IvwoTriple {
        let origin = ConstructionRef::new("outbound", OriginType::Outbound);
        let mut triple = IvwoTriple::new();
        for (value, strength) in values {
            let spec = MappingSpec::new("m", "x", json!(null)).with_strength(*strength);
            triple.add_to_zero_set(ItemValueWithOrigin::from_mapping(json!(value), &spec, &origin));
        }
        triple
    }

    fn projection(current: ObjectSnapshot) -> ProjectionState {
        let discriminator = Discriminator::new(ResourceId::new(), ShadowKind::Account, "default");
        let mut projection = ProjectionState::new(discriminator, SyncDecision::Keep).with_oid("jack");
        projection.full_shadow = true;
        projection.object_current = Some(current);
        projection
    }

    #[test]
    fn test_single_valued_drift_is_replaced() {
        let coords = Discriminator::new(ResourceId::new(), ShadowKind::Account, "default").coordinates();
        let mut p = projection(ObjectSnapshot::shadow(coords).with_value("title", "Mate"));
        p.squeezed_attributes
            .insert("title".into(), zero(&[("Captain", MappingStrength::Strong)]));

        let changes = reconcile_projection(&p, &[]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].values_to_replace, Some(vec![json!("Captain")]));

        let already = vec![ItemDelta::replace("title", vec![json!("Captain")])];
        assert!(reconcile_projection(&p, &already).is_empty());
    }

    #[test]
    fn test_no_change_when_in_sync_or_weak() {
        let coords = Discriminator::new(ResourceId::new(), ShadowKind::Account, "default").coordinates();
        let mut p = projection(ObjectSnapshot::shadow(coords).with_value("title", "Captain"));
        p.squeezed_attributes
            .insert("title".into(), zero(&[("Captain", MappingStrength::Normal)]));
        p.squeezed_attributes
            .insert("locality".into(), zero(&[("Tortuga", MappingStrength::Weak)]));
        assert!(reconcile_projection(&p, &[]).is_empty());
    }

    #[test]
    fn test_non_tolerant_removes_unproposed_values() {
        let coords = Discriminator::new(ResourceId::new(), ShadowKind::Account, "default").coordinates();
        let current = ObjectSnapshot::shadow(coords)
            .with_values("groups", vec![json!("crew"), json!("brig")]);
        let mut p = projection(current);
        p.definition = Some(ResourceObjectDefinition::new("account").with_attribute(
            "groups",
            AttributeDefinition {
                multi_valued: true,
                tolerant: false,
                exclusive_strong: false,
            },
        ));
        p.squeezed_attributes.insert(
            "groups".into(),
            zero(&[("crew", MappingStrength::Normal), ("officers", MappingStrength::Normal)]),
        );

        let changes = reconcile_projection(&p, &[]);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].adds_value(&json!("officers")));
        assert!(changes[0].deletes_value(&json!("brig")));
        assert!(!changes[0].deletes_value(&json!("crew")));
    }

    #[test]
    fn test_only_full_shadow_keep_projections() {
        let coords = Discriminator::new(ResourceId::new(), ShadowKind::Account, "default").coordinates();
        let mut p = projection(ObjectSnapshot::shadow(coords).with_value("title", "Mate"));
        p.squeezed_attributes
            .insert("title".into(), zero(&[("Captain", MappingStrength::Strong)]));
        p.full_shadow = false;
        assert!(reconcile_projection(&p, &[]).is_empty());
        p.full_shadow = true;
        p.sync_decision = SyncDecision::Delete;
        assert!(reconcile_projection(&p, &[]).is_empty());
    }
}
