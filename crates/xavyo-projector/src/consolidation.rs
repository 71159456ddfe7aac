//! Consolidation: turn one item's merged triple into a single item change.
//!
//! Per distinct candidate value:
//!
//! 1. An a-priori REPLACE forces zero-set values to be re-added.
//! 2. Zero-only values need no change.
//! 3. Adds: at most one exclusive mapping per item; weak-only values are
//!    deferred; under `exclusive_strong` a strong value suppresses weaker
//!    values of other mappings; a strong add against an a-priori delete of
//!    the same value is a policy violation.
//! 4. Removes need an authoritative contributor, are dropped while another
//!    mapping keeps the value in its zero set, and yield to a non-empty
//!    a-priori change unless strong.
//! 5. When the item would end up empty, deferred weak values are used:
//!    assignment values first, then outbound, then any.
//! 6. Present values are never re-added; absent values are never deleted.
//!
//! Single-valued adds are emitted as REPLACE so an old value is displaced.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use crate::definition::{AttributeDefinition, ResourceObjectDefinition};
use crate::delta::{DeltaChange, ItemDelta, ObjectDelta, ObjectSnapshot};
use crate::error::{ProjectorError, ProjectorResult};
use crate::origin::{ItemValueWithOrigin, OriginType};
use crate::squeeze::IvwoTriple;

/// Everything consolidation needs to know about one item.
#[derive(Debug, Clone, Copy)]
pub struct ConsolidationInput<'a> {
    pub item_name: &'a str,
    pub triple: &'a IvwoTriple,
    pub apriori: Option<&'a ItemDelta>,
    /// Current values; `None` when unknown.
    pub current: Option<&'a [Value]>,
    pub definition: AttributeDefinition,
    pub filter_existing_values: bool,
}

struct Candidate<'a> {
    value: &'a Value,
    zero: Vec<&'a ItemValueWithOrigin>,
    plus: Vec<&'a ItemValueWithOrigin>,
    minus: Vec<&'a ItemValueWithOrigin>,
}

impl<'a> Candidate<'a> {
    fn add_contributors(&self, force_add: bool) -> Vec<&'a ItemValueWithOrigin> {
        let mut contributors = self.plus.clone();
        if force_add {
            contributors.extend(self.zero.iter().copied());
        }
        contributors
    }
}

fn collect_candidates(triple: &IvwoTriple) -> Vec<Candidate<'_>> {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    let sets = [
        (0usize, &triple.zero_set),
        (1, &triple.plus_set),
        (2, &triple.minus_set),
    ];
    for (set, ivwos) in sets {
        for ivwo in ivwos {
            let index = match candidates.iter().position(|c| c.value == &ivwo.value) {
                Some(index) => index,
                None => {
                    candidates.push(Candidate {
                        value: &ivwo.value,
                        zero: Vec::new(),
                        plus: Vec::new(),
                        minus: Vec::new(),
                    });
                    candidates.len() - 1
                }
            };
            let candidate = &mut candidates[index];
            match set {
                0 => candidate.zero.push(ivwo),
                1 => candidate.plus.push(ivwo),
                _ => candidate.minus.push(ivwo),
            }
        }
    }
    candidates
}

fn check_exclusivity(
    item_name: &str,
    candidates: &[Candidate<'_>],
    force_add: bool,
) -> ProjectorResult<()> {
    let mut exclusive: Option<&ItemValueWithOrigin> = None;
    for candidate in candidates {
        for ivwo in candidate.add_contributors(force_add) {
            if !ivwo.exclusive {
                continue;
            }
            match exclusive {
                None => exclusive = Some(ivwo),
                Some(first) if first.mapping_key() != ivwo.mapping_key() => {
                    let mut names = [first.mapping_key(), ivwo.mapping_key()];
                    names.sort();
                    return Err(ProjectorError::policy_violation(format!(
                        "exclusion conflict on item '{item_name}' between mappings {} and {}",
                        names[0], names[1]
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Consolidate one item. Returns `None` when no change is needed.
pub fn consolidate_item(input: &ConsolidationInput<'_>) -> ProjectorResult<Option<ItemDelta>> {
    let name = input.item_name;
    let apriori = input.apriori.filter(|d| !d.is_empty());
    // Re-adding zero values only makes sense when they can coexist with
    // the replaced set.
    let force_add = input.definition.multi_valued && apriori.is_some_and(ItemDelta::is_replace);
    let candidates = collect_candidates(input.triple);

    check_exclusivity(name, &candidates, force_add)?;

    let strong_values: Vec<&Value> = candidates
        .iter()
        .filter(|c| c.add_contributors(force_add).iter().any(|v| v.is_strong()))
        .map(|c| c.value)
        .collect();

    let mut adds: Vec<Value> = Vec::new();
    let mut deletes: Vec<Value> = Vec::new();
    let mut deferred: Vec<&Candidate<'_>> = Vec::new();

    for candidate in &candidates {
        let value = candidate.value;
        let contributors = candidate.add_contributors(force_add);

        if !contributors.is_empty() {
            if contributors.iter().all(|v| v.is_weak()) {
                deferred.push(candidate);
                continue;
            }
            let has_strong = contributors.iter().any(|v| v.is_strong());
            if input.definition.exclusive_strong
                && !has_strong
                && strong_values.iter().any(|v| *v != value)
            {
                trace!(item = name, "value suppressed by a strong mapping");
                continue;
            }
            if let Some(apriori) = apriori {
                if has_strong && apriori.deletes_value(value) {
                    return Err(ProjectorError::policy_violation(format!(
                        "strong mapping adds {value} to '{name}' which is explicitly deleted"
                    )));
                }
                if !has_strong && !force_add {
                    continue;
                }
                if apriori.adds_value(value) {
                    continue;
                }
            }
            if !force_add && input.current.is_some_and(|c| c.contains(value)) {
                continue;
            }
            adds.push(value.clone());
        } else if !candidate.minus.is_empty() {
            if !candidate.zero.is_empty() {
                continue;
            }
            if !candidate.minus.iter().any(|v| v.authoritative) {
                continue;
            }
            if let Some(apriori) = apriori {
                if !candidate.minus.iter().any(|v| v.is_strong()) || apriori.deletes_value(value) {
                    continue;
                }
            }
            if input.filter_existing_values && input.current.is_some_and(|c| !c.contains(value)) {
                continue;
            }
            deletes.push(value.clone());
        }
    }

    if adds.is_empty() && !deferred.is_empty() && item_ends_empty(input, apriori, &deletes) {
        adds = weak_fallback(&deferred, &deletes);
        if !input.definition.multi_valued {
            adds.truncate(1);
        }
    }

    let mut delta = ItemDelta::new(name);
    if !input.definition.multi_valued && !adds.is_empty() {
        if adds.len() > 1 {
            return Err(ProjectorError::schema(format!(
                "single-valued item '{name}' would receive {} values",
                adds.len()
            )));
        }
        check_single_value_against_apriori(name, apriori, &adds)?;
        delta.replace_values(adds);
    } else {
        delta.add_values(adds);
        delta.delete_values(deletes);
    }

    if delta.is_empty() {
        return Ok(None);
    }
    validate_cardinality(input, apriori, &delta)?;
    Ok(Some(delta))
}

fn item_ends_empty(
    input: &ConsolidationInput<'_>,
    apriori: Option<&ItemDelta>,
    deletes: &[Value],
) -> bool {
    let Some(current) = input.current else {
        return false;
    };
    let mut values = current.to_vec();
    if let Some(apriori) = apriori {
        apriori.apply_to(&mut values);
    }
    values.retain(|v| !deletes.contains(v));
    values.is_empty()
}

fn weak_fallback(deferred: &[&Candidate<'_>], deletes: &[Value]) -> Vec<Value> {
    let eligible: Vec<&Candidate<'_>> = deferred
        .iter()
        .copied()
        .filter(|c| c.minus.is_empty() && !deletes.contains(c.value))
        .collect();

    let from_origin = |origin: OriginType| -> Vec<Value> {
        eligible
            .iter()
            .filter(|c| c.plus.iter().chain(c.zero.iter()).any(|v| v.origin.origin == origin))
            .map(|c| c.value.clone())
            .collect()
    };

    let assignments = from_origin(OriginType::Assignments);
    if !assignments.is_empty() {
        return assignments;
    }
    let outbound = from_origin(OriginType::Outbound);
    if !outbound.is_empty() {
        return outbound;
    }
    eligible.iter().map(|c| c.value.clone()).collect()
}

/// A computed REPLACE on a single-valued item would silently displace a
/// value the a priori delta puts there.
fn check_single_value_against_apriori(
    name: &str,
    apriori: Option<&ItemDelta>,
    adds: &[Value],
) -> ProjectorResult<()> {
    let Some(apriori) = apriori else {
        return Ok(());
    };
    let introduced = apriori
        .values_to_replace
        .as_ref()
        .unwrap_or(&apriori.values_to_add);
    let displaced = introduced.iter().filter(|v| !adds.contains(v)).count();
    if displaced > 0 {
        return Err(ProjectorError::schema(format!(
            "single-valued item '{name}' would hold {} values",
            adds.len() + displaced
        )));
    }
    Ok(())
}

fn validate_cardinality(
    input: &ConsolidationInput<'_>,
    apriori: Option<&ItemDelta>,
    delta: &ItemDelta,
) -> ProjectorResult<()> {
    if input.definition.multi_valued {
        return Ok(());
    }
    let mut merged = apriori
        .cloned()
        .unwrap_or_else(|| ItemDelta::new(input.item_name));
    merged.merge(delta);

    let count = match (&merged.values_to_replace, input.current) {
        (Some(replace), _) => replace.len(),
        (None, Some(current)) => {
            let mut values = current.to_vec();
            merged.apply_to(&mut values);
            values.len()
        }
        (None, None) => merged.values_to_add.len(),
    };
    if count > 1 {
        return Err(ProjectorError::schema(format!(
            "single-valued item '{}' would hold {count} values",
            input.item_name
        )));
    }
    Ok(())
}

/// Remove the parts of a computed change already reflected by a
/// synchronization delta.
pub fn filter_by_sync_delta(mut delta: ItemDelta, sync: &ItemDelta) -> Option<ItemDelta> {
    if delta.is_replace() {
        return (!sync.contains(&delta)).then_some(delta);
    }
    delta.values_to_add.retain(|v| !sync.adds_value(v));
    delta.values_to_delete.retain(|v| !sync.deletes_value(v));
    (!delta.is_empty()).then_some(delta)
}

/// The item change an a-priori object delta carries for one item.
pub fn apriori_item(delta: &ObjectDelta, name: &str) -> Option<ItemDelta> {
    match &delta.change {
        DeltaChange::Add { object } => {
            let values = object.values(name);
            (!values.is_empty()).then(|| ItemDelta::add(name, values.to_vec()))
        }
        DeltaChange::Modify { .. } => delta.find_item(name).cloned(),
        DeltaChange::Delete => None,
    }
}

/// Shared inputs for consolidating every item of one projection.
#[derive(Debug, Clone, Copy)]
pub struct ItemFamilyContext<'a> {
    pub definition: &'a ResourceObjectDefinition,
    pub apriori: Option<&'a ObjectDelta>,
    pub sync_delta: Option<&'a ObjectDelta>,
    /// Current object; `None` with `complete` set means the object does not exist yet.
    pub current: Option<&'a ObjectSnapshot>,
    /// Whether `current` reflects the complete remote state.
    pub complete: bool,
    pub filter_existing_values: bool,
}

/// Consolidate a family of squeezed items, applying sync filtering.
pub fn consolidate_items(
    items: &BTreeMap<String, IvwoTriple>,
    ctx: &ItemFamilyContext<'_>,
) -> ProjectorResult<Vec<ItemDelta>> {
    let mut result = Vec::new();
    for (name, triple) in items {
        let apriori = ctx.apriori.and_then(|d| apriori_item(d, name));
        let current = ctx
            .complete
            .then(|| ctx.current.map_or(&[] as &[Value], |c| c.values(name)));
        let input = ConsolidationInput {
            item_name: name,
            triple,
            apriori: apriori.as_ref(),
            current,
            definition: ctx.definition.attribute(name),
            filter_existing_values: ctx.filter_existing_values,
        };
        let Some(mut delta) = consolidate_item(&input)? else {
            continue;
        };
        if let Some(sync) = ctx.sync_delta.and_then(|d| apriori_item(d, name)) {
            match filter_by_sync_delta(delta, &sync) {
                Some(filtered) => delta = filtered,
                None => continue,
            }
        }
        result.push(delta);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::{ConstructionRef, MappingSpec, MappingStrength};
    use serde_json::json;

    fn ivwo(value: &str, mapping: &str, strength: MappingStrength) -> ItemValueWithOrigin {
        let spec = MappingSpec::new(mapping, "title", json!(null)).with_strength(strength);
        ItemValueWithOrigin::from_mapping(
            json!(value),
            &spec,
            &ConstructionRef::new("c", OriginType::Outbound),
        )
    }

    fn multi() -> AttributeDefinition {
        AttributeDefinition {
            multi_valued: true,
            ..AttributeDefinition::default()
        }
    }

    fn input<'a>(
        triple: &'a IvwoTriple,
        current: Option<&'a [Value]>,
        definition: AttributeDefinition,
    ) -> ConsolidationInput<'a> {
        ConsolidationInput {
            item_name: "title",
            triple,
            apriori: None,
            current,
            definition,
            filter_existing_values: true,
        }
    }

    #[test]
    fn test_zero_only_is_no_change() {
        let mut triple = IvwoTriple::new();
        triple.add_to_zero_set(ivwo("Captain", "m", MappingStrength::Strong));
        let result = consolidate_item(&input(&triple, None, multi())).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_single_valued_add_becomes_replace() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "m", MappingStrength::Normal));
        let current = [json!("Mate")];
        let delta = consolidate_item(&input(&triple, Some(&current), AttributeDefinition::default()))
            .unwrap()
            .unwrap();
        assert_eq!(delta.values_to_replace, Some(vec![json!("Captain")]));
    }

    #[test]
    fn test_present_value_not_readded() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "m", MappingStrength::Normal));
        let current = [json!("Captain")];
        assert!(consolidate_item(&input(&triple, Some(&current), multi()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_absent_value_not_deleted() {
        let mut triple = IvwoTriple::new();
        let mut gone = ivwo("Mate", "m", MappingStrength::Normal);
        gone.authoritative = true;
        triple.add_to_minus_set(gone);
        let current = [json!("Captain")];
        assert!(consolidate_item(&input(&triple, Some(&current), multi()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_zero_set_holder_blocks_removal() {
        let mut triple = IvwoTriple::new();
        let mut gone = ivwo("Captain", "a", MappingStrength::Normal);
        gone.authoritative = true;
        triple.add_to_minus_set(gone);
        triple.add_to_zero_set(ivwo("Captain", "b", MappingStrength::Normal));
        let current = [json!("Captain")];
        assert!(consolidate_item(&input(&triple, Some(&current), multi()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_replace_apriori_forces_zero_values() {
        let mut triple = IvwoTriple::new();
        triple.add_to_zero_set(ivwo("pirates", "m", MappingStrength::Normal));
        let apriori = ItemDelta::replace("title", vec![json!("crew")]);
        let current = [json!("pirates")];
        let mut inp = input(&triple, Some(&current), multi());
        inp.apriori = Some(&apriori);
        let delta = consolidate_item(&inp).unwrap().unwrap();
        assert_eq!(delta.values_to_add, vec![json!("pirates")]);
    }

    #[test]
    fn test_apriori_change_wins_over_normal_mapping() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "m", MappingStrength::Normal));
        let apriori = ItemDelta::add("title", vec![json!("Admiral")]);
        let mut inp = input(&triple, Some(&[]), multi());
        inp.apriori = Some(&apriori);
        assert!(consolidate_item(&inp).unwrap().is_none());
    }

    #[test]
    fn test_strong_add_against_apriori_delete() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "m", MappingStrength::Strong));
        let apriori = ItemDelta::delete("title", vec![json!("Captain")]);
        let mut inp = input(&triple, None, multi());
        inp.apriori = Some(&apriori);
        let err = consolidate_item(&inp).unwrap_err();
        assert!(err.is_policy_violation());
    }

    #[test]
    fn test_exclusive_strong_suppresses_normal() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "a", MappingStrength::Strong));
        triple.add_to_plus_set(ivwo("Mate", "b", MappingStrength::Normal));
        let def = AttributeDefinition {
            multi_valued: true,
            exclusive_strong: true,
            ..AttributeDefinition::default()
        };
        let delta = consolidate_item(&input(&triple, Some(&[]), def)).unwrap().unwrap();
        assert_eq!(delta.values_to_add, vec![json!("Captain")]);
    }

    #[test]
    fn test_weak_not_applied_when_item_has_value() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "m", MappingStrength::Weak));
        let current = [json!("Mate")];
        assert!(consolidate_item(&input(&triple, Some(&current), multi()))
            .unwrap()
            .is_none());
        // Unknown current state: weak values are not applied either.
        assert!(consolidate_item(&input(&triple, None, multi())).unwrap().is_none());
    }

    #[test]
    fn test_cardinality_violation() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "a", MappingStrength::Normal));
        triple.add_to_plus_set(ivwo("Mate", "b", MappingStrength::Normal));
        let err = consolidate_item(&input(&triple, Some(&[]), AttributeDefinition::default()))
            .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_filter_by_sync_delta() {
        let computed = ItemDelta::add("groups", vec![json!("a"), json!("b")]);
        let sync = ItemDelta::add("groups", vec![json!("a")]);
        let filtered = filter_by_sync_delta(computed, &sync).unwrap();
        assert_eq!(filtered.values_to_add, vec![json!("b")]);

        let computed = ItemDelta::replace("title", vec![json!("Captain")]);
        let sync = ItemDelta::replace("title", vec![json!("Captain")]);
        assert!(filter_by_sync_delta(computed, &sync).is_none());
    }

    #[test]
    fn test_consolidate_items_for_new_object() {
        let mut triple = IvwoTriple::new();
        triple.add_to_plus_set(ivwo("Captain", "m", MappingStrength::Weak));
        let mut items = BTreeMap::new();
        items.insert("title".to_string(), triple);

        let definition = ResourceObjectDefinition::new("account");
        let ctx = ItemFamilyContext {
            definition: &definition,
            apriori: None,
            sync_delta: None,
            current: None,
            complete: true,
            filter_existing_values: true,
        };
        let deltas = consolidate_items(&items, &ctx).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].values_to_replace, Some(vec![json!("Captain")]));
    }
}
