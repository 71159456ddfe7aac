//! Outbound construction: the projection's own mappings evaluated against the focus.

use tracing::trace;

use crate::collaborators::{MappingBindings, MappingEvaluator};
use crate::context::{FocusState, ProjectionState};
use crate::error::ProjectorResult;
use crate::origin::OriginType;
use crate::squeeze::Construction;

/// Token appended to identifiers on conflict iterations; empty on the first try.
pub fn iteration_token(iteration: u32) -> String {
    if iteration == 0 {
        String::new()
    } else {
        iteration.to_string()
    }
}

/// Evaluate the outbound mappings of a projection into one construction.
///
/// Returns `None` when the projection has no outbound mappings.
pub fn build_outbound_construction(
    evaluator: &dyn MappingEvaluator,
    focus: &FocusState,
    projection: &ProjectionState,
) -> ProjectorResult<Option<Construction>> {
    if projection.outbound_mappings.is_empty() {
        return Ok(None);
    }

    let token = iteration_token(projection.iteration);
    let bindings = MappingBindings {
        focus_old: focus.object_old.as_ref(),
        focus_new: focus.object_new.as_ref(),
        projection: projection.object_current.as_ref(),
        resource_id: projection.discriminator.resource_id,
        iteration: projection.iteration,
        iteration_token: &token,
    };

    let mut construction = Construction::new(
        format!("outbound:{}", projection.coordinates()),
        OriginType::Outbound,
    );
    let origin = construction.construction_ref();
    for mapping in &projection.outbound_mappings {
        let triple = evaluator.evaluate(mapping, &bindings)?;
        trace!(
            mapping = %mapping.name,
            zero = triple.zero_set.len(),
            plus = triple.plus_set.len(),
            minus = triple.minus_set.len(),
            "Evaluated outbound mapping"
        );
        construction.add_output(mapping.target.clone(), triple.with_origin(mapping, &origin));
    }
    Ok(Some(construction))
}
