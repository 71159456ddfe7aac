//! Focus state: the object whose projections are computed.

use super::executed::ExecutedDelta;
use crate::delta::{ObjectDelta, ObjectSnapshot, ObjectType};
use crate::error::{ProjectorError, ProjectorResult};

#[derive(Debug, Clone)]
pub struct FocusState {
    pub object_type: ObjectType,
    /// State before the operation started.
    pub object_old: Option<ObjectSnapshot>,
    /// Expected state once all pending changes are applied.
    pub object_new: Option<ObjectSnapshot>,
    /// State as last read or written.
    pub object_current: Option<ObjectSnapshot>,
    primary_delta: Option<ObjectDelta>,
    primary_executed: bool,
    /// Change computed by the current wave.
    pub secondary_delta: Option<ObjectDelta>,
    executed_deltas: Vec<ExecutedDelta>,
}

impl FocusState {
    /// Focus of an existing object.
    pub fn new(object: ObjectSnapshot) -> Self {
        Self {
            object_type: object.object_type,
            object_old: Some(object.clone()),
            object_new: Some(object.clone()),
            object_current: Some(object),
            primary_delta: None,
            primary_executed: false,
            secondary_delta: None,
            executed_deltas: Vec::new(),
        }
    }

    /// Focus that does not exist yet; the primary delta is expected to add it.
    pub fn empty(object_type: ObjectType) -> Self {
        Self {
            object_type,
            object_old: None,
            object_new: None,
            object_current: None,
            primary_delta: None,
            primary_executed: false,
            secondary_delta: None,
            executed_deltas: Vec::new(),
        }
    }

    /// Oid of the focus, once known.
    pub fn oid(&self) -> Option<&str> {
        self.object_current
            .as_ref()
            .or(self.object_old.as_ref())
            .and_then(|o| o.oid.as_deref())
    }

    pub fn primary_delta(&self) -> Option<&ObjectDelta> {
        self.primary_delta.as_ref()
    }

    /// Set the requested change; it cannot be replaced once set.
    pub fn set_primary_delta(&mut self, delta: ObjectDelta) -> ProjectorResult<()> {
        if self.primary_delta.is_some() {
            return Err(ProjectorError::schema("primary delta of the focus is already set"));
        }
        if delta.object_type != self.object_type {
            return Err(ProjectorError::schema(format!(
                "primary delta for {} cannot target a {} focus",
                delta.object_type, self.object_type
            )));
        }
        self.primary_delta = Some(delta);
        Ok(())
    }

    #[must_use]
    pub fn is_primary_executed(&self) -> bool {
        self.primary_executed
    }

    pub(crate) fn mark_primary_executed(&mut self) {
        self.primary_executed = true;
    }

    /// Change not yet executed: the primary delta (until executed) merged with
    /// the secondary delta.
    pub fn pending_delta(&self) -> ProjectorResult<Option<ObjectDelta>> {
        let primary = self.primary_delta.as_ref().filter(|_| !self.primary_executed);
        let mut pending = match (primary, self.secondary_delta.as_ref()) {
            (None, None) => return Ok(None),
            (Some(delta), _) | (None, Some(delta)) => delta.clone(),
        };
        if primary.is_some() {
            if let Some(secondary) = &self.secondary_delta {
                pending.merge(secondary)?;
            }
        }
        if pending.oid.is_none() && !pending.is_add() {
            pending.oid = self.oid().map(str::to_string);
        }
        pending.simplify();
        Ok(Some(pending))
    }

    /// Whole change of the operation: primary and secondary merged.
    pub fn summary_delta(&self) -> ProjectorResult<Option<ObjectDelta>> {
        let mut summary = match (&self.primary_delta, &self.secondary_delta) {
            (None, None) => return Ok(None),
            (Some(delta), _) | (None, Some(delta)) => delta.clone(),
        };
        if self.primary_delta.is_some() {
            if let Some(secondary) = &self.secondary_delta {
                summary.merge(secondary)?;
            }
        }
        summary.simplify();
        Ok(Some(summary))
    }

    /// Recompute `object_new` from the current state and the pending change.
    pub fn recompute(&mut self) -> ProjectorResult<()> {
        let base = self.object_current.as_ref().or(self.object_old.as_ref());
        self.object_new = match self.pending_delta()? {
            Some(delta) => delta.apply_to(base)?,
            None => base.cloned(),
        };
        Ok(())
    }

    pub fn executed_deltas(&self) -> &[ExecutedDelta] {
        &self.executed_deltas
    }

    pub fn record_executed(&mut self, executed: ExecutedDelta) {
        self.executed_deltas.push(executed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::ItemDelta;
    use serde_json::json;

    fn jack() -> ObjectSnapshot {
        ObjectSnapshot::new(ObjectType::User)
            .with_oid("u1")
            .with_value("name", "jack")
            .with_value("title", "Pirate")
    }

    #[test]
    fn test_recompute_applies_primary_and_secondary() {
        let mut focus = FocusState::new(jack());
        focus
            .set_primary_delta(ObjectDelta::modify(
                ObjectType::User,
                Some("u1".into()),
                vec![ItemDelta::replace("title", vec![json!("Captain")])],
            ))
            .unwrap();
        focus.secondary_delta = Some(ObjectDelta::modify(
            ObjectType::User,
            None,
            vec![ItemDelta::add("locality", vec![json!("Tortuga")])],
        ));
        focus.recompute().unwrap();

        let new = focus.object_new.as_ref().unwrap();
        assert_eq!(new.values("title"), &[json!("Captain")]);
        assert_eq!(new.values("locality"), &[json!("Tortuga")]);
        assert_eq!(focus.object_old.as_ref().unwrap().values("title"), &[json!("Pirate")]);
    }

    #[test]
    fn test_executed_primary_is_not_pending() {
        let mut focus = FocusState::new(jack());
        focus
            .set_primary_delta(ObjectDelta::modify(
                ObjectType::User,
                Some("u1".into()),
                vec![ItemDelta::replace("title", vec![json!("Captain")])],
            ))
            .unwrap();
        focus.mark_primary_executed();
        assert!(focus.pending_delta().unwrap().is_none());
        assert!(focus.summary_delta().unwrap().is_some());
    }

    #[test]
    fn test_primary_delta_type_is_checked() {
        let mut focus = FocusState::new(jack());
        let err = focus
            .set_primary_delta(ObjectDelta::delete(ObjectType::Role, "r1"))
            .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_new_focus_from_add() {
        let mut focus = FocusState::empty(ObjectType::User);
        focus.set_primary_delta(ObjectDelta::add(jack())).unwrap();
        focus.recompute().unwrap();
        assert_eq!(focus.object_new.as_ref().unwrap().oid.as_deref(), Some("u1"));
        assert!(focus.oid().is_none());
    }
}
