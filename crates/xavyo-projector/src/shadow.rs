//! Shadow bookkeeping: synchronization situation and link items.
//!
//! A shadow is the local record of an account on a resource. Its
//! synchronization situation tells how it relates to the focus; the focus
//! carries one link reference per linked shadow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::SyncDecision;
use crate::delta::ItemDelta;

/// Focus item holding the oids of linked shadows.
pub const LINK_REF_ITEM: &str = "linkRef";

/// Shadow item holding the synchronization situation.
pub const SITUATION_ITEM: &str = "synchronizationSituation";

/// How a shadow relates to the focus after the executor touched it.
///
/// Situations found by correlation (unmatched, disputed and the like) belong
/// to the synchronization engine; records carrying them load as undetermined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSituation {
    Linked,
    /// The account is gone from the resource.
    Deleted,
}

impl SyncSituation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSituation::Linked => "linked",
            SyncSituation::Deleted => "deleted",
        }
    }

    /// Situation after execution; `None` means undetermined.
    #[must_use]
    pub fn after_execution(decision: SyncDecision, deleted: bool) -> Option<Self> {
        if deleted {
            Some(SyncSituation::Deleted)
        } else if decision.is_linked() {
            Some(SyncSituation::Linked)
        } else {
            None
        }
    }

    /// Item change writing a situation (or clearing it) on a shadow record.
    pub fn item_delta(situation: Option<Self>) -> ItemDelta {
        ItemDelta::replace(
            SITUATION_ITEM,
            situation
                .map(|s| vec![Value::from(s.as_str())])
                .unwrap_or_default(),
        )
    }
}

impl fmt::Display for SyncSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncSituation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linked" => Ok(SyncSituation::Linked),
            "deleted" => Ok(SyncSituation::Deleted),
            other => Err(format!("situation '{other}' is not written by the executor")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_situation_after_execution() {
        assert_eq!(
            SyncSituation::after_execution(SyncDecision::Keep, false),
            Some(SyncSituation::Linked)
        );
        assert_eq!(
            SyncSituation::after_execution(SyncDecision::Add, false),
            Some(SyncSituation::Linked)
        );
        assert_eq!(SyncSituation::after_execution(SyncDecision::Unlink, false), None);
        assert_eq!(
            SyncSituation::after_execution(SyncDecision::Delete, true),
            Some(SyncSituation::Deleted)
        );
    }

    #[test]
    fn test_item_delta() {
        let delta = SyncSituation::item_delta(Some(SyncSituation::Linked));
        assert_eq!(delta.values_to_replace, Some(vec![json!("linked")]));
        let cleared = SyncSituation::item_delta(None);
        assert_eq!(cleared.values_to_replace, Some(vec![]));
    }

    #[test]
    fn test_parse() {
        assert_eq!("LINKED".parse::<SyncSituation>(), Ok(SyncSituation::Linked));
        assert_eq!("deleted".parse::<SyncSituation>(), Ok(SyncSituation::Deleted));
        assert!("unmatched".parse::<SyncSituation>().is_err());
        assert!("lost".parse::<SyncSituation>().is_err());
    }
}
