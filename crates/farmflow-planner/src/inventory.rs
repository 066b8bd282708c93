//! Depot snapshot: owned quantity per material id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::ConfigStore;
use serde::{Deserialize, Serialize};

/// Config key of the depot document.
pub const DEPOT_KEY: &str = "depot";

/// Read-only snapshot of the depot. Taken once per planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: BTreeMap<String, u64>,
}

/// Persisted shape of the depot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotDocument {
    #[serde(default)]
    pub items: BTreeMap<String, u64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts<I, K>(counts: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            items: counts.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Owned count, zero for unknown ids.
    pub fn owned(&self, id: &str) -> u64 {
        self.items.get(id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Load the depot document; a missing document is an empty depot.
    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        let Some(value) = store.load_config(DEPOT_KEY)? else {
            tracing::debug!("📦 No depot document, planning against an empty depot");
            return Ok(Self::new());
        };
        let doc: DepotDocument =
            serde_json::from_value(value).map_err(|e| FarmflowError::malformed(DEPOT_KEY, e))?;
        Ok(Self { items: doc.items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_defaults_to_zero() {
        let inv = Inventory::from_counts([("30012", 14)]);
        assert_eq!(inv.owned("30012"), 14);
        assert_eq!(inv.owned("30013"), 0);
        assert_eq!(inv.len(), 1);
    }

    #[test]
    fn test_depot_document_shape() {
        let doc: DepotDocument = serde_json::from_value(serde_json::json!({
            "items": {"30012": 3, "4001": 120000},
            "updatedAt": "2026-03-01T04:00:00Z"
        }))
        .unwrap();
        assert_eq!(doc.items["4001"], 120000);
        assert!(doc.updated_at.is_some());
    }
}
