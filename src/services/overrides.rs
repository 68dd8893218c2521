use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Admin-supplied price/availability exception for a single calendar day.
/// Absent fields fall through to the property's base monthly price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideDay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_night: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_month: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl OverrideDay {
    pub fn is_blocked(&self) -> bool {
        self.available == Some(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyOverrides {
    #[serde(default)]
    pub calendar: BTreeMap<NaiveDate, OverrideDay>,
}

/// Property external id → override calendar.
pub type OverrideMap = HashMap<String, PropertyOverrides>;

/// Read the full override store from disk.
///
/// The store is re-read on every call; callers must not cache the result,
/// otherwise admin price edits would keep billing at stale rates. A missing
/// file or unparseable document yields an empty mapping, never an error.
pub async fn load_overrides(path: &Path) -> OverrideMap {
    let raw = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to read pricing override store");
            }
            return OverrideMap::new();
        }
    };

    match serde_json::from_slice::<OverrideMap>(&raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Pricing override store is not valid JSON");
            OverrideMap::new()
        }
    }
}

/// Calendar for one property, or an empty calendar when the property has no
/// overrides (the common case).
pub fn calendar_for<'a>(
    overrides: &'a OverrideMap,
    property_id: Option<&str>,
) -> BTreeMap<NaiveDate, OverrideDay> {
    property_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .and_then(|id| overrides.get(id))
        .map(|property| property.calendar.clone())
        .unwrap_or_default()
}
