//! REST API types for the command-layer client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{ImportCounts, Region};
use crate::roll::{EncounterRoll, Rolled};
use crate::travel::{Terrain, Vessel};

// =============================================================================
// Import
// =============================================================================

/// Response after a successful workbook import. Failed imports surface as a
/// 422 with the defect list instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Unique job identifier.
    pub job_id: String,
    pub status: String,
    pub counts: ImportCounts,
}

impl From<ImportCounts> for ImportResponse {
    fn from(counts: ImportCounts) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: "imported".to_string(),
            counts,
        }
    }
}

// =============================================================================
// Roll
// =============================================================================

/// Body of a roll request; the region choice is optional and validated
/// against the guild's region set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollRequest {
    #[serde(default)]
    pub region_id: Option<i64>,
}

/// One rolled value plus how the draw was made (`uniform`, `weight`,
/// `range d100=42`).
#[derive(Debug, Clone, Serialize)]
pub struct RolledValue {
    pub result: String,
    pub detail: String,
}

impl From<Rolled> for RolledValue {
    fn from(rolled: Rolled) -> Self {
        let detail = rolled.detail();
        Self {
            result: rolled.result,
            detail,
        }
    }
}

/// The composed encounter result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    pub encounter_type: RolledValue,
    pub encounter: RolledValue,
    pub reward: RolledValue,
}

impl From<EncounterRoll> for RollResponse {
    fn from(roll: EncounterRoll) -> Self {
        Self {
            region_name: roll.region_name,
            encounter_type: roll.encounter_type.into(),
            encounter: roll.encounter.into(),
            reward: roll.reward.into(),
        }
    }
}

// =============================================================================
// Regions
// =============================================================================

/// One pickable region, in configured order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionItem {
    pub region_id: i64,
    pub region_name: String,
}

impl From<Region> for RegionItem {
    fn from(region: Region) -> Self {
        Self {
            region_id: region.region_id,
            region_name: region.region_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionsResponse {
    pub regions: Vec<RegionItem>,
}

// =============================================================================
// Delete
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Travel
// =============================================================================

/// Request body for an overland travel estimate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandTravelRequest {
    pub hex_counts: HashMap<Terrain, u32>,
    #[serde(default)]
    pub unexplored_hexes: u32,
    #[serde(default)]
    pub explored_road_hexes: u32,
    #[serde(default)]
    pub forced_hours: u32,
}

/// Request body for a sea travel estimate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeaTravelRequest {
    pub vessel: Vessel,
    #[serde(default)]
    pub calm_hexes: u32,
    #[serde(default)]
    pub rough_hexes: u32,
    #[serde(default)]
    pub unexplored_hexes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RollMode;

    #[test]
    fn test_rolled_value_carries_detail() {
        let rolled = Rolled {
            result: "Bandits".to_string(),
            mode: RollMode::Range,
            draw: Some(17),
            out_of: Some(100),
        };
        let value = RolledValue::from(rolled);
        assert_eq!(value.result, "Bandits");
        assert_eq!(value.detail, "range d100=17");
    }

    #[test]
    fn test_roll_request_defaults() {
        let req: RollRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.region_id, None);

        let req: RollRequest = serde_json::from_str(r#"{"regionId": 3}"#).unwrap();
        assert_eq!(req.region_id, Some(3));
    }

    #[test]
    fn test_import_response_serialization() {
        let response = ImportResponse::from(ImportCounts {
            regions: 2,
            encounter_types: 4,
            encounter_entries: 10,
            reward_entries: 8,
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"jobId\""));
        assert!(json.contains("\"encounter_types\":4"));
    }
}
