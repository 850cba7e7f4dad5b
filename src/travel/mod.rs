//! Overland and sea travel estimation.
//!
//! Companion calculators to the encounter tables: given a route broken into
//! hexes by terrain, estimate travel days, ration usage, forced-march
//! progress and exhaustion saves, and the probability that at least one
//! encounter check comes up during the trip. Pure arithmetic, no storage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hours of normal travel per day; forced march hours come on top.
pub const HOURS_PER_DAY: f64 = 8.0;

/// Chance that a single encounter check produces an encounter.
pub const ENCOUNTER_CHANCE: f64 = 0.25;

/// Chance per explored sea hex (unexplored sea hexes use [`ENCOUNTER_CHANCE`]).
pub const SEA_EXPLORED_CHANCE: f64 = 0.10;

// =============================================================================
// Terrain & vessels
// =============================================================================

/// Terrain a route hex can consist of.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Road,
    Plains,
    Forest,
    Jungle,
    Sand,
    Swamp,
    Snow,
    Mountains,
    CalmWater,
    RoughWater,
}

impl Terrain {
    /// Hexes covered in a normal travel day.
    pub fn hexes_per_day(&self) -> u32 {
        match self {
            Self::Road => 8,
            Self::Plains => 6,
            Self::Forest | Self::Jungle | Self::Sand => 4,
            Self::Swamp | Self::Snow => 3,
            Self::Mountains => 2,
            Self::CalmWater => 24,
            Self::RoughWater => 12,
        }
    }
}

/// Vessel types for sea travel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Vessel {
    /// 16 hexes/day regardless of conditions.
    Sailboat,
    /// 4 hexes/day in calm water, 2 in rough.
    Rowboat,
}

// =============================================================================
// Estimates
// =============================================================================

/// The result of a land or sea travel estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TravelEstimate {
    pub travel_days: u32,
    /// Extra hexes gained by forced marching (land only).
    pub forced_hexes_gained: u32,
    /// One ration per character per travel day.
    pub rations_per_character: u32,
    /// Number of encounter checks rolled over the trip (land only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_checks: Option<u32>,
    /// Probability of at least one encounter over the trip.
    pub encounter_probability: f64,
    /// Ascending exhaustion save DCs, one per forced-march hour.
    pub forced_march_saves: Vec<u32>,
}

/// Estimate an overland trip.
///
/// - `hex_counts`: hexes traveled per terrain.
/// - `unexplored_hexes`: unexplored hexes on the route (assumed off-road).
/// - `explored_road_hexes`: explored road hexes (one check per 3).
/// - `forced_hours`: extra travel hours beyond the normal day.
pub fn calculate_travel(
    hex_counts: &HashMap<Terrain, u32>,
    unexplored_hexes: u32,
    explored_road_hexes: u32,
    forced_hours: u32,
) -> TravelEstimate {
    let mut normal_days = 0.0;
    for (&terrain, &hexes) in hex_counts {
        if hexes == 0 {
            continue;
        }
        normal_days += f64::from(hexes) / f64::from(terrain.hexes_per_day());
    }
    let travel_days = normal_days.ceil() as u32;

    // Forced march is applied conservatively, slowest terrain first.
    let mut by_speed: Vec<(Terrain, u32)> =
        hex_counts.iter().map(|(&t, &h)| (t, h)).collect();
    by_speed.sort_by_key(|&(terrain, _)| terrain.hexes_per_day());

    let mut forced_hexes = 0.0;
    let mut remaining_hours = f64::from(forced_hours);
    for (terrain, hexes) in by_speed {
        if remaining_hours <= 0.0 {
            break;
        }
        let hexes_per_hour = f64::from(terrain.hexes_per_day()) / HOURS_PER_DAY;
        let possible = hexes_per_hour * remaining_hours;
        let used = f64::from(hexes).min(possible);

        forced_hexes += used;
        remaining_hours -= used / hexes_per_hour;
    }
    let forced_hexes_gained = forced_hexes.floor() as u32;

    // One check per unexplored hex, per explored off-road hex, and per three
    // explored road hexes, capped at one encounter per travel day.
    let total_hexes: u32 = hex_counts.values().sum();
    let road_hexes = hex_counts.get(&Terrain::Road).copied().unwrap_or(0);
    let off_road_hexes = total_hexes - road_hexes;
    let explored_off_road = off_road_hexes.saturating_sub(unexplored_hexes);
    let road_checks = explored_road_hexes / 3;

    let total_checks = unexplored_hexes + explored_off_road + road_checks;
    let effective_checks = total_checks.min(travel_days);

    let encounter_probability =
        1.0 - (1.0 - ENCOUNTER_CHANCE).powi(effective_checks as i32);

    let forced_march_saves = (1..=forced_hours).map(|hour| 10 + hour).collect();

    TravelEstimate {
        travel_days,
        forced_hexes_gained,
        rations_per_character: travel_days,
        encounter_checks: Some(total_checks),
        encounter_probability: round4(encounter_probability),
        forced_march_saves,
    }
}

/// Estimate a sea trip. Output shape matches [`calculate_travel`]; forced
/// march does not apply at sea.
pub fn calculate_sea_travel(
    vessel: Vessel,
    calm_hexes: u32,
    rough_hexes: u32,
    unexplored_hexes: u32,
) -> TravelEstimate {
    let total_hexes = calm_hexes + rough_hexes;
    let unexplored_hexes = unexplored_hexes.min(total_hexes);

    let (calm_days, rough_days) = match vessel {
        Vessel::Sailboat => (f64::from(calm_hexes) / 16.0, f64::from(rough_hexes) / 16.0),
        Vessel::Rowboat => (f64::from(calm_hexes) / 4.0, f64::from(rough_hexes) / 2.0),
    };
    let travel_days = (calm_days + rough_days).ceil() as u32;

    let explored_hexes = total_hexes - unexplored_hexes;
    let no_encounter = (1.0 - SEA_EXPLORED_CHANCE).powi(explored_hexes as i32)
        * (1.0 - ENCOUNTER_CHANCE).powi(unexplored_hexes as i32);

    TravelEstimate {
        travel_days,
        forced_hexes_gained: 0,
        rations_per_character: travel_days,
        encounter_checks: None,
        encounter_probability: 1.0 - no_encounter,
        forced_march_saves: Vec::new(),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
