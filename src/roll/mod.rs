//! Random draws against stored tables.
//!
//! A single draw dispatches on the table's stored [`RollMode`] — the column
//! sniffing all happened at import time. Draws are read-only and safe to run
//! concurrently; each one takes its own numbers from the thread RNG.
//!
//! The composition sequence region → type → encounter → reward lives here
//! too: the region is a caller choice (validated, auto-picked when exactly
//! one exists), the other three are rolls, with the resolved type selecting
//! the encounter/reward pair.

use rand::Rng;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::{RollError, RollResult};
use crate::models::{GroupKey, Region, RollMode, TableEntry};
use crate::store;

// =============================================================================
// Single draws
// =============================================================================

/// One resolved draw, with enough detail for a caller's footer text.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Rolled {
    pub result: String,
    pub mode: RollMode,
    /// The raw die value, range mode only.
    pub draw: Option<i64>,
    /// The die size, range mode only.
    pub out_of: Option<i64>,
}

impl Rolled {
    fn plain(result: String, mode: RollMode) -> Self {
        Self {
            result,
            mode,
            draw: None,
            out_of: None,
        }
    }

    /// Human-readable draw description: `uniform`, `weight`, `range d100=42`.
    pub fn detail(&self) -> String {
        match (self.mode, self.draw, self.out_of) {
            (RollMode::Range, Some(draw), Some(out_of)) => format!("range d{out_of}={draw}"),
            _ => self.mode.to_string(),
        }
    }
}

/// Execute one draw over a table's entries according to its mode.
///
/// `max_roll` is the import-time cache for range mode and is ignored
/// otherwise.
pub fn roll_table<R: Rng>(
    rng: &mut R,
    mode: RollMode,
    max_roll: Option<i64>,
    entries: &[TableEntry],
) -> RollResult<Rolled> {
    match mode {
        RollMode::Uniform => {
            if entries.is_empty() {
                return Err(RollError::EmptyTable);
            }
            let idx = rng.gen_range(0..entries.len());
            Ok(Rolled::plain(entries[idx].result.clone(), mode))
        }
        RollMode::Weight => {
            let items: Vec<(&str, i64)> = entries
                .iter()
                .filter_map(|e| e.weight.filter(|&w| w > 0).map(|w| (e.result.as_str(), w)))
                .collect();
            let total: i64 = items.iter().map(|&(_, w)| w).sum();
            if total <= 0 {
                return Err(RollError::EmptyTable);
            }

            let r = rng.gen_range(1..=total);
            let mut acc = 0;
            for &(result, weight) in &items {
                acc += weight;
                if r <= acc {
                    return Ok(Rolled::plain(result.to_string(), mode));
                }
            }
            // r <= total, so the walk above always returns.
            match items.last() {
                Some(&(result, _)) => Ok(Rolled::plain(result.to_string(), mode)),
                None => Err(RollError::EmptyTable),
            }
        }
        RollMode::Range => {
            let Some(max_roll) = max_roll.filter(|&m| m > 0) else {
                return Err(RollError::EmptyTable);
            };
            if entries.is_empty() {
                return Err(RollError::EmptyTable);
            }

            let draw = rng.gen_range(1..=max_roll);
            match match_range(draw, entries) {
                Some(entry) => Ok(Rolled {
                    result: entry.result.clone(),
                    mode,
                    draw: Some(draw),
                    out_of: Some(max_roll),
                }),
                // A gap in the authored intervals: surfaced, never retried.
                None => Err(RollError::UnresolvedRange { draw, max_roll }),
            }
        }
    }
}

/// Entry whose `[min, max]` interval contains the draw. Order does not
/// matter since intervals are disjoint by construction.
fn match_range(draw: i64, entries: &[TableEntry]) -> Option<&TableEntry> {
    entries.iter().find(|e| match (e.min_roll, e.max_roll) {
        (Some(min), Some(max)) => min <= draw && draw <= max,
        _ => false,
    })
}

/// Fetch a stored table by key and roll it once.
pub async fn roll_from_table(
    pool: &SqlitePool,
    guild_id: i64,
    group: GroupKey,
    region_id: Option<i64>,
    type_key: Option<&str>,
) -> RollResult<Rolled> {
    let def = store::fetch_table_def(pool, guild_id, group, region_id, type_key)
        .await?
        .ok_or_else(|| RollError::MissingTable {
            group,
            region_id,
            type_key: type_key.map(str::to_string),
        })?;

    let entries = store::fetch_entries(pool, def.id).await?;
    let rolled = roll_table(&mut rand::thread_rng(), def.roll_mode, def.max_roll, &entries)?;

    debug!(guild_id, %group, detail = %rolled.detail(), "rolled {}", rolled.result);
    Ok(rolled)
}

// =============================================================================
// Composition
// =============================================================================

/// The full composed result: region (if any), rolled type, encounter, reward.
#[derive(Debug, Clone, Serialize)]
pub struct EncounterRoll {
    pub region_name: Option<String>,
    pub encounter_type: Rolled,
    pub encounter: Rolled,
    pub reward: Rolled,
}

/// Validate the caller's region choice against the tenant's region set.
///
/// Zero regions means the implicit null region; supplying an id there is an
/// error. With regions configured an id is required, except that a single
/// configured region picks itself.
pub fn resolve_region(regions: &[Region], requested: Option<i64>) -> RollResult<Option<i64>> {
    if regions.is_empty() {
        return match requested {
            None => Ok(None),
            Some(region_id) => Err(RollError::UnknownRegion { region_id }),
        };
    }

    match requested {
        Some(region_id) if regions.iter().any(|r| r.region_id == region_id) => Ok(Some(region_id)),
        Some(region_id) => Err(RollError::UnknownRegion { region_id }),
        None if regions.len() == 1 => Ok(Some(regions[0].region_id)),
        None => Err(RollError::RegionRequired),
    }
}

/// Roll a complete encounter: type, then the encounter and reward tables
/// selected by the rolled type.
pub async fn roll_encounter(
    pool: &SqlitePool,
    guild_id: i64,
    requested_region: Option<i64>,
) -> RollResult<EncounterRoll> {
    let regions = store::fetch_regions(pool, guild_id).await?;
    let region_id = resolve_region(&regions, requested_region)?;

    let encounter_type =
        roll_from_table(pool, guild_id, GroupKey::EncounterType, region_id, None).await?;
    let type_key = encounter_type.result.clone();

    let encounter =
        roll_from_table(pool, guild_id, GroupKey::Encounter, region_id, Some(&type_key)).await?;
    let reward =
        roll_from_table(pool, guild_id, GroupKey::Reward, region_id, Some(&type_key)).await?;

    let region_name = match region_id {
        Some(rid) => store::region_name(pool, guild_id, rid).await?,
        None => None,
    };

    Ok(EncounterRoll {
        region_name,
        encounter_type,
        encounter,
        reward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_uniform_roll() {
        let entries = vec![
            TableEntry::uniform("A"),
            TableEntry::uniform("B"),
            TableEntry::uniform("C"),
        ];
        let mut rng = rng();
        for _ in 0..50 {
            let rolled = roll_table(&mut rng, RollMode::Uniform, None, &entries).unwrap();
            assert!(["A", "B", "C"].contains(&rolled.result.as_str()));
            assert_eq!(rolled.detail(), "uniform");
        }
    }

    #[test]
    fn test_empty_table_always_fails() {
        let mut rng = rng();
        for mode in [RollMode::Uniform, RollMode::Weight, RollMode::Range] {
            let err = roll_table(&mut rng, mode, Some(10), &[]).unwrap_err();
            assert!(matches!(err, RollError::EmptyTable));
        }
    }

    #[test]
    fn test_weighted_frequencies_converge() {
        let entries = vec![TableEntry::weighted(1, "A"), TableEntry::weighted(3, "B")];
        let mut rng = rng();
        let mut counts: HashMap<String, u32> = HashMap::new();

        let trials = 20_000;
        for _ in 0..trials {
            let rolled = roll_table(&mut rng, RollMode::Weight, None, &entries).unwrap();
            *counts.entry(rolled.result).or_default() += 1;
        }

        let freq_a = f64::from(counts["A"]) / f64::from(trials);
        assert!((freq_a - 0.25).abs() < 0.02, "freq_a = {freq_a}");
    }

    #[test]
    fn test_weighted_total_zero_fails() {
        // Entries whose weights were never populated carry no probability.
        let entries = vec![TableEntry::uniform("A")];
        let err = roll_table(&mut rng(), RollMode::Weight, None, &entries).unwrap_err();
        assert!(matches!(err, RollError::EmptyTable));
    }

    #[test]
    fn test_range_mapping_is_exhaustive() {
        let entries = vec![
            TableEntry::ranged(1, 40, "Bandits"),
            TableEntry::ranged(41, 70, "Merchant"),
            TableEntry::ranged(71, 100, "Monster"),
        ];

        for draw in 1..=100 {
            let expected = match draw {
                1..=40 => "Bandits",
                41..=70 => "Merchant",
                _ => "Monster",
            };
            let entry = match_range(draw, &entries).unwrap();
            assert_eq!(entry.result, expected, "draw {draw}");
        }
        assert!(match_range(0, &entries).is_none());
        assert!(match_range(101, &entries).is_none());
    }

    #[test]
    fn test_range_roll_carries_draw_detail() {
        let entries = vec![TableEntry::ranged(1, 100, "Anything")];
        let rolled = roll_table(&mut rng(), RollMode::Range, Some(100), &entries).unwrap();
        let draw = rolled.draw.unwrap();
        assert!((1..=100).contains(&draw));
        assert_eq!(rolled.detail(), format!("range d100={draw}"));
    }

    #[test]
    fn test_range_gap_is_unresolved() {
        // Only 1 of d5 resolves; the rest are gaps.
        let entries = vec![TableEntry::ranged(1, 1, "Rare")];
        let mut rng = rng();
        let mut hits = 0;
        let mut gaps = 0;

        for _ in 0..100 {
            match roll_table(&mut rng, RollMode::Range, Some(5), &entries) {
                Ok(rolled) => {
                    assert_eq!(rolled.result, "Rare");
                    hits += 1;
                }
                Err(RollError::UnresolvedRange { draw, max_roll }) => {
                    assert!((2..=5).contains(&draw));
                    assert_eq!(max_roll, 5);
                    gaps += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert!(hits > 0);
        assert!(gaps > 0);
    }

    #[test]
    fn test_resolve_region() {
        let north = Region {
            region_id: 1,
            region_name: "North".into(),
            sort_order: 0,
        };
        let south = Region {
            region_id: 2,
            region_name: "South".into(),
            sort_order: 1,
        };

        // Non-regional tenant.
        assert_eq!(resolve_region(&[], None).unwrap(), None);
        assert!(matches!(
            resolve_region(&[], Some(1)),
            Err(RollError::UnknownRegion { region_id: 1 })
        ));

        // Single region auto-picks.
        assert_eq!(resolve_region(std::slice::from_ref(&north), None).unwrap(), Some(1));

        // Multiple regions require a valid choice.
        let both = vec![north, south];
        assert!(matches!(resolve_region(&both, None), Err(RollError::RegionRequired)));
        assert_eq!(resolve_region(&both, Some(2)).unwrap(), Some(2));
        assert!(matches!(
            resolve_region(&both, Some(9)),
            Err(RollError::UnknownRegion { region_id: 9 })
        ));
    }
}
