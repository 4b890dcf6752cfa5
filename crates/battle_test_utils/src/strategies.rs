//! Proptest strategies for hex coordinates and battle inputs.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of the core.

use battle_core::components::EntityId;
use battle_core::grid_config::{HexGridConfig, Team};
use battle_core::hex::HexGridPosition;
use proptest::prelude::*;

/// Any axial position with both coordinates in `-range..=range`.
pub fn arb_hex_position(range: i32) -> impl Strategy<Value = HexGridPosition> {
    (-range..=range, -range..=range).prop_map(|(q, r)| HexGridPosition::new(q, r))
}

/// A position inside the rectangle limits of `config`.
pub fn arb_position_in(config: HexGridConfig) -> impl Strategy<Value = HexGridPosition> {
    (0..config.grid_size()).prop_map(move |index| config.coordinates(index))
}

/// Footprint radius of a unit.
pub fn arb_radius() -> impl Strategy<Value = i32> {
    0..=3i32
}

/// A fighting team.
pub fn arb_team() -> impl Strategy<Value = Team> {
    prop_oneof![Just(Team::Blue), Just(Team::Red)]
}

/// A list of distinct entity ids in random order.
pub fn arb_entity_ids(max_len: usize) -> impl Strategy<Value = Vec<EntityId>> {
    proptest::collection::btree_set(1..500u64, 0..=max_len)
        .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Odd board sizes.
pub fn arb_grid_config() -> impl Strategy<Value = HexGridConfig> {
    (2..15i32, 2..15i32).prop_filter_map("valid board", |(w, h)| HexGridConfig::new(2 * w + 1, 2 * h + 1).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_positions_in_config_are_in_bounds(
            (config, position) in arb_grid_config().prop_flat_map(|config| (Just(config), arb_position_in(config)))
        ) {
            prop_assert!(config.contains(position));
        }

        #[test]
        fn test_entity_ids_are_distinct(ids in arb_entity_ids(20)) {
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), ids.len());
        }
    }
}
