//! Search for the free spot that overlaps the most enemies.

use std::collections::BTreeSet;

use super::TargetingEngine;
use crate::components::EntityId;
use crate::data::AllegianceType;
use crate::grid::{do_hexagons_intersect, is_hexagon_position_taken};
use crate::hex::HexGridPosition;

impl TargetingEngine<'_> {
    /// Open position whose `overlap_radius` hexagon touches the most enemies
    /// of `sender`, while a `free_radius` hexagon there overlaps nobody.
    ///
    /// Candidates are the rings around each enemy between
    /// `enemy_radius + free_radius` and `enemy_radius + overlap_radius`.
    /// Cells marked in the world's obstacle map are skipped, so the caller
    /// rebuilds it first. Ties go to the lowest grid index. Returns
    /// [`HexGridPosition::INVALID`] when nothing fits or when
    /// `overlap_radius < free_radius`.
    #[must_use]
    pub fn find_max_enemy_overlap_position(
        &self,
        sender: EntityId,
        free_radius: i32,
        overlap_radius: i32,
        ignored: &BTreeSet<EntityId>,
    ) -> HexGridPosition {
        if overlap_radius < free_radius {
            tracing::error!(sender, free_radius, overlap_radius, "Overlap radius smaller than free radius");
            return HexGridPosition::INVALID;
        }

        let world = self.world();
        let grid = world.grid();
        let enemies: Vec<(HexGridPosition, i32)> = self
            .group_members(sender, AllegianceType::Enemy, false, |entity| ignored.contains(&entity.id))
            .into_iter()
            .filter_map(|id| world.get(id).and_then(|e| e.position))
            .map(|p| (p.position, p.radius))
            .collect();

        let no_ignored = BTreeSet::new();
        let mut best: Option<(usize, usize, HexGridPosition)> = None;
        for &(pivot, pivot_radius) in &enemies {
            let min_ring = pivot_radius + free_radius;
            let max_ring = pivot_radius + overlap_radius;
            for ring in min_ring..=max_ring {
                for position in grid.single_ring_positions(pivot, ring) {
                    if grid.has_obstacle_at(position)
                        || is_hexagon_position_taken(world.entities(), position, free_radius, &no_ignored)
                    {
                        continue;
                    }
                    let Some(index) = grid.config().grid_index(position) else {
                        continue;
                    };

                    let count = enemies
                        .iter()
                        .filter(|&&(other, other_radius)| {
                            do_hexagons_intersect(position, overlap_radius, other, other_radius)
                        })
                        .count();

                    let better = best.map_or(true, |(best_count, best_index, _)| {
                        count > best_count || (count == best_count && index < best_index)
                    });
                    if better {
                        best = Some((count, index, position));
                    }
                }
            }
        }

        best.map_or(HexGridPosition::INVALID, |(_, _, position)| position)
    }
}
