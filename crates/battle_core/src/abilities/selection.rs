//! Choosing which ability of a group fires next.

use crate::components::EntityId;
use crate::data::{AbilitiesData, AbilitySelectionType, StatType};
use crate::math::Fixed;
use crate::world::StatsSource;

use super::component::AbilitiesState;

/// Picks the index of the next ability of a group.
pub trait AbilitySelector {
    /// Index into `state.abilities`, or `None` when nothing can be chosen.
    fn select_ability(&self, entity: EntityId, data: &AbilitiesData, state: &AbilitiesState) -> Option<usize>;
}

/// Selection driven by [`AbilitiesData::selection_type`].
///
/// Attribute and health checks read live stats, so the policy borrows a
/// [`StatsSource`] (usually the [`crate::world::World`]).
pub struct SelectionPolicy<'a, S: StatsSource + ?Sized> {
    stats: &'a S,
}

impl<'a, S: StatsSource + ?Sized> SelectionPolicy<'a, S> {
    /// Policy reading stats from `stats`.
    pub const fn new(stats: &'a S) -> Self {
        Self { stats }
    }

    fn health_percentage(&self, entity: EntityId) -> Fixed {
        let max = self.stats.live_stat(entity, StatType::MaxHealth);
        if max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        self.stats.live_stat(entity, StatType::CurrentHealth) * Fixed::from_num(100) / max
    }
}

fn next_in_cycle(state: &AbilitiesState) -> Option<usize> {
    let size = state.abilities.len();
    if size == 0 {
        return None;
    }
    Some(state.current_ability_index.map_or(0, |index| (index + 1) % size))
}

fn has_two_abilities(entity: EntityId, data: &AbilitiesData) -> bool {
    if data.abilities.len() == 2 {
        return true;
    }
    tracing::error!(
        entity,
        selection = ?data.selection_type,
        count = data.abilities.len(),
        "Selection requires exactly 2 abilities"
    );
    false
}

impl<S: StatsSource + ?Sized> AbilitySelector for SelectionPolicy<'_, S> {
    fn select_ability(&self, entity: EntityId, data: &AbilitiesData, state: &AbilitiesState) -> Option<usize> {
        let index = match data.selection_type {
            AbilitySelectionType::Cycle => next_in_cycle(state)?,
            AbilitySelectionType::SelfAttributeCheck => {
                if !has_two_abilities(entity, data) {
                    return None;
                }
                let Some(stat) = data.activation_check_stat_type else {
                    tracing::error!(entity, "Attribute check without a stat");
                    return None;
                };
                if data.activation_check_value == Fixed::ZERO {
                    tracing::error!(entity, "Attribute check value is 0");
                    return None;
                }
                usize::from(self.stats.live_stat(entity, stat) < data.activation_check_value)
            }
            AbilitySelectionType::SelfHealthCheck => {
                if !has_two_abilities(entity, data) {
                    return None;
                }
                if data.activation_check_value == Fixed::ZERO {
                    tracing::error!(entity, "Health check value is 0");
                    return None;
                }
                usize::from(self.health_percentage(entity) < data.activation_check_value)
            }
            AbilitySelectionType::EveryXActivations => {
                if !has_two_abilities(entity, data) {
                    return None;
                }
                match data.activation_cadence {
                    0 => {
                        tracing::error!(entity, "Activation cadence is 0");
                        return None;
                    }
                    1 => next_in_cycle(state)?,
                    cadence => {
                        let count = state.total_activations_count;
                        usize::from(count != 0 && count % cadence == 0)
                    }
                }
            }
            AbilitySelectionType::None => 0,
        };
        (index < state.abilities.len()).then_some(index)
    }
}
