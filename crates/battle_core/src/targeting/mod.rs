//! Skill target resolution.
//!
//! [`TargetingEngine`] turns a skill's targeting block into an ordered list
//! of receivers. Every strategy follows the same shape: collect a group of
//! candidates, rank them when the strategy ranks, then run them through
//! [`TargetingEngine::filter_receivers`] which applies the ignore set, the
//! sender's filtering state and the requested count.
//!
//! Iteration always walks entities in ascending id order and every ranking
//! breaks ties on the lower id, so the same world yields the same receivers.

mod density;
mod overlap;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityState;
use crate::components::{Entity, EntityId, INVALID_ENTITY_ID};
use crate::data::{
    ActivationTriggerType, AllegianceType, Guidance, PlaneChange, SkillData, SkillTargetingType,
};
use crate::hex::HexGridPosition;
use crate::world::{ExpressionContext, ExpressionEvaluator, RandomSource, StatsSource, World};

/// Receivers of one skill deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTargetFindResult {
    /// Receivers in rank order.
    pub receiver_ids: Vec<EntityId>,
    /// Sender after resolving shields to their owner.
    pub true_sender_id: EntityId,
}

/// Read-only targeting queries over a [`World`].
#[derive(Debug, Clone, Copy)]
pub struct TargetingEngine<'w> {
    world: &'w World,
}

impl<'w> TargetingEngine<'w> {
    /// Engine reading `world`.
    #[must_use]
    pub const fn new(world: &'w World) -> Self {
        Self { world }
    }

    /// The world being queried.
    #[must_use]
    pub const fn world(&self) -> &'w World {
        self.world
    }

    /// The entity acting on behalf of `sender`: a shield's owner, otherwise
    /// the sender itself.
    #[must_use]
    pub fn true_sender(&self, sender: EntityId) -> EntityId {
        self.world
            .get(sender)
            .and_then(Entity::shield_owner)
            .unwrap_or(sender)
    }

    /// Resolve the receivers of `skill` deployed by `sender`.
    ///
    /// `ability_state` is the running ability the skill belongs to. It is
    /// required by `Activator` and optional for `PreviousTargetList`, which
    /// falls back to the sender's active ability.
    ///
    /// Strategies run for the true sender, so a shield targets as its owner.
    /// Guidance is still checked against `sender`.
    pub fn resolve_skill_targets(
        &self,
        rng: &mut impl RandomSource,
        sender: EntityId,
        ability_state: Option<&AbilityState>,
        skill: &SkillData,
        ignored: &BTreeSet<EntityId>,
    ) -> SkillTargetFindResult {
        let targeting = &skill.targeting;
        let true_sender = self.true_sender(sender);
        let is_ignored = |id: EntityId| ignored.contains(&id);

        let receiver_ids = match targeting.targeting_type {
            SkillTargetingType::CurrentFocus => self
                .world
                .get(true_sender)
                .and_then(|e| e.focus)
                .filter(|&focus| !is_ignored(focus))
                .filter(|&focus| self.world.entities().get_active(focus).is_some())
                .into_iter()
                .collect(),
            SkillTargetingType::Self_ => {
                if is_ignored(true_sender) {
                    Vec::new()
                } else {
                    vec![true_sender]
                }
            }
            SkillTargetingType::InZone => self.in_zone_targets(true_sender, skill, ignored),
            SkillTargetingType::DistanceCheck => {
                self.distance_check_targets(true_sender, targeting.group, targeting.include_self, targeting.num, targeting.lowest, ignored)
            }
            SkillTargetingType::CombatStatCheck => {
                let Some(stat) = targeting.stat_type else {
                    tracing::error!(sender, skill = %skill.name, "Combat stat check without a stat");
                    return SkillTargetFindResult {
                        receiver_ids: Vec::new(),
                        true_sender_id: true_sender,
                    };
                };
                let mut found = self.group_members(true_sender, targeting.group, targeting.include_self, |_| false);
                sort_entities_by(&mut found, targeting.lowest, |id| self.world.live_stat(id, stat));
                self.filter_receivers(true_sender, &found, targeting.num, ignored)
            }
            SkillTargetingType::ExpressionCheck => {
                let mut found = self.group_members(true_sender, targeting.group, targeting.include_self, |_| false);
                sort_entities_by(&mut found, targeting.lowest, |id| {
                    self.world.evaluate(
                        &targeting.expression,
                        ExpressionContext {
                            sender: true_sender,
                            receiver: id,
                        },
                    )
                });
                self.filter_receivers(true_sender, &found, targeting.num, ignored)
            }
            SkillTargetingType::Allegiance => {
                let found = self.group_members(true_sender, targeting.group, targeting.include_self, |_| false);
                self.filter_receivers(true_sender, &found, 0, ignored)
            }
            SkillTargetingType::Synergy => {
                let found = self.group_members(true_sender, targeting.group, targeting.include_self, |entity| {
                    !entity.is_combat_unit()
                        || targeting
                            .combat_synergy
                            .as_ref()
                            .is_some_and(|synergy| !entity.synergies.contains(synergy))
                        || targeting
                            .not_combat_synergy
                            .as_ref()
                            .is_some_and(|synergy| entity.synergies.contains(synergy))
                });
                self.filter_receivers(true_sender, &found, 0, ignored)
            }
            SkillTargetingType::Tier => {
                let found = self.group_members(true_sender, targeting.group, true, |entity| {
                    is_ignored(entity.id)
                        || entity
                            .combat_unit_data()
                            .map_or(true, |unit| unit.is_ranger || unit.tier != targeting.tier)
                });
                let filtered = self.filter_receivers(true_sender, &found, 0, ignored);
                if targeting.num == 0 {
                    filtered
                } else {
                    select_random_entities(rng, filtered, targeting.num)
                }
            }
            SkillTargetingType::Vanquisher => {
                if let Some(vanquisher) = self.world.get(true_sender).and_then(|e| e.vanquisher) {
                    vec![vanquisher]
                } else {
                    tracing::error!(sender = true_sender, "Vanquisher targeting without a vanquisher");
                    Vec::new()
                }
            }
            SkillTargetingType::PreviousTargetList => self.previous_targets(true_sender, ability_state, ignored),
            SkillTargetingType::Activator => self.activator_targets(true_sender, ability_state),
            SkillTargetingType::Density => self.density_targets(true_sender, skill, ignored),
            SkillTargetingType::Pets => self.pet_targets(true_sender, targeting.group, ignored),
            SkillTargetingType::None => {
                tracing::error!(sender, skill = %skill.name, "Skill has no targeting type");
                Vec::new()
            }
        };

        let receiver_ids = if self.world.get(sender).is_some_and(Entity::is_combat_unit) {
            receiver_ids
                .into_iter()
                .filter(|&receiver| self.does_entity_match_guidance(sender, receiver, targeting.guidance))
                .collect()
        } else {
            receiver_ids
        };

        tracing::debug!(
            sender,
            true_sender,
            targeting = ?targeting.targeting_type,
            receivers = ?receiver_ids,
            "Resolved skill targets"
        );

        SkillTargetFindResult {
            receiver_ids,
            true_sender_id: true_sender,
        }
    }

    /// Entities of `allegiance` relative to `sender`, in id order.
    ///
    /// Only targetable entities are returned. The sender itself is only
    /// included for [`AllegianceType::Self_`] or when `include_self` is set.
    /// Entities for which `is_ignored` returns true are skipped.
    pub fn group_members(
        &self,
        sender: EntityId,
        allegiance: AllegianceType,
        include_self: bool,
        is_ignored: impl Fn(&Entity) -> bool,
    ) -> Vec<EntityId> {
        let Some(sender_entity) = self.world.get(sender) else {
            return Vec::new();
        };

        let accept = |entity: &Entity| {
            let targetable_allegiance = if entity.is_allied_with(sender_entity) {
                AllegianceType::Ally
            } else {
                AllegianceType::Enemy
            };
            entity.is_targetable(targetable_allegiance) && !is_ignored(entity)
        };

        if allegiance == AllegianceType::Self_ {
            return if accept(sender_entity) { vec![sender] } else { Vec::new() };
        }

        self.world
            .entities()
            .iter_sorted()
            .filter(|entity| include_self || entity.id != sender)
            .filter(|entity| match allegiance {
                AllegianceType::All => true,
                AllegianceType::Ally => entity.is_allied_with(sender_entity),
                AllegianceType::Enemy => !entity.is_allied_with(sender_entity),
                AllegianceType::Self_ | AllegianceType::None => false,
            })
            .filter(|entity| accept(entity))
            .map(|entity| entity.id)
            .collect()
    }

    /// Trim ranked candidates down to the final receivers.
    ///
    /// Ignored entities are dropped. When the sender has a filtering state,
    /// its old targets are dropped (`only_new_targets`) or moved behind the
    /// new ones (`prioritize_new_targets`). At most `num` receivers are
    /// returned, or all of them when `num` is zero; demoted targets only fill
    /// a bounded result. Rank order is kept inside both buckets.
    #[must_use]
    pub fn filter_receivers(
        &self,
        sender: EntityId,
        ranked: &[EntityId],
        num: usize,
        ignored: &BTreeSet<EntityId>,
    ) -> Vec<EntityId> {
        let Some(sender_entity) = self.world.get(sender) else {
            return Vec::new();
        };
        let filtering = sender_entity.filtering.as_ref();

        let mut receivers = Vec::new();
        let mut demoted = Vec::new();
        for &id in ranked {
            if num != 0 && receivers.len() >= num {
                break;
            }
            if ignored.contains(&id) {
                continue;
            }
            if let Some(filtering) = filtering.filter(|f| f.has_old_target(id)) {
                if filtering.only_new_targets {
                    continue;
                }
                if filtering.prioritize_new_targets {
                    demoted.push(id);
                    continue;
                }
            }
            receivers.push(id);
        }

        for id in demoted {
            if receivers.len() >= num {
                break;
            }
            receivers.push(id);
        }

        receivers
    }

    /// Members of `allegiance` whose center lies within `radius` hexes of
    /// `center`.
    pub fn entities_within_range(
        &self,
        sender: EntityId,
        center: HexGridPosition,
        radius: i32,
        allegiance: AllegianceType,
        include_self: bool,
        is_ignored: impl Fn(&Entity) -> bool,
    ) -> Vec<EntityId> {
        self.group_members(sender, allegiance, include_self, |entity| {
            is_ignored(entity)
                || entity
                    .hex_position()
                    .map_or(true, |position| position.distance(center) > radius)
        })
    }

    /// Whether `receiver` can be reached with `guidance`.
    ///
    /// Allies and the sender itself always match. Otherwise the receiver's
    /// plane (airborne, underground, or ground) must be in `guidance`.
    #[must_use]
    pub fn does_entity_match_guidance(&self, sender: EntityId, receiver: EntityId, guidance: Guidance) -> bool {
        if sender == receiver {
            return true;
        }
        let (Some(sender_entity), Some(receiver_entity)) = (self.world.get(sender), self.world.get(receiver)) else {
            return false;
        };
        if sender_entity.is_allied_with(receiver_entity) {
            return true;
        }

        let effects = &receiver_entity.attached_effects;
        let required = if effects.has_plane_change(PlaneChange::Airborne) {
            Guidance::AIRBORNE
        } else if effects.has_plane_change(PlaneChange::Underground) {
            Guidance::UNDERGROUND
        } else {
            Guidance::GROUND
        };
        guidance.contains(required)
    }

    /// The enemy farthest from `sender`.
    #[must_use]
    pub fn furthest_enemy(&self, sender: EntityId, ignored: &BTreeSet<EntityId>) -> Option<EntityId> {
        self.distance_check_targets(sender, AllegianceType::Enemy, false, 1, false, ignored)
            .first()
            .copied()
    }

    fn distance_check_targets(
        &self,
        sender: EntityId,
        group: AllegianceType,
        include_self: bool,
        num: usize,
        lowest: bool,
        ignored: &BTreeSet<EntityId>,
    ) -> Vec<EntityId> {
        let Some(origin) = self.world.get(sender).and_then(Entity::hex_position) else {
            return Vec::new();
        };
        let mut found = self.group_members(sender, group, include_self, |_| false);
        sort_entities_by(&mut found, lowest, |id| {
            self.world
                .get(id)
                .and_then(Entity::hex_position)
                .map_or(i32::MAX, |position| position.distance(origin))
        });
        self.filter_receivers(sender, &found, num, ignored)
    }

    fn in_zone_targets(&self, sender: EntityId, skill: &SkillData, ignored: &BTreeSet<EntityId>) -> Vec<EntityId> {
        let targeting = &skill.targeting;
        let center = self
            .world
            .get(sender)
            .and_then(Entity::hex_position)
            .unwrap_or(HexGridPosition::ZERO);

        let focused_unit = if targeting.only_current_focusers {
            match self.owning_combat_unit(sender) {
                Some(unit) => Some(unit),
                None => return Vec::new(),
            }
        } else {
            None
        };

        let found = self.entities_within_range(
            sender,
            center,
            targeting.radius_units,
            targeting.group,
            targeting.include_self,
            |entity| focused_unit.is_some_and(|unit| entity.focus.is_some_and(|focus| focus != unit)),
        );
        self.filter_receivers(sender, &found, 0, ignored)
    }

    /// First non-pet combat unit walking up from `entity` through parents.
    fn owning_combat_unit(&self, entity: EntityId) -> Option<EntityId> {
        let mut current = entity;
        for _ in 0..=self.world.entities().len() {
            let candidate = self.world.get(current)?;
            if candidate.is_combat_unit() && !candidate.is_pet() {
                return Some(current);
            }
            current = candidate.parent?;
        }
        None
    }

    fn previous_targets(
        &self,
        sender: EntityId,
        ability_state: Option<&AbilityState>,
        ignored: &BTreeSet<EntityId>,
    ) -> Vec<EntityId> {
        let ability = ability_state.or_else(|| {
            self.world
                .get(sender)
                .and_then(|e| e.abilities.as_ref())
                .and_then(|abilities| abilities.active_ability())
        });
        let Some(ability) = ability else {
            tracing::error!(sender, "Previous target list without a running ability");
            return Vec::new();
        };

        let index = ability.current_skill_index();
        if index == 0 {
            return vec![sender];
        }
        let Some(previous) = ability.skills.get(index - 1) else {
            return Vec::new();
        };

        previous
            .targeting_state
            .available_targets
            .iter()
            .copied()
            .filter(|&id| !ignored.contains(&id))
            .filter(|&id| self.world.get(id).is_some_and(Entity::is_combat_unit_alive))
            .collect()
    }

    fn activator_targets(&self, sender: EntityId, ability_state: Option<&AbilityState>) -> Vec<EntityId> {
        debug_assert!(ability_state.is_some(), "activator targeting requires the running ability");
        let Some(ability) = ability_state else {
            tracing::error!(sender, "Activator targeting without a running ability");
            return Vec::new();
        };

        if ability.data.trigger_type() == ActivationTriggerType::OnDodge {
            let Some(context) = ability.activator_contexts.last() else {
                tracing::error!(sender, "Dodge activator targeting without an activator context");
                return Vec::new();
            };
            return vec![context.receiver_combat_unit_entity_id];
        }

        ability
            .activator_contexts
            .iter()
            .map(|context| context.sender_combat_unit_entity_id)
            .filter(|&id| id != INVALID_ENTITY_ID)
            .collect()
    }

    fn pet_targets(&self, sender: EntityId, group: AllegianceType, ignored: &BTreeSet<EntityId>) -> Vec<EntityId> {
        let Some(sender_entity) = self.world.get(sender) else {
            return Vec::new();
        };

        let found: Vec<EntityId> = self
            .world
            .entities()
            .iter_sorted()
            .filter(|entity| match group {
                AllegianceType::Self_ => entity.parent == Some(sender),
                AllegianceType::All => true,
                AllegianceType::Ally => entity.is_allied_with(sender_entity),
                AllegianceType::Enemy => !entity.is_allied_with(sender_entity),
                AllegianceType::None => false,
            })
            .filter(|entity| entity.is_pet())
            .filter(|entity| {
                let targetable_allegiance = if entity.is_allied_with(sender_entity) {
                    AllegianceType::Ally
                } else {
                    AllegianceType::Enemy
                };
                entity.is_targetable(targetable_allegiance)
            })
            .filter(|entity| !ignored.contains(&entity.id))
            .map(|entity| entity.id)
            .collect();

        self.filter_receivers(sender, &found, 0, &BTreeSet::new())
    }
}

/// Stable sort of `entities` by `key`, computed once per entity.
///
/// Ties go to the lower id in both directions.
pub fn sort_entities_by<K: Ord>(entities: &mut Vec<EntityId>, ascending: bool, mut key: impl FnMut(EntityId) -> K) {
    let mut keyed: Vec<(K, EntityId)> = entities.iter().map(|&id| (key(id), id)).collect();
    keyed.sort_by(|(a_key, a_id), (b_key, b_id)| {
        let by_key = if ascending { a_key.cmp(b_key) } else { b_key.cmp(a_key) };
        by_key.then(a_id.cmp(b_id))
    });
    entities.clear();
    entities.extend(keyed.into_iter().map(|(_, id)| id));
}

/// Pick `num` distinct entities at random, in draw order.
///
/// Returns every entity unchanged when `num` is zero or not smaller than
/// the candidate count.
pub fn select_random_entities(rng: &mut impl RandomSource, entities: Vec<EntityId>, num: usize) -> Vec<EntityId> {
    if num == 0 || entities.len() <= num {
        return entities;
    }

    let Ok(len) = i32::try_from(entities.len()) else {
        return entities.into_iter().take(num).collect();
    };
    let mut chosen = BTreeSet::new();
    let mut selected = Vec::with_capacity(num);
    while selected.len() < num {
        let Ok(index) = usize::try_from(rng.random_range(0, len)) else {
            continue;
        };
        if chosen.insert(index) {
            selected.push(entities[index]);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::abilities::ActivatorContext;
    use crate::components::{CombatUnit, EntityKind, FilteringState};
    use crate::data::{AbilityData, AbilityType, EffectData, StatType};
    use crate::grid_config::{HexGridConfig, Team};
    use crate::math::Fixed;
    use crate::world::SeededRandom;

    fn world() -> World {
        World::new(HexGridConfig::new(21, 21).unwrap(), 10, 0).unwrap()
    }

    fn unit(world: &mut World, team: Team, q: i32, r: i32) -> EntityId {
        world.spawn(Entity::combat_unit(team, HexGridPosition::new(q, r), 1))
    }

    fn skill(targeting_type: SkillTargetingType, group: AllegianceType) -> SkillData {
        let mut skill = SkillData::default();
        skill.targeting.targeting_type = targeting_type;
        skill.targeting.group = group;
        skill
    }

    fn resolve(world: &World, sender: EntityId, skill: &SkillData) -> Vec<EntityId> {
        let mut rng = SeededRandom::new(7);
        TargetingEngine::new(world)
            .resolve_skill_targets(&mut rng, sender, None, skill, &BTreeSet::new())
            .receiver_ids
    }

    #[test]
    fn test_sort_ties_go_to_lower_id() {
        let mut ids = vec![5, 3, 9, 1];
        sort_entities_by(&mut ids, true, |id| if id == 9 { 0 } else { 1 });
        assert_eq!(ids, vec![9, 1, 3, 5]);

        let mut ids = vec![5, 3, 9, 1];
        sort_entities_by(&mut ids, false, |id| if id == 9 { 0 } else { 1 });
        assert_eq!(ids, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_distance_check_closest_enemies() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let far = unit(&mut world, Team::Red, 0, -8);
        let near = unit(&mut world, Team::Red, 0, -2);
        let mid = unit(&mut world, Team::Red, 4, -4);
        unit(&mut world, Team::Blue, 3, 3);

        let mut skill = skill(SkillTargetingType::DistanceCheck, AllegianceType::Enemy);
        skill.targeting.num = 2;
        skill.targeting.lowest = true;
        assert_eq!(resolve(&world, sender, &skill), vec![near, mid]);

        skill.targeting.lowest = false;
        skill.targeting.num = 1;
        assert_eq!(resolve(&world, sender, &skill), vec![far]);
        assert_eq!(TargetingEngine::new(&world).furthest_enemy(sender, &BTreeSet::new()), Some(far));
    }

    #[test]
    fn test_shield_resolves_to_owner() {
        let mut world = world();
        let owner = unit(&mut world, Team::Blue, 0, 0);
        let mut shield = Entity::new(INVALID_ENTITY_ID);
        shield.kind = EntityKind::Shield { owner };
        shield.team = Team::Blue;
        let shield = world.spawn(shield);

        let result = TargetingEngine::new(&world).resolve_skill_targets(
            &mut SeededRandom::new(1),
            shield,
            None,
            &skill(SkillTargetingType::Self_, AllegianceType::Self_),
            &BTreeSet::new(),
        );
        assert_eq!(result.true_sender_id, owner);
        assert_eq!(result.receiver_ids, vec![owner]);
    }

    #[test]
    fn test_in_zone_radius_is_inclusive() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 0);
        let inside = unit(&mut world, Team::Blue, 3, 0);
        unit(&mut world, Team::Blue, 4, 0);

        let mut skill = skill(SkillTargetingType::InZone, AllegianceType::Ally);
        skill.targeting.radius_units = 3;
        assert_eq!(resolve(&world, sender, &skill), vec![inside]);

        skill.targeting.include_self = true;
        assert_eq!(resolve(&world, sender, &skill), vec![sender, inside]);
    }

    #[test]
    fn test_in_zone_only_current_focusers() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 0);
        let other = unit(&mut world, Team::Blue, 6, 0);
        let focuser = unit(&mut world, Team::Red, 0, -3);
        let elsewhere = unit(&mut world, Team::Red, 3, -3);
        let idle = unit(&mut world, Team::Red, -3, 0);
        world.get_mut(focuser).unwrap().focus = Some(sender);
        world.get_mut(elsewhere).unwrap().focus = Some(other);

        let mut skill = skill(SkillTargetingType::InZone, AllegianceType::Enemy);
        skill.targeting.radius_units = 5;
        skill.targeting.only_current_focusers = true;
        assert_eq!(resolve(&world, sender, &skill), vec![focuser, idle]);
    }

    #[test]
    fn test_shield_sender_targets_from_owner() {
        let mut world = world();
        let owner = unit(&mut world, Team::Blue, 0, 5);
        let near = unit(&mut world, Team::Red, 0, -1);
        let far = unit(&mut world, Team::Red, 0, -6);
        let ally = unit(&mut world, Team::Blue, 3, 3);
        let mut shield = Entity::new(INVALID_ENTITY_ID);
        shield.kind = EntityKind::Shield { owner };
        shield.team = Team::Blue;
        let shield = world.spawn(shield);

        let mut closest = skill(SkillTargetingType::DistanceCheck, AllegianceType::Enemy);
        closest.targeting.num = 1;
        closest.targeting.lowest = true;
        assert_eq!(resolve(&world, owner, &closest), vec![near]);
        assert_eq!(resolve(&world, shield, &closest), vec![near]);

        let allies = skill(SkillTargetingType::Allegiance, AllegianceType::Ally);
        assert_eq!(resolve(&world, shield, &allies), vec![ally]);

        world.get_mut(owner).unwrap().filtering = Some(FilteringState {
            only_new_targets: true,
            prioritize_new_targets: false,
            old_targets: [near].into_iter().collect(),
        });
        assert_eq!(resolve(&world, shield, &closest), vec![far]);
    }

    #[test]
    fn test_filter_prioritizes_new_targets() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let a = unit(&mut world, Team::Red, 0, -1);
        let b = unit(&mut world, Team::Red, 0, -2);
        let c = unit(&mut world, Team::Red, 0, -3);
        world.get_mut(sender).unwrap().filtering = Some(FilteringState {
            only_new_targets: false,
            prioritize_new_targets: true,
            old_targets: [a].into_iter().collect(),
        });

        let engine = TargetingEngine::new(&world);
        let ignored = BTreeSet::new();
        assert_eq!(engine.filter_receivers(sender, &[a, b, c], 2, &ignored), vec![b, c]);
        assert_eq!(engine.filter_receivers(sender, &[a, b, c], 3, &ignored), vec![b, c, a]);
        assert_eq!(engine.filter_receivers(sender, &[a, b, c], 0, &ignored), vec![b, c]);

        world.get_mut(sender).unwrap().filtering.as_mut().unwrap().only_new_targets = true;
        let engine = TargetingEngine::new(&world);
        assert_eq!(engine.filter_receivers(sender, &[a, b, c], 3, &ignored), vec![b, c]);
    }

    #[test]
    fn test_filter_drops_ignored() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let a = unit(&mut world, Team::Red, 0, -1);
        let b = unit(&mut world, Team::Red, 0, -2);
        let ignored: BTreeSet<_> = [a].into_iter().collect();
        let engine = TargetingEngine::new(&world);
        assert_eq!(engine.filter_receivers(sender, &[a, b], 1, &ignored), vec![b]);
        assert!(engine.filter_receivers(99, &[a, b], 0, &ignored).is_empty());
    }

    #[test]
    fn test_combat_stat_check_highest() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let weak = unit(&mut world, Team::Red, 0, -1);
        let strong = unit(&mut world, Team::Red, 0, -2);
        world.get_mut(weak).unwrap().stats.set(StatType::AttackDamage, Fixed::from_num(5));
        world.get_mut(strong).unwrap().stats.set(StatType::AttackDamage, Fixed::from_num(50));

        let mut skill = skill(SkillTargetingType::CombatStatCheck, AllegianceType::Enemy);
        skill.targeting.stat_type = Some(StatType::AttackDamage);
        skill.targeting.num = 1;
        assert_eq!(resolve(&world, sender, &skill), vec![strong]);
        skill.targeting.lowest = true;
        assert_eq!(resolve(&world, sender, &skill), vec![weak]);
    }

    #[test]
    fn test_untargetable_enemy_skipped_but_ally_kept() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let ally = unit(&mut world, Team::Blue, 2, 5);
        let enemy = unit(&mut world, Team::Red, 0, -5);
        world.get_mut(ally).unwrap().untargetable = true;
        world.get_mut(enemy).unwrap().untargetable = true;

        let skill = skill(SkillTargetingType::Allegiance, AllegianceType::All);
        assert_eq!(resolve(&world, sender, &skill), vec![ally]);
    }

    #[test]
    fn test_guidance_filters_airborne_enemies() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let flying = unit(&mut world, Team::Red, 0, -5);
        let walking = unit(&mut world, Team::Red, 2, -5);
        let mut lift = EffectData::buff(StatType::AttackDamage, Fixed::ZERO);
        lift.plane_change = PlaneChange::Airborne;
        world
            .get_mut(flying)
            .unwrap()
            .attached_effects
            .add(crate::components::AttachedEffect::from_data(&lift, sender, sender));

        let mut skill = skill(SkillTargetingType::Allegiance, AllegianceType::Enemy);
        assert_eq!(resolve(&world, sender, &skill), vec![walking]);

        skill.targeting.guidance = Guidance::GROUND | Guidance::AIRBORNE;
        assert_eq!(resolve(&world, sender, &skill), vec![flying, walking]);
    }

    #[test]
    fn test_synergy_filters() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let a = unit(&mut world, Team::Blue, 2, 5);
        let b = unit(&mut world, Team::Blue, 4, 5);
        let fire = crate::data::CombatSynergy("Fire".to_string());
        world.get_mut(a).unwrap().synergies.insert(fire.clone());

        let mut with = skill(SkillTargetingType::Synergy, AllegianceType::Ally);
        with.targeting.combat_synergy = Some(fire.clone());
        assert_eq!(resolve(&world, sender, &with), vec![a]);

        let mut without = skill(SkillTargetingType::Synergy, AllegianceType::Ally);
        without.targeting.not_combat_synergy = Some(fire);
        assert_eq!(resolve(&world, sender, &without), vec![b]);
    }

    #[test]
    fn test_tier_excludes_rangers_and_picks_randomly() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let mut ids = Vec::new();
        for q in 0..4 {
            let id = unit(&mut world, Team::Red, q * 3, -5);
            world.get_mut(id).unwrap().kind = EntityKind::CombatUnit(CombatUnit {
                is_pet: false,
                is_ranger: q == 3,
                tier: 2,
            });
            ids.push(id);
        }

        let mut skill = skill(SkillTargetingType::Tier, AllegianceType::Enemy);
        skill.targeting.tier = 2;
        assert_eq!(resolve(&world, sender, &skill), ids[..3].to_vec());

        skill.targeting.num = 2;
        let picked = resolve(&world, sender, &skill);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|id| ids[..3].contains(id)));
        assert_eq!(picked, resolve(&world, sender, &skill));
    }

    #[test]
    fn test_previous_target_list() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let enemy = unit(&mut world, Team::Red, 0, -5);
        let gone = unit(&mut world, Team::Red, 3, -5);
        world.get_mut(gone).unwrap().active = false;

        let data = Arc::new(AbilityData {
            skills: vec![Arc::new(SkillData::default()), Arc::new(SkillData::default())],
            total_duration_ms: 1000,
            ..AbilityData::default()
        });
        let mut ability = AbilityState::new(data, AbilityType::Attack, 0);
        let skill = skill(SkillTargetingType::PreviousTargetList, AllegianceType::Enemy);
        let engine = TargetingEngine::new(&world);
        let mut rng = SeededRandom::new(1);
        let ignored = BTreeSet::new();

        let first = engine.resolve_skill_targets(&mut rng, sender, Some(&ability), &skill, &ignored);
        assert_eq!(first.receiver_ids, vec![sender]);

        ability.skills[0].targeting_state.available_targets = [enemy, gone].into_iter().collect();
        ability.increment_current_skill_index();
        let second = engine.resolve_skill_targets(&mut rng, sender, Some(&ability), &skill, &ignored);
        assert_eq!(second.receiver_ids, vec![enemy]);

        assert!(engine
            .resolve_skill_targets(&mut rng, sender, None, &skill, &ignored)
            .receiver_ids
            .is_empty());
    }

    #[test]
    fn test_activator_uses_receiver_on_dodge() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let attacker = unit(&mut world, Team::Red, 0, -5);

        let mut data = AbilityData::default();
        data.activation_trigger_data.trigger_type = ActivationTriggerType::OnDodge;
        let mut ability = AbilityState::new(Arc::new(data), AbilityType::Innate, 0);
        ability.push_activator_context(ActivatorContext {
            sender_combat_unit_entity_id: sender,
            receiver_combat_unit_entity_id: attacker,
            trigger: ActivationTriggerType::OnDodge,
            ..ActivatorContext::default()
        });

        let skill = skill(SkillTargetingType::Activator, AllegianceType::Enemy);
        let result = TargetingEngine::new(&world).resolve_skill_targets(
            &mut SeededRandom::new(1),
            sender,
            Some(&ability),
            &skill,
            &BTreeSet::new(),
        );
        assert_eq!(result.receiver_ids, vec![attacker]);
    }

    #[test]
    fn test_pets_of_sender() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let pet = unit(&mut world, Team::Blue, 3, 5);
        let stray = unit(&mut world, Team::Blue, 6, 5);
        for id in [pet, stray] {
            let entity = world.get_mut(id).unwrap();
            entity.kind = EntityKind::CombatUnit(CombatUnit {
                is_pet: true,
                ..CombatUnit::default()
            });
        }
        world.get_mut(pet).unwrap().parent = Some(sender);

        assert_eq!(resolve(&world, sender, &skill(SkillTargetingType::Pets, AllegianceType::Self_)), vec![pet]);
        assert_eq!(
            resolve(&world, sender, &skill(SkillTargetingType::Pets, AllegianceType::Ally)),
            vec![pet, stray]
        );
    }

    #[test]
    fn test_vanquisher_and_focus() {
        let mut world = world();
        let sender = unit(&mut world, Team::Blue, 0, 5);
        let enemy = unit(&mut world, Team::Red, 0, -5);
        assert!(resolve(&world, sender, &skill(SkillTargetingType::Vanquisher, AllegianceType::Enemy)).is_empty());
        assert!(resolve(&world, sender, &skill(SkillTargetingType::CurrentFocus, AllegianceType::Enemy)).is_empty());

        world.get_mut(sender).unwrap().vanquisher = Some(enemy);
        world.get_mut(sender).unwrap().focus = Some(enemy);
        assert_eq!(resolve(&world, sender, &skill(SkillTargetingType::Vanquisher, AllegianceType::Enemy)), vec![enemy]);
        assert_eq!(resolve(&world, sender, &skill(SkillTargetingType::CurrentFocus, AllegianceType::Enemy)), vec![enemy]);
    }

    #[test]
    fn test_select_random_entities_bounds() {
        let mut rng = SeededRandom::new(3);
        assert_eq!(select_random_entities(&mut rng, vec![1, 2, 3], 0), vec![1, 2, 3]);
        assert_eq!(select_random_entities(&mut rng, vec![1, 2, 3], 5), vec![1, 2, 3]);
        let picked = select_random_entities(&mut rng, vec![1, 2, 3, 4, 5], 3);
        let unique: BTreeSet<_> = picked.iter().copied().collect();
        assert_eq!(picked.len(), 3);
        assert_eq!(unique.len(), 3);
    }
}
