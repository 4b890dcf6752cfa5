//! The battle tick driver.
//!
//! A [`Battle`] owns the [`World`], the [`AuraSystem`], the random stream
//! and the event log. Every [`Battle::tick`] runs the systems in a fixed
//! order over entities in id order, so equal inputs give equal states:
//!
//! 1. Battle start: queue `OnBattleStart` innate abilities (first tick only).
//! 2. Periodic triggers: queue `EveryXTime` innate abilities.
//! 3. Abilities: start the next ability of idle units, advance active ones,
//!    deploy skills and apply their effect packages.
//! 4. Triggers raised while deploying are queued on their owners.
//! 5. Timed effects past their duration are removed.
//! 6. Auras are refreshed or destroyed.
//! 7. The time step advances.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::abilities::{
    AbilitiesComponent, AbilityRef, AbilityState, AbilityType, ActivatorContext, SelectionPolicy, SkillStateType,
};
use crate::aura::AuraSystem;
use crate::components::{AttachedEffect, EntityId, INVALID_ENTITY_ID};
use crate::config::{BattleConfig, Scenario};
use crate::data::{ActivationTriggerType, EffectData, EffectType, SkillData, StatType};
use crate::error::{BattleError, Result};
use crate::grid::ObstacleBuildParams;
use crate::math::Fixed;
use crate::targeting::TargetingEngine;
use crate::time::MS_PER_TIME_STEP;
use crate::world::{BattleEvent, EventSink, SeededRandom, StatsSource, World};

/// A trigger raised during a tick, queued on its owner after the ability pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PendingTrigger {
    entity: EntityId,
    trigger: ActivationTriggerType,
    context: ActivatorContext,
}

/// One battle: world, auras, randomness and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    world: World,
    auras: AuraSystem,
    rng: SeededRandom,
    config: BattleConfig,
    events: Vec<BattleEvent>,
    pending_triggers: Vec<PendingTrigger>,
}

impl Battle {
    /// Battle over an existing world.
    #[must_use]
    pub fn new(world: World, config: BattleConfig) -> Self {
        Self {
            world,
            auras: AuraSystem::new(),
            rng: SeededRandom::new(config.random_seed),
            config,
            events: Vec::new(),
            pending_triggers: Vec::new(),
        }
    }

    /// Battle with every unit of `scenario` placed.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidGridConfig`] when the config is invalid.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        Ok(Self::new(scenario.build_world()?, scenario.config.clone()))
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world, for setup and tests.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Aura bookkeeping.
    #[must_use]
    pub const fn auras(&self) -> &AuraSystem {
        &self.auras
    }

    /// Settings the battle was built from.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Every event emitted so far.
    #[must_use]
    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    /// Current time step.
    #[must_use]
    pub const fn time_step(&self) -> i32 {
        self.world.time_step()
    }

    /// Advance the battle by one time step and return its events.
    pub fn tick(&mut self) -> &[BattleEvent] {
        let first_event = self.events.len();
        let time_step = self.world.time_step();
        let entity_ids = self.world.entities().sorted_ids();

        if !self.world.battle_started() {
            self.world.set_battle_started(true);
            for &id in &entity_ids {
                self.raise_trigger(id, ActivationTriggerType::OnBattleStart, ActivatorContext::default());
            }
            self.flush_triggers();
        }
        self.raise_periodic_triggers(&entity_ids, time_step);
        self.flush_triggers();

        for &id in &entity_ids {
            self.run_abilities(id);
        }
        self.flush_triggers();

        self.remove_expired_effects(&entity_ids, time_step);
        self.auras.run(&mut self.world, &mut self.events);
        self.world.advance_time_step();

        if cfg!(any(debug_assertions, feature = "debug-validation")) {
            tracing::debug!(
                tick = time_step,
                events = self.events.len() - first_event,
                hash = self.state_hash(),
                "Tick finished"
            );
        }
        &self.events[first_event..]
    }

    /// Activate `ability` of `entity` now.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::EntityNotFound`] for unknown entities and
    /// [`BattleError::InvalidState`] when the entity has no such ability or
    /// another ability is running.
    pub fn activate_ability(&mut self, entity: EntityId, ability: AbilityRef) -> Result<()> {
        let time_step = self.world.time_step();
        let unit = self
            .world
            .get_mut(entity)
            .ok_or(BattleError::EntityNotFound(entity))?;
        let abilities = unit
            .abilities
            .as_mut()
            .ok_or_else(|| BattleError::InvalidState(format!("Entity {entity} has no abilities")))?;
        if abilities.has_active_ability() {
            return Err(BattleError::InvalidState(format!(
                "Entity {entity} already runs an ability"
            )));
        }
        if !abilities.on_ability_activated(ability, time_step) {
            return Err(BattleError::InvalidState(format!(
                "Entity {entity} has no ability {ability:?}"
            )));
        }
        self.events.emit(BattleEvent::AbilityActivated {
            entity,
            ability_type: ability.ability_type,
            index: ability.index,
        });
        Ok(())
    }

    /// Queue every innate ability of `entity` listening to `trigger`.
    ///
    /// Abilities past their activation limits are skipped. Vanquish triggers
    /// count towards the ability's trigger counter first. Returns how many
    /// abilities were queued.
    pub fn queue_trigger(
        &mut self,
        entity: EntityId,
        trigger: ActivationTriggerType,
        context: ActivatorContext,
    ) -> usize {
        let time_step = self.world.time_step();
        let Some(abilities) = self.world.get_mut(entity).and_then(|e| e.abilities.as_mut()) else {
            return 0;
        };
        let mut queued = 0;
        for ability in abilities.innate_abilities_for_trigger(trigger) {
            let Some(state) = abilities.ability_mut(ability) else {
                continue;
            };
            if !is_within_activation_limits(state, time_step) {
                continue;
            }
            if trigger == ActivationTriggerType::OnVanquish {
                state.trigger_counter += 1;
            }
            if !state.can_activate_by_trigger_counter() {
                continue;
            }
            if !abilities.add_innate_waiting_activation(ability) {
                continue;
            }
            if let Some(state) = abilities.ability_mut(ability) {
                state.push_activator_context(ActivatorContext { trigger, ..context });
            }
            queued += 1;
        }
        if queued > 0 {
            tracing::debug!(entity, ?trigger, queued, "Innate abilities queued");
        }
        queued
    }

    fn raise_trigger(&mut self, entity: EntityId, trigger: ActivationTriggerType, context: ActivatorContext) {
        self.pending_triggers.push(PendingTrigger {
            entity,
            trigger,
            context,
        });
    }

    fn flush_triggers(&mut self) {
        for pending in std::mem::take(&mut self.pending_triggers) {
            self.queue_trigger(pending.entity, pending.trigger, pending.context);
        }
    }

    fn raise_periodic_triggers(&mut self, entity_ids: &[EntityId], time_step: i32) {
        if time_step == 0 {
            return;
        }
        for &id in entity_ids {
            let Some(abilities) = self.world.entities().get_active(id).and_then(|e| e.abilities.as_ref()) else {
                continue;
            };
            let due = abilities
                .innate_abilities_for_trigger(ActivationTriggerType::EveryXTime)
                .into_iter()
                .filter_map(|ability| abilities.ability(ability))
                .any(|state| state.activate_every_time_steps > 0 && time_step % state.activate_every_time_steps == 0);
            if due {
                self.raise_trigger(id, ActivationTriggerType::EveryXTime, ActivatorContext::default());
            }
        }
    }

    fn run_abilities(&mut self, id: EntityId) {
        let Some(entity) = self.world.get_mut(id) else {
            return;
        };
        if !entity.active {
            return;
        }
        let Some(mut abilities) = entity.abilities.take() else {
            return;
        };

        if !abilities.has_active_ability() {
            self.start_next_ability(id, &mut abilities);
        }
        if abilities.has_active_ability() {
            self.advance_active_ability(id, &mut abilities);
        }

        if let Some(entity) = self.world.get_mut(id) {
            entity.abilities = Some(abilities);
        }
    }

    /// Queued instant innates first, then queued innates, then an attack on
    /// a live focus.
    fn start_next_ability(&mut self, id: EntityId, abilities: &mut AbilitiesComponent) {
        let next = abilities
            .pop_instant_innate_waiting_activation()
            .or_else(|| abilities.pop_innate_waiting_activation())
            .or_else(|| {
                let focus = self.world.get(id).and_then(|e| e.focus)?;
                self.world.entities().get_active(focus)?;
                abilities.choose_attack_ability(&SelectionPolicy::new(&self.world), id)
            });
        let Some(ability) = next else {
            return;
        };
        if abilities.on_ability_activated(ability, self.world.time_step()) {
            tracing::debug!(entity = id, ability = ?ability, "Ability activated");
            self.events.emit(BattleEvent::AbilityActivated {
                entity: id,
                ability_type: ability.ability_type,
                index: ability.index,
            });
        }
    }

    fn advance_active_ability(&mut self, id: EntityId, abilities: &mut AbilitiesComponent) {
        loop {
            let Some(ability) = abilities.active_ability_mut() else {
                return;
            };
            let Some(skill) = ability.current_skill() else {
                break;
            };
            match skill.state {
                SkillStateType::None | SkillStateType::Waiting => {
                    let is_instant = skill.is_instant();
                    // Zero-length skills have no window, they go out as soon as they are reached.
                    let can_deploy = ability.can_deploy_current_skill_instantly()
                        && (ability.is_instant() || is_instant || ability.can_deploy_current_skill());
                    if !can_deploy {
                        if let Some(skill) = ability.current_skill_mut() {
                            skill.state = SkillStateType::Waiting;
                        }
                        break;
                    }
                    self.deploy_current_skill(id, abilities);
                    if !is_instant {
                        break;
                    }
                    if let Some(ability) = abilities.active_ability_mut() {
                        ability.increment_current_skill_index();
                    }
                }
                SkillStateType::Deploying | SkillStateType::Channeling => {
                    let channeling = ability.can_channel_current_skill();
                    if let Some(skill) = ability.current_skill_mut() {
                        skill.state = if channeling {
                            SkillStateType::Channeling
                        } else {
                            SkillStateType::Deploying
                        };
                    }
                    break;
                }
                SkillStateType::Finished => break,
            }
        }

        let Some(ability) = abilities.active_ability_mut() else {
            return;
        };
        if !ability.is_finished() {
            ability.increase_current_time_ms(MS_PER_TIME_STEP);
        }
        if ability.is_finished() {
            if let Some(finished) = abilities.deactivate_active_ability() {
                tracing::debug!(entity = id, ability = ?finished, "Ability finished");
                self.events.emit(BattleEvent::AbilityDeactivated {
                    entity: id,
                    ability_type: finished.ability_type,
                    index: finished.index,
                });
            }
        }
    }

    /// Resolve the current skill's receivers and apply its effect package.
    fn deploy_current_skill(&mut self, id: EntityId, abilities: &mut AbilitiesComponent) {
        let crit_chance = self.world.live_stat(id, StatType::CritChancePercentage).to_num::<i32>();
        let Some(ability) = abilities.active_ability_mut() else {
            return;
        };
        let ability_type = ability.ability_type;
        let Some(skill_data) = ability.current_skill().map(|skill| Arc::clone(&skill.data)) else {
            return;
        };

        let result = TargetingEngine::new(&self.world).resolve_skill_targets(
            &mut self.rng,
            id,
            Some(&*ability),
            &skill_data,
            &BTreeSet::new(),
        );
        let Some(skill) = ability.current_skill_mut() else {
            return;
        };
        skill.targeting_state.create_from_find_result(&self.world, &result);
        skill.is_deployed = true;
        skill.state = if skill.channel_time_ms > 0 {
            SkillStateType::Channeling
        } else {
            SkillStateType::Deploying
        };
        let is_critical = skill.roll_critical(&mut self.rng, crit_chance);
        let skill_index = skill.index;
        let receivers: Vec<EntityId> = result
            .receiver_ids
            .iter()
            .copied()
            .filter(|receiver| skill.targeting_state.available_targets.contains(receiver))
            .collect();

        abilities.increment_deployed_skills_count(ability_type);
        tracing::debug!(
            entity = id,
            skill = %skill_data.name,
            receivers = receivers.len(),
            critical = is_critical,
            "Skill deployed"
        );
        self.events.emit(BattleEvent::SkillDeployed {
            entity: id,
            skill_index,
            receivers: receivers.clone(),
        });

        let sender = if result.true_sender_id == INVALID_ENTITY_ID {
            id
        } else {
            result.true_sender_id
        };
        for &receiver in &receivers {
            self.apply_effect_package(sender, receiver, ability_type, &skill_data, is_critical);
            if receiver == id {
                abilities.increment_received_effect_packages_count(ability_type);
            } else if let Some(other) = self.world.get_mut(receiver).and_then(|e| e.abilities.as_mut()) {
                other.increment_received_effect_packages_count(ability_type);
            }
        }
    }

    fn apply_effect_package(
        &mut self,
        sender: EntityId,
        receiver: EntityId,
        ability_type: AbilityType,
        skill: &SkillData,
        is_critical: bool,
    ) {
        for effect in &skill.effect_package.effects {
            match effect.effect_type {
                EffectType::Buff | EffectType::Debuff | EffectType::PlaneChange => {
                    self.attach_effect(sender, receiver, effect);
                }
                EffectType::Aura => {
                    AuraSystem::spawn_aura(&mut self.world, sender, receiver, effect, &mut self.events);
                }
                EffectType::InstantDamage => {
                    self.apply_damage(sender, receiver, ability_type, effect.value, is_critical);
                }
                EffectType::InstantHeal => self.apply_heal(receiver, effect.value),
                EffectType::Blink => self.blink_behind(sender, receiver),
            }
        }
    }

    fn attach_effect(&mut self, sender: EntityId, receiver: EntityId, effect: &EffectData) {
        let time_step = self.world.time_step();
        let Some(entity) = self.world.get_mut(receiver) else {
            return;
        };
        entity
            .attached_effects
            .add(AttachedEffect::from_data(effect, sender, sender).timed(effect, time_step));
        self.events.emit(BattleEvent::EffectApplied {
            sender,
            receiver,
            attached_from: sender,
        });
    }

    /// Critical hits deal double damage.
    fn apply_damage(
        &mut self,
        sender: EntityId,
        receiver: EntityId,
        ability_type: AbilityType,
        value: Fixed,
        is_critical: bool,
    ) {
        let amount = if is_critical { value.saturating_mul(Fixed::from_num(2)) } else { value };
        let Some(entity) = self.world.get_mut(receiver) else {
            return;
        };
        let health = entity.stats.get(StatType::CurrentHealth).saturating_sub(amount);
        entity.stats.set(StatType::CurrentHealth, health);

        let context = ActivatorContext {
            sender_entity_id: sender,
            sender_combat_unit_entity_id: sender,
            receiver_entity_id: receiver,
            receiver_combat_unit_entity_id: receiver,
            ability_type: Some(ability_type),
            ..ActivatorContext::default()
        };
        self.raise_trigger(sender, ActivationTriggerType::OnHit, context);
        self.raise_trigger(receiver, ActivationTriggerType::OnDamage, context);
        if is_critical {
            self.raise_trigger(sender, ActivationTriggerType::OnDealCrit, context);
        }

        if self.world.live_stat(receiver, StatType::CurrentHealth) > Fixed::ZERO {
            return;
        }
        let Some(entity) = self.world.get_mut(receiver) else {
            return;
        };
        if !entity.active {
            return;
        }
        entity.active = false;
        entity.vanquisher = Some(sender);
        tracing::debug!(receiver, vanquisher = sender, "Unit vanquished");
        self.raise_trigger(sender, ActivationTriggerType::OnVanquish, context);
        self.raise_trigger(receiver, ActivationTriggerType::OnFaint, context);
    }

    /// Heals never raise health above max health.
    fn apply_heal(&mut self, receiver: EntityId, value: Fixed) {
        let max = self.world.live_stat(receiver, StatType::MaxHealth);
        let Some(entity) = self.world.get_mut(receiver) else {
            return;
        };
        let health = entity.stats.get(StatType::CurrentHealth).saturating_add(value);
        entity.stats.set(StatType::CurrentHealth, health.min(max));
    }

    /// Move `sender` to the open position behind `receiver`.
    fn blink_behind(&mut self, sender: EntityId, receiver: EntityId) {
        let Some(target) = self.world.get(receiver).and_then(|e| e.hex_position()) else {
            return;
        };
        let Some(source) = self.world.get(sender).and_then(|e| e.position) else {
            return;
        };
        self.world.rebuild_obstacles(&ObstacleBuildParams::for_source(sender));
        let landing = self
            .world
            .grid()
            .open_position_behind(source.position, target, source.radius, 0);
        if !landing.is_valid() {
            tracing::warn!(sender, receiver, "No open position to blink to");
            return;
        }
        if let Some(position) = self.world.get_mut(sender).and_then(|e| e.position.as_mut()) {
            position.position = landing;
        }
        tracing::debug!(sender, q = landing.q, r = landing.r, "Blinked");
    }

    fn remove_expired_effects(&mut self, entity_ids: &[EntityId], time_step: i32) {
        for &receiver in entity_ids {
            let Some(entity) = self.world.get_mut(receiver) else {
                continue;
            };
            for attached_from in entity.attached_effects.remove_expired(time_step) {
                self.events.emit(BattleEvent::EffectRemoved {
                    receiver,
                    attached_from,
                });
            }
        }
    }

    /// Hash of the simulation state, equal for equal states.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.world.time_step().hash(&mut hasher);

        let ids = self.world.entities().sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            let Some(entity) = self.world.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            entity.active.hash(&mut hasher);
            entity.team.hash(&mut hasher);

            if let Some(position) = entity.position {
                position.position.q.hash(&mut hasher);
                position.position.r.hash(&mut hasher);
                position.radius.hash(&mut hasher);
            }

            for (stat, value) in entity.stats.iter() {
                stat.hash(&mut hasher);
                value.to_bits().hash(&mut hasher);
            }

            entity.attached_effects.len().hash(&mut hasher);
            for effect in entity.attached_effects.iter() {
                effect.attached_from.hash(&mut hasher);
                effect.value.to_bits().hash(&mut hasher);
            }

            if let Some(abilities) = &entity.abilities {
                abilities.active_ability_ref().hash(&mut hasher);
                if let Some(active) = abilities.active_ability() {
                    active.current_ability_time_ms().hash(&mut hasher);
                    active.current_skill_index().hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }

    /// Snapshot of the whole battle.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::Snapshot`] if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BattleError::Snapshot(format!("Failed to serialize battle: {e}")))
    }

    /// Restore a battle from [`Battle::serialize`] output.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::Snapshot`] if the bytes are not a snapshot.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| BattleError::Snapshot(format!("Failed to deserialize battle: {e}")))
    }
}

/// Use-once, max activations, cooldown and the activation time window.
fn is_within_activation_limits(state: &AbilityState, time_step: i32) -> bool {
    let trigger = &state.data.activation_trigger_data;
    if state.data.is_use_once && state.activation_count > 0 {
        return false;
    }
    if trigger.max_activations > 0 && state.activation_count >= trigger.max_activations {
        return false;
    }
    if state.activation_cooldown_time_steps > 0
        && state.activation_count > 0
        && time_step - state.last_activation_time_step < state.activation_cooldown_time_steps
    {
        return false;
    }
    state.activation_time_limit_time_steps <= 0 || time_step <= state.activation_time_limit_time_steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Entity;
    use crate::data::{
        AbilitiesData, AbilityActivationTriggerData, AbilityData, AllegianceType, EffectPackage, SkillTargetingType,
    };
    use crate::grid_config::{HexGridConfig, Team};
    use crate::hex::HexGridPosition;
    use crate::time::TIME_INFINITE;

    fn battle() -> Battle {
        let world = World::new(HexGridConfig::new(21, 21).unwrap(), 10, 0).unwrap();
        Battle::new(world, BattleConfig::default())
    }

    fn skill(targeting_type: SkillTargetingType, effects: Vec<EffectData>) -> Arc<SkillData> {
        let mut skill = SkillData::default();
        skill.targeting.targeting_type = targeting_type;
        skill.targeting.group = AllegianceType::Enemy;
        skill.targeting.num = 1;
        skill.effect_package = EffectPackage {
            effects,
            always_crit: false,
        };
        Arc::new(skill)
    }

    fn ability(total_duration_ms: i32, trigger: ActivationTriggerType, skills: Vec<Arc<SkillData>>) -> Arc<AbilityData> {
        Arc::new(AbilityData {
            total_duration_ms,
            skills,
            activation_trigger_data: AbilityActivationTriggerData {
                trigger_type: trigger,
                ..AbilityActivationTriggerData::default()
            },
            ..AbilityData::default()
        })
    }

    fn group(abilities: Vec<Arc<AbilityData>>) -> AbilitiesData {
        AbilitiesData {
            abilities,
            ..AbilitiesData::default()
        }
    }

    fn damage(value: i32) -> EffectData {
        EffectData {
            effect_type: EffectType::InstantDamage,
            value: Fixed::from_num(value),
            ..EffectData::default()
        }
    }

    fn unit(battle: &mut Battle, team: Team, q: i32, r: i32, health: i32) -> EntityId {
        let mut entity = Entity::combat_unit(team, HexGridPosition::new(q, r), 1);
        entity.stats.set(StatType::MaxHealth, Fixed::from_num(health));
        entity.stats.set(StatType::CurrentHealth, Fixed::from_num(health));
        battle.world_mut().spawn(entity)
    }

    fn give(battle: &mut Battle, id: EntityId, attack: AbilitiesData, innate: AbilitiesData) {
        battle.world_mut().get_mut(id).unwrap().abilities =
            Some(AbilitiesComponent::from_data(attack, AbilitiesData::default(), innate));
    }

    #[test]
    fn test_attack_on_focus_deals_damage() {
        let mut battle = battle();
        let attacker = unit(&mut battle, Team::Blue, 0, 3, 100);
        let target = unit(&mut battle, Team::Red, 0, -3, 100);
        let attack = ability(100, ActivationTriggerType::None, vec![skill(SkillTargetingType::CurrentFocus, vec![damage(30)])]);
        give(&mut battle, attacker, group(vec![attack]), AbilitiesData::default());
        battle.world_mut().get_mut(attacker).unwrap().focus = Some(target);

        let events = battle.tick().to_vec();
        assert!(events.contains(&BattleEvent::AbilityActivated {
            entity: attacker,
            ability_type: AbilityType::Attack,
            index: 0
        }));
        assert!(events.contains(&BattleEvent::SkillDeployed {
            entity: attacker,
            skill_index: 0,
            receivers: vec![target]
        }));
        assert!(events.contains(&BattleEvent::AbilityDeactivated {
            entity: attacker,
            ability_type: AbilityType::Attack,
            index: 0
        }));
        assert_eq!(battle.world().live_stat(target, StatType::CurrentHealth), Fixed::from_num(70));
        assert_eq!(battle.time_step(), 1);
    }

    #[test]
    fn test_vanquish_deactivates_and_stops_attacks() {
        let mut battle = battle();
        let attacker = unit(&mut battle, Team::Blue, 0, 3, 100);
        let target = unit(&mut battle, Team::Red, 0, -3, 50);
        let attack = ability(100, ActivationTriggerType::None, vec![skill(SkillTargetingType::CurrentFocus, vec![damage(30)])]);
        give(&mut battle, attacker, group(vec![attack]), AbilitiesData::default());
        battle.world_mut().get_mut(attacker).unwrap().focus = Some(target);

        battle.tick();
        battle.tick();
        let fallen = battle.world().get(target).unwrap();
        assert!(!fallen.active);
        assert_eq!(fallen.vanquisher, Some(attacker));

        let events = battle.tick().to_vec();
        assert!(events.is_empty());
    }

    #[test]
    fn test_battle_start_innate_runs_on_first_tick() {
        let mut battle = battle();
        let caster = unit(&mut battle, Team::Blue, 0, 3, 100);
        let mut buff = EffectData::buff(StatType::AttackDamage, Fixed::from_num(5));
        buff.duration_ms = TIME_INFINITE;
        let mut self_skill = SkillData::default();
        self_skill.targeting.targeting_type = SkillTargetingType::Self_;
        self_skill.effect_package.effects = vec![buff];
        let innate = ability(0, ActivationTriggerType::OnBattleStart, vec![Arc::new(self_skill)]);
        give(&mut battle, caster, AbilitiesData::default(), group(vec![innate]));

        let events = battle.tick().to_vec();
        assert!(events.contains(&BattleEvent::EffectApplied {
            sender: caster,
            receiver: caster,
            attached_from: caster
        }));
        assert_eq!(battle.world().live_stat(caster, StatType::AttackDamage), Fixed::from_num(5));
        let abilities = battle.world().get(caster).unwrap().abilities.as_ref().unwrap();
        assert!(!abilities.has_active_ability());

        battle.tick();
        assert_eq!(battle.world().live_stat(caster, StatType::AttackDamage), Fixed::from_num(5));
    }

    #[test]
    fn test_timed_buff_expires() {
        let mut battle = battle();
        let caster = unit(&mut battle, Team::Blue, 0, 3, 100);
        let mut buff = EffectData::buff(StatType::AttackDamage, Fixed::from_num(5));
        buff.duration_ms = 200;
        let mut self_skill = SkillData::default();
        self_skill.targeting.targeting_type = SkillTargetingType::Self_;
        self_skill.effect_package.effects = vec![buff];
        let innate = ability(0, ActivationTriggerType::OnBattleStart, vec![Arc::new(self_skill)]);
        give(&mut battle, caster, AbilitiesData::default(), group(vec![innate]));

        for _ in 0..3 {
            battle.tick();
            assert_eq!(battle.world().live_stat(caster, StatType::AttackDamage), Fixed::from_num(5));
        }
        let events = battle.tick().to_vec();
        assert_eq!(battle.world().live_stat(caster, StatType::AttackDamage), Fixed::ZERO);
        assert!(events.contains(&BattleEvent::EffectRemoved {
            receiver: caster,
            attached_from: caster
        }));
    }

    #[test]
    fn test_heal_is_capped() {
        let mut battle = battle();
        let healer = unit(&mut battle, Team::Blue, 0, 3, 100);
        battle
            .world_mut()
            .get_mut(healer)
            .unwrap()
            .stats
            .set(StatType::CurrentHealth, Fixed::from_num(90));
        let heal = EffectData {
            effect_type: EffectType::InstantHeal,
            value: Fixed::from_num(25),
            ..EffectData::default()
        };
        let mut self_skill = SkillData::default();
        self_skill.targeting.targeting_type = SkillTargetingType::Self_;
        self_skill.effect_package.effects = vec![heal];
        let innate = ability(0, ActivationTriggerType::OnBattleStart, vec![Arc::new(self_skill)]);
        give(&mut battle, healer, AbilitiesData::default(), group(vec![innate]));

        battle.tick();
        assert_eq!(battle.world().live_stat(healer, StatType::CurrentHealth), Fixed::from_num(100));
    }

    #[test]
    fn test_truncated_omega_skill_deploys_and_finishes() {
        let mut battle = battle();
        let caster = unit(&mut battle, Team::Blue, 0, 3, 100);
        let mut self_skill = SkillData::default();
        self_skill.targeting.targeting_type = SkillTargetingType::Self_;
        self_skill.effect_package.effects = vec![EffectData::buff(StatType::AttackDamage, Fixed::from_num(5))];
        // 50ms rounds down to a 0ms skill inside a 50ms omega.
        let omega = ability(50, ActivationTriggerType::None, vec![Arc::new(self_skill)]);
        battle.world_mut().get_mut(caster).unwrap().abilities = Some(AbilitiesComponent::from_data(
            AbilitiesData::default(),
            group(vec![omega]),
            AbilitiesData::default(),
        ));
        let omega_ref = AbilityRef::new(AbilityType::Omega, 0);
        battle.activate_ability(caster, omega_ref).unwrap();

        let events = battle.tick().to_vec();
        assert_eq!(battle.world().live_stat(caster, StatType::AttackDamage), Fixed::from_num(5));
        assert!(events.contains(&BattleEvent::AbilityDeactivated {
            entity: caster,
            ability_type: AbilityType::Omega,
            index: 0
        }));
        let abilities = battle.world().get(caster).unwrap().abilities.as_ref().unwrap();
        assert!(!abilities.has_active_ability());
        assert!(battle.activate_ability(caster, omega_ref).is_ok());
    }

    #[test]
    fn test_rejected_trigger_keeps_no_context() {
        let mut battle = battle();
        let holder = unit(&mut battle, Team::Blue, 0, 3, 100);
        let attacker = unit(&mut battle, Team::Red, 0, -3, 100);
        let on_hit = ability(300, ActivationTriggerType::OnHit, vec![skill(SkillTargetingType::Activator, vec![damage(5)])]);
        give(&mut battle, holder, AbilitiesData::default(), group(vec![on_hit]));
        let context = ActivatorContext {
            sender_entity_id: attacker,
            sender_combat_unit_entity_id: attacker,
            receiver_entity_id: holder,
            receiver_combat_unit_entity_id: holder,
            ..ActivatorContext::default()
        };

        assert_eq!(battle.queue_trigger(holder, ActivationTriggerType::OnHit, context), 1);
        assert_eq!(battle.queue_trigger(holder, ActivationTriggerType::OnHit, context), 0);

        let abilities = battle.world().get(holder).unwrap().abilities.as_ref().unwrap();
        assert_eq!(abilities.innates_waiting_activation_len(), 1);
        let state = abilities.ability(AbilityRef::innate(0)).unwrap();
        assert_eq!(state.activator_contexts.len(), 1);
        assert_eq!(state.activator_contexts[0].trigger, ActivationTriggerType::OnHit);
    }

    #[test]
    fn test_periodic_innate_respects_max_activations() {
        let mut battle = battle();
        let caster = unit(&mut battle, Team::Blue, 0, 3, 100);
        let mut buff = EffectData::buff(StatType::AttackDamage, Fixed::from_num(5));
        buff.duration_ms = TIME_INFINITE;
        let mut self_skill = SkillData::default();
        self_skill.targeting.targeting_type = SkillTargetingType::Self_;
        self_skill.effect_package.effects = vec![buff];
        let innate = Arc::new(AbilityData {
            skills: vec![Arc::new(self_skill)],
            activation_trigger_data: AbilityActivationTriggerData {
                trigger_type: ActivationTriggerType::EveryXTime,
                activate_every_time_ms: 100,
                max_activations: 2,
                ..AbilityActivationTriggerData::default()
            },
            ..AbilityData::default()
        });
        give(&mut battle, caster, AbilitiesData::default(), group(vec![innate]));

        for _ in 0..6 {
            battle.tick();
        }
        assert_eq!(battle.world().live_stat(caster, StatType::AttackDamage), Fixed::from_num(10));
    }

    #[test]
    fn test_activate_ability_errors() {
        let mut battle = battle();
        let bare = unit(&mut battle, Team::Blue, 0, 3, 100);
        assert!(matches!(
            battle.activate_ability(99, AbilityRef::innate(0)),
            Err(BattleError::EntityNotFound(99))
        ));
        assert!(matches!(
            battle.activate_ability(bare, AbilityRef::innate(0)),
            Err(BattleError::InvalidState(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_hash() {
        let mut battle = battle();
        let attacker = unit(&mut battle, Team::Blue, 0, 3, 100);
        let target = unit(&mut battle, Team::Red, 0, -3, 100);
        let attack = ability(300, ActivationTriggerType::None, vec![skill(SkillTargetingType::CurrentFocus, vec![damage(10)])]);
        give(&mut battle, attacker, group(vec![attack]), AbilitiesData::default());
        battle.world_mut().get_mut(attacker).unwrap().focus = Some(target);
        battle.tick();

        let bytes = battle.serialize().unwrap();
        let mut restored = Battle::deserialize(&bytes).unwrap();
        assert_eq!(restored.state_hash(), battle.state_hash());

        battle.tick();
        restored.tick();
        assert_eq!(restored.state_hash(), battle.state_hash());
        assert!(Battle::deserialize(&[1, 2, 3]).is_err());
    }
}
