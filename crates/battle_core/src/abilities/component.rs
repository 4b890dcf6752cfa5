//! Per-entity container of the attack, omega and innate ability groups.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ability_state::AbilityState;
use super::selection::AbilitySelector;
use super::skill_state::SkillState;
use crate::components::EntityId;
use crate::data::{AbilitiesData, AbilityData, AbilityType, ActivationTriggerType, EffectType, SkillTargetingType};

/// Identifies one ability of a component: its group and its index in the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbilityRef {
    /// Group of the ability.
    pub ability_type: AbilityType,
    /// Index in the group.
    pub index: usize,
}

impl AbilityRef {
    /// Reference to `index` in `ability_type`.
    #[must_use]
    pub const fn new(ability_type: AbilityType, index: usize) -> Self {
        Self { ability_type, index }
    }

    /// Reference to an innate ability.
    #[must_use]
    pub const fn innate(index: usize) -> Self {
        Self::new(AbilityType::Innate, index)
    }
}

/// Runtime state of one ability group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilitiesState {
    /// One state per authored ability, same order.
    pub abilities: Vec<AbilityState>,
    /// Index of the last activated ability.
    pub current_ability_index: Option<usize>,
    /// Activations of any ability of the group.
    pub total_activations_count: i32,
}

impl AbilitiesState {
    fn from_data(data: &AbilitiesData, ability_type: AbilityType) -> Self {
        Self {
            abilities: data
                .abilities
                .iter()
                .enumerate()
                .map(|(index, ability)| AbilityState::new(Arc::clone(ability), ability_type, index))
                .collect(),
            current_ability_index: None,
            total_activations_count: 0,
        }
    }
}

/// Authored data and runtime state of one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityGroup {
    /// Authored abilities and selection rules.
    pub data: AbilitiesData,
    /// Runtime state.
    pub state: AbilitiesState,
}

/// Counters kept per ability group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityTypeStats {
    /// Effect packages received from abilities of the group.
    pub effect_packages_received: i32,
    /// Skills of the group deployed.
    pub skills_deployed: i32,
}

/// Abilities of a combat unit.
///
/// At most one ability is active at a time. Innate abilities waiting for
/// activation are queued in two FIFOs, instant ones separately, and an
/// ability is never queued twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilitiesComponent {
    groups: [AbilityGroup; 3],
    active_ability: Option<AbilityRef>,
    innate_waiting_activation: VecDeque<AbilityRef>,
    instant_innate_waiting_activation: VecDeque<AbilityRef>,
    innate_waiting_activation_set: BTreeSet<AbilityRef>,
    triggerable_abilities: BTreeMap<ActivationTriggerType, Vec<AbilityRef>>,
    ability_type_stats: BTreeMap<AbilityType, AbilityTypeStats>,
}

impl AbilitiesComponent {
    /// Component with no abilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Component built from the three groups' authored data.
    #[must_use]
    pub fn from_data(attack: AbilitiesData, omega: AbilitiesData, innate: AbilitiesData) -> Self {
        let mut component = Self::new();
        component.set_abilities_data(attack, AbilityType::Attack);
        component.set_abilities_data(omega, AbilityType::Omega);
        component.set_abilities_data(innate, AbilityType::Innate);
        component
    }

    /// Replace a group's data and rebuild its state.
    pub fn set_abilities_data(&mut self, data: AbilitiesData, ability_type: AbilityType) {
        let group = self.group_mut(ability_type);
        group.state = AbilitiesState::from_data(&data, ability_type);
        group.data = data;
        if self.active_ability.is_some_and(|active| active.ability_type == ability_type) {
            self.active_ability = None;
        }
        if ability_type == AbilityType::Innate {
            self.innate_waiting_activation.clear();
            self.instant_innate_waiting_activation.clear();
            self.innate_waiting_activation_set.clear();
            self.rebuild_triggerable_abilities();
        }
    }

    /// Fresh component with the same authored data and no runtime state.
    #[must_use]
    pub fn initial_copy(&self) -> Self {
        let mut component = Self::new();
        component.set_abilities_data(self.group(AbilityType::Attack).data.clone(), AbilityType::Attack);
        component.set_abilities_data(self.group(AbilityType::Omega).data.clone(), AbilityType::Omega);
        for ability in &self.group(AbilityType::Innate).data.abilities {
            component.add_innate_ability(Arc::clone(ability));
        }
        component
    }

    /// Data and state of a group.
    #[must_use]
    pub const fn group(&self, ability_type: AbilityType) -> &AbilityGroup {
        &self.groups[ability_type.index()]
    }

    /// Mutable data and state of a group.
    pub fn group_mut(&mut self, ability_type: AbilityType) -> &mut AbilityGroup {
        &mut self.groups[ability_type.index()]
    }

    /// States of a group's abilities.
    #[must_use]
    pub fn abilities(&self, ability_type: AbilityType) -> &[AbilityState] {
        &self.group(ability_type).state.abilities
    }

    /// State of one ability.
    #[must_use]
    pub fn ability(&self, ability: AbilityRef) -> Option<&AbilityState> {
        self.abilities(ability.ability_type).get(ability.index)
    }

    /// Mutable state of one ability.
    pub fn ability_mut(&mut self, ability: AbilityRef) -> Option<&mut AbilityState> {
        self.group_mut(ability.ability_type).state.abilities.get_mut(ability.index)
    }

    /// Whether the group has any ability.
    #[must_use]
    pub fn has_any_ability(&self, ability_type: AbilityType) -> bool {
        !self.abilities(ability_type).is_empty()
    }

    /// Whether `ability` names an existing ability.
    #[must_use]
    pub fn has_ability(&self, ability: AbilityRef) -> bool {
        ability.index < self.abilities(ability.ability_type).len()
    }

    /// Whether an ability is active.
    #[must_use]
    pub const fn has_active_ability(&self) -> bool {
        self.active_ability.is_some()
    }

    /// Reference to the active ability.
    #[must_use]
    pub const fn active_ability_ref(&self) -> Option<AbilityRef> {
        self.active_ability
    }

    /// Group of the active ability.
    #[must_use]
    pub fn active_ability_type(&self) -> Option<AbilityType> {
        self.active_ability.map(|active| active.ability_type)
    }

    /// Whether the omega ability is running.
    #[must_use]
    pub fn has_omega_active_ability(&self) -> bool {
        self.active_ability_type() == Some(AbilityType::Omega)
    }

    /// The active ability, `None` when idle.
    #[must_use]
    pub fn active_ability(&self) -> Option<&AbilityState> {
        let active = self.active_ability?;
        let state = self.ability(active);
        debug_assert!(state.is_some(), "active ability {active:?} out of range");
        state
    }

    /// Mutable active ability, `None` when idle.
    pub fn active_ability_mut(&mut self) -> Option<&mut AbilityState> {
        let active = self.active_ability?;
        debug_assert!(self.has_ability(active), "active ability {active:?} out of range");
        self.ability_mut(active)
    }

    /// Current skill of the active ability, `None` when idle or finished.
    #[must_use]
    pub fn active_skill(&self) -> Option<&SkillState> {
        self.active_ability().and_then(AbilityState::current_skill)
    }

    /// Mutable current skill of the active ability.
    pub fn active_skill_mut(&mut self) -> Option<&mut SkillState> {
        self.active_ability_mut().and_then(AbilityState::current_skill_mut)
    }

    /// The owner cannot move while the active ability runs.
    #[must_use]
    pub fn is_movement_locked(&self) -> bool {
        self.active_ability().is_some_and(|ability| ability.data.movement_lock)
    }

    /// Pick the next attack ability.
    #[must_use]
    pub fn choose_attack_ability(&self, selector: &impl AbilitySelector, entity: EntityId) -> Option<AbilityRef> {
        self.choose_ability(selector, entity, AbilityType::Attack)
    }

    /// Pick the next omega ability.
    #[must_use]
    pub fn choose_omega_ability(&self, selector: &impl AbilitySelector, entity: EntityId) -> Option<AbilityRef> {
        self.choose_ability(selector, entity, AbilityType::Omega)
    }

    fn choose_ability(
        &self,
        selector: &impl AbilitySelector,
        entity: EntityId,
        ability_type: AbilityType,
    ) -> Option<AbilityRef> {
        let group = self.group(ability_type);
        selector
            .select_ability(entity, &group.data, &group.state)
            .filter(|&index| index < group.state.abilities.len())
            .map(|index| AbilityRef::new(ability_type, index))
    }

    /// Make `ability` the active ability and start it at `time_step`.
    ///
    /// Records the group's current index and activation count in the same
    /// call. Returns `false` and changes nothing when `ability` does not exist.
    pub fn on_ability_activated(&mut self, ability: AbilityRef, time_step: i32) -> bool {
        let exists = self.has_ability(ability);
        debug_assert!(exists, "activating missing ability {ability:?}");
        if !exists {
            return false;
        }
        let state = &mut self.group_mut(ability.ability_type).state;
        state.current_ability_index = Some(ability.index);
        state.total_activations_count += 1;
        state.abilities[ability.index].activate(time_step);
        self.active_ability = Some(ability);
        true
    }

    /// Clear the active ability without touching its state.
    pub fn on_ability_deactivated(&mut self) {
        self.active_ability = None;
    }

    /// Deactivate the active ability and clear it.
    pub fn deactivate_active_ability(&mut self) -> Option<AbilityRef> {
        let active = self.active_ability.take()?;
        if let Some(state) = self.ability_mut(active) {
            state.deactivate();
        }
        Some(active)
    }

    /// Activations of a group so far.
    #[must_use]
    pub fn total_activated_abilities_count(&self, ability_type: AbilityType) -> i32 {
        self.group(ability_type).state.total_activations_count
    }

    /// Activations of several groups so far.
    #[must_use]
    pub fn total_activated_abilities_count_for(&self, ability_types: &[AbilityType]) -> i32 {
        ability_types
            .iter()
            .map(|&ability_type| self.total_activated_abilities_count(ability_type))
            .sum()
    }

    /// Whether the first omega skill needs a focus to start.
    #[must_use]
    pub fn does_omega_require_focus_to_start(&self) -> bool {
        self.group(AbilityType::Omega)
            .data
            .abilities
            .first()
            .and_then(|ability| ability.skills.first())
            .is_some_and(|skill| skill.targeting.targeting_type == SkillTargetingType::CurrentFocus)
    }

    /// Append an innate ability.
    ///
    /// A unit keeps only one battle-start blink; a second one is rejected.
    pub fn add_innate_ability(&mut self, ability: Arc<AbilityData>) -> bool {
        if is_battle_start_blink(&ability)
            && self
                .group(AbilityType::Innate)
                .data
                .abilities
                .iter()
                .any(|existing| is_battle_start_blink(existing))
        {
            return false;
        }

        let group = self.group_mut(AbilityType::Innate);
        let index = group.state.abilities.len();
        group
            .state
            .abilities
            .push(AbilityState::new(Arc::clone(&ability), AbilityType::Innate, index));
        group.data.abilities.push(ability);
        self.rebuild_triggerable_abilities();
        true
    }

    /// Append several innate abilities.
    pub fn add_innate_abilities(&mut self, abilities: &[Arc<AbilityData>]) {
        for ability in abilities {
            self.add_innate_ability(Arc::clone(ability));
        }
    }

    /// Remove the innate abilities attached from `entity`.
    pub fn remove_innate_abilities_attached_from(&mut self, entity: EntityId) -> usize {
        self.remove_innate_abilities_if(|ability| ability.attached_from_entity_id == entity)
    }

    /// Remove every innate ability matching `predicate`.
    ///
    /// Remaining abilities are reindexed; queued and active references follow
    /// them, references to removed abilities are dropped.
    pub fn remove_innate_abilities_if(&mut self, predicate: impl Fn(&AbilityData) -> bool) -> usize {
        let group = self.group_mut(AbilityType::Innate);
        let mut new_indices = Vec::with_capacity(group.data.abilities.len());
        let mut next = 0;
        for ability in &group.data.abilities {
            if predicate(ability.as_ref()) {
                new_indices.push(None);
            } else {
                new_indices.push(Some(next));
                next += 1;
            }
        }
        let removed = new_indices.len() - next;
        if removed == 0 {
            return 0;
        }

        let mut keep = new_indices.iter().map(Option::is_some);
        group.data.abilities.retain(|_| keep.next().unwrap_or(false));
        let mut keep = new_indices.iter().map(Option::is_some);
        group.state.abilities.retain(|_| keep.next().unwrap_or(false));
        for (index, state) in group.state.abilities.iter_mut().enumerate() {
            state.index = index;
        }
        group.state.current_ability_index = group
            .state
            .current_ability_index
            .and_then(|index| new_indices.get(index).copied().flatten());

        let remap = |ability: AbilityRef| -> Option<AbilityRef> {
            if ability.ability_type != AbilityType::Innate {
                return Some(ability);
            }
            new_indices
                .get(ability.index)
                .copied()
                .flatten()
                .map(AbilityRef::innate)
        };
        self.innate_waiting_activation = self.innate_waiting_activation.iter().copied().filter_map(remap).collect();
        self.instant_innate_waiting_activation = self
            .instant_innate_waiting_activation
            .iter()
            .copied()
            .filter_map(remap)
            .collect();
        self.innate_waiting_activation_set = self
            .innate_waiting_activation_set
            .iter()
            .copied()
            .filter_map(remap)
            .collect();
        self.active_ability = self.active_ability.and_then(remap);

        self.rebuild_triggerable_abilities();
        removed
    }

    /// Innate abilities registered for `trigger`, in index order.
    #[must_use]
    pub fn innate_abilities_for_trigger(&self, trigger: ActivationTriggerType) -> Vec<AbilityRef> {
        self.triggerable_abilities.get(&trigger).cloned().unwrap_or_default()
    }

    /// Queue an innate ability for activation.
    ///
    /// Instant abilities go to their own queue. Returns `false` when the
    /// ability is already queued or is not an existing innate ability.
    pub fn add_innate_waiting_activation(&mut self, ability: AbilityRef) -> bool {
        if ability.ability_type != AbilityType::Innate || self.innate_waiting_activation_set.contains(&ability) {
            return false;
        }
        let Some(state) = self.ability(ability) else {
            return false;
        };
        if state.is_instant() {
            self.instant_innate_waiting_activation.push_back(ability);
        } else {
            self.innate_waiting_activation.push_back(ability);
        }
        self.innate_waiting_activation_set.insert(ability);
        true
    }

    /// Whether any innate ability is queued.
    #[must_use]
    pub fn has_any_innate_waiting_activation(&self) -> bool {
        !self.innate_waiting_activation.is_empty() || self.has_any_instant_innate_waiting_activation()
    }

    /// Whether any instant innate ability is queued.
    #[must_use]
    pub fn has_any_instant_innate_waiting_activation(&self) -> bool {
        !self.instant_innate_waiting_activation.is_empty()
    }

    /// Oldest queued non-instant innate ability.
    pub fn pop_innate_waiting_activation(&mut self) -> Option<AbilityRef> {
        let ability = self.innate_waiting_activation.pop_front()?;
        self.innate_waiting_activation_set.remove(&ability);
        Some(ability)
    }

    /// Oldest queued instant innate ability.
    pub fn pop_instant_innate_waiting_activation(&mut self) -> Option<AbilityRef> {
        let ability = self.instant_innate_waiting_activation.pop_front()?;
        self.innate_waiting_activation_set.remove(&ability);
        Some(ability)
    }

    /// Oldest queued instant innate ability, left in the queue.
    #[must_use]
    pub fn peek_instant_innate_waiting_activation(&self) -> Option<AbilityRef> {
        self.instant_innate_waiting_activation.front().copied()
    }

    /// Number of queued innate abilities.
    #[must_use]
    pub fn innates_waiting_activation_len(&self) -> usize {
        self.innate_waiting_activation.len() + self.instant_innate_waiting_activation.len()
    }

    /// Number of queued instant innate abilities.
    #[must_use]
    pub fn instant_innates_waiting_activation_len(&self) -> usize {
        self.instant_innate_waiting_activation.len()
    }

    /// Count a deployed skill of `ability_type`.
    pub fn increment_deployed_skills_count(&mut self, ability_type: AbilityType) {
        self.ability_type_stats.entry(ability_type).or_default().skills_deployed += 1;
    }

    /// Count a received effect package from `ability_type`.
    pub fn increment_received_effect_packages_count(&mut self, ability_type: AbilityType) {
        self.ability_type_stats
            .entry(ability_type)
            .or_default()
            .effect_packages_received += 1;
    }

    /// Skills deployed by the given groups.
    #[must_use]
    pub fn deployed_skills_count(&self, ability_types: &[AbilityType]) -> i32 {
        self.sum_stat(ability_types, |stats| stats.skills_deployed)
    }

    /// Effect packages received from the given groups.
    #[must_use]
    pub fn received_effect_packages_count(&self, ability_types: &[AbilityType]) -> i32 {
        self.sum_stat(ability_types, |stats| stats.effect_packages_received)
    }

    fn sum_stat(&self, ability_types: &[AbilityType], stat: impl Fn(&AbilityTypeStats) -> i32) -> i32 {
        ability_types
            .iter()
            .filter_map(|ability_type| self.ability_type_stats.get(ability_type))
            .map(stat)
            .sum()
    }

    fn rebuild_triggerable_abilities(&mut self) {
        self.triggerable_abilities.clear();
        for state in &self.groups[AbilityType::Innate.index()].state.abilities {
            self.triggerable_abilities
                .entry(state.data.trigger_type())
                .or_default()
                .push(AbilityRef::innate(state.index));
        }
    }
}

fn is_battle_start_blink(ability: &AbilityData) -> bool {
    ability.trigger_type() == ActivationTriggerType::OnBattleStart
        && ability
            .skills
            .iter()
            .any(|skill| skill.effect_package.has_effect(EffectType::Blink))
}
