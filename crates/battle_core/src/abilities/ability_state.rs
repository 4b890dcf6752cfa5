//! Runtime state of one ability: timers, phases and activation bookkeeping.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::skill_state::{SkillState, SkillStateType};
use crate::components::{EntityId, INVALID_ENTITY_ID};
use crate::data::{
    AbilityData, AbilityType, ActivationTriggerType, EffectType, SkillDeploymentType, SkillTargetingType,
};
use crate::math::{Fixed, MAX_PERCENTAGE};
use crate::time::{ms_to_time_steps, time_steps_to_ms};

/// Who caused an ability to be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatorContext {
    /// Entity that sent the triggering event.
    pub sender_entity_id: EntityId,
    /// Combat unit behind the sender (itself, or the owner of a projectile).
    pub sender_combat_unit_entity_id: EntityId,
    /// Entity that received the triggering event.
    pub receiver_entity_id: EntityId,
    /// Combat unit behind the receiver.
    pub receiver_combat_unit_entity_id: EntityId,
    /// Ability group of the triggering ability, if any.
    pub ability_type: Option<AbilityType>,
    /// Trigger that fired.
    pub trigger: ActivationTriggerType,
}

impl Default for ActivatorContext {
    fn default() -> Self {
        Self {
            sender_entity_id: INVALID_ENTITY_ID,
            sender_combat_unit_entity_id: INVALID_ENTITY_ID,
            receiver_entity_id: INVALID_ENTITY_ID,
            receiver_combat_unit_entity_id: INVALID_ENTITY_ID,
            ability_type: None,
            trigger: ActivationTriggerType::None,
        }
    }
}

/// Non-owning reference to an attached empower: the receiver carrying it and
/// the entity it is attached from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EffectRef {
    /// Entity the effect is attached to.
    pub receiver: EntityId,
    /// Entity the effect is attached from.
    pub attached_from: EntityId,
}

/// Runtime state of one ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityState {
    /// Index in the owning group.
    pub index: usize,
    /// Currently running.
    pub is_active: bool,
    /// Owning group.
    pub ability_type: AbilityType,
    /// Duration the skill timers were derived from.
    pub total_duration_ms: i32,
    /// Number of activations so far.
    pub activation_count: i32,
    /// Time step of the last activation.
    pub last_activation_time_step: i32,
    /// Time of the last activation in ms.
    pub last_activation_ms: i32,
    /// Activation window after battle start, in time steps.
    pub activation_time_limit_time_steps: i32,
    /// Period of timed triggers, in time steps.
    pub activate_every_time_steps: i32,
    /// Cooldown between activations, in time steps.
    pub activation_cooldown_time_steps: i32,
    /// Skills in deployment order.
    pub skills: Vec<SkillState>,
    /// Authored data, shared with every other instance.
    pub data: Arc<AbilityData>,
    /// Time spent active over the whole battle.
    pub total_current_time_ms: i32,
    /// Time the previous activation ran past its duration.
    pub previous_overflow_ms: i32,
    /// Contexts that queued this ability, oldest first.
    pub activator_contexts: Vec<ActivatorContext>,
    /// Effect package attributes were applied for this activation.
    pub applied_effect_package_attributes: bool,
    /// Trigger events counted so far.
    pub trigger_counter: i32,
    /// Consumable empowers spent by the current activation.
    pub consumable_empowers_used: BTreeSet<EffectRef>,
    current_ability_time_ms: i32,
    current_skill_time_ms: i32,
    current_skill_index: usize,
}

impl AbilityState {
    /// Inactive state for `data`, with timers derived from its total duration.
    #[must_use]
    pub fn new(data: Arc<AbilityData>, ability_type: AbilityType, index: usize) -> Self {
        let trigger = &data.activation_trigger_data;
        let skills = data
            .skills
            .iter()
            .enumerate()
            .map(|(skill_index, skill)| SkillState::new(skill_index, Arc::clone(skill)))
            .collect();
        let mut state = Self {
            index,
            is_active: false,
            ability_type,
            total_duration_ms: 0,
            activation_count: 0,
            last_activation_time_step: 0,
            last_activation_ms: 0,
            activation_time_limit_time_steps: ms_to_time_steps(trigger.activation_time_limit_ms),
            activate_every_time_steps: ms_to_time_steps(trigger.activate_every_time_ms),
            activation_cooldown_time_steps: ms_to_time_steps(trigger.activation_cooldown_ms),
            skills,
            total_current_time_ms: 0,
            previous_overflow_ms: 0,
            activator_contexts: Vec::new(),
            applied_effect_package_attributes: false,
            trigger_counter: 0,
            consumable_empowers_used: BTreeSet::new(),
            current_ability_time_ms: 0,
            current_skill_time_ms: 0,
            current_skill_index: 0,
            data,
        };
        state.update_timers(state.data.total_duration_ms);
        state
    }

    /// Derive every skill's timers from `total_duration_ms`.
    ///
    /// Attack skills always span the whole ability and keep exact
    /// milliseconds; other skills are truncated to whole time steps.
    pub fn update_timers(&mut self, total_duration_ms: i32) {
        self.total_duration_ms = total_duration_ms;
        let (percentage_override, truncate) = match self.ability_type {
            AbilityType::Attack => (Some(MAX_PERCENTAGE), false),
            AbilityType::Omega | AbilityType::Innate => (None, true),
        };
        for skill in &mut self.skills {
            skill.update_timers(total_duration_ms, percentage_override, truncate);
        }
    }

    /// Start a new activation at `time_step`.
    pub fn activate(&mut self, time_step: i32) {
        self.is_active = true;
        self.activation_count += 1;
        self.last_activation_time_step = time_step;
        self.last_activation_ms = time_steps_to_ms(time_step);
        self.previous_overflow_ms = self.current_ability_time_ms - self.total_duration_ms;
        self.current_ability_time_ms = 0;
        self.current_skill_time_ms = 0;
        self.current_skill_index = 0;
        for skill in &mut self.skills {
            skill.reset_state();
        }
    }

    /// Stop the current activation.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.applied_effect_package_attributes = false;
        self.consumable_empowers_used.clear();
    }

    /// Every skill has been passed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current_skill_index >= self.skills.len()
    }

    /// Current skill, `None` once finished.
    #[must_use]
    pub fn current_skill(&self) -> Option<&SkillState> {
        self.skills.get(self.current_skill_index)
    }

    /// Mutable current skill, `None` once finished.
    pub fn current_skill_mut(&mut self) -> Option<&mut SkillState> {
        self.skills.get_mut(self.current_skill_index)
    }

    /// Index of the current skill.
    #[must_use]
    pub const fn current_skill_index(&self) -> usize {
        self.current_skill_index
    }

    /// Time spent in the current skill.
    #[must_use]
    pub const fn current_skill_time_ms(&self) -> i32 {
        self.current_skill_time_ms
    }

    /// Time spent in the current activation.
    #[must_use]
    pub const fn current_ability_time_ms(&self) -> i32 {
        self.current_ability_time_ms
    }

    /// Set the activation and skill clocks.
    pub fn set_current_ability_time_ms(&mut self, time_ms: i32) {
        self.current_ability_time_ms = time_ms;
        self.current_skill_time_ms = time_ms;
    }

    /// The current skill's delay has already elapsed, so it can deploy now.
    #[must_use]
    pub fn can_deploy_current_skill_instantly(&self) -> bool {
        self.current_skill().is_some_and(|skill| {
            skill.pre_deployment_delay_ms == 0 || self.current_skill_time_ms >= skill.pre_deployment_delay_ms
        })
    }

    /// The current skill is still inside its own and the ability's duration.
    #[must_use]
    pub fn can_deploy_current_skill(&self) -> bool {
        if self.current_ability_time_ms >= self.total_duration_ms {
            return false;
        }
        self.current_skill()
            .is_some_and(|skill| self.current_skill_time_ms < skill.duration_ms)
    }

    /// The current skill is inside `[delay, delay + channel_time)`.
    #[must_use]
    pub fn can_channel_current_skill(&self) -> bool {
        if self.current_ability_time_ms >= self.total_duration_ms {
            return false;
        }
        self.current_skill().is_some_and(|skill| {
            skill.channel_time_ms > 0
                && self.current_skill_time_ms >= skill.pre_deployment_delay_ms
                && self.current_skill_time_ms < skill.pre_deployment_delay_ms + skill.channel_time_ms
        })
    }

    /// Receivers of the current skill may still change.
    #[must_use]
    pub fn can_retarget_current_skill(&self) -> bool {
        if self.current_ability_time_ms >= self.total_duration_ms {
            return false;
        }
        self.current_skill().is_some_and(|skill| {
            self.can_always_retarget() || self.current_skill_time_ms <= skill.pre_deployment_retargeting_ms
        })
    }

    /// Zone targeting and full retargeting windows never close.
    #[must_use]
    pub fn can_always_retarget(&self) -> bool {
        self.current_skill().is_some_and(|skill| {
            skill.data.targeting.targeting_type == SkillTargetingType::InZone
                || skill.data.deployment.pre_deployment_retargeting_percentage == MAX_PERCENTAGE
        })
    }

    /// Zero-length ability.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        self.total_duration_ms == 0
    }

    /// Whether any skill dashes or blinks its sender.
    #[must_use]
    pub fn has_skill_with_movement(&self) -> bool {
        self.skills.iter().any(|skill| {
            skill.data.deployment.deployment_type == SkillDeploymentType::Dash
                || skill.data.effect_package.has_effect(EffectType::Blink)
        })
    }

    /// Advance the ability, skill and lifetime clocks by `added_time_ms`,
    /// then move past every skill whose duration has elapsed.
    ///
    /// Time a skill runs past its duration carries over to the next skill.
    /// A zero-length skill holds the clock only until it has deployed.
    pub fn increase_current_time_ms(&mut self, added_time_ms: i32) {
        self.current_ability_time_ms += added_time_ms;
        self.current_skill_time_ms += added_time_ms;
        self.total_current_time_ms += added_time_ms;

        while let Some(skill) = self.current_skill() {
            let pending_instant =
                skill.is_instant() && !skill.is_deployed && skill.state != SkillStateType::Finished;
            if pending_instant || self.current_skill_time_ms < skill.duration_ms {
                break;
            }
            let overrun = self.current_skill_time_ms - skill.duration_ms;
            self.increment_current_skill_index();
            self.current_skill_time_ms = overrun;
        }
    }

    /// Close the current skill and move to the next one.
    pub fn increment_current_skill_index(&mut self) {
        if let Some(skill) = self.current_skill_mut() {
            skill.state = SkillStateType::Finished;
        }
        self.current_skill_index += 1;
        self.current_skill_time_ms = 0;
    }

    /// Whether the trigger counter allows an activation.
    ///
    /// Only vanquish triggers are counted; every other trigger always passes.
    #[must_use]
    pub fn can_activate_by_trigger_counter(&self) -> bool {
        let trigger = &self.data.activation_trigger_data;
        if trigger.trigger_type != ActivationTriggerType::OnVanquish {
            return true;
        }
        if trigger.every_x {
            return trigger.trigger_value != 0 && self.trigger_counter % trigger.trigger_value == 0;
        }
        trigger
            .comparison_type
            .evaluate(Fixed::from_num(self.trigger_counter), Fixed::from_num(trigger.trigger_value))
    }

    /// Record an empower spent by this activation.
    pub fn consume_empower(&mut self, empower: EffectRef) -> bool {
        self.consumable_empowers_used.insert(empower)
    }

    /// Record who queued this ability.
    pub fn push_activator_context(&mut self, context: ActivatorContext) {
        self.activator_contexts.push(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ComparisonType, SkillData, SkillDeploymentData};
    use crate::time::MS_PER_TIME_STEP;

    fn ability(total_ms: i32, skills: Vec<SkillData>, ability_type: AbilityType) -> AbilityState {
        let data = AbilityData {
            name: "Test".into(),
            total_duration_ms: total_ms,
            skills: skills.into_iter().map(Arc::new).collect(),
            ..AbilityData::default()
        };
        AbilityState::new(Arc::new(data), ability_type, 0)
    }

    fn delayed_skill(percentage: i32, delay: i32) -> SkillData {
        SkillData {
            percentage_of_ability_duration: percentage,
            deployment: SkillDeploymentData {
                pre_deployment_delay_percentage: delay,
                ..SkillDeploymentData::default()
            },
            ..SkillData::default()
        }
    }

    #[test]
    fn test_single_skill_lifecycle() {
        let mut state = ability(100, vec![SkillData::default()], AbilityType::Omega);
        state.activate(0);
        assert!(state.can_deploy_current_skill());
        assert!(!state.is_finished());

        state.increase_current_time_ms(100);
        assert!(state.is_finished());
        assert!(!state.can_deploy_current_skill());
        assert!(state.current_skill().is_none());
    }

    #[test]
    fn test_activate_resets_clocks() {
        let mut state = ability(500, vec![delayed_skill(100, 0)], AbilityType::Innate);
        state.activate(3);
        state.increase_current_time_ms(200);
        state.activate(7);
        assert_eq!(state.activation_count, 2);
        assert_eq!(state.last_activation_time_step, 7);
        assert_eq!(state.last_activation_ms, 7 * MS_PER_TIME_STEP);
        assert_eq!(state.previous_overflow_ms, -300);
        assert_eq!(state.current_ability_time_ms(), 0);
        assert_eq!(state.current_skill_index(), 0);
    }

    #[test]
    fn test_overrun_carries_into_next_skill() {
        let mut state = ability(1000, vec![delayed_skill(30, 0), delayed_skill(70, 10)], AbilityType::Omega);
        state.activate(0);
        assert_eq!(state.skills[1].pre_deployment_delay_ms, 0);

        let mut state = ability(1000, vec![delayed_skill(20, 0), delayed_skill(80, 50)], AbilityType::Omega);
        state.activate(0);
        state.increase_current_time_ms(600);
        assert_eq!(state.current_skill_index(), 1);
        assert_eq!(state.current_skill_time_ms(), 400);
        assert_eq!(state.skills[1].pre_deployment_delay_ms, 400);
        assert!(state.can_deploy_current_skill_instantly());
        assert_eq!(state.skills[0].state, SkillStateType::Finished);
    }

    #[test]
    fn test_channel_window_is_half_open() {
        let skill = SkillData {
            channel_time_ms: 300,
            ..delayed_skill(100, 20)
        };
        let mut state = ability(1000, vec![skill], AbilityType::Omega);
        state.activate(0);
        assert!(!state.can_channel_current_skill());
        state.increase_current_time_ms(200);
        assert!(state.can_channel_current_skill());
        state.increase_current_time_ms(200);
        assert!(state.can_channel_current_skill());
        state.increase_current_time_ms(100);
        assert!(!state.can_channel_current_skill());
    }

    #[test]
    fn test_retarget_window() {
        let skill = SkillData {
            deployment: SkillDeploymentData {
                pre_deployment_delay_percentage: 50,
                pre_deployment_retargeting_percentage: 40,
                ..SkillDeploymentData::default()
            },
            ..SkillData::default()
        };
        let mut state = ability(1000, vec![skill], AbilityType::Omega);
        state.activate(0);
        assert!(!state.can_always_retarget());
        state.increase_current_time_ms(200);
        assert!(state.can_retarget_current_skill());
        state.increase_current_time_ms(100);
        assert!(!state.can_retarget_current_skill());
    }

    #[test]
    fn test_attack_skills_span_the_whole_ability() {
        let state = ability(1234, vec![delayed_skill(10, 0)], AbilityType::Attack);
        assert_eq!(state.skills[0].duration_ms, 1234);
        let omega = ability(1234, vec![delayed_skill(10, 0)], AbilityType::Omega);
        assert_eq!(omega.skills[0].duration_ms, 100);
    }

    #[test]
    fn test_vanquish_trigger_counter() {
        let mut data = AbilityData::default();
        data.activation_trigger_data.trigger_type = ActivationTriggerType::OnVanquish;
        data.activation_trigger_data.trigger_value = 2;
        data.activation_trigger_data.every_x = true;
        let mut state = AbilityState::new(Arc::new(data.clone()), AbilityType::Innate, 0);
        state.trigger_counter = 3;
        assert!(!state.can_activate_by_trigger_counter());
        state.trigger_counter = 4;
        assert!(state.can_activate_by_trigger_counter());

        data.activation_trigger_data.every_x = false;
        data.activation_trigger_data.comparison_type = ComparisonType::Greater;
        let mut state = AbilityState::new(Arc::new(data), AbilityType::Innate, 0);
        state.trigger_counter = 2;
        assert!(!state.can_activate_by_trigger_counter());
        state.trigger_counter = 3;
        assert!(state.can_activate_by_trigger_counter());
    }

    #[test]
    fn test_movement_skills() {
        let dash = SkillData {
            deployment: SkillDeploymentData {
                deployment_type: SkillDeploymentType::Dash,
                ..SkillDeploymentData::default()
            },
            ..SkillData::default()
        };
        assert!(ability(100, vec![dash], AbilityType::Omega).has_skill_with_movement());
        assert!(!ability(100, vec![SkillData::default()], AbilityType::Omega).has_skill_with_movement());
    }

    #[test]
    fn test_deactivate_releases_empowers() {
        let mut state = ability(100, vec![SkillData::default()], AbilityType::Omega);
        state.activate(0);
        assert!(state.consume_empower(EffectRef { receiver: 1, attached_from: 2 }));
        assert!(!state.consume_empower(EffectRef { receiver: 1, attached_from: 2 }));
        state.deactivate();
        assert!(!state.is_active);
        assert!(state.consumable_empowers_used.is_empty());
    }

    #[test]
    fn test_zero_length_skill_holds_clock_until_deployed() {
        // 50ms truncates to a 0ms skill inside a non-instant ability.
        let mut state = ability(50, vec![SkillData::default()], AbilityType::Omega);
        state.activate(0);
        assert!(!state.is_instant());
        assert!(state.skills[0].is_instant());

        state.increase_current_time_ms(MS_PER_TIME_STEP);
        assert_eq!(state.current_skill_index(), 0);

        state.skills[0].is_deployed = true;
        state.increase_current_time_ms(MS_PER_TIME_STEP);
        assert!(state.is_finished());
    }
}
