//! Runtime state of one skill inside a running ability.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, INVALID_ENTITY_ID};
use crate::data::{SkillData, SkillDeploymentType};
use crate::hex::HexGridPosition;
use crate::math::{percentage_of, MAX_PERCENTAGE};
use crate::targeting::SkillTargetFindResult;
use crate::time::truncate_to_time_step;
use crate::world::{RandomSource, World};

/// Phase of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SkillStateType {
    /// Not started.
    #[default]
    None,
    /// Inside its pre-deployment delay.
    Waiting,
    /// Deployed, effects travelling or applying.
    Deploying,
    /// Deployed and channeling.
    Channeling,
    /// Done.
    Finished,
}

/// Receivers a skill has locked onto.
///
/// `targets_saved_data` keeps the last known position of every target ever
/// accepted, so a skill can still land where a lost target stood.
/// Every key of `available_targets` is also a key of `targets_saved_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTargetingState {
    /// Targets the skill still acts on.
    pub available_targets: BTreeSet<EntityId>,
    /// Last known position of every accepted target.
    pub targets_saved_data: BTreeMap<EntityId, HexGridPosition>,
    /// Sender after resolving proxies such as shields.
    pub true_sender_id: EntityId,
}

impl SkillTargetingState {
    /// Forget every target.
    pub fn clear(&mut self) {
        self.available_targets.clear();
        self.targets_saved_data.clear();
        self.true_sender_id = INVALID_ENTITY_ID;
    }

    /// Whether the skill has anything to act on. Dashes always do.
    #[must_use]
    pub fn is_valid_for(&self, deployment_type: SkillDeploymentType) -> bool {
        deployment_type == SkillDeploymentType::Dash
            || !self.available_targets.is_empty()
            || !self.targets_saved_data.is_empty()
    }

    /// Replace the targets with the receivers of `find_result`.
    ///
    /// Receivers without a board position are dropped.
    pub fn create_from_find_result(&mut self, world: &World, find_result: &SkillTargetFindResult) {
        self.clear();
        for &receiver in &find_result.receiver_ids {
            if self.save_target_data(world, receiver) {
                self.available_targets.insert(receiver);
            }
        }
        self.true_sender_id = find_result.true_sender_id;
    }

    /// Replace the targets with a single receiver.
    pub fn create_from_target(&mut self, world: &World, receiver: EntityId, sender: EntityId) {
        let find_result = SkillTargetFindResult {
            receiver_ids: vec![receiver],
            true_sender_id: sender,
        };
        self.create_from_find_result(world, &find_result);
    }

    /// Merge a retargeting result into the current targets.
    ///
    /// A full result (exactly `max_targets` receivers) replaces the targets.
    /// Otherwise new receivers are added and, while the set is over
    /// `max_targets`, targets missing from the result are dropped in id order.
    pub fn merge_valid_targets(&mut self, world: &World, find_result: &SkillTargetFindResult, max_targets: usize) {
        let receivers = &find_result.receiver_ids;
        if max_targets != 0 && receivers.len() == max_targets {
            self.create_from_find_result(world, find_result);
            return;
        }

        for &receiver in receivers {
            if !self.available_targets.contains(&receiver) && self.save_target_data(world, receiver) {
                self.available_targets.insert(receiver);
            }
        }

        if max_targets == 0 {
            return;
        }

        let stale: Vec<EntityId> = self
            .available_targets
            .iter()
            .copied()
            .filter(|id| !receivers.contains(id))
            .collect();
        for id in stale {
            if self.available_targets.len() <= max_targets {
                break;
            }
            self.available_targets.remove(&id);
        }
    }

    /// Drop a target but keep its last known position.
    pub fn lose_target(&mut self, target: EntityId) -> bool {
        self.available_targets.remove(&target)
    }

    /// Last known positions of targets that are no longer available, sorted.
    #[must_use]
    pub fn lost_targets_last_known_positions(&self) -> Vec<HexGridPosition> {
        let mut positions: Vec<HexGridPosition> = self
            .targets_saved_data
            .iter()
            .filter(|(id, _)| !self.available_targets.contains(id))
            .map(|(_, position)| *position)
            .collect();
        positions.sort();
        positions
    }

    /// Available targets in id order.
    #[must_use]
    pub fn available_targets_vec(&self) -> Vec<EntityId> {
        self.available_targets.iter().copied().collect()
    }

    /// Number of targets ever accepted.
    #[must_use]
    pub fn total_targets_size(&self) -> usize {
        self.targets_saved_data.len()
    }

    fn save_target_data(&mut self, world: &World, target: EntityId) -> bool {
        match world.get(target).and_then(|entity| entity.hex_position()) {
            Some(position) => {
                self.targets_saved_data.insert(target, position);
                true
            }
            None => false,
        }
    }
}

/// Runtime state of one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillState {
    /// Index of the skill in its ability.
    pub index: usize,
    /// Current phase.
    pub state: SkillStateType,
    /// Time before the skill deploys.
    pub pre_deployment_delay_ms: i32,
    /// Part of the delay during which receivers may still change.
    pub pre_deployment_retargeting_ms: i32,
    /// Share of the ability's duration owned by this skill.
    pub duration_ms: i32,
    /// Channel window after the delay.
    pub channel_time_ms: i32,
    /// Deployed during the current activation.
    pub is_deployed: bool,
    /// Critical roll of the current activation.
    pub is_critical: bool,
    /// Receivers of the current activation.
    pub targeting_state: SkillTargetingState,
    /// Authored data, shared with every other instance.
    pub data: Arc<SkillData>,
}

impl SkillState {
    /// Fresh state for `data` at `index`.
    #[must_use]
    pub fn new(index: usize, data: Arc<SkillData>) -> Self {
        Self {
            index,
            state: SkillStateType::None,
            pre_deployment_delay_ms: 0,
            pre_deployment_retargeting_ms: 0,
            duration_ms: 0,
            channel_time_ms: 0,
            is_deployed: false,
            is_critical: false,
            targeting_state: SkillTargetingState::default(),
            data,
        }
    }

    /// Derive the timers from the ability's `total_duration_ms`.
    ///
    /// `percentage_override` replaces the authored share of the ability's
    /// duration. Truncation rounds every derived value down to a whole time
    /// step. The channel time is clamped into what is left after the delay.
    pub fn update_timers(&mut self, total_duration_ms: i32, percentage_override: Option<i32>, truncate: bool) {
        let percentage = percentage_override.unwrap_or(self.data.percentage_of_ability_duration);
        self.duration_ms = percentage_of(percentage, total_duration_ms);
        self.pre_deployment_delay_ms =
            percentage_of(self.data.deployment.pre_deployment_delay_percentage, self.duration_ms);
        self.pre_deployment_retargeting_ms = percentage_of(
            self.data.deployment.pre_deployment_retargeting_percentage,
            self.pre_deployment_delay_ms,
        );

        if truncate {
            self.duration_ms = truncate_to_time_step(self.duration_ms);
            self.pre_deployment_delay_ms = truncate_to_time_step(self.pre_deployment_delay_ms);
            self.pre_deployment_retargeting_ms = truncate_to_time_step(self.pre_deployment_retargeting_ms);
        }

        let remaining = (self.duration_ms - self.pre_deployment_delay_ms).max(0);
        self.channel_time_ms = self.data.channel_time_ms.clamp(0, remaining);
    }

    /// Back to the start of an activation.
    pub fn reset_state(&mut self) {
        self.state = SkillStateType::None;
        self.is_deployed = false;
        self.is_critical = false;
    }

    /// Zero-length skill.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        self.duration_ms == 0
    }

    /// Whether the skill has receivers (or is a dash).
    #[must_use]
    pub fn has_valid_targeting(&self) -> bool {
        self.targeting_state.is_valid_for(self.data.deployment.deployment_type)
    }

    /// Critical if the activation roll, the skill or its effect package says so.
    #[must_use]
    pub fn check_if_critical(&self) -> bool {
        self.is_critical || self.data.is_critical || self.data.effect_package.always_crit
    }

    /// Decide criticality for this activation.
    ///
    /// Skills that are always critical never consume a roll. Otherwise one
    /// value in `[0, 100)` is drawn and compared to `crit_chance_percentage`.
    pub fn roll_critical(&mut self, rng: &mut impl RandomSource, crit_chance_percentage: i32) -> bool {
        if !self.check_if_critical() {
            self.is_critical = rng.random_range(0, MAX_PERCENTAGE) < crit_chance_percentage;
        }
        self.check_if_critical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Entity;
    use crate::data::SkillDeploymentData;
    use crate::grid_config::{HexGridConfig, Team};
    use crate::world::SeededRandom;

    fn skill(percentage: i32, delay: i32, retarget: i32, channel: i32) -> SkillState {
        let data = SkillData {
            percentage_of_ability_duration: percentage,
            channel_time_ms: channel,
            deployment: SkillDeploymentData {
                pre_deployment_delay_percentage: delay,
                pre_deployment_retargeting_percentage: retarget,
                ..SkillDeploymentData::default()
            },
            ..SkillData::default()
        };
        SkillState::new(0, Arc::new(data))
    }

    fn world_with_units(count: i32) -> (World, Vec<EntityId>) {
        let mut world = World::new(HexGridConfig::new(21, 21).unwrap(), 10, 0).unwrap();
        let ids = (0..count)
            .map(|i| world.spawn(Entity::combat_unit(Team::Red, HexGridPosition::new(i * 3, 0), 1)))
            .collect();
        (world, ids)
    }

    #[test]
    fn test_update_timers_from_percentages() {
        let mut state = skill(50, 40, 50, 0);
        state.update_timers(1000, None, false);
        assert_eq!(state.duration_ms, 500);
        assert_eq!(state.pre_deployment_delay_ms, 200);
        assert_eq!(state.pre_deployment_retargeting_ms, 100);
    }

    #[test]
    fn test_update_timers_truncates_to_time_steps() {
        let mut state = skill(33, 50, 0, 0);
        state.update_timers(1000, None, true);
        assert_eq!(state.duration_ms, 300);
        assert_eq!(state.pre_deployment_delay_ms, 100);
    }

    #[test]
    fn test_channel_time_is_clamped() {
        let mut state = skill(100, 50, 0, 5000);
        state.update_timers(1000, None, false);
        assert_eq!(state.channel_time_ms, 500);
        assert!(state.pre_deployment_delay_ms + state.channel_time_ms <= state.duration_ms);

        let mut negative = skill(100, 0, 0, -20);
        negative.update_timers(1000, None, false);
        assert_eq!(negative.channel_time_ms, 0);
    }

    #[test]
    fn test_percentage_override() {
        let mut state = skill(25, 0, 0, 0);
        state.update_timers(800, Some(100), false);
        assert_eq!(state.duration_ms, 800);
    }

    #[test]
    fn test_create_from_find_result_saves_positions() {
        let (mut world, ids) = world_with_units(2);
        let ghost = world.spawn(Entity::new(INVALID_ENTITY_ID));
        let mut targeting = SkillTargetingState::default();
        targeting.create_from_find_result(
            &world,
            &SkillTargetFindResult {
                receiver_ids: vec![ids[1], ghost, 999],
                true_sender_id: ids[0],
            },
        );
        assert_eq!(targeting.available_targets_vec(), vec![ids[1]]);
        assert_eq!(targeting.targets_saved_data[&ids[1]], HexGridPosition::new(3, 0));
        assert_eq!(targeting.true_sender_id, ids[0]);
    }

    #[test]
    fn test_lost_targets_keep_last_position() {
        let (world, ids) = world_with_units(3);
        let mut targeting = SkillTargetingState::default();
        targeting.create_from_find_result(
            &world,
            &SkillTargetFindResult {
                receiver_ids: ids.clone(),
                true_sender_id: ids[0],
            },
        );
        assert!(targeting.lose_target(ids[2]));
        assert!(targeting.lose_target(ids[1]));
        assert_eq!(
            targeting.lost_targets_last_known_positions(),
            vec![HexGridPosition::new(3, 0), HexGridPosition::new(6, 0)]
        );
        assert_eq!(targeting.total_targets_size(), 3);
        for id in &targeting.available_targets {
            assert!(targeting.targets_saved_data.contains_key(id));
        }
    }

    #[test]
    fn test_merge_keeps_at_most_max_targets() {
        let (world, ids) = world_with_units(4);
        let mut targeting = SkillTargetingState::default();
        targeting.create_from_find_result(
            &world,
            &SkillTargetFindResult {
                receiver_ids: vec![ids[0], ids[1]],
                true_sender_id: ids[0],
            },
        );
        targeting.merge_valid_targets(
            &world,
            &SkillTargetFindResult {
                receiver_ids: vec![ids[2]],
                true_sender_id: ids[0],
            },
            2,
        );
        assert_eq!(targeting.available_targets.len(), 2);
        assert!(targeting.available_targets.contains(&ids[2]));
        assert_eq!(targeting.total_targets_size(), 3);

        targeting.merge_valid_targets(
            &world,
            &SkillTargetFindResult {
                receiver_ids: vec![ids[3], ids[0]],
                true_sender_id: ids[0],
            },
            2,
        );
        assert_eq!(targeting.available_targets_vec(), vec![ids[0], ids[3]]);
    }

    #[test]
    fn test_dash_is_always_valid() {
        let targeting = SkillTargetingState::default();
        assert!(targeting.is_valid_for(SkillDeploymentType::Dash));
        assert!(!targeting.is_valid_for(SkillDeploymentType::Direct));
    }

    #[test]
    fn test_always_crit_skips_the_roll() {
        let mut state = skill(100, 0, 0, 0);
        let mut rng = SeededRandom::new(3);
        assert!(!state.roll_critical(&mut rng, 0));
        assert!(state.roll_critical(&mut rng, 100));

        let mut data = (*state.data).clone();
        data.effect_package.always_crit = true;
        let mut always = SkillState::new(0, Arc::new(data));
        assert!(always.roll_critical(&mut rng, 0));
        assert!(!always.is_critical);

        state.reset_state();
        assert!(!state.is_critical);
    }
}
