//! Ability data: an ability is an ordered list of skills.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::enums::{AbilitySelectionType, ActivationTriggerType, ComparisonType, StatType};
use super::skill_data::SkillData;
use crate::components::{EntityId, INVALID_ENTITY_ID};
use crate::math::{fixed_serde, Fixed};

/// When and how often an innate ability fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityActivationTriggerData {
    /// Event that queues the ability.
    pub trigger_type: ActivationTriggerType,
    /// Maximum activations, 0 for unlimited.
    pub max_activations: i32,
    /// Window after battle start in which the ability may activate, 0 for unlimited.
    pub activation_time_limit_ms: i32,
    /// Period of [`ActivationTriggerType::EveryXTime`].
    pub activate_every_time_ms: i32,
    /// Minimum time between two activations.
    pub activation_cooldown_ms: i32,
    /// Trigger radius in hexes for [`ActivationTriggerType::InRange`].
    pub activation_radius_units: i32,
    /// Value the trigger counter is compared against.
    pub trigger_value: i32,
    /// How the trigger counter is compared.
    pub comparison_type: ComparisonType,
    /// Fire on every multiple of `trigger_value` instead of comparing.
    pub every_x: bool,
    /// Only react to events sent by the current focus.
    pub only_focus: bool,
}

impl Default for AbilityActivationTriggerData {
    fn default() -> Self {
        Self {
            trigger_type: ActivationTriggerType::None,
            max_activations: 0,
            activation_time_limit_ms: 0,
            activate_every_time_ms: 0,
            activation_cooldown_ms: 0,
            activation_radius_units: 0,
            trigger_value: 1,
            comparison_type: ComparisonType::Equal,
            every_x: false,
            only_focus: false,
        }
    }
}

/// A named ability composed of skills.
///
/// # Example RON
///
/// ```ron
/// AbilityData(
///     name: "Rally",
///     total_duration_ms: 500,
///     skills: [
///         (
///             name: "Rally Aura",
///             targeting: (type: Self),
///             effect_package: (effects: [(effect_type: Aura, stat: Some(AttackDamage), radius_units: 15)]),
///         ),
///     ],
///     activation_trigger_data: (trigger_type: OnBattleStart),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityData {
    /// Unique ability name.
    pub name: String,

    /// Activates at most once per battle.
    #[serde(default)]
    pub is_use_once: bool,

    /// Total duration in ms.
    #[serde(default)]
    pub total_duration_ms: i32,

    /// Skills, deployed in order.
    #[serde(default)]
    pub skills: Vec<Arc<SkillData>>,

    /// Activation rules of innate abilities.
    #[serde(default)]
    pub activation_trigger_data: AbilityActivationTriggerData,

    /// Entity that attached this ability at runtime (marks), if any.
    #[serde(default)]
    pub attached_from_entity_id: EntityId,

    /// The owner cannot move while this ability is active.
    #[serde(default = "default_movement_lock")]
    pub movement_lock: bool,
}

const fn default_movement_lock() -> bool {
    true
}

impl Default for AbilityData {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_use_once: false,
            total_duration_ms: 0,
            skills: Vec::new(),
            activation_trigger_data: AbilityActivationTriggerData::default(),
            attached_from_entity_id: INVALID_ENTITY_ID,
            movement_lock: true,
        }
    }
}

impl AbilityData {
    /// Skill at `index`, if any.
    #[must_use]
    pub fn skill(&self, index: usize) -> Option<&Arc<SkillData>> {
        self.skills.get(index)
    }

    /// Trigger that queues this ability.
    #[must_use]
    pub const fn trigger_type(&self) -> ActivationTriggerType {
        self.activation_trigger_data.trigger_type
    }
}

/// One ability group with its selection rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitiesData {
    /// How the next ability is chosen.
    #[serde(default)]
    pub selection_type: AbilitySelectionType,

    /// Abilities of the group.
    #[serde(default)]
    pub abilities: Vec<Arc<AbilityData>>,

    /// Activations of ability 0 before ability 1 fires.
    #[serde(default)]
    pub activation_cadence: i32,

    /// Threshold for the attribute and health checks.
    #[serde(with = "fixed_serde", default)]
    pub activation_check_value: Fixed,

    /// Stat read by [`AbilitySelectionType::SelfAttributeCheck`].
    #[serde(default)]
    pub activation_check_stat_type: Option<StatType>,
}

impl AbilitiesData {
    /// Group with the given abilities, selected in turn.
    #[must_use]
    pub fn cycle(abilities: Vec<Arc<AbilityData>>) -> Self {
        Self {
            selection_type: AbilitySelectionType::Cycle,
            abilities,
            ..Self::default()
        }
    }

    /// Append the abilities of `other`, keeping this group's selection rules.
    pub fn merge(&mut self, other: &Self) {
        self.abilities.extend(other.abilities.iter().cloned());
    }
}
