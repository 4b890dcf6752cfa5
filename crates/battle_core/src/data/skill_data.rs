//! Skill data: how a skill finds its receivers and how it reaches them.

use serde::{Deserialize, Serialize};

use super::effect_data::{EffectPackage, EffectType};
use super::enums::{AllegianceType, CombatSynergy, Guidance, StatType};
use crate::math::MAX_PERCENTAGE;
use crate::world::StatExpression;

/// Strategy used to compute a skill's receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SkillTargetingType {
    /// Unset; resolves to nobody.
    #[default]
    None,
    /// The sender's current focus.
    CurrentFocus,
    /// The sender itself.
    #[serde(rename = "Self")]
    Self_,
    /// Group members within `radius_units` of the sender.
    InZone,
    /// The `num` closest (or furthest) group members.
    DistanceCheck,
    /// The `num` group members with the highest (or lowest) stat.
    CombatStatCheck,
    /// Every group member.
    Allegiance,
    /// Combat units with (or without) a combat synergy.
    Synergy,
    /// The entity that vanquished the sender.
    Vanquisher,
    /// The receivers of the previous skill of the same ability.
    PreviousTargetList,
    /// The entities recorded as activators of the ability.
    Activator,
    /// The `num` group members ranked by an expression.
    ExpressionCheck,
    /// Where the deployment would hit the most group members.
    Density,
    /// Pets, grouped by their parent.
    Pets,
    /// Combat units of a given tier.
    Tier,
}

/// How a skill reaches its receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SkillDeploymentType {
    /// Applied to each receiver directly.
    #[default]
    Direct,
    /// Spawns a zone at the receiver.
    Zone,
    /// Fires a projectile at the receiver.
    Projectile,
    /// Fires a beam at the receiver.
    Beam,
    /// Moves the sender through the receiver.
    Dash,
    /// Spawns a combat unit at the receiver.
    SpawnedCombatUnit,
}

/// Shape of a zone deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZoneShape {
    /// Hexagon of `radius_units`.
    #[default]
    Hexagon,
    /// Axis aligned rectangle of `width_units` x `height_units`.
    Rectangle,
    /// Triangle from the sender, median `radius_units`, turned by `direction_degrees`.
    Triangle,
}

/// Targeting block of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTargetingData {
    /// Strategy.
    #[serde(rename = "type", default)]
    pub targeting_type: SkillTargetingType,

    /// Planes the skill can reach.
    #[serde(default)]
    pub guidance: Guidance,

    /// Group of entities the strategy draws from.
    #[serde(default)]
    pub group: AllegianceType,

    /// Stat ranked by [`SkillTargetingType::CombatStatCheck`].
    #[serde(default)]
    pub stat_type: Option<StatType>,

    /// Maximum number of receivers, 0 for unlimited.
    #[serde(default)]
    pub num: usize,

    /// Radius of [`SkillTargetingType::InZone`] in hexes.
    #[serde(default)]
    pub radius_units: i32,

    /// Synergy receivers must have.
    #[serde(default)]
    pub combat_synergy: Option<CombatSynergy>,

    /// Synergy receivers must not have.
    #[serde(default)]
    pub not_combat_synergy: Option<CombatSynergy>,

    /// Ranking expression of [`SkillTargetingType::ExpressionCheck`].
    #[serde(default)]
    pub expression: StatExpression,

    /// Rank ascending instead of descending.
    #[serde(default)]
    pub lowest: bool,

    /// The sender may be one of the receivers.
    #[serde(default, rename = "self")]
    pub include_self: bool,

    /// Only receivers whose focus is the sender (or the sender's parent).
    #[serde(default)]
    pub only_current_focusers: bool,

    /// Tier of [`SkillTargetingType::Tier`], negative for unset.
    #[serde(default = "default_tier")]
    pub tier: i32,
}

const fn default_tier() -> i32 {
    -1
}

impl Default for SkillTargetingData {
    fn default() -> Self {
        Self {
            targeting_type: SkillTargetingType::None,
            guidance: Guidance::GROUND,
            group: AllegianceType::None,
            stat_type: None,
            num: 0,
            radius_units: 0,
            combat_synergy: None,
            not_combat_synergy: None,
            expression: StatExpression::default(),
            lowest: false,
            include_self: false,
            only_current_focusers: false,
            tier: default_tier(),
        }
    }
}

impl SkillTargetingData {
    /// Strategies that read `stat_type`.
    #[must_use]
    pub const fn uses_targeting_stat_type(targeting_type: SkillTargetingType) -> bool {
        matches!(targeting_type, SkillTargetingType::CombatStatCheck)
    }

    /// Strategies that read `group`.
    #[must_use]
    pub const fn uses_targeting_group(targeting_type: SkillTargetingType) -> bool {
        matches!(
            targeting_type,
            SkillTargetingType::InZone
                | SkillTargetingType::DistanceCheck
                | SkillTargetingType::CombatStatCheck
                | SkillTargetingType::Allegiance
                | SkillTargetingType::Synergy
                | SkillTargetingType::ExpressionCheck
                | SkillTargetingType::Density
                | SkillTargetingType::Pets
                | SkillTargetingType::Tier
        )
    }

    /// Strategies that read `lowest`.
    #[must_use]
    pub const fn uses_targeting_lowest(targeting_type: SkillTargetingType) -> bool {
        matches!(
            targeting_type,
            SkillTargetingType::CombatStatCheck
                | SkillTargetingType::ExpressionCheck
                | SkillTargetingType::Density
        )
    }

    /// Strategies that require `num`.
    #[must_use]
    pub const fn uses_targeting_num(targeting_type: SkillTargetingType) -> bool {
        matches!(
            targeting_type,
            SkillTargetingType::CombatStatCheck
                | SkillTargetingType::DistanceCheck
                | SkillTargetingType::ExpressionCheck
                | SkillTargetingType::Density
        )
    }

    /// Strategies where `num` is optional.
    #[must_use]
    pub const fn uses_targeting_num_optional(targeting_type: SkillTargetingType) -> bool {
        matches!(targeting_type, SkillTargetingType::Tier)
    }

    /// Strategies that read `tier`.
    #[must_use]
    pub const fn uses_targeting_tier(targeting_type: SkillTargetingType) -> bool {
        matches!(targeting_type, SkillTargetingType::Tier)
    }

    /// Strategies that read the synergy fields.
    #[must_use]
    pub const fn uses_targeting_combat_synergy(targeting_type: SkillTargetingType) -> bool {
        matches!(targeting_type, SkillTargetingType::Synergy)
    }

    /// Strategies that read `radius_units`.
    #[must_use]
    pub const fn uses_targeting_radius_units(targeting_type: SkillTargetingType) -> bool {
        matches!(targeting_type, SkillTargetingType::InZone)
    }

    /// Deployments density targeting can rank.
    #[must_use]
    pub const fn is_density_targeting_supported(deployment_type: SkillDeploymentType) -> bool {
        matches!(
            deployment_type,
            SkillDeploymentType::Zone
                | SkillDeploymentType::Beam
                | SkillDeploymentType::Dash
                | SkillDeploymentType::Projectile
        )
    }

    /// Whether `targeting_type` can be paired with `deployment_type`.
    #[must_use]
    pub const fn supports_deployment_type(
        targeting_type: SkillTargetingType,
        deployment_type: SkillDeploymentType,
    ) -> bool {
        match targeting_type {
            SkillTargetingType::Density => Self::is_density_targeting_supported(deployment_type),
            _ => true,
        }
    }

    /// Strategies that honour `only_current_focusers`.
    #[must_use]
    pub const fn supports_current_focusers(targeting_type: SkillTargetingType) -> bool {
        matches!(targeting_type, SkillTargetingType::InZone)
    }
}

/// Deployment block of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDeploymentData {
    /// How the skill reaches its receivers.
    #[serde(rename = "type", default)]
    pub deployment_type: SkillDeploymentType,

    /// Planes the deployment can reach.
    #[serde(default)]
    pub guidance: Guidance,

    /// Delay before deployment, as a percentage of the skill duration.
    #[serde(default)]
    pub pre_deployment_delay_percentage: i32,

    /// Retarget window, as a percentage of the pre deployment delay.
    #[serde(default)]
    pub pre_deployment_retargeting_percentage: i32,
}

impl Default for SkillDeploymentData {
    fn default() -> Self {
        Self {
            deployment_type: SkillDeploymentType::Direct,
            guidance: Guidance::GROUND,
            pre_deployment_delay_percentage: 0,
            pre_deployment_retargeting_percentage: 0,
        }
    }
}

/// Zone parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillZoneData {
    /// Shape.
    pub shape: ZoneShape,
    /// Radius in hexes (hexagon, triangle).
    pub radius_units: i32,
    /// Radius a growing zone stops at.
    pub max_radius_units: i32,
    /// Width in hexes (rectangle).
    pub width_units: i32,
    /// Height in hexes (rectangle).
    pub height_units: i32,
    /// Rotation of the shape in degrees.
    pub direction_degrees: i32,
    /// Lifetime in ms.
    pub duration_ms: i32,
    /// Pulse period in ms.
    pub frequency_ms: i32,
    /// Apply only once to each receiver.
    pub apply_once: bool,
}

/// Projectile parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillProjectileData {
    /// Radius of the projectile in hexes.
    pub size_units: i32,
    /// Speed in sub units per time step.
    pub speed_sub_units: i32,
    /// Follows the receiver.
    pub is_homing: bool,
    /// Stops at the first valid entity on its way.
    pub is_blockable: bool,
    /// Applies to every entity it passes.
    pub apply_to_all: bool,
    /// Keeps flying after reaching the receiver.
    pub continue_after_target: bool,
}

/// Beam parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillBeamData {
    /// Width in hexes.
    pub width_units: i32,
    /// Pulse period in ms.
    pub frequency_ms: i32,
    /// Apply only once to each receiver.
    pub apply_once: bool,
    /// Follows the receiver.
    pub is_homing: bool,
    /// Stops at the first valid entity on its way.
    pub is_blockable: bool,
}

/// Dash parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillDashData {
    /// Applies to every entity passed through.
    pub apply_to_all: bool,
    /// Lands behind the receiver instead of in front of it.
    pub land_behind: bool,
}

impl Default for SkillDashData {
    fn default() -> Self {
        Self {
            apply_to_all: true,
            land_behind: true,
        }
    }
}

/// One timed phase of an ability.
///
/// # Example RON
///
/// ```ron
/// SkillData(
///     name: "Slash",
///     targeting: (type: CurrentFocus),
///     deployment: (type: Direct, pre_deployment_delay_percentage: 20),
///     effect_package: (effects: [(effect_type: InstantDamage, value: 429496729600)]),
///     percentage_of_ability_duration: 100,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillData {
    /// Human readable name.
    #[serde(default)]
    pub name: String,

    /// How receivers are found.
    #[serde(default)]
    pub targeting: SkillTargetingData,

    /// How receivers are reached.
    #[serde(default)]
    pub deployment: SkillDeploymentData,

    /// Zone parameters.
    #[serde(default)]
    pub zone: SkillZoneData,

    /// Projectile parameters.
    #[serde(default)]
    pub projectile: SkillProjectileData,

    /// Beam parameters.
    #[serde(default)]
    pub beam: SkillBeamData,

    /// Dash parameters.
    #[serde(default)]
    pub dash: SkillDashData,

    /// Effects applied to each receiver.
    #[serde(default)]
    pub effect_package: EffectPackage,

    /// Share of the ability duration spent in this skill.
    #[serde(default = "default_percentage_of_ability_duration")]
    pub percentage_of_ability_duration: i32,

    /// How long the skill channels after deployment.
    #[serde(default)]
    pub channel_time_ms: i32,

    /// Always critical.
    #[serde(default)]
    pub is_critical: bool,
}

const fn default_percentage_of_ability_duration() -> i32 {
    MAX_PERCENTAGE
}

impl Default for SkillData {
    fn default() -> Self {
        Self {
            name: String::new(),
            targeting: SkillTargetingData::default(),
            deployment: SkillDeploymentData::default(),
            zone: SkillZoneData::default(),
            projectile: SkillProjectileData::default(),
            beam: SkillBeamData::default(),
            dash: SkillDashData::default(),
            effect_package: EffectPackage::default(),
            percentage_of_ability_duration: MAX_PERCENTAGE,
            channel_time_ms: 0,
            is_critical: false,
        }
    }
}

impl SkillData {
    /// Whether deploying this skill needs an open position on the board.
    #[must_use]
    pub fn reserves_a_position(&self) -> bool {
        self.effect_package.has_effect(EffectType::Blink)
            || self.deployment.deployment_type == SkillDeploymentType::Dash
    }

    /// Whether the channel time may be omitted.
    #[must_use]
    pub const fn is_channel_time_optional(&self) -> bool {
        !matches!(self.deployment.deployment_type, SkillDeploymentType::Beam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EffectData;

    #[test]
    fn test_defaults_match_authoring_conventions() {
        let skill = SkillData::default();
        assert_eq!(skill.percentage_of_ability_duration, 100);
        assert_eq!(skill.targeting.guidance, Guidance::GROUND);
        assert_eq!(skill.targeting.tier, -1);
        assert!(skill.dash.land_behind);
    }

    #[test]
    fn test_reserves_a_position() {
        let mut skill = SkillData::default();
        assert!(!skill.reserves_a_position());
        skill.effect_package.effects.push(EffectData::blink());
        assert!(skill.reserves_a_position());

        let dash = SkillData {
            deployment: SkillDeploymentData {
                deployment_type: SkillDeploymentType::Dash,
                ..SkillDeploymentData::default()
            },
            ..SkillData::default()
        };
        assert!(dash.reserves_a_position());
    }

    #[test]
    fn test_density_only_for_shaped_deployments() {
        assert!(SkillTargetingData::supports_deployment_type(
            SkillTargetingType::Density,
            SkillDeploymentType::Beam
        ));
        assert!(!SkillTargetingData::supports_deployment_type(
            SkillTargetingType::Density,
            SkillDeploymentType::Direct
        ));
        assert!(SkillTargetingData::supports_deployment_type(
            SkillTargetingType::CurrentFocus,
            SkillDeploymentType::Direct
        ));
    }

    #[test]
    fn test_parse_skill_from_ron() {
        let text = r#"(
            name: "Slash",
            targeting: (type: DistanceCheck, group: Enemy, num: 2, lowest: true),
            deployment: (type: Direct, pre_deployment_delay_percentage: 20),
        )"#;
        let skill: SkillData = ron::from_str(text).unwrap();
        assert_eq!(skill.targeting.targeting_type, SkillTargetingType::DistanceCheck);
        assert_eq!(skill.targeting.group, AllegianceType::Enemy);
        assert_eq!(skill.targeting.num, 2);
        assert_eq!(skill.deployment.pre_deployment_delay_percentage, 20);
        assert_eq!(skill.percentage_of_ability_duration, 100);
    }
}
