//! Authored ability and skill data.
//!
//! These structs describe what an ability does, not its runtime state.
//! They are deserialized from RON, wrapped in [`std::sync::Arc`] and shared
//! read-only between every running instance created from them.
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading is handled by `battle_tools`.

mod ability_data;
mod effect_data;
mod enums;
mod skill_data;

pub use ability_data::{AbilitiesData, AbilityActivationTriggerData, AbilityData};
pub use effect_data::{EffectData, EffectPackage, EffectType, PlaneChange};
pub use enums::{
    AbilitySelectionType, AbilityType, ActivationTriggerType, AllegianceType, CombatSynergy,
    ComparisonType, Guidance, StatType,
};
pub use skill_data::{
    SkillBeamData, SkillDashData, SkillData, SkillDeploymentData, SkillDeploymentType,
    SkillProjectileData, SkillTargetingData, SkillTargetingType, SkillZoneData, ZoneShape,
};
