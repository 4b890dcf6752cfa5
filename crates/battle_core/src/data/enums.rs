//! Small enums shared by the authored data.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// The three ability groups of a combat unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbilityType {
    /// Basic attacks, cycled continuously.
    Attack,
    /// The ultimate ability, gated by energy.
    Omega,
    /// Passive abilities fired by activation triggers.
    Innate,
}

impl AbilityType {
    /// All groups, in component order.
    pub const ALL: [Self; 3] = [Self::Attack, Self::Omega, Self::Innate];

    /// Position of this group in per-group arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Attack => 0,
            Self::Omega => 1,
            Self::Innate => 2,
        }
    }
}

/// Which entities a targeting group covers, relative to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AllegianceType {
    /// Unset; matches nothing.
    #[default]
    None,
    /// Only the sender itself.
    #[serde(rename = "Self")]
    Self_,
    /// Entities on the sender's team.
    Ally,
    /// Entities not on the sender's team.
    Enemy,
    /// Everybody.
    All,
}

impl AllegianceType {
    /// Swap ally and enemy, other values are unchanged.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Ally => Self::Enemy,
            Self::Enemy => Self::Ally,
            other => other,
        }
    }
}

/// Live stats known to the targeting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatType {
    /// Movement speed in sub units per time step.
    MoveSpeedSubUnits,
    /// Range of attack abilities in hexes.
    AttackRangeUnits,
    /// Range of omega abilities in hexes.
    OmegaRangeUnits,
    /// Attack completion percentage per second.
    AttackSpeed,
    /// Chance for attacks to be on target.
    HitChancePercentage,
    /// Chance to dodge incoming attacks.
    AttackDodgeChancePercentage,
    /// Sum of the three attack damage kinds.
    AttackDamage,
    /// Physical part of attack damage.
    AttackPhysicalDamage,
    /// Energy part of attack damage.
    AttackEnergyDamage,
    /// Pure part of attack damage.
    AttackPureDamage,
    /// Health cap.
    MaxHealth,
    /// Remaining health.
    CurrentHealth,
    /// Flat health gained per time step.
    HealthRegeneration,
    /// Energy needed to cast the omega ability.
    EnergyCost,
    /// Energy currently stored.
    CurrentEnergy,
    /// Energy damage reduction.
    EnergyResist,
    /// Physical damage reduction.
    PhysicalResist,
    /// Critical hit chance.
    CritChancePercentage,
    /// Omega power amplification.
    OmegaPowerPercentage,
    /// Damage reflected to attackers.
    Thorns,
    /// Flat physical damage reduction.
    Grit,
    /// Flat energy damage reduction.
    Resolve,
}

/// Events that can queue an innate ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivationTriggerType {
    /// Never fires.
    #[default]
    None,
    /// Once, when the battle starts.
    OnBattleStart,
    /// Periodically.
    EveryXTime,
    /// When the owner hits.
    OnHit,
    /// When the owner's shield is hit.
    OnShieldHit,
    /// When the owner deals a critical hit.
    OnDealCrit,
    /// When the owner misses.
    OnMiss,
    /// When the owner dodges.
    OnDodge,
    /// When the owner takes damage.
    OnDamage,
    /// When the owner vanquishes an enemy.
    OnVanquish,
    /// When the owner faints.
    OnFaint,
    /// When the owner assists a vanquish.
    OnAssist,
    /// When the owner's health enters a range.
    HealthInRange,
    /// After a number of ability activations.
    OnActivateXAbilities,
    /// After a number of deployed skills.
    OnDeployXSkills,
    /// When an entity comes within range.
    InRange,
    /// When energy is full.
    OnEnergyFull,
    /// After a number of received effect packages.
    OnReceiveXEffectPackages,
    /// When hyper becomes active.
    OnHyperactive,
}

/// How an ability group picks its next ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AbilitySelectionType {
    /// Always the first ability.
    #[default]
    None,
    /// `activations % len`.
    Cycle,
    /// Ability 0 while a stat is at or above the check value, otherwise ability 1.
    SelfAttributeCheck,
    /// Ability 0 while health percentage is at or above the check value, otherwise ability 1.
    SelfHealthCheck,
    /// Ability 0 for `activation_cadence` activations, then ability 1 once.
    EveryXActivations,
}

/// Comparison operator used by activation triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComparisonType {
    /// `left > right`.
    Greater,
    /// `left < right`.
    Less,
    /// `left == right`.
    #[default]
    Equal,
}

impl ComparisonType {
    /// Apply the comparison.
    #[must_use]
    pub fn evaluate(self, left: Fixed, right: Fixed) -> bool {
        match self {
            Self::Greater => left > right,
            Self::Less => left < right,
            Self::Equal => left == right,
        }
    }
}

bitflags! {
    /// Planes a skill can reach.
    ///
    /// Entities are on the ground unless an attached effect lifts them into the
    /// air or moves them underground.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Guidance: u8 {
        /// Entities standing on the board.
        const GROUND      = 1 << 0;
        /// Entities lifted off the board.
        const AIRBORNE    = 1 << 1;
        /// Entities burrowed under the board.
        const UNDERGROUND = 1 << 2;
    }
}

impl Default for Guidance {
    fn default() -> Self {
        Self::GROUND
    }
}

/// A combat affinity or class name, e.g. `"Water"` or `"Fighter"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatSynergy(pub String);

impl CombatSynergy {
    /// Wrap a synergy name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}
