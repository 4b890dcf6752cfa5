//! Effects carried by a skill's effect package.

use serde::{Deserialize, Serialize};

use super::enums::StatType;
use crate::math::{fixed_serde, Fixed};
use crate::time::TIME_INFINITE;

/// What an effect does to its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EffectType {
    /// Instant damage.
    #[default]
    InstantDamage,
    /// Instant heal.
    InstantHeal,
    /// Timed stat increase.
    Buff,
    /// Timed stat decrease.
    Debuff,
    /// Teleport to a reserved open position.
    Blink,
    /// Moves the receiver to another plane (see [`PlaneChange`]).
    PlaneChange,
    /// Spawns an aura on the receiver that keeps a buff or debuff on
    /// everybody around it.
    Aura,
}

impl EffectType {
    /// Effects that stay attached to the receiver.
    #[must_use]
    pub const fn is_attached(self) -> bool {
        matches!(self, Self::Buff | Self::Debuff | Self::PlaneChange)
    }
}

/// Plane an entity is moved to by an attached effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaneChange {
    /// Stays on the ground.
    #[default]
    None,
    /// Lifted into the air.
    Airborne,
    /// Burrowed underground.
    Underground,
}

/// A single effect.
///
/// # Example RON
///
/// ```ron
/// EffectData(
///     effect_type: Aura,
///     stat: Some(AttackDamage),
///     value: 42949672960,  // Fixed-point for 10.0
///     duration_ms: -1,
///     radius_units: 15,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectData {
    /// What the effect does.
    pub effect_type: EffectType,

    /// Stat changed by buffs, debuffs and auras.
    #[serde(default)]
    pub stat: Option<StatType>,

    /// Magnitude (fixed-point).
    #[serde(with = "fixed_serde", default)]
    pub value: Fixed,

    /// Lifetime in ms, [`TIME_INFINITE`] for permanent.
    #[serde(default = "default_duration")]
    pub duration_ms: i32,

    /// Aura radius in hexes.
    #[serde(default)]
    pub radius_units: i32,

    /// Target plane of a plane change effect.
    #[serde(default)]
    pub plane_change: PlaneChange,

    /// For auras: whether the aura carries a debuff instead of a buff.
    #[serde(default)]
    pub aura_debuff: bool,
}

const fn default_duration() -> i32 {
    TIME_INFINITE
}

impl Default for EffectData {
    fn default() -> Self {
        Self {
            effect_type: EffectType::default(),
            stat: None,
            value: Fixed::ZERO,
            duration_ms: default_duration(),
            radius_units: 0,
            plane_change: PlaneChange::default(),
            aura_debuff: false,
        }
    }
}

impl EffectData {
    /// A permanent buff of `value` on `stat`.
    #[must_use]
    pub fn buff(stat: StatType, value: Fixed) -> Self {
        Self {
            effect_type: EffectType::Buff,
            stat: Some(stat),
            value,
            duration_ms: TIME_INFINITE,
            radius_units: 0,
            plane_change: PlaneChange::None,
            aura_debuff: false,
        }
    }

    /// A permanent debuff of `value` on `stat`.
    #[must_use]
    pub fn debuff(stat: StatType, value: Fixed) -> Self {
        Self {
            effect_type: EffectType::Debuff,
            ..Self::buff(stat, value)
        }
    }

    /// An aura of `radius_units` buffing `stat` by `value` around its holder.
    #[must_use]
    pub fn aura(stat: StatType, value: Fixed, radius_units: i32, duration_ms: i32) -> Self {
        Self {
            effect_type: EffectType::Aura,
            radius_units,
            duration_ms,
            ..Self::buff(stat, value)
        }
    }

    /// A blink to a reserved position.
    #[must_use]
    pub fn blink() -> Self {
        Self {
            effect_type: EffectType::Blink,
            stat: None,
            value: Fixed::ZERO,
            duration_ms: 0,
            radius_units: 0,
            plane_change: PlaneChange::None,
            aura_debuff: false,
        }
    }

    /// Effect applied to each receiver of an aura built from this data.
    #[must_use]
    pub fn aura_effect(&self) -> Self {
        Self {
            effect_type: if self.aura_debuff {
                EffectType::Debuff
            } else {
                EffectType::Buff
            },
            radius_units: 0,
            ..self.clone()
        }
    }
}

/// The effects a skill applies to every receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectPackage {
    /// Effects, applied in order.
    #[serde(default)]
    pub effects: Vec<EffectData>,

    /// Every deployment of this package is a critical hit.
    #[serde(default)]
    pub always_crit: bool,
}

impl EffectPackage {
    /// True if any effect has the given type.
    #[must_use]
    pub fn has_effect(&self, effect_type: EffectType) -> bool {
        self.effects.iter().any(|e| e.effect_type == effect_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aura_effect_is_a_buff_unless_flagged() {
        let aura = EffectData::aura(StatType::AttackDamage, Fixed::from_num(5), 15, TIME_INFINITE);
        let applied = aura.aura_effect();
        assert_eq!(applied.effect_type, EffectType::Buff);
        assert_eq!(applied.stat, Some(StatType::AttackDamage));

        let debuff_aura = EffectData {
            aura_debuff: true,
            ..aura
        };
        assert_eq!(debuff_aura.aura_effect().effect_type, EffectType::Debuff);
    }

    #[test]
    fn test_parse_from_ron_with_defaults() {
        let effect: EffectData = ron::from_str("(effect_type: Blink)").unwrap();
        assert_eq!(effect.effect_type, EffectType::Blink);
        assert_eq!(effect.duration_ms, TIME_INFINITE);
        assert_eq!(effect.plane_change, PlaneChange::None);
    }

    #[test]
    fn test_default_matches_parsed_defaults() {
        let parsed: EffectData = ron::from_str("(effect_type: InstantDamage)").unwrap();
        assert_eq!(EffectData::default(), parsed);
        assert_eq!(EffectData::default().duration_ms, TIME_INFINITE);
    }
}
