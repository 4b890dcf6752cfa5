//! Test fixtures and helpers.
//!
//! Pre-built battlefields, units and abilities for consistent testing.

use std::sync::Arc;

use battle_core::abilities::AbilitiesComponent;
use battle_core::battle::Battle;
use battle_core::components::{Entity, EntityId};
use battle_core::config::{BattleConfig, EntityPlacement, Scenario};
use battle_core::data::{
    AbilitiesData, AbilityActivationTriggerData, AbilityData, ActivationTriggerType, AllegianceType,
    EffectData, EffectType, SkillData, SkillTargetingType, StatType,
};
use battle_core::grid_config::{HexGridConfig, Team};
use battle_core::hex::HexGridPosition;
use battle_core::world::World;
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Empty world of `width` x `height` hexes, 10 world units per hex.
///
/// # Panics
///
/// Panics if the size is not odd and positive.
#[must_use]
pub fn empty_world(width: i32, height: i32) -> World {
    let config = HexGridConfig::new(width, height).expect("odd board size");
    World::new(config, 10, 0).expect("positive grid scale")
}

/// Spawn a combat unit with 100 health.
pub fn spawn_unit(world: &mut World, team: Team, q: i32, r: i32, radius: i32) -> EntityId {
    let mut unit = Entity::combat_unit(team, HexGridPosition::new(q, r), radius);
    unit.stats.set(StatType::MaxHealth, fixed(100));
    unit.stats.set(StatType::CurrentHealth, fixed(100));
    world.spawn(unit)
}

/// Give `entity` the three ability groups.
///
/// # Panics
///
/// Panics if `entity` does not exist.
pub fn give_abilities(
    world: &mut World,
    entity: EntityId,
    attack: Vec<Arc<AbilityData>>,
    innate: Vec<Arc<AbilityData>>,
) {
    let group = |abilities| AbilitiesData {
        abilities,
        ..AbilitiesData::default()
    };
    world.get_mut(entity).expect("entity exists").abilities = Some(AbilitiesComponent::from_data(
        group(attack),
        AbilitiesData::default(),
        group(innate),
    ));
}

/// Instant damage effect.
#[must_use]
pub fn damage(value: i32) -> EffectData {
    EffectData {
        effect_type: EffectType::InstantDamage,
        value: fixed(value),
        ..EffectData::default()
    }
}

/// Skill hitting `num` receivers picked by `targeting_type` in `group`.
#[must_use]
pub fn skill(
    targeting_type: SkillTargetingType,
    group: AllegianceType,
    num: usize,
    effects: Vec<EffectData>,
) -> Arc<SkillData> {
    let mut skill = SkillData::default();
    skill.targeting.targeting_type = targeting_type;
    skill.targeting.group = group;
    skill.targeting.num = num;
    skill.effect_package.effects = effects;
    Arc::new(skill)
}

/// Ability lasting `total_duration_ms`, queued by `trigger`.
#[must_use]
pub fn ability(
    total_duration_ms: i32,
    trigger: ActivationTriggerType,
    skills: Vec<Arc<SkillData>>,
) -> Arc<AbilityData> {
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

/// Parse an ability from RON.
///
/// # Panics
///
/// Panics on malformed RON.
#[must_use]
pub fn ability_from_ron(text: &str) -> Arc<AbilityData> {
    Arc::new(ron::from_str(text).expect("valid ability RON"))
}

/// Builds a [`Battle`] from placements.
#[derive(Debug, Clone)]
pub struct BattlefieldBuilder {
    scenario: Scenario,
}

impl BattlefieldBuilder {
    /// Board of `width` x `height` hexes.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            scenario: Scenario {
                config: BattleConfig {
                    grid_width: width,
                    grid_height: height,
                    ..BattleConfig::default()
                },
                entities: Vec::new(),
            },
        }
    }

    /// Seed of the battle's random stream.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.scenario.config.random_seed = seed;
        self
    }

    /// Add a radius 1 unit with 100 health.
    #[must_use]
    pub fn unit(self, team: Team, q: i32, r: i32) -> Self {
        let mut placement = EntityPlacement::new(team, q, r);
        placement.stats.insert(StatType::MaxHealth, fixed(100));
        placement.stats.insert(StatType::CurrentHealth, fixed(100));
        self.placement(placement)
    }

    /// Add a custom placement.
    #[must_use]
    pub fn placement(mut self, placement: EntityPlacement) -> Self {
        self.scenario.entities.push(placement);
        self
    }

    /// The scenario built so far.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Build the battle.
    ///
    /// # Panics
    ///
    /// Panics if the board config is invalid.
    #[must_use]
    pub fn build(&self) -> Battle {
        Battle::from_scenario(&self.scenario).expect("valid battlefield")
    }
}

/// Two units per team facing each other, each attacking the unit across.
///
/// Attacks last 300 ms and deal 10 damage; the first blue unit also
/// buffs its team with an aura at battle start.
#[must_use]
pub fn skirmish(seed: u64) -> Battle {
    let attack = ability(
        300,
        ActivationTriggerType::None,
        vec![skill(SkillTargetingType::CurrentFocus, AllegianceType::Enemy, 1, vec![damage(10)])],
    );
    let aura = ability(
        0,
        ActivationTriggerType::OnBattleStart,
        vec![skill(
            SkillTargetingType::Self_,
            AllegianceType::Self_,
            1,
            vec![EffectData::aura(StatType::PhysicalResist, fixed(5), 6, -1)],
        )],
    );

    let mut battle = BattlefieldBuilder::new(21, 21)
        .seed(seed)
        .unit(Team::Blue, -3, 4)
        .unit(Team::Blue, 3, 4)
        .unit(Team::Red, -1, -4)
        .unit(Team::Red, 5, -4)
        .build();

    let world = battle.world_mut();
    for (attacker, target) in [(1, 3), (2, 4), (3, 1), (4, 2)] {
        let innate = if attacker == 1 { vec![Arc::clone(&aura)] } else { Vec::new() };
        give_abilities(world, attacker, vec![Arc::clone(&attack)], innate);
        if let Some(unit) = world.get_mut(attacker) {
            unit.focus = Some(target);
        }
    }
    battle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_places_units_in_order() {
        let battle = BattlefieldBuilder::new(11, 11)
            .unit(Team::Blue, 0, 3)
            .unit(Team::Red, 0, -3)
            .build();
        let world = battle.world();
        assert_eq!(world.entities().sorted_ids(), vec![1, 2]);
        assert_eq!(world.get(2).unwrap().team, Team::Red);
        assert_eq!(world.get(1).unwrap().stats.get(StatType::CurrentHealth), fixed(100));
    }

    #[test]
    fn test_ability_from_ron() {
        let ability = ability_from_ron("(name: \"Strike\", total_duration_ms: 500)");
        assert_eq!(ability.name, "Strike");
        assert_eq!(ability.total_duration_ms, 500);
        assert!(ability.skills.is_empty());
    }

    #[test]
    fn test_skirmish_is_valid() {
        let battle = skirmish(1);
        assert_eq!(battle.world().entities().len(), 4);
    }
}
