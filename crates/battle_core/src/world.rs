//! The battle world and the collaborators the core queries.
//!
//! [`World`] owns the entities, the board and the obstacle map. The
//! traits in this module are the narrow surfaces the targeting engine and
//! the ability state machine read through: live stats, synergies,
//! expression evaluation, randomness and event emission.

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{Entity, EntityId, EntityStorage};
use crate::data::{AbilityType, CombatSynergy, StatType};
use crate::error::{BattleError, Result};
use crate::grid::{ObstacleBuildParams, ReservationMode, SpatialGrid};
use crate::grid_config::HexGridConfig;
use crate::hex::HexGridPosition;
use crate::intersection;
use crate::math::{fixed_serde, Fixed, IVec2};

/// Live stat lookup.
pub trait StatsSource {
    /// Base stat plus attached modifiers. Zero for unknown entities.
    fn live_stat(&self, entity: EntityId, stat: StatType) -> Fixed;
}

/// Combat synergy lookup.
pub trait SynergySource {
    /// Whether `entity` has `synergy`.
    fn has_combat_synergy(&self, entity: EntityId, synergy: &CombatSynergy) -> bool;
}

/// Sender and receiver an expression is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionContext {
    /// Entity deploying the skill.
    pub sender: EntityId,
    /// Entity being ranked.
    pub receiver: EntityId,
}

/// Evaluates [`StatExpression`]s.
pub trait ExpressionEvaluator {
    /// Value of `expression` in `context`.
    fn evaluate(&self, expression: &StatExpression, context: ExpressionContext) -> Fixed;
}

/// Source of random integers.
pub trait RandomSource {
    /// Uniform integer in `[min, max)`; `min` when the range is empty.
    fn random_range(&mut self, min: i32, max: i32) -> i32;
}

/// Fire-and-forget event sink.
pub trait EventSink {
    /// Record an event.
    fn emit(&mut self, event: BattleEvent);
}

/// Deterministic [`RandomSource`] backed by ChaCha8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Seeded stream; equal seeds give equal streams.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn random_range(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..max)
    }
}

/// Events emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEvent {
    /// An ability started.
    AbilityActivated {
        /// Owner of the ability.
        entity: EntityId,
        /// Ability group.
        ability_type: AbilityType,
        /// Index in the group.
        index: usize,
    },
    /// An ability finished or was interrupted.
    AbilityDeactivated {
        /// Owner of the ability.
        entity: EntityId,
        /// Ability group.
        ability_type: AbilityType,
        /// Index in the group.
        index: usize,
    },
    /// A skill was deployed on its receivers.
    SkillDeployed {
        /// Sender of the skill.
        entity: EntityId,
        /// Index of the skill in its ability.
        skill_index: usize,
        /// Receivers, in targeting order.
        receivers: Vec<EntityId>,
    },
    /// An effect was attached to a receiver.
    EffectApplied {
        /// Entity that sent the effect.
        sender: EntityId,
        /// Entity the effect is attached to.
        receiver: EntityId,
        /// Entity the effect is attached from.
        attached_from: EntityId,
    },
    /// Effects attached from an entity were removed from a receiver.
    EffectRemoved {
        /// Entity the effects were attached to.
        receiver: EntityId,
        /// Entity the effects were attached from.
        attached_from: EntityId,
    },
    /// An aura entity was spawned.
    AuraCreated {
        /// The aura entity.
        aura: EntityId,
        /// Entity carrying the aura.
        holder: EntityId,
    },
    /// An aura was destroyed.
    AuraDestroyed {
        /// The aura entity.
        aura: EntityId,
    },
}

impl EventSink for Vec<BattleEvent> {
    fn emit(&mut self, event: BattleEvent) {
        self.push(event);
    }
}

/// Numeric expression over stats.
///
/// # Example RON
///
/// ```ron
/// Mul(ReceiverStat(CurrentHealth), Value(8589934592))  // Fixed-point for 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatExpression {
    /// A constant (fixed-point).
    Value(#[serde(with = "fixed_serde")] Fixed),
    /// Live stat of the entity being ranked.
    ReceiverStat(StatType),
    /// Live stat of the sender.
    SenderStat(StatType),
    /// Sum.
    Add(Box<StatExpression>, Box<StatExpression>),
    /// Difference.
    Sub(Box<StatExpression>, Box<StatExpression>),
    /// Product.
    Mul(Box<StatExpression>, Box<StatExpression>),
    /// Quotient; zero when dividing by zero.
    Div(Box<StatExpression>, Box<StatExpression>),
}

impl Default for StatExpression {
    fn default() -> Self {
        Self::Value(Fixed::ZERO)
    }
}

/// Evaluate `expression` against any [`StatsSource`].
pub fn evaluate_expression(
    stats: &impl StatsSource,
    expression: &StatExpression,
    context: ExpressionContext,
) -> Fixed {
    let eval = |e: &StatExpression| evaluate_expression(stats, e, context);
    match expression {
        StatExpression::Value(value) => *value,
        StatExpression::ReceiverStat(stat) => stats.live_stat(context.receiver, *stat),
        StatExpression::SenderStat(stat) => stats.live_stat(context.sender, *stat),
        StatExpression::Add(a, b) => eval(a).saturating_add(eval(b)),
        StatExpression::Sub(a, b) => eval(a).saturating_sub(eval(b)),
        StatExpression::Mul(a, b) => eval(a).saturating_mul(eval(b)),
        StatExpression::Div(a, b) => {
            let divisor = eval(b);
            if divisor == Fixed::ZERO {
                Fixed::ZERO
            } else {
                eval(a).saturating_div(divisor)
            }
        }
    }
}

/// Entities, board and board-wide settings of one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    entities: EntityStorage,
    grid: SpatialGrid,
    time_step: i32,
    battle_started: bool,
    grid_scale: i32,
}

impl World {
    /// Empty world on the given board.
    ///
    /// `grid_scale` converts hexes to world units; `middle_line_width` is the
    /// half height of the no-deploy band across the board center.
    pub fn new(grid_config: HexGridConfig, grid_scale: i32, middle_line_width: i32) -> Result<Self> {
        if grid_scale < 1 {
            return Err(BattleError::InvalidGridConfig(format!(
                "grid scale must be positive, got {grid_scale}"
            )));
        }
        Ok(Self {
            entities: EntityStorage::new(),
            grid: SpatialGrid::new(grid_config, middle_line_width),
            time_step: 0,
            battle_started: false,
            grid_scale,
        })
    }

    /// Entity storage.
    #[must_use]
    pub const fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Mutable entity storage.
    pub fn entities_mut(&mut self) -> &mut EntityStorage {
        &mut self.entities
    }

    /// Add an entity and return its id.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.entities.insert(entity)
    }

    /// Entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Entity by id, or [`BattleError::EntityNotFound`].
    pub fn try_get(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(id).ok_or(BattleError::EntityNotFound(id))
    }

    /// Obstacle map and spatial queries.
    #[must_use]
    pub const fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Board configuration.
    #[must_use]
    pub const fn grid_config(&self) -> &HexGridConfig {
        self.grid.config()
    }

    /// Current time step.
    #[must_use]
    pub const fn time_step(&self) -> i32 {
        self.time_step
    }

    /// Advance the time step counter.
    pub fn advance_time_step(&mut self) {
        self.time_step += 1;
    }

    /// Whether deployment is over.
    #[must_use]
    pub const fn battle_started(&self) -> bool {
        self.battle_started
    }

    /// Mark deployment as over.
    pub fn set_battle_started(&mut self, started: bool) {
        self.battle_started = started;
    }

    /// World units per hex.
    #[must_use]
    pub const fn grid_scale(&self) -> i32 {
        self.grid_scale
    }

    /// Rebuild the obstacle map from current entity positions.
    pub fn rebuild_obstacles(&mut self, params: &ObstacleBuildParams) {
        self.grid.rebuild_obstacles(&self.entities, params);
    }

    /// Reserve an open position for `entity` relative to `targets`.
    ///
    /// Rebuilds the obstacle map as a side effect. Returns the reserved
    /// position, or [`HexGridPosition::INVALID`] when none was found.
    pub fn try_to_reserve_position(
        &mut self,
        entity: EntityId,
        targets: &[EntityId],
        mode: ReservationMode,
    ) -> HexGridPosition {
        self.grid
            .try_to_reserve_position(&mut self.entities, entity, targets, mode)
    }

    /// Whether a footprint could stand at `center` now.
    #[must_use]
    pub fn is_valid_hexagon_position(&self, center: HexGridPosition, radius: i32, taking_space: bool) -> bool {
        self.grid.is_valid_hexagon_position(
            &self.entities,
            center,
            radius,
            taking_space,
            self.battle_started,
        )
    }

    /// Board position in world units.
    #[must_use]
    pub const fn to_world_position(&self, position: HexGridPosition) -> IVec2 {
        intersection::to_world_position(position, self.grid_scale)
    }

    /// Hex count converted to world units.
    #[must_use]
    pub const fn to_world_scalar(&self, value: i32) -> i32 {
        intersection::to_world_scalar(value, self.grid_scale)
    }

    /// Live health as a percentage of max health, zero without max health.
    #[must_use]
    pub fn health_percentage(&self, entity: EntityId) -> Fixed {
        let max = self.live_stat(entity, StatType::MaxHealth);
        if max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        self.live_stat(entity, StatType::CurrentHealth) * Fixed::from_num(100) / max
    }
}

impl StatsSource for World {
    fn live_stat(&self, entity: EntityId, stat: StatType) -> Fixed {
        self.entities.get(entity).map_or(Fixed::ZERO, |e| {
            e.stats.get(stat) + e.attached_effects.stat_modifier(stat)
        })
    }
}

impl SynergySource for World {
    fn has_combat_synergy(&self, entity: EntityId, synergy: &CombatSynergy) -> bool {
        self.entities
            .get(entity)
            .is_some_and(|e| e.synergies.contains(synergy))
    }
}

impl ExpressionEvaluator for World {
    fn evaluate(&self, expression: &StatExpression, context: ExpressionContext) -> Fixed {
        evaluate_expression(self, expression, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AttachedEffect;
    use crate::data::EffectData;
    use crate::grid_config::Team;

    fn world() -> World {
        World::new(HexGridConfig::new(11, 11).unwrap(), 10, 0).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        assert!(World::new(HexGridConfig::default(), 0, 0).is_err());
    }

    #[test]
    fn test_live_stat_includes_attached_effects() {
        let mut world = world();
        let mut unit = Entity::combat_unit(Team::Red, HexGridPosition::ZERO, 1);
        unit.stats.set(StatType::AttackDamage, Fixed::from_num(20));
        unit.attached_effects.add(AttachedEffect::from_data(
            &EffectData::buff(StatType::AttackDamage, Fixed::from_num(5)),
            1,
            1,
        ));
        let id = world.spawn(unit);
        assert_eq!(world.live_stat(id, StatType::AttackDamage), Fixed::from_num(25));
        assert_eq!(world.live_stat(99, StatType::AttackDamage), Fixed::ZERO);
    }

    #[test]
    fn test_expression_evaluation() {
        let mut world = world();
        let mut unit = Entity::combat_unit(Team::Red, HexGridPosition::ZERO, 1);
        unit.stats.set(StatType::CurrentHealth, Fixed::from_num(30));
        unit.stats.set(StatType::MaxHealth, Fixed::from_num(60));
        let id = world.spawn(unit);
        let context = ExpressionContext {
            sender: id,
            receiver: id,
        };

        let ratio = StatExpression::Div(
            Box::new(StatExpression::ReceiverStat(StatType::CurrentHealth)),
            Box::new(StatExpression::SenderStat(StatType::MaxHealth)),
        );
        assert_eq!(world.evaluate(&ratio, context), Fixed::from_num(0.5));

        let by_zero = StatExpression::Div(
            Box::new(StatExpression::Value(Fixed::from_num(1))),
            Box::new(StatExpression::Value(Fixed::ZERO)),
        );
        assert_eq!(world.evaluate(&by_zero, context), Fixed::ZERO);
        assert_eq!(world.health_percentage(id), Fixed::from_num(50));
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut a = SeededRandom::new(7);
        let mut b = SeededRandom::new(7);
        let draws_a: Vec<i32> = (0..16).map(|_| a.random_range(0, 100)).collect();
        let draws_b: Vec<i32> = (0..16).map(|_| b.random_range(0, 100)).collect();
        assert_eq!(draws_a, draws_b);
        assert!(draws_a.iter().all(|v| (0..100).contains(v)));
        assert_eq!(a.random_range(5, 5), 5);
    }

    #[test]
    fn test_world_position_scaling() {
        let world = world();
        assert_eq!(world.to_world_position(HexGridPosition::ZERO), IVec2::ZERO);
        let right = world.to_world_position(HexGridPosition::new(1, 0));
        assert_eq!(right, IVec2::new(17, 0));
        assert_eq!(world.to_world_scalar(1), 17);
    }
}
