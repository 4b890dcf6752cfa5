//! Entity and component definitions.
//!
//! Components are plain data. An [`Entity`] is a bag of optional
//! components; systems only look at entities carrying what they need.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::abilities::AbilitiesComponent;
use crate::data::{AllegianceType, CombatSynergy, EffectData, EffectType, PlaneChange, StatType};
use crate::grid_config::Team;
use crate::hex::HexGridPosition;
use crate::math::{fixed_map_serde, fixed_serde, Fixed};
use crate::time::{ms_to_time_steps, TIME_INFINITE};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Id never assigned to an entity.
pub const INVALID_ENTITY_ID: EntityId = 0;

/// Board footprint of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Center of the hexagon.
    pub position: HexGridPosition,
    /// Hexagon radius in hexes.
    pub radius: i32,
    /// Blocks other entities.
    pub taking_space: bool,
    /// Other entities may stand on it even though it takes space.
    pub overlapable: bool,
    /// Position claimed for an upcoming move, or [`HexGridPosition::INVALID`].
    pub reserved_position: HexGridPosition,
}

impl Position {
    /// A space-taking footprint without reservation.
    #[must_use]
    pub const fn new(position: HexGridPosition, radius: i32) -> Self {
        Self {
            position,
            radius,
            taking_space: true,
            overlapable: false,
            reserved_position: HexGridPosition::INVALID,
        }
    }

    /// Whether a move target is reserved.
    #[must_use]
    pub const fn has_reserved_position(&self) -> bool {
        self.reserved_position.is_valid()
    }
}

/// Combat unit specific data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombatUnit {
    /// Spawned by and bound to another combat unit.
    pub is_pet: bool,
    /// Ranger class units are never picked by tier targeting.
    pub is_ranger: bool,
    /// Tier of the unit.
    pub tier: i32,
}

/// What an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityKind {
    /// A fighter (or pet).
    CombatUnit(CombatUnit),
    /// A shield standing in for its owner.
    Shield {
        /// Entity protected by the shield.
        owner: EntityId,
    },
    /// An aura bound to a holder.
    Aura,
    /// Anything else (zones, projectiles, markers).
    #[default]
    Other,
}

/// Per-sender policy for previously targeted entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteringState {
    /// Never pick an entity twice.
    pub only_new_targets: bool,
    /// Pick previously targeted entities only when nobody else is left.
    pub prioritize_new_targets: bool,
    /// Entities targeted so far.
    pub old_targets: BTreeSet<EntityId>,
}

impl FilteringState {
    /// Whether `id` was targeted before.
    #[must_use]
    pub fn has_old_target(&self, id: EntityId) -> bool {
        self.old_targets.contains(&id)
    }
}

/// A buff, debuff or plane change attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedEffect {
    /// Kind of effect.
    pub effect_type: EffectType,
    /// Modified stat.
    pub stat: Option<StatType>,
    /// Modifier value (fixed-point).
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
    /// Plane the receiver is moved to.
    pub plane_change: PlaneChange,
    /// Entity the effect came from (aura, zone, ...).
    pub attached_from: EntityId,
    /// Entity that sent the effect.
    pub sender: EntityId,
    /// Last time step the effect is attached, [`TIME_INFINITE`] for never.
    pub expires_at_time_step: i32,
}

impl AttachedEffect {
    /// Build an attached effect from authored data.
    #[must_use]
    pub fn from_data(data: &EffectData, sender: EntityId, attached_from: EntityId) -> Self {
        Self {
            effect_type: data.effect_type,
            stat: data.stat,
            value: data.value,
            plane_change: data.plane_change,
            attached_from,
            sender,
            expires_at_time_step: TIME_INFINITE,
        }
    }

    /// Attach for the data's duration, counted from `time_step`.
    #[must_use]
    pub fn timed(mut self, data: &EffectData, time_step: i32) -> Self {
        let duration = ms_to_time_steps(data.duration_ms);
        if duration != TIME_INFINITE {
            self.expires_at_time_step = time_step + duration;
        }
        self
    }
}

/// Every effect attached to an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedEffects {
    effects: Vec<AttachedEffect>,
}

impl AttachedEffects {
    /// Attach an effect.
    pub fn add(&mut self, effect: AttachedEffect) {
        self.effects.push(effect);
    }

    /// Remove every effect attached from `attached_from`. Returns how many were removed.
    pub fn remove_attached_from(&mut self, attached_from: EntityId) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| e.attached_from != attached_from);
        before - self.effects.len()
    }

    /// Remove effects whose last time step is before `time_step`.
    ///
    /// Returns the `attached_from` of every removed effect, deduplicated.
    pub fn remove_expired(&mut self, time_step: i32) -> BTreeSet<EntityId> {
        let mut removed = BTreeSet::new();
        self.effects.retain(|e| {
            let expired = e.expires_at_time_step != TIME_INFINITE && e.expires_at_time_step < time_step;
            if expired {
                removed.insert(e.attached_from);
            }
            !expired
        });
        removed
    }

    /// Whether an effect attached from `attached_from` is present.
    #[must_use]
    pub fn has_effect_from(&self, attached_from: EntityId) -> bool {
        self.effects.iter().any(|e| e.attached_from == attached_from)
    }

    /// Whether some effect moves the entity to `plane`.
    #[must_use]
    pub fn has_plane_change(&self, plane: PlaneChange) -> bool {
        self.effects.iter().any(|e| e.plane_change == plane)
    }

    /// Net modifier of buffs and debuffs on `stat`.
    #[must_use]
    pub fn stat_modifier(&self, stat: StatType) -> Fixed {
        self.effects
            .iter()
            .filter(|e| e.stat == Some(stat))
            .fold(Fixed::ZERO, |sum, e| match e.effect_type {
                EffectType::Buff => sum + e.value,
                EffectType::Debuff => sum - e.value,
                _ => sum,
            })
    }

    /// Iterate over attached effects in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = &AttachedEffect> {
        self.effects.iter()
    }

    /// Number of attached effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Base stats of an entity, before attached effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(with = "fixed_map_serde")]
    values: BTreeMap<StatType, Fixed>,
}

impl Stats {
    /// Base value of `stat`, zero when unset.
    #[must_use]
    pub fn get(&self, stat: StatType) -> Fixed {
        self.values.get(&stat).copied().unwrap_or(Fixed::ZERO)
    }

    /// Set the base value of `stat`.
    pub fn set(&mut self, stat: StatType, value: Fixed) {
        self.values.insert(stat, value);
    }

    /// Builder style [`Self::set`].
    #[must_use]
    pub fn with(mut self, stat: StatType, value: Fixed) -> Self {
        self.set(stat, value);
        self
    }

    /// Iterate over set stats in stat order.
    pub fn iter(&self) -> impl Iterator<Item = (&StatType, &Fixed)> {
        self.values.iter()
    }
}

/// Aura component: keeps an effect on everybody around its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuraData {
    /// Entity the aura is centered on.
    pub holder: EntityId,
    /// Entity that cast the aura.
    pub effect_sender: EntityId,
    /// Authored aura effect; `radius_units` is the aura radius.
    pub effect: EffectData,
    /// Time step the aura was created at.
    pub created_at_time_step: i32,
}

/// An entity with optional components.
///
/// Entities are composed of optional components. Only components that are
/// `Some` are active for this entity. This allows flexible entity composition
/// without a full ECS framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Board footprint.
    pub position: Option<Position>,
    /// Team, [`Team::None`] for neutral entities.
    pub team: Team,
    /// Entity that spawned this one.
    pub parent: Option<EntityId>,
    /// What the entity is.
    pub kind: EntityKind,
    /// Inactive entities are ignored by every query.
    pub active: bool,
    /// Entity currently focused by this one.
    pub focus: Option<EntityId>,
    /// Entity that made this one faint.
    pub vanquisher: Option<EntityId>,
    /// Policy for previously targeted entities.
    pub filtering: Option<FilteringState>,
    /// Enemies cannot target this entity.
    pub untargetable: bool,
    /// Buffs, debuffs and plane changes.
    pub attached_effects: AttachedEffects,
    /// Base stats.
    pub stats: Stats,
    /// Combat synergies (affinities and classes).
    pub synergies: BTreeSet<CombatSynergy>,
    /// Abilities of combat units.
    pub abilities: Option<AbilitiesComponent>,
    /// Aura data of aura entities.
    pub aura: Option<AuraData>,
}

impl Entity {
    /// Create a new active entity with the given ID and no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            position: None,
            team: Team::None,
            parent: None,
            kind: EntityKind::Other,
            active: true,
            focus: None,
            vanquisher: None,
            filtering: None,
            untargetable: false,
            attached_effects: AttachedEffects::default(),
            stats: Stats::default(),
            synergies: BTreeSet::new(),
            abilities: None,
            aura: None,
        }
    }

    /// A combat unit of `team` standing at `position`.
    #[must_use]
    pub fn combat_unit(team: Team, position: HexGridPosition, radius: i32) -> Self {
        Self {
            team,
            position: Some(Position::new(position, radius)),
            kind: EntityKind::CombatUnit(CombatUnit::default()),
            ..Self::new(INVALID_ENTITY_ID)
        }
    }

    /// Combat unit data, if this is a combat unit.
    #[must_use]
    pub const fn combat_unit_data(&self) -> Option<&CombatUnit> {
        match &self.kind {
            EntityKind::CombatUnit(unit) => Some(unit),
            _ => None,
        }
    }

    /// Whether this is a combat unit (pets included).
    #[must_use]
    pub const fn is_combat_unit(&self) -> bool {
        matches!(self.kind, EntityKind::CombatUnit(_))
    }

    /// Whether this is a pet.
    #[must_use]
    pub const fn is_pet(&self) -> bool {
        matches!(self.kind, EntityKind::CombatUnit(CombatUnit { is_pet: true, .. }))
    }

    /// Whether this is an aura.
    #[must_use]
    pub const fn is_aura(&self) -> bool {
        matches!(self.kind, EntityKind::Aura)
    }

    /// Owner of a shield entity.
    #[must_use]
    pub const fn shield_owner(&self) -> Option<EntityId> {
        match self.kind {
            EntityKind::Shield { owner } => Some(owner),
            _ => None,
        }
    }

    /// Whether both entities are on the same, non-neutral team.
    #[must_use]
    pub fn is_allied_with(&self, other: &Self) -> bool {
        self.team != Team::None && self.team == other.team
    }

    /// Active combat unit.
    #[must_use]
    pub const fn is_combat_unit_alive(&self) -> bool {
        self.active && self.is_combat_unit()
    }

    /// Active, on the board and taking space.
    #[must_use]
    pub fn is_collidable(&self) -> bool {
        self.active && self.position.is_some_and(|p| p.taking_space)
    }

    /// Whether the entity can be picked under `allegiance`.
    ///
    /// Untargetable entities can still be picked by their allies.
    #[must_use]
    pub fn is_targetable(&self, allegiance: AllegianceType) -> bool {
        self.is_collidable() && (allegiance != AllegianceType::Enemy || !self.untargetable)
    }

    /// Board position, if any.
    #[must_use]
    pub fn hex_position(&self) -> Option<HexGridPosition> {
        self.position.map(|p| p.position)
    }

    /// Footprint radius, zero without a position.
    #[must_use]
    pub fn radius(&self) -> i32 {
        self.position.map_or(0, |p| p.radius)
    }
}

/// Storage for all entities in a battle.
///
/// Uses a `HashMap` for O(1) entity lookup by ID, with deterministic
/// iteration via sorted keys. Ids are handed out in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStorage {
    /// Map of entity ID to entity data.
    entities: HashMap<EntityId, Entity>,
    /// Next entity ID to assign.
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Get an active entity by ID.
    #[must_use]
    pub fn get_active(&self, id: EntityId) -> Option<&Entity> {
        self.get(id).filter(|e| e.active)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over entities in id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Entity> {
        self.sorted_ids()
            .into_iter()
            .filter_map(move |id| self.entities.get(&id))
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }
}

impl Default for EntityStorage {
    fn default() -> Self {
        Self::new()
    }
}
