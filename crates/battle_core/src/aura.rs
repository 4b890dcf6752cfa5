//! Aura lifecycle.
//!
//! An aura is an entity of kind [`EntityKind::Aura`] carrying [`AuraData`].
//! While its holder and sender are alive and its duration has not run out,
//! it keeps its effect attached to every ally (or enemy, for debuff auras)
//! standing within its radius of the holder. Effects are attached with the
//! aura's id as `attached_from`, so destroying the aura strips them all.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::components::{AttachedEffect, AuraData, Entity, EntityId, EntityKind, INVALID_ENTITY_ID};
use crate::data::{AllegianceType, EffectData};
use crate::targeting::TargetingEngine;
use crate::time::{ms_to_time_steps, TIME_INFINITE};
use crate::world::{BattleEvent, EventSink, World};

/// Tracks, per aura entity, the receivers it currently affects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuraSystem {
    applied: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl AuraSystem {
    /// Empty system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an aura entity around `holder`, cast by `sender`.
    ///
    /// Its receivers are picked on the next [`AuraSystem::run`].
    pub fn spawn_aura(
        world: &mut World,
        sender: EntityId,
        holder: EntityId,
        effect: &EffectData,
        events: &mut impl EventSink,
    ) -> EntityId {
        let mut aura = Entity::new(INVALID_ENTITY_ID);
        aura.kind = EntityKind::Aura;
        aura.team = world.get(sender).map_or_else(Default::default, |e| e.team);
        aura.parent = Some(sender);
        aura.aura = Some(AuraData {
            holder,
            effect_sender: sender,
            effect: effect.clone(),
            created_at_time_step: world.time_step(),
        });
        let aura = world.spawn(aura);
        tracing::debug!(aura, holder, sender, radius = effect.radius_units, "Aura created");
        events.emit(BattleEvent::AuraCreated { aura, holder });
        aura
    }

    /// Receivers currently affected by `aura`.
    #[must_use]
    pub fn receivers(&self, aura: EntityId) -> Option<&BTreeSet<EntityId>> {
        self.applied.get(&aura)
    }

    /// Destroy or refresh every active aura, in id order.
    pub fn run(&mut self, world: &mut World, events: &mut impl EventSink) {
        let auras: Vec<EntityId> = world
            .entities()
            .iter_sorted()
            .filter(|e| e.active && e.is_aura())
            .map(|e| e.id)
            .collect();

        for aura in auras {
            if Self::should_destroy_aura(world, aura) {
                self.destroy_aura(world, aura, events);
            } else {
                self.refresh_aura_effects(world, aura, events);
            }
        }

        // Bookkeeping for auras removed from the world by someone else.
        let orphaned: Vec<EntityId> = self
            .applied
            .keys()
            .copied()
            .filter(|&aura| !world.entities().contains(aura))
            .collect();
        for aura in orphaned {
            self.remove_aura_effects(world, aura, events);
        }
    }

    /// Whether `aura` lost its holder or sender, or has expired.
    #[must_use]
    pub fn should_destroy_aura(world: &World, aura: EntityId) -> bool {
        let Some(data) = world.get(aura).and_then(|e| e.aura.as_ref()) else {
            return true;
        };
        let is_gone = |id: EntityId| world.entities().get_active(id).is_none();
        if is_gone(data.holder) || is_gone(data.effect_sender) {
            return true;
        }

        let duration_time_steps = ms_to_time_steps(data.effect.duration_ms);
        duration_time_steps != TIME_INFINITE && world.time_step() > data.created_at_time_step + duration_time_steps
    }

    /// Strip the aura's effects and remove the aura entity.
    pub fn destroy_aura(&mut self, world: &mut World, aura: EntityId, events: &mut impl EventSink) {
        self.remove_aura_effects(world, aura, events);
        world.entities_mut().remove(aura);
        tracing::debug!(aura, "Aura destroyed");
        events.emit(BattleEvent::AuraDestroyed { aura });
    }

    fn remove_aura_effects(&mut self, world: &mut World, aura: EntityId, events: &mut impl EventSink) {
        let Some(receivers) = self.applied.remove(&aura) else {
            return;
        };
        for receiver in receivers {
            detach(world, receiver, aura, events);
        }
    }

    /// Receivers `aura` should affect right now, in id order.
    #[must_use]
    pub fn find_aura_targets(world: &World, aura: EntityId) -> Vec<EntityId> {
        let Some(aura_entity) = world.get(aura) else {
            return Vec::new();
        };
        let Some(data) = aura_entity.aura.as_ref() else {
            return Vec::new();
        };
        let Some(holder) = world.get(data.holder) else {
            return Vec::new();
        };
        let Some(center) = holder.hex_position() else {
            return Vec::new();
        };

        let mut allegiance = if data.effect.aura_debuff {
            AllegianceType::Enemy
        } else {
            AllegianceType::Ally
        };
        if holder.team != aura_entity.team {
            allegiance = allegiance.inverted();
        }

        TargetingEngine::new(world).entities_within_range(
            data.holder,
            center,
            data.effect.radius_units,
            allegiance,
            allegiance == AllegianceType::Ally,
            |_| false,
        )
    }

    /// Detach from receivers that left the aura and attach to new ones.
    pub fn refresh_aura_effects(&mut self, world: &mut World, aura: EntityId, events: &mut impl EventSink) {
        let Some(data) = world.get(aura).and_then(|e| e.aura.clone()) else {
            return;
        };
        let targets: BTreeSet<EntityId> = Self::find_aura_targets(world, aura).into_iter().collect();
        let applied = self.applied.entry(aura).or_default();

        let left: Vec<EntityId> = applied.difference(&targets).copied().collect();
        for receiver in left {
            applied.remove(&receiver);
            detach(world, receiver, aura, events);
        }

        let effect = data.effect.aura_effect();
        for &receiver in &targets {
            if applied.contains(&receiver) {
                continue;
            }
            let Some(entity) = world.get_mut(receiver) else {
                continue;
            };
            entity
                .attached_effects
                .add(AttachedEffect::from_data(&effect, data.effect_sender, aura));
            applied.insert(receiver);
            tracing::debug!(aura, receiver, "Aura applies effect");
            events.emit(BattleEvent::EffectApplied {
                sender: data.effect_sender,
                receiver,
                attached_from: aura,
            });
        }
    }
}

fn detach(world: &mut World, receiver: EntityId, aura: EntityId, events: &mut impl EventSink) {
    let Some(entity) = world.get_mut(receiver) else {
        return;
    };
    if entity.attached_effects.remove_attached_from(aura) > 0 {
        events.emit(BattleEvent::EffectRemoved {
            receiver,
            attached_from: aura,
        });
    }
}
