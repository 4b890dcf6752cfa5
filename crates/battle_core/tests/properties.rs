//! Property tests for timers, receiver filtering and position search.

use std::collections::BTreeSet;
use std::sync::Arc;

use battle_core::prelude::*;
use battle_core::targeting::sort_entities_by;
use battle_core::time::MS_PER_TIME_STEP;
use battle_core::abilities::ActivatorContext;
use battle_test_utils::fixtures::{ability, empty_world, fixed, spawn_unit};
use battle_test_utils::strategies::{arb_entity_ids, arb_hex_position, arb_radius, arb_team};
use proptest::prelude::*;

fn arb_skill_data() -> impl Strategy<Value = SkillData> {
    (0..=100i32, 0..=100i32, 0..=100i32, 0..5000i32).prop_map(|(percentage, delay, retarget, channel)| {
        let mut skill = SkillData::default();
        skill.percentage_of_ability_duration = percentage;
        skill.deployment.pre_deployment_delay_percentage = delay;
        skill.deployment.pre_deployment_retargeting_percentage = retarget;
        skill.channel_time_ms = channel;
        skill
    })
}

proptest! {
    #[test]
    fn test_skill_timers_stay_nested(
        data in arb_skill_data(),
        total in 0..10_000i32,
        truncate in any::<bool>(),
    ) {
        let mut skill = SkillState::new(0, Arc::new(data));
        skill.update_timers(total, None, truncate);

        prop_assert!(skill.duration_ms >= 0);
        prop_assert!(skill.duration_ms <= total);
        prop_assert!(skill.pre_deployment_delay_ms <= skill.duration_ms);
        prop_assert!(skill.pre_deployment_retargeting_ms <= skill.pre_deployment_delay_ms);
        prop_assert!(skill.channel_time_ms >= 0);
        prop_assert!(skill.channel_time_ms <= skill.duration_ms - skill.pre_deployment_delay_ms);
        if truncate {
            prop_assert_eq!(skill.duration_ms % MS_PER_TIME_STEP, 0);
            prop_assert_eq!(skill.pre_deployment_delay_ms % MS_PER_TIME_STEP, 0);
            prop_assert_eq!(skill.pre_deployment_retargeting_ms % MS_PER_TIME_STEP, 0);
        }
    }

    #[test]
    fn test_zero_duration_abilities_deploy_every_skill_instantly(
        skills in proptest::collection::vec(arb_skill_data(), 1..5),
        ability_type in prop_oneof![Just(AbilityType::Attack), Just(AbilityType::Omega), Just(AbilityType::Innate)],
    ) {
        let data = ability(0, ActivationTriggerType::None, skills.into_iter().map(Arc::new).collect());
        let mut state = AbilityState::new(data, ability_type, 0);

        prop_assert!(state.is_instant());
        while !state.is_finished() {
            prop_assert!(state.current_skill().is_some_and(SkillState::is_instant));
            prop_assert!(state.can_deploy_current_skill_instantly());
            state.increment_current_skill_index();
        }
    }

    #[test]
    fn test_filter_receivers_bounds(
        ranked in arb_entity_ids(12),
        num in 0..8usize,
        ignored_picks in proptest::collection::vec(any::<bool>(), 12),
        old_picks in proptest::collection::vec(any::<bool>(), 12),
        only_new in any::<bool>(),
        prioritize_new in any::<bool>(),
    ) {
        let mut world = empty_world(11, 11);
        let sender = spawn_unit(&mut world, Team::Blue, 0, 2, 1);
        let pick = |picks: &[bool]| -> BTreeSet<EntityId> {
            ranked.iter().zip(picks).filter(|(_, picked)| **picked).map(|(&id, _)| id).collect()
        };
        let ignored = pick(&ignored_picks);
        let old_targets = pick(&old_picks);
        world.get_mut(sender).unwrap().filtering = Some(FilteringState {
            only_new_targets: only_new,
            prioritize_new_targets: prioritize_new,
            old_targets: old_targets.clone(),
        });

        let receivers = TargetingEngine::new(&world).filter_receivers(sender, &ranked, num, &ignored);

        if num != 0 {
            prop_assert!(receivers.len() <= num);
        }
        let unique: BTreeSet<EntityId> = receivers.iter().copied().collect();
        prop_assert_eq!(unique.len(), receivers.len());
        for id in &receivers {
            prop_assert!(ranked.contains(id));
            prop_assert!(!ignored.contains(id));
            if only_new {
                prop_assert!(!old_targets.contains(id));
            }
        }
        if !only_new && prioritize_new {
            // Old targets only ever follow new ones.
            let first_old = receivers.iter().position(|id| old_targets.contains(id));
            if let Some(first_old) = first_old {
                prop_assert!(receivers[first_old..].iter().all(|id| old_targets.contains(id)));
            }
            if num == 0 {
                prop_assert!(first_old.is_none());
            }
        }
    }

    #[test]
    fn test_sort_ties_keep_ascending_ids(
        ids in arb_entity_ids(16),
        buckets in 1..4u64,
        ascending in any::<bool>(),
    ) {
        let mut sorted = ids.clone();
        sort_entities_by(&mut sorted, ascending, |id| id % buckets);

        prop_assert_eq!(sorted.len(), ids.len());
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0] % buckets, pair[1] % buckets);
            if a == b {
                prop_assert!(pair[0] < pair[1]);
            } else if ascending {
                prop_assert!(a < b);
            } else {
                prop_assert!(a > b);
            }
        }
    }

    #[test]
    fn test_touching_footprints_are_not_taken(
        center in arb_hex_position(8),
        other in arb_hex_position(8),
        radius in arb_radius(),
        other_radius in arb_radius(),
        team in arb_team(),
    ) {
        let mut world = empty_world(21, 21);
        spawn_unit(&mut world, team, other.q, other.r, other_radius);
        let taken = is_hexagon_position_taken(world.entities(), center, radius, &BTreeSet::new());
        prop_assert_eq!(taken, center.distance(other) < radius + other_radius);
    }

    #[test]
    fn test_open_position_is_free_after_rebuild(
        units in proptest::collection::vec((arb_hex_position(6), arb_radius()), 0..8),
        target in arb_hex_position(8),
        radius in 1..=2i32,
    ) {
        let mut world = empty_world(21, 21);
        for (position, unit_radius) in &units {
            spawn_unit(&mut world, Team::Red, position.q, position.r, *unit_radius);
        }
        world.rebuild_obstacles(&ObstacleBuildParams::for_radius(radius));

        let found = world.grid().open_position_nearby(target, radius, 0);
        if found.is_valid() {
            prop_assert!(world.grid_config().is_hexagon_in_grid_limits(found, radius, 0, 0));
            prop_assert!(!is_hexagon_position_taken(world.entities(), found, radius, &BTreeSet::new()));
        }
    }

    #[test]
    fn test_every_skill_sequence_finishes(
        skills in proptest::collection::vec(arb_skill_data(), 1..4),
        total in 1..2000i32,
        ability_type in prop_oneof![Just(AbilityType::Omega), Just(AbilityType::Innate)],
    ) {
        let skill_count = skills.len();
        let skills = skills
            .into_iter()
            .map(|mut skill| {
                skill.targeting.targeting_type = SkillTargetingType::Self_;
                skill.targeting.group = AllegianceType::Self_;
                Arc::new(skill)
            })
            .collect();
        let group = AbilitiesData {
            abilities: vec![ability(total, ActivationTriggerType::None, skills)],
            ..AbilitiesData::default()
        };
        let mut world = empty_world(11, 11);
        let caster = spawn_unit(&mut world, Team::Blue, 0, 0, 1);
        world.get_mut(caster).unwrap().abilities = Some(match ability_type {
            AbilityType::Omega => AbilitiesComponent::from_data(AbilitiesData::default(), group, AbilitiesData::default()),
            _ => AbilitiesComponent::from_data(AbilitiesData::default(), AbilitiesData::default(), group),
        });
        let mut battle = Battle::new(world, BattleConfig::default());
        battle.activate_ability(caster, AbilityRef::new(ability_type, 0)).unwrap();

        // Each skill lasts at most the whole ability.
        let max_ticks = skill_count * (usize::try_from(total / MS_PER_TIME_STEP).unwrap() + 2) + 2;
        for _ in 0..max_ticks {
            battle.tick();
        }
        let abilities = battle.world().get(caster).unwrap().abilities.as_ref().unwrap();
        prop_assert!(!abilities.has_active_ability());
        let state = abilities.ability(AbilityRef::new(ability_type, 0)).unwrap();
        prop_assert!(state.skills.iter().all(|skill| skill.state == SkillStateType::Finished));
    }

    #[test]
    fn test_shield_targets_like_its_owner(
        owner_position in arb_hex_position(6),
        enemies in proptest::collection::vec(arb_hex_position(8), 1..6),
        targeting_type in prop_oneof![
            Just(SkillTargetingType::DistanceCheck),
            Just(SkillTargetingType::CombatStatCheck),
            Just(SkillTargetingType::Allegiance),
            Just(SkillTargetingType::InZone),
        ],
        group in prop_oneof![Just(AllegianceType::Enemy), Just(AllegianceType::All)],
        num in 0..4usize,
        lowest in any::<bool>(),
        radius in 0..6i32,
    ) {
        let mut world = empty_world(21, 21);
        let owner = spawn_unit(&mut world, Team::Blue, owner_position.q, owner_position.r, 1);
        for (index, position) in enemies.iter().enumerate() {
            let enemy = spawn_unit(&mut world, Team::Red, position.q, position.r, 1);
            let health = fixed(10 + i32::try_from(index).unwrap());
            world.get_mut(enemy).unwrap().stats.set(StatType::CurrentHealth, health);
        }
        let mut shield = Entity::new(INVALID_ENTITY_ID);
        shield.kind = EntityKind::Shield { owner };
        shield.team = Team::Blue;
        let shield = world.spawn(shield);

        let mut skill = SkillData::default();
        skill.targeting.targeting_type = targeting_type;
        skill.targeting.group = group;
        skill.targeting.num = num;
        skill.targeting.lowest = lowest;
        skill.targeting.radius_units = radius;
        skill.targeting.stat_type = Some(StatType::CurrentHealth);

        let engine = TargetingEngine::new(&world);
        let resolve = |sender| {
            engine
                .resolve_skill_targets(&mut SeededRandom::new(3), sender, None, &skill, &BTreeSet::new())
                .receiver_ids
        };
        prop_assert_eq!(resolve(shield), resolve(owner));
    }

    #[test]
    fn test_repeated_triggers_queue_one_context(repeats in 1..6usize) {
        let mut world = empty_world(11, 11);
        let holder = spawn_unit(&mut world, Team::Blue, 0, 2, 1);
        let attacker = spawn_unit(&mut world, Team::Red, 0, -2, 1);
        let on_hit = ability(300, ActivationTriggerType::OnHit, Vec::new());
        world.get_mut(holder).unwrap().abilities = Some(AbilitiesComponent::from_data(
            AbilitiesData::default(),
            AbilitiesData::default(),
            AbilitiesData {
                abilities: vec![on_hit],
                ..AbilitiesData::default()
            },
        ));
        let mut battle = Battle::new(world, BattleConfig::default());
        let context = ActivatorContext {
            sender_entity_id: attacker,
            sender_combat_unit_entity_id: attacker,
            ..ActivatorContext::default()
        };

        let queued: usize = (0..repeats)
            .map(|_| battle.queue_trigger(holder, ActivationTriggerType::OnHit, context))
            .sum();

        prop_assert_eq!(queued, 1);
        let abilities = battle.world().get(holder).unwrap().abilities.as_ref().unwrap();
        let state = abilities.ability(AbilityRef::innate(0)).unwrap();
        prop_assert_eq!(state.activator_contexts.len(), 1);
    }
}
