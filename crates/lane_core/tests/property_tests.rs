//! Match-level properties of the lane battle simulation.
//!
//! Each module builds a small scenario on an otherwise empty map and checks
//! one rule the simulation must keep on every tick.

use lane_core::entity::{EntityState, Team};
use lane_core::layout::{spawn_point, LaneId};
use lane_core::math::Fixed;
use lane_core::rng::SeededRng;
use lane_core::stats::DamageStats;
use lane_test_utils::fixtures::{blank_map, duel, no_miss_config, ratio, ScriptedRng};

fn physical(amount: i32) -> DamageStats {
    DamageStats {
        physical: Fixed::from_num(amount),
        ..DamageStats::default()
    }
}

fn lethal() -> DamageStats {
    DamageStats {
        true_damage: Fixed::from_num(100_000),
        ..DamageStats::default()
    }
}

// =============================================================================
// Mitigation
// =============================================================================

mod mitigation {
    use super::*;
    use lane_core::entity::Entity;
    use lane_core::math::Vec2Fixed;
    use lane_core::stats::{mitigate, HealthStats};

    #[test]
    fn test_hundred_physical_into_thirty_armor() {
        let defense = HealthStats {
            max_health: Fixed::from_num(500),
            armor: Fixed::from_num(30),
            ..HealthStats::default()
        };
        let dealt = mitigate(&defense, &physical(100));
        assert!((dealt - ratio(7692, 100)).abs() < ratio(1, 100), "dealt {dealt}");
    }

    #[test]
    fn test_player_takes_mitigated_damage() {
        // Level 1 players carry 30 armor.
        let mut player = Entity::new_player("A", Team::Blue, Vec2Fixed::ZERO);
        let before = player.health();
        let applied = player.take_damage(&physical(100));
        assert_eq!(player.health(), before - applied);
        assert!((applied - ratio(7692, 100)).abs() < ratio(1, 100));
    }
}

// =============================================================================
// Wave merging
// =============================================================================

mod merging {
    use super::*;

    #[test]
    fn test_close_waves_collapse_into_leader() {
        let mut map = blank_map(no_miss_config());
        let lead = map.spawn_wave(LaneId::Mid, Team::Blue, false).unwrap();
        let trail = map.spawn_wave(LaneId::Mid, Team::Blue, false).unwrap();
        map.entity_mut(trail).unwrap().take_damage(&physical(60));

        let combined = map.entity(lead).unwrap().health() + map.entity(trail).unwrap().health();
        assert_eq!(combined, Fixed::from_num(150));

        // Tick 5 runs the merge pass and is not a spawn tick.
        map.step(5, false, &mut SeededRng::new(0));

        assert!(map.entity(trail).is_none(), "trailing wave must leave the world");
        let merged = map.entity(lead).unwrap();
        assert_eq!(merged.health(), combined);
        assert_eq!(merged.stats.max_health(), Fixed::from_num(200));
        let blue: Vec<_> = map.lane(LaneId::Mid).unwrap().units(Team::Blue).iter().map(|u| u.entity).collect();
        assert_eq!(blue, vec![lead]);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn test_distant_waves_stay_apart() {
        let mut map = blank_map(no_miss_config());
        let first = map.spawn_wave(LaneId::Mid, Team::Blue, false).unwrap();
        let mut rng = SeededRng::new(0);
        // Six non-merge ticks at 3 units each.
        for tick in [1, 2, 3, 4, 6, 7] {
            map.step(tick, false, &mut rng);
        }
        let second = map.spawn_wave(LaneId::Mid, Team::Blue, false).unwrap();
        map.step(10, false, &mut rng);

        assert!(map.entity(first).is_some());
        assert!(map.entity(second).is_some());
        assert_eq!(map.entity(first).unwrap().stats.max_health(), Fixed::from_num(100));
    }

    #[test]
    fn test_merge_skipped_off_period() {
        let mut map = blank_map(no_miss_config());
        let lead = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let trail = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        map.step(3, false, &mut SeededRng::new(0));
        assert!(map.entity(lead).is_some());
        assert!(map.entity(trail).is_some());
    }
}

// =============================================================================
// Combat resolution
// =============================================================================

mod combat {
    use super::*;
    use lane_core::commands::PlayerCommand;
    use lane_core::simulation::Simulator;
    use lane_core::stats::mitigate;
    use lane_test_utils::fixtures::field;

    #[test]
    fn test_damage_tick_exchanges_hits() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::EngageCombat).unwrap();

        let blue_damage = sim.map().entity(ids.blue).unwrap().get_damage();
        let red_damage = sim.map().entity(ids.red).unwrap().get_damage();
        let blue_defense = sim.map().entity(ids.blue).unwrap().stats.effective().health;
        let red_defense = sim.map().entity(ids.red).unwrap().stats.effective().health;

        sim.step_n(4);
        assert_eq!(sim.map().entity(ids.red).unwrap().health(), red_defense.max_health);

        sim.step();
        let red = sim.map().entity(ids.red).unwrap();
        let blue = sim.map().entity(ids.blue).unwrap();
        assert_eq!(red.health(), red_defense.max_health - mitigate(&red_defense, &blue_damage));
        assert_eq!(blue.health(), blue_defense.max_health - mitigate(&blue_defense, &red_damage));
        assert_eq!(red.state(), EntityState::Combat);
    }

    #[test]
    fn test_misses_deal_nothing() {
        let mut config = no_miss_config();
        config.miss_chance_percent = 20;
        let mut map = blank_map(config);
        let a = map.spawn_player("A", Team::Blue, field(0));
        let d = map.spawn_player("D", Team::Red, field(10));
        // Both rolls of the first damage tick land under the miss chance.
        let mut sim = Simulator::from_map(map, ScriptedRng::new([Fixed::ZERO, Fixed::ZERO], []));

        sim.apply_command("A", PlayerCommand::EngageCombat).unwrap();
        sim.step_n(5);
        for id in [a, d] {
            let entity = sim.map().entity(id).unwrap();
            assert_eq!(entity.health(), entity.stats.max_health());
        }
        assert_eq!(sim.rng().remaining(), (0, 0));
    }

    #[test]
    fn test_empty_side_ends_combat_and_releases_members() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::EngageCombat).unwrap();
        assert_eq!(sim.map().combats().len(), 1);

        sim.map_mut().entity_mut(ids.red).unwrap().take_damage(&lethal());
        sim.step();

        assert!(sim.map().combats().is_empty());
        assert_eq!(sim.map().entity(ids.blue).unwrap().state(), EntityState::Normal);
        assert_eq!(sim.map().entity(ids.red).unwrap().state(), EntityState::Respawning);
        assert!(sim.map().check_invariants().is_ok());
    }

    #[test]
    fn test_disengage_ends_after_countdown() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        let combat = sim.map_mut().engage_combat(ids.blue).unwrap();
        sim.apply_command("D", PlayerCommand::Disengage { combat }).unwrap();
        assert!(sim.apply_command("D", PlayerCommand::Disengage { combat }).is_err());

        let ticks = u64::from(sim.map().config().disengage_ticks());
        sim.step_n(ticks - 1);
        assert_eq!(sim.map().combats().len(), 1);
        sim.step();
        assert!(sim.map().combats().is_empty());
        for id in [ids.blue, ids.red] {
            assert_eq!(sim.map().entity(id).unwrap().state(), EntityState::Normal);
        }
    }

    #[test]
    fn test_fight_to_the_end_keeps_single_membership() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::EngageCombat).unwrap();
        for _ in 0..400 {
            sim.step();
            assert!(sim.map().check_invariants().is_ok());
            if sim.map().combats().is_empty() {
                break;
            }
        }
        assert!(sim.map().combats().is_empty());
        let states = [ids.blue, ids.red].map(|id| sim.map().entity(id).unwrap().state());
        assert!(states.contains(&EntityState::Respawning), "{states:?}");
    }
}

// =============================================================================
// Rewards
// =============================================================================

mod rewards {
    use super::*;
    use lane_core::math::Vec2Fixed;

    fn gold(map: &lane_core::map::Map, id: lane_core::entity::EntityId) -> Fixed {
        map.entity(id).unwrap().player().unwrap().inventory.gold
    }

    #[test]
    fn test_shared_reward_is_scaled_then_halved() {
        let mut map = blank_map(no_miss_config());
        let wave = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let a = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(725, 10));
        let b = map.spawn_player("B", Team::Blue, Vec2Fixed::from_ints(715, 0));

        let applied = map.entity_mut(wave).unwrap().take_damage(&physical(60));
        assert_eq!(applied, Fixed::from_num(50));
        map.step(1, false, &mut SeededRng::new(0));

        let expected = applied * map.config().reward_share_multiplier() / Fixed::from_num(2);
        assert_eq!(gold(&map, a), expected);
        assert_eq!(gold(&map, b), expected);
        assert!((expected - ratio(65, 2)).abs() < ratio(1, 1000));
        assert_eq!(map.entity(a).unwrap().stats.leveled().experience(), expected);
        assert_eq!(map.entity(wave).unwrap().pending_reward(), Fixed::ZERO);
    }

    #[test]
    fn test_single_recipient_takes_whole_pool() {
        let mut map = blank_map(no_miss_config());
        let wave = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let a = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(725, 10));
        map.spawn_player("B", Team::Blue, Vec2Fixed::from_ints(600, 0));

        map.entity_mut(wave).unwrap().take_damage(&physical(60));
        map.step(1, false, &mut SeededRng::new(0));
        assert_eq!(gold(&map, a), Fixed::from_num(50));
    }

    #[test]
    fn test_reward_without_recipients_is_dropped() {
        let mut map = blank_map(no_miss_config());
        let wave = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let far = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(300, 100));

        map.entity_mut(wave).unwrap().take_damage(&physical(60));
        map.step(1, false, &mut SeededRng::new(0));
        assert_eq!(map.entity(wave).unwrap().pending_reward(), Fixed::ZERO);
        assert_eq!(gold(&map, far), Fixed::ZERO);
    }

    #[test]
    fn test_killed_wave_pays_out_before_removal() {
        let mut map = blank_map(no_miss_config());
        let wave = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let a = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(725, 10));

        map.entity_mut(wave).unwrap().take_damage(&lethal());
        map.step(1, false, &mut SeededRng::new(0));
        assert!(map.entity(wave).is_none());
        // Reward is capped by the health actually removed.
        assert_eq!(gold(&map, a), Fixed::from_num(100));
    }
}

// =============================================================================
// Respawn and recall
// =============================================================================

mod lifecycle {
    use super::*;
    use lane_core::commands::PlayerCommand;
    use lane_test_utils::fixtures::field;

    #[test]
    fn test_respawn_after_exact_duration() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.map_mut().entity_mut(ids.blue).unwrap().take_damage(&lethal());
        assert_eq!(sim.map().entity(ids.blue).unwrap().state(), EntityState::Dead);

        sim.step();
        let spawn = spawn_point(Team::Blue).unwrap();
        let player = sim.map().entity(ids.blue).unwrap();
        assert_eq!(player.state(), EntityState::Respawning);
        assert_eq!(player.position, spawn);

        let ticks = sim.map().config().respawn_ticks();
        for _ in 1..ticks {
            sim.step();
            let player = sim.map().entity(ids.blue).unwrap();
            assert_eq!(player.state(), EntityState::Respawning);
            assert_eq!(player.health(), Fixed::ZERO);
        }
        sim.step();
        let player = sim.map().entity(ids.blue).unwrap();
        assert_eq!(player.state(), EntityState::Normal);
        assert_eq!(player.health(), player.stats.max_health());
        assert_eq!(player.position, spawn);
        assert_eq!(player.player().unwrap().respawn_timer, None);
    }

    #[test]
    fn test_recall_teleports_home() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::StartRecall).unwrap();
        let ticks = u64::from(sim.map().config().recall_ticks());
        sim.step_n(ticks - 1);
        assert_eq!(sim.map().entity(ids.blue).unwrap().state(), EntityState::Recalling);
        sim.step();
        let player = sim.map().entity(ids.blue).unwrap();
        assert_eq!(player.state(), EntityState::Normal);
        assert_eq!(player.position, spawn_point(Team::Blue).unwrap());
    }

    #[test]
    fn test_stop_recall_keeps_position() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::StartRecall).unwrap();
        sim.step_n(5);
        sim.apply_command("A", PlayerCommand::StopRecall).unwrap();

        let player = sim.map().entity(ids.blue).unwrap();
        assert_eq!(player.state(), EntityState::Normal);
        assert_eq!(player.player().unwrap().recall_timer, None);
        assert!(sim.apply_command("A", PlayerCommand::StopRecall).is_err());

        sim.step_n(u64::from(sim.map().config().recall_ticks()));
        assert_eq!(sim.map().entity(ids.blue).unwrap().position, field(0));
    }

    #[test]
    fn test_move_order_cancels_recall() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::StartRecall).unwrap();
        sim.step_n(10);
        let target = field(-50);
        sim.apply_command("A", PlayerCommand::MoveTo { target }).unwrap();
        let player = sim.map().entity(ids.blue).unwrap();
        assert_eq!(player.state(), EntityState::Normal);
        assert_eq!(player.player().unwrap().recall_timer, None);
    }
}

// =============================================================================
// Player commands
// =============================================================================

mod commands {
    use super::*;
    use lane_core::commands::PlayerCommand;
    use lane_core::entity::EntityId;
    use lane_core::error::SimError;
    use lane_core::map::Map;
    use lane_core::math::Vec2Fixed;
    use lane_core::stats::mitigate;
    use lane_test_utils::fixtures::field;

    fn give_gold(map: &mut Map, id: EntityId, amount: i32) {
        map.entity_mut(id).unwrap().player_mut().unwrap().inventory.gold = Fixed::from_num(amount);
    }

    #[test]
    fn test_purchase_away_from_spawn_is_rejected() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        give_gold(sim.map_mut(), ids.blue, 1000);
        let result = sim.apply_command("A", PlayerCommand::BuyItem { item: "Sword".to_string() });
        assert_eq!(result, Err(SimError::NotAtSpawn(ids.blue)));
        let data = sim.map().entity(ids.blue).unwrap().player().unwrap();
        assert!(data.inventory.items().is_empty());
        assert_eq!(data.inventory.gold, Fixed::from_num(1000));
    }

    #[test]
    fn test_purchase_at_spawn_applies_item_stats() {
        let mut map = blank_map(no_miss_config());
        let a = map.spawn_player("A", Team::Blue, spawn_point(Team::Blue).unwrap());
        give_gold(&mut map, a, 400);
        let before = map.entity(a).unwrap().get_damage().physical;

        map.buy_item(a, "Sword").unwrap();

        let player = map.entity(a).unwrap();
        assert_eq!(player.get_damage().physical, before + Fixed::from_num(15));
        let data = player.player().unwrap();
        assert_eq!(data.inventory.items(), ["Sword".to_string()]);
        assert_eq!(data.inventory.gold, Fixed::from_num(50));
        assert!(matches!(map.buy_item(a, "Sword"), Err(SimError::InsufficientGold { .. })));
    }

    #[test]
    fn test_purchase_preserves_missing_health() {
        let mut map = blank_map(no_miss_config());
        let a = map.spawn_player("A", Team::Blue, spawn_point(Team::Blue).unwrap());
        give_gold(&mut map, a, 10);
        map.entity_mut(a).unwrap().take_damage(&physical(100));
        let player = map.entity(a).unwrap();
        let old_max = player.stats.max_health();
        let missing = old_max - player.health();
        assert!(missing > Fixed::ZERO);

        map.buy_item(a, "Mega").unwrap();

        let player = map.entity(a).unwrap();
        assert_eq!(player.stats.max_health(), old_max + Fixed::from_num(1000));
        assert_eq!(player.health(), player.stats.max_health() - missing);
    }

    #[test]
    fn test_join_nearby_combat_cancels_recall() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        let combat = sim.map_mut().engage_combat(ids.blue).unwrap();
        let b = sim.map_mut().spawn_player("B", Team::Blue, field(-40));
        sim.apply_command("B", PlayerCommand::StartRecall).unwrap();

        sim.apply_command("B", PlayerCommand::JoinCombat).unwrap();

        let joined = sim.map().entity(b).unwrap();
        assert_eq!(joined.state(), EntityState::Combat);
        assert_eq!(joined.player().unwrap().recall_timer, None);
        assert!(sim.map().combat(combat).unwrap().bucket(Team::Blue).contains(&b));
        assert_eq!(sim.find_combat_in_range("B").unwrap(), Some(combat));
        assert!(sim.map().check_invariants().is_ok());
    }

    #[test]
    fn test_join_out_of_range_or_twice_is_rejected() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.map_mut().engage_combat(ids.blue).unwrap();
        let c = sim.map_mut().spawn_player("C", Team::Blue, field(-100));

        assert_eq!(
            sim.apply_command("C", PlayerCommand::JoinCombat),
            Err(SimError::NoCombatInRange(c))
        );
        assert!(sim.apply_command("D", PlayerCommand::JoinCombat).is_err());
        assert_eq!(sim.map().combats()[0].members().len(), 2);
    }

    #[test]
    fn test_attacking_player_hits_on_damage_ticks_only() {
        let mut map = blank_map(no_miss_config());
        let wave = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let a = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(715, 0));
        map.attack_lane_entity(a).unwrap();
        assert_eq!(map.entity(a).unwrap().attacking, Some(wave));

        let mut rng = SeededRng::new(0);
        map.step(1, false, &mut rng);
        let target = map.entity(wave).unwrap();
        assert_eq!(target.health(), target.stats.max_health());

        let hit = mitigate(&target.stats.effective().health, &map.entity(a).unwrap().get_damage());
        map.step(2, true, &mut rng);
        let target = map.entity(wave).unwrap();
        assert_eq!(target.health(), target.stats.max_health() - hit);
    }

    #[test]
    fn test_stop_attacking_ends_player_damage() {
        let mut map = blank_map(no_miss_config());
        let wave = map.spawn_wave(LaneId::Mid, Team::Red, false).unwrap();
        let a = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(715, 0));
        map.attack_lane_entity(a).unwrap();

        map.stop_attacking(a).unwrap();
        assert_eq!(map.entity(a).unwrap().attacking, None);
        assert_eq!(map.stop_attacking(a), Err(SimError::NotAttacking(a)));

        map.step(1, true, &mut SeededRng::new(0));
        let target = map.entity(wave).unwrap();
        assert_eq!(target.health(), target.stats.max_health());
    }

    #[test]
    fn test_attack_without_target_in_range() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        assert_eq!(
            sim.apply_command("A", PlayerCommand::AttackLaneEntity),
            Err(SimError::NoTargetInRange(ids.blue))
        );
    }
}

// =============================================================================
// Path following
// =============================================================================

mod movement {
    use super::*;
    use lane_core::commands::PlayerCommand;
    use lane_core::error::SimError;
    use lane_core::layout::MAP_WIDTH;
    use lane_core::math::Vec2Fixed;
    use lane_core::simulation::Simulator;
    use lane_test_utils::fixtures::field;

    #[test]
    fn test_close_target_snaps_exactly() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        // One step covers 17 / 5 units; tolerance is 3.
        sim.apply_command("A", PlayerCommand::MoveTo { target: field(-5) }).unwrap();
        sim.step();
        let player = sim.map().entity(ids.blue).unwrap();
        assert_eq!(player.position, field(-5));
        assert!(player.path.is_none());
    }

    #[test]
    fn test_far_target_advances_one_step() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("A", PlayerCommand::MoveTo { target: field(-100) }).unwrap();
        sim.step();
        let player = sim.map().entity(ids.blue).unwrap();
        let moved = field(0).distance(player.position);
        assert!((moved - ratio(17, 5)).abs() < ratio(1, 1000), "moved {moved}");
        assert!(player.path.is_some());
    }

    #[test]
    fn test_off_map_target_is_rejected() {
        let mut sim = Simulator::new(1);
        let far = Vec2Fixed::from_ints(100_000, 0);
        let result = sim.apply_command("A", PlayerCommand::MoveTo { target: far });
        assert_eq!(
            result,
            Err(SimError::OutOfBounds {
                x: far.x,
                y: far.y
            })
        );
        let player = sim.get_player_by_id("A").unwrap();
        assert!(player.path.is_none());
        sim.step_n(5);

        let corner = Vec2Fixed::from_ints(MAP_WIDTH, MAP_WIDTH / 2);
        sim.apply_command("A", PlayerCommand::MoveTo { target: corner }).unwrap();
        sim.step_n(5);
        assert!(sim.get_player_by_id("A").unwrap().path.is_some());
    }

    #[test]
    fn test_follow_reaches_moving_target() {
        let (mut sim, ids) = duel(ScriptedRng::always_hit());
        sim.apply_command("D", PlayerCommand::MoveTo { target: field(40) }).unwrap();
        sim.apply_command("A", PlayerCommand::Follow { target: ids.red }).unwrap();
        sim.step_n(30);
        let blue = sim.map().entity(ids.blue).unwrap();
        let red = sim.map().entity(ids.red).unwrap();
        assert!(blue.path.is_none());
        assert_eq!(red.position, field(40));
        assert!(blue.position.within(red.position, Fixed::from_num(10)));
    }
}
