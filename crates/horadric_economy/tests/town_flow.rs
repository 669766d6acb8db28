//! Town visits, pickup and mark persistence against the simulated game.

use std::path::PathBuf;

use horadric_core::{
    GameSnapshot, Item, ItemType, Location, LocationKind, MonsterRank, NearbyObject, Position, Quality, SourceKind,
    Stat,
};
use horadric_economy::{
    CharacterConfig, ConfigStore, ControlSignal, Economy, EconomyError, InterruptGate, LevelTables,
    MemoryConfigStore, RecordingSink, RerollCategory, RuleSet, SimulatedGame, TomlConfigStore,
};

const STASHES: [LocationKind; 2] = [LocationKind::Stash, LocationKind::SharedStash];

fn temp_dir() -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("test_horadric_town_{id}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn inv(unit: u32, name: &str, item_type: ItemType, quality: Quality) -> Item {
    let slot = unit as i32;
    Item::new(unit, name, item_type, quality).at(Location::new(
        LocationKind::Inventory,
        Position::new(slot % 10, slot / 10),
    ))
}

fn stashed(unit: u32, name: &str, item_type: ItemType, quality: Quality) -> Item {
    let slot = unit as i32;
    Item::new(unit, name, item_type, quality)
        .at(Location::on_page(LocationKind::Stash, 0, Position::new(slot % 10, slot / 10)))
}

fn config() -> CharacterConfig {
    let mut config = CharacterConfig::default();
    config.character.name = "sorc".into();
    config
}

fn world(items: Vec<Item>) -> GameSnapshot {
    GameSnapshot {
        items,
        ..GameSnapshot::default()
    }
}

// ============================================================================
// TOWN VISIT
// ============================================================================

#[test]
fn test_first_visit_stashes_everything_then_stops_amnesty() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::default();
    let sink = RecordingSink::new();
    let mut economy = Economy::new(config(), &rules, &store).with_sink(&sink);
    let mut game = SimulatedGame::new(world(vec![
        inv(1, "Ring", ItemType::Ring, Quality::Rare),
        inv(2, "Monarch", ItemType::Shield, Quality::Normal),
    ]));

    let report = economy.town_visit(&mut game).unwrap();

    let first = report.first_run.unwrap();
    assert_eq!(first.stashed.len(), 2);
    assert!(!economy.session.first_run);
    assert!(game.items_at(LocationKind::Inventory).is_empty());
    // First-run stashes are never announced.
    assert!(sink.received().is_empty());
}

#[test]
fn test_second_visit_keeps_unwanted_items() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::default();
    let mut economy = Economy::new(config(), &rules, &store);
    economy.session.first_run = false;
    let mut game = SimulatedGame::new(world(vec![inv(1, "Monarch", ItemType::Shield, Quality::Normal)]));

    let report = economy.town_visit(&mut game).unwrap();

    assert!(report.first_run.is_none());
    assert!(report.stash.unwrap().stashed.is_empty());
    assert_eq!(game.items_at(LocationKind::Inventory).len(), 1);
}

#[test]
fn test_quantity_cap_drops_and_blacklists() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::from_toml("[[rules]]\nname = \"Ring\"\nmax_quantity = 1\n").unwrap();
    let sink = RecordingSink::new();
    let mut economy = Economy::new(config(), &rules, &store).with_sink(&sink);
    economy.session.first_run = false;
    let mut game = SimulatedGame::new(world(vec![
        stashed(1, "Ring", ItemType::Ring, Quality::Rare),
        inv(2, "Ring", ItemType::Ring, Quality::Rare),
    ]));

    let report = economy.town_visit(&mut game).unwrap();

    let stash = report.stash.unwrap();
    assert_eq!(stash.dropped.len(), 1);
    assert!(stash.stashed.is_empty());
    assert_eq!(game.items_at(LocationKind::Ground).len(), 1);
    assert!(economy.session.is_blacklisted(horadric_core::UnitId(2)));
    assert!(sink.received().is_empty());
}

#[test]
fn test_keeper_stash_notifies() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::from_toml("[[rules]]\nname = \"Ring\"\nmin_quality = \"Unique\"\n").unwrap();
    let sink = RecordingSink::new();
    let mut economy = Economy::new(config(), &rules, &store).with_sink(&sink);
    economy.session.first_run = false;
    let mut game = SimulatedGame::new(world(vec![inv(1, "Ring", ItemType::Ring, Quality::Unique)]));

    economy.town_visit(&mut game).unwrap();

    assert_eq!(game.count("Ring", &STASHES), 1);
    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].item.as_ref().map(|it| it.name.as_str()), Some("Ring"));
}

#[test]
fn test_jewel_reservation_boundary_sequential() {
    let mut config = config();
    config.cube_recipes.enabled = true;
    config.cube_recipes.enabled_recipes = vec!["Blood Amulet".into()];
    config.cube_recipes.jewels_to_keep = 2;
    let store = MemoryConfigStore::new();
    let rules = RuleSet::default();
    let mut economy = Economy::new(config, &rules, &store);
    economy.session.first_run = false;
    let mut game = SimulatedGame::new(GameSnapshot::default());

    let mut outcomes = Vec::new();
    for unit in 1..=3 {
        game.world_mut().items.push(inv(unit, "Jewel", ItemType::Jewel, Quality::Magic));
        let report = economy.stash_inventory(&mut game).unwrap();
        outcomes.push(!report.stashed.is_empty());
    }

    assert_eq!(outcomes, vec![true, true, false]);
    assert_eq!(game.count("Jewel", &STASHES), 2);
    assert_eq!(game.count("Jewel", &[LocationKind::Inventory]), 1);
}

#[test]
fn test_jewel_batch_stashes_up_to_limit_in_one_pass() {
    let mut config = config();
    config.cube_recipes.enabled = true;
    config.cube_recipes.enabled_recipes = vec!["Blood Amulet".into()];
    config.cube_recipes.jewels_to_keep = 2;
    let store = MemoryConfigStore::new();
    let rules = RuleSet::default();
    let mut economy = Economy::new(config, &rules, &store);
    economy.session.first_run = false;
    let mut game = SimulatedGame::new(world(
        (1..=3).map(|unit| inv(unit, "Jewel", ItemType::Jewel, Quality::Magic)).collect(),
    ));

    let report = economy.stash_inventory(&mut game).unwrap();

    assert_eq!(report.stashed.len(), 2);
    assert_eq!(game.count("Jewel", &STASHES), 2);
    let left: Vec<u32> = game.items_at(LocationKind::Inventory).iter().map(|it| it.unit_id.0).collect();
    assert_eq!(left, vec![3]);
}

#[test]
fn test_full_stash_reports_exhausted_item() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::from_toml("[[rules]]\nitem_type = \"Ring\"\n").unwrap();
    let mut economy = Economy::new(config(), &rules, &store);
    economy.session.first_run = false;
    let mut game = SimulatedGame::new(world(vec![inv(1, "Ring", ItemType::Ring, Quality::Rare)])).with_tab_capacity(0);

    let report = economy.stash_inventory(&mut game).unwrap();

    assert_eq!(report.exhausted, vec![horadric_core::UnitId(1)]);
    assert_eq!(game.items_at(LocationKind::Inventory).len(), 1);
}

#[test]
fn test_stop_signal_ends_visit() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::default();
    let (control, gate) = InterruptGate::channel();
    let mut economy = Economy::new(config(), &rules, &store).with_gate(gate);
    let mut game = SimulatedGame::new(world(vec![inv(1, "Ring", ItemType::Ring, Quality::Rare)]));

    control.send(ControlSignal::Stop).unwrap();

    assert_eq!(economy.town_visit(&mut game), Err(EconomyError::Stopped));
    assert!(game.log().is_empty());
}

#[test]
fn test_all_mules_full_escapes_visit() {
    let mut config = config();
    config.muling.enabled = true;
    config.muling.mules = vec!["mule1".into()];
    config.muling.current_mule_index = 1;
    config.stash.shared_pages = 1;
    config.stash.page_slots = 1;
    let store = MemoryConfigStore::new();
    let rules = RuleSet::default();
    let mut economy = Economy::new(config, &rules, &store);
    let mut game = SimulatedGame::new(world(vec![Item::new(1, "Ring", ItemType::Ring, Quality::Rare).at(
        Location::on_page(LocationKind::SharedStash, 0, Position::new(0, 0)),
    )]));

    let result = economy.town_visit(&mut game);

    assert!(matches!(result, Err(EconomyError::AllMulesFull { mules: 1 })));
}

// ============================================================================
// PICKUP AND PERSISTENCE
// ============================================================================

fn ground_amulet_world() -> GameSnapshot {
    let mut snapshot = world(vec![Item::new(50, "Amulet", ItemType::Amulet, Quality::Magic)
        .unidentified()
        .with_affixes(&[412], &[])
        .with_stats(vec![Stat::new(7, 0, 20)])
        .at(Location::new(LocationKind::Ground, Position::new(100, 100)))]);
    snapshot.nearby.push(NearbyObject {
        kind: SourceKind::Corpse,
        monster: Some("Fallen".into()),
        rank: MonsterRank::Normal,
        position: Position::new(103, 100),
    });
    snapshot
}

#[test]
fn test_pickup_marks_identifies_and_persists() {
    let dir = temp_dir();
    let store = TomlConfigStore::new(&dir);
    let mut config = config();
    config.cube_recipes.specific_item_to_reroll = "Amulet".into();
    store.save("sorc", &config).unwrap();

    let tables = LevelTables::default().with_monster("Fallen", [10, 40, 70]);
    let rules = RuleSet::default();
    let mut game = SimulatedGame::new(ground_amulet_world());

    let fingerprint = {
        let mut economy = Economy::load("sorc", &rules, &store).unwrap();
        let report = economy.pick_up_ground_items(&mut game, &tables).unwrap();
        assert_eq!(report.picked.len(), 1);
        assert_eq!(report.marked, vec![(horadric_core::UnitId(50), RerollCategory::Magic)]);

        let state = economy.marks.state(RerollCategory::Magic).clone();
        assert!(!state.fingerprint.is_empty());
        assert!(!economy.marks.is_dirty());

        economy.session.first_run = false;
        let stash = economy.stash_inventory(&mut game).unwrap();
        assert_eq!(stash.stashed.len(), 1);
        state.fingerprint
    };

    let persisted = store.load("sorc").unwrap();
    assert_eq!(persisted.cube_recipes.marked_magic_fingerprint, fingerprint);

    // A restart re-finds the item by fingerprint alone.
    let mut restarted = Economy::load("sorc", &rules, &store).unwrap();
    assert!(!restarted.marks.state(RerollCategory::Magic).handle.is_set());
    restarted.rehydrate(game.world());
    assert_eq!(restarted.marks.state(RerollCategory::Magic).handle, horadric_core::UnitId(50));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_pickup_out_of_window_not_marked() {
    let store = MemoryConfigStore::new();
    let mut config = config();
    config.cube_recipes.specific_item_to_reroll = "Amulet".into();
    config.cube_recipes.min_monster_level = 50;
    let tables = LevelTables::default().with_monster("Fallen", [10, 40, 70]);
    let rules = RuleSet::default();
    let mut economy = Economy::new(config, &rules, &store);
    let mut game = SimulatedGame::new(ground_amulet_world());

    let report = economy.pick_up_ground_items(&mut game, &tables).unwrap();

    assert_eq!(report.picked.len(), 1);
    assert!(report.marked.is_empty());
    assert!(!economy.marks.state(RerollCategory::Magic).is_active());
    assert_eq!(store.save_count(), 0);
}

#[test]
fn test_pickup_skipped_while_guard_held() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::from_toml("[[rules]]\nname = \"Amulet\"\n").unwrap();
    let lock = std::sync::Arc::new(horadric_economy::PickupLock::new());
    let mut economy = Economy::new(config(), &rules, &store).with_pickup_lock(std::sync::Arc::clone(&lock));
    let mut game = SimulatedGame::new(ground_amulet_world());

    {
        let _held = lock.try_acquire().unwrap();
        let report = economy.pick_up_ground_items(&mut game, &LevelTables::default()).unwrap();
        assert!(report.skipped);
        assert!(game.log().is_empty());
    }

    let report = economy.pick_up_ground_items(&mut game, &LevelTables::default()).unwrap();
    assert!(!report.skipped);
    assert_eq!(report.picked.len(), 1);
    assert!(!lock.is_held());
}

#[test]
fn test_failed_pickup_blacklists_item() {
    let store = MemoryConfigStore::new();
    let rules = RuleSet::from_toml("[[rules]]\nname = \"Amulet\"\n").unwrap();
    let mut economy = Economy::new(config(), &rules, &store);
    let mut game = SimulatedGame::new(ground_amulet_world());
    game.fail_next(&horadric_economy::GameAction::PickUp { unit: horadric_core::UnitId(50) }, 3);

    let report = economy.pick_up_ground_items(&mut game, &LevelTables::default()).unwrap();
    assert!(report.picked.is_empty());
    assert!(economy.session.is_blacklisted(horadric_core::UnitId(50)));

    let again = economy.pick_up_ground_items(&mut game, &LevelTables::default()).unwrap();
    assert!(again.picked.is_empty());
}
