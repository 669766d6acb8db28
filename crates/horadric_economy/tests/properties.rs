//! Property tests for the classifier.

use horadric_core::{GameSnapshot, Item, ItemType, Location, LocationKind, Position, Quality, Stat};
use horadric_economy::{
    CharacterConfig, Classifier, Disposition, DropReason, KeepRule, MarkRegistry, RecipeCatalog, RuleSet,
};
use proptest::prelude::*;

const TYPES: [ItemType; 8] = [
    ItemType::Ring,
    ItemType::Amulet,
    ItemType::Jewel,
    ItemType::Gem,
    ItemType::Rune,
    ItemType::Armor,
    ItemType::Sword,
    ItemType::Charm,
];

const QUALITIES: [Quality; 5] = [Quality::Normal, Quality::Magic, Quality::Rare, Quality::Unique, Quality::Set];

const NAMES: [&str; 6] = ["Ring", "Jewel", "PerfectRuby", "TalRune", "MagePlate", "Amulet"];

fn arb_item(unit: u32, kind: LocationKind) -> impl Strategy<Value = Item> {
    (0..NAMES.len(), 0..TYPES.len(), 0..QUALITIES.len(), 0i32..10, 0i32..4, 0i32..40, any::<bool>()).prop_map(
        move |(n, t, q, x, y, stat, identified)| {
            let mut item = Item::new(unit, NAMES[n], TYPES[t], QUALITIES[q])
                .with_stats(vec![Stat::new(105, 0, stat)])
                .at(Location::new(kind, Position::new(x, y)));
            item.identified = identified;
            item
        },
    )
}

fn rules() -> RuleSet {
    RuleSet::new(vec![
        KeepRule {
            name: Some("Ring".into()),
            max_quantity: Some(2),
            ..KeepRule::default()
        },
        KeepRule {
            item_type: Some(ItemType::Amulet),
            min_quality: Some(Quality::Rare),
            stats: vec![horadric_economy::rules::StatCondition {
                id: 105,
                layer: None,
                min: 20,
            }],
            ..KeepRule::default()
        },
        KeepRule {
            item_type: Some(ItemType::Armor),
            tier: Some(4),
            ..KeepRule::default()
        },
    ])
}

fn config(recipes: bool, first_locked: bool) -> CharacterConfig {
    let mut config = CharacterConfig::default();
    config.character.name = "prop".into();
    config.cube_recipes.enabled = recipes;
    config.cube_recipes.enabled_recipes = vec!["Blood Amulet".into(), "Upgrade Tal".into()];
    config.cube_recipes.jewels_to_keep = 2;
    if first_locked {
        config.inventory.locked_slots[0][0] = 0;
    }
    config
}

proptest! {
    #[test]
    fn prop_classifier_never_stashes_and_drops(
        target in arb_item(1, LocationKind::Inventory),
        stash in prop::collection::vec(arb_item(100, LocationKind::Stash), 0..8),
        recipes in any::<bool>(),
        locked in any::<bool>(),
        first_run in any::<bool>(),
    ) {
        let config = config(recipes, locked);
        let rules = rules();
        let catalog = RecipeCatalog::standard();
        let marks = MarkRegistry::from_config(&config);
        let mut items = stash;
        for (i, item) in items.iter_mut().enumerate() {
            item.unit_id = horadric_core::UnitId(100 + i as u32);
        }
        items.push(target.clone());
        let snapshot = GameSnapshot { items, ..GameSnapshot::default() };

        let classification = Classifier::new(&config, &rules, &catalog, &marks).classify(&target, &snapshot, first_run);
        let disposition = classification.disposition;

        prop_assert!(!(disposition.is_stash() && disposition.is_drop()));
        if first_run {
            prop_assert!(!disposition.is_drop());
        }
        if let Disposition::Drop(DropReason::QuantityExceeded { max_quantity, .. }) = disposition {
            prop_assert_eq!(max_quantity, 2);
            prop_assert_eq!(target.name.as_str(), "Ring");
        }
    }

    #[test]
    fn prop_quantity_cap_drops_the_next_unit(cap in 1u32..6) {
        let rules = RuleSet::new(vec![KeepRule {
            name: Some("Ring".into()),
            max_quantity: Some(cap),
            ..KeepRule::default()
        }]);
        let config = config(false, false);
        let catalog = RecipeCatalog::standard();
        let marks = MarkRegistry::from_config(&config);

        let mut items: Vec<Item> = (0..cap)
            .map(|i| {
                Item::new(100 + i, "Ring", ItemType::Ring, Quality::Rare)
                    .at(Location::new(LocationKind::Stash, Position::new(i as i32, 0)))
            })
            .collect();
        let next = Item::new(1, "Ring", ItemType::Ring, Quality::Rare)
            .at(Location::new(LocationKind::Inventory, Position::new(5, 2)));
        items.push(next.clone());
        let snapshot = GameSnapshot { items, ..GameSnapshot::default() };

        let classifier = Classifier::new(&config, &rules, &catalog, &marks);
        let disposition = classifier.classify(&next, &snapshot, false).disposition;
        prop_assert!(disposition.is_drop());
        prop_assert!(!disposition.is_stash());

        // One fewer stashed unit and the same ring is kept.
        let mut short = snapshot.clone();
        short.items.remove(0);
        prop_assert!(classifier.classify(&next, &short, false).disposition.is_stash());
    }
}
