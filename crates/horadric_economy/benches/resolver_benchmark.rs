//! Benchmark for recipe resolution over a large stash.
//!
//! TARGET: a full catalog pass over a 400-item stash in well under a millisecond
//!
//! Run with: cargo bench --package horadric_economy --bench resolver_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use horadric_core::{Item, ItemType, Location, LocationKind, Position, Quality};
use horadric_economy::{CharacterConfig, MarkRegistry, RecipeCatalog, Resolver, RuleSet};

const NAMES: [&str; 10] = [
    "ChippedAmethyst",
    "FlawedRuby",
    "Topaz",
    "FlawlessSkull",
    "PerfectSapphire",
    "ElRune",
    "TalRune",
    "ThulRune",
    "Jewel",
    "Monarch",
];

fn create_stash() -> Vec<Item> {
    let mut pool = Vec::with_capacity(400);
    for i in 0..400u32 {
        let name = NAMES[(i as usize) % NAMES.len()];
        let item_type = match name {
            "Jewel" => ItemType::Jewel,
            "Monarch" => ItemType::Shield,
            n if n.ends_with("Rune") => ItemType::Rune,
            _ => ItemType::Gem,
        };
        let kind = if i < 100 { LocationKind::Stash } else { LocationKind::SharedStash };
        let page = if i < 100 { 0 } else { ((i - 100) / 100) as u8 };
        let slot = (i % 100) as i32;
        pool.push(
            Item::new(i + 1, name, item_type, Quality::Normal)
                .at(Location::on_page(kind, page, Position::new(slot % 10, slot / 10))),
        );
    }
    horadric_core::sort_canonical(&mut pool);
    pool
}

fn benchmark_catalog_pass(c: &mut Criterion) {
    let catalog = RecipeCatalog::standard();
    let mut config = CharacterConfig::default();
    config.cube_recipes.enabled_recipes = catalog.iter().map(|r| r.name.clone()).collect();
    let rules = RuleSet::default();
    let pool = create_stash();
    let mut marks = MarkRegistry::from_config(&config);

    let mut group = c.benchmark_group("resolver");
    group.throughput(Throughput::Elements(catalog.len() as u64));
    group.bench_function("full_catalog_400_items", |b| {
        let resolver = Resolver::new(&config, &rules);
        b.iter(|| {
            let ready = catalog
                .iter()
                .filter(|recipe| resolver.resolve(recipe, &pool, &[], &mut marks).is_ready())
                .count();
            black_box(ready)
        });
    });
    group.finish();
}

fn benchmark_single_recipe(c: &mut Criterion) {
    let catalog = RecipeCatalog::standard();
    let config = CharacterConfig::default();
    let rules = RuleSet::default();
    let pool = create_stash();
    let mut marks = MarkRegistry::from_config(&config);
    let recipe = catalog.get("Flawed Amethyst").cloned().unwrap();

    c.bench_function("resolve_gem_upgrade", |b| {
        let resolver = Resolver::new(&config, &rules);
        b.iter(|| black_box(resolver.resolve(&recipe, &pool, &[], &mut marks)));
    });
}

criterion_group!(benches, benchmark_catalog_pass, benchmark_single_recipe);
criterion_main!(benches);
