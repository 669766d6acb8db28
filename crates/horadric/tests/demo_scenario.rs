//! Runs the bundled scenario end to end.

use horadric::core::LocationKind;
use horadric::economy::GameAction;
use horadric::{run_scenario, DEMO_RULES, DEMO_SCENARIO};

const STASHES: [LocationKind; 2] = [LocationKind::Stash, LocationKind::SharedStash];

#[test]
fn test_demo_scenario_first_visit() {
    let outcome = run_scenario(DEMO_SCENARIO, DEMO_RULES, 1).unwrap();

    let first_run = outcome.report.first_run.as_ref().unwrap();
    assert_eq!(first_run.stashed.len(), 2);

    let cube = outcome.report.cube.as_ref().unwrap();
    assert_eq!(cube.crafted, vec!["Flawed Amethyst".to_string()]);
    assert!(cube.failed.is_empty());

    assert_eq!(outcome.game.count("FlawedAmethyst", &STASHES), 1);
    assert_eq!(outcome.game.count("ChippedAmethyst", &STASHES), 0);
    assert_eq!(outcome.game.count("ChippedRuby", &STASHES), 2);
    assert!(outcome.game.items_at(LocationKind::Inventory).is_empty());
    assert_eq!(outcome.notifications, 0);
}

#[test]
fn test_second_visit_has_nothing_to_do() {
    let outcome = run_scenario(DEMO_SCENARIO, DEMO_RULES, 2).unwrap();

    assert!(outcome.report.first_run.is_none());
    assert!(outcome.report.cube.as_ref().unwrap().crafted.is_empty());
    assert_eq!(
        outcome.game.log().iter().filter(|a| **a == GameAction::Transmute).count(),
        1
    );
}
