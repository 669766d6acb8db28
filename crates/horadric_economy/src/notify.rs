//! Stash notification filter.

use horadric_core::{Item, ItemType};

use crate::actions::{Notification, NotificationSink};
use crate::classifier::StashReason;
use crate::config::NotificationSection;

const QUIET_NAME_FRAGMENTS: [&str; 4] = ["tokenofabsolution", "keyofterror", "keyofhate", "keyofdestruction"];

/// Returns true if stashing `item` for `reason` is worth a notification.
#[must_use]
pub fn should_notify(item: &Item, reason: StashReason, section: &NotificationSection) -> bool {
    if !section.enabled || matches!(reason, StashReason::FirstRun | StashReason::CubeReturn) {
        return false;
    }
    if item.item_type == ItemType::Gem {
        return false;
    }
    let lower = item.name.to_ascii_lowercase();
    if QUIET_NAME_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        return false;
    }
    if item.item_type == ItemType::Rune {
        let listed = |list: &[String]| list.iter().any(|r| r.eq_ignore_ascii_case(&item.name));
        if listed(&section.quiet_runes) && !listed(&section.quiet_rune_exemptions) {
            return false;
        }
    }
    true
}

/// Sends a stash notification if the filter allows it.
pub fn notify_stashed(sink: &dyn NotificationSink, item: &Item, reason: StashReason, section: &NotificationSection) {
    if should_notify(item, reason, section) {
        sink.notify(Notification::item(format!("Stashed {item}"), item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horadric_core::Quality;

    fn rune(name: &str) -> Item {
        Item::new(1, name, ItemType::Rune, Quality::Normal)
    }

    #[test]
    fn test_quiet_runes_and_exemptions() {
        let section = NotificationSection::default();
        let reason = StashReason::KeepRule(0);
        assert!(!should_notify(&rune("ElRune"), reason, &section));
        assert!(!should_notify(&rune("PulRune"), reason, &section));
        assert!(should_notify(&rune("TalRune"), reason, &section));
        assert!(should_notify(&rune("IstRune"), reason, &section));
    }

    #[test]
    fn test_quiet_list_is_data() {
        let section = NotificationSection {
            quiet_runes: vec!["IstRune".into()],
            quiet_rune_exemptions: Vec::new(),
            ..NotificationSection::default()
        };
        assert!(!should_notify(&rune("IstRune"), StashReason::KeepRule(0), &section));
        assert!(should_notify(&rune("ElRune"), StashReason::KeepRule(0), &section));
    }

    #[test]
    fn test_gems_tokens_keys_and_first_run_quiet() {
        let section = NotificationSection::default();
        let gem = Item::new(1, "PerfectSkull", ItemType::Gem, Quality::Normal);
        let key = Item::new(2, "KeyOfHate", ItemType::Key, Quality::Normal);
        let token = Item::new(3, "TokenOfAbsolution", ItemType::Token, Quality::Normal);
        let ring = Item::new(4, "Ring", ItemType::Ring, Quality::Unique);
        for quiet in [&gem, &key, &token] {
            assert!(!should_notify(quiet, StashReason::KeepRule(0), &section));
        }
        assert!(should_notify(&ring, StashReason::KeepRule(0), &section));
        assert!(!should_notify(&ring, StashReason::FirstRun, &section));
        assert!(!should_notify(&ring, StashReason::CubeReturn, &section));
    }
}
