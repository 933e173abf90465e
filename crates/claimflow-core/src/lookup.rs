//! Address lookup policy: debounce, pre-check gating and result filtering.
//!
//! The interactive client calls the lookup endpoint while the visitor
//! types. The policy here is pure and clock-driven so it can be exercised
//! without a UI: the caller feeds keystrokes and a millisecond timestamp
//! in, and polls for the debounced decision.

use serde::{Deserialize, Serialize};

use crate::schema::POSTCODE_RE;

/// Quiet period after the last keystroke before the provider is called.
pub const DEBOUNCE_MS: u64 = 500;

/// A candidate address as the lookup service returns it. Produced only by
/// the lookup client — visitors never hand-type one beyond the postcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Address {
    pub id: String,
    /// Human-readable one-line rendering shown in the suggestion list.
    pub label: String,
    pub house: String,
    pub street: String,
    pub city: String,
    pub county: String,
    pub district: String,
    pub postcode: String,
}

impl Address {
    /// Whether the provider record is complete enough to offer.
    pub fn is_complete(&self) -> bool {
        !self.house.trim().is_empty()
            && !self.street.trim().is_empty()
            && !self.city.trim().is_empty()
            && !self.postcode.trim().is_empty()
    }
}

/// Drops provider records missing any of house, street, city or postcode.
pub fn filter_complete(addresses: Vec<Address>) -> Vec<Address> {
    addresses.into_iter().filter(Address::is_complete).collect()
}

/// Outcome of a lookup call after filtering, keeping "nothing found" and
/// "the call failed" apart — they read differently to the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStatus {
    Selectable(Vec<Address>),
    /// Well-formed postcode, no usable candidates: enter manually.
    NoResults,
    /// Provider or network failure: try again.
    Failed,
}

/// Classifies a raw lookup result.
pub fn classify_lookup_result<E>(result: Result<Vec<Address>, E>) -> LookupStatus {
    match result {
        Err(_) => LookupStatus::Failed,
        Ok(addresses) => {
            let complete = filter_complete(addresses);
            if complete.is_empty() {
                LookupStatus::NoResults
            } else {
                LookupStatus::Selectable(complete)
            }
        }
    }
}

/// Immediate reaction to a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Input emptied: hide suggestions, nothing scheduled.
    ClearSuggestions,
    /// Suggestions visible, debounce timer armed.
    Pending,
    /// Change came from programmatic selection or back-navigation; no
    /// lookup side effects this cycle.
    Skipped,
}

/// The debounced decision once the quiet period elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Input matches the postcode shape: call the provider with this
    /// normalized (trimmed, upper-cased) value.
    Lookup(String),
    /// Length is plainly wrong for a UK postcode; no network call.
    FormatError,
    /// Not yet a valid shape but not obviously wrong either; clear any
    /// format error and wait for more typing.
    ClearError,
}

/// Debounced watcher for one postcode input.
///
/// Newer keystrokes supersede the pending timer (last-writer-wins on the
/// timer, not the in-flight call). A programmatic selection suppresses
/// exactly one cycle so writing the chosen postcode back into the field
/// does not re-trigger the lookup.
#[derive(Debug, Clone, Default)]
pub struct PostcodeWatcher {
    input: String,
    deadline: Option<u64>,
    skip_next: bool,
    suppressed: bool,
}

impl PostcodeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress lookup side effects entirely, e.g. while re-entering the
    /// postcode step via Back.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
        if suppressed {
            self.skip_next = true;
            self.deadline = None;
        }
    }

    /// Marks the next input cycle as programmatic (address selection wrote
    /// the postcode back into the field).
    pub fn note_programmatic_change(&mut self) {
        self.skip_next = true;
    }

    /// Feeds the current field value after a change.
    pub fn on_input(&mut self, text: &str, now_ms: u64) -> InputAction {
        self.input = text.to_string();
        self.deadline = None;

        if self.suppressed {
            self.skip_next = true;
            return InputAction::Skipped;
        }
        if self.skip_next {
            self.skip_next = false;
            return InputAction::Skipped;
        }

        if self.normalized().is_empty() {
            return InputAction::ClearSuggestions;
        }

        self.deadline = Some(now_ms + DEBOUNCE_MS);
        InputAction::Pending
    }

    /// Polls the timer. Returns the decision once the quiet period has
    /// elapsed, and at most once per armed timer.
    pub fn poll(&mut self, now_ms: u64) -> Option<DebounceOutcome> {
        let deadline = self.deadline?;
        if now_ms < deadline {
            return None;
        }
        self.deadline = None;

        let trimmed = self.normalized();
        if POSTCODE_RE.is_match(&trimmed) {
            Some(DebounceOutcome::Lookup(trimmed))
        } else if !trimmed.is_empty() && !(5..=7).contains(&trimmed.len()) {
            Some(DebounceOutcome::FormatError)
        } else {
            Some(DebounceOutcome::ClearError)
        }
    }

    fn normalized(&self) -> String {
        self.input.trim().to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(label: &str) -> Address {
        Address {
            id: "0".into(),
            label: label.into(),
            house: "10".into(),
            street: "Downing Street".into(),
            city: "London".into(),
            county: "Greater London".into(),
            district: String::new(),
            postcode: "SW1A 2AA".into(),
        }
    }

    #[test]
    fn test_filter_drops_incomplete_records() {
        let mut partial = complete("partial");
        partial.street = " ".into();
        let kept = filter_complete(vec![complete("full"), partial]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label, "full");
    }

    #[test]
    fn test_classify_distinguishes_empty_from_failed() {
        let empty: Result<Vec<Address>, ()> = Ok(vec![]);
        assert_eq!(classify_lookup_result(empty), LookupStatus::NoResults);

        let failed: Result<Vec<Address>, ()> = Err(());
        assert_eq!(classify_lookup_result(failed), LookupStatus::Failed);

        let mut incomplete = complete("x");
        incomplete.house = String::new();
        let only_incomplete: Result<Vec<Address>, ()> = Ok(vec![incomplete]);
        assert_eq!(classify_lookup_result(only_incomplete), LookupStatus::NoResults);
    }

    #[test]
    fn test_debounce_fires_after_quiet_period() {
        let mut watcher = PostcodeWatcher::new();
        assert_eq!(watcher.on_input("sw1a 1aa", 1_000), InputAction::Pending);
        assert_eq!(watcher.poll(1_400), None);
        assert_eq!(
            watcher.poll(1_500),
            Some(DebounceOutcome::Lookup("SW1A 1AA".into()))
        );
        // Fires at most once per armed timer.
        assert_eq!(watcher.poll(2_000), None);
    }

    #[test]
    fn test_newer_keystroke_supersedes_timer() {
        let mut watcher = PostcodeWatcher::new();
        watcher.on_input("SW1A 1", 1_000);
        watcher.on_input("SW1A 1A", 1_200);
        assert_eq!(watcher.poll(1_500), None);
        assert!(watcher.poll(1_700).is_some());
    }

    #[test]
    fn test_malformed_length_is_format_error_without_network() {
        let mut watcher = PostcodeWatcher::new();
        watcher.on_input("SW1", 0);
        assert_eq!(watcher.poll(DEBOUNCE_MS), Some(DebounceOutcome::FormatError));

        watcher.on_input("SW1A 1A", 1_000);
        assert_eq!(
            watcher.poll(1_000 + DEBOUNCE_MS),
            Some(DebounceOutcome::ClearError)
        );
    }

    #[test]
    fn test_empty_input_clears_suggestions() {
        let mut watcher = PostcodeWatcher::new();
        assert_eq!(watcher.on_input("  ", 0), InputAction::ClearSuggestions);
        assert_eq!(watcher.poll(10_000), None);
    }

    #[test]
    fn test_selection_suppresses_one_cycle() {
        let mut watcher = PostcodeWatcher::new();
        watcher.note_programmatic_change();
        assert_eq!(watcher.on_input("SW1A 2AA", 0), InputAction::Skipped);
        assert_eq!(watcher.poll(10_000), None);
        // The following genuine keystroke is debounced normally again.
        assert_eq!(watcher.on_input("SW1A 2AB", 20_000), InputAction::Pending);
    }

    #[test]
    fn test_returning_to_postcode_suppresses_lookups() {
        let mut watcher = PostcodeWatcher::new();
        watcher.set_suppressed(true);
        assert_eq!(watcher.on_input("SW1A 1AA", 0), InputAction::Skipped);
        assert_eq!(watcher.poll(10_000), None);

        watcher.set_suppressed(false);
        // One restore cycle is still skipped, then normal behavior resumes.
        assert_eq!(watcher.on_input("SW1A 1AA", 20_000), InputAction::Skipped);
        assert_eq!(watcher.on_input("SW1A 1AB", 30_000), InputAction::Pending);
    }
}
