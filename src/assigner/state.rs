//! Mutable indices accumulated over one assignment pass.

use std::collections::{HashMap, HashSet};

use chrono::Weekday;

use crate::models::Window;

/// Occupancy, assigned set and per-cohort blocks for one run.
///
/// Room occupancy and cohort windows are tracked per concrete weekday, so a
/// paired pattern and a single pattern sharing a weekday are compared.
#[derive(Debug, Clone, Default)]
pub struct SolverState {
    room_occupancy: HashMap<(String, Weekday), Vec<Window>>,
    assigned: HashSet<u32>,
    cohort_windows: HashMap<(String, Weekday), Vec<Window>>,
    cohort_chains: HashMap<(String, Weekday), Vec<Window>>,
}

/// Chain length when `candidate` is merged with every block it reaches,
/// directly or through blocks it already absorbed.
///
/// Each absorbed block contributes its full span.
pub fn chain_minutes(blocks: &[Window], candidate: Window, min_break: u32) -> u32 {
    let mut reach = candidate;
    let mut total = candidate.minutes();
    let mut absorbed = vec![false; blocks.len()];
    loop {
        let mut grew = false;
        for (index, block) in blocks.iter().enumerate() {
            if !absorbed[index] && reach.chains_with(block, min_break) {
                absorbed[index] = true;
                total += block.minutes();
                reach = reach.span(block);
                grew = true;
            }
        }
        if !grew {
            return total;
        }
    }
}

/// Folds `window` into `blocks`, collapsing every block it chains with into one span.
pub fn merge_block(blocks: &[Window], window: Window, min_break: u32) -> Vec<Window> {
    let mut merged = window;
    let mut remaining: Vec<Window> = blocks.to_vec();
    loop {
        let before = remaining.len();
        remaining.retain(|block| {
            if merged.chains_with(block, min_break) {
                merged = merged.span(block);
                false
            } else {
                true
            }
        });
        if remaining.len() == before {
            break;
        }
    }
    remaining.push(merged);
    remaining
}

impl SolverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_assigned(&self, ordinal: u32) -> bool {
        self.assigned.contains(&ordinal)
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }

    pub fn room_is_free(&self, room: &str, day: Weekday, window: Window) -> bool {
        self.room_occupancy
            .get(&(room.to_string(), day))
            .map_or(true, |taken| taken.iter().all(|w| !w.overlaps(&window)))
    }

    pub fn cohort_is_free(&self, program_section: &str, day: Weekday, window: Window) -> bool {
        self.cohort_windows
            .get(&(program_section.to_string(), day))
            .map_or(true, |taken| taken.iter().all(|w| !w.overlaps(&window)))
    }

    pub fn cohort_chain_minutes(
        &self,
        program_section: &str,
        day: Weekday,
        window: Window,
        min_break: u32,
    ) -> u32 {
        chain_minutes(self.cohort_blocks(program_section, day), window, min_break)
    }

    /// Merged class blocks of one cohort on one weekday.
    pub fn cohort_blocks(&self, program_section: &str, day: Weekday) -> &[Window] {
        self.cohort_chains
            .get(&(program_section.to_string(), day))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records an accepted binding in every index.
    pub fn commit(
        &mut self,
        ordinal: u32,
        room: &str,
        weekdays: &[Weekday],
        window: Window,
        members: &[String],
        min_break: u32,
    ) {
        self.assigned.insert(ordinal);
        for &day in weekdays {
            self.room_occupancy
                .entry((room.to_string(), day))
                .or_default()
                .push(window);

            for member in members {
                let key = (member.clone(), day);
                self.cohort_windows.entry(key.clone()).or_default().push(window);
                let blocks = self.cohort_chains.entry(key).or_default();
                *blocks = merge_block(blocks, window, min_break);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(hour: u32, minute: u32) -> u32 {
        hour * 60 + minute
    }

    #[test]
    fn short_gap_joins_chain() {
        let existing = [Window::new(hm(8, 0), hm(9, 20))];
        let candidate = Window::new(hm(9, 30), hm(10, 50));
        assert_eq!(chain_minutes(&existing, candidate, 80), 160);
    }

    #[test]
    fn long_break_starts_new_chain() {
        let existing = [Window::new(hm(8, 0), hm(9, 20))];
        let candidate = Window::new(hm(10, 40), hm(12, 0));
        assert_eq!(chain_minutes(&existing, candidate, 80), 80);
    }

    #[test]
    fn chains_are_transitive() {
        let existing = [
            Window::new(hm(14, 40), hm(16, 0)),
            Window::new(hm(12, 20), hm(13, 40)),
        ];
        // 14:40 is only reachable through the 12:20 block.
        let candidate = Window::new(hm(10, 0), hm(11, 20));
        assert_eq!(chain_minutes(&existing, candidate, 80), 240);
        assert_eq!(chain_minutes(&existing[..1], candidate, 80), 80);
    }

    #[test]
    fn merge_collapses_bridged_blocks() {
        let blocks = vec![
            Window::new(hm(8, 0), hm(9, 20)),
            Window::new(hm(11, 0), hm(12, 20)),
        ];
        let merged = merge_block(&blocks, Window::new(hm(9, 30), hm(10, 50)), 80);
        assert_eq!(merged, vec![Window::new(hm(8, 0), hm(12, 20))]);

        let separate = merge_block(&blocks, Window::new(hm(14, 0), hm(15, 20)), 80);
        assert_eq!(separate.len(), 3);
    }

    #[test]
    fn commit_updates_every_index() {
        let mut state = SolverState::new();
        let members = vec!["BSCS-1-A".to_string(), "BSIT-1-A".to_string()];
        let window = Window::new(hm(8, 0), hm(9, 20));
        state.commit(7, "R101", &[Weekday::Mon, Weekday::Thu], window, &members, 80);

        assert!(state.is_assigned(7));
        assert!(!state.room_is_free("R101", Weekday::Thu, Window::new(hm(9, 0), hm(10, 0))));
        assert!(state.room_is_free("R101", Weekday::Tue, window));
        assert!(state.room_is_free("R102", Weekday::Mon, window));
        assert!(!state.cohort_is_free("BSIT-1-A", Weekday::Mon, window));
        assert!(state.cohort_is_free("BSIT-1-B", Weekday::Mon, window));
        assert_eq!(state.cohort_blocks("BSCS-1-A", Weekday::Thu), &[window]);
        assert_eq!(
            state.cohort_chain_minutes("BSCS-1-A", Weekday::Mon, Window::new(hm(9, 30), hm(10, 50)), 80),
            160
        );
    }
}
