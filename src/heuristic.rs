use crate::card::Suit;
use crate::layout::GameState;

pub const MAX_SCORE: u8 = 99;

/// Orders the frontier: a higher score is searched first.
pub trait ScorePolicy: Send + Sync {
    fn score(&self, state: &GameState) -> u8;
}

/// Cards stacked above the next card each foundation needs.
pub fn buried_cards(state: &GameState) -> usize {
    let needed: Vec<_> = Suit::ALL.iter().filter_map(|&s| state.needed(s)).collect();
    state
        .columns()
        .iter()
        .map(|column| {
            let cards = column.cards();
            cards
                .iter()
                .position(|c| needed.contains(c))
                .map_or(0, |i| cards.len() - i - 1)
        })
        .sum()
}

/// `base + foundation * cards home + empty_column * empty columns
/// - burial * buried cards`, clamped to `0..=MAX_SCORE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightedScore {
    pub base: i32,
    pub foundation: i32,
    pub empty_column: i32,
    pub burial: i32,
}

impl Default for WeightedScore {
    fn default() -> Self {
        WeightedScore {
            base: 24,
            foundation: 1,
            empty_column: 3,
            burial: 1,
        }
    }
}

impl ScorePolicy for WeightedScore {
    fn score(&self, state: &GameState) -> u8 {
        let raw = self.base
            + self.foundation * state.foundation_cards() as i32
            + self.empty_column * state.empty_columns() as i32
            - self.burial * buried_cards(state) as i32;
        raw.clamp(0, MAX_SCORE as i32) as u8
    }
}

/// Cards home and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct FoundationCount;

impl ScorePolicy for FoundationCount {
    fn score(&self, state: &GameState) -> u8 {
        (state.foundation_cards() as u8).min(MAX_SCORE)
    }
}
