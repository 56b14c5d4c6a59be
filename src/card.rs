use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

pub const NUM_COLUMNS: usize = 8;
pub const DECK_SIZE: usize = 52;
pub const KING: u8 = 13;
/// Seven dealt cards with a King on top, plus a run from Queen down to Ace.
pub const MAX_COLUMN_LEN: usize = 19;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    /// Fixed priority order, also used to break ties between columns.
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Suit> {
        Suit::ALL.get(i).copied()
    }

    pub fn symbol(self) -> char {
        match self {
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
            Suit::Spades => 'S',
        }
    }

    fn from_symbol(c: char) -> Option<Suit> {
        match c {
            'H' => Some(Suit::Hearts),
            'D' => Some(Suit::Diamonds),
            'C' => Some(Suit::Clubs),
            'S' => Some(Suit::Spades),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    rank: u8,
    suit: Suit,
}

impl Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rank = match self.rank {
            1 => 'A',
            10 => 'T',
            11 => 'J',
            12 => 'Q',
            13 => 'K',
            r => (b'0' + r) as char,
        };
        write!(f, "{}{}", rank, self.suit.symbol())
    }
}

impl Debug for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self)
    }
}

impl Card {
    pub fn new(rank: u8, suit: Suit) -> Option<Card> {
        (1..=KING).contains(&rank).then_some(Card { rank, suit })
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    pub fn suit(self) -> Suit {
        self.suit
    }

    /// Rank and suit folded into 0..=51.
    pub fn code(self) -> u8 {
        (self.rank - 1) * 4 + self.suit.index() as u8
    }

    pub fn from_code(code: u8) -> Option<Card> {
        if code as usize >= DECK_SIZE {
            return None;
        }
        Some(Card {
            rank: code / 4 + 1,
            suit: Suit::from_index((code % 4) as usize)?,
        })
    }

    /// Parses `<rank><suit>`, e.g. `AS`, `TD`, `10D`, `QH`.
    pub fn parse(token: &str) -> Option<Card> {
        let suit = Suit::from_symbol(token.chars().last()?)?;
        let rank = match &token[..token.len() - 1] {
            "A" => 1,
            "T" | "10" => 10,
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            r if r.len() == 1 => match r.as_bytes()[0] {
                c @ b'2'..=b'9' => c - b'0',
                _ => return None,
            },
            _ => return None,
        };
        Card::new(rank, suit)
    }

    /// Ordering key for canonical tie-breaks: lowest rank first, then suit priority.
    pub(crate) fn sort_key(self) -> (u8, usize) {
        (self.rank, self.suit.index())
    }

    pub fn deck() -> impl Iterator<Item = Card> {
        Suit::ALL
            .into_iter()
            .flat_map(|suit| (1..=KING).map(move |rank| Card { rank, suit }))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Column(usize),
    Foundation,
}

/// Top card of column `from` goes to `to`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Move {
    pub from: usize,
    pub to: Target,
}

impl Move {
    pub fn to_column(from: usize, to: usize) -> Move {
        Move {
            from,
            to: Target::Column(to),
        }
    }

    pub fn to_foundation(from: usize) -> Move {
        Move {
            from,
            to: Target::Foundation,
        }
    }

    pub fn is_foundation(&self) -> bool {
        self.to == Target::Foundation
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to {
            Target::Column(to) => write!(f, "column {} -> column {}", self.from, to),
            Target::Foundation => write!(f, "column {} -> foundation", self.from),
        }
    }
}
