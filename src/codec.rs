//! Compact, order-independent identity keys for layouts.
//!
//! A key is a stream of 6-bit codes packed most significant bit first: the
//! four foundation tops (Hearts, Diamonds, Clubs, Spades), then every column
//! of the normalized layout, bottom card first, each closed by
//! [`COLUMN_END`]. Leftover bits in the final byte are set to one.

use crate::card::{Card, Suit, MAX_COLUMN_LEN, NUM_COLUMNS};
use crate::error::ParseError;
use crate::layout::GameState;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display};

pub const COLUMN_END: u8 = 63;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalState(Box<[u8]>);

impl Debug for CanonicalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanonicalState({self})")
    }
}

impl Display for CanonicalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for CanonicalState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CanonicalState::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Default)]
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    pub(crate) fn push(&mut self, code: u8) {
        debug_assert!(code <= COLUMN_END);
        self.acc = (self.acc << 6) | code as u32;
        self.bits += 6;
        while self.bits >= 8 {
            self.bits -= 8;
            self.bytes.push((self.acc >> self.bits) as u8);
            self.acc &= (1 << self.bits) - 1;
        }
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            let pad = 8 - self.bits;
            self.bytes.push(((self.acc << pad) | ((1 << pad) - 1)) as u8);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    acc: u32,
    bits: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader {
            bytes,
            acc: 0,
            bits: 0,
        }
    }

    fn next(&mut self) -> Option<u8> {
        while self.bits < 6 {
            let (&b, rest) = self.bytes.split_first()?;
            self.bytes = rest;
            self.acc = (self.acc << 8) | b as u32;
            self.bits += 8;
        }
        self.bits -= 6;
        let code = (self.acc >> self.bits) as u8 & 0x3f;
        self.acc &= (1 << self.bits) - 1;
        Some(code)
    }

    /// Whatever is left must be less than a byte of one bits.
    fn only_padding(&self) -> bool {
        self.bytes.is_empty() && self.acc == (1 << self.bits) - 1
    }
}

impl CanonicalState {
    /// Normalizes the column order and packs the layout.
    pub fn encode(state: &GameState) -> CanonicalState {
        let mut w = BitWriter::default();
        for top in state.foundations() {
            w.push(top);
        }
        for i in state.canonical_order() {
            for card in state.columns()[i].cards() {
                w.push(card.code());
            }
            w.push(COLUMN_END);
        }
        CanonicalState(w.finish().into_boxed_slice())
    }

    pub fn decode(&self) -> Result<GameState, ParseError> {
        if self.0.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut r = BitReader::new(&self.0);

        let mut foundations = [0; 4];
        for (suit, top) in Suit::ALL.iter().zip(foundations.iter_mut()) {
            let rank = r.next().ok_or(ParseError::Truncated { columns: 0 })?;
            if rank > crate::card::KING {
                return Err(ParseError::InvalidFoundation { suit: *suit, rank });
            }
            *top = rank;
        }

        let mut columns = Vec::with_capacity(NUM_COLUMNS);
        let mut column = Vec::new();
        while columns.len() < NUM_COLUMNS {
            let code = r.next().ok_or(ParseError::Truncated {
                columns: columns.len(),
            })?;
            if code == COLUMN_END {
                columns.push(std::mem::take(&mut column));
                continue;
            }
            if column.len() == MAX_COLUMN_LEN {
                return Err(ParseError::ColumnOverflow {
                    column: columns.len(),
                    max: MAX_COLUMN_LEN,
                });
            }
            column.push(Card::from_code(code).ok_or(ParseError::InvalidCode(code))?);
        }

        if !r.only_padding() {
            return Err(if r.bytes.is_empty() {
                ParseError::TrailingBits
            } else {
                ParseError::TooManyColumns { max: NUM_COLUMNS }
            });
        }

        GameState::from_parts(columns, foundations)
    }

    /// Wraps raw key bytes, checking that they decode.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<CanonicalState, ParseError> {
        let state = CanonicalState(bytes.into_boxed_slice());
        state.decode()?;
        Ok(state)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<CanonicalState, ParseError> {
        let s = s.trim();
        if s.len() % 2 != 0 || !s.is_ascii() {
            return Err(ParseError::InvalidHex);
        }
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ParseError::InvalidHex))
            .collect::<Result<Vec<u8>, _>>()?;
        CanonicalState::from_bytes(bytes)
    }

    /// The key of the finished game: every foundation at King, no cards left.
    pub fn solved() -> CanonicalState {
        let mut w = BitWriter::default();
        for _ in Suit::ALL {
            w.push(crate::card::KING);
        }
        for _ in 0..NUM_COLUMNS {
            w.push(COLUMN_END);
        }
        CanonicalState(w.finish().into_boxed_slice())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::card::Move;
    use crate::layout::test::{BLOCKED, EIGHT_CARDS, FULL_DEAL};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_decode_encode() {
        for text in [FULL_DEAL, EIGHT_CARDS, BLOCKED] {
            let state = GameState::parse(text).unwrap();
            let key = CanonicalState::encode(&state);
            let decoded = key.decode().unwrap();
            assert_eq!(decoded, state.normalized());
            assert_eq!(CanonicalState::encode(&decoded), key);
        }
    }

    #[test]
    fn test_random_deals() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let state = GameState::deal(&mut rng);
            let key = CanonicalState::encode(&state);
            // 4 foundations, 52 cards, 8 column ends.
            assert_eq!(key.as_bytes().len(), 48);
            assert_eq!(key.decode().unwrap(), state.normalized());
        }
    }

    #[test]
    fn test_permuted_columns_share_a_key() {
        let state = GameState::parse(FULL_DEAL).unwrap();
        let lines: Vec<&str> = FULL_DEAL.trim().lines().collect();
        let reversed: Vec<&str> = lines.iter().rev().copied().collect();
        let other = GameState::parse(&reversed.join("\n")).unwrap();
        assert_ne!(state, other);
        assert_eq!(CanonicalState::encode(&state), CanonicalState::encode(&other));

        let rotated: Vec<&str> = lines[3..].iter().chain(&lines[..3]).copied().collect();
        let other = GameState::parse(&rotated.join("\n")).unwrap();
        assert_eq!(CanonicalState::encode(&state), CanonicalState::encode(&other));
    }

    #[test]
    fn test_empty_columns_anywhere() {
        let a = GameState::parse("QH KS\n\nKH QS\n\nQD KC\nKD QC").unwrap();
        let b = GameState::parse(EIGHT_CARDS).unwrap();
        assert_eq!(CanonicalState::encode(&a), CanonicalState::encode(&b));
    }

    #[test]
    fn test_solved_key() {
        let mut state = GameState::parse(EIGHT_CARDS).unwrap();
        for mv in [
            Move::to_foundation(3),
            Move::to_foundation(1),
            Move::to_foundation(2),
            Move::to_foundation(0),
            Move::to_foundation(2),
            Move::to_foundation(3),
            Move::to_foundation(0),
            Move::to_foundation(1),
        ] {
            state = state.apply(mv).unwrap();
        }
        assert!(state.is_solved());
        assert_eq!(CanonicalState::encode(&state), CanonicalState::solved());
        assert!(CanonicalState::solved().decode().unwrap().is_solved());
    }

    #[test]
    fn test_hex() {
        let key = CanonicalState::encode(&GameState::parse(FULL_DEAL).unwrap());
        let hex = key.to_string();
        assert_eq!(hex.len(), 96);
        assert_eq!(CanonicalState::from_hex(&hex), Ok(key.clone()));
        assert_eq!(CanonicalState::from_hex("abc"), Err(ParseError::InvalidHex));
        assert_eq!(CanonicalState::from_hex("zz"), Err(ParseError::InvalidHex));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{hex}\""));
        assert_eq!(serde_json::from_str::<CanonicalState>(&json).unwrap(), key);
    }

    #[test]
    fn test_decode_errors() {
        let key = CanonicalState::encode(&GameState::parse(FULL_DEAL).unwrap());
        let bytes = key.as_bytes();

        assert_eq!(CanonicalState::from_bytes(vec![]), Err(ParseError::Empty));
        assert_eq!(
            CanonicalState::from_bytes(bytes[..2].to_vec()),
            Err(ParseError::Truncated { columns: 0 })
        );
        assert!(matches!(
            CanonicalState::from_bytes(bytes[..bytes.len() - 1].to_vec()),
            Err(ParseError::Truncated { columns: 7 })
        ));

        let mut longer = bytes.to_vec();
        longer.push(0xff);
        assert_eq!(
            CanonicalState::from_bytes(longer),
            Err(ParseError::TooManyColumns { max: NUM_COLUMNS })
        );

        // A ninth column after the eighth terminator.
        let mut w = BitWriter::default();
        for _ in 0..4 {
            w.push(13);
        }
        for _ in 0..NUM_COLUMNS {
            w.push(COLUMN_END);
        }
        w.push(0);
        w.push(COLUMN_END);
        assert_eq!(
            CanonicalState::from_bytes(w.finish()),
            Err(ParseError::TooManyColumns { max: NUM_COLUMNS })
        );

        let mut w = BitWriter::default();
        for _ in 0..4 {
            w.push(0);
        }
        for code in 0..=MAX_COLUMN_LEN as u8 {
            w.push(code);
        }
        assert_eq!(
            CanonicalState::from_bytes(w.finish()),
            Err(ParseError::ColumnOverflow {
                column: 0,
                max: MAX_COLUMN_LEN
            })
        );

        let mut w = BitWriter::default();
        for _ in 0..4 {
            w.push(0);
        }
        w.push(55);
        assert_eq!(
            CanonicalState::from_bytes(w.finish()),
            Err(ParseError::InvalidCode(55))
        );

        let mut w = BitWriter::default();
        w.push(14);
        assert_eq!(
            CanonicalState::from_bytes(w.finish()),
            Err(ParseError::InvalidFoundation {
                suit: Suit::Hearts,
                rank: 14
            })
        );
    }

    #[test]
    fn test_decode_checks_partition() {
        let mut w = BitWriter::default();
        for _ in 0..4 {
            w.push(13);
        }
        w.push(0);
        for _ in 0..NUM_COLUMNS {
            w.push(COLUMN_END);
        }
        assert_eq!(
            CanonicalState::from_bytes(w.finish()),
            Err(ParseError::DuplicateCard(Card::from_code(0).unwrap()))
        );
    }
}
