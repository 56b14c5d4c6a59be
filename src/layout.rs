use crate::card::{Card, Move, Suit, Target, DECK_SIZE, KING, MAX_COLUMN_LEN, NUM_COLUMNS};
use crate::error::{invariant, ParseError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;
use std::fmt::{Debug, Display};

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Column {
    cards: Vec<Card>,
}

impl Column {
    pub fn top(&self) -> Option<Card> {
        self.cards.last().copied()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Longest first, then the lowest top card. Empty columns go last.
    fn canonical_key(&self) -> (Reverse<usize>, Option<(u8, usize)>) {
        (Reverse(self.cards.len()), self.top().map(Card::sort_key))
    }
}

/// The tableau columns plus the top rank of each foundation.
///
/// A foundation holds every card of its suit from Ace up to its top rank, so
/// storing the top is enough. Every card of the deck is either in a column or
/// in a foundation, exactly once.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GameState {
    columns: Vec<Column>,
    foundations: [u8; 4],
}

impl Debug for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (suit, top) in Suit::ALL.iter().zip(self.foundations) {
            match Card::new(top, *suit) {
                Some(card) => write!(f, "{card} ")?,
                None => write!(f, "-{} ", suit.symbol())?,
            }
        }
        writeln!(f)?;

        for (i, column) in self.columns.iter().enumerate() {
            write!(f, "{i}:")?;
            for card in column.cards.iter() {
                write!(f, " {card}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl GameState {
    /// Builds a layout from explicit columns and foundation tops, checking
    /// that the deck is partitioned exactly once.
    pub fn from_parts(
        columns: Vec<Vec<Card>>,
        foundations: [u8; 4],
    ) -> Result<GameState, ParseError> {
        if columns.len() > NUM_COLUMNS {
            return Err(ParseError::TooManyColumns { max: NUM_COLUMNS });
        }
        for (suit, &rank) in Suit::ALL.iter().zip(foundations.iter()) {
            if rank > KING {
                return Err(ParseError::InvalidFoundation { suit: *suit, rank });
            }
        }
        let mut state = GameState {
            columns: columns.into_iter().map(|cards| Column { cards }).collect(),
            foundations,
        };
        state.columns.resize(NUM_COLUMNS, Column::default());
        for (i, column) in state.columns.iter().enumerate() {
            if column.len() > MAX_COLUMN_LEN {
                return Err(ParseError::ColumnOverflow {
                    column: i,
                    max: MAX_COLUMN_LEN,
                });
            }
        }
        state.validate()?;
        Ok(state)
    }

    /// Parses one column per line, bottom card first, e.g. `TS 8D 6C`.
    ///
    /// Cards that do not appear are taken to be on the foundations, so for
    /// each suit the absent ranks must run from Ace upwards.
    pub fn parse(s: &str) -> Result<GameState, ParseError> {
        let mut columns = Vec::new();
        let mut present = [false; DECK_SIZE];

        let lines = s
            .lines()
            .enumerate()
            .map(|(i, line)| (i, line.split('#').next().unwrap_or("").trim()));
        for (line_no, line) in lines {
            if columns.len() == NUM_COLUMNS {
                if line.is_empty() {
                    continue;
                }
                return Err(ParseError::TooManyColumns { max: NUM_COLUMNS });
            }
            let mut column = Vec::new();
            for (position, token) in line.split_whitespace().enumerate() {
                let card = Card::parse(token).ok_or_else(|| ParseError::InvalidCard {
                    token: token.to_string(),
                    line: line_no + 1,
                    position,
                })?;
                if std::mem::replace(&mut present[card.code() as usize], true) {
                    return Err(ParseError::DuplicateCard(card));
                }
                column.push(card);
            }
            columns.push(column);
        }

        let mut foundations = [0; 4];
        for suit in Suit::ALL {
            let in_columns = |rank: u8| {
                Card::new(rank, suit).is_some_and(|card| present[card.code() as usize])
            };
            let top = (1..=KING).take_while(|&rank| !in_columns(rank)).count() as u8;
            if (top + 1..=KING).any(|rank| !in_columns(rank)) {
                return Err(ParseError::NotAFoundation { suit });
            }
            foundations[suit.index()] = top;
        }

        GameState::from_parts(columns, foundations)
    }

    /// Deals a shuffled deck into the reference shape: eight columns
    /// alternating seven and six cards.
    pub fn deal<R: Rng + ?Sized>(rng: &mut R) -> GameState {
        let mut cards: Vec<Card> = Card::deck().collect();
        cards.shuffle(rng);

        let mut columns = vec![Column::default(); NUM_COLUMNS];
        let mut cards = cards.into_iter();
        for (i, column) in columns.iter_mut().enumerate() {
            let n = if i % 2 == 0 { 7 } else { 6 };
            column.cards.extend(cards.by_ref().take(n));
        }

        GameState {
            columns,
            foundations: [0; 4],
        }
    }

    /// Checks that every card of the deck sits in exactly one place.
    pub fn validate(&self) -> Result<(), ParseError> {
        let mut seen = [false; DECK_SIZE];
        for (suit, &top) in Suit::ALL.iter().zip(self.foundations.iter()) {
            for rank in 1..=top {
                if let Some(card) = Card::new(rank, *suit) {
                    seen[card.code() as usize] = true;
                }
            }
        }
        for card in self.columns.iter().flat_map(|c| c.cards.iter()) {
            if std::mem::replace(&mut seen[card.code() as usize], true) {
                return Err(ParseError::DuplicateCard(*card));
            }
        }
        if let Some(code) = seen.iter().position(|x| !x) {
            if let Some(card) = Card::from_code(code as u8) {
                return Err(ParseError::MissingCard(card));
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, i: usize) -> Option<&Column> {
        self.columns.get(i)
    }

    pub fn foundation_top(&self, suit: Suit) -> u8 {
        self.foundations[suit.index()]
    }

    pub fn foundations(&self) -> [u8; 4] {
        self.foundations
    }

    pub fn foundation_cards(&self) -> usize {
        self.foundations.iter().map(|&x| x as usize).sum()
    }

    pub fn empty_columns(&self) -> usize {
        self.columns.iter().filter(|c| c.is_empty()).count()
    }

    pub fn first_empty_column(&self) -> Option<usize> {
        self.columns.iter().position(Column::is_empty)
    }

    pub fn is_solved(&self) -> bool {
        self.columns.iter().all(Column::is_empty) && self.foundations.iter().all(|&x| x == KING)
    }

    /// The card a foundation needs next, if the suit is not complete.
    pub fn needed(&self, suit: Suit) -> Option<Card> {
        Card::new(self.foundation_top(suit) + 1, suit)
    }

    pub fn accepts_on_foundation(&self, card: Card) -> bool {
        self.foundation_top(card.suit()) + 1 == card.rank()
    }

    /// Whether `mv` is legal here. Any empty column is a legal destination;
    /// restricting to the first one is the move generator's business.
    pub fn can_play(&self, mv: Move) -> bool {
        let Some(card) = self.column(mv.from).and_then(Column::top) else {
            return false;
        };
        match mv.to {
            Target::Foundation => self.accepts_on_foundation(card),
            Target::Column(to) if to == mv.from => false,
            Target::Column(to) => match self.column(to) {
                Some(column) => column.top().map_or(true, |top| top.rank() == card.rank() + 1),
                None => false,
            },
        }
    }

    pub fn apply(&self, mv: Move) -> Result<GameState> {
        if !self.can_play(mv) {
            return Err(invariant(format!("illegal move {mv} in layout\n{self}")));
        }
        let mut next = self.clone();
        let Some(card) = next.columns[mv.from].cards.pop() else {
            return Err(invariant(format!("move {mv} from an empty column")));
        };
        match mv.to {
            Target::Foundation => next.foundations[card.suit().index()] += 1,
            Target::Column(to) => next.columns[to].cards.push(card),
        }
        Ok(next)
    }

    /// `order[i]` is the index of the column that goes to position `i` once
    /// the layout is normalized.
    pub fn canonical_order(&self) -> [usize; NUM_COLUMNS] {
        let mut order: [usize; NUM_COLUMNS] = std::array::from_fn(|i| i);
        order.sort_by_key(|&i| self.columns[i].canonical_key());
        order
    }

    /// Same layout with the columns in canonical order.
    pub fn normalized(&self) -> GameState {
        GameState {
            columns: self
                .canonical_order()
                .iter()
                .map(|&i| self.columns[i].clone())
                .collect(),
            foundations: self.foundations,
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.columns
            .windows(2)
            .all(|w| w[0].canonical_key() <= w[1].canonical_key())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) const FULL_DEAL: &str = "TS 8D 6C 9S 2H 2C 3H
9D TH QC 5C AC 7D 5D
5S QS 4C 3D KS 7C AH
8S KC JS JC 2D 9C QD
5H 7S TD 6S AD 4H
TC KH 6D 4S 6H KD
3S 7H AS 2S 8C 4D
3C 9H JD 8H JH QH
";

    /// Only the Queens and Kings are left; everything else is on the foundations.
    pub(crate) const EIGHT_CARDS: &str = "QH KS
KH QS
QD KC
KD QC
";

    /// Every Nine is buried under a King that has nowhere to go, and no
    /// column can ever be emptied.
    pub(crate) const BLOCKED: &str = "9H JH KH
9D JD KD
9C JC KC
9S JS KS
TH QH
TD QD
TC QC
TS QS
";

    fn card(s: &str) -> Card {
        Card::parse(s).unwrap()
    }

    #[test]
    fn test_parse_full_deal() {
        let state = GameState::parse(FULL_DEAL).unwrap();
        assert_eq!(state.foundations(), [0; 4]);
        assert_eq!(state.columns()[0].len(), 7);
        assert_eq!(state.columns()[7].top(), Some(card("QH")));
        assert_eq!(state.columns()[4].cards()[0], card("5H"));
        assert_eq!(state.foundation_cards(), 0);
        assert!(!state.is_solved());
    }

    #[test]
    fn test_parse_infers_foundations() {
        let state = GameState::parse(EIGHT_CARDS).unwrap();
        assert_eq!(state.foundations(), [11; 4]);
        assert_eq!(state.foundation_cards(), 44);
        assert_eq!(state.empty_columns(), 4);
        assert_eq!(state.first_empty_column(), Some(4));
        assert_eq!(state.needed(Suit::Clubs), Some(card("QC")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            GameState::parse("AH AH").unwrap_err(),
            ParseError::DuplicateCard(card("AH"))
        );
        assert!(matches!(
            GameState::parse("AH ZZ").unwrap_err(),
            ParseError::InvalidCard { position: 1, line: 1, .. }
        ));
        // AH is gone but 3H..KH are too, so hearts cannot be a foundation.
        assert_eq!(
            GameState::parse("2H").unwrap_err(),
            ParseError::NotAFoundation { suit: Suit::Hearts }
        );
        let nine = "AH\n2H\n3H\n4H\n5H\n6H\n7H\n8H\n9H";
        assert_eq!(
            GameState::parse(nine).unwrap_err(),
            ParseError::TooManyColumns { max: NUM_COLUMNS }
        );
    }

    #[test]
    fn test_blank_lines_are_empty_columns() {
        let state = GameState::parse("\nKH QH").unwrap();
        assert!(state.columns()[0].is_empty());
        assert_eq!(state.columns()[1].cards(), &[card("KH"), card("QH")]);
        assert_eq!(state.first_empty_column(), Some(0));
        assert!(state.can_play(Move::to_foundation(1)));
        assert!(!state.can_play(Move::to_foundation(0)));

        let state = GameState::parse("KS\n\nKH QH # comment\n").unwrap();
        assert_eq!(state.columns()[0].cards(), &[card("KS")]);
        assert!(state.columns()[1].is_empty());
        assert_eq!(state.columns()[2].top(), Some(card("QH")));

        let eight_blank = "\n".repeat(NUM_COLUMNS);
        assert_eq!(
            GameState::parse(&format!("{eight_blank}KH")).unwrap_err(),
            ParseError::TooManyColumns { max: NUM_COLUMNS }
        );
    }

    #[test]
    fn test_validate_partition() {
        let state = GameState::parse(FULL_DEAL).unwrap();
        assert_eq!(state.validate(), Ok(()));

        let mut broken = state.clone();
        broken.columns[0].cards.pop();
        assert_eq!(broken.validate(), Err(ParseError::MissingCard(card("3H"))));

        let mut broken = state;
        broken.columns[1].cards.push(card("3H"));
        assert_eq!(broken.validate(), Err(ParseError::DuplicateCard(card("3H"))));
    }

    #[test]
    fn test_deal_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let state = GameState::deal(&mut rng);
        let lengths: Vec<usize> = state.columns().iter().map(Column::len).collect();
        assert_eq!(lengths, vec![7, 6, 7, 6, 7, 6, 7, 6]);
        assert_eq!(state.validate(), Ok(()));
    }

    #[test]
    fn test_apply() {
        let state = GameState::parse(FULL_DEAL).unwrap();
        // AH is on top of column 2.
        let next = state.apply(Move::to_foundation(2)).unwrap();
        assert_eq!(next.foundation_top(Suit::Hearts), 1);
        assert_eq!(next.columns()[2].top(), Some(card("7C")));
        assert_eq!(next.validate(), Ok(()));

        // 3H onto 4H.
        let next = state.apply(Move::to_column(0, 4)).unwrap();
        assert_eq!(next.columns()[4].top(), Some(card("3H")));
        assert_eq!(next.columns()[0].top(), Some(card("2C")));

        assert!(state.apply(Move::to_foundation(0)).is_err());
        assert!(state.apply(Move::to_column(0, 1)).is_err());
        assert!(state.apply(Move::to_column(0, 0)).is_err());
        assert!(state.apply(Move::to_column(0, 9)).is_err());
    }

    #[test]
    fn test_normalize() {
        let state = GameState::parse(EIGHT_CARDS).unwrap();
        // All four columns hold two cards, so the tops decide: QC < QS < KC < KS.
        assert_eq!(state.canonical_order(), [3, 1, 2, 0, 4, 5, 6, 7]);
        let normalized = state.normalized();
        assert!(normalized.is_normalized());
        assert!(!state.is_normalized());
        assert_eq!(normalized.columns()[0].top(), Some(card("QC")));
        assert_eq!(normalized.normalized(), normalized);

        let full = GameState::parse(FULL_DEAL).unwrap().normalized();
        let lengths: Vec<usize> = full.columns().iter().map(Column::len).collect();
        assert_eq!(lengths, vec![7, 7, 7, 7, 6, 6, 6, 6]);
        // Among the seven-card columns the tops are 3H, 5D, AH, QD.
        assert_eq!(full.columns()[0].top(), Some(card("AH")));
        assert_eq!(full.columns()[1].top(), Some(card("3H")));
    }
}
