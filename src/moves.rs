// src/moves.rs

//! Move vocabularies for the policy head.
//!
//! The old encoding (1924 slots) and the new encoding (1858 slots) both
//! enumerate queen-and-knight moves from every square, then pawn
//! promotions. The old encoding lists promotions for both colors; the new
//! one lists only white promotions and relies on vertical mirroring for
//! black-to-move records. The migrator needs a slot-index map between the
//! two, built once from these generated tables.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Policy vector length in the old (V2) encoding.
pub const OLD_POLICY_MOVES: usize = 1924;
/// Policy vector length in the new (V3) encoding.
pub const NEW_POLICY_MOVES: usize = 1858;

/// Promotion piece. Knight promotion is encoded as a plain pawn push to the
/// final rank, so it never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Promotion {
    Queen,
    Rook,
    Bishop,
}

/// One move in coordinate form. Squares are 0..64, a1 = 0, h8 = 63.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<Promotion>,
}

impl Move {
    fn new(from: u8, to: u8) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    fn promote(from: u8, to: u8, promotion: Promotion) -> Self {
        Self {
            from,
            to,
            promotion: Some(promotion),
        }
    }

    /// Mirror the move vertically (flip ranks). Used to express a
    /// black-to-move policy slot in the white-oriented vocabulary.
    #[must_use]
    pub fn mirror(self) -> Self {
        Self {
            from: self.from ^ 56,
            to: self.to ^ 56,
            promotion: self.promotion,
        }
    }

    /// Long algebraic notation, e.g. "e2e4" or "e7e8q".
    #[must_use]
    pub fn to_uci(self) -> String {
        let sq = |s: u8| {
            format!(
                "{}{}",
                (b'a' + (s & 7)) as char,
                (b'1' + (s >> 3)) as char
            )
        };
        let suffix = match self.promotion {
            Some(Promotion::Queen) => "q",
            Some(Promotion::Rook) => "r",
            Some(Promotion::Bishop) => "b",
            None => "",
        };
        format!("{}{}{}", sq(self.from), sq(self.to), suffix)
    }
}

/// True if `to` is reachable from `from` by a queen or knight on an empty
/// board.
fn queen_or_knight_reachable(from: u8, to: u8) -> bool {
    if from == to {
        return false;
    }
    let df = (i16::from(from & 7) - i16::from(to & 7)).abs();
    let dr = (i16::from(from >> 3) - i16::from(to >> 3)).abs();
    df == 0 || dr == 0 || df == dr || (df == 1 && dr == 2) || (df == 2 && dr == 1)
}

/// Generate the promotion block: every 7th-to-8th rank pawn move (push and
/// both captures) for white, or 2nd-to-1st for black, with queen, rook and
/// bishop promotions in that order.
fn push_promotions(moves: &mut Vec<Move>, white: bool) {
    let (from_rank, to_rank) = if white { (6u8, 7u8) } else { (1u8, 0u8) };
    for c_from in 0i16..8 {
        for c_to in (c_from - 1)..=(c_from + 1) {
            if !(0..8).contains(&c_to) {
                continue;
            }
            let from = from_rank * 8 + c_from as u8;
            let to = to_rank * 8 + c_to as u8;
            for promo in [Promotion::Queen, Promotion::Rook, Promotion::Bishop] {
                moves.push(Move::promote(from, to, promo));
            }
        }
    }
}

/// The old (V2) move list: 1792 queen/knight moves, then white promotions,
/// then black promotions.
#[must_use]
pub fn old_move_list() -> Vec<Move> {
    let mut moves = Vec::with_capacity(OLD_POLICY_MOVES);
    for from in 0u8..64 {
        for to in 0u8..64 {
            if queen_or_knight_reachable(from, to) {
                moves.push(Move::new(from, to));
            }
        }
    }
    push_promotions(&mut moves, true);
    push_promotions(&mut moves, false);
    debug_assert_eq!(moves.len(), OLD_POLICY_MOVES);
    moves
}

/// The new (V3) move list: 1792 queen/knight moves, then white promotions
/// only.
#[must_use]
pub fn new_move_list() -> Vec<Move> {
    let mut moves = Vec::with_capacity(NEW_POLICY_MOVES);
    for from in 0u8..64 {
        for to in 0u8..64 {
            if queen_or_knight_reachable(from, to) {
                moves.push(Move::new(from, to));
            }
        }
    }
    push_promotions(&mut moves, true);
    debug_assert_eq!(moves.len(), NEW_POLICY_MOVES);
    moves
}

/// Slot-index map from the new policy encoding to the old one, one table
/// per side-to-move perspective.
///
/// `white[i]` / `black[i]` give, for new slot `i`, the old slot holding the
/// same algebraic move (mirrored first for black). `white_unused` /
/// `black_unused` list the old slots no new slot references for that
/// perspective; a well-formed old record carries zero probability there.
#[derive(Debug, Clone)]
pub struct MoveIndexMap {
    pub white: Vec<u16>,
    pub black: Vec<u16>,
    pub white_unused: Vec<u16>,
    pub black_unused: Vec<u16>,
}

impl MoveIndexMap {
    /// Build the map from the generated vocabularies.
    ///
    /// # Errors
    ///
    /// Returns `Invariant` if a new-encoding move has no old-encoding slot;
    /// that would mean the vocabularies are out of sync.
    pub fn build() -> Result<Self> {
        let old = old_move_list();
        let new = new_move_list();

        let old_index: HashMap<Move, u16> = old
            .iter()
            .enumerate()
            .map(|(i, &m)| (m, i as u16))
            .collect();

        let mut white = Vec::with_capacity(NEW_POLICY_MOVES);
        let mut black = Vec::with_capacity(NEW_POLICY_MOVES);
        for &m in &new {
            let w = *old_index.get(&m).ok_or_else(|| {
                PipelineError::invariant(format!("move {} missing from old encoding", m.to_uci()))
            })?;
            let b = *old_index.get(&m.mirror()).ok_or_else(|| {
                PipelineError::invariant(format!(
                    "mirrored move {} missing from old encoding",
                    m.mirror().to_uci()
                ))
            })?;
            white.push(w);
            black.push(b);
        }

        let unused = |used: &[u16]| -> Vec<u16> {
            let mut seen = vec![false; OLD_POLICY_MOVES];
            for &i in used {
                seen[i as usize] = true;
            }
            (0..OLD_POLICY_MOVES as u16)
                .filter(|&i| !seen[i as usize])
                .collect()
        };
        let white_unused = unused(&white);
        let black_unused = unused(&black);

        Ok(Self {
            white,
            black,
            white_unused,
            black_unused,
        })
    }

    /// Lookup table for the given perspective.
    #[must_use]
    pub fn for_side(&self, black_to_move: bool) -> &[u16] {
        if black_to_move {
            &self.black
        } else {
            &self.white
        }
    }

    /// Old slots unreferenced from the given perspective.
    #[must_use]
    pub fn unused_for_side(&self, black_to_move: bool) -> &[u16] {
        if black_to_move {
            &self.black_unused
        } else {
            &self.white_unused
        }
    }
}
