// src/format/mod.rs

//! Versioned training-record formats.
//!
//! Three on-disk formats exist: legacy newline-delimited text (V1), and
//! two packed binary layouts (V2, V3). A fourth magic value marks chunks
//! invalidated by a historical generation bug. All formats describe the
//! same logical record: a policy-probability vector, eight plies of
//! bit-packed board history, castling rights, side to move, rule-50 and
//! move counters, and the game outcome from the side to move's view.

pub mod text;
pub mod v2;
pub mod v3;
mod version;

pub use version::{FormatVersion, INVALIDATED_MAGIC, V2_MAGIC, V3_MAGIC};

/// History plies per record.
pub const NUM_HIST: usize = 8;
/// Piece-occupancy planes per ply (six piece types for each side).
pub const PIECE_PLANES: usize = 12;
