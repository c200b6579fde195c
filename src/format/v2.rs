// src/format/v2.rs

//! The V2 packed binary record (8604 bytes).
//!
//! Layout, fields in order:
//!
//! ```text
//! int32   version            (4 bytes, little-endian, = 2)
//! f32     probs[1924]        (7696 bytes, old policy encoding)
//! u64     planes[112]        (896 bytes, big-endian bitboards,
//!                             8 hist plies x 14 planes)
//! u8      us_ooo, us_oo, them_ooo, them_oo
//! u8      side_to_move
//! u8      rule50_count       (clamped to 0-255)
//! u8      move_count
//! i8      outcome            (-1, 0 or 1)
//! ```
//!
//! This is the format records travel through the shuffle buffer in: it is
//! the most compact, so it allows the largest buffer for a given memory
//! budget.

use bytes::Bytes;

use crate::error::{PipelineError, Result};
use crate::format::{NUM_HIST, V2_MAGIC};

/// Planes per history ply: twelve piece planes plus two repetition planes.
pub const PLANES_PER_HIST: usize = 14;
/// Total bit-packed planes in a record.
pub const NUM_PLANES: usize = NUM_HIST * PLANES_PER_HIST; // 112
/// Policy vector length.
pub const NUM_POLICY_MOVES: usize = crate::moves::OLD_POLICY_MOVES; // 1924

pub const PROBS_OFFSET: usize = 4;
pub const PROBS_BYTES: usize = NUM_POLICY_MOVES * 4; // 7696
pub const PLANES_OFFSET: usize = PROBS_OFFSET + PROBS_BYTES; // 7700
pub const PLANES_BYTES: usize = NUM_PLANES * 8; // 896
pub const SCALARS_OFFSET: usize = PLANES_OFFSET + PLANES_BYTES; // 8596
/// Total record length.
pub const RECORD_BYTES: usize = SCALARS_OFFSET + 8; // 8604

/// A validated V2 record. Wraps the raw bytes; accessors decode on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Validate raw bytes as a V2 record (length and version tag).
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() != RECORD_BYTES {
            return Err(PipelineError::decode(format!(
                "V2 record must be {RECORD_BYTES} bytes, got {}",
                data.len()
            )));
        }
        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if magic != V2_MAGIC {
            return Err(PipelineError::version(magic));
        }
        Ok(Self { data })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Raw policy-probability bytes (1924 little-endian f32).
    #[must_use]
    pub fn probs_bytes(&self) -> &[u8] {
        &self.data[PROBS_OFFSET..PROBS_OFFSET + PROBS_BYTES]
    }

    /// One policy probability by old-encoding slot index.
    #[must_use]
    pub fn prob(&self, idx: usize) -> f32 {
        let off = PROBS_OFFSET + idx * 4;
        f32::from_le_bytes(self.data[off..off + 4].try_into().unwrap())
    }

    /// Raw packed-plane bytes (112 big-endian u64 bitboards).
    #[must_use]
    pub fn planes_bytes(&self) -> &[u8] {
        &self.data[PLANES_OFFSET..PLANES_OFFSET + PLANES_BYTES]
    }

    /// One bitboard plane by flat index (ply * 14 + plane).
    #[must_use]
    pub fn plane(&self, idx: usize) -> u64 {
        let off = PLANES_OFFSET + idx * 8;
        u64::from_be_bytes(self.data[off..off + 8].try_into().unwrap())
    }

    /// Raw bytes of one plane.
    #[must_use]
    pub fn plane_bytes(&self, idx: usize) -> &[u8] {
        let off = PLANES_OFFSET + idx * 8;
        &self.data[off..off + 8]
    }

    #[must_use]
    pub fn us_ooo(&self) -> u8 {
        self.data[SCALARS_OFFSET]
    }

    #[must_use]
    pub fn us_oo(&self) -> u8 {
        self.data[SCALARS_OFFSET + 1]
    }

    #[must_use]
    pub fn them_ooo(&self) -> u8 {
        self.data[SCALARS_OFFSET + 2]
    }

    #[must_use]
    pub fn them_oo(&self) -> u8 {
        self.data[SCALARS_OFFSET + 3]
    }

    #[must_use]
    pub fn side_to_move(&self) -> u8 {
        self.data[SCALARS_OFFSET + 4]
    }

    #[must_use]
    pub fn rule50_count(&self) -> u8 {
        self.data[SCALARS_OFFSET + 5]
    }

    #[must_use]
    pub fn move_count(&self) -> u8 {
        self.data[SCALARS_OFFSET + 6]
    }

    #[must_use]
    pub fn outcome(&self) -> i8 {
        self.data[SCALARS_OFFSET + 7] as i8
    }

    /// Decode into logical fields.
    #[must_use]
    pub fn unpack(&self) -> Fields {
        Fields {
            probs: (0..NUM_POLICY_MOVES).map(|i| self.prob(i)).collect(),
            planes: (0..NUM_PLANES).map(|i| self.plane(i)).collect(),
            us_ooo: self.us_ooo(),
            us_oo: self.us_oo(),
            them_ooo: self.them_ooo(),
            them_oo: self.them_oo(),
            side_to_move: self.side_to_move(),
            rule50_count: self.rule50_count(),
            move_count: self.move_count(),
            outcome: self.outcome(),
        }
    }
}

/// Logical V2 record fields, for packing and round-trip checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
    pub probs: Vec<f32>,
    pub planes: Vec<u64>,
    pub us_ooo: u8,
    pub us_oo: u8,
    pub them_ooo: u8,
    pub them_oo: u8,
    pub side_to_move: u8,
    pub rule50_count: u8,
    pub move_count: u8,
    pub outcome: i8,
}

impl Fields {
    /// Pack into the binary layout.
    ///
    /// # Errors
    ///
    /// Returns `Invariant` for a wrong-length policy vector or plane list,
    /// or an outcome outside {-1, 0, 1}: these indicate upstream data
    /// corruption and are never coerced.
    pub fn pack(&self) -> Result<Record> {
        if self.probs.len() != NUM_POLICY_MOVES {
            return Err(PipelineError::invariant(format!(
                "policy vector has {} entries, expected {NUM_POLICY_MOVES}",
                self.probs.len()
            )));
        }
        if self.planes.len() != NUM_PLANES {
            return Err(PipelineError::invariant(format!(
                "plane list has {} entries, expected {NUM_PLANES}",
                self.planes.len()
            )));
        }
        if !matches!(self.outcome, -1 | 0 | 1) {
            return Err(PipelineError::invariant(format!(
                "outcome {} not in {{-1, 0, 1}}",
                self.outcome
            )));
        }

        let mut buf = Vec::with_capacity(RECORD_BYTES);
        buf.extend_from_slice(&V2_MAGIC.to_le_bytes());
        for &p in &self.probs {
            buf.extend_from_slice(&p.to_le_bytes());
        }
        for &plane in &self.planes {
            buf.extend_from_slice(&plane.to_be_bytes());
        }
        buf.extend_from_slice(&[
            self.us_ooo,
            self.us_oo,
            self.them_ooo,
            self.them_oo,
            self.side_to_move,
            self.rule50_count,
            self.move_count,
            self.outcome as u8,
        ]);
        debug_assert_eq!(buf.len(), RECORD_BYTES);
        Ok(Record { data: buf.into() })
    }
}
