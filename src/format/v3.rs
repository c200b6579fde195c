// src/format/v3.rs

//! The V3 packed binary record (8280 bytes).
//!
//! Differences from V2: the policy vector uses the new 1858-slot encoding,
//! the redundant repetition=2 plane is gone (13 planes per ply instead of
//! 14), the rule-50 counter is a float normalized to [0, 1], the scalar
//! fields moved after it, move_count is forced to zero, and one pad byte
//! keeps the length even.
//!
//! ```text
//! int32   version            (4 bytes, little-endian, = 3)
//! f32     probs[1858]        (7432 bytes, new policy encoding)
//! u64     planes[104]        (832 bytes, 8 hist plies x 13 planes)
//! f32     rule50_count       (count / 100)
//! u8      us_ooo, us_oo, them_ooo, them_oo
//! u8      side_to_move
//! u8      move_count         (always 0)
//! i8      outcome            (-1, 0 or 1)
//! u8      unused
//! ```

use bytes::Bytes;

use crate::error::{PipelineError, Result};
use crate::format::{NUM_HIST, V3_MAGIC};

/// Planes per history ply: twelve piece planes plus the repetition=1 plane.
pub const PLANES_PER_HIST: usize = 13;
/// Total bit-packed planes in a record.
pub const NUM_PLANES: usize = NUM_HIST * PLANES_PER_HIST; // 104
/// Policy vector length.
pub const NUM_POLICY_MOVES: usize = crate::moves::NEW_POLICY_MOVES; // 1858

pub const PROBS_OFFSET: usize = 4;
pub const PROBS_BYTES: usize = NUM_POLICY_MOVES * 4; // 7432
pub const PLANES_OFFSET: usize = PROBS_OFFSET + PROBS_BYTES; // 7436
pub const PLANES_BYTES: usize = NUM_PLANES * 8; // 832
pub const RULE50_OFFSET: usize = PLANES_OFFSET + PLANES_BYTES; // 8268
pub const SCALARS_OFFSET: usize = RULE50_OFFSET + 4; // 8272
/// Total record length.
pub const RECORD_BYTES: usize = SCALARS_OFFSET + 8; // 8280

/// A validated V3 record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Validate raw bytes as a V3 record (length and version tag).
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() != RECORD_BYTES {
            return Err(PipelineError::decode(format!(
                "V3 record must be {RECORD_BYTES} bytes, got {}",
                data.len()
            )));
        }
        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if magic != V3_MAGIC {
            return Err(PipelineError::version(magic));
        }
        Ok(Self { data })
    }

    pub(crate) fn from_raw_unchecked(data: Bytes) -> Self {
        debug_assert_eq!(data.len(), RECORD_BYTES);
        Self { data }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// One policy probability by new-encoding slot index.
    #[must_use]
    pub fn prob(&self, idx: usize) -> f32 {
        let off = PROBS_OFFSET + idx * 4;
        f32::from_le_bytes(self.data[off..off + 4].try_into().unwrap())
    }

    /// One bitboard plane by flat index (ply * 13 + plane).
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

    /// Normalized rule-50 counter in [0, 1].
    #[must_use]
    pub fn rule50(&self) -> f32 {
        f32::from_le_bytes(
            self.data[RULE50_OFFSET..RULE50_OFFSET + 4]
                .try_into()
                .unwrap(),
        )
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
    pub fn move_count(&self) -> u8 {
        self.data[SCALARS_OFFSET + 5]
    }

    #[must_use]
    pub fn outcome(&self) -> i8 {
        self.data[SCALARS_OFFSET + 6] as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_record() -> Vec<u8> {
        let mut buf = vec![0u8; RECORD_BYTES];
        buf[..4].copy_from_slice(&V3_MAGIC.to_le_bytes());
        buf
    }

    #[test]
    fn test_layout_totals() {
        assert_eq!(RECORD_BYTES, 8280);
        assert_eq!(NUM_PLANES, 104);
        assert_eq!(PROBS_BYTES, 7432);
    }

    #[test]
    fn test_parse_accepts_valid() {
        let record = Record::parse(raw_record().into()).unwrap();
        assert_eq!(record.outcome(), 0);
        assert_eq!(record.move_count(), 0);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = Record::parse(Bytes::from(vec![3, 0, 0, 0])).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        let mut raw = raw_record();
        raw[0] = 2;
        let err = Record::parse(raw.into()).unwrap_err();
        assert!(matches!(err, PipelineError::Version { found: 2 }));
    }

    #[test]
    fn test_scalar_offsets() {
        let mut raw = raw_record();
        raw[RULE50_OFFSET..RULE50_OFFSET + 4].copy_from_slice(&0.37f32.to_le_bytes());
        raw[SCALARS_OFFSET + 4] = 1; // side_to_move
        raw[SCALARS_OFFSET + 6] = (-1i8) as u8; // outcome
        let record = Record::parse(raw.into()).unwrap();
        assert!((record.rule50() - 0.37).abs() < f32::EPSILON);
        assert_eq!(record.side_to_move(), 1);
        assert_eq!(record.outcome(), -1);
    }
}
