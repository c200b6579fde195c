// src/migrate.rs

//! Offline V2 -> V3 record migration.
//!
//! V3 changed three things at once: the policy head shrank to the 1858-slot
//! vocabulary (black-to-move records are expressed through a vertical
//! mirror instead of their own promotion block), the board history was
//! re-oriented so every ply is stored from the same perspective, and the
//! redundant repetition=2 plane was dropped. The migrator rewrites old
//! records to that layout so archived chunks stay usable.
//!
//! Migration is lossy only where V3 itself is: the move counter is zeroed
//! (it was never consumed by training and its old values were unreliable).
//! Everything else is checked, not coerced; probability mass parked in a
//! slot the new vocabulary cannot express fails the migration.

use bytes::Bytes;

use crate::decoder::ChunkDecoder;
use crate::error::{PipelineError, Result};
use crate::format::{v2, v3, FormatVersion, PIECE_PLANES, V3_MAGIC};
use crate::moves::MoveIndexMap;
use crate::rng::PipelineRng;

/// Rewrites V2 records (and legacy text chunks) as V3.
pub struct Migrator {
    map: MoveIndexMap,
}

impl Migrator {
    /// Build a migrator; the move-index map is generated once and reused.
    pub fn new() -> Result<Self> {
        Ok(Self {
            map: MoveIndexMap::build()?,
        })
    }

    /// Rewrite one record.
    ///
    /// # Errors
    ///
    /// Returns `Invariant` if the old record carries nonzero probability in
    /// a slot the new vocabulary has no equivalent for (the other side's
    /// promotion block). Such a record is corrupt and must not be silently
    /// renormalized.
    pub fn migrate(&self, record: &v2::Record) -> Result<v3::Record> {
        let black_to_move = record.side_to_move() != 0;
        let mut buf = Vec::with_capacity(v3::RECORD_BYTES);
        buf.extend_from_slice(&V3_MAGIC.to_le_bytes());

        // Policy: gather old slots in new-vocabulary order, mirrored tables
        // for black to move. Raw byte copies, the floats are not touched.
        let table = self.map.for_side(black_to_move);
        let probs = record.probs_bytes();
        for &old_idx in table {
            let off = old_idx as usize * 4;
            buf.extend_from_slice(&probs[off..off + 4]);
        }
        for &old_idx in self.map.unused_for_side(black_to_move) {
            let p = record.prob(old_idx as usize);
            if p != 0.0 {
                return Err(PipelineError::invariant(format!(
                    "probability {p} in old policy slot {old_idx} has no new-encoding slot"
                )));
            }
        }

        // History planes. Even plies are stored from the side to move's
        // perspective already; odd plies are the opponent's, so their piece
        // blocks swap colors and each bitboard flips ranks (byte reversal).
        // The repetition=1 plane passes through, repetition=2 is dropped.
        for ply in 0..crate::format::NUM_HIST {
            let base = ply * v2::PLANES_PER_HIST;
            if ply % 2 == 1 {
                let half = PIECE_PLANES / 2;
                for plane in (half..PIECE_PLANES).chain(0..half) {
                    buf.extend(record.plane_bytes(base + plane).iter().rev());
                }
            } else {
                for plane in 0..PIECE_PLANES {
                    buf.extend_from_slice(record.plane_bytes(base + plane));
                }
            }
            buf.extend_from_slice(record.plane_bytes(base + PIECE_PLANES));
        }

        buf.extend_from_slice(&(f32::from(record.rule50_count()) / 100.0).to_le_bytes());
        buf.extend_from_slice(&[
            record.us_ooo(),
            record.us_oo(),
            record.them_ooo(),
            record.them_oo(),
            record.side_to_move(),
            0, // move_count: unreliable upstream, dropped by the new format
            record.outcome() as u8,
            0, // pad to even length
        ]);
        debug_assert_eq!(buf.len(), v3::RECORD_BYTES);
        Ok(v3::Record::from_raw_unchecked(buf.into()))
    }

    /// Rewrite a whole chunk blob (V2 or legacy text) as concatenated V3
    /// records. No downsampling is applied.
    ///
    /// # Errors
    ///
    /// A V3 blob is a `Version` error (nothing to migrate), an invalidated
    /// blob a `Decode` error; per-record failures propagate.
    pub fn migrate_chunk(&self, blob: &Bytes) -> Result<Vec<u8>> {
        match FormatVersion::detect(blob)? {
            FormatVersion::V3 => return Err(PipelineError::version(V3_MAGIC)),
            FormatVersion::Invalidated => {
                return Err(PipelineError::decode(
                    "invalidated chunk cannot be migrated",
                ))
            }
            FormatVersion::V2 | FormatVersion::LegacyText => {}
        }
        let mut decoder = ChunkDecoder::new(1, PipelineRng::new(0));
        let mut out = Vec::new();
        for raw in decoder.records(blob)? {
            let record = v2::Record::parse(raw?)?;
            out.extend_from_slice(self.migrate(&record)?.as_bytes());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::{new_move_list, old_move_list};

    fn zero_policy_fields() -> v2::Fields {
        let mut fields = v2::tests::sample_fields();
        fields.probs = vec![0.0; v2::NUM_POLICY_MOVES];
        fields.side_to_move = 0;
        fields
    }

    #[test]
    fn test_policy_mass_and_argmax_preserved() {
        let migrator = Migrator::new().unwrap();
        let old = old_move_list();
        let e2e4 = old.iter().position(|m| m.to_uci() == "e2e4").unwrap();
        let g1f3 = old.iter().position(|m| m.to_uci() == "g1f3").unwrap();

        let mut fields = zero_policy_fields();
        fields.probs[e2e4] = 0.7;
        fields.probs[g1f3] = 0.3;
        let v3 = migrator.migrate(&fields.pack().unwrap()).unwrap();

        let new_probs: Vec<f32> = (0..v3::NUM_POLICY_MOVES).map(|i| v3.prob(i)).collect();
        let mass: f32 = new_probs.iter().sum();
        assert!((mass - 1.0).abs() < 1e-6);

        let argmax = new_probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(new_move_list()[argmax].to_uci(), "e2e4");
    }

    #[test]
    fn test_black_to_move_mirrors_policy() {
        let migrator = Migrator::new().unwrap();
        let old = old_move_list();
        // Black's e7e5, stored in black's own promotionless block
        let e7e5 = old.iter().position(|m| m.to_uci() == "e7e5").unwrap();

        let mut fields = zero_policy_fields();
        fields.side_to_move = 1;
        fields.probs[e7e5] = 1.0;
        let v3 = migrator.migrate(&fields.pack().unwrap()).unwrap();

        let argmax = (0..v3::NUM_POLICY_MOVES)
            .max_by(|&a, &b| v3.prob(a).partial_cmp(&v3.prob(b)).unwrap())
            .unwrap();
        // Mirrored into the white-oriented vocabulary
        assert_eq!(new_move_list()[argmax].to_uci(), "e2e4");
        assert!((v3.prob(argmax) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mass_in_unreachable_slot_is_invariant_error() {
        let migrator = Migrator::new().unwrap();
        let old = old_move_list();
        // A black promotion slot; unreachable from the white perspective
        let black_promo = old
            .iter()
            .position(|m| m.promotion.is_some() && m.from >> 3 == 1)
            .unwrap();

        let mut fields = zero_policy_fields();
        fields.probs[black_promo] = 0.1;
        let err = migrator.migrate(&fields.pack().unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::Invariant { .. }));
    }

    #[test]
    fn test_even_plies_copied_verbatim_without_rep2() {
        let migrator = Migrator::new().unwrap();
        let mut fields = zero_policy_fields();
        for (i, plane) in fields.planes.iter_mut().enumerate() {
            *plane = 0x0100_0000_0000_0000u64.wrapping_mul(i as u64 + 1);
        }
        let record = fields.pack().unwrap();
        let v3 = migrator.migrate(&record).unwrap();

        for ply in (0..crate::format::NUM_HIST).step_by(2) {
            for plane in 0..v3::PLANES_PER_HIST {
                assert_eq!(
                    v3.plane(ply * v3::PLANES_PER_HIST + plane),
                    record.plane(ply * v2::PLANES_PER_HIST + plane),
                    "ply {ply} plane {plane}"
                );
            }
        }
    }

    #[test]
    fn test_odd_plies_swap_colors_and_flip_ranks() {
        let migrator = Migrator::new().unwrap();
        let mut fields = zero_policy_fields();
        for (i, plane) in fields.planes.iter_mut().enumerate() {
            *plane = (i as u64 + 1).wrapping_mul(0x0123_4567_89AB_CDEF);
        }
        let record = fields.pack().unwrap();
        let v3 = migrator.migrate(&record).unwrap();

        for ply in (1..crate::format::NUM_HIST).step_by(2) {
            let v2_base = ply * v2::PLANES_PER_HIST;
            let v3_base = ply * v3::PLANES_PER_HIST;
            for plane in 0..6 {
                // Output piece block 0..6 holds the old 6..12, rank-flipped
                assert_eq!(
                    v3.plane(v3_base + plane),
                    record.plane(v2_base + 6 + plane).swap_bytes()
                );
                assert_eq!(
                    v3.plane(v3_base + 6 + plane),
                    record.plane(v2_base + plane).swap_bytes()
                );
            }
            // Repetition plane passes through unflipped
            assert_eq!(v3.plane(v3_base + 12), record.plane(v2_base + 12));
        }
    }

    #[test]
    fn test_scalars_and_rule50_normalization() {
        let migrator = Migrator::new().unwrap();
        let mut fields = zero_policy_fields();
        fields.rule50_count = 37;
        fields.move_count = 90;
        fields.outcome = -1;
        let v3 = migrator.migrate(&fields.pack().unwrap()).unwrap();

        assert!((v3.rule50() - 0.37).abs() < f32::EPSILON);
        assert_eq!(v3.us_ooo(), fields.us_ooo);
        assert_eq!(v3.us_oo(), fields.us_oo);
        assert_eq!(v3.them_ooo(), fields.them_ooo);
        assert_eq!(v3.them_oo(), fields.them_oo);
        assert_eq!(v3.side_to_move(), fields.side_to_move);
        assert_eq!(v3.move_count(), 0);
        assert_eq!(v3.outcome(), -1);
    }

    #[test]
    fn test_migrated_record_reparses() {
        let migrator = Migrator::new().unwrap();
        let v3 = migrator.migrate(&zero_policy_fields().pack().unwrap()).unwrap();
        assert!(v3::Record::parse(v3.into_bytes()).is_ok());
    }

    #[test]
    fn test_migrate_chunk_v2_blob() {
        let migrator = Migrator::new().unwrap();
        let mut blob = Vec::new();
        blob.extend_from_slice(zero_policy_fields().pack().unwrap().as_bytes());
        blob.extend_from_slice(zero_policy_fields().pack().unwrap().as_bytes());
        let out = migrator.migrate_chunk(&blob.into()).unwrap();
        assert_eq!(out.len(), 2 * v3::RECORD_BYTES);
    }

    #[test]
    fn test_migrate_chunk_rejects_v3_input() {
        let migrator = Migrator::new().unwrap();
        let mut blob = vec![0u8; v3::RECORD_BYTES];
        blob[..4].copy_from_slice(&V3_MAGIC.to_le_bytes());
        let err = migrator.migrate_chunk(&blob.into()).unwrap_err();
        assert!(matches!(err, PipelineError::Version { found: 3 }));
    }
}
