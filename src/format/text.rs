// src/format/text.rs

//! Legacy V1 text record decoding.
//!
//! The original generator wrote one record as 121 newline-terminated
//! lines: 112 hex-encoded bitboards (8 plies x 14 planes), four castling
//! flags, side to move, the rule-50 and move counters, one line of 1924
//! space-separated policy probabilities, and the outcome. Decoding is very
//! slow compared to the binary formats, which is why this exists only as
//! an ingest path: records are re-packed to V2 immediately.

use crate::error::{PipelineError, Result};
use crate::format::{v2, NUM_HIST};

/// Lines per legacy text record.
pub const RECORD_LINES: usize = NUM_HIST * v2::PLANES_PER_HIST + 7 + 2; // 121

const PLANE_LINES: usize = v2::NUM_PLANES; // 112

fn parse_str<'a>(line: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(line)
        .map(str::trim)
        .map_err(|_| PipelineError::decode(format!("{what} line is not valid ASCII")))
}

fn parse_plane(line: &[u8]) -> Result<u64> {
    let s = parse_str(line, "plane")?;
    if s.len() != 16 {
        return Err(PipelineError::decode(format!(
            "plane line has {} hex characters, expected 16",
            s.len()
        )));
    }
    u64::from_str_radix(s, 16)
        .map_err(|_| PipelineError::decode(format!("invalid hex bitboard '{s}'")))
}

fn parse_flag(line: &[u8], what: &str) -> Result<u8> {
    parse_str(line, what)?
        .parse::<u8>()
        .map_err(|_| PipelineError::decode(format!("invalid {what} value")))
}

/// Parse a counter line, clamping to the u8 range. Self-play games can run
/// the raw counters past 255; the binary format stores saturated values.
fn parse_clamped(line: &[u8], what: &str) -> Result<u8> {
    let v = parse_str(line, what)?
        .parse::<u32>()
        .map_err(|_| PipelineError::decode(format!("invalid {what} value")))?;
    Ok(v.min(255) as u8)
}

/// Decode one 121-line text record into a packed V2 record.
///
/// Returns `Ok(None)` when the policy vector contains a NaN: a known
/// upstream producer bug, and the record is dropped without failing the
/// blob. Malformed lines are a `Decode` error (fatal for the blob);
/// a wrong-length policy vector or out-of-range outcome is an
/// `Invariant` error (fatal for the pipeline).
pub fn decode_record(lines: &[&[u8]]) -> Result<Option<v2::Record>> {
    if lines.len() != RECORD_LINES {
        return Err(PipelineError::decode(format!(
            "text record has {} lines, expected {RECORD_LINES}",
            lines.len()
        )));
    }

    let mut planes = Vec::with_capacity(PLANE_LINES);
    for line in &lines[..PLANE_LINES] {
        planes.push(parse_plane(line)?);
    }

    let us_ooo = parse_flag(lines[PLANE_LINES], "us_ooo")?;
    let us_oo = parse_flag(lines[PLANE_LINES + 1], "us_oo")?;
    let them_ooo = parse_flag(lines[PLANE_LINES + 2], "them_ooo")?;
    let them_oo = parse_flag(lines[PLANE_LINES + 3], "them_oo")?;
    let side_to_move = parse_flag(lines[PLANE_LINES + 4], "side_to_move")?;
    let rule50_count = parse_clamped(lines[PLANE_LINES + 5], "rule50_count")?;
    let move_count = parse_clamped(lines[PLANE_LINES + 6], "move_count")?;

    let probs_line = parse_str(lines[PLANE_LINES + 7], "policy")?;
    let mut probs = Vec::with_capacity(v2::NUM_POLICY_MOVES);
    for tok in probs_line.split_ascii_whitespace() {
        let p: f32 = tok
            .parse()
            .map_err(|_| PipelineError::decode(format!("invalid policy probability '{tok}'")))?;
        if p.is_nan() {
            // Known producer bug: drop just this record.
            return Ok(None);
        }
        probs.push(p);
    }
    if probs.len() != v2::NUM_POLICY_MOVES {
        return Err(PipelineError::invariant(format!(
            "policy vector has {} entries, expected {}",
            probs.len(),
            v2::NUM_POLICY_MOVES
        )));
    }

    let outcome = parse_str(lines[PLANE_LINES + 8], "outcome")?
        .parse::<i8>()
        .map_err(|_| PipelineError::decode("invalid outcome value".to_string()))?;

    let fields = v2::Fields {
        probs,
        planes,
        us_ooo,
        us_oo,
        them_ooo,
        them_oo,
        side_to_move,
        rule50_count,
        move_count,
        outcome,
    };
    fields.pack().map(Some)
}


#[cfg(test)]
mod tests {
    use super::testutil::{encode_record, split_lines};
    use super::*;

    fn sample_planes() -> Vec<u64> {
        (0..PLANE_LINES as u64)
            .map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .collect()
    }

    fn uniform_probs() -> Vec<f32> {
        vec![1.0 / v2::NUM_POLICY_MOVES as f32; v2::NUM_POLICY_MOVES]
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let planes = sample_planes();
        let probs: Vec<f32> = (0..v2::NUM_POLICY_MOVES).map(|i| i as f32 / 1e5).collect();
        let text = encode_record(&planes, [1, 0, 0, 1, 1], 42, 17, &probs, 1);
        let lines = split_lines(&text);

        let record = decode_record(&lines).unwrap().unwrap();
        let fields = record.unpack();

        assert_eq!(fields.planes, planes);
        assert_eq!(fields.probs, probs);
        assert_eq!(
            [
                fields.us_ooo,
                fields.us_oo,
                fields.them_ooo,
                fields.them_oo,
                fields.side_to_move
            ],
            [1, 0, 0, 1, 1]
        );
        assert_eq!(fields.rule50_count, 42);
        assert_eq!(fields.move_count, 17);
        assert_eq!(fields.outcome, 1);
    }

    #[test]
    fn test_rule50_clamps_to_255() {
        let text = encode_record(&sample_planes(), [0; 5], 300, 0, &uniform_probs(), 0);
        let record = decode_record(&split_lines(&text)).unwrap().unwrap();
        assert_eq!(record.rule50_count(), 255);
        // Clamped value survives a re-decode of the packed bytes
        let reparsed = v2::Record::parse(record.into_bytes()).unwrap();
        assert_eq!(reparsed.rule50_count(), 255);
    }

    #[test]
    fn test_nan_probability_drops_record() {
        let mut probs = uniform_probs();
        probs[7] = f32::NAN;
        let text = encode_record(&sample_planes(), [0; 5], 0, 0, &probs, 0);
        assert!(decode_record(&split_lines(&text)).unwrap().is_none());
    }

    #[test]
    fn test_wrong_line_count_is_decode_error() {
        let text = encode_record(&sample_planes(), [0; 5], 0, 0, &uniform_probs(), 0);
        let lines = split_lines(&text);
        let err = decode_record(&lines[..RECORD_LINES - 1]).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_short_policy_vector_is_invariant_error() {
        let probs = vec![0.0f32; v2::NUM_POLICY_MOVES - 1];
        let text = encode_record(&sample_planes(), [0; 5], 0, 0, &probs, 0);
        let err = decode_record(&split_lines(&text)).unwrap_err();
        assert!(matches!(err, PipelineError::Invariant { .. }));
    }

    #[test]
    fn test_bad_outcome_is_invariant_error() {
        let text = encode_record(&sample_planes(), [0; 5], 0, 0, &uniform_probs(), 5);
        let err = decode_record(&split_lines(&text)).unwrap_err();
        assert!(matches!(err, PipelineError::Invariant { .. }));
    }

    #[test]
    fn test_garbage_plane_is_decode_error() {
        let mut text = encode_record(&sample_planes(), [0; 5], 0, 0, &uniform_probs(), 0);
        text.replace_range(0..16, "zzzzzzzzzzzzzzzz");
        let err = decode_record(&split_lines(&text)).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
