//! Google encoded polyline format, precision 5 (as returned by OpenRouteService).
//!
//! Decoding itself is done by the `polyline` crate. Input is screened first:
//! at precision 5 no coordinate delta needs more than 7 characters, so longer
//! runs are rejected before they can overflow the accumulator.

use crate::types::GeoPoint;
use geo::{Coord, Point};
use thiserror::Error;

const PRECISION: u32 = 5;

/// A delta spans at most 360 degrees: 3.6e7 units, 27 bits with the sign, 6 chunks
const MAX_CHUNKS: usize = 7;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolylineError {
    #[error("Polyline truncated at byte {0}")]
    Truncated(usize),

    #[error("Invalid polyline character at byte {0}")]
    InvalidChar(usize),

    #[error("Polyline value too large at byte {0}")]
    Overflow(usize),

    #[error("Polyline codec: {0}")]
    Codec(String),
}

pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, PolylineError> {
    screen(encoded.as_bytes())?;

    let line = ::polyline::decode_polyline(encoded, PRECISION)
        .map_err(|e| PolylineError::Codec(e.to_string()))?;

    Ok(line.points().map(GeoPoint::from).collect())
}

pub fn encode(points: &[GeoPoint]) -> Result<String, PolylineError> {
    let coords = points.iter().map(|p| Point::from(*p).0).collect::<Vec<Coord<f64>>>();
    ::polyline::encode_coordinates(coords, PRECISION).map_err(|e| PolylineError::Codec(e.to_string()))
}

/// Check the alphabet, value lengths and that values come in lat/lon pairs
fn screen(bytes: &[u8]) -> Result<(), PolylineError> {
    let mut run = 0;
    let mut values = 0usize;

    for (idx, &byte) in bytes.iter().enumerate() {
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidChar(idx));
        }
        run += 1;
        if run > MAX_CHUNKS {
            return Err(PolylineError::Overflow(idx));
        }
        // Continuation bit clear ends a value
        if byte - 63 < 0x20 {
            run = 0;
            values += 1;
        }
    }

    if run != 0 || values % 2 != 0 {
        return Err(PolylineError::Truncated(bytes.len()));
    }
    Ok(())
}
