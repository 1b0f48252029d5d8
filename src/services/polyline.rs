//! Encoded polyline codec.
//!
//! Implements [Google's polyline algorithm](https://developers.google.com/maps/documentation/utilities/polylinealgorithm):
//! each coordinate is scaled by 1e5, delta-encoded against the previous
//! point, zigzag-signed, and emitted as 5-bit chunks offset by 63 with `0x20`
//! as the continuation bit. Strava returns route geometry in this format.

use thiserror::Error;

use crate::services::geo::TrackPoint;

const SCALE: f64 = 1e5;
const CHUNK_OFFSET: u8 = 63;
const CONTINUATION_BIT: u8 = 0x20;
const CHUNK_MASK: u8 = 0x1f;
/// Scaled coordinates fit in 32 bits, i.e. at most seven 5-bit chunks.
const MAX_SHIFT: u32 = 35;

/// Errors that can occur while decoding a polyline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("polyline ended in the middle of a value")]
    Truncated,
    #[error("invalid polyline byte 0x{byte:02x} at offset {offset}")]
    InvalidByte { byte: u8, offset: usize },
    #[error("polyline value at offset {offset} is too long")]
    Overflow { offset: usize },
}

/// Decode an encoded polyline into track points.
///
/// An empty string decodes to an empty list; callers decide whether that is
/// acceptable.
pub fn decode(encoded: &str) -> Result<Vec<TrackPoint>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut pos = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut points = Vec::new();

    while pos < bytes.len() {
        lat += read_value(bytes, &mut pos)?;
        if pos >= bytes.len() {
            // A latitude without its longitude.
            return Err(DecodeError::Truncated);
        }
        lon += read_value(bytes, &mut pos)?;
        points.push(TrackPoint {
            lat: lat as f64 / SCALE,
            lon: lon as f64 / SCALE,
        });
    }

    Ok(points)
}

/// Read one zigzag-encoded signed value starting at `pos`.
fn read_value(bytes: &[u8], pos: &mut usize) -> Result<i64, DecodeError> {
    let start = *pos;
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let offset = *pos;
        let byte = *bytes.get(offset).ok_or(DecodeError::Truncated)?;
        if !(CHUNK_OFFSET..=CHUNK_OFFSET + 63).contains(&byte) {
            return Err(DecodeError::InvalidByte { byte, offset });
        }
        if shift >= MAX_SHIFT {
            return Err(DecodeError::Overflow { offset: start });
        }

        let chunk = byte - CHUNK_OFFSET;
        result |= u64::from(chunk & CHUNK_MASK) << shift;
        shift += 5;
        *pos += 1;

        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let value = (result >> 1) as i64;
    Ok(if result & 1 == 1 { !value } else { value })
}

/// Encode track points as a polyline string.
pub fn encode(points: &[TrackPoint]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;

    for p in points {
        let lat = (p.lat * SCALE).round() as i64;
        let lon = (p.lon * SCALE).round() as i64;
        write_value(&mut out, lat - prev_lat);
        write_value(&mut out, lon - prev_lon);
        prev_lat = lat;
        prev_lon = lon;
    }

    out
}

fn write_value(out: &mut String, value: i64) {
    let mut v: u64 = if value < 0 {
        !((value as u64) << 1)
    } else {
        (value as u64) << 1
    };

    while v >= u64::from(CONTINUATION_BIT) {
        let chunk = (CONTINUATION_BIT as u64 | (v & CHUNK_MASK as u64)) as u8;
        out.push(char::from(chunk + CHUNK_OFFSET));
        v >>= 5;
    }
    out.push(char::from(v as u8 + CHUNK_OFFSET));
}
