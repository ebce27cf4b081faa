//! Binary codec for the GLM MMAP wire format.
//!
//! Requests are a fixed 55-byte blob: a constant header, the four key fields
//! packed as big-endian u32 in cell_id/lac/mnc/mcc order, and a constant
//! trailer. Responses carry a status word followed by fixed-point latitude,
//! longitude, and a range in meters at fixed byte offsets. Decoding fails
//! closed: anything short or non-zero-status is a miss.

use crate::resolver::outcome::{CellKey, LookupOutcome};

const REQUEST_HEADER: [u8; 31] = [
    0x00, 0x0e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x1b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
    0x00,
];
const REQUEST_TRAILER: [u8; 8] = [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00];

/// Total size of an encoded request.
pub const REQUEST_LEN: usize = REQUEST_HEADER.len() + 4 * 4 + REQUEST_TRAILER.len();

/// Byte offset of the first key field (cell id) inside a request.
pub const KEY_FIELDS_OFFSET: usize = REQUEST_HEADER.len();

/// Minimum response length required to read status, coordinate, and range.
pub const MIN_RESPONSE_LEN: usize = 19;

const STATUS_OFFSET: usize = 3;
const LAT_OFFSET: usize = 7;
const LON_OFFSET: usize = 11;
const RANGE_OFFSET: usize = 15;

/// Coordinates travel as signed micro-degrees.
const COORDINATE_SCALE: f64 = 1_000_000.0;

/// Builds the upstream request for one cell identity. Pure and deterministic.
pub fn encode(key: CellKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(REQUEST_LEN);
    buf.extend_from_slice(&REQUEST_HEADER);
    buf.extend_from_slice(&key.cell_id.to_be_bytes());
    buf.extend_from_slice(&key.lac.to_be_bytes());
    buf.extend_from_slice(&key.mnc.to_be_bytes());
    buf.extend_from_slice(&key.mcc.to_be_bytes());
    buf.extend_from_slice(&REQUEST_TRAILER);
    buf
}

/// Decodes an upstream response into an outcome.
///
/// Total function: short responses and non-zero status words both decode to
/// [`LookupOutcome::Miss`]. The returned hit has not yet been checked for
/// plausibility.
pub fn decode(response: &[u8]) -> LookupOutcome {
    if response.len() < MIN_RESPONSE_LEN {
        return LookupOutcome::Miss;
    }

    if read_u32(response, STATUS_OFFSET) != 0 {
        return LookupOutcome::Miss;
    }

    LookupOutcome::Hit {
        lat: read_i32(response, LAT_OFFSET) as f64 / COORDINATE_SCALE,
        lon: read_i32(response, LON_OFFSET) as f64 / COORDINATE_SCALE,
        range_m: read_u32(response, RANGE_OFFSET),
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(field)
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    read_u32(bytes, offset) as i32
}
