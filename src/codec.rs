//! Fixed-layout binary codec for feed records.
//!
//! One record is 40 bytes, little-endian, in this order:
//!
//! | offset | size | field      |
//! |-------:|-----:|------------|
//! | 0      | 8    | `id`       |
//! | 8      | 8    | `time`     |
//! | 16     | 8    | `price`    |
//! | 24     | 8    | `quantity` |
//! | 32     | 4    | `type`     |
//! | 36     | 4    | `symbol`   |
//!
//! A quote datagram is the best bid record followed by the best ask record. Bytes past
//! the second record are ignored.

use crate::error::DecodeError;
use crate::types::{OrderEntry, ORDER_ENTRY_SIZE, QUOTE_DATAGRAM_SIZE};

fn read_i64(rec: &[u8], at: usize) -> i64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&rec[at..at + 8]);
    i64::from_le_bytes(b)
}

fn read_i32(rec: &[u8], at: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&rec[at..at + 4]);
    i32::from_le_bytes(b)
}

/// Decodes one record at `offset`. Returns the record and the offset just past it.
///
/// Fails with [`DecodeError::OutOfRange`] when fewer than 40 bytes remain.
pub fn decode_order_entry(buf: &[u8], offset: usize) -> Result<(OrderEntry, usize), DecodeError> {
    let end = offset
        .checked_add(ORDER_ENTRY_SIZE)
        .filter(|&end| end <= buf.len())
        .ok_or(DecodeError::OutOfRange {
            offset,
            needed: ORDER_ENTRY_SIZE,
            available: buf.len().saturating_sub(offset),
        })?;
    let rec = &buf[offset..end];
    let entry = OrderEntry {
        id: read_i64(rec, 0),
        time: read_i64(rec, 8),
        price: read_i64(rec, 16),
        quantity: read_i64(rec, 24),
        kind: read_i32(rec, 32),
        symbol: read_i32(rec, 36),
    };
    Ok((entry, end))
}

/// Decodes a quote datagram into `(best_bid, best_ask)`.
///
/// Anything shorter than 80 bytes is rejected as a whole; no partial pair is returned.
pub fn decode_quote(buf: &[u8]) -> Result<(OrderEntry, OrderEntry), DecodeError> {
    let (bid, next) = decode_order_entry(buf, 0)?;
    let (ask, _) = decode_order_entry(buf, next)?;
    Ok((bid, ask))
}

/// Appends the 40-byte encoding of `entry` to `out`.
pub fn encode_order_entry(entry: &OrderEntry, out: &mut Vec<u8>) {
    out.reserve(ORDER_ENTRY_SIZE);
    out.extend_from_slice(&entry.id.to_le_bytes());
    out.extend_from_slice(&entry.time.to_le_bytes());
    out.extend_from_slice(&entry.price.to_le_bytes());
    out.extend_from_slice(&entry.quantity.to_le_bytes());
    out.extend_from_slice(&entry.kind.to_le_bytes());
    out.extend_from_slice(&entry.symbol.to_le_bytes());
}

/// Builds the 80-byte datagram for a bid/ask pair.
pub fn encode_quote(bid: &OrderEntry, ask: &OrderEntry) -> Vec<u8> {
    let mut out = Vec::with_capacity(QUOTE_DATAGRAM_SIZE);
    encode_order_entry(bid, &mut out);
    encode_order_entry(ask, &mut out);
    out
}
