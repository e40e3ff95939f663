//! Feed records and the derived price point.
//!
//! [`OrderEntry`] is one decoded 40-byte wire record (best bid or best ask).
//! [`MarketData`] is the mid price derived from a bid/ask pair, handed to the sink and then dropped.

/// Size of one encoded [`OrderEntry`] on the wire.
pub const ORDER_ENTRY_SIZE: usize = 40;

/// Minimum processable datagram: bid record followed by ask record.
pub const QUOTE_DATAGRAM_SIZE: usize = 2 * ORDER_ENTRY_SIZE;

/// One decoded feed record.
///
/// Field units are defined by the upstream feed; nothing here is validated
/// (a negative `quantity` decodes as-is).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OrderEntry {
    pub id: i64,
    pub time: i64,
    pub price: i64,
    pub quantity: i64,
    #[serde(rename = "type")]
    pub kind: i32,
    pub symbol: i32,
}

impl OrderEntry {
    /// The symbol as a ticker string, when the publisher packed printable ASCII into it.
    ///
    /// Trailing NUL and space bytes are stripped. Returns `None` for empty or non-printable symbols.
    pub fn symbol_code(&self) -> Option<String> {
        let bytes = self.symbol.to_le_bytes();
        let end = bytes
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map(|p| p + 1)?;
        let code = &bytes[..end];
        if code.iter().all(|b| b.is_ascii_graphic()) {
            Some(code.iter().map(|&b| b as char).collect())
        } else {
            None
        }
    }
}

/// Packs up to four ASCII characters into the wire `symbol` field (NUL padded).
pub fn symbol_from_code(code: &str) -> i32 {
    let mut bytes = [0u8; 4];
    for (slot, b) in bytes.iter_mut().zip(code.bytes()) {
        *slot = b;
    }
    i32::from_le_bytes(bytes)
}

/// Price point pushed to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MarketData {
    /// The bid record's `time`.
    pub time: i64,
    /// Mid price in the feed's price unit.
    pub price: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_code_round_trips_short_tickers() {
        let entry = OrderEntry {
            symbol: symbol_from_code("BTC"),
            ..Default::default()
        };
        assert_eq!(entry.symbol_code().as_deref(), Some("BTC"));

        let entry = OrderEntry {
            symbol: symbol_from_code("AAPL"),
            ..Default::default()
        };
        assert_eq!(entry.symbol_code().as_deref(), Some("AAPL"));
    }

    #[test]
    fn symbol_code_rejects_empty_and_binary() {
        assert_eq!(OrderEntry::default().symbol_code(), None);
        let entry = OrderEntry {
            symbol: i32::from_le_bytes([0x01, 0xff, b'A', 0]),
            ..Default::default()
        };
        assert_eq!(entry.symbol_code(), None);
    }

    #[test]
    fn order_entry_serializes_kind_as_type() {
        let entry = OrderEntry {
            kind: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["type"], 2);
    }
}
