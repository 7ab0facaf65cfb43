//! Escaping codec for binary-safe transmission over a line-mode link.
//!
//! A terminal's line discipline interprets bytes like `0x03` or `0x0a` as
//! control sequences instead of data. Prefixing every payload byte with the
//! escape marker makes the line discipline pass the following byte through
//! literally, so arbitrary binary data survives without switching the
//! terminal into raw mode.

/// The escape marker prefixed to every payload byte.
///
/// In ASCII 0x16 is SYN; in caret notation it is `^V`, the literal-next
/// character used to type odd bytes into a shell. The value was found
/// empirically and remote line disciplines depend on it. Do not change it.
pub const ESCAPE_MARKER: u8 = 0x16;

/// Escape a payload so it can be transmitted as-is.
///
/// Every input byte becomes a `(marker, byte)` pair; the output is exactly
/// twice as long as the input. Works for any input, including the empty
/// payload and payloads containing the marker itself.
#[must_use]
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(payload.len() * 2);
    for &byte in payload {
        escaped.push(ESCAPE_MARKER);
        escaped.push(byte);
    }
    escaped
}
