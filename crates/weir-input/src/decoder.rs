//! [§ 13.2.3.2 Determining the character encoding](https://html.spec.whatwg.org/multipage/parsing.html#determining-the-character-encoding)
//!
//! Bytes arrive in arbitrary chunks; a multi-byte sequence may straddle
//! two of them. A [`TextDecoder`] holds back incomplete trailing bytes
//! until the next chunk (or [`flush`](TextDecoder::flush)) completes them.

use std::str;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Incremental bytes-to-text conversion.
pub trait TextDecoder {
    /// Decode as much of `bytes` as possible, carrying any incomplete
    /// trailing sequence over to the next call.
    fn decode(&mut self, bytes: &[u8]) -> String;

    /// Decode whatever is still held back. Incomplete sequences become
    /// U+FFFD REPLACEMENT CHARACTER.
    fn flush(&mut self) -> String;
}

/// UTF-8 decoder.
///
/// "If the encoding is UTF-8 and the stream starts with a UTF-8 BOM, the
/// BOM is skipped." Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    bom_checked: bool,
}

impl Utf8Decoder {
    /// Create a decoder that has seen no input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip a leading BOM once enough bytes are available to tell.
    /// Returns `false` while a partial BOM prefix is still ambiguous.
    fn check_bom(&mut self) -> bool {
        if self.bom_checked {
            return true;
        }
        let probe = self.pending.len().min(UTF8_BOM.len());
        if self.pending[..probe] != UTF8_BOM[..probe] {
            self.bom_checked = true;
            return true;
        }
        if probe < UTF8_BOM.len() {
            return false;
        }
        let _ = self.pending.drain(..UTF8_BOM.len());
        self.bom_checked = true;
        true
    }
}

impl TextDecoder for Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        if !self.check_bom() {
            return String::new();
        }

        let mut output = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match str::from_utf8(rest) {
                Ok(text) => {
                    output.push_str(text);
                    rest = &[];
                    break;
                }
                Err(error) => {
                    let (valid, after) = rest.split_at(error.valid_up_to());
                    output.push_str(str::from_utf8(valid).unwrap_or_default());
                    match error.error_len() {
                        Some(invalid) => {
                            output.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[invalid..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more.
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
        output
    }

    fn flush(&mut self) -> String {
        // A truncated BOM prefix on its own is just invalid input.
        self.bom_checked = true;
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_bom_is_held_back() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"\xEF\xBB"), "");
        assert_eq!(decoder.decode(b"\xBFhi"), "hi");
    }
}
