//! Incremental UTF-8 decoding with line-ending normalization.

/// Decodes a byte stream chunk by chunk.
///
/// Multi-byte characters and `\r\n` pairs split across chunk boundaries are
/// carried over to the next chunk. Invalid sequences become U+FFFD. Every
/// `\r\n` becomes `\n`; a lone `\r` is kept.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of an incomplete character from the previous chunk.
    pending: Vec<u8>,
    /// The previous chunk ended with `\r`.
    pending_cr: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, appending to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut String) {
        let owned;
        let mut bytes: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            self.pending.extend_from_slice(chunk);
            owned = std::mem::take(&mut self.pending);
            &owned
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.normalize_into(text, out);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.normalize_into(text, out);
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.normalize_into("\u{FFFD}", out);
                            bytes = &rest[len..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Flush carried-over state at end of input.
    pub fn finish(mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.normalize_into("\u{FFFD}", out);
        }
        if self.pending_cr {
            out.push('\r');
        }
    }

    fn normalize_into(&mut self, text: &str, out: &mut String) {
        out.reserve(text.len());
        for c in text.chars() {
            if self.pending_cr {
                self.pending_cr = false;
                if c == '\n' {
                    out.push('\n');
                    continue;
                }
                out.push('\r');
            }
            if c == '\r' {
                self.pending_cr = true;
            } else {
                out.push(c);
            }
        }
    }
}

/// Decode a complete buffer in one step.
pub fn decode_all(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut decoder = StreamDecoder::new();
    decoder.push(bytes, &mut out);
    decoder.finish(&mut out);
    out
}
