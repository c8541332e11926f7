//! Binary/text classification by content sniffing.

/// Number of leading bytes inspected.
pub const SNIFF_BYTES: usize = 8 * 1024;

/// Fraction of control bytes above which a sample counts as binary.
const CONTROL_RATIO: f64 = 0.3;

/// Classification of a byte sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Text,
    Binary,
}

impl Classification {
    pub fn is_binary(self) -> bool {
        self == Self::Binary
    }
}

/// Classify the leading bytes of a file.
///
/// A sample is binary when it contains a NUL byte, when control bytes other
/// than common whitespace make up a large share of it, or when it is not
/// valid UTF-8. An incomplete multi-byte sequence at the very end of the
/// sample is tolerated, since the sample may cut a character in half.
/// The file extension is never consulted.
pub fn classify(sample: &[u8]) -> Classification {
    if sample.is_empty() {
        return Classification::Text;
    }
    if sample.contains(&0) {
        return Classification::Binary;
    }

    let control = sample.iter().filter(|&&b| is_suspicious_control(b)).count();
    if control as f64 / sample.len() as f64 > CONTROL_RATIO {
        return Classification::Binary;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => Classification::Text,
        // error_len() == None means the input ended mid-sequence
        Err(e) if e.error_len().is_none() && sample.len() - e.valid_up_to() < 4 => {
            Classification::Text
        }
        Err(_) => Classification::Binary,
    }
}

fn is_suspicious_control(byte: u8) -> bool {
    matches!(byte, 0x01..=0x08 | 0x0e..=0x1a | 0x1c..=0x1f | 0x7f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(classify(b"fn main() {}\n"), Classification::Text);
        assert_eq!(classify(b""), Classification::Text);
        assert_eq!(classify("héllo wörld".as_bytes()), Classification::Text);
    }

    #[test]
    fn test_nul_byte_is_binary() {
        assert!(classify(b"abc\0def").is_binary());
    }

    #[test]
    fn test_control_heavy_is_binary() {
        let sample = [0x01u8, 0x02, 0x03, b'a', 0x04];
        assert!(classify(&sample).is_binary());
        // Tabs, newlines, form feeds and escapes are fine
        assert!(!classify(b"\t\r\n\x0c\x1b[0m").is_binary());
    }

    #[test]
    fn test_invalid_utf8_is_binary() {
        assert!(classify(&[b'a', 0xff, 0xfe, b'b']).is_binary());
    }

    #[test]
    fn test_truncated_tail_is_tolerated() {
        let mut sample = "abc".as_bytes().to_vec();
        // First two bytes of a three-byte character
        sample.extend_from_slice(&"€".as_bytes()[..2]);
        assert_eq!(classify(&sample), Classification::Text);
    }
}
