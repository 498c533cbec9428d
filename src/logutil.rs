//! Logging utilities for rendering raw datagram/serial bytes as single-line
//! previews. Escapes control bytes that otherwise break log readability.

/// Render a byte slice for single-line logging:
/// - printable ASCII is kept as-is
/// - backslash => `\\`
/// - `\n`, `\r`, `\t` => two-character escapes
/// - anything else => `\xNN`
///
/// Truncates long payloads (over `MAX_PREVIEW` bytes) with an ellipsis to cap
/// log noise.
pub fn preview(data: &[u8]) -> String {
    const MAX_PREVIEW: usize = 128;
    let mut out = String::with_capacity(data.len().min(MAX_PREVIEW) + 8);
    for (count, &b) in data.iter().enumerate() {
        if count >= MAX_PREVIEW {
            out.push_str("...");
            break;
        }
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{b:02X}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn escapes_controls_and_keeps_printables() {
        let esc = preview(b"\x1b2 30\nQRZ?");
        assert_eq!(esc, "\\x1B2 30\\nQRZ?");
    }

    #[test]
    fn truncates_long_payloads() {
        let long = vec![b'V'; 200];
        let esc = preview(&long);
        assert!(esc.ends_with("..."));
    }
}
