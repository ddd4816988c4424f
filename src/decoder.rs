use crate::link::ResponseBatch;

/// Prefix that switches the decoder into data mode. The rest of that line
/// is already hex payload.
const DATA_MARKER: &str = "DATA:";

/// Decode a `SEND` response into chronological 8-bit samples.
///
/// Lines before the `DATA:` marker are firmware chatter and ignored. The
/// sentinel ends the scan. Hex is consumed two characters at a time;
/// malformed pairs are skipped and an odd trailing nibble is dropped, so a
/// noisy line costs individual bytes rather than the whole capture.
pub fn decode(batch: &ResponseBatch, sentinel: &str) -> Vec<u8> {
    let mut samples = Vec::new();
    let mut in_data = false;

    for line in batch.lines() {
        if line == sentinel {
            break;
        }
        if let Some(rest) = line.strip_prefix(DATA_MARKER) {
            in_data = true;
            decode_hex_line(rest, &mut samples);
        } else if in_data {
            decode_hex_line(line, &mut samples);
        }
    }

    samples
}

fn decode_hex_line(line: &str, out: &mut Vec<u8>) {
    let bytes = line.as_bytes();
    for pair in bytes.chunks_exact(2) {
        // chunks_exact drops an odd trailing nibble.
        match parse_hex_pair(pair) {
            Some(value) => out.push(value),
            None => {
                log::debug!(
                    "skipping malformed hex pair {:?}",
                    String::from_utf8_lossy(pair)
                );
            }
        }
    }
}

fn parse_hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = hex_digit(pair[0])?;
    let lo = hex_digit(pair[1])?;
    Some(hi << 4 | lo)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::DEFAULT_SENTINEL;

    fn batch(lines: &[&str]) -> ResponseBatch {
        ResponseBatch::new(lines.iter().map(|s| (*s).to_string()).collect())
    }

    fn run(lines: &[&str]) -> Vec<u8> {
        decode(&batch(lines), DEFAULT_SENTINEL)
    }

    #[test]
    fn even_length_hex_decodes_pairwise_in_order() {
        assert_eq!(run(&["DATA:00FF10A5", "END"]), vec![0x00, 0xFF, 0x10, 0xA5]);
    }

    #[test]
    fn continuation_lines_append_after_marker_line() {
        assert_eq!(
            run(&["DATA:0102", "0304", "0506", "END"]),
            vec![1, 2, 3, 4, 5, 6]
        );
    }

    #[test]
    fn chatter_before_marker_is_ignored() {
        assert_eq!(run(&["OK: SENDING", "DATA:7E", "END"]), vec![0x7E]);
    }

    #[test]
    fn lines_without_marker_never_enter_data_mode() {
        assert!(run(&["0102", "0304", "END"]).is_empty());
    }

    #[test]
    fn sentinel_line_is_not_data() {
        // Nothing after END is reachable, and END itself never parses.
        assert_eq!(run(&["DATA:AB", "END", "CD"]), vec![0xAB]);
    }

    #[test]
    fn odd_trailing_nibble_is_dropped() {
        assert_eq!(run(&["DATA:0FA", "END"]), vec![0x0F]);
        assert_eq!(run(&["DATA:0102", "3", "END"]), vec![0x01, 0x02]);
    }

    #[test]
    fn malformed_pairs_are_skipped_without_shifting_neighbors() {
        // "GZ" is no valid byte; "01" and "02" around it must survive.
        assert_eq!(run(&["DATA:01GZ02", "END"]), vec![0x01, 0x02]);
        // One bad character poisons exactly one pair.
        assert_eq!(run(&["DATA:0X1122", "END"]), vec![0x11, 0x22]);
    }

    #[test]
    fn marker_with_empty_payload_yields_no_samples() {
        assert!(run(&["DATA:", "END"]).is_empty());
    }

    #[test]
    fn empty_batch_yields_no_samples() {
        assert!(run(&[]).is_empty());
    }

    #[test]
    fn single_sample_smoke() {
        assert_eq!(run(&["DATA:0F", "END"]), vec![0x0F]);
    }
}
