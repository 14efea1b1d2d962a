//! The pairtree encoding algorithm.
//!
//! Three passes over the identifier:
//! 1. Escape reserved characters and every byte outside printable ASCII
//!    (`0x21..=0x7e`) to `^<hex>` tokens, one token per UTF-8 byte.
//! 2. Substitute `/` → `=`, `:` → `+`, `.` → `,`.
//! 3. Chunk the result into 2-character segments; a short final remainder
//!    is kept as-is.

use std::path::{Path, PathBuf};

/// Characters that must be hex-escaped in addition to non-printable bytes.
const RESERVED_CHARS: &[char] = &['"', '*', '+', ',', '<', '=', '>', '?', '\\', '^', '|'];

/// Encode an identifier into pairtree path segments.
///
/// Total over any input string; the empty identifier produces an empty
/// segment list. Every produced segment is exactly 2 characters except
/// possibly the last.
///
/// # Examples
///
/// ```
/// use relic_pairtree::encode;
///
/// assert_eq!(encode("abcd"), vec!["ab", "cd"]);
/// assert_eq!(encode("abcde"), vec!["ab", "cd", "e"]);
/// assert!(encode("").is_empty());
/// ```
pub fn encode(id: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(id.len() * 2);

    for ch in id.chars() {
        if RESERVED_CHARS.contains(&ch) || !is_printable_ascii(ch) {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).as_bytes() {
                cleaned.push('^');
                cleaned.push_str(&format!("{byte:x}"));
            }
        } else {
            cleaned.push(ch);
        }
    }

    // The substitution pass runs after escaping, so these three characters
    // are never themselves hex-escaped.
    let substituted: String = cleaned
        .chars()
        .map(|c| match c {
            '/' => '=',
            ':' => '+',
            '.' => ',',
            other => other,
        })
        .collect();

    let bytes = substituted.as_bytes();
    bytes
        .chunks(2)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Join the pairtree segments for `id` under a storage root.
pub fn to_path(root: &Path, id: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in encode(id) {
        path.push(segment);
    }
    path
}

fn is_printable_ascii(ch: char) -> bool {
    matches!(ch, '\x21'..='\x7e')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_identifier_chunks_into_pairs() {
        assert_eq!(encode("abcdef"), vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn odd_length_keeps_short_tail() {
        assert_eq!(encode("abc"), vec!["ab", "c"]);
    }

    #[test]
    fn empty_identifier_yields_no_segments() {
        assert!(encode("").is_empty());
    }

    #[test]
    fn substitution_characters() {
        // '/' → '=', ':' → '+', '.' → ','
        assert_eq!(encode("ab/cd"), vec!["ab", "=c", "d"]);
        assert_eq!(encode("a:b"), vec!["a+", "b"]);
        assert_eq!(encode("a.b"), vec!["a,", "b"]);
    }

    #[test]
    fn uri_style_identifier() {
        // The canonical pairtree example: URLs survive intact.
        let segments = encode("http://n2t.info/urn:nbn:se:kb:repos-1");
        let joined = segments.join("");
        assert_eq!(joined, "http+==n2t,info=urn+nbn+se+kb+repos-1");
    }

    #[test]
    fn reserved_characters_are_hex_escaped() {
        assert_eq!(encode("a\"b"), vec!["a^", "22", "b"]);
        assert_eq!(encode("a*b"), vec!["a^", "2a", "b"]);
        assert_eq!(encode("a?b"), vec!["a^", "3f", "b"]);
    }

    #[test]
    fn space_is_escaped() {
        // Space is outside 0x21..=0x7e.
        assert_eq!(encode("a b").join(""), "a^20b");
    }

    #[test]
    fn multibyte_characters_escape_per_byte() {
        // U+00E9 is 0xc3 0xa9 in UTF-8.
        assert_eq!(encode("é").join(""), "^c3^a9");
    }

    #[test]
    fn to_path_joins_under_root() {
        let p = to_path(Path::new("/data/repo"), "abcd");
        assert_eq!(p, PathBuf::from("/data/repo/ab/cd"));
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(id in ".*") {
            prop_assert_eq!(encode(&id), encode(&id));
        }

        #[test]
        fn all_segments_are_pairs_except_last(id in ".*") {
            let segments = encode(&id);
            if let Some((last, rest)) = segments.split_last() {
                for seg in rest {
                    prop_assert_eq!(seg.len(), 2);
                }
                prop_assert!(last.len() == 1 || last.len() == 2);
            }
        }

        #[test]
        fn output_is_filesystem_safe(id in ".*") {
            for seg in encode(&id) {
                for b in seg.bytes() {
                    prop_assert!((0x21..=0x7e).contains(&b));
                    prop_assert!(b != b'/' && b != b'\\' && b != b'*' && b != b'?');
                }
            }
        }
    }
}
