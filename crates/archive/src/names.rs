//! Chunk naming and wildcard payload names.

/// Prefix shared by every gap chunk name.
pub const GAP_CHUNK_PREFIX: &str = "Chunk.Gap=";

/// Name of the chunk terminating a cpio stream.
pub const TRAILER_CHUNK_NAME: &str = "Chunk.Trailer";

/// Token substituted for each run of digits in a wildcard name.
pub const WILDCARD: char = '*';

/// Name of the header chunk that precedes payload `name`.
#[must_use]
pub fn header_chunk_name(name: &str) -> String {
    format!("Chunk.Header.Payload={name}")
}

/// Name of the chunk holding the bytes of payload `name`.
#[must_use]
pub fn payload_chunk_name(name: &str) -> String {
    format!("Chunk.Payload={name}")
}

/// Name of an alignment padding chunk.
#[must_use]
pub fn padding_chunk_name(offset: u64) -> String {
    format!("Chunk.Padding={offset}")
}

/// Name of a gap chunk covering `[offset, offset + length)`.
#[must_use]
pub fn gap_chunk_name(offset: u64, length: u64) -> String {
    format!("{GAP_CHUNK_PREFIX}{offset},{length}")
}

/// Replaces every maximal run of ASCII digits with [`WILDCARD`].
///
/// `lib/libfoo.so.1.2.3` and `lib/libfoo.so.1.10.0` both become
/// `lib/libfoo.so.*.*.*`, which lets versioned files pair up as delta
/// candidates.
#[must_use]
pub fn wildcard_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_digits = false;
    for ch in name.chars() {
        if ch.is_ascii_digit() {
            if !in_digits {
                out.push(WILDCARD);
                in_digits = true;
            }
        } else {
            out.push(ch);
            in_digits = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_names_follow_the_documented_shapes() {
        assert_eq!(header_chunk_name("bin/sh"), "Chunk.Header.Payload=bin/sh");
        assert_eq!(payload_chunk_name("bin/sh"), "Chunk.Payload=bin/sh");
        assert_eq!(padding_chunk_name(118), "Chunk.Padding=118");
        assert_eq!(gap_chunk_name(1024, 512), "Chunk.Gap=1024,512");
    }

    #[test]
    fn digit_runs_collapse_to_one_wildcard() {
        assert_eq!(wildcard_name("lib/libfoo.so.1.2.3"), "lib/libfoo.so.*.*.*");
        assert_eq!(wildcard_name("lib/libfoo.so.1.10.0"), "lib/libfoo.so.*.*.*");
        assert_eq!(wildcard_name("kernel-5.15.0-1234"), "kernel-*.*.*-*");
        assert_eq!(wildcard_name("no-digits"), "no-digits");
        assert_eq!(wildcard_name(""), "");
    }
}
