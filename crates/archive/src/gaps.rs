//! Gap chunk splitting.

use std::io::{Read, Seek, SeekFrom};

use items::ItemDefinition;

use crate::error::ArchiveResult;
use crate::names::gap_chunk_name;

/// Gap chunks start on multiples of this many bytes where possible.
pub const GAP_ALIGNMENT: u64 = 1024;

/// Largest gap chunk.
pub const MAX_GAP_CHUNK: u64 = 10 * 1024 * 1024;

/// Splits the uncovered range `[offset, offset + length)` into gap chunks.
///
/// A leading piece runs up to the next [`GAP_ALIGNMENT`] boundary when that
/// boundary lies inside the range; the rest is cut into pieces of at most
/// [`MAX_GAP_CHUNK`] bytes. The pieces tile the range exactly.
#[must_use]
pub fn split_gap(offset: u64, length: u64) -> Vec<(u64, u64)> {
    let end = offset.saturating_add(length);
    let mut begin = offset;
    let mut pieces = Vec::new();

    if begin % GAP_ALIGNMENT != 0 {
        let aligned = (begin / GAP_ALIGNMENT + 1) * GAP_ALIGNMENT;
        if aligned <= end {
            pieces.push((begin, aligned - begin));
            begin = aligned;
        }
    }

    while begin < end {
        let piece_end = end.min(begin + MAX_GAP_CHUNK);
        pieces.push((begin, piece_end - begin));
        begin = piece_end;
    }

    pieces
}

/// Hashes one gap piece and reports whether it is all zero bytes.
pub(crate) fn read_gap<R: Read + Seek + ?Sized>(
    reader: &mut R,
    offset: u64,
    length: u64,
) -> ArchiveResult<(ItemDefinition, bool)> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut data = vec![0u8; length as usize];
    reader.read_exact(&mut data)?;
    let all_zero = data.iter().all(|byte| *byte == 0);
    let item = ItemDefinition::from_bytes(&data).with_name(gap_chunk_name(offset, length));
    Ok((item, all_zero))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unaligned_gap_gets_a_leading_piece() {
        assert_eq!(split_gap(1000, 2000), vec![(1000, 24), (1024, 1976)]);
    }

    #[test]
    fn small_unaligned_gap_stays_whole() {
        assert_eq!(split_gap(10, 6), vec![(10, 6)]);
    }

    #[test]
    fn large_gaps_are_capped() {
        let pieces = split_gap(0, MAX_GAP_CHUNK * 2 + 5);
        assert_eq!(
            pieces,
            vec![
                (0, MAX_GAP_CHUNK),
                (MAX_GAP_CHUNK, MAX_GAP_CHUNK),
                (MAX_GAP_CHUNK * 2, 5)
            ]
        );
    }

    #[test]
    fn empty_gap_has_no_pieces() {
        assert!(split_gap(4096, 0).is_empty());
    }
}
