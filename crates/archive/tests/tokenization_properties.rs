//! Property and end-to-end tests for archive tokenization.

use std::io::Cursor;

use archive::cpio::CpioWriter;
use archive::gaps::{MAX_GAP_CHUNK, split_gap};
use archive::{ArchiveLoader, ArchiveTokenization};
use items::ItemDefinition;
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

// ============================================================================
// Test Data
// ============================================================================

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.r#gen()).collect()
}

fn sample_archive(seed: u64) -> Vec<u8> {
    let mut writer = CpioWriter::new();
    writer
        .add_directory("usr")
        .add_directory("usr/lib")
        .add_file("usr/lib/libdemo.so.1.2", &random_bytes(3000, seed))
        .add_file("usr/share/doc/README", b"documentation\n")
        .add_file("etc/empty", b"");
    writer.finish_padded(4096)
}

// ============================================================================
// Gap Splitting
// ============================================================================

proptest! {
    #[test]
    fn gap_pieces_tile_the_range(offset in 0u64..(1 << 40), length in 0u64..(3 * MAX_GAP_CHUNK)) {
        let pieces = split_gap(offset, length);
        let mut expected = offset;
        for (begin, len) in &pieces {
            prop_assert_eq!(*begin, expected);
            prop_assert!(*len > 0);
            prop_assert!(*len <= MAX_GAP_CHUNK);
            expected += len;
        }
        prop_assert_eq!(expected, offset + length);
    }
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn cpio_chunks_partition_the_archive() {
    for seed in 0..4 {
        let bytes = sample_archive(seed);
        let tokens = ArchiveLoader::with_default_parsers()
            .load(&mut Cursor::new(bytes.clone()))
            .expect("load");
        tokens.check_partition().expect("partition");

        let covered: u64 = tokens.chunks().map(|chunk| chunk.item.length()).sum();
        assert_eq!(covered, bytes.len() as u64);
        assert_eq!(tokens.archive_item(), &ItemDefinition::from_bytes(&bytes));
    }
}

#[test]
fn every_chunk_has_a_region_recipe_into_the_archive() {
    let bytes = sample_archive(9);
    let tokens = ArchiveLoader::with_default_parsers()
        .load(&mut Cursor::new(bytes.clone()))
        .expect("load");

    for chunk in tokens.chunks() {
        let recipe = tokens.reverse_recipe(&chunk.item).expect("reverse recipe");
        assert_eq!(recipe.name(), "Region");
        let start = recipe.number_ingredients()[0] as usize;
        let end = start + chunk.item.length() as usize;
        chunk.item.verify(&bytes[start..end]).expect("region content");
    }
}

#[test]
fn wildcard_lookup_pairs_versioned_libraries() {
    let tokens = ArchiveLoader::with_default_parsers()
        .load(&mut Cursor::new(sample_archive(1)))
        .expect("load");
    assert_eq!(
        tokens.payload().matching_wildcard("usr/lib/libdemo.so.1.3").count(),
        1
    );
    assert_eq!(tokens.payload().with_name("usr/lib/libdemo.so.1.3").count(), 0);
}

#[test]
fn tokenization_survives_a_json_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("source.json");
    let tokens = ArchiveLoader::with_default_parsers()
        .load(&mut Cursor::new(sample_archive(2)))
        .expect("load");

    tokens.write_json(&path).expect("write");
    let back = ArchiveTokenization::read_json(&path).expect("read");
    assert_eq!(back, tokens);
    back.check_partition().expect("partition");
}
