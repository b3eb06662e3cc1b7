//! Create-then-apply tests covering every blob a patch can draw from.

use std::fs;

use compress::zstd::{DeltaParameters, delta_compress};
use items::{DeltaFormat, ItemDefinition, Recipe};
use patch::{ApplyOptions, ApplySession, CreateSession, PatchFile, dump_json};
use rand::{Rng, SeedableRng, rngs::StdRng};

// ============================================================================
// Test Data
// ============================================================================

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.r#gen()).collect()
}

struct Fixture {
    source: Vec<u8>,
    target: Vec<u8>,
    patch: PatchFile,
}

/// Source is `[a, c]`; target is `[a, c', fresh]` where `c'` is an edit of `c`
/// shipped as a zstd delta in the inline assets and `fresh` is remainder.
fn fixture(dir: &std::path::Path) -> Fixture {
    let a = random_bytes(2000, 1);
    let c = random_bytes(3000, 2);
    let mut c_edit = c.clone();
    c_edit[1500..1510].copy_from_slice(b"0123456789");
    let fresh = random_bytes(700, 3);
    let unused_tail = random_bytes(100, 4);

    let source = [a.clone(), c.clone()].concat();
    let target = [a.clone(), c_edit.clone(), fresh.clone()].concat();

    let delta = delta_compress(&c, &c_edit, DeltaParameters::default()).expect("delta");
    let inline_path = dir.join("InlineAssets.dat");
    fs::write(&inline_path, &delta).expect("inline blob");
    let remainder_path = dir.join("Remainder.dat");
    let remainder = [fresh.clone(), unused_tail].concat();
    fs::write(&remainder_path, &remainder).expect("remainder blob");

    let a_item = ItemDefinition::from_bytes(&a);
    let c_item = ItemDefinition::from_bytes(&c);
    let c_edit_item = ItemDefinition::from_bytes(&c_edit);
    let fresh_item = ItemDefinition::from_bytes(&fresh);
    let delta_item = ItemDefinition::from_bytes(&delta);
    let target_item = ItemDefinition::from_bytes(&target);
    let remainder_item = ItemDefinition::from_bytes(&remainder).with_name("remainder.uncompressed");

    let mut session = CreateSession::new(target_item.clone(), ItemDefinition::from_bytes(&source));
    session
        .set_inline_assets(&inline_path, delta_item.clone())
        .set_remainder(&remainder_path, remainder_item.clone())
        .add_recipes([
            Recipe::concatenation(
                target_item,
                vec![a_item.clone(), c_edit_item.clone(), fresh_item.clone()],
            )
            .expect("concat"),
            Recipe::copy_source(a_item, 0).expect("a"),
            Recipe::copy_source(c_item.clone(), 2000).expect("c"),
            Recipe::apply_delta(DeltaFormat::Zstd, c_edit_item, delta_item.clone(), c_item)
                .expect("delta"),
            Recipe::slice(fresh_item, remainder_item, 0).expect("fresh"),
        ]);

    let path = dir.join("out.patch");
    session.write(&path).expect("write patch");
    Fixture {
        source,
        target,
        patch: PatchFile::read_path(&path).expect("read patch"),
    }
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn reproduces_target_from_source_inline_and_remainder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(dir.path());

    let mut session =
        ApplySession::new(fixture.patch, fixture.source, ApplyOptions::default()).expect("session");
    assert_eq!(session.apply().expect("apply"), fixture.target);
}

#[test]
fn patch_is_smaller_than_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(dir.path());
    let size = fixture.patch.to_bytes().expect("encode").len();
    assert!(size < fixture.target.len(), "{size} >= {}", fixture.target.len());
}

#[test]
fn nested_patch_is_applied_against_its_basis() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inner = fixture(dir.path());
    let inner_bytes = inner.patch.to_bytes().expect("encode inner");

    // Outer archive: a header followed by the inner source; the result swaps
    // in the inner target.
    let header = b"outer header".to_vec();
    let outer_source = [header.clone(), inner.source.clone()].concat();
    let outer_target = [header.clone(), inner.target.clone()].concat();

    let header_item = ItemDefinition::from_bytes(&header);
    let basis_item = ItemDefinition::from_bytes(&inner.source);
    let inner_target_item = ItemDefinition::from_bytes(&inner.target);
    let diff_item = ItemDefinition::from_bytes(&inner_bytes);
    let outer_target_item = ItemDefinition::from_bytes(&outer_target);

    let patch = PatchFile {
        target: outer_target_item.clone(),
        source: ItemDefinition::from_bytes(&outer_source),
        recipes: vec![
            Recipe::concatenation(outer_target_item, vec![header_item.clone(), inner_target_item.clone()])
                .expect("concat"),
            Recipe::copy_source(header_item, 0).expect("header"),
            Recipe::copy_source(basis_item.clone(), header.len() as u64).expect("basis"),
            Recipe::nested_diff(inner_target_item, diff_item.clone(), basis_item).expect("nested"),
            Recipe::inline_asset_copy(diff_item, 0).expect("inline"),
        ],
        inline_assets: inner_bytes,
        remainder: Default::default(),
    };

    let mut session = ApplySession::new(patch, outer_source, ApplyOptions::default()).expect("session");
    assert_eq!(session.apply().expect("apply"), outer_target);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn corrupted_inline_assets_fail_verification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut fixture = fixture(dir.path());
    let last = fixture.patch.inline_assets.len() - 1;
    fixture.patch.inline_assets[last] ^= 0x55;

    let mut session =
        ApplySession::new(fixture.patch, fixture.source, ApplyOptions::default()).expect("session");
    assert!(session.apply().is_err());
}

#[test]
fn dump_describes_the_written_patch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(dir.path());
    let path = dir.path().join("out.patch");

    let json = dump_json(&path).expect("dump");
    let value: serde_json::Value = serde_json::from_str(&json).expect("json");
    assert_eq!(value["RemainderLength"], 800);
    assert_eq!(
        value["Recipes"].as_array().map(Vec::len),
        Some(fixture.patch.recipes.len())
    );
    assert!(json.contains("ZstdDelta"));
}
