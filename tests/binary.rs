//! End-to-end tests that run the `diffgen` binary.
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! |  0   | Patch written and verified                |
//! |  1   | Invalid parameters or missing binaries    |
//! |  2   | Unrecognised or corrupt archive           |
//! |  3   | Target is not diffable                    |

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use archive::cpio::CpioWriter;
use patch::{ApplyOptions, ApplySession};
use rand::{Rng, SeedableRng, rngs::StdRng};

// ============================================================================
// Test Infrastructure
// ============================================================================

fn diffgen(args: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_diffgen"))
        .args(args)
        .arg("--bsdiff")
        .arg("diffgen-test-no-bsdiff")
        .output()
        .expect("failed to run diffgen")
}

fn random(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.r#gen()).collect()
}

struct Layout {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
}

impl Layout {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.root.join(name)
    }

    fn write_archives(&self) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(2024);
        let boot = random(&mut rng, 12_000);
        let system = random(&mut rng, 7_000);
        let mut patched = system.clone();
        patched[3000..3004].copy_from_slice(b"v2.1");

        let mut source = CpioWriter::new();
        source.add_file("boot.img", &boot).add_file("system.img", &system);
        fs::write(self.path("source.cpio"), source.finish_padded(512)).expect("write source");

        let mut target = CpioWriter::new();
        target.add_file("boot.img", &boot).add_file("system.img", &patched);
        let bytes = target.finish_padded(512);
        fs::write(self.path("target.cpio"), &bytes).expect("write target");
        bytes
    }
}

// ============================================================================
// Successful Builds
// ============================================================================

#[test]
fn binary_builds_a_patch_that_applies() {
    let layout = Layout::new();
    let target = layout.write_archives();
    let (source, target_path, output) = (
        layout.path("source.cpio"),
        layout.path("target.cpio"),
        layout.path("update.patch"),
    );
    let (log, work) = (layout.path("log"), layout.path("work"));

    let result = diffgen(&[&source, &target_path, &output, &log, &work]);
    assert_eq!(
        result.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(String::from_utf8_lossy(&result.stdout).contains("bytes for a"));
    assert!(!work.exists());

    let rebuilt = ApplySession::open(&output, &source, ApplyOptions::default())
        .expect("open patch")
        .apply()
        .expect("apply patch");
    assert_eq!(rebuilt, target);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn binary_lists_missing_parameters() {
    let result = Command::new(env!("CARGO_BIN_EXE_diffgen"))
        .output()
        .expect("failed to run diffgen");
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stdout).contains("missing parameter: source"));
}

#[test]
fn binary_rejects_unknown_archives() {
    let layout = Layout::new();
    fs::write(layout.path("source.bin"), vec![0x5a; 4096]).expect("write");
    fs::write(layout.path("target.bin"), vec![0xa5; 4096]).expect("write");
    let result = diffgen(&[
        &layout.path("source.bin"),
        &layout.path("target.bin"),
        &layout.path("out.patch"),
        &layout.path("log"),
        &layout.path("work"),
    ]);
    assert_eq!(result.status.code(), Some(2));
    assert!(!layout.path("out.patch").exists());
}
