//! In-memory newc writer.

use super::header::{HEADER_LEN, NewcHeader, TRAILER_NAME, padding_for};

const REGULAR_FILE_MODE: u32 = 0o100_644;
const DIRECTORY_MODE: u32 = 0o040_755;

/// Builds a newc cpio archive in memory.
///
/// Entries are written in the order they are added; [`CpioWriter::finish`]
/// appends the trailer.
///
/// ```
/// use archive::cpio::CpioWriter;
///
/// let mut writer = CpioWriter::new();
/// writer.add_directory("etc").add_file("etc/hostname", b"device\n");
/// let bytes = writer.finish_padded(512);
/// assert_eq!(bytes.len() % 512, 0);
/// assert!(bytes.starts_with(b"070701"));
/// ```
#[derive(Debug, Default)]
pub struct CpioWriter {
    out: Vec<u8>,
    next_ino: u32,
}

impl CpioWriter {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a regular file.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> &mut Self {
        self.add_entry(name, REGULAR_FILE_MODE, 1, data);
        self
    }

    /// Appends a directory entry.
    pub fn add_directory(&mut self, name: &str) -> &mut Self {
        self.add_entry(name, DIRECTORY_MODE, 2, &[]);
        self
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Returns `true` before any entry has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Appends the trailer and returns the archive.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.add_entry(TRAILER_NAME, 0, 1, &[]);
        self.out
    }

    /// Appends the trailer and zero-pads the archive to a multiple of `block`.
    #[must_use]
    pub fn finish_padded(self, block: usize) -> Vec<u8> {
        let mut out = self.finish();
        if block > 0 {
            let rem = out.len() % block;
            if rem != 0 {
                out.resize(out.len() + block - rem, 0);
            }
        }
        out
    }

    fn add_entry(&mut self, name: &str, mode: u32, nlink: u32, data: &[u8]) {
        self.next_ino += 1;
        let header = NewcHeader {
            ino: if name == TRAILER_NAME { 0 } else { self.next_ino },
            mode,
            nlink,
            file_size: data.len() as u32,
            name_size: name.len() as u32 + 1,
            ..NewcHeader::default()
        };

        header.encode(&mut self.out);
        self.out.extend_from_slice(name.as_bytes());
        self.out.push(0);
        let name_end = (HEADER_LEN + name.len() + 1) as u64;
        self.pad(padding_for(name_end));

        self.out.extend_from_slice(data);
        self.pad(padding_for(self.out.len() as u64));
    }

    fn pad(&mut self, count: u64) {
        self.out.resize(self.out.len() + count as usize, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_stay_four_byte_aligned() {
        let mut writer = CpioWriter::new();
        writer.add_file("a", b"12345").add_file("bb", b"1");
        assert_eq!(writer.len() % 4, 0);
        let bytes = writer.finish();
        assert_eq!(bytes.len() % 4, 0);
        assert!(bytes.windows(TRAILER_NAME.len()).any(|w| w == TRAILER_NAME.as_bytes()));
    }
}
