//! cpio "new ASCII" (newc) header layout.
//!
//! ## Wire Format
//!
//! Each entry starts with a 110-byte ASCII header: a 6-byte magic followed
//! by thirteen 8-digit hexadecimal fields, then the NUL-terminated path.
//! Header plus path are padded with zeros to a multiple of four bytes, and
//! so is the file data that follows. An entry named `TRAILER!!!` ends the
//! archive.
//!
//! ```text
//! magic ino mode uid gid nlink mtime filesize devmajor devminor
//!       rdevmajor rdevminor namesize check
//! ```

/// Magic of plain newc archives.
pub const NEWC_MAGIC: &[u8; 6] = b"070701";

/// Magic of newc archives carrying a per-file checksum.
pub const NEWC_CRC_MAGIC: &[u8; 6] = b"070702";

/// Fixed header length.
pub const HEADER_LEN: usize = 110;

/// Path of the terminating entry.
pub const TRAILER_NAME: &str = "TRAILER!!!";

/// Alignment of headers and file data.
pub const ALIGNMENT: u64 = 4;

const FIELD_COUNT: usize = 13;
const FIELD_WIDTH: usize = 8;

/// Decoded newc header fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewcHeader {
    /// `true` for the `070702` variant.
    pub crc: bool,
    /// Inode number.
    pub ino: u32,
    /// File type and permission bits.
    pub mode: u32,
    /// Owner id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
    /// Link count.
    pub nlink: u32,
    /// Modification time, seconds since the epoch.
    pub mtime: u32,
    /// Length of the file data.
    pub file_size: u32,
    /// Device major number.
    pub dev_major: u32,
    /// Device minor number.
    pub dev_minor: u32,
    /// Special file major number.
    pub rdev_major: u32,
    /// Special file minor number.
    pub rdev_minor: u32,
    /// Path length including the terminating NUL.
    pub name_size: u32,
    /// Checksum of the data for the `070702` variant, zero otherwise.
    pub check: u32,
}

impl NewcHeader {
    /// Decodes a header, returning a short reason on failure.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, String> {
        let crc = match &bytes[..6] {
            magic if magic == NEWC_MAGIC => false,
            magic if magic == NEWC_CRC_MAGIC => true,
            _ => return Err("bad magic".to_string()),
        };

        let mut fields = [0u32; FIELD_COUNT];
        for (index, field) in fields.iter_mut().enumerate() {
            let start = 6 + index * FIELD_WIDTH;
            let text = std::str::from_utf8(&bytes[start..start + FIELD_WIDTH])
                .map_err(|_| format!("field {index} is not ASCII"))?;
            *field = u32::from_str_radix(text, 16)
                .map_err(|_| format!("field {index} is not hexadecimal: {text:?}"))?;
        }

        let [
            ino,
            mode,
            uid,
            gid,
            nlink,
            mtime,
            file_size,
            dev_major,
            dev_minor,
            rdev_major,
            rdev_minor,
            name_size,
            check,
        ] = fields;

        if name_size == 0 {
            return Err("empty path".to_string());
        }

        Ok(Self {
            crc,
            ino,
            mode,
            uid,
            gid,
            nlink,
            mtime,
            file_size,
            dev_major,
            dev_minor,
            rdev_major,
            rdev_minor,
            name_size,
            check,
        })
    }

    /// Appends the encoded header to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(if self.crc { NEWC_CRC_MAGIC } else { NEWC_MAGIC });
        for field in [
            self.ino,
            self.mode,
            self.uid,
            self.gid,
            self.nlink,
            self.mtime,
            self.file_size,
            self.dev_major,
            self.dev_minor,
            self.rdev_major,
            self.rdev_minor,
            self.name_size,
            self.check,
        ] {
            out.extend_from_slice(format!("{field:08X}").as_bytes());
        }
    }

    /// Length of header, path and alignment padding together.
    #[must_use]
    pub const fn padded_len(&self) -> u64 {
        let raw = HEADER_LEN as u64 + self.name_size as u64;
        raw + padding_for(raw)
    }
}

/// Zero bytes needed after `position` to reach the next aligned offset.
#[must_use]
pub const fn padding_for(position: u64) -> u64 {
    (ALIGNMENT - position % ALIGNMENT) % ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewcHeader {
        NewcHeader {
            ino: 7,
            mode: 0o100644,
            nlink: 1,
            file_size: 5,
            name_size: 6,
            ..NewcHeader::default()
        }
    }

    #[test]
    fn encode_then_parse_preserves_fields() {
        let mut out = Vec::new();
        sample().encode(&mut out);
        assert_eq!(out.len(), HEADER_LEN);
        let bytes: [u8; HEADER_LEN] = out.try_into().expect("header length");
        assert_eq!(NewcHeader::parse(&bytes).expect("parse"), sample());
    }

    #[test]
    fn rejects_foreign_magic_and_bad_hex() {
        let mut out = Vec::new();
        sample().encode(&mut out);
        let mut bad_magic: [u8; HEADER_LEN] = out.clone().try_into().expect("len");
        bad_magic[..6].copy_from_slice(b"070707");
        assert!(NewcHeader::parse(&bad_magic).is_err());

        let mut bad_hex: [u8; HEADER_LEN] = out.try_into().expect("len");
        bad_hex[10] = b'G';
        assert!(NewcHeader::parse(&bad_hex).is_err());
    }

    #[test]
    fn padding_reaches_four_byte_boundary() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(110 + 6), 0);
        assert_eq!(padding_for(110 + 5), 1);
        assert_eq!(sample().padded_len(), 116);
    }
}
