//! Encoded file attributes as stored in manifest `r` records.
//!
//! The record is a space separated list of integers, each written in the
//! backup tool's base64 digit alphabet, most significant digit first, with
//! an optional leading `-`. The first thirteen fields follow `struct stat`;
//! anything after them (flags, windows attributes, compression) is ignored
//! when browsing.

use crate::utils::ManifestError;
use serde::Serialize;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// Decoded status fields of one manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Mark this entry as a directory while keeping its permission bits.
    /// Used when a listing shows a path component that only exists in the
    /// manifest as the parent of deeper entries.
    pub fn fake_directory(&mut self) {
        if self.is_dir() {
            return;
        }
        self.mode = (self.mode & !S_IFMT) | S_IFDIR;
    }

    pub fn decode(attribs: &str) -> Result<Self, ManifestError> {
        let fields = attribs
            .split(' ')
            .filter(|f| !f.is_empty())
            .take(13)
            .map(from_base64)
            .collect::<Result<Vec<_>, _>>()?;
        if fields.len() < 13 {
            return Err(ManifestError::BadAttribs(format!(
                "expected 13 fields, found {}",
                fields.len()
            )));
        }

        let unsigned = |i: usize, name: &str| -> Result<u64, ManifestError> {
            u64::try_from(fields[i])
                .map_err(|_| ManifestError::BadAttribs(format!("negative {name}")))
        };
        let small = |i: usize, name: &str| -> Result<u32, ManifestError> {
            u32::try_from(fields[i])
                .map_err(|_| ManifestError::BadAttribs(format!("{name} out of range")))
        };

        Ok(Stat {
            dev: unsigned(0, "dev")?,
            ino: unsigned(1, "ino")?,
            mode: small(2, "mode")?,
            nlink: unsigned(3, "nlink")?,
            uid: small(4, "uid")?,
            gid: small(5, "gid")?,
            rdev: unsigned(6, "rdev")?,
            size: unsigned(7, "size")?,
            blksize: unsigned(8, "blksize")?,
            blocks: unsigned(9, "blocks")?,
            atime: fields[10],
            mtime: fields[11],
            ctime: fields[12],
        })
    }

    pub fn encode(&self) -> String {
        let fields: [i64; 13] = [
            self.dev as i64,
            self.ino as i64,
            i64::from(self.mode),
            self.nlink as i64,
            i64::from(self.uid),
            i64::from(self.gid),
            self.rdev as i64,
            self.size as i64,
            self.blksize as i64,
            self.blocks as i64,
            self.atime,
            self.mtime,
            self.ctime,
        ];
        fields.iter().map(|v| to_base64(*v)).collect::<Vec<_>>().join(" ")
    }
}

pub fn from_base64(s: &str) -> Result<i64, ManifestError> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() {
        return Err(ManifestError::BadAttribs(format!("empty field {s:?}")));
    }
    let mut value: i64 = 0;
    for b in digits.bytes() {
        let digit = ALPHABET
            .iter()
            .position(|&a| a == b)
            .ok_or_else(|| ManifestError::BadAttribs(format!("bad digit {:?} in {s:?}", b as char)))?;
        value = value
            .checked_mul(64)
            .and_then(|v| v.checked_add(digit as i64))
            .ok_or_else(|| ManifestError::BadAttribs(format!("field {s:?} overflows")))?;
    }
    Ok(if negative { -value } else { value })
}

pub fn to_base64(value: i64) -> String {
    let mut magnitude = value.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(ALPHABET[(magnitude & 0x3F) as usize]);
        magnitude >>= 6;
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_digits() {
        assert_eq!(to_base64(0), "A");
        assert_eq!(to_base64(63), "/");
        assert_eq!(to_base64(64), "BA");
        assert_eq!(to_base64(-1), "-B");
        assert_eq!(from_base64("BA").unwrap(), 64);
        assert_eq!(from_base64("-B").unwrap(), -1);
        assert_eq!(from_base64(&to_base64(1_700_000_000)).unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(from_base64("").is_err());
        assert!(from_base64("-").is_err());
        assert!(from_base64("A*").is_err());
        assert!(from_base64("//////////////").is_err());
    }

    #[test]
    fn test_decode_stat() {
        let stat = Stat {
            dev: 2049,
            ino: 131_074,
            mode: 0o100644,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            rdev: 0,
            size: 4096,
            blksize: 4096,
            blocks: 8,
            atime: 1_700_000_000,
            mtime: 1_699_999_000,
            ctime: 1_699_999_500,
        };
        let encoded = format!("{} A B", stat.encode());
        assert_eq!(Stat::decode(&encoded).unwrap(), stat);
    }

    #[test]
    fn test_decode_too_few_fields() {
        let err = Stat::decode("A B C").unwrap_err();
        assert!(matches!(err, ManifestError::BadAttribs(_)));
    }

    #[test]
    fn test_decode_negative_size_rejected() {
        let mut fields: Vec<String> = (0..13).map(|_| "A".to_string()).collect();
        fields[7] = "-B".to_string();
        assert!(Stat::decode(&fields.join(" ")).is_err());
    }

    #[test]
    fn test_fake_directory_keeps_permissions() {
        let mut stat = Stat {
            mode: 0o100640,
            ..Default::default()
        };
        assert!(!stat.is_dir());
        stat.fake_directory();
        assert!(stat.is_dir());
        assert_eq!(stat.mode & 0o7777, 0o640);
    }
}
