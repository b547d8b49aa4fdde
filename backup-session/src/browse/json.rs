//! JSON rendering of listing records.

use crate::manifest::Stat;
use serde::Serialize;

/// One line of a directory listing: the child's full path and its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    pub name: String,
    #[serde(flatten)]
    pub stat: Stat,
}

impl StatRecord {
    pub fn new(name: impl Into<String>, stat: Stat) -> Self {
        Self {
            name: name.into(),
            stat,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_flat_object() {
        let rec = StatRecord::new(
            "/home/user",
            Stat {
                mode: 0o040755,
                size: 4096,
                mtime: 1_700_000_000,
                ..Default::default()
            },
        );
        let value: Value = serde_json::from_str(&rec.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj["name"], "/home/user");
        assert_eq!(obj["mode"], 0o040755);
        assert_eq!(obj["size"], 4096);
        assert_eq!(obj["mtime"], 1_700_000_000i64);
        for key in [
            "dev", "ino", "nlink", "uid", "gid", "rdev", "blksize", "blocks", "atime", "ctime",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 14);
    }
}
