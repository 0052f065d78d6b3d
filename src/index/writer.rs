//! Index file writer.

use crate::infra::hash::sha1;

use super::reader::{
    ENTRY_FIXED_LEN, EXT_FLAG_INTENT_TO_ADD, EXT_FLAG_SKIP_WORKTREE, FLAG_ASSUME_VALID,
    FLAG_EXTENDED, FLAG_NAME_MASK, FLAG_STAGE_SHIFT, INDEX_SIGNATURE, MAX_VERSION, MIN_VERSION,
};
use super::{Index, IndexEntry};

/// Serializes `index`, including the trailing checksum.
///
/// Version 3 is written when any entry carries skip-worktree or
/// intent-to-add; otherwise the index keeps the version it was read with.
/// Extensions are never written.
pub fn write(index: &Index) -> Vec<u8> {
    let version = effective_version(index);

    let mut buffer = Vec::with_capacity(12 + index.len() * (ENTRY_FIXED_LEN + 26) + 20);
    buffer.extend_from_slice(INDEX_SIGNATURE);
    buffer.extend_from_slice(&version.to_be_bytes());
    buffer.extend_from_slice(&(index.len() as u32).to_be_bytes());

    for entry in index.entries() {
        write_entry(&mut buffer, entry, version);
    }

    let checksum = sha1(&buffer);
    buffer.extend_from_slice(&checksum);
    buffer
}

fn effective_version(index: &Index) -> u32 {
    if index.iter().any(IndexEntry::has_extended_flags) {
        MAX_VERSION
    } else {
        index.version().clamp(MIN_VERSION, MAX_VERSION)
    }
}

fn write_entry(buffer: &mut Vec<u8>, entry: &IndexEntry, version: u32) {
    let start = buffer.len();

    for field in [
        entry.ctime,
        entry.ctime_nanos,
        entry.mtime,
        entry.mtime_nanos,
        entry.dev,
        entry.ino,
        entry.mode.as_index_mode(),
        entry.uid,
        entry.gid,
        entry.size,
    ] {
        buffer.extend_from_slice(&field.to_be_bytes());
    }
    buffer.extend_from_slice(entry.oid.as_bytes());

    let path = entry.path.as_bytes();
    let extended = version >= 3 && entry.has_extended_flags();
    let mut flags = (path.len().min(FLAG_NAME_MASK as usize) as u16)
        | ((entry.stage.as_u8() as u16) << FLAG_STAGE_SHIFT);
    if entry.assume_valid {
        flags |= FLAG_ASSUME_VALID;
    }
    if extended {
        flags |= FLAG_EXTENDED;
    }
    buffer.extend_from_slice(&flags.to_be_bytes());

    if extended {
        let mut ext = 0u16;
        if entry.skip_worktree {
            ext |= EXT_FLAG_SKIP_WORKTREE;
        }
        if entry.intent_to_add {
            ext |= EXT_FLAG_INTENT_TO_ADD;
        }
        buffer.extend_from_slice(&ext.to_be_bytes());
    }

    buffer.extend_from_slice(path);

    // 1 to 8 NULs, ending on a multiple of 8.
    let len = buffer.len() - start;
    buffer.resize(start + ((len + 8) & !7), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::parse;
    use crate::index::Stage;
    use crate::infra::hash::SHA1_SIZE;
    use crate::objects::{FileMode, Oid};

    fn make_entry(path: &str) -> IndexEntry {
        IndexEntry::new(path, Oid::from_bytes([0xab; 20]), FileMode::Regular, 42).with_mtime(7, 8)
    }

    fn index_of(entries: Vec<IndexEntry>) -> Index {
        let mut index = Index::default();
        for entry in entries {
            index.upsert(entry);
        }
        index
    }

    // IW-001: empty index is header plus checksum
    #[test]
    fn test_write_empty_index() {
        let data = write(&Index::default());
        assert_eq!(data.len(), 12 + SHA1_SIZE);
        assert_eq!(&data[0..4], b"DIRC");
        assert_eq!(&data[4..8], &2u32.to_be_bytes());
        assert_eq!(&data[8..12], &0u32.to_be_bytes());
    }

    // IW-002: entries end on 8-byte boundaries with 1..=8 NULs
    #[test]
    fn test_entry_padding() {
        for name_len in 1..=16 {
            let name = "x".repeat(name_len);
            let data = write(&index_of(vec![make_entry(&name)]));
            let entry_len = data.len() - 12 - SHA1_SIZE;
            assert_eq!(entry_len % 8, 0);
            let padding = entry_len - ENTRY_FIXED_LEN - name_len;
            assert!((1..=8).contains(&padding), "name {} padding {}", name_len, padding);
        }
    }

    // IW-003: the checksum covers everything before it
    #[test]
    fn test_checksum() {
        let data = write(&index_of(vec![make_entry("test.txt")]));
        let (body, checksum) = data.split_at(data.len() - SHA1_SIZE);
        assert_eq!(checksum, &sha1(body));
    }

    // IW-004: extended flags force version 3 and survive a reload
    #[test]
    fn test_extended_flags_upgrade_version() {
        let index = index_of(vec![
            make_entry("sparse").with_skip_worktree(true),
            make_entry("planned").with_intent_to_add(true),
            make_entry("plain").with_assume_valid(true),
        ]);
        let data = write(&index);
        assert_eq!(&data[4..8], &3u32.to_be_bytes());

        let parsed = parse(&data).unwrap();
        assert_eq!(parsed.version(), 3);
        assert!(parsed.find("sparse", Stage::Normal).unwrap().skip_worktree());
        assert!(parsed.find("planned", Stage::Normal).unwrap().intent_to_add());
        assert!(parsed.find("plain", Stage::Normal).unwrap().assume_valid());
    }

    // IW-005: stages, modes and stat hints survive a reload
    #[test]
    fn test_fields_survive_reload() {
        let index = index_of(vec![
            make_entry("conflict.txt").with_stage(Stage::Ours),
            IndexEntry::new("run.sh", Oid::from_bytes([1; 20]), FileMode::Executable, 9),
            IndexEntry::new("link", Oid::from_bytes([2; 20]), FileMode::Symlink, 4),
        ]);
        let parsed = parse(&write(&index)).unwrap();
        assert_eq!(parsed, index);
    }

    // IW-006: long paths use the saturated name length
    #[test]
    fn test_long_path() {
        let long = format!("{}/file.txt", "d".repeat(5000));
        let index = index_of(vec![make_entry(&long), make_entry("short")]);
        let parsed = parse(&write(&index)).unwrap();
        assert_eq!(parsed.entries()[0].path(), long);
        assert_eq!(parsed.entries()[1].path(), "short");
    }
}
