//! Index file parser (format versions 2 and 3).

use crate::error::{Error, Result};
use crate::infra::hash::{sha1, SHA1_SIZE};
use crate::objects::oid::OID_BYTES;
use crate::objects::tree::is_safe_entry_name;
use crate::objects::{FileMode, Oid};

use super::{Index, IndexEntry, Stage};

/// The signature at the start of an index file.
pub(super) const INDEX_SIGNATURE: &[u8; 4] = b"DIRC";

pub(super) const MIN_VERSION: u32 = 2;
pub(super) const MAX_VERSION: u32 = 3;

/// Size of the header: signature, version, entry count.
pub(super) const HEADER_LEN: usize = 12;

/// Size of the fixed part of an entry, up to and including the flags.
pub(super) const ENTRY_FIXED_LEN: usize = 62;

pub(super) const FLAG_ASSUME_VALID: u16 = 0x8000;
pub(super) const FLAG_EXTENDED: u16 = 0x4000;
pub(super) const FLAG_STAGE_SHIFT: u16 = 12;
pub(super) const FLAG_NAME_MASK: u16 = 0x0fff;
pub(super) const EXT_FLAG_SKIP_WORKTREE: u16 = 0x4000;
pub(super) const EXT_FLAG_INTENT_TO_ADD: u16 = 0x2000;

/// Parses and verifies a complete index file.
///
/// The trailing checksum is checked before anything else. Extensions
/// between the last entry and the checksum are skipped.
///
/// # Errors
///
/// [`Error::CorruptIndex`] for a bad signature, an unsupported version
/// (including version 4), truncated or misordered entries, or a checksum
/// mismatch.
pub fn parse(data: &[u8]) -> Result<Index> {
    if data.len() < HEADER_LEN + SHA1_SIZE {
        return Err(Error::corrupt_index("file too short"));
    }

    let (body, checksum) = data.split_at(data.len() - SHA1_SIZE);
    if sha1(body)[..] != checksum[..] {
        return Err(Error::corrupt_index("checksum mismatch"));
    }

    if &body[..4] != INDEX_SIGNATURE {
        return Err(Error::corrupt_index(format!(
            "bad signature {:?}",
            String::from_utf8_lossy(&body[..4])
        )));
    }

    let version = be_u32(body, 4);
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(Error::corrupt_index(format!(
            "unsupported index version {}",
            version
        )));
    }

    let count = be_u32(body, 8) as usize;
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(count.min(body.len() / ENTRY_FIXED_LEN));
    let mut pos = HEADER_LEN;
    for n in 0..count {
        let (entry, next) = parse_entry(body, pos, version)
            .ok_or_else(|| Error::corrupt_index(format!("entry {} is truncated", n)))?;
        let entry = entry?;

        if let Some(prev) = entries.last() {
            let ordered = (prev.path.as_bytes(), prev.stage) < (entry.path.as_bytes(), entry.stage);
            if !ordered {
                return Err(Error::corrupt_index(format!(
                    "entry '{}' is out of order",
                    entry.path
                )));
            }
        }

        entries.push(entry);
        pos = next;
    }

    Ok(Index::from_sorted(version, entries))
}

/// Parses the entry at `start`, returning it and the offset of the next one.
///
/// `None` means the entry runs past the end of `data`; a decodable but
/// invalid entry is returned as an error inside the option.
fn parse_entry(data: &[u8], start: usize, version: u32) -> Option<(Result<IndexEntry>, usize)> {
    let fixed = data.get(start..start + ENTRY_FIXED_LEN)?;
    let flags = be_u16(fixed, 60);

    let mut name_start = start + ENTRY_FIXED_LEN;
    let mut extended = 0u16;
    if flags & FLAG_EXTENDED != 0 {
        if version < 3 {
            return Some((
                Err(Error::corrupt_index("extended flags in a version 2 index")),
                name_start,
            ));
        }
        extended = be_u16(data.get(name_start..name_start + 2)?, 0);
        name_start += 2;
    }

    let declared = (flags & FLAG_NAME_MASK) as usize;
    let name_len = if declared < FLAG_NAME_MASK as usize {
        declared
    } else {
        data.get(name_start..)?.iter().position(|&b| b == 0)?
    };
    let name = data.get(name_start..name_start + name_len)?;

    // Entries are NUL-padded to a multiple of 8, with at least one NUL.
    let fixed_len = name_start - start;
    let entry_len = (fixed_len + name_len + 8) & !7;
    let next = start + entry_len;
    let padding = data.get(name_start + name_len..next)?;
    if padding.iter().any(|&b| b != 0) {
        return Some((Err(Error::corrupt_index("entry padding is not NUL")), next));
    }

    let path = match String::from_utf8(name.to_vec()) {
        Ok(path) => path,
        Err(_) => return Some((Err(Error::corrupt_index("entry path is not UTF-8")), next)),
    };
    if !path.split('/').all(is_safe_entry_name) {
        return Some((
            Err(Error::corrupt_index(format!("unsafe entry path '{}'", path))),
            next,
        ));
    }

    let raw_mode = be_u32(fixed, 24);
    let mode = match FileMode::from_index_mode(raw_mode) {
        Some(mode) => mode,
        None => {
            return Some((
                Err(Error::corrupt_index(format!(
                    "entry '{}' has unknown mode {:o}",
                    path, raw_mode
                ))),
                next,
            ))
        }
    };

    let mut oid = [0u8; OID_BYTES];
    oid.copy_from_slice(&fixed[40..40 + OID_BYTES]);

    let entry = IndexEntry {
        ctime: be_u32(fixed, 0),
        ctime_nanos: be_u32(fixed, 4),
        mtime: be_u32(fixed, 8),
        mtime_nanos: be_u32(fixed, 12),
        dev: be_u32(fixed, 16),
        ino: be_u32(fixed, 20),
        mode,
        uid: be_u32(fixed, 28),
        gid: be_u32(fixed, 32),
        size: be_u32(fixed, 36),
        oid: Oid::from_bytes(oid),
        path,
        stage: Stage::from_u8((flags >> FLAG_STAGE_SHIFT) as u8),
        assume_valid: flags & FLAG_ASSUME_VALID != 0,
        skip_worktree: extended & EXT_FLAG_SKIP_WORKTREE != 0,
        intent_to_add: extended & EXT_FLAG_INTENT_TO_ADD != 0,
    };
    Some((Ok(entry), next))
}

fn be_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn be_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}
