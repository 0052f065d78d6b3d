//! The index (staging area).
//!
//! The index records, for every tracked path, the blob that is expected
//! there next commit along with a stat snapshot used as a change hint.
//! Entries are kept sorted by `(path bytes, stage)`; every mutation
//! preserves that order.

mod reader;
mod writer;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::infra::{read_file, write_file_atomic};
use crate::objects::{FileMode, Oid};

pub use reader::parse;
pub use writer::write;

/// The index format version written when nothing requires a newer one.
pub const DEFAULT_VERSION: u32 = 2;

/// Merge slot of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Stage 0, the normal resolved state.
    Normal,
    /// Stage 1, common ancestor of a conflicted merge.
    Base,
    /// Stage 2, our side.
    Ours,
    /// Stage 3, their side.
    Theirs,
}

impl Stage {
    /// Returns the numeric stage, 0 to 3.
    pub fn as_u8(&self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    /// Converts a numeric stage. Only the low two bits are looked at.
    pub fn from_u8(stage: u8) -> Self {
        match stage & 0x03 {
            0 => Stage::Normal,
            1 => Stage::Base,
            2 => Stage::Ours,
            _ => Stage::Theirs,
        }
    }
}

/// The in-memory staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    version: u32,
    entries: Vec<IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Index::empty(DEFAULT_VERSION)
    }
}

impl Index {
    /// Creates an empty index of the given format version.
    pub fn empty(version: u32) -> Self {
        Index {
            version,
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_sorted(version: u32, entries: Vec<IndexEntry>) -> Self {
        Index { version, entries }
    }

    /// Reads and verifies the index file at `path`.
    ///
    /// A missing file is [`Error::CorruptIndex`] too: callers that may
    /// legitimately run without an index create one first.
    pub fn load(path: &Path) -> Result<Self> {
        let data = read_file(path)?.ok_or_else(|| Error::corrupt_index("index file not found"))?;
        let index = parse(&data)?;
        debug!(path = %path.display(), entries = index.len(), version = index.version, "loaded index");
        Ok(index)
    }

    /// Serializes the index and atomically replaces the file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = write(self);
        write_file_atomic(path, &data)?;
        debug!(path = %path.display(), entries = self.len(), "saved index");
        Ok(())
    }

    /// Returns the format version the index was read with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns all entries in `(path, stage)` order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Iterates over entries in `(path, stage)` order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    fn position(&self, path: &str, stage: Stage) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|e| (e.path.as_bytes(), e.stage).cmp(&(path.as_bytes(), stage)))
    }

    /// Looks up the entry at `(path, stage)`.
    pub fn find(&self, path: &str, stage: Stage) -> Option<&IndexEntry> {
        self.position(path, stage).ok().map(|pos| &self.entries[pos])
    }

    /// Mutable variant of [`Index::find`].
    pub fn find_mut(&mut self, path: &str, stage: Stage) -> Option<&mut IndexEntry> {
        match self.position(path, stage) {
            Ok(pos) => Some(&mut self.entries[pos]),
            Err(_) => None,
        }
    }

    /// Returns true if any stage of `path` is present.
    pub fn contains(&self, path: &str) -> bool {
        let start = self.position(path, Stage::Normal).unwrap_or_else(|pos| pos);
        self.entries
            .get(start)
            .map_or(false, |entry| entry.path == path)
    }

    /// Inserts `entry` or replaces the one with the same `(path, stage)`.
    ///
    /// Staging a path at stage 0 drops its conflict stages, and staging a
    /// conflict stage drops its stage 0 entry, so a path never mixes both.
    pub fn upsert(&mut self, entry: IndexEntry) {
        let resolved = entry.stage == Stage::Normal;
        self.entries
            .retain(|e| e.path != entry.path || (e.stage == Stage::Normal) == resolved);

        match self.position(&entry.path, entry.stage) {
            Ok(pos) => self.entries[pos] = entry,
            Err(pos) => self.entries.insert(pos, entry),
        }
    }

    /// Removes every stage of `path`. Returns true if anything was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path != path);
        self.entries.len() != before
    }

    /// Returns the stage 0 entries keyed by path.
    ///
    /// Conflicted paths are absent; use [`Index::paths`] to see them.
    pub fn as_map(&self) -> BTreeMap<&str, &IndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.stage == Stage::Normal)
            .map(|e| (e.path.as_str(), e))
            .collect()
    }

    /// Returns every tracked path once, conflicted or not, in index order.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if paths.last() != Some(&entry.path.as_str()) {
                paths.push(&entry.path);
            }
        }
        paths
    }
}

/// One staged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    ctime: u32,
    ctime_nanos: u32,
    mtime: u32,
    mtime_nanos: u32,
    dev: u32,
    ino: u32,
    mode: FileMode,
    uid: u32,
    gid: u32,
    size: u32,
    oid: Oid,
    path: String,
    stage: Stage,
    assume_valid: bool,
    skip_worktree: bool,
    intent_to_add: bool,
}

impl IndexEntry {
    /// Creates a stage 0 entry with an empty stat snapshot.
    ///
    /// Sizes above 4 GiB are truncated to 32 bits as in the on-disk format.
    pub fn new(path: impl Into<String>, oid: Oid, mode: FileMode, size: u64) -> Self {
        IndexEntry {
            ctime: 0,
            ctime_nanos: 0,
            mtime: 0,
            mtime_nanos: 0,
            dev: 0,
            ino: 0,
            mode,
            uid: 0,
            gid: 0,
            size: size as u32,
            oid,
            path: path.into(),
            stage: Stage::Normal,
            assume_valid: false,
            skip_worktree: false,
            intent_to_add: false,
        }
    }

    /// Sets the merge stage.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Sets the skip-worktree marker.
    pub fn with_skip_worktree(mut self, skip: bool) -> Self {
        self.skip_worktree = skip;
        self
    }

    /// Sets the intent-to-add marker.
    pub fn with_intent_to_add(mut self, intent: bool) -> Self {
        self.intent_to_add = intent;
        self
    }

    /// Sets the assume-valid marker.
    pub fn with_assume_valid(mut self, assume: bool) -> Self {
        self.assume_valid = assume;
        self
    }

    /// Sets the modification time hint.
    pub fn with_mtime(mut self, secs: u32, nanos: u32) -> Self {
        self.set_mtime(secs, nanos);
        self
    }

    /// Copies the full stat snapshot of `meta` into the entry.
    pub fn with_stat(mut self, meta: &std::fs::Metadata) -> Self {
        let stat = Stat::from_metadata(meta);
        self.ctime = stat.ctime;
        self.ctime_nanos = stat.ctime_nanos;
        self.mtime = stat.mtime;
        self.mtime_nanos = stat.mtime_nanos;
        self.dev = stat.dev;
        self.ino = stat.ino;
        self.uid = stat.uid;
        self.gid = stat.gid;
        self.size = stat.size;
        self
    }

    /// Updates the modification time hint, leaving content fields alone.
    pub fn set_mtime(&mut self, secs: u32, nanos: u32) {
        self.mtime = secs;
        self.mtime_nanos = nanos;
    }

    /// Sets or clears the skip-worktree marker in place.
    pub fn set_skip_worktree(&mut self, skip: bool) {
        self.skip_worktree = skip;
    }

    /// Returns the repository-relative, slash-separated path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the digest of the staged blob.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Returns the mode.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Returns the expected content length.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the merge stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the metadata change time, seconds.
    pub fn ctime(&self) -> u32 {
        self.ctime
    }

    /// Returns the nanosecond part of the metadata change time.
    pub fn ctime_nanos(&self) -> u32 {
        self.ctime_nanos
    }

    /// Returns the modification time hint, seconds.
    pub fn mtime(&self) -> u32 {
        self.mtime
    }

    /// Returns the nanosecond part of the modification time hint.
    pub fn mtime_nanos(&self) -> u32 {
        self.mtime_nanos
    }

    /// Returns the device id.
    pub fn dev(&self) -> u32 {
        self.dev
    }

    /// Returns the inode number.
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// Returns the owner's user id.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Returns the owner's group id.
    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// Returns true if the path must not be materialized on disk.
    pub fn skip_worktree(&self) -> bool {
        self.skip_worktree
    }

    /// Returns true if the path was added with `--intent-to-add`.
    pub fn intent_to_add(&self) -> bool {
        self.intent_to_add
    }

    /// Returns true if the assume-valid bit is set.
    pub fn assume_valid(&self) -> bool {
        self.assume_valid
    }

    /// Returns true if the entry carries flags only version 3 can store.
    pub fn has_extended_flags(&self) -> bool {
        self.skip_worktree || self.intent_to_add
    }
}

/// The stat fields git records, truncated to 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// Metadata change time, seconds.
    pub ctime: u32,
    /// Metadata change time, nanoseconds.
    pub ctime_nanos: u32,
    /// Modification time, seconds.
    pub mtime: u32,
    /// Modification time, nanoseconds.
    pub mtime_nanos: u32,
    /// Device id.
    pub dev: u32,
    /// Inode number.
    pub ino: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Size in bytes.
    pub size: u32,
}

impl Stat {
    /// Extracts the recorded fields from file metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Stat {
            ctime: meta.ctime() as u32,
            ctime_nanos: meta.ctime_nsec() as u32,
            mtime: meta.mtime() as u32,
            mtime_nanos: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
        }
    }

    /// Extracts the recorded fields from file metadata.
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let (mtime, mtime_nanos) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| (d.as_secs() as u32, d.subsec_nanos()))
            .unwrap_or((0, 0));
        Stat {
            ctime: mtime,
            ctime_nanos: mtime_nanos,
            mtime,
            mtime_nanos,
            size: meta.len() as u32,
            ..Stat::default()
        }
    }
}
