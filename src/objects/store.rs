//! Loose object store.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::oid::{Oid, OID_BYTES, OID_HEX_LEN};
use super::{Blob, Object};
use crate::error::{Error, Result};
use crate::infra::{compress, decompress, hash_object, read_file, write_file_atomic};

/// The type tag at the start of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// File content.
    Blob,
    /// Directory listing.
    Tree,
    /// Commit.
    Commit,
    /// Annotated tag.
    Tag,
}

impl ObjectType {
    /// Returns the tag as it appears in object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Parses a header tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(ObjectType::Blob),
            "tree" => Some(ObjectType::Tree),
            "commit" => Some(ObjectType::Commit),
            "tag" => Some(ObjectType::Tag),
            _ => None,
        }
    }
}

/// A decoded object of any type: its tag and the bytes after the header.
#[derive(Debug, Clone)]
pub struct RawObject {
    /// The type tag.
    pub object_type: ObjectType,
    /// The content, exactly as long as the header declared.
    pub content: Vec<u8>,
}

/// Signature and version of a version 2 pack index.
const PACK_IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const PACK_IDX_VERSION: u32 = 2;
const FANOUT_LEN: usize = 256 * 4;

/// Content-addressed storage under `<metadata>/objects`.
///
/// Each object lives in its own zlib stream at `xx/<38 hex>`, where `xx`
/// is the first byte of the digest. Objects that only exist inside pack
/// files are detected through the pack indexes but never decoded.
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    objects_dir: PathBuf,
}

impl LooseObjectStore {
    /// Creates a store rooted at `objects_dir`.
    pub fn new<P: AsRef<Path>>(objects_dir: P) -> Self {
        LooseObjectStore {
            objects_dir: objects_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Maps a digest to its loose file,
    /// e.g. `da39a3...` to `objects/da/39a3...`.
    pub fn oid_to_path(&self, oid: &Oid) -> PathBuf {
        let hex = oid.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    /// Retrieves a blob.
    ///
    /// # Errors
    ///
    /// * [`Error::ObjectNotFound`] if nothing is stored under `oid`.
    /// * [`Error::PackedObjectUnsupported`] if it only exists in a pack.
    /// * [`Error::CorruptObject`] if the stream cannot be inflated or the
    ///   declared size disagrees with the content.
    /// * [`Error::TypeMismatch`] if the object is not a blob.
    pub fn get(&self, oid: &Oid) -> Result<Object> {
        let raw = self.read_raw(oid)?;
        if raw.object_type != ObjectType::Blob {
            return Err(Error::TypeMismatch {
                expected: "blob",
                actual: raw.object_type.as_str(),
            });
        }
        Ok(Object::Blob(Blob::new(raw.content)))
    }

    /// Reads and validates an object of any type.
    pub fn read_raw(&self, oid: &Oid) -> Result<RawObject> {
        let path = self.oid_to_path(oid);
        let compressed = match read_file(&path)? {
            Some(data) => data,
            None if self.is_packed(oid)? => return Err(Error::PackedObjectUnsupported(*oid)),
            None => return Err(Error::ObjectNotFound(*oid)),
        };

        let inflated = decompress(&compressed)
            .ok_or_else(|| Error::corrupt_object(oid, "zlib stream could not be inflated"))?;
        let raw = parse_raw_object(&inflated, oid)?;
        debug!(oid = %oid, kind = raw.object_type.as_str(), size = raw.content.len(), "read object");
        Ok(raw)
    }

    /// Returns true if a loose file exists for `oid`.
    pub fn exists(&self, oid: &Oid) -> bool {
        self.oid_to_path(oid).is_file()
    }

    /// Returns true if any pack index under `objects/pack` lists `oid`.
    pub fn is_packed(&self, oid: &Oid) -> Result<bool> {
        let pack_dir = self.objects_dir.join("pack");
        let entries = match fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "idx") {
                let data = fs::read(&path)?;
                if pack_index_contains(&data, oid) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Lists loose objects whose hex digest starts with `prefix`.
    ///
    /// The prefix must be 4 to 40 hex characters.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> Result<Vec<Oid>> {
        if prefix.len() < 4
            || prefix.len() > OID_HEX_LEN
            || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::InvalidOid(prefix.to_string()));
        }

        let prefix = prefix.to_lowercase();
        let (dir_prefix, file_prefix) = prefix.split_at(2);
        let subdir = self.objects_dir.join(dir_prefix);
        if !subdir.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in fs::read_dir(&subdir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(file_prefix) {
                if let Ok(oid) = Oid::from_hex(&format!("{}{}", dir_prefix, name)) {
                    matches.push(oid);
                }
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Stores an object and returns its digest.
    ///
    /// Writing content that is already present is a no-op.
    pub fn write(&self, object_type: ObjectType, content: &[u8]) -> Result<Oid> {
        let oid = Oid::from_bytes(hash_object(object_type.as_str(), content));
        let path = self.oid_to_path(&oid);
        if path.exists() {
            return Ok(oid);
        }

        let mut raw = format!("{} {}\0", object_type.as_str(), content.len()).into_bytes();
        raw.extend_from_slice(content);
        write_file_atomic(&path, &compress(&raw))?;
        debug!(oid = %oid, kind = object_type.as_str(), "wrote object");
        Ok(oid)
    }
}

/// Splits `<type> <size>\0<content>` and enforces the declared size.
fn parse_raw_object(data: &[u8], oid: &Oid) -> Result<RawObject> {
    let null_pos = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::corrupt_object(oid, "missing null byte in header"))?;

    let header = std::str::from_utf8(&data[..null_pos])
        .map_err(|_| Error::corrupt_object(oid, "header is not valid UTF-8"))?;
    let (type_str, size_str) = header
        .split_once(' ')
        .ok_or_else(|| Error::corrupt_object(oid, format!("malformed header: {:?}", header)))?;

    let object_type = ObjectType::parse(type_str)
        .ok_or_else(|| Error::corrupt_object(oid, format!("unknown object type: {}", type_str)))?;
    let size: usize = size_str
        .parse()
        .map_err(|_| Error::corrupt_object(oid, format!("invalid size: {}", size_str)))?;

    let content = &data[null_pos + 1..];
    if content.len() != size {
        return Err(Error::corrupt_object(
            oid,
            format!(
                "size mismatch: header says {} but content is {} bytes",
                size,
                content.len()
            ),
        ));
    }

    Ok(RawObject {
        object_type,
        content: content.to_vec(),
    })
}

/// Looks `oid` up in the sorted name table of a version 2 pack index.
///
/// Malformed or other-version indexes are treated as not containing it.
fn pack_index_contains(data: &[u8], oid: &Oid) -> bool {
    if data.len() < 8 + FANOUT_LEN || data[..4] != PACK_IDX_MAGIC {
        return false;
    }
    if u32::from_be_bytes([data[4], data[5], data[6], data[7]]) != PACK_IDX_VERSION {
        return false;
    }

    let fanout = |i: usize| -> usize {
        let at = 8 + i * 4;
        u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize
    };

    let first = oid.as_bytes()[0] as usize;
    let hi = fanout(first);
    let lo = if first == 0 { 0 } else { fanout(first - 1) };
    let names = 8 + FANOUT_LEN;
    if lo > hi || names + hi * OID_BYTES > data.len() {
        return false;
    }

    let table: Vec<&[u8]> = (lo..hi)
        .map(|i| &data[names + i * OID_BYTES..names + (i + 1) * OID_BYTES])
        .collect();
    table
        .binary_search_by(|candidate| (*candidate).cmp(&oid.as_bytes()[..]))
        .is_ok()
}
