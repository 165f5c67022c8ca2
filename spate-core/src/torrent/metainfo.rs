//! Torrent descriptor parsing and serialization.
//!
//! A descriptor (a `.torrent` document) is a bencoded dictionary carrying
//! tracker tiers and the info dictionary. The info dictionary is kept as the
//! raw bytes sliced from the original input: the swarm identifies content by
//! the SHA-1 of exactly those bytes, so they are never re-encoded.

use bytes::Bytes;
use sha1::{Digest, Sha1};

use super::InfoHash;
use crate::bencode::{self, BencodeError, Value};

/// A torrent descriptor: announce tiers plus the raw info dictionary.
///
/// Immutable once obtained. Sources: an HTTP request body, the on-disk
/// metadata cache, or the engine once the swarm has delivered metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    /// Tracker URL tiers, outermost list ordered by priority.
    pub announce_list: Vec<Vec<String>>,
    /// Raw bencoded bytes of the info dictionary.
    pub info_bytes: Bytes,
}

/// A named byte range within a torrent's content.
///
/// Valid only once metadata is present. `path` is the display path used for
/// HTTP sub-path lookup: the torrent name for single-file torrents, the
/// joined path components for multi-file torrents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub offset: u64,
    pub length: u64,
}

/// File layout derived from an info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    pub name: String,
    pub total_length: u64,
    pub files: Vec<FileEntry>,
}

/// Errors produced while handling torrent descriptors.
#[derive(Debug, thiserror::Error)]
pub enum MetainfoError {
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("descriptor is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("descriptor field '{field}' is malformed")]
    InvalidField { field: &'static str },
}

impl MetaInfo {
    /// Parses a descriptor from its bencoded byte form.
    ///
    /// The `announce-list` field wins over `announce`; a lone `announce` URL
    /// is promoted into a single tier. The info dictionary is sliced out of
    /// `data` byte-exactly.
    ///
    /// # Errors
    /// - `MetainfoError::Bencode` - Input is not a bencoded dictionary
    /// - `MetainfoError::MissingField` - No info dictionary present
    /// - `MetainfoError::InvalidField` - Announce fields of the wrong shape
    pub fn parse(data: &[u8]) -> Result<Self, MetainfoError> {
        let entries = bencode::decode_dict_spans(data)?;

        let (info_value, info_span) = entries
            .get(b"info".as_ref())
            .ok_or(MetainfoError::MissingField { field: "info" })?;
        if info_value.as_dict().is_none() {
            return Err(MetainfoError::InvalidField { field: "info" });
        }
        let info_bytes = Bytes::copy_from_slice(&data[info_span.clone()]);

        let announce_list = match entries.get(b"announce-list".as_ref()) {
            Some((value, _)) => parse_announce_list(value)?,
            None => match entries.get(b"announce".as_ref()) {
                Some((value, _)) => {
                    let url = value.as_str().ok_or(MetainfoError::InvalidField {
                        field: "announce",
                    })?;
                    vec![vec![url.to_owned()]]
                }
                None => Vec::new(),
            },
        };

        Ok(Self {
            announce_list,
            info_bytes,
        })
    }

    /// Serializes the descriptor back to standard `.torrent` form.
    ///
    /// Emits `announce` (first tracker, when any), `announce-list`, and the
    /// raw info bytes, in the sorted key order bencode requires.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.info_bytes.len() + 128);
        out.push(b'd');

        let first_tracker = self
            .announce_list
            .first()
            .and_then(|tier| tier.first());
        if let Some(url) = first_tracker {
            push_key(&mut out, "announce");
            bencode::encode_into(&Value::string(url), &mut out);
        }

        if !self.announce_list.is_empty() {
            push_key(&mut out, "announce-list");
            let tiers = Value::List(
                self.announce_list
                    .iter()
                    .map(|tier| {
                        Value::List(tier.iter().map(|url| Value::string(url)).collect())
                    })
                    .collect(),
            );
            bencode::encode_into(&tiers, &mut out);
        }

        push_key(&mut out, "info");
        out.extend_from_slice(&self.info_bytes);

        out.push(b'e');
        out
    }

    /// Computes the info hash: SHA-1 over the raw info dictionary bytes.
    pub fn info_hash(&self) -> InfoHash {
        let mut hasher = Sha1::new();
        hasher.update(&self.info_bytes);
        InfoHash::new(hasher.finalize().into())
    }

    /// Derives the file layout from the info dictionary.
    ///
    /// Single-file torrents yield one entry whose display path is the
    /// torrent name; multi-file torrents yield one entry per file at its
    /// cumulative offset, named by its joined path components.
    ///
    /// # Errors
    /// - `MetainfoError::MissingField` / `InvalidField` - Structurally
    ///   incomplete info dictionary
    pub fn content_layout(&self) -> Result<ContentLayout, MetainfoError> {
        let info = bencode::decode(&self.info_bytes)?;

        let name = info
            .get("name")
            .and_then(Value::as_str)
            .ok_or(MetainfoError::MissingField { field: "name" })?
            .to_owned();

        if let Some(files) = info.get("files") {
            let files = files
                .as_list()
                .ok_or(MetainfoError::InvalidField { field: "files" })?;

            let mut entries = Vec::with_capacity(files.len());
            let mut offset = 0u64;
            for file in files {
                let length = file
                    .get("length")
                    .and_then(Value::as_integer)
                    .and_then(|len| u64::try_from(len).ok())
                    .ok_or(MetainfoError::InvalidField { field: "length" })?;
                let components = file
                    .get("path")
                    .and_then(Value::as_list)
                    .ok_or(MetainfoError::InvalidField { field: "path" })?;
                let path = components
                    .iter()
                    .map(|c| {
                        c.as_str()
                            .map(str::to_owned)
                            .ok_or(MetainfoError::InvalidField { field: "path" })
                    })
                    .collect::<Result<Vec<_>, _>>()?
                    .join("/");

                entries.push(FileEntry {
                    path,
                    offset,
                    length,
                });
                offset += length;
            }

            Ok(ContentLayout {
                name,
                total_length: offset,
                files: entries,
            })
        } else {
            let length = info
                .get("length")
                .and_then(Value::as_integer)
                .and_then(|len| u64::try_from(len).ok())
                .ok_or(MetainfoError::MissingField { field: "length" })?;

            Ok(ContentLayout {
                name: name.clone(),
                total_length: length,
                files: vec![FileEntry {
                    path: name,
                    offset: 0,
                    length,
                }],
            })
        }
    }
}

fn push_key(out: &mut Vec<u8>, key: &str) {
    out.extend_from_slice(key.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(key.as_bytes());
}

fn parse_announce_list(value: &Value) -> Result<Vec<Vec<String>>, MetainfoError> {
    let tiers = value.as_list().ok_or(MetainfoError::InvalidField {
        field: "announce-list",
    })?;

    tiers
        .iter()
        .map(|tier| {
            tier.as_list()
                .ok_or(MetainfoError::InvalidField {
                    field: "announce-list",
                })?
                .iter()
                .map(|url| {
                    url.as_str()
                        .map(str::to_owned)
                        .ok_or(MetainfoError::InvalidField {
                            field: "announce-list",
                        })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent::test_data;

    #[test]
    fn test_parse_single_file() {
        let data = test_data::single_file_descriptor("demo.bin", 512, &["http://tracker/ann"]);
        let mi = MetaInfo::parse(&data).unwrap();

        assert_eq!(mi.announce_list, vec![vec!["http://tracker/ann".to_owned()]]);

        let layout = mi.content_layout().unwrap();
        assert_eq!(layout.name, "demo.bin");
        assert_eq!(layout.total_length, 512);
        assert_eq!(
            layout.files,
            vec![FileEntry {
                path: "demo.bin".to_owned(),
                offset: 0,
                length: 512,
            }]
        );
    }

    #[test]
    fn test_parse_multi_file_offsets() {
        let data = test_data::multi_file_descriptor("bundle", &[("a.txt", 100), ("b.txt", 50)]);
        let layout = MetaInfo::parse(&data).unwrap().content_layout().unwrap();

        assert_eq!(layout.name, "bundle");
        assert_eq!(layout.total_length, 150);
        assert_eq!(layout.files[0].path, "a.txt");
        assert_eq!(layout.files[0].offset, 0);
        assert_eq!(layout.files[1].path, "b.txt");
        assert_eq!(layout.files[1].offset, 100);
        assert_eq!(layout.files[1].length, 50);
    }

    #[test]
    fn test_info_hash_matches_raw_slice() {
        let data = test_data::single_file_descriptor("demo.bin", 512, &[]);
        let mi = MetaInfo::parse(&data).unwrap();

        let mut hasher = Sha1::new();
        hasher.update(&mi.info_bytes);
        let expected = InfoHash::new(hasher.finalize().into());
        assert_eq!(mi.info_hash(), expected);
    }

    #[test]
    fn test_serialize_round_trip_preserves_hash() {
        let data =
            test_data::single_file_descriptor("demo.bin", 512, &["http://a/ann", "http://b/ann"]);
        let mi = MetaInfo::parse(&data).unwrap();

        let reparsed = MetaInfo::parse(&mi.to_bytes()).unwrap();
        assert_eq!(reparsed.info_hash(), mi.info_hash());
        assert_eq!(reparsed.announce_list, mi.announce_list);
    }

    #[test]
    fn test_announce_promoted_to_tier() {
        let data = test_data::single_file_descriptor("demo.bin", 16, &["http://only/ann"]);
        let mi = MetaInfo::parse(&data).unwrap();
        assert_eq!(mi.announce_list, vec![vec!["http://only/ann".to_owned()]]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(MetaInfo::parse(b"not a descriptor").is_err());
        assert!(MetaInfo::parse(b"").is_err());
        assert!(MetaInfo::parse(b"d8:announce3:urle").is_err()); // no info dict
    }
}
