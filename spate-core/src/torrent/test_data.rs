//! Descriptor builders shared by unit and integration tests.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::bencode::{Value, encode};

fn descriptor(trackers: &[&str], info: Value) -> Vec<u8> {
    let mut root = BTreeMap::new();
    if let Some(first) = trackers.first() {
        root.insert(Bytes::from_static(b"announce"), Value::string(first));
        root.insert(
            Bytes::from_static(b"announce-list"),
            Value::List(vec![Value::List(
                trackers.iter().map(|url| Value::string(url)).collect(),
            )]),
        );
    }
    root.insert(Bytes::from_static(b"info"), info);
    encode(&Value::Dict(root))
}

/// Builds a single-file descriptor with a placeholder piece list.
pub fn single_file_descriptor(name: &str, length: i64, trackers: &[&str]) -> Vec<u8> {
    let mut info = BTreeMap::new();
    info.insert(Bytes::from_static(b"length"), Value::Integer(length));
    info.insert(Bytes::from_static(b"name"), Value::string(name));
    info.insert(Bytes::from_static(b"piece length"), Value::Integer(16384));
    info.insert(
        Bytes::from_static(b"pieces"),
        Value::Bytes(Bytes::from_static(&[0u8; 20])),
    );
    descriptor(trackers, Value::Dict(info))
}

/// Builds a multi-file descriptor; files are laid out in the given order.
pub fn multi_file_descriptor(name: &str, files: &[(&str, i64)]) -> Vec<u8> {
    let entries = files
        .iter()
        .map(|(path, length)| {
            let mut file = BTreeMap::new();
            file.insert(Bytes::from_static(b"length"), Value::Integer(*length));
            file.insert(
                Bytes::from_static(b"path"),
                Value::List(
                    path.split('/')
                        .map(Value::string)
                        .collect(),
                ),
            );
            Value::Dict(file)
        })
        .collect();

    let mut info = BTreeMap::new();
    info.insert(Bytes::from_static(b"files"), Value::List(entries));
    info.insert(Bytes::from_static(b"name"), Value::string(name));
    info.insert(Bytes::from_static(b"piece length"), Value::Integer(16384));
    info.insert(
        Bytes::from_static(b"pieces"),
        Value::Bytes(Bytes::from_static(&[0u8; 20])),
    );
    descriptor(&[], Value::Dict(info))
}
