use std::collections::BTreeMap;
use std::ops::Range;

use bytes::Bytes;

use super::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes a complete bencode value from `data`.
///
/// Rejects trailing bytes after the value.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;

    if pos != data.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

/// Decodes a top-level dictionary, reporting the raw byte span of every
/// entry's value alongside the parsed value.
///
/// Spans index into `data`, so `&data[span]` is the exact encoding of the
/// entry as it appeared on the wire. This is how the info dictionary is
/// sliced without a re-encode.
pub fn decode_dict_spans(
    data: &[u8],
) -> Result<BTreeMap<Bytes, (Value, Range<usize>)>, BencodeError> {
    if data.first() != Some(&b'd') {
        return Err(BencodeError::NotADictionary);
    }

    let mut pos = 1;
    let mut entries = BTreeMap::new();

    loop {
        if pos >= data.len() {
            return Err(BencodeError::UnexpectedEof);
        }
        if data[pos] == b'e' {
            pos += 1;
            break;
        }

        let key = match decode_value(data, &mut pos, 1)? {
            Value::Bytes(b) => b,
            _ => return Err(BencodeError::NonStringKey),
        };

        let start = pos;
        let value = decode_value(data, &mut pos, 1)?;
        entries.insert(key, (value, start..pos));
    }

    if pos != data.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(entries)
}

fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    if depth > MAX_DEPTH {
        return Err(BencodeError::NestingTooDeep);
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof);
    }

    match data[*pos] {
        b'i' => decode_integer(data, pos),
        b'l' => decode_list(data, pos, depth),
        b'd' => decode_dict(data, pos, depth),
        b'0'..=b'9' => decode_bytes(data, pos),
        c => Err(BencodeError::UnexpectedChar(c as char)),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    *pos += 1;

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof);
    }

    let int_str = std::str::from_utf8(&data[start..*pos])
        .map_err(|_| BencodeError::InvalidInteger("invalid utf8".into()))?;

    if int_str.is_empty() {
        return Err(BencodeError::InvalidInteger("empty".into()));
    }

    if int_str.starts_with("-0") || (int_str.starts_with('0') && int_str.len() > 1) {
        return Err(BencodeError::InvalidInteger("leading zeros".into()));
    }

    let value: i64 = int_str
        .parse()
        .map_err(|_| BencodeError::InvalidInteger(int_str.into()))?;

    *pos += 1;
    Ok(Value::Integer(value))
}

fn decode_bytes(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    let start = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof);
    }

    let len_str =
        std::str::from_utf8(&data[start..*pos]).map_err(|_| BencodeError::InvalidStringLength)?;

    let len: usize = len_str
        .parse()
        .map_err(|_| BencodeError::InvalidStringLength)?;

    *pos += 1;

    if *pos + len > data.len() {
        return Err(BencodeError::UnexpectedEof);
    }

    let bytes = Bytes::copy_from_slice(&data[*pos..*pos + len]);
    *pos += len;

    Ok(Value::Bytes(bytes))
}

fn decode_list(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut list = Vec::new();

    while *pos < data.len() && data[*pos] != b'e' {
        list.push(decode_value(data, pos, depth + 1)?);
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof);
    }

    *pos += 1;
    Ok(Value::List(list))
}

fn decode_dict(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut dict = BTreeMap::new();

    while *pos < data.len() && data[*pos] != b'e' {
        let key = match decode_value(data, pos, depth + 1)? {
            Value::Bytes(b) => b,
            _ => return Err(BencodeError::NonStringKey),
        };
        let value = decode_value(data, pos, depth + 1)?;
        dict.insert(key, value);
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof);
    }

    *pos += 1;
    Ok(Value::Dict(dict))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_integer() {
        assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
        assert_eq!(decode(b"i-7e").unwrap(), Value::Integer(-7));
        assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_decode_integer_rejects_leading_zeros() {
        assert!(matches!(
            decode(b"i007e"),
            Err(BencodeError::InvalidInteger(_))
        ));
        assert!(matches!(
            decode(b"i-0e"),
            Err(BencodeError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_decode_bytes() {
        assert_eq!(decode(b"4:spam").unwrap(), Value::string("spam"));
        assert_eq!(decode(b"0:").unwrap(), Value::string(""));
    }

    #[test]
    fn test_decode_bytes_truncated() {
        assert_eq!(decode(b"10:short"), Err(BencodeError::UnexpectedEof));
    }

    #[test]
    fn test_decode_list() {
        let value = decode(b"l4:spami42ee").unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::string("spam"), Value::Integer(42)])
        );
    }

    #[test]
    fn test_decode_dict() {
        let value = decode(b"d3:bar4:spam3:fooi42ee").unwrap();
        assert_eq!(value.get("bar").and_then(Value::as_str), Some("spam"));
        assert_eq!(value.get("foo").and_then(Value::as_integer), Some(42));
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        assert_eq!(decode(b"i42eXYZ"), Err(BencodeError::TrailingData));
    }

    #[test]
    fn test_decode_rejects_non_string_key() {
        assert_eq!(decode(b"di1i2ee"), Err(BencodeError::NonStringKey));
    }

    #[test]
    fn test_decode_depth_limit() {
        let mut input = Vec::new();
        input.extend(std::iter::repeat_n(b'l', 100));
        input.extend(std::iter::repeat_n(b'e', 100));
        assert_eq!(decode(&input), Err(BencodeError::NestingTooDeep));
    }

    #[test]
    fn test_dict_spans_slice_raw_bytes() {
        let data: &[u8] = b"d4:infod4:name1:a6:lengthi3ee8:trackers2:ute";
        let entries = decode_dict_spans(data).unwrap();

        let (value, span) = &entries[b"info".as_ref()];
        assert_eq!(&data[span.clone()], b"d4:name1:a6:lengthi3ee");
        assert_eq!(value.get("length").and_then(Value::as_integer), Some(3));
    }

    #[test]
    fn test_dict_spans_rejects_non_dict() {
        assert_eq!(decode_dict_spans(b"i42e"), Err(BencodeError::NotADictionary));
        assert_eq!(decode_dict_spans(b""), Err(BencodeError::NotADictionary));
    }

    #[test]
    fn test_dict_spans_rejects_unterminated() {
        assert_eq!(
            decode_dict_spans(b"d4:info"),
            Err(BencodeError::UnexpectedEof)
        );
    }
}
