use super::value::Value;

/// Encodes a bencode value to its canonical byte form.
///
/// Dictionary keys are emitted in sorted order, so decoding and re-encoding
/// a spec-conforming document reproduces it byte for byte.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

pub(crate) fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        Value::List(list) => {
            out.push(b'l');
            for item in list {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(dict) => {
            out.push(b'd');
            for (key, item) in dict {
                out.extend_from_slice(key.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(key);
                encode_into(item, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bytes::Bytes;

    use super::super::decode;
    use super::*;

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&Value::Integer(-12)), b"i-12e");
        assert_eq!(encode(&Value::string("spam")), b"4:spam");
    }

    #[test]
    fn test_encode_dict_sorts_keys() {
        let mut dict = BTreeMap::new();
        dict.insert(Bytes::from_static(b"zz"), Value::Integer(1));
        dict.insert(Bytes::from_static(b"aa"), Value::Integer(2));
        let encoded = encode(&Value::Dict(dict));
        assert_eq!(encoded, b"d2:aai2e2:zzi1ee");
    }

    #[test]
    fn test_round_trip() {
        let input: &[u8] = b"d8:announce18:http://tracker/ann4:infod6:lengthi512e4:name8:demo.bin12:piece lengthi256eee";
        let value = decode(input).unwrap();
        assert_eq!(encode(&value), input);
    }
}
