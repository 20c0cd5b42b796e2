//! A minimal bencode reader/writer, just enough to round-trip the
//! single-file torrent-style info dictionary the catalog codec needs
//! (`length`, `piece length`, `pieces`). Not a general BEP-3 implementation.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BValue {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<BValue>),
    Dict(BTreeMap<Vec<u8>, BValue>),
}

impl BValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            BValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BValue>> {
        match self {
            BValue::Dict(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&BValue> {
        self.as_dict()?.get(key.as_bytes())
    }
}

#[derive(Debug)]
pub struct BencodeError(pub String);

impl fmt::Display for BencodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bencode error: {}", self.0)
    }
}

impl std::error::Error for BencodeError {}

pub fn encode(value: &BValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BValue, out: &mut Vec<u8>) {
    match value {
        BValue::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        BValue::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        BValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BValue::Dict(map) => {
            out.push(b'd');
            // BTreeMap already iterates keys in sorted byte order.
            for (k, v) in map {
                encode_into(&BValue::Bytes(k.clone()), out);
                encode_into(v, out);
            }
            out.push(b'e');
        }
    }
}

pub fn decode(input: &[u8]) -> Result<BValue, BencodeError> {
    let mut pos = 0usize;
    let value = decode_value(input, &mut pos)?;
    Ok(value)
}

fn decode_value(input: &[u8], pos: &mut usize) -> Result<BValue, BencodeError> {
    match input.get(*pos) {
        Some(b'i') => decode_int(input, pos),
        Some(b'l') => decode_list(input, pos),
        Some(b'd') => decode_dict(input, pos),
        Some(c) if c.is_ascii_digit() => decode_bytes(input, pos).map(BValue::Bytes),
        _ => Err(BencodeError(format!("unexpected byte at {}", pos))),
    }
}

fn decode_int(input: &[u8], pos: &mut usize) -> Result<BValue, BencodeError> {
    *pos += 1; // 'i'
    let end = find(input, *pos, b'e')?;
    let s = std::str::from_utf8(&input[*pos..end])
        .map_err(|e| BencodeError(e.to_string()))?;
    let n: i64 = s.parse().map_err(|_| BencodeError(format!("bad int {s:?}")))?;
    *pos = end + 1;
    Ok(BValue::Int(n))
}

fn decode_bytes(input: &[u8], pos: &mut usize) -> Result<Vec<u8>, BencodeError> {
    let colon = find(input, *pos, b':')?;
    let len_str =
        std::str::from_utf8(&input[*pos..colon]).map_err(|e| BencodeError(e.to_string()))?;
    let len: usize = len_str
        .parse()
        .map_err(|_| BencodeError(format!("bad length {len_str:?}")))?;
    let start = colon + 1;
    let end = start
        .checked_add(len)
        .filter(|e| *e <= input.len())
        .ok_or_else(|| BencodeError("byte string overruns input".into()))?;
    *pos = end;
    Ok(input[start..end].to_vec())
}

fn decode_list(input: &[u8], pos: &mut usize) -> Result<BValue, BencodeError> {
    *pos += 1; // 'l'
    let mut items = Vec::new();
    loop {
        match input.get(*pos) {
            Some(b'e') => {
                *pos += 1;
                break;
            }
            Some(_) => items.push(decode_value(input, pos)?),
            None => return Err(BencodeError("unterminated list".into())),
        }
    }
    Ok(BValue::List(items))
}

fn decode_dict(input: &[u8], pos: &mut usize) -> Result<BValue, BencodeError> {
    *pos += 1; // 'd'
    let mut map = BTreeMap::new();
    loop {
        match input.get(*pos) {
            Some(b'e') => {
                *pos += 1;
                break;
            }
            Some(_) => {
                let key = decode_bytes(input, pos)?;
                let value = decode_value(input, pos)?;
                map.insert(key, value);
            }
            None => return Err(BencodeError("unterminated dict".into())),
        }
    }
    Ok(BValue::Dict(map))
}

fn find(input: &[u8], from: usize, needle: u8) -> Result<usize, BencodeError> {
    input[from..]
        .iter()
        .position(|b| *b == needle)
        .map(|i| from + i)
        .ok_or_else(|| BencodeError(format!("expected {:?} after {}", needle as char, from)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_int_bytes_list_dict() {
        let mut dict = BTreeMap::new();
        dict.insert(b"length".to_vec(), BValue::Int(42));
        dict.insert(
            b"pieces".to_vec(),
            BValue::List(vec![BValue::Bytes(b"abcd".to_vec())]),
        );
        let value = BValue::Dict(dict);

        let encoded = encode(&value);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn dict_keys_serialize_in_sorted_order() {
        let mut dict = BTreeMap::new();
        dict.insert(b"zebra".to_vec(), BValue::Int(1));
        dict.insert(b"apple".to_vec(), BValue::Int(2));
        let encoded = encode(&BValue::Dict(dict));
        assert_eq!(encoded, b"d5:applei2e5:zebrai1ee");
    }
}
