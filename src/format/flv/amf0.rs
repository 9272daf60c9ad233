//! AMF0 (Action Message Format 0) encoding and decoding
//!
//! FLV script data tags carry a name string (usually `onMetaData`) followed
//! by one AMF0 value, normally an ECMA array of stream properties.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Nesting limit for objects and arrays
const MAX_DEPTH: usize = 64;

/// AMF0 data types
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    /// Anonymous object; properties in stream order
    Object(Vec<(String, Amf0Value)>),
    Null,
    Undefined,
    /// Index of a previously decoded complex value
    Reference(u16),
    /// Associative array; properties in stream order
    EcmaArray(Vec<(String, Amf0Value)>),
    StrictArray(Vec<Amf0Value>),
    /// Milliseconds since the epoch and a timezone offset in minutes
    Date { millis: f64, timezone: i16 },
    LongString(String),
}

/// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const MOVIECLIP: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const REFERENCE: u8 = 0x07;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
}

impl Amf0Value {
    /// Encode AMF0 value to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode_into(&mut bytes);
        bytes
    }

    fn encode_into(&self, bytes: &mut Vec<u8>) {
        match self {
            Amf0Value::Number(n) => {
                bytes.push(markers::NUMBER);
                bytes.extend_from_slice(&n.to_bits().to_be_bytes());
            }
            Amf0Value::Boolean(b) => {
                bytes.push(markers::BOOLEAN);
                bytes.push(u8::from(*b));
            }
            Amf0Value::String(s) => {
                bytes.push(markers::STRING);
                encode_short_string(s, bytes);
            }
            Amf0Value::Object(props) => {
                bytes.push(markers::OBJECT);
                encode_properties(props, bytes);
            }
            Amf0Value::Null => bytes.push(markers::NULL),
            Amf0Value::Undefined => bytes.push(markers::UNDEFINED),
            Amf0Value::Reference(idx) => {
                bytes.push(markers::REFERENCE);
                bytes.extend_from_slice(&idx.to_be_bytes());
            }
            Amf0Value::EcmaArray(props) => {
                bytes.push(markers::ECMA_ARRAY);
                bytes.extend_from_slice(&(props.len() as u32).to_be_bytes());
                encode_properties(props, bytes);
            }
            Amf0Value::StrictArray(items) => {
                bytes.push(markers::STRICT_ARRAY);
                bytes.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.encode_into(bytes);
                }
            }
            Amf0Value::Date { millis, timezone } => {
                bytes.push(markers::DATE);
                bytes.extend_from_slice(&millis.to_bits().to_be_bytes());
                bytes.extend_from_slice(&timezone.to_be_bytes());
            }
            Amf0Value::LongString(s) => {
                bytes.push(markers::LONG_STRING);
                bytes.extend_from_slice(&(s.len() as u32).to_be_bytes());
                bytes.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Decode one value from the start of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        Amf0Reader::new(data).read_value(0)
    }

    /// Look up a property of an object or ECMA array
    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        match self {
            Amf0Value::Object(props) | Amf0Value::EcmaArray(props) => {
                props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) | Amf0Value::LongString(s) => Some(s),
            _ => None,
        }
    }
}

fn encode_short_string(s: &str, bytes: &mut Vec<u8>) {
    let len = s.len().min(u16::MAX as usize);
    bytes.extend_from_slice(&(len as u16).to_be_bytes());
    bytes.extend_from_slice(&s.as_bytes()[..len]);
}

fn encode_properties(props: &[(String, Amf0Value)], bytes: &mut Vec<u8>) {
    for (key, value) in props {
        // Key is encoded as string without type marker
        encode_short_string(key, bytes);
        value.encode_into(bytes);
    }
    bytes.extend_from_slice(&[0x00, 0x00, markers::OBJECT_END]);
}

/// A decoded script data tag: `name(value)`
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptData {
    pub name: String,
    pub value: Amf0Value,
}

impl ScriptData {
    pub fn new<S: Into<String>>(name: S, value: Amf0Value) -> Self {
        ScriptData {
            name: name.into(),
            value,
        }
    }

    /// Decode a script data body.
    ///
    /// The leading string marker is optional; some live streams omit it.
    /// A body holding only the name decodes to an `Undefined` value.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Amf0Reader::new(data);
        if reader.peek() == Some(markers::STRING) {
            reader.pos += 1;
        }
        let name = reader.read_short_string()?;
        let value = if reader.is_empty() {
            Amf0Value::Undefined
        } else {
            reader.read_value(0)?
        };
        Ok(ScriptData { name, value })
    }

    /// Encode as a script data body
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Amf0Value::String(self.name.clone()).encode();
        self.value.encode_into(&mut bytes);
        bytes
    }

    /// `duration` property in seconds, as written by most encoders
    pub fn duration(&self) -> Option<f64> {
        self.value.get("duration").and_then(Amf0Value::as_f64)
    }
}

struct Amf0Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Amf0Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Amf0Reader { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let have = self.data.len().saturating_sub(self.pos);
        if n > have {
            return Err(Error::Truncated { need: n, have });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_short_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        self.read_utf8(len)
    }

    fn read_value(&mut self, depth: usize) -> Result<Amf0Value> {
        if depth > MAX_DEPTH {
            return Err(Error::amf("nesting too deep"));
        }

        let marker = self.read_u8()?;
        let value = match marker {
            markers::NUMBER => Amf0Value::Number(self.read_f64()?),
            markers::BOOLEAN => Amf0Value::Boolean(self.read_u8()? != 0),
            markers::STRING => Amf0Value::String(self.read_short_string()?),
            markers::OBJECT => Amf0Value::Object(self.read_properties(depth)?),
            markers::NULL => Amf0Value::Null,
            markers::UNDEFINED => Amf0Value::Undefined,
            markers::REFERENCE => Amf0Value::Reference(self.read_u16()?),
            markers::ECMA_ARRAY => {
                // the count is advisory; the end marker terminates the array
                let _count = self.read_u32()?;
                Amf0Value::EcmaArray(self.read_properties(depth)?)
            }
            markers::STRICT_ARRAY => {
                let count = self.read_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.read_value(depth + 1)?);
                }
                Amf0Value::StrictArray(items)
            }
            markers::DATE => {
                let millis = self.read_f64()?;
                let timezone = self.read_u16()? as i16;
                Amf0Value::Date { millis, timezone }
            }
            markers::LONG_STRING => {
                let len = self.read_u32()? as usize;
                Amf0Value::LongString(self.read_utf8(len)?)
            }
            markers::MOVIECLIP => return Err(Error::amf("movieclip values are reserved")),
            other => return Err(Error::amf(format!("unknown type marker 0x{:02x}", other))),
        };
        Ok(value)
    }

    fn read_properties(&mut self, depth: usize) -> Result<Vec<(String, Amf0Value)>> {
        let mut props = Vec::new();
        loop {
            let key = self.read_short_string()?;
            if key.is_empty() && self.peek() == Some(markers::OBJECT_END) {
                self.pos += 1;
                return Ok(props);
            }
            let value = self.read_value(depth + 1)?;
            props.push((key, value));
        }
    }
}
