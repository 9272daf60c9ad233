//! Timestamped script-data store

use crate::error::Result;
use crate::format::flv::ScriptData;
use crate::util::Buffer;
use std::collections::BTreeMap;

/// Raw body of a script-data tag together with its timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    pub timestamp: u32,
    pub data: Buffer,
}

impl MetaTag {
    pub fn new(timestamp: u32, data: Buffer) -> Self {
        MetaTag { timestamp, data }
    }

    /// Decode the body as an AMF0 name/value pair such as `onMetaData`
    pub fn decode(&self) -> Result<ScriptData> {
        ScriptData::decode(self.data.as_slice())
    }
}

/// Multimap from timestamp to metadata bodies.
///
/// Bodies sharing a timestamp keep insertion order.
#[derive(Debug, Default)]
pub struct MetaTagMap {
    tags: BTreeMap<u32, Vec<Buffer>>,
}

impl MetaTagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: u32, data: Buffer) {
        self.tags.entry(timestamp).or_default().push(data);
    }

    /// Remove and return every entry with timestamp `<= ts`, in order
    pub fn fetch_up_to(&mut self, ts: u32) -> Vec<MetaTag> {
        let rest = match ts.checked_add(1) {
            Some(split) => self.tags.split_off(&split),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.tags, rest);
        due.into_iter()
            .flat_map(|(timestamp, bodies)| {
                bodies
                    .into_iter()
                    .map(move |data| MetaTag::new(timestamp, data))
            })
            .collect()
    }

    /// Number of stored bodies
    pub fn len(&self) -> usize {
        self.tags.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::flv::Amf0Value;

    fn body(byte: u8) -> Buffer {
        Buffer::padded(&[byte], 0)
    }

    #[test]
    fn test_fetch_evicts_up_to_timestamp() {
        let mut map = MetaTagMap::new();
        map.insert(10, body(1));
        map.insert(20, body(2));
        map.insert(30, body(3));

        let first: Vec<_> = map.fetch_up_to(20).into_iter().map(|t| t.timestamp).collect();
        assert_eq!(first, vec![10, 20]);
        assert_eq!(map.len(), 1);

        let second: Vec<_> = map.fetch_up_to(100).into_iter().map(|t| t.timestamp).collect();
        assert_eq!(second, vec![30]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_same_timestamp_keeps_insertion_order() {
        let mut map = MetaTagMap::new();
        map.insert(5, body(b'a'));
        map.insert(5, body(b'b'));
        map.insert(0, body(b'c'));
        let order: Vec<u8> = map
            .fetch_up_to(5)
            .iter()
            .map(|t| t.data.as_slice()[0])
            .collect();
        assert_eq!(order, vec![b'c', b'a', b'b']);
    }

    #[test]
    fn test_fetch_max_timestamp_takes_everything() {
        let mut map = MetaTagMap::new();
        map.insert(u32::MAX, body(1));
        map.insert(0, body(2));
        assert_eq!(map.fetch_up_to(u32::MAX).len(), 2);
        assert!(map.is_empty());
    }

    #[test]
    fn test_decode_meta_tag() {
        let script = ScriptData::new(
            "onMetaData",
            Amf0Value::EcmaArray(vec![("duration".into(), Amf0Value::Number(2.5))]),
        );
        let tag = MetaTag::new(0, Buffer::padded(&script.encode(), 8));
        let decoded = tag.decode().unwrap();
        assert_eq!(decoded.name, "onMetaData");
        assert_eq!(decoded.duration(), Some(2.5));
    }
}
