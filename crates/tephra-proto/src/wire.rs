//! Primitive readers and writers shared by the mutation and event codecs.

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    AttrValue, Attrs, MAX_VALUE_DEPTH, NodeId,
    errors::{ProtocolError, Result},
};

const KIND_NULL: u8 = 0;
const KIND_BOOL: u8 = 1;
const KIND_INT: u8 = 2;
const KIND_FLOAT: u8 = 3;
const KIND_STRING: u8 = 4;
const KIND_LIST: u8 = 5;
const KIND_MAP: u8 = 6;
const KIND_CALLBACK: u8 = 7;

/// Growable output buffer.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_inner(self) -> BytesMut {
        self.buf
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub(crate) fn zigzag(&mut self, value: i64) {
        self.varint(((value << 1) ^ (value >> 63)) as u64);
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub(crate) fn bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub(crate) fn f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    pub(crate) fn str(&mut self, value: &str) {
        self.varint(value.len() as u64);
        self.buf.put_slice(value.as_bytes());
    }

    pub(crate) fn node(&mut self, id: NodeId) {
        self.varint(id.0);
    }

    /// Append `body` as a `tag · len · body` record.
    pub(crate) fn record(&mut self, tag: u64, body: &Self) {
        self.varint(tag);
        self.varint(body.len() as u64);
        self.buf.put_slice(&body.buf);
    }

    pub(crate) fn value(&mut self, value: &AttrValue) {
        match value {
            AttrValue::Null => self.u8(KIND_NULL),
            AttrValue::Bool(b) => {
                self.u8(KIND_BOOL);
                self.bool(*b);
            },
            AttrValue::Int(i) => {
                self.u8(KIND_INT);
                self.zigzag(*i);
            },
            AttrValue::Float(x) => {
                self.u8(KIND_FLOAT);
                self.f64(*x);
            },
            AttrValue::String(s) => {
                self.u8(KIND_STRING);
                self.str(s);
            },
            AttrValue::List(items) => {
                self.u8(KIND_LIST);
                self.varint(items.len() as u64);
                for item in items {
                    self.value(item);
                }
            },
            AttrValue::Map(entries) => {
                self.u8(KIND_MAP);
                self.attrs(entries);
            },
            AttrValue::Callback => self.u8(KIND_CALLBACK),
        }
    }

    pub(crate) fn attrs(&mut self, attrs: &Attrs) {
        self.varint(attrs.len() as u64);
        for (name, value) in attrs {
            self.str(name);
            self.value(value);
        }
    }
}

/// Cursor over an input frame.
///
/// Every read names the field it is reading so that errors point at the
/// offending part of the frame.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn varint(&mut self, field: &'static str) -> Result<u64> {
        let mut result = 0u64;
        for shift in 0..10 {
            if !self.buf.has_remaining() {
                return Err(ProtocolError::UnexpectedEof { field });
            }
            let byte = self.buf.get_u8();
            if shift == 9 && byte > 1 {
                return Err(ProtocolError::VarintOverflow);
            }
            result |= u64::from(byte & 0x7f) << (7 * shift);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(ProtocolError::VarintOverflow)
    }

    pub(crate) fn zigzag(&mut self, field: &'static str) -> Result<i64> {
        let raw = self.varint(field)?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8> {
        if !self.buf.has_remaining() {
            return Err(ProtocolError::UnexpectedEof { field });
        }
        Ok(self.buf.get_u8())
    }

    pub(crate) fn bool(&mut self, field: &'static str) -> Result<bool> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidBool(other)),
        }
    }

    pub(crate) fn f64(&mut self, field: &'static str) -> Result<f64> {
        if self.buf.remaining() < 8 {
            return Err(ProtocolError::UnexpectedEof { field });
        }
        Ok(self.buf.get_f64_le())
    }

    /// Read a length or count and check it against the bytes left. Every
    /// counted element takes at least one byte, so the check also bounds
    /// element counts.
    pub(crate) fn len(&mut self, field: &'static str) -> Result<usize> {
        let declared = self.varint(field)?;
        match usize::try_from(declared) {
            Ok(n) if n <= self.buf.len() => Ok(n),
            _ => Err(ProtocolError::BodyOverrun { declared, remaining: self.buf.len() }),
        }
    }

    pub(crate) fn str(&mut self, field: &'static str) -> Result<String> {
        let n = self.len(field)?;
        let (head, tail) = self.buf.split_at(n);
        let s = std::str::from_utf8(head).map_err(|_| ProtocolError::InvalidUtf8 { field })?;
        self.buf = tail;
        Ok(s.to_owned())
    }

    pub(crate) fn node(&mut self, field: &'static str) -> Result<NodeId> {
        self.varint(field).map(NodeId)
    }

    /// Split off the next `len`-prefixed record body.
    pub(crate) fn body(&mut self) -> Result<Reader<'a>> {
        let n = self.len("record length")?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(Reader::new(head))
    }

    /// Fail if anything is left unread.
    pub(crate) fn finish(self) -> Result<()> {
        if self.buf.is_empty() { Ok(()) } else { Err(ProtocolError::TrailingBytes(self.buf.len())) }
    }

    pub(crate) fn value(&mut self, depth: usize) -> Result<AttrValue> {
        match self.u8("value kind")? {
            KIND_NULL => Ok(AttrValue::Null),
            KIND_BOOL => self.bool("bool value").map(AttrValue::Bool),
            KIND_INT => self.zigzag("int value").map(AttrValue::Int),
            KIND_FLOAT => self.f64("float value").map(AttrValue::Float),
            KIND_STRING => self.str("string value").map(AttrValue::String),
            KIND_LIST => {
                let depth = Self::descend(depth)?;
                let count = self.len("list length")?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.value(depth)?);
                }
                Ok(AttrValue::List(items))
            },
            KIND_MAP => {
                let depth = Self::descend(depth)?;
                self.attrs_at(depth).map(AttrValue::Map)
            },
            KIND_CALLBACK => Ok(AttrValue::Callback),
            other => Err(ProtocolError::UnknownValueKind(other)),
        }
    }

    pub(crate) fn attrs(&mut self) -> Result<Attrs> {
        self.attrs_at(0)
    }

    fn attrs_at(&mut self, depth: usize) -> Result<Attrs> {
        let count = self.len("attribute count")?;
        let mut attrs = Attrs::new();
        for _ in 0..count {
            let name = self.str("attribute name")?;
            let value = self.value(depth)?;
            attrs.insert(name, value);
        }
        Ok(attrs)
    }

    fn descend(depth: usize) -> Result<usize> {
        let next = depth + 1;
        if next > MAX_VALUE_DEPTH {
            return Err(ProtocolError::NestingTooDeep(MAX_VALUE_DEPTH));
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            let mut w = Writer::new();
            w.varint(value);
            let bytes = w.into_inner();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.varint("test").unwrap(), value);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn zigzag_negative() {
        for value in [0, -1, 1, i64::MIN, i64::MAX, -64, 64] {
            let mut w = Writer::new();
            w.zigzag(value);
            let bytes = w.into_inner();
            assert_eq!(Reader::new(&bytes).zigzag("test").unwrap(), value);
        }
    }

    #[test]
    fn varint_rejects_eleven_bytes() {
        let bytes = [0xff; 11];
        assert_eq!(Reader::new(&bytes).varint("test"), Err(ProtocolError::VarintOverflow));
    }

    #[test]
    fn string_length_past_end_is_overrun() {
        let bytes = [0x05, b'a', b'b'];
        let err = Reader::new(&bytes).str("name").unwrap_err();
        assert_eq!(err, ProtocolError::BodyOverrun { declared: 5, remaining: 2 });
    }

    #[test]
    fn deep_nesting_rejected() {
        let mut value = AttrValue::Null;
        for _ in 0..=MAX_VALUE_DEPTH {
            value = AttrValue::List(vec![value]);
        }
        let mut w = Writer::new();
        w.value(&value);
        let bytes = w.into_inner();
        assert_eq!(
            Reader::new(&bytes).value(0),
            Err(ProtocolError::NestingTooDeep(MAX_VALUE_DEPTH))
        );
    }
}
