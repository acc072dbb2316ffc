//! Primitive and field-table encode/decode.
//!
//! Mirrors the reader/writer pair AMQP implementations traditionally
//! split framing from: a [`Decoder`] wraps any `Read` and a [`Encoder`]
//! wraps any `Write`, both carrying the pending-bit-byte state that lets
//! consecutive `bool` fields pack into a single octet.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::types::{AmqpValue, Decimal, FieldTable, Timestamp};

pub struct Decoder<R> {
    inner: R,
    bit_buf: u8,
    bits_left: u8,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R) -> Self {
        Decoder {
            inner,
            bit_buf: 0,
            bits_left: 0,
        }
    }

    fn reset_bits(&mut self) {
        self.bit_buf = 0;
        self.bits_left = 0;
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(Error::from)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            let mut b = [0u8; 1];
            self.read_exact(&mut b)?;
            self.bit_buf = b[0];
            self.bits_left = 8;
        }
        let result = (self.bit_buf & 1) == 1;
        self.bit_buf >>= 1;
        self.bits_left -= 1;
        Ok(result)
    }

    pub fn read_octet(&mut self) -> Result<u8> {
        self.reset_bits();
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_short(&mut self) -> Result<u16> {
        self.reset_bits();
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    pub fn read_long(&mut self) -> Result<u32> {
        self.reset_bits();
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    pub fn read_longlong(&mut self) -> Result<u64> {
        self.reset_bits();
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    pub fn read_float(&mut self) -> Result<f32> {
        self.reset_bits();
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(f32::from_be_bytes(b))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        self.reset_bits();
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(f64::from_be_bytes(b))
    }

    pub fn read_shortstr(&mut self) -> Result<String> {
        self.reset_bits();
        let len = self.read_raw_octet()?;
        self.read_string(len as usize)
    }

    pub fn read_longstr(&mut self) -> Result<String> {
        self.reset_bits();
        let len = self.read_raw_long()?;
        self.read_string(len as usize)
    }

    /// Read a `longstr`'s raw bytes without requiring UTF-8, used for
    /// message bodies and opaque byte blobs such as the SASL response.
    pub fn read_longstr_bytes(&mut self) -> Result<Vec<u8>> {
        self.reset_bits();
        let len = self.read_raw_long()?;
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_raw_octet(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_raw_long(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn read_string(&mut self, len: usize) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| {
            Error::FrameSyntaxError {
                code: 502,
                text: format!("invalid utf-8 in string field: {}", e),
                method: None,
            }
        })
    }

    pub fn read_timestamp(&mut self) -> Result<Timestamp> {
        self.reset_bits();
        Ok(self.read_longlong()? as i64)
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        self.reset_bits();
        let scale = self.read_raw_octet()?;
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(Decimal::new(scale, i32::from_be_bytes(b)))
    }

    pub fn read_table(&mut self) -> Result<FieldTable> {
        self.reset_bits();
        let len = self.read_raw_long()? as usize;
        let mut body = vec![0u8; len];
        self.read_exact(&mut body)?;
        let mut sub = Decoder::new(io::Cursor::new(body));
        let mut table = FieldTable::new();
        while (sub.inner.position() as usize) < sub.inner.get_ref().len() {
            let key = sub.read_shortstr()?;
            let value = sub.read_item()?;
            table.insert(key, value);
        }
        Ok(table)
    }

    pub fn read_array(&mut self) -> Result<Vec<AmqpValue>> {
        self.reset_bits();
        let len = self.read_raw_long()? as usize;
        let mut body = vec![0u8; len];
        self.read_exact(&mut body)?;
        let mut sub = Decoder::new(io::Cursor::new(body));
        let mut items = Vec::new();
        while (sub.inner.position() as usize) < sub.inner.get_ref().len() {
            items.push(sub.read_item()?);
        }
        Ok(items)
    }

    pub fn read_item(&mut self) -> Result<AmqpValue> {
        let tag = self.read_raw_octet()?;
        let value = match tag {
            b'S' => AmqpValue::LongString(self.read_string_after_tag_long()?),
            b's' => AmqpValue::ShortString(self.read_string_after_tag_short()?),
            b'b' => AmqpValue::ShortShortInt(self.read_raw_octet()? as i8),
            b'B' => AmqpValue::ShortShortUInt(self.read_raw_octet()?),
            b'U' => {
                let mut b = [0u8; 2];
                self.read_exact(&mut b)?;
                AmqpValue::ShortInt(i16::from_be_bytes(b))
            }
            b'u' => {
                let mut b = [0u8; 2];
                self.read_exact(&mut b)?;
                AmqpValue::ShortUInt(u16::from_be_bytes(b))
            }
            b'I' => {
                let mut b = [0u8; 4];
                self.read_exact(&mut b)?;
                AmqpValue::LongInt(i32::from_be_bytes(b))
            }
            b'i' => {
                let mut b = [0u8; 4];
                self.read_exact(&mut b)?;
                AmqpValue::LongUInt(u32::from_be_bytes(b))
            }
            b'L' => {
                let mut b = [0u8; 8];
                self.read_exact(&mut b)?;
                AmqpValue::LongLongInt(i64::from_be_bytes(b))
            }
            b'l' => {
                let mut b = [0u8; 8];
                self.read_exact(&mut b)?;
                AmqpValue::LongLongUInt(u64::from_be_bytes(b))
            }
            b'f' => AmqpValue::Float(self.read_float()?),
            b'd' => AmqpValue::Double(self.read_double()?),
            b'D' => AmqpValue::Decimal(self.read_decimal()?),
            b'F' => AmqpValue::Table(self.read_table()?),
            b'A' => AmqpValue::Array(self.read_array()?),
            b't' => AmqpValue::Boolean(self.read_raw_octet()? != 0),
            b'T' => AmqpValue::Timestamp(self.read_timestamp()?),
            b'V' => AmqpValue::Void,
            other => {
                return Err(Error::FrameSyntaxError {
                    code: 502,
                    text: format!("unknown field-table type tag {:?}", other as char),
                    method: None,
                })
            }
        };
        Ok(value)
    }

    fn read_string_after_tag_long(&mut self) -> Result<String> {
        let len = self.read_raw_long()?;
        self.read_string(len as usize)
    }

    fn read_string_after_tag_short(&mut self) -> Result<String> {
        let len = self.read_raw_octet()?;
        self.read_string(len as usize)
    }
}

pub struct Encoder<W> {
    inner: W,
    bit_buf: u8,
    bit_shift: u8,
    bit_pending: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(inner: W) -> Self {
        Encoder {
            inner,
            bit_buf: 0,
            bit_shift: 0,
            bit_pending: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn flush_bits(&mut self) -> Result<()> {
        if self.bit_pending {
            self.inner.write_all(&[self.bit_buf])?;
            self.bit_buf = 0;
            self.bit_shift = 0;
            self.bit_pending = false;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, value: bool) -> Result<()> {
        if self.bit_shift == 8 {
            self.flush_bits()?;
        }
        if value {
            self.bit_buf |= 1 << self.bit_shift;
        }
        self.bit_shift += 1;
        self.bit_pending = true;
        Ok(())
    }

    pub fn write_octet(&mut self, n: u8) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&[n]).map_err(Error::from)
    }

    pub fn write_short(&mut self, n: u16) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&n.to_be_bytes()).map_err(Error::from)
    }

    pub fn write_long(&mut self, n: u32) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&n.to_be_bytes()).map_err(Error::from)
    }

    pub fn write_longlong(&mut self, n: u64) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&n.to_be_bytes()).map_err(Error::from)
    }

    pub fn write_float(&mut self, n: f32) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&n.to_be_bytes()).map_err(Error::from)
    }

    pub fn write_double(&mut self, n: f64) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&n.to_be_bytes()).map_err(Error::from)
    }

    pub fn write_shortstr(&mut self, s: &str) -> Result<()> {
        self.flush_bits()?;
        if s.len() > 255 {
            return Err(Error::FrameSyntaxError {
                code: 502,
                text: format!("shortstr overflow ({} > 255)", s.len()),
                method: None,
            });
        }
        self.inner.write_all(&[s.len() as u8])?;
        self.inner.write_all(s.as_bytes()).map_err(Error::from)
    }

    pub fn write_longstr(&mut self, s: &str) -> Result<()> {
        self.write_longstr_bytes(s.as_bytes())
    }

    pub fn write_longstr_bytes(&mut self, s: &[u8]) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&(s.len() as u32).to_be_bytes())?;
        self.inner.write_all(s).map_err(Error::from)
    }

    pub fn write_timestamp(&mut self, v: Timestamp) -> Result<()> {
        self.flush_bits()?;
        self.write_longlong(v as u64)
    }

    pub fn write_decimal(&mut self, d: Decimal) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&[d.scale])?;
        self.inner.write_all(&d.value.to_be_bytes()).map_err(Error::from)
    }

    pub fn write_table(&mut self, table: &FieldTable) -> Result<()> {
        self.flush_bits()?;
        let mut buf = Vec::new();
        {
            let mut sub = Encoder::new(&mut buf);
            for (key, value) in table.iter() {
                sub.write_shortstr(key)?;
                sub.write_item(value)?;
            }
        }
        self.write_long(buf.len() as u32)?;
        self.inner.write_all(&buf).map_err(Error::from)
    }

    pub fn write_array(&mut self, items: &[AmqpValue]) -> Result<()> {
        self.flush_bits()?;
        let mut buf = Vec::new();
        {
            let mut sub = Encoder::new(&mut buf);
            for item in items {
                sub.write_item(item)?;
            }
        }
        self.write_long(buf.len() as u32)?;
        self.inner.write_all(&buf).map_err(Error::from)
    }

    pub fn write_item(&mut self, value: &AmqpValue) -> Result<()> {
        self.flush_bits()?;
        self.inner.write_all(&[value.tag()])?;
        match value {
            AmqpValue::LongString(s) => self.write_longstr(s),
            AmqpValue::ShortString(s) => self.write_shortstr(s),
            AmqpValue::ShortShortInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::ShortShortUInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::ShortInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::ShortUInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::LongInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::LongUInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::LongLongInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::LongLongUInt(v) => self.inner.write_all(&v.to_be_bytes()).map_err(Error::from),
            AmqpValue::Float(v) => self.write_float(*v),
            AmqpValue::Double(v) => self.write_double(*v),
            AmqpValue::Decimal(d) => self.write_decimal(*d),
            AmqpValue::Table(t) => self.write_table(t),
            AmqpValue::Array(a) => self.write_array(a),
            AmqpValue::Boolean(b) => self.inner.write_all(&[*b as u8]).map_err(Error::from),
            AmqpValue::Timestamp(t) => self.write_timestamp(*t),
            AmqpValue::Void => Ok(()),
        }
    }

    pub fn finish(mut self) -> Result<W> {
        self.flush_bits()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip_item(v: AmqpValue) {
        let mut buf = Vec::new();
        {
            let mut enc = Encoder::new(&mut buf);
            enc.write_item(&v).unwrap();
        }
        let mut dec = Decoder::new(Cursor::new(buf));
        assert_eq!(dec.read_item().unwrap(), v);
    }

    #[test]
    fn primitive_items_roundtrip() {
        roundtrip_item(AmqpValue::LongString("hello".into()));
        roundtrip_item(AmqpValue::ShortString("hi".into()));
        roundtrip_item(AmqpValue::ShortShortInt(-12));
        roundtrip_item(AmqpValue::ShortShortUInt(200));
        roundtrip_item(AmqpValue::ShortInt(-1000));
        roundtrip_item(AmqpValue::ShortUInt(40000));
        roundtrip_item(AmqpValue::LongInt(-100000));
        roundtrip_item(AmqpValue::LongUInt(3_000_000_000));
        roundtrip_item(AmqpValue::LongLongInt(-1));
        roundtrip_item(AmqpValue::LongLongUInt(18_000_000_000_000_000_000));
        roundtrip_item(AmqpValue::Float(1.5));
        roundtrip_item(AmqpValue::Double(2.718281828));
        roundtrip_item(AmqpValue::Decimal(Decimal::new(2, 12345)));
        roundtrip_item(AmqpValue::Boolean(true));
        roundtrip_item(AmqpValue::Boolean(false));
        roundtrip_item(AmqpValue::Timestamp(1_700_000_000));
        roundtrip_item(AmqpValue::Void);
    }

    #[test]
    fn nested_table_roundtrips() {
        let mut inner = FieldTable::new();
        inner.insert("x", AmqpValue::LongUInt(1));
        let mut outer = FieldTable::new();
        outer.insert("a", AmqpValue::ShortString("s".into()));
        outer.insert("b", AmqpValue::Table(inner));
        outer.insert("c", AmqpValue::Array(vec![AmqpValue::LongInt(1), AmqpValue::LongInt(2)]));
        roundtrip_item(AmqpValue::Table(outer));
    }

    #[test]
    fn consecutive_bits_pack_into_one_byte() {
        let mut buf = Vec::new();
        {
            let mut enc = Encoder::new(&mut buf);
            enc.write_bit(true).unwrap();
            enc.write_bit(false).unwrap();
            enc.write_bit(true).unwrap();
            enc.write_octet(7).unwrap();
        }
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[0] & 0b111, 0b101);
        let mut dec = Decoder::new(Cursor::new(buf));
        assert!(dec.read_bit().unwrap());
        assert!(!dec.read_bit().unwrap());
        assert!(dec.read_bit().unwrap());
        assert_eq!(dec.read_octet().unwrap(), 7);
    }

    #[test]
    fn shortstr_overflow_is_rejected_at_encode_time() {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        let long = "x".repeat(256);
        assert!(enc.write_shortstr(&long).is_err());
    }
}
