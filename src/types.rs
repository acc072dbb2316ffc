//! Field-table value types shared by the codec, method arguments and
//! content properties.

use std::collections::BTreeMap;
use std::iter::FromIterator;

/// A decimal value as carried on the wire: an unscaled signed integer
/// plus a scale (number of digits after the decimal point).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub scale: u8,
    pub value: i32,
}

impl Decimal {
    pub fn new(scale: u8, value: i32) -> Self {
        Decimal { scale, value }
    }

    pub fn as_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(self.scale as i32)
    }
}

/// Seconds since the Unix epoch, as carried by the AMQP `timestamp` type
/// (a big-endian signed 64-bit integer on the wire).
pub type Timestamp = i64;

/// A value that can appear in a field table or field array.
#[derive(Debug, Clone, PartialEq)]
pub enum AmqpValue {
    LongString(String),
    ShortString(String),
    ShortShortInt(i8),
    ShortShortUInt(u8),
    ShortInt(i16),
    ShortUInt(u16),
    LongInt(i32),
    LongUInt(u32),
    LongLongInt(i64),
    LongLongUInt(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Table(FieldTable),
    Array(Vec<AmqpValue>),
    Boolean(bool),
    Timestamp(Timestamp),
    Void,
}

impl AmqpValue {
    /// The single-byte type tag used to prefix this value in a field table.
    pub fn tag(&self) -> u8 {
        match self {
            AmqpValue::LongString(_) => b'S',
            AmqpValue::ShortString(_) => b's',
            AmqpValue::ShortShortInt(_) => b'b',
            AmqpValue::ShortShortUInt(_) => b'B',
            AmqpValue::ShortInt(_) => b'U',
            AmqpValue::ShortUInt(_) => b'u',
            AmqpValue::LongInt(_) => b'I',
            AmqpValue::LongUInt(_) => b'i',
            AmqpValue::LongLongInt(_) => b'L',
            AmqpValue::LongLongUInt(_) => b'l',
            AmqpValue::Float(_) => b'f',
            AmqpValue::Double(_) => b'd',
            AmqpValue::Decimal(_) => b'D',
            AmqpValue::Table(_) => b'F',
            AmqpValue::Array(_) => b'A',
            AmqpValue::Boolean(_) => b't',
            AmqpValue::Timestamp(_) => b'T',
            AmqpValue::Void => b'V',
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmqpValue::LongString(s) | AmqpValue::ShortString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long_uint(&self) -> Option<u32> {
        match self {
            AmqpValue::LongUInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmqpValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            AmqpValue::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// An AMQP field table: a map from short-string keys to [`AmqpValue`]s.
/// Backed by a `BTreeMap`, so iteration and encoding order is sorted by
/// key, not insertion order; that's fine for the wire format (field
/// tables are unordered per the spec) and gives `client_properties`/
/// `server_properties` a deterministic order in tests and logs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTable(BTreeMap<String, AmqpValue>);

impl FieldTable {
    pub fn new() -> Self {
        FieldTable(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AmqpValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AmqpValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AmqpValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AmqpValue)> for FieldTable {
    fn from_iter<I: IntoIterator<Item = (String, AmqpValue)>>(iter: I) -> Self {
        FieldTable(iter.into_iter().collect())
    }
}
