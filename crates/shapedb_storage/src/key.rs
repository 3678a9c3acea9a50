//! Primary-key values.

use shapedb_codec::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value the engine can use as a primary key.
///
/// Keys are totally ordered: numbers sort before text, text before bytes,
/// bytes before arrays. Integer and float keys compare by numeric value
/// with each other. Within the other kinds, keys compare by content (arrays
/// element-wise).
#[derive(Debug, Clone)]
pub enum Key {
    /// Integer key.
    Integer(i64),
    /// Non-integral (or out of `i64` range) numeric key. Never NaN when
    /// produced by [`Key::from_value`].
    Float(f64),
    /// Text key.
    Text(String),
    /// Binary key.
    Bytes(Vec<u8>),
    /// Compound key.
    Array(Vec<Key>),
}

impl Key {
    /// Extracts a key from a stored value.
    ///
    /// Floats with no fractional part within `i64` range become integer
    /// keys, other numbers become float keys. Returns `None` for values that
    /// cannot be keys (null, booleans, records, NaN, ...).
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Integer(n) => Some(Key::Integer(*n)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(Key::Integer(*f as i64))
            }
            Value::Float(f) => Some(Key::Float(*f)),
            Value::Text(s) => Some(Key::Text(s.clone())),
            Value::Bytes(b) => Some(Key::Bytes(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// Converts the key back into a value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Integer(n) => Value::Integer(*n),
            Key::Float(f) => Value::Float(*f),
            Key::Text(s) => Value::Text(s.clone()),
            Key::Bytes(b) => Value::Bytes(b.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Integer(_) | Key::Float(_) => 0,
            Key::Text(_) => 1,
            Key::Bytes(_) => 2,
            Key::Array(_) => 3,
        }
    }
}

/// Compares an integer with a float by exact numeric value.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn cmp_integer_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= i64::MAX as f64 {
        return Ordering::Less;
    }
    if f < i64::MIN as f64 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal if f > whole => Ordering::Less,
        Ordering::Equal if f < whole => Ordering::Greater,
        other => other,
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Integer(a), Key::Integer(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            // An integral float equal to an integer still orders after it,
            // so equality stays consistent with hashing.
            (Key::Integer(a), Key::Float(b)) => cmp_integer_float(*a, *b).then(Ordering::Less),
            (Key::Float(a), Key::Integer(b)) => {
                cmp_integer_float(*b, *a).reverse().then(Ordering::Greater)
            }
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            (Key::Bytes(a), Key::Bytes(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Key::Integer(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Key::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            Key::Text(s) => s.hash(state),
            Key::Bytes(b) => b.hash(state),
            Key::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(n) => write!(f, "{n}"),
            Key::Float(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s:?}"),
            Key::Bytes(b) => {
                f.write_str("0x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Key::Array(items) => {
                f.write_str("[")?;
                for (i, k) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Integer(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Integer(i64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Integer(i64::from(n))
    }
}

impl From<f64> for Key {
    /// Integral values become integer keys, as in [`Key::from_value`].
    fn from(n: f64) -> Self {
        Key::from_value(&Value::Float(n)).unwrap_or(Key::Float(n))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Key::Bytes(b)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn kinds_are_ordered() {
        let mut keys = vec![
            Key::Array(vec![]),
            Key::Bytes(vec![0]),
            Key::from("a"),
            Key::from(100),
            Key::from(-1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::from(-1),
                Key::from(100),
                Key::from("a"),
                Key::Bytes(vec![0]),
                Key::Array(vec![]),
            ]
        );
    }

    #[test]
    fn from_value_accepts_key_kinds() {
        assert_eq!(Key::from_value(&Value::from(3)), Some(Key::Integer(3)));
        assert_eq!(Key::from_value(&Value::from(3.0)), Some(Key::Integer(3)));
        assert_eq!(Key::from_value(&Value::from(1.5)), Some(Key::Float(1.5)));
        assert_eq!(
            Key::from_value(&Value::from(f64::INFINITY)),
            Some(Key::Float(f64::INFINITY))
        );
        assert_eq!(Key::from_value(&Value::from("a")), Some(Key::from("a")));
        assert_eq!(
            Key::from_value(&Value::from(vec![Value::from(1), Value::from("b")])),
            Some(Key::Array(vec![Key::from(1), Key::from("b")]))
        );
    }

    #[test]
    fn from_value_rejects_non_keys() {
        assert_eq!(Key::from_value(&Value::Null), None);
        assert_eq!(Key::from_value(&Value::from(true)), None);
        assert_eq!(Key::from_value(&Value::from(f64::NAN)), None);
        assert_eq!(Key::from_value(&Value::record([("a", Value::from(1))])), None);
        assert_eq!(Key::from_value(&Value::from(vec![Value::Null])), None);
    }

    #[test]
    fn numbers_order_by_value() {
        let mut keys = vec![
            Key::from("a"),
            Key::from(2),
            Key::Float(1.5),
            Key::Float(f64::NEG_INFINITY),
            Key::from(1),
            Key::Float(-0.5),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::Float(f64::NEG_INFINITY),
                Key::Float(-0.5),
                Key::from(1),
                Key::Float(1.5),
                Key::from(2),
                Key::from("a"),
            ]
        );
        assert!(Key::Float(1e30) > Key::from(i64::MAX));
        assert!(Key::Float(-1e30) < Key::from(i64::MIN));
    }

    #[test]
    fn integral_float_normalizes_to_integer() {
        assert_eq!(Key::from(4.0), Key::Integer(4));
        assert_eq!(Key::from(4.25), Key::Float(4.25));
        assert_ne!(Key::Float(4.0), Key::Integer(4));
    }

    #[test]
    fn display() {
        assert_eq!(Key::Float(2.5).to_string(), "2.5");
        assert_eq!(Key::from(7).to_string(), "7");
        assert_eq!(Key::from("x").to_string(), "\"x\"");
        assert_eq!(Key::Bytes(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(
            Key::Array(vec![Key::from(1), Key::from("a")]).to_string(),
            "[1, \"a\"]"
        );
    }

    proptest! {
        #[test]
        fn integer_order_matches_i64(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(Key::from(a).cmp(&Key::from(b)), a.cmp(&b));
        }

        #[test]
        fn mixed_numbers_order_like_f64(a in -1.0e6f64..1.0e6, b in -1_000_000i64..1_000_000) {
            let expected = a.partial_cmp(&(b as f64)).unwrap();
            let key = Key::from(a);
            if expected != Ordering::Equal {
                prop_assert_eq!(key.cmp(&Key::from(b)), expected);
            } else {
                prop_assert_eq!(key, Key::from(b));
            }
        }

        #[test]
        fn to_value_inverts_from_value(s in "[a-z]{0,12}", n in any::<i64>()) {
            let key = Key::Array(vec![Key::from(n), Key::from(s)]);
            prop_assert_eq!(Key::from_value(&key.to_value()), Some(key));
        }
    }
}
