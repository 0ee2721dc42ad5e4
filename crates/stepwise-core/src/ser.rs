//! Strict conversion from any `Serialize` type into [`Value`].
//!
//! `serde_json::to_value` silently turns NaN into `null`; this serializer
//! refuses instead, because a coerced value would hash and replay
//! differently from the state it was captured from. Integer map keys are
//! stringified (matching JSON object semantics); every other non-string key,
//! byte strings, and integers outside ±(2^53 - 1) are rejected.

use serde::ser::{self, Serialize};

use crate::error::ValueError;
use crate::value::{push_key, Map, Value, MAX_SAFE_INTEGER};

/// Convert `value` into a validated [`Value`].
///
/// # Examples
///
/// ```
/// use stepwise_core::{to_value, Value};
///
/// #[derive(serde::Serialize)]
/// struct Resource { id: &'static str, amount: f64 }
///
/// let v = to_value(&Resource { id: "gold", amount: 5.0 }).unwrap();
/// assert_eq!(v.get("amount"), Some(&Value::Number(5.0)));
///
/// let bad = to_value(&Resource { id: "gold", amount: f64::NAN });
/// assert!(bad.is_err());
/// ```
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, ValueError> {
    value.serialize(ValueSerializer {
        path: String::from("$"),
    })
}

struct ValueSerializer {
    path: String,
}

impl ValueSerializer {
    fn number(self, v: f64) -> Result<Value, ValueError> {
        if v.is_finite() {
            Ok(Value::Number(v))
        } else {
            Err(ValueError::NonFiniteNumber {
                path: self.path,
                value: v,
            })
        }
    }

    fn integer(self, v: i128) -> Result<Value, ValueError> {
        if (v.unsigned_abs() as f64) <= MAX_SAFE_INTEGER {
            Ok(Value::Number(v as f64))
        } else {
            Err(ValueError::UnsafeInteger {
                path: self.path,
                value: v.to_string(),
            })
        }
    }

    fn child_key(&self, key: &str) -> ValueSerializer {
        let mut path = self.path.clone();
        push_key(&mut path, key);
        ValueSerializer { path }
    }
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = ValueError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, ValueError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, ValueError> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, ValueError> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, ValueError> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, ValueError> {
        self.integer(i128::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, ValueError> {
        self.integer(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, ValueError> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, ValueError> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, ValueError> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, ValueError> {
        self.integer(i128::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, ValueError> {
        match i128::try_from(v) {
            Ok(v) => self.integer(v),
            Err(_) => Err(ValueError::UnsafeInteger {
                path: self.path,
                value: v.to_string(),
            }),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Value, ValueError> {
        self.number(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, ValueError> {
        self.number(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, ValueError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, ValueError> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Value, ValueError> {
        Err(ValueError::Unsupported {
            path: self.path,
            kind: "byte string".into(),
        })
    }

    fn serialize_none(self) -> Result<Value, ValueError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, ValueError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, ValueError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, ValueError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, ValueError> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, ValueError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, ValueError> {
        let inner = value.serialize(self.child_key(variant))?;
        Ok(Value::object([(variant, inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, ValueError> {
        Ok(SeqBuilder {
            path: self.path,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, ValueError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, ValueError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, ValueError> {
        let inner = self.child_key(variant);
        Ok(VariantSeqBuilder {
            variant,
            seq: SeqBuilder {
                path: inner.path,
                items: Vec::with_capacity(len),
            },
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, ValueError> {
        Ok(MapBuilder {
            path: self.path,
            map: Map::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, ValueError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantMapBuilder, ValueError> {
        let inner = self.child_key(variant);
        Ok(VariantMapBuilder {
            variant,
            map: MapBuilder {
                path: inner.path,
                map: Map::new(),
                pending_key: None,
            },
        })
    }
}

// ── Compound builders ───────────────────────────────────────────

#[doc(hidden)]
pub struct SeqBuilder {
    path: String,
    items: Vec<Value>,
}

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        let path = format!("{}[{}]", self.path, self.items.len());
        self.items.push(value.serialize(ValueSerializer { path })?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::Array(self.items))
    }
}

#[doc(hidden)]
pub struct VariantSeqBuilder {
    variant: &'static str,
    seq: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        self.seq.push(value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::object([(self.variant, Value::Array(self.seq.items))]))
    }
}

#[doc(hidden)]
pub struct MapBuilder {
    path: String,
    map: Map,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) -> Result<(), ValueError> {
        let mut path = self.path.clone();
        push_key(&mut path, &key);
        let v = value.serialize(ValueSerializer { path })?;
        self.map.insert(key, v);
        Ok(())
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), ValueError> {
        let key = key.serialize(ValueSerializer {
            path: self.path.clone(),
        });
        match key {
            Ok(Value::String(s)) => {
                self.pending_key = Some(s);
                Ok(())
            }
            Ok(Value::Number(n)) if n.fract() == 0.0 => {
                self.pending_key = Some(format!("{}", n as i64));
                Ok(())
            }
            _ => Err(ValueError::NonStringKey {
                path: self.path.clone(),
            }),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ValueError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| ValueError::Unsupported {
                path: self.path.clone(),
                kind: "map value without key".into(),
            })?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ValueError> {
        self.insert(key.to_owned(), value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::Object(self.map))
    }
}

#[doc(hidden)]
pub struct VariantMapBuilder {
    variant: &'static str,
    map: MapBuilder,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Value;
    type Error = ValueError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ValueError> {
        self.map.insert(key.to_owned(), value)
    }

    fn end(self) -> Result<Value, ValueError> {
        Ok(Value::object([(self.variant, Value::Object(self.map.map))]))
    }
}
