//! Struct fields become properties
//!
//! Design: A `Field<S, V>` is a pair of projections into a native struct plus
//! the name it is exposed under. What a property over it looks like depends
//! on the field type:
//! - scalars read and write as themselves
//! - `[E; N]` (nested to any depth) reads as a list; a write is checked in
//!   full before any element is stored, then overwrites only the provided
//!   prefix
//! - `[c_char; N]` is a string buffer in the native encoding
//! - `[[c_char; M]; N]` is a list of string buffers
//! - `[*mut T; N]` / `[*const T; N]` are read-only lists of addresses

use std::ffi::c_char;
use std::fmt;

use super::strings::{active_codec, StringCodec};
use crate::errors::{BindError, BindResult};
use crate::objects::{FromPy, IntoPy, Property, PyObject};

/// Named projection of field `V` out of struct `S`
pub struct Field<S, V> {
    name: &'static str,
    get: fn(&S) -> &V,
    get_mut: fn(&mut S) -> &mut V,
}

impl<S, V> Clone for Field<S, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, V> Copy for Field<S, V> {}

impl<S, V> fmt::Debug for Field<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.name)
    }
}

/// `field!(Quote, last_price)`
#[macro_export]
macro_rules! field {
    ($s:ty, $f:ident) => {
        $crate::transforms::Field::<$s, _>::new(
            stringify!($f),
            |s: &$s| &s.$f,
            |s: &mut $s| &mut s.$f,
        )
    };
}

impl<S, V> Field<S, V> {
    pub const fn new(name: &'static str, get: fn(&S) -> &V, get_mut: fn(&mut S) -> &mut V) -> Self {
        Self { name, get, get_mut }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn native<'a>(&self, target: &'a S) -> &'a V {
        (self.get)(target)
    }

    #[inline]
    pub fn native_mut<'a>(&self, target: &'a mut S) -> &'a mut V {
        (self.get_mut)(target)
    }
}

// ============================================================================
// Plain values and nested arrays
// ============================================================================

/// Field types with an object-side value
pub trait FieldValue {
    type Value;

    fn load(&self) -> Self::Value;

    /// Validate a value before anything is written
    fn check(value: &Self::Value) -> BindResult<()>;

    /// Store a value that passed `check`
    fn store(&mut self, value: Self::Value);
}

macro_rules! scalar_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl FieldValue for $t {
                type Value = $t;

                #[inline(always)]
                fn load(&self) -> $t {
                    *self
                }

                #[inline(always)]
                fn check(_value: &$t) -> BindResult<()> {
                    Ok(())
                }

                #[inline(always)]
                fn store(&mut self, value: $t) {
                    *self = value;
                }
            }
        )*
    };
}

scalar_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char);

impl<E: FieldValue, const N: usize> FieldValue for [E; N] {
    type Value = Vec<E::Value>;

    fn load(&self) -> Vec<E::Value> {
        self.iter().map(FieldValue::load).collect()
    }

    fn check(value: &Vec<E::Value>) -> BindResult<()> {
        if value.len() > N {
            return Err(BindError::SizeMismatch {
                capacity: N,
                size: value.len(),
            });
        }
        value.iter().try_for_each(E::check)
    }

    fn store(&mut self, value: Vec<E::Value>) {
        for (slot, item) in self.iter_mut().zip(value) {
            slot.store(item);
        }
    }
}

impl<S, V: FieldValue> Field<S, V> {
    pub fn get(&self, target: &S) -> V::Value {
        self.native(target).load()
    }

    /// Check then store; on error the field is unchanged
    pub fn set(&self, target: &mut S, value: V::Value) -> BindResult<()> {
        V::check(&value)?;
        self.native_mut(target).store(value);
        Ok(())
    }
}

impl<S, V> Field<S, V>
where
    S: 'static,
    V: FieldValue + 'static,
    V::Value: IntoPy + FromPy,
{
    /// Read-write property
    pub fn property(self) -> Property<S> {
        self.readonly()
            .with_setter(move |target: &mut S, value: &PyObject| {
                self.set(target, V::Value::from_py(value)?)
            })
    }

    pub fn readonly(self) -> Property<S> {
        Property::new(move |target: &S| Ok(self.get(target).into_py()))
    }
}

// ============================================================================
// String buffers
// ============================================================================

impl<S, const N: usize> Field<S, [c_char; N]> {
    pub fn get_string(&self, target: &S, codec: &StringCodec) -> String {
        codec.read_buffer(self.native(target))
    }

    /// Encode into the buffer; returns bytes written before the terminator
    pub fn set_string(&self, target: &mut S, text: &str, codec: &StringCodec) -> BindResult<usize> {
        codec.write_buffer(text, self.native_mut(target))
    }
}

impl<S: 'static, const N: usize> Field<S, [c_char; N]> {
    /// String property using the codec active at access time
    pub fn string_property(self) -> Property<S> {
        Property::new(move |target: &S| Ok(PyObject::Str(self.get_string(target, &active_codec()))))
            .with_setter(move |target: &mut S, value: &PyObject| {
                let text = String::from_py(value)?;
                self.set_string(target, &text, &active_codec()).map(|_| ())
            })
    }

    /// String property pinned to one codec
    pub fn string_property_with(self, codec: StringCodec) -> Property<S> {
        Property::new(move |target: &S| Ok(PyObject::Str(self.get_string(target, &codec))))
            .with_setter(move |target: &mut S, value: &PyObject| {
                let text = String::from_py(value)?;
                self.set_string(target, &text, &codec).map(|_| ())
            })
    }
}

impl<S, const M: usize, const N: usize> Field<S, [[c_char; M]; N]> {
    pub fn get_strings(&self, target: &S, codec: &StringCodec) -> Vec<String> {
        self.native(target)
            .iter()
            .map(|buffer| codec.read_buffer(buffer))
            .collect()
    }

    /// All-or-nothing: every string is encoded into a copy first
    pub fn set_strings(&self, target: &mut S, values: &[String], codec: &StringCodec) -> BindResult<()> {
        if values.len() > N {
            return Err(BindError::SizeMismatch {
                capacity: N,
                size: values.len(),
            });
        }
        let mut staged = *self.native(target);
        for (index, (buffer, text)) in staged.iter_mut().zip(values).enumerate() {
            codec
                .write_buffer(text, buffer)
                .map_err(|e| e.at_argument(index))?;
        }
        *self.native_mut(target) = staged;
        Ok(())
    }
}

impl<S: 'static, const M: usize, const N: usize> Field<S, [[c_char; M]; N]> {
    pub fn string_array_property(self) -> Property<S> {
        Property::new(move |target: &S| Ok(self.get_strings(target, &active_codec()).into_py()))
            .with_setter(move |target: &mut S, value: &PyObject| {
                let values = Vec::<String>::from_py(value)?;
                self.set_strings(target, &values, &active_codec())
            })
    }
}

// ============================================================================
// Pointer arrays
// ============================================================================

impl<S: 'static, T: 'static, const N: usize> Field<S, [*mut T; N]> {
    pub fn addresses(&self, target: &S) -> Vec<usize> {
        self.native(target).iter().map(|p| *p as usize).collect()
    }

    /// Read-only list of addresses; null entries read as `None`
    pub fn pointer_property(self) -> Property<S> {
        Property::new(move |target: &S| {
            let items = self.native(target).iter().map(|p| (*p).into_py()).collect();
            Ok(PyObject::List(items))
        })
    }
}

impl<S: 'static, T: 'static, const N: usize> Field<S, [*const T; N]> {
    pub fn addresses(&self, target: &S) -> Vec<usize> {
        self.native(target).iter().map(|p| *p as usize).collect()
    }

    pub fn pointer_property(self) -> Property<S> {
        Property::new(move |target: &S| {
            let items = self.native(target).iter().map(|p| (*p).into_py()).collect();
            Ok(PyObject::List(items))
        })
    }
}
