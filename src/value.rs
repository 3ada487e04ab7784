use crate::registry::{Registry, Strategy};
use crate::schema::Field;
use crate::Result;
use bytes::Bytes;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Types that can travel through the strategy registry.
///
/// A type describes itself once with [`Value::shape`]; the [`Registry`] turns that description
/// into an encode/decode [`Strategy`] and caches it by type. `Default` supplies fresh storage
/// whenever a decoded value has to be allocated (an `Option` becoming `Some`, a new map entry).
///
/// Most users should use `#[derive(Record)]` for structs instead of a manual implementation.
pub trait Value: Any + Default {
    fn shape() -> Shape<Self>;
}

/// The closed set of shapes the codec knows how to move.
pub enum Shape<T> {
    /// Signed integer whose destination accepts `[-(limit + 1), limit]`.
    Signed {
        limit: u64,
        widen: fn(&T) -> i64,
        narrow: fn(i64) -> T,
    },
    /// Unsigned integer whose destination accepts `[0, limit]`.
    Unsigned {
        limit: u64,
        widen: fn(&T) -> u64,
        narrow: fn(u64) -> T,
    },
    /// UTF-8 string.
    Str {
        as_str: fn(&T) -> &str,
        from_string: fn(String) -> T,
    },
    /// Wrapper around another value that may be absent on the wire (`Nil`).
    Optional(Wrapper<T>),
    /// Map with string keys.
    Map(MapShape<T>),
    /// Record whose ordered field list is produced by the given function.
    Record(fn() -> Vec<Field>),
    /// No strategy; encoding or decoding through the registry fails.
    Unsupported,
}

/// Accessors for a wrapper shape.
pub struct Wrapper<T> {
    /// Resolves the strategy of the wrapped type.
    pub inner: fn(&Registry) -> Strategy,
    /// The wrapped value, or `None` if absent.
    pub get: fn(&T) -> Option<&dyn Any>,
    /// Storage for the wrapped value, allocating it if absent.
    pub get_or_insert: fn(&mut T) -> &mut dyn Any,
    /// Resets the wrapper to its absent/empty state.
    pub clear: fn(&mut T),
}

/// Accessors for a map shape.
pub struct MapShape<T> {
    /// Resolves the strategy of the value type.
    pub value: fn(&Registry) -> Strategy,
    pub len: fn(&T) -> usize,
    /// Visits every entry in iteration order, stopping at the first error.
    pub for_each: fn(&T, &mut dyn FnMut(&str, &dyn Any) -> Result<()>) -> Result<()>,
    /// Decodes a fresh value through the callback and stores it under the key, replacing
    /// any previous value.
    pub insert: fn(&mut T, String, &mut dyn FnMut(&mut dyn Any) -> Result<()>) -> Result<()>,
    pub clear: fn(&mut T),
}

// --- Integers ---
macro_rules! impl_signed {
    ($($t:ty),*) => {
        $(
            impl Value for $t {
                fn shape() -> Shape<Self> {
                    Shape::Signed {
                        limit: <$t>::MAX as u64,
                        widen: |v| *v as i64,
                        narrow: |n| n as $t,
                    }
                }
            }
        )*
    };
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {
        $(
            impl Value for $t {
                fn shape() -> Shape<Self> {
                    Shape::Unsigned {
                        limit: <$t>::MAX as u64,
                        widen: |v| *v as u64,
                        narrow: |n| n as $t,
                    }
                }
            }
        )*
    };
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

// --- String ---
impl Value for String {
    fn shape() -> Shape<Self> {
        Shape::Str {
            as_str: |s| s.as_str(),
            from_string: |s| s,
        }
    }
}

// --- Option / Box ---
/// `None` is written as `Nil`; a `Nil` on the wire decodes to `None`.
impl<T: Value> Value for Option<T> {
    fn shape() -> Shape<Self> {
        Shape::Optional(Wrapper {
            inner: Registry::strategy::<T>,
            get: |v| v.as_ref().map(|inner| inner as &dyn Any),
            get_or_insert: |v| v.get_or_insert_with(T::default) as &mut dyn Any,
            clear: |v| *v = None,
        })
    }
}

/// A `Nil` on the wire resets the boxed value to its default.
impl<T: Value> Value for Box<T> {
    fn shape() -> Shape<Self> {
        Shape::Optional(Wrapper {
            inner: Registry::strategy::<T>,
            get: |v| Some(&**v as &dyn Any),
            get_or_insert: |v| &mut **v as &mut dyn Any,
            clear: |v| **v = T::default(),
        })
    }
}

// --- Maps ---
impl<V: Value, S: BuildHasher + Default + 'static> Value for HashMap<String, V, S> {
    fn shape() -> Shape<Self> {
        Shape::Map(MapShape {
            value: Registry::strategy::<V>,
            len: |m| m.len(),
            for_each: |m, f| {
                for (k, v) in m {
                    f(k.as_str(), v as &dyn Any)?;
                }
                Ok(())
            },
            insert: |m, k, f| {
                let mut v = V::default();
                f(&mut v as &mut dyn Any)?;
                m.insert(k, v);
                Ok(())
            },
            clear: |m| m.clear(),
        })
    }
}

impl<V: Value> Value for BTreeMap<String, V> {
    fn shape() -> Shape<Self> {
        Shape::Map(MapShape {
            value: Registry::strategy::<V>,
            len: |m| m.len(),
            for_each: |m, f| {
                for (k, v) in m {
                    f(k.as_str(), v as &dyn Any)?;
                }
                Ok(())
            },
            insert: |m, k, f| {
                let mut v = V::default();
                f(&mut v as &mut dyn Any)?;
                m.insert(k, v);
                Ok(())
            },
            clear: |m| m.clear(),
        })
    }
}

// --- Outside the dispatch table ---
// These are reachable only through the direct entry points of `Encoder`/`Decoder`
// (bool, f64, Vec<u8>, Bytes) or not at all.
macro_rules! impl_unsupported {
    ($($t:ty),*) => {
        $(
            impl Value for $t {
                fn shape() -> Shape<Self> {
                    Shape::Unsupported
                }
            }
        )*
    };
}

impl_unsupported!(bool, f32, f64, char, (), Bytes);

impl<T: Any> Value for Vec<T> {
    fn shape() -> Shape<Self> {
        Shape::Unsupported
    }
}
