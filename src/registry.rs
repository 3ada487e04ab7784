//! Strategy resolution and caching.
//!
//! A [`Registry`] maps a type to its [`Strategy`] (the pair of encode/decode functions for that
//! type) and a record type to its [`Schema`]. Both are computed on first use from the type's
//! [`Shape`] and stored by `TypeId`. Resolution is deterministic, so two threads missing the
//! cache at the same time compute equivalent strategies and either may be kept.

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::schema::{Field, Record, Schema};
use crate::value::{MapShape, Shape, Value, Wrapper};
use crate::{code, Error, RecordError, Result};
use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::sync::{Arc, OnceLock};

type EncodeFn = Arc<dyn Fn(&mut Encoder<'_>, &dyn Any) -> Result<()> + Send + Sync>;
type DecodeFn = Arc<dyn Fn(&mut Decoder<'_>, &mut dyn Any) -> Result<()> + Send + Sync>;

/// The resolved encode and decode functions for one type.
///
/// Both functions operate on type-erased values; handing them a value of any other type than
/// the one they were resolved for is reported as an error.
#[derive(Clone)]
pub struct Strategy {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl Strategy {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&mut Encoder<'_>, &dyn Any) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut Decoder<'_>, &mut dyn Any) -> Result<()> + Send + Sync + 'static,
    {
        Strategy {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// A strategy that fails both ways, naming the type.
    pub fn unsupported(type_name: &'static str) -> Self {
        Strategy::new(
            move |_, _| {
                Err(Error::Unsupported {
                    op: "Encode",
                    type_name,
                })
            },
            move |_, _| {
                Err(Error::Unsupported {
                    op: "Decode",
                    type_name,
                })
            },
        )
    }

    pub fn encode(&self, e: &mut Encoder<'_>, value: &dyn Any) -> Result<()> {
        (self.encode)(e, value)
    }

    pub fn decode(&self, d: &mut Decoder<'_>, dst: &mut dyn Any) -> Result<()> {
        (self.decode)(d, dst)
    }
}

/// A strategy resolved on first use and kept afterwards.
///
/// Nested types (wrapped values, map values, record fields) are resolved through this, so a
/// record may contain itself behind an `Option<Box<_>>` without recursing forever.
pub(crate) struct Deferred {
    resolve: fn(&Registry) -> Strategy,
    cell: OnceLock<Strategy>,
}

impl Deferred {
    pub(crate) fn new(resolve: fn(&Registry) -> Strategy) -> Self {
        Deferred {
            resolve,
            cell: OnceLock::new(),
        }
    }

    pub(crate) fn get(&self, registry: &Registry) -> &Strategy {
        self.cell.get_or_init(|| (self.resolve)(registry))
    }
}

/// Cache of strategies and record schemas, keyed by type.
///
/// [`Registry::global`] is shared by every encoder and decoder created without an explicit
/// registry. Build a separate one with [`Registry::new`] to isolate tests.
#[derive(Default)]
pub struct Registry {
    strategies: DashMap<TypeId, Strategy>,
    schemas: DashMap<TypeId, Arc<Schema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Returns the strategy for `T`, resolving and caching it on first use.
    pub fn strategy<T: Value>(&self) -> Strategy {
        let id = TypeId::of::<T>();
        if let Some(strategy) = self.strategies.get(&id) {
            return strategy.clone();
        }
        let strategy = self.resolve::<T>();
        self.strategies.insert(id, strategy.clone());
        strategy
    }

    /// Returns the schema of record `T`, resolving and caching it on first use.
    pub fn schema<T: Record>(&self) -> Arc<Schema> {
        self.schema_with::<T>(T::fields)
    }

    fn schema_with<T: Value>(&self, fields: fn() -> Vec<Field>) -> Arc<Schema> {
        let id = TypeId::of::<T>();
        if let Some(schema) = self.schemas.get(&id) {
            return Arc::clone(&schema);
        }
        tracing::trace!(record = type_name::<T>(), "resolving igbinary record schema");
        let schema = Arc::new(Schema::new(type_name::<T>(), fields()));
        self.schemas.insert(id, Arc::clone(&schema));
        schema
    }

    /// True if a strategy for `T` has been resolved.
    pub fn contains<T: Value>(&self) -> bool {
        self.strategies.contains_key(&TypeId::of::<T>())
    }

    /// Number of resolved strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    fn resolve<T: Value>(&self) -> Strategy {
        tracing::trace!(ty = type_name::<T>(), "resolving igbinary strategy");
        match T::shape() {
            Shape::Signed {
                limit,
                widen,
                narrow,
            } => Strategy::new(
                move |e, v| e.encode_int(widen(downcast::<T>(v)?)),
                move |d, v| {
                    let dst = downcast_mut::<T>(v)?;
                    *dst = narrow(d.decode_signed(limit)?);
                    Ok(())
                },
            ),
            Shape::Unsigned {
                limit,
                widen,
                narrow,
            } => Strategy::new(
                move |e, v| e.encode_uint(widen(downcast::<T>(v)?)),
                move |d, v| {
                    let dst = downcast_mut::<T>(v)?;
                    *dst = narrow(d.decode_unsigned(limit)?);
                    Ok(())
                },
            ),
            Shape::Str {
                as_str,
                from_string,
            } => Strategy::new(
                move |e, v| e.encode_str(as_str(downcast::<T>(v)?)),
                move |d, v| {
                    let dst = downcast_mut::<T>(v)?;
                    *dst = from_string(d.decode_string()?);
                    Ok(())
                },
            ),
            Shape::Optional(wrapper) => optional::<T>(wrapper),
            Shape::Map(map) => map_strategy::<T>(map),
            Shape::Record(fields) => record::<T>(self.schema_with::<T>(fields)),
            Shape::Unsupported => Strategy::unsupported(type_name::<T>()),
        }
    }
}

fn downcast<T: Any>(v: &dyn Any) -> Result<&T> {
    v.downcast_ref::<T>()
        .ok_or_else(|| Error::Encode(format!("value is not a {}", type_name::<T>())))
}

fn downcast_mut<T: Any>(v: &mut dyn Any) -> Result<&mut T> {
    v.downcast_mut::<T>()
        .ok_or_else(|| Error::Decode(format!("destination is not a {}", type_name::<T>())))
}

fn optional<T: Value>(wrapper: Wrapper<T>) -> Strategy {
    let Wrapper {
        inner,
        get,
        get_or_insert,
        clear,
    } = wrapper;
    let inner = Arc::new(Deferred::new(inner));
    let encode_inner = Arc::clone(&inner);
    Strategy::new(
        move |e, v| match get(downcast::<T>(v)?) {
            Some(value) => encode_inner.get(e.registry()).encode(e, value),
            None => e.encode_nil(),
        },
        move |d, v| {
            let dst = downcast_mut::<T>(v)?;
            if d.peek_code()? == code::NIL {
                d.read_code()?;
                clear(dst);
                return Ok(());
            }
            inner.get(d.registry()).decode(d, get_or_insert(dst))
        },
    )
}

fn map_strategy<T: Value>(map: MapShape<T>) -> Strategy {
    let MapShape {
        value,
        len,
        for_each,
        insert,
        clear,
    } = map;
    let values = Arc::new(Deferred::new(value));
    let encode_values = Arc::clone(&values);
    Strategy::new(
        move |e, v| {
            let m = downcast::<T>(v)?;
            e.encode_array_len(len(m))?;
            let strategy = encode_values.get(e.registry());
            for_each(m, &mut |key, value| {
                e.encode_str(key)?;
                strategy.encode(e, value)
            })
        },
        move |d, v| {
            let m = downcast_mut::<T>(v)?;
            let Some(n) = d.decode_array_len()? else {
                clear(m);
                return Ok(());
            };
            let strategy = values.get(d.registry());
            for _ in 0..n {
                let key = d.decode_string()?;
                insert(m, key, &mut |slot| strategy.decode(d, slot))?;
            }
            Ok(())
        },
    )
}

fn record<T: Value>(schema: Arc<Schema>) -> Strategy {
    let encode_schema = Arc::clone(&schema);
    Strategy::new(
        move |e, v| {
            downcast::<T>(v)?;
            let fields = encode_schema.fields();
            e.encode_array_len(fields.len())?;
            for field in fields {
                e.encode_str(field.name())?;
                match field.get(v) {
                    Some(value) => field.strategy(e.registry()).encode(e, value)?,
                    None => e.encode_nil()?,
                }
            }
            Ok(())
        },
        move |d, v| {
            let Some(n) = d.decode_array_len()? else {
                *downcast_mut::<T>(v)? = T::default();
                return Ok(());
            };
            downcast_mut::<T>(v)?;
            for _ in 0..n {
                let name = d.decode_string()?;
                match schema.field(&name) {
                    Some(field) => {
                        let slot = field.get_mut(v).ok_or_else(|| RecordError::UnreachableField {
                            field: name.clone(),
                            record: schema.record(),
                        })?;
                        field.strategy(d.registry()).decode(d, slot)?;
                    }
                    None if d.disallows_unknown_fields() => {
                        return Err(RecordError::UnknownField {
                            field: name,
                            record: schema.record(),
                        }
                        .into());
                    }
                    None => {
                        tracing::debug!(
                            field = %name,
                            record = schema.record(),
                            "skipping unknown igbinary field"
                        );
                        d.skip()?;
                    }
                }
            }
            Ok(())
        },
    )
}
