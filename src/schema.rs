use crate::registry::{Deferred, Registry, Strategy};
use crate::Value;
use std::any::{type_name, Any};
use std::borrow::Cow;
use std::collections::HashMap;

type Getter = Box<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
type GetterMut = Box<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

/// Records: structs with a fixed, ordered set of named fields.
///
/// Usually implemented with `#[derive(Record)]`, which also implements [`Value`] with
/// [`Shape::Record`](crate::Shape::Record).
pub trait Record: Value {
    /// The fields in wire order. Called once per type and registry; the result is cached.
    fn fields() -> Vec<Field>;
}

/// One field of a record: its wire name and how to reach its value.
pub struct Field {
    name: Cow<'static, str>,
    type_name: &'static str,
    get: Getter,
    get_mut: GetterMut,
    strategy: Deferred,
}

impl Field {
    /// Describes a field of record `R` holding a `F`.
    ///
    /// `get` returns `None` when the value cannot be reached (an absent intermediate
    /// container); such a field is encoded as `Nil`. `get_mut` may allocate intermediate
    /// storage; returning `None` makes decoding that field fail.
    ///
    /// # Example
    /// ```rust
    /// use igbinary::{Field, Record, Shape, Value};
    ///
    /// #[derive(Default)]
    /// struct Point {
    ///     x: i32,
    /// }
    ///
    /// impl Value for Point {
    ///     fn shape() -> Shape<Self> {
    ///         Shape::Record(<Self as Record>::fields)
    ///     }
    /// }
    ///
    /// impl Record for Point {
    ///     fn fields() -> Vec<Field> {
    ///         vec![Field::new::<Self, i32>("x", |p| Some(&p.x), |p| Some(&mut p.x))]
    ///     }
    /// }
    ///
    /// let bytes = igbinary::marshal(&Point { x: 3 }).unwrap();
    /// assert_eq!(&bytes[4..], b"\x14\x01\x11\x01x\x06\x03");
    /// ```
    pub fn new<R: Any, F: Value>(
        name: impl Into<Cow<'static, str>>,
        get: fn(&R) -> Option<&F>,
        get_mut: fn(&mut R) -> Option<&mut F>,
    ) -> Self {
        Field {
            name: name.into(),
            type_name: type_name::<F>(),
            get: getter(move |r| r.downcast_ref::<R>().and_then(get).map(|f| f as &dyn Any)),
            get_mut: getter_mut(move |r| {
                r.downcast_mut::<R>()
                    .and_then(get_mut)
                    .map(|f| f as &mut dyn Any)
            }),
            strategy: Deferred::new(Registry::strategy::<F>),
        }
    }

    /// The wire name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the field's value type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn get<'a>(&self, record: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.get)(record)
    }

    pub(crate) fn get_mut<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.get_mut)(record)
    }

    pub(crate) fn strategy(&self, registry: &Registry) -> &Strategy {
        self.strategy.get(registry)
    }
}

fn getter<G>(g: G) -> Getter
where
    G: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Box::new(g)
}

fn getter_mut<G>(g: G) -> GetterMut
where
    G: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Box::new(g)
}

/// The resolved, immutable field list of a record type with a name index.
pub struct Schema {
    record: &'static str,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema. When two fields share a wire name, lookups find the later one.
    pub fn new(record: &'static str, fields: Vec<Field>) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name().to_string(), i))
            .collect();
        Schema {
            record,
            fields,
            by_name,
        }
    }

    /// Name of the record type.
    pub fn record(&self) -> &'static str {
        self.record
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }
}
