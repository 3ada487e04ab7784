#[cfg(feature = "indexmap")]
use indexmap::IndexMap;
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;

#[allow(unused_imports)]
use crate::*;

// --- IndexMap ---
/// Entries are encoded in insertion order and decoded entries keep stream order.
#[cfg(feature = "indexmap")]
impl<V, S> Value for IndexMap<String, V, S>
where
    V: Value,
    S: std::hash::BuildHasher + Default + 'static,
{
    fn shape() -> Shape<Self> {
        Shape::Map(MapShape {
            value: Registry::strategy::<V>,
            len: |m| m.len(),
            for_each: |m, f| {
                for (k, v) in m {
                    f(k.as_str(), v as &dyn std::any::Any)?;
                }
                Ok(())
            },
            insert: |m, k, f| {
                let mut v = V::default();
                f(&mut v as &mut dyn std::any::Any)?;
                m.insert(k, v);
                Ok(())
            },
            clear: |m| m.clear(),
        })
    }
}

// --- SmolStr ---
#[cfg(feature = "smol_str")]
impl Value for SmolStr {
    fn shape() -> Shape<Self> {
        Shape::Str {
            as_str: |s| s.as_str(),
            from_string: |s| SmolStr::from(s),
        }
    }
}
