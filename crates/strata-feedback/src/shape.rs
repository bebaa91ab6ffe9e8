use std::rc::Rc;

use rustc_hash::FxHashMap;
use strata_types::{ObjectValue, TypeTag};

/// One field of a shape: name, slot offset, and the type observed when the shape was created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeField {
    pub name: String,
    pub offset: u32,
    pub ty: TypeTag,
}

/// A canonical, immutable description of an object's field-name set.
///
/// Offsets follow the sorted field-name order, not declaration order. Descriptors are shared:
/// `Rc` identity is the cheap "same shape" check a specialized path guards on. A new field set
/// always produces a new descriptor; existing descriptors are never mutated.
#[derive(Debug, PartialEq, Eq)]
pub struct ShapeDescriptor {
    pub fields: Vec<ShapeField>,
}

impl ShapeDescriptor {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.offset)
    }
}

/// Interning cache for shape descriptors, keyed by the joined sorted field-name list.
#[derive(Debug, Default)]
pub struct ShapeCache {
    shapes: FxHashMap<String, Rc<ShapeDescriptor>>,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the descriptor for `obj`'s field-name set.
    ///
    /// Field types are inferred from the first object observed with this field set; later
    /// objects with the same names share the descriptor regardless of their value types.
    pub fn shape_of(&mut self, obj: &ObjectValue) -> Rc<ShapeDescriptor> {
        // 0x1f is not a legal identifier character, so the join cannot collide.
        let key = obj.field_names().collect::<Vec<_>>().join("\u{1f}");
        if let Some(existing) = self.shapes.get(&key) {
            return Rc::clone(existing);
        }

        let fields = obj
            .fields
            .iter()
            .enumerate()
            .map(|(idx, (name, value))| ShapeField {
                name: name.clone(),
                offset: idx as u32,
                ty: value.type_tag(),
            })
            .collect();
        let shape = Rc::new(ShapeDescriptor { fields });
        self.shapes.insert(key, Rc::clone(&shape));
        shape
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::Value;

    #[test]
    fn identical_field_sets_share_one_descriptor() {
        let mut cache = ShapeCache::new();
        let a = ObjectValue::new()
            .with_field("x", Value::Int(1))
            .with_field("y", Value::Int(2));
        // Different insertion order, different value types.
        let b = ObjectValue::new()
            .with_field("y", Value::Str("s".to_string()))
            .with_field("x", Value::Float(0.5));

        let sa = cache.shape_of(&a);
        let sb = cache.shape_of(&b);
        assert!(Rc::ptr_eq(&sa, &sb));
        assert_eq!(cache.len(), 1);

        // Offsets follow sorted name order; types come from the first observation.
        assert_eq!(sa.offset_of("x"), Some(0));
        assert_eq!(sa.offset_of("y"), Some(1));
        assert_eq!(sa.fields[0].ty, TypeTag::Integer);
    }

    #[test]
    fn new_field_set_creates_new_descriptor() {
        let mut cache = ShapeCache::new();
        let a = ObjectValue::new().with_field("x", Value::Int(1));
        let b = ObjectValue::new()
            .with_field("x", Value::Int(1))
            .with_field("z", Value::Int(3));

        let sa = cache.shape_of(&a);
        let sb = cache.shape_of(&b);
        assert!(!Rc::ptr_eq(&sa, &sb));
        assert_eq!(sa.field_count(), 1);
        assert_eq!(sb.field_count(), 2);
        assert_eq!(cache.len(), 2);
    }
}
