use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    pub struct AtomId;
}

/// Numeric handle of a model, unique within its viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

/// Numeric handle of a surface, unique within its viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

macro_rules! impl_display {
    ($($ty:ident => $prefix:literal),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!($prefix, "#{}"), self.0)
                }
            }
        )*
    };
}

impl_display! {
    ModelId => "model",
    SurfaceId => "surface",
    LabelId => "label",
    ShapeId => "shape",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_display_with_kind_prefix() {
        assert_eq!(ModelId(3).to_string(), "model#3");
        assert_eq!(SurfaceId(0).to_string(), "surface#0");
        assert_eq!(LabelId(7).to_string(), "label#7");
        assert_eq!(ShapeId(12).to_string(), "shape#12");
    }

    #[test]
    fn model_ids_order_by_value() {
        assert!(ModelId(1) < ModelId(2));
    }
}
