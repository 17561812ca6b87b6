//! Dataspace shape resolution.

use serde::Serialize;

use crate::engine::{Engine, SpaceClass};
use crate::handle::{Dataset, Dataspace};
use crate::{Error, Result};

/// Shape class of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeClass {
    /// No elements at all.
    Null,
    /// Exactly one element.
    Scalar,
    /// An N-dimensional array.
    Simple,
}

/// Shape of a dataset at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetShape {
    class: ShapeClass,
    rank: usize,
    extents: Vec<u64>,
    elements: u64,
}

impl DatasetShape {
    pub(crate) fn null() -> Self {
        Self {
            class: ShapeClass::Null,
            rank: 0,
            extents: Vec::new(),
            elements: 0,
        }
    }

    pub(crate) fn scalar() -> Self {
        Self {
            class: ShapeClass::Scalar,
            rank: 0,
            extents: Vec::new(),
            elements: 1,
        }
    }

    /// A simple shape over `extents`, `None` if the element count overflows `u64`.
    ///
    /// No extents at all is read as a single empty dimension.
    pub(crate) fn simple(mut extents: Vec<u64>) -> Option<Self> {
        if extents.is_empty() {
            extents.push(0);
        }
        let elements = element_count(&extents)?;
        Some(Self {
            class: ShapeClass::Simple,
            rank: extents.len(),
            extents,
            elements,
        })
    }

    pub fn class(&self) -> ShapeClass {
        self.class
    }

    /// Number of dimensions: zero unless the class is [`ShapeClass::Simple`].
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Per-dimension extents, slowest-varying first. Empty unless simple.
    pub fn extents(&self) -> &[u64] {
        &self.extents
    }

    /// Total number of elements.
    pub fn element_count(&self) -> u64 {
        self.elements
    }
}

/// Product of `extents`, accumulated from the last dimension to the first.
///
/// An empty extent list has no elements.
fn element_count(extents: &[u64]) -> Option<u64> {
    if extents.is_empty() || extents.contains(&0) {
        return Some(0);
    }
    let total = extents
        .iter()
        .rev()
        .try_fold(1u128, |acc, &extent| acc.checked_mul(u128::from(extent)))?;
    u64::try_from(total).ok()
}

/// Resolve the shape of an open dataset, releasing its dataspace before returning.
pub(crate) fn resolve<E: Engine + ?Sized>(
    engine: &E,
    dataset: &Dataset<'_, E>,
    path: &str,
) -> Result<DatasetShape> {
    let space = dataset.space()?;
    resolve_space(engine, &space, path)
}

pub(crate) fn resolve_space<E: Engine + ?Sized>(
    engine: &E,
    space: &Dataspace<'_, E>,
    path: &str,
) -> Result<DatasetShape> {
    match engine.dataspace_class(space.id())? {
        SpaceClass::Null => Ok(DatasetShape::null()),
        SpaceClass::Scalar => Ok(DatasetShape::scalar()),
        SpaceClass::Simple => {
            // Some engines report rank 0 for a simple dataspace.
            let rank = engine.dataspace_rank(space.id())?.max(1);
            let mut extents = vec![0u64; rank];
            engine.dataspace_extents(space.id(), &mut extents)?;
            log::trace!("{path}: simple dataspace {extents:?}");
            match DatasetShape::simple(extents.clone()) {
                Some(shape) => Ok(shape),
                None => Err(Error::ShapeOverflow {
                    path: path.to_owned(),
                    extents,
                }),
            }
        }
        SpaceClass::Unknown(class) => Err(Error::UnsupportedShape {
            path: path.to_owned(),
            class,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products() {
        assert_eq!(element_count(&[3, 2]), Some(6));
        assert_eq!(element_count(&[7]), Some(7));
        assert_eq!(element_count(&[2, 3, 4, 5]), Some(120));
        assert_eq!(element_count(&[4, 0, 9]), Some(0));
        assert_eq!(element_count(&[]), Some(0));
    }

    #[test]
    fn wide_products() {
        // 2^32 * 2^31 fits in u64 but would overflow a 32-bit accumulator.
        assert_eq!(element_count(&[1 << 32, 1 << 31]), Some(1 << 63));
        assert_eq!(element_count(&[1 << 32, 1 << 32]), None);
        // A zero extent wins over products that would overflow.
        assert_eq!(element_count(&[u64::MAX, u64::MAX, u64::MAX, 0]), Some(0));
    }

    #[test]
    fn constructors() {
        assert_eq!(DatasetShape::null().element_count(), 0);
        assert_eq!(DatasetShape::scalar().element_count(), 1);
        assert_eq!(DatasetShape::scalar().rank(), 0);
        let shape = DatasetShape::simple(vec![3, 2]).unwrap();
        assert_eq!(shape.class(), ShapeClass::Simple);
        assert_eq!(shape.rank(), 2);
        assert_eq!(shape.extents(), &[3, 2]);
        assert_eq!(shape.element_count(), 6);
    }

    #[test]
    fn empty_extents_are_one_empty_dimension() {
        let shape = DatasetShape::simple(Vec::new()).unwrap();
        assert_eq!(shape.class(), ShapeClass::Simple);
        assert_eq!(shape.rank(), 1);
        assert_eq!(shape.extents(), &[0]);
        assert_eq!(shape.element_count(), 0);
    }

    #[test]
    fn overflowing_extents_have_no_shape() {
        assert_eq!(DatasetShape::simple(vec![u64::MAX, 2]), None);
        assert!(DatasetShape::simple(vec![u64::MAX, 1]).is_some());
    }
}
