use crate::core::error::{Error, Result};
use crate::kdtree::point::Point;

/// Axis-aligned box for rectangular range queries.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    lower_bound: Point,
    upper_bound: Point,
}

impl BoundingBox {
    pub fn new(lower_bound: Point, upper_bound: Point) -> Result<Self> {
        if lower_bound.dimension() != upper_bound.dimension() {
            return Err(Error::invalid_input(format!(
                "bound dimensions differ: {} vs {}",
                lower_bound.dimension(),
                upper_bound.dimension()
            )));
        }
        for axis in 0..lower_bound.dimension() {
            if lower_bound[axis] > upper_bound[axis] {
                return Err(Error::invalid_input(format!(
                    "lower bound exceeds upper bound on axis {}",
                    axis
                )));
            }
        }
        Ok(BoundingBox {
            lower_bound,
            upper_bound,
        })
    }

    pub fn dimension(&self) -> usize {
        self.lower_bound.dimension()
    }

    pub fn lower_bound(&self) -> &Point {
        &self.lower_bound
    }

    pub fn upper_bound(&self) -> &Point {
        &self.upper_bound
    }

    /// Is `point` inside the box (boundaries included)?
    pub fn contains(&self, point: &Point) -> bool {
        if point.dimension() != self.dimension() {
            return false;
        }
        (0..self.dimension())
            .all(|axis| point[axis] >= self.lower_bound[axis] && point[axis] <= self.upper_bound[axis])
    }

    /// Do the two boxes share any volume (touching counts)?
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.dimension() != other.dimension() {
            return false;
        }
        (0..self.dimension()).all(|axis| {
            self.lower_bound[axis] <= other.upper_bound[axis]
                && self.upper_bound[axis] >= other.lower_bound[axis]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn bbox(lower: Vec<f32>, upper: Vec<f32>) -> BoundingBox {
        BoundingBox::new(Point::new(lower), Point::new(upper)).unwrap()
    }

    #[test]
    fn contains_includes_boundaries() {
        let b = bbox(vec![0.0, 0.0], vec![4.0, 4.0]);
        assert!(b.contains(&Point::new(vec![2.0, 2.0])));
        assert!(b.contains(&Point::new(vec![0.0, 4.0])));
        assert!(!b.contains(&Point::new(vec![4.1, 2.0])));
        assert!(!b.contains(&Point::new(vec![2.0])));
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = bbox(vec![0.0, 0.0], vec![4.0, 4.0]);
        let b = bbox(vec![3.0, 3.0], vec![6.0, 6.0]);
        let c = bbox(vec![5.0, 5.0], vec![7.0, 7.0]);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        // Touching edges count as intersecting.
        let d = bbox(vec![4.0, 0.0], vec![5.0, 4.0]);
        assert!(a.intersects(&d));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let err = BoundingBox::new(Point::new(vec![0.0, 5.0]), Point::new(vec![4.0, 4.0]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err =
            BoundingBox::new(Point::new(vec![0.0]), Point::new(vec![4.0, 4.0])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }
}
