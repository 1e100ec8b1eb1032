use glam::{DMat4, DVec3};

/// Axis aligned bounding box.
///
/// A default box is empty (`min > max`); adding the first point makes it a
/// degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: DVec3::INFINITY,
        max: DVec3::NEG_INFINITY,
    };

    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Self {
        let mut bb = Self::EMPTY;
        for p in points {
            bb.add_point(*p);
        }
        bb
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }

    pub fn add_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn center(&self) -> DVec3 { (self.min + self.max) * 0.5 }
    pub fn size(&self) -> DVec3 { self.max - self.min }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box around the eight transformed corners.
    pub fn transform(&self, matrix: &DMat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = [
            DVec3::new(self.min.x, self.min.y, self.min.z),
            DVec3::new(self.min.x, self.min.y, self.max.z),
            DVec3::new(self.min.x, self.max.y, self.min.z),
            DVec3::new(self.min.x, self.max.y, self.max.z),
            DVec3::new(self.max.x, self.min.y, self.min.z),
            DVec3::new(self.max.x, self.min.y, self.max.z),
            DVec3::new(self.max.x, self.max.y, self.min.z),
            DVec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut bb = Self::EMPTY;
        for point in corners {
            bb.add_point(matrix.transform_point3(point));
        }
        bb
    }

    /// Clamps `p` into the box. Points are returned unchanged by an empty box.
    pub fn clip(&self, p: DVec3) -> DVec3 {
        if self.is_empty() {
            return p;
        }
        p.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_a_point_is_added() {
        let mut bb = BoundingBox::default();
        assert!(bb.is_empty());
        bb.add_point(DVec3::new(1.0, 2.0, 3.0));
        assert!(!bb.is_empty());
        assert_eq!(bb.size(), DVec3::ZERO);
    }

    #[test]
    fn transform_of_empty_box_stays_empty() {
        let bb = BoundingBox::EMPTY.transform(&DMat4::from_scale(DVec3::splat(2.0)));
        assert!(bb.is_empty());
    }
}
