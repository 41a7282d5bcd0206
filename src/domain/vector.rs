// Board geometry: sizes, positions and spawn grid sizing.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// A 2D value used for board sizes (`Vector<u32>`) and tank positions (`Vector<f64>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vector<T> {
    pub x: T,
    pub y: T,
}

impl<T> Vector<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Mul<Output = T> + Copy> Vector<T> {
    /// Componentwise product with a scalar.
    pub fn scale(self, k: T) -> Self {
        Self {
            x: self.x * k,
            y: self.y * k,
        }
    }
}

impl<T: Add<Output = T>> Add for Vector<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Vector<u32> {
    /// Number of cells covered by a size vector.
    pub fn area(self) -> u64 {
        u64::from(self.x) * u64::from(self.y)
    }

    /// True when a continuous position falls inside a board of this size.
    pub fn contains(self, position: Vector<f64>) -> bool {
        (0.0..f64::from(self.x)).contains(&position.x)
            && (0.0..f64::from(self.y)).contains(&position.y)
    }
}

impl From<Vector<u32>> for Vector<f64> {
    fn from(v: Vector<u32>) -> Self {
        Self {
            x: f64::from(v.x),
            y: f64::from(v.y),
        }
    }
}

/// Returns the most square grid (`n x n` or `n x (n - 1)`) with at least `area` cells.
///
/// Callers must pass `area >= 1`; an empty area yields a `0 x 0` grid.
pub fn boxiest_box(area: u32) -> Vector<u32> {
    if area == 0 {
        return Vector::new(0, 0);
    }

    let mut n = (f64::from(area)).sqrt().ceil() as u32;
    // Float rounding can land one off for large areas.
    while u64::from(n) * u64::from(n) < u64::from(area) {
        n += 1;
    }
    while n > 1 && u64::from(n - 1) * u64::from(n - 1) >= u64::from(area) {
        n -= 1;
    }

    if u64::from(n) * u64::from(n - 1) >= u64::from(area) {
        Vector::new(n, n - 1)
    } else {
        Vector::new(n, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxiest_box_matches_known_sizes() {
        let cases = [
            (1, (1, 1)),
            (2, (2, 1)),
            (3, (2, 2)),
            (4, (2, 2)),
            (5, (3, 2)),
            (6, (3, 2)),
            (7, (3, 3)),
            (9, (3, 3)),
            (10, (4, 3)),
            (13, (4, 4)),
        ];
        for (area, (x, y)) in cases {
            assert_eq!(boxiest_box(area), Vector::new(x, y), "area {area}");
        }
    }

    #[test]
    fn boxiest_box_always_covers_area() {
        for area in 1..=2_000u32 {
            let size = boxiest_box(area);
            assert!(size.area() >= u64::from(area), "area {area} -> {size:?}");
            assert!(size.x == size.y || size.x == size.y + 1);
        }
    }

    #[test]
    fn scale_and_add_are_componentwise() {
        let grid = Vector::new(2u32, 3);
        assert_eq!(grid.scale(5), Vector::new(10, 15));
        assert_eq!(Vector::new(1.5, 2.0) + Vector::new(0.5, 1.0), Vector::new(2.0, 3.0));
    }

    #[test]
    fn contains_is_half_open() {
        let board = Vector::new(10u32, 5);
        assert!(board.contains(Vector::new(0.0, 0.0)));
        assert!(board.contains(Vector::new(9.99, 4.99)));
        assert!(!board.contains(Vector::new(10.0, 1.0)));
        assert!(!board.contains(Vector::new(1.0, -0.1)));
    }
}
