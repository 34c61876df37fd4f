
//! Simple math utilities.

use std::convert::TryFrom;
use crate::error::{Error, Result};

/// Simple two-dimensional vector of any numerical type.
/// Supports only few mathematical operations
/// as this is used mainly as data struct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vec2<T> (pub T, pub T);

impl<T> Vec2<T> {

    /// Maps all components of this vector to a new type, yielding a vector of that new type.
    pub fn map<B>(self, map: impl Fn(T) -> B) -> Vec2<B> {
        Vec2(map(self.0), map(self.1))
    }

    /// Seeing this vector as a dimension or size (width and height),
    /// this returns the area that this dimensions contains (`width * height`).
    pub fn area(self) -> T where T: std::ops::Mul<T, Output = T> {
        self.0 * self.1
    }

    /// The first component of this 2D vector.
    pub fn x(self) -> T { self.0 }

    /// The second component of this 2D vector.
    pub fn y(self) -> T { self.1 }

    /// The first component of this 2D vector.
    pub fn width(self) -> T { self.0 }

    /// The second component of this 2D vector.
    pub fn height(self) -> T { self.1 }
}

impl<T: std::ops::Add<T>> std::ops::Add<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn add(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 + other.0, self.1 + other.1)
    }
}

impl<T: std::ops::Sub<T>> std::ops::Sub<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn sub(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 - other.0, self.1 - other.1)
    }
}

impl<T: std::ops::Mul<T>> std::ops::Mul<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn mul(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 * other.0, self.1 * other.1)
    }
}

impl<T> From<(T, T)> for Vec2<T> {
    fn from((x, y): (T, T)) -> Self { Vec2(x, y) }
}

impl<T> From<Vec2<T>> for (T, T) {
    fn from(vec2: Vec2<T>) -> Self { (vec2.0, vec2.1) }
}


/// An axis-aligned pixel rectangle.
/// The wire format stores each component as `u16`,
/// all arithmetic here happens in `usize` so that translation cannot overflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {

    /// The top left corner.
    pub position: Vec2<usize>,

    /// Width and height. A rectangle with zero area is empty.
    pub size: Vec2<usize>,
}

impl Rect {

    /// Create a rectangle from its top left corner and size.
    pub fn new(position: impl Into<Vec2<usize>>, size: impl Into<Vec2<usize>>) -> Self {
        Rect { position: position.into(), size: size.into() }
    }

    /// A rectangle at the origin.
    pub fn from_dimensions(size: impl Into<Vec2<usize>>) -> Self {
        Self::new(Vec2(0, 0), size)
    }

    /// The exclusive bottom right corner.
    pub fn end(self) -> Vec2<usize> {
        self.position + self.size
    }

    /// Whether this rectangle contains no pixels.
    pub fn is_empty(self) -> bool {
        self.size.0 == 0 || self.size.1 == 0
    }

    /// Moves the rectangle by the specified offset.
    pub fn translated(self, offset: Vec2<usize>) -> Self {
        Rect { position: self.position + offset, size: self.size }
    }

    /// The common area of both rectangles, or `None` if they do not overlap.
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let start = Vec2(self.position.0.max(other.position.0), self.position.1.max(other.position.1));
        let end = Vec2(self.end().0.min(other.end().0), self.end().1.min(other.end().1));

        if start.0 < end.0 && start.1 < end.1 {
            Some(Rect { position: start, size: end - start })
        }
        else {
            None
        }
    }

    /// Whether the other rectangle lies completely inside this rectangle.
    pub fn contains(self, other: Rect) -> bool {
        other.position.0 >= self.position.0 && other.position.1 >= self.position.1
            && other.end().0 <= self.end().0 && other.end().1 <= self.end().1
    }

    /// The rectangle as stored on the wire: `x, y, width, height`.
    pub fn to_u16(self) -> Result<[u16; 4]> {
        let component = |value: usize| u16::try_from(value)
            .map_err(|_| Error::unsupported("rectangle exceeds 65535 pixels"));

        Ok([
            component(self.position.0)?, component(self.position.1)?,
            component(self.size.0)?, component(self.size.1)?,
        ])
    }

    /// The rectangle as loaded from the wire: `x, y, width, height`.
    pub fn from_u16([x, y, width, height]: [u16; 4]) -> Self {
        Rect::new(
            Vec2(usize::from(x), usize::from(y)),
            Vec2(usize::from(width), usize::from(height))
        )
    }
}


/// Round up or down in specific calculations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RoundingMode {

    /// Round down.
    Down,

    /// Round up.
    Up,
}

impl RoundingMode {
    pub(crate) fn divide(self, dividend: usize, divisor: usize) -> usize {
        match self {
            RoundingMode::Up => (dividend + divisor - 1) / divisor, // only works for positive numbers
            RoundingMode::Down => dividend / divisor,
        }
    }
}
