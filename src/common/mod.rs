// Copyright (C) 2016, Visual Information Processing and Learning (VIPL) group,
// Institute of Computing Technology, Chinese Academy of Sciences, Beijing, China.
//
// As an open-source face recognition engine: you can redistribute SeetaFace source codes
// and/or modify it under the terms of the BSD 2-Clause License.
//
// You should have received a copy of the BSD 2-Clause License along with the software.
// If not, see < https://opensource.org/licenses/BSD-2-Clause>.

mod image_data;

use std::mem;

use num::Num;

pub use self::image_data::ImageData;

/// Axis-aligned rectangle given by its left, top, right and bottom edges.
///
/// The right and bottom edges are exclusive, so the area is
/// `(right - left) * (bottom - top)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect<T> {
    l: T,
    t: T,
    r: T,
    b: T,
}

impl<T> Rect<T>
where
    T: Copy + PartialOrd + Num,
{
    pub fn new(l: T, t: T, r: T, b: T) -> Self {
        Rect { l, t, r, b }
    }

    /// Rectangle with its top-left corner at `(x, y)`.
    pub fn at(x: T, y: T, width: T, height: T) -> Self {
        Rect::new(x, y, x + width, y + height)
    }

    #[inline]
    pub fn left(&self) -> T {
        self.l
    }

    #[inline]
    pub fn top(&self) -> T {
        self.t
    }

    #[inline]
    pub fn right(&self) -> T {
        self.r
    }

    #[inline]
    pub fn bottom(&self) -> T {
        self.b
    }

    #[inline]
    pub fn width(&self) -> T {
        self.r - self.l
    }

    #[inline]
    pub fn height(&self) -> T {
        self.b - self.t
    }

    #[inline]
    pub fn area(&self) -> T {
        self.width() * self.height()
    }

    /// Whether both dimensions are strictly positive.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.l < self.r && self.t < self.b
    }

    pub fn intersection(&self, other: &Rect<T>) -> Option<Rect<T>> {
        let l = max(self.l, other.l);
        let r = min(self.r, other.r);
        if l >= r {
            return None;
        }

        let t = max(self.t, other.t);
        let b = min(self.b, other.b);
        if t >= b {
            return None;
        }

        Some(Rect::new(l, t, r, b))
    }

    pub fn contains(&self, other: &Rect<T>) -> bool {
        other.l >= self.l && other.r <= self.r && other.t >= self.t && other.b <= self.b
    }

    /// Clips the rectangle to `bounds`; the result may be empty.
    pub fn clip(&self, bounds: &Rect<T>) -> Rect<T> {
        Rect::new(
            min(max(self.l, bounds.l), bounds.r),
            min(max(self.t, bounds.t), bounds.b),
            max(min(self.r, bounds.r), bounds.l),
            max(min(self.b, bounds.b), bounds.t),
        )
    }
}

#[inline]
fn max<T: PartialOrd>(a: T, b: T) -> T {
    if a > b {
        a
    } else {
        b
    }
}

#[inline]
fn min<T: PartialOrd>(a: T, b: T) -> T {
    if a < b {
        a
    } else {
        b
    }
}

pub struct Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    generator: G,
    next: T,
}

impl<T, G> Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    pub fn new(first_element: T, generator: G) -> Self {
        Seq {
            generator,
            next: first_element,
        }
    }
}

impl<T, G> Iterator for Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let next = (self.generator)(&self.next);
        let current = mem::replace(&mut self.next, next);
        Some(current)
    }
}

/// Positions `first, first + step, ...` strictly below `end`.
pub fn stepped(first: i32, end: i32, step: i32) -> impl Iterator<Item = i32> {
    Seq::new(first, move |n| n + step).take_while(move |n| *n < end)
}
