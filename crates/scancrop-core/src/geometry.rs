//! Coordinate mapping between the downscaled preview and the full-resolution page
//!
//! Every rectangle carries its coordinate space in its type: `Rect<Preview>` is measured on the
//! image shown to the operator, `Rect<Original>` on the rasterized page. The only way to move a
//! rectangle between spaces is through [`to_preview`] / [`to_original`].
//!
//! The scale is an exact rational (`original = preview / scale`), so mapping is integer
//! arithmetic truncated toward zero. Mapping loses up to a few pixels per field, which is why a
//! selection is only ever mapped preview -> original once and never round-tripped.

use crate::error::ScanCropError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Pixel coordinates on the preview shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Preview;

/// Pixel coordinates on the full-resolution rasterized page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Original;

/// A point in preview space (pointer position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle tagged with its coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect<S> {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    space: PhantomData<S>,
}

pub type PreviewRect = Rect<Preview>;
pub type OriginalRect = Rect<Original>;

impl<S> Rect<S> {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    /// Zero-size rectangle anchored at `point`
    pub const fn at(point: Point) -> Self {
        Self::new(point.x, point.y, 0, 0)
    }

    /// Box spanned by two corners, in either order
    pub fn spanning(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            a.x.abs_diff(b.x),
            a.y.abs_diff(b.y),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// True when the rectangle lies entirely inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }
}

impl<S> fmt::Display for Rect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Rational in `(0, 1]` relating preview space to original space
///
/// `preview = original * num / den`. The default matches a half-size preview. A preview is never
/// larger than the page it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ScaleRepr", into = "String")]
pub struct ScaleFactor {
    num: u32,
    den: u32,
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self { num: 1, den: 2 }
    }
}

impl ScaleFactor {
    pub fn new(num: u32, den: u32) -> Result<Self, ScanCropError> {
        if num == 0 || den == 0 || num > den {
            return Err(ScanCropError::InvalidScale(format!("{}/{}", num, den)));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    pub fn numerator(&self) -> u32 {
        self.num
    }

    pub fn denominator(&self) -> u32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// original -> preview for a single length or offset
    pub fn scale_down(&self, value: u32) -> u32 {
        saturate(value as u64 * self.num as u64 / self.den as u64)
    }

    /// preview -> original for a single length or offset
    pub fn scale_up(&self, value: u32) -> u32 {
        saturate(value as u64 * self.den as u64 / self.num as u64)
    }

    /// Worst-case per-field difference between `r` and `to_original(to_preview(r))`
    ///
    /// Equals `ceil((den - 1) / num)`, which never exceeds `floor(1/s)` when the scale is the
    /// reciprocal of an integer.
    pub fn round_trip_tolerance(&self) -> u32 {
        (self.den - 1 + self.num - 1) / self.num
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for ScaleFactor {
    type Err = ScanCropError;

    /// Accepts `"1/2"` or a decimal such as `"0.5"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ScanCropError::InvalidScale(s.to_string());

        if let Some((num, den)) = s.split_once('/') {
            let num: u32 = num.trim().parse().map_err(|_| invalid())?;
            let den: u32 = den.trim().parse().map_err(|_| invalid())?;
            return Self::new(num, den).map_err(|_| invalid());
        }

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if (whole.is_empty() && frac.is_empty())
            || frac.len() > 9
            || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let den = 10u64.pow(frac.len() as u32);
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| invalid())?
        };
        let num = whole
            .checked_mul(den)
            .and_then(|n| n.checked_add(frac))
            .ok_or_else(invalid)?;

        let g = gcd_u64(num, den);
        let (num, den) = if g == 0 { (num, den) } else { (num / g, den / g) };
        let num = u32::try_from(num).map_err(|_| invalid())?;
        let den = u32::try_from(den).map_err(|_| invalid())?;
        Self::new(num, den).map_err(|_| invalid())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<ScaleRepr> for ScaleFactor {
    type Error = ScanCropError;

    fn try_from(value: ScaleRepr) -> Result<Self, Self::Error> {
        match value {
            ScaleRepr::Number(n) => n.to_string().parse(),
            ScaleRepr::Text(s) => s.parse(),
        }
    }
}

impl From<ScaleFactor> for String {
    fn from(value: ScaleFactor) -> Self {
        value.to_string()
    }
}

/// Map an original-space rectangle onto the preview (each field scaled, truncated)
pub fn to_preview(rect: OriginalRect, scale: ScaleFactor) -> PreviewRect {
    Rect::new(
        scale.scale_down(rect.x),
        scale.scale_down(rect.y),
        scale.scale_down(rect.width),
        scale.scale_down(rect.height),
    )
}

/// Map a preview-space rectangle back to the full-resolution page (each field divided, truncated)
pub fn to_original(rect: PreviewRect, scale: ScaleFactor) -> OriginalRect {
    Rect::new(
        scale.scale_up(rect.x),
        scale.scale_up(rect.y),
        scale.scale_up(rect.width),
        scale.scale_up(rect.height),
    )
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
