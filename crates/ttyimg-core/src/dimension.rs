#![forbid(unsafe_code)]

//! User size specifications.
//!
//! A [`Dimension`] is what the user typed for `--width` or `--height`:
//! a signed integer with an optional unit suffix.
//!
//! | Text | Unit | Resolves to |
//! |------|------|-------------|
//! | `640`, `640px` | [`Unit::Pixel`] | the value itself |
//! | `40c` | [`Unit::Cell`] | `(axis px / axis cells) * 40` |
//! | `80%` | [`Unit::Percent`] | `round(axis px * 80 / 100)` |
//!
//! Suffixes are case-insensitive. A value of zero resolves to zero whatever
//! the unit, which downstream means "keep the image's own size".

use std::fmt;

use crate::error::DimensionError;
use crate::geometry::ScreenSize;

/// Screen axis a dimension is measured along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Pixel,
    Cell,
    Percent,
}

impl Unit {
    /// Canonical suffix, as printed by [`Dimension`]'s `Display`.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Pixel => "px",
            Self::Cell => "c",
            Self::Percent => "%",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        if suffix.is_empty() || suffix.eq_ignore_ascii_case("px") {
            Some(Self::Pixel)
        } else if suffix.eq_ignore_ascii_case("c") {
            Some(Self::Cell)
        } else if suffix == "%" {
            Some(Self::Percent)
        } else {
            None
        }
    }
}

/// A parsed size: value, unit and the axis it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub value: i32,
    pub unit: Unit,
    pub axis: Axis,
}

impl Dimension {
    #[must_use]
    pub const fn new(value: i32, unit: Unit, axis: Axis) -> Self {
        Self { value, unit, axis }
    }

    /// Parse `[+-]digits[px|c|%]`.
    ///
    /// Only pixel and cell sizes may be negative.
    ///
    /// # Errors
    ///
    /// [`DimensionError::InvalidFormat`] for anything else, including
    /// surrounding whitespace, negative percentages and values that
    /// overflow `i32`.
    pub fn parse(text: &str, axis: Axis) -> Result<Self, DimensionError> {
        let invalid = || DimensionError::InvalidFormat(text.to_owned());

        let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
        let digits_len = unsigned
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits_len == 0 {
            return Err(invalid());
        }

        let number_len = text.len() - unsigned.len() + digits_len;
        let (number, suffix) = text.split_at(number_len);
        let unit = Unit::from_suffix(suffix).ok_or_else(invalid)?;
        let value = number.parse::<i32>().map_err(|_| invalid())?;
        if unit == Unit::Percent && value < 0 {
            return Err(invalid());
        }

        Ok(Self { value, unit, axis })
    }

    /// Absolute pixels on `screen` along this dimension's axis.
    ///
    /// Never divides by zero: a screen with no known cell count resolves
    /// cell units to 0.
    #[must_use]
    pub fn resolve(&self, screen: &ScreenSize) -> i64 {
        if self.value == 0 {
            return 0;
        }
        let value = i64::from(self.value);
        let pixels = screen.pixels(self.axis);
        match self.unit {
            Unit::Pixel => value,
            Unit::Cell => screen
                .cell_pixels(self.axis)
                .map_or(0, |per_cell| i64::from(per_cell) * value),
            Unit::Percent => (f64::from(pixels) * f64::from(self.value) / 100.0).round() as i64,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}
