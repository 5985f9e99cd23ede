//! Color ramps and class colors.
//!
//! Ramps are sequences of sRGB stops. Class colors are sampled at evenly
//! spaced positions and interpolated channel-wise in sRGB, rounding to the
//! nearest 8-bit value, so the same ramp and class count always yield the
//! same colors.

use crate::{traits::Lerp, MapError, Result};
use serde::{Deserialize, Serialize};

/// 8-bit sRGB color, serialized as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || MapError::Parse(format!("invalid color \"{}\"", hex));
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn mix(self, other: Color, t: f64) -> Color {
        Color::rgb(self.r.lerp(&other.r, t), self.g.lerp(&other.g, t), self.b.lerp(&other.b, t))
    }
}

impl TryFrom<String> for Color {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Closed ramp catalog plus a custom two-stop gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum ColorRamp {
    Blues,
    Greens,
    Reds,
    Oranges,
    Purples,
    Viridis,
    Spectral,
    Custom { start: Color, end: Color },
}

const BLUES: &[Color] = &[
    Color::rgb(0xef, 0xf3, 0xff),
    Color::rgb(0xbd, 0xd7, 0xe7),
    Color::rgb(0x6b, 0xae, 0xd6),
    Color::rgb(0x31, 0x82, 0xbd),
    Color::rgb(0x08, 0x51, 0x9c),
];
const GREENS: &[Color] = &[
    Color::rgb(0xed, 0xf8, 0xe9),
    Color::rgb(0xba, 0xe4, 0xb3),
    Color::rgb(0x74, 0xc4, 0x76),
    Color::rgb(0x31, 0xa3, 0x54),
    Color::rgb(0x00, 0x6d, 0x2c),
];
const REDS: &[Color] = &[
    Color::rgb(0xfe, 0xe5, 0xd9),
    Color::rgb(0xfc, 0xae, 0x91),
    Color::rgb(0xfb, 0x6a, 0x4a),
    Color::rgb(0xde, 0x2d, 0x26),
    Color::rgb(0xa5, 0x0f, 0x15),
];
const ORANGES: &[Color] = &[
    Color::rgb(0xfe, 0xed, 0xde),
    Color::rgb(0xfd, 0xbe, 0x85),
    Color::rgb(0xfd, 0x8d, 0x3c),
    Color::rgb(0xe6, 0x55, 0x0d),
    Color::rgb(0xa6, 0x36, 0x03),
];
const PURPLES: &[Color] = &[
    Color::rgb(0xf2, 0xf0, 0xf7),
    Color::rgb(0xcb, 0xc9, 0xe2),
    Color::rgb(0x9e, 0x9a, 0xc8),
    Color::rgb(0x75, 0x6b, 0xb1),
    Color::rgb(0x54, 0x27, 0x8f),
];
const VIRIDIS: &[Color] = &[
    Color::rgb(0x44, 0x01, 0x54),
    Color::rgb(0x3b, 0x52, 0x8b),
    Color::rgb(0x21, 0x90, 0x8c),
    Color::rgb(0x5d, 0xc8, 0x63),
    Color::rgb(0xfd, 0xe7, 0x25),
];
const SPECTRAL: &[Color] = &[
    Color::rgb(0xd7, 0x19, 0x1c),
    Color::rgb(0xfd, 0xae, 0x61),
    Color::rgb(0xff, 0xff, 0xbf),
    Color::rgb(0xab, 0xdd, 0xa4),
    Color::rgb(0x2b, 0x83, 0xba),
];

impl ColorRamp {
    pub const CATALOG: [ColorRamp; 7] = [
        ColorRamp::Blues,
        ColorRamp::Greens,
        ColorRamp::Reds,
        ColorRamp::Oranges,
        ColorRamp::Purples,
        ColorRamp::Viridis,
        ColorRamp::Spectral,
    ];

    fn stops(&self) -> Vec<Color> {
        match self {
            ColorRamp::Blues => BLUES.to_vec(),
            ColorRamp::Greens => GREENS.to_vec(),
            ColorRamp::Reds => REDS.to_vec(),
            ColorRamp::Oranges => ORANGES.to_vec(),
            ColorRamp::Purples => PURPLES.to_vec(),
            ColorRamp::Viridis => VIRIDIS.to_vec(),
            ColorRamp::Spectral => SPECTRAL.to_vec(),
            ColorRamp::Custom { start, end } => vec![*start, *end],
        }
    }

    /// Color at position `t` in `[0, 1]` along the ramp
    pub fn sample(&self, t: f64) -> Color {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (stops.len() - 1) as f64;
        let segment = (scaled.floor() as usize).min(stops.len() - 2);
        stops[segment].mix(stops[segment + 1], scaled - segment as f64)
    }

    /// `k` evenly spaced colors from the first stop to the last.
    /// A single class gets the darkest (last) stop.
    pub fn colors(&self, k: usize) -> Vec<Color> {
        match k {
            0 => Vec::new(),
            1 => vec![self.sample(1.0)],
            _ => (0..k).map(|i| self.sample(i as f64 / (k - 1) as f64)).collect(),
        }
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        ColorRamp::Blues
    }
}
