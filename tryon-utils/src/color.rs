//! Basic color utilities shared by the view compositor and the CLI.

use std::{fmt, str::FromStr};

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Simple RGBA color stored in 8-bit channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RgbaColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl RgbaColor {
    pub const WHITE: RgbaColor = RgbaColor::opaque(255, 255, 255);
    pub const BLACK: RgbaColor = RgbaColor::opaque(0, 0, 0);

    /// Constructs an opaque RGB color.
    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 255,
        }
    }

    /// Returns the same color with its alpha forced to 255.
    pub const fn to_opaque(self) -> Self {
        Self::opaque(self.red, self.green, self.blue)
    }

    pub const fn to_pixel(self) -> Rgba<u8> {
        Rgba([self.red, self.green, self.blue, self.alpha])
    }

    /// Perceived luma (BT.601 weights), 0-255.
    pub fn luma(self) -> f32 {
        0.299 * f32::from(self.red) + 0.587 * f32::from(self.green) + 0.114 * f32::from(self.blue)
    }
}

impl Default for RgbaColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<RgbaColor> for Rgba<u8> {
    fn from(color: RgbaColor) -> Self {
        color.to_pixel()
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02X}{:02X}{:02X}{:02X}",
            self.red, self.green, self.blue, self.alpha
        )
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
impl FromStr for RgbaColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "invalid color '{s}'; expected #RRGGBB or #RRGGBBAA"
            ));
        }
        let channel = |idx: usize| {
            u8::from_str_radix(&hex[idx..idx + 2], 16).map_err(|err| err.to_string())
        };
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self {
            red: channel(0)?,
            green: channel(2)?,
            blue: channel(4)?,
            alpha,
        })
    }
}
