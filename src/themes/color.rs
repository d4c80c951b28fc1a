use std::fmt;

use crate::error::{Error, OcraResult};

/// RGBA color with 8-bit components
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

fn parse_hex_component(hex: &str, original: &str) -> OcraResult<u8> {
    u8::from_str_radix(hex, 16).map_err(|_| Error::InvalidHexColor {
        value: original.to_string(),
        reason: format!("invalid hex component '{}'", hex),
    })
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Outputs the hex value for that colour.
    #[inline]
    pub fn as_hex(&self) -> String {
        if self.a < 255 {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        } else {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        }
    }

    /// Perceived brightness between 0 and 255, used to guess whether a theme is light or dark
    pub fn luminance(&self) -> u8 {
        ((299 * self.r as u32 + 587 * self.g as u32 + 114 * self.b as u32) / 1000) as u8
    }

    /// Creates a Color from a string (in theory a hex but it can also be black/white).
    ///
    /// Errors if the string is not a valid hex colour.
    pub fn from_hex(hex: &str) -> OcraResult<Self> {
        let original = hex;
        let hex = hex.trim().trim_start_matches('#');

        if hex == "white" {
            return Ok(Color::WHITE);
        } else if hex == "black" {
            return Ok(Color::BLACK);
        }
        if !hex.is_ascii() {
            return Err(Error::InvalidHexColor {
                value: original.to_string(),
                reason: "not an hex string".to_string(),
            });
        }

        match hex.len() {
            // #RGB and #RGBA, eg #F00 for red
            3 | 4 => {
                let mut components = [255u8; 4];
                for (i, component) in components.iter_mut().enumerate().take(hex.len()) {
                    // Convert 0xF to 0xFF
                    *component = parse_hex_component(&hex[i..i + 1], original)? * 17;
                }
                let [r, g, b, a] = components;
                Ok(Color { r, g, b, a })
            }
            // #RRGGBB and #RRGGBBAA
            6 | 8 => {
                let mut components = [255u8; 4];
                for (i, component) in components.iter_mut().enumerate().take(hex.len() / 2) {
                    *component = parse_hex_component(&hex[i * 2..i * 2 + 2], original)?;
                }
                let [r, g, b, a] = components;
                Ok(Color { r, g, b, a })
            }
            _ => Err(Error::InvalidHexColor {
                value: original.to_string(),
                reason: format!("invalid length {}", hex.len()),
            }),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_hex_colors() {
        let inputs = vec![
            ("#F00", Color::rgb(255, 0, 0)),
            ("#369", Color::rgb(51, 102, 153)),
            ("#0008", Color { r: 0, g: 0, b: 0, a: 136 }),
            ("#FF0000", Color::rgb(255, 0, 0)),
            ("#12345678", Color { r: 0x12, g: 0x34, b: 0x56, a: 0x78 }),
            ("ffffff", Color::WHITE),
            ("white", Color::WHITE),
            ("black", Color::BLACK),
            (" #abc ", Color::rgb(0xAA, 0xBB, 0xCC)),
        ];

        for (input, expected) in inputs {
            assert_eq!(Color::from_hex(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn rejects_invalid_colors() {
        for input in ["", "#12", "#GGG", "#12345", "#ééé", "red"] {
            assert!(
                matches!(Color::from_hex(input), Err(Error::InvalidHexColor { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn outputs_hex() {
        assert_eq!(Color::rgb(255, 0, 16).as_hex(), "#FF0010");
        assert_eq!(Color { r: 0, g: 0, b: 0, a: 128 }.to_string(), "#00000080");
    }

    #[test]
    fn computes_luminance() {
        assert_eq!(Color::WHITE.luminance(), 255);
        assert_eq!(Color::BLACK.luminance(), 0);
    }
}
