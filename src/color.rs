//! Static catalog of target hair colors.

use std::fmt;

/// A named target color. `rgb == None` is the "no color" selection, which
/// leaves frames untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub rgb: Option<[u8; 3]>,
}

impl ColorSpec {
    pub const NONE: ColorSpec = ColorSpec {
        id: "none",
        name: "Natural",
        rgb: None,
    };

    pub const fn new(id: &'static str, name: &'static str, rgb: [u8; 3]) -> Self {
        Self {
            id,
            name,
            rgb: Some(rgb),
        }
    }

    pub fn is_none(&self) -> bool {
        self.rgb.is_none()
    }

    /// Look up a catalog entry by id (case-insensitive), or parse a custom
    /// `#rrggbb` value.
    pub fn parse(value: &str) -> Option<ColorSpec> {
        let value = value.trim();
        if let Some(spec) = CATALOG.iter().find(|c| c.id.eq_ignore_ascii_case(value)) {
            return Some(*spec);
        }
        parse_hex(value).map(|rgb| ColorSpec {
            id: "custom",
            name: "Custom",
            rgb: Some(rgb),
        })
    }
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rgb {
            Some([r, g, b]) => write!(f, "{} (#{:02x}{:02x}{:02x})", self.name, r, g, b),
            None => write!(f, "{}", self.name),
        }
    }
}

pub const CATALOG: &[ColorSpec] = &[
    ColorSpec::NONE,
    ColorSpec::new("black", "Jet Black", [20, 18, 18]),
    ColorSpec::new("brown", "Chocolate Brown", [92, 58, 33]),
    ColorSpec::new("auburn", "Auburn", [145, 60, 30]),
    ColorSpec::new("blonde", "Golden Blonde", [230, 190, 110]),
    ColorSpec::new("platinum", "Platinum", [229, 228, 226]),
    ColorSpec::new("red", "Copper Red", [200, 50, 10]),
    ColorSpec::new("pink", "Pastel Pink", [244, 154, 194]),
    ColorSpec::new("purple", "Violet", [120, 60, 170]),
    ColorSpec::new("blue", "Ocean Blue", [30, 90, 200]),
    ColorSpec::new("green", "Emerald", [20, 140, 90]),
];

pub fn catalog() -> &'static [ColorSpec] {
    CATALOG
}

fn parse_hex(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
