use std::fmt;
use std::str::FromStr;

use eframe::egui::Color32;
use palette::{Hsl, Hsluv, IntoColor, Mix, Srgb};

// ---------------------------------------------------------------------------
// Named palettes
// ---------------------------------------------------------------------------

/// Colour palettes for categories and stacked series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Palette {
    #[default]
    Viridis,
    Husl,
    Hls,
    Pastel,
}

pub const PALETTES: [Palette; 4] = [Palette::Viridis, Palette::Husl, Palette::Hls, Palette::Pastel];

const VIRIDIS_STOPS: [(u8, u8, u8); 5] = [
    (0x44, 0x01, 0x54),
    (0x3b, 0x52, 0x8b),
    (0x21, 0x91, 0x8c),
    (0x5e, 0xc9, 0x62),
    (0xfd, 0xe7, 0x25),
];

const PASTEL: [(u8, u8, u8); 10] = [
    (0xa1, 0xc9, 0xf4),
    (0xff, 0xb4, 0x82),
    (0x8d, 0xe5, 0xa1),
    (0xff, 0x9f, 0x9b),
    (0xd0, 0xbb, 0xff),
    (0xde, 0xbb, 0x9b),
    (0xfa, 0xb0, 0xe4),
    (0xcf, 0xcf, 0xcf),
    (0xff, 0xfe, 0xa3),
    (0xb9, 0xf2, 0xf0),
];

fn to_color32(rgb: Srgb) -> Color32 {
    let rgb: Srgb<u8> = rgb.into_format();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

fn stop(rgb: (u8, u8, u8)) -> Srgb {
    Srgb::new(rgb.0, rgb.1, rgb.2).into_format()
}

/// Sample the viridis ramp at `t` in `[0, 1]`.
fn viridis_at(t: f32) -> Color32 {
    let scaled = t.clamp(0.0, 1.0) * (VIRIDIS_STOPS.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
    let lower = stop(VIRIDIS_STOPS[i]).into_linear();
    let upper = stop(VIRIDIS_STOPS[i + 1]).into_linear();
    to_color32(Srgb::from_linear(lower.mix(upper, scaled - i as f32)))
}

/// Hue offset shared by the evenly spaced palettes.
const HUE_START: f32 = 0.01 * 360.0;

impl Palette {
    /// `n` colours. Viridis leaves out both ends of the ramp; pastel cycles.
    pub fn colors(self, n: usize) -> Vec<Color32> {
        (0..n)
            .map(|i| match self {
                Palette::Viridis => viridis_at((i + 1) as f32 / (n + 1) as f32),
                Palette::Hls => {
                    let hue = HUE_START + (i as f32 / n as f32) * 360.0;
                    to_color32(Hsl::new(hue, 0.65, 0.6).into_color())
                }
                Palette::Husl => {
                    let hue = HUE_START + (i as f32 / n as f32) * 360.0;
                    to_color32(Hsluv::new(hue, 90.0, 65.0).into_color())
                }
                Palette::Pastel => {
                    let (r, g, b) = PASTEL[i % PASTEL.len()];
                    Color32::from_rgb(r, g, b)
                }
            })
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Palette::Viridis => "viridis",
            Palette::Husl => "husl",
            Palette::Hls => "hls",
            Palette::Pastel => "pastel",
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PALETTES
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown palette '{s}' (expected viridis, husl, hls or pastel)"))
    }
}

// ---------------------------------------------------------------------------
// Explicit colours
// ---------------------------------------------------------------------------

/// `#rrggbb` or a basic colour name.
pub fn parse_color(text: &str) -> Option<Color32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return Some(Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?));
    }
    let color = match text.to_ascii_lowercase().as_str() {
        "black" => Color32::BLACK,
        "white" => Color32::WHITE,
        "red" => Color32::from_rgb(0xd6, 0x27, 0x28),
        "green" => Color32::from_rgb(0x2c, 0xa0, 0x2c),
        "blue" => Color32::from_rgb(0x1f, 0x77, 0xb4),
        "orange" => Color32::from_rgb(0xff, 0x7f, 0x0e),
        "purple" => Color32::from_rgb(0x94, 0x67, 0xbd),
        "brown" => Color32::from_rgb(0x8c, 0x56, 0x4b),
        "pink" => Color32::from_rgb(0xe3, 0x77, 0xc2),
        "gray" | "grey" => Color32::from_rgb(0x7f, 0x7f, 0x7f),
        "olive" => Color32::from_rgb(0xbc, 0xbd, 0x22),
        "cyan" => Color32::from_rgb(0x17, 0xbe, 0xcf),
        "yellow" => Color32::from_rgb(0xff, 0xd7, 0x00),
        "skyblue" => Color32::from_rgb(0x87, 0xce, 0xeb),
        "salmon" => Color32::from_rgb(0xfa, 0x80, 0x72),
        "navy" => Color32::from_rgb(0x00, 0x00, 0x80),
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palettes_have_requested_length_and_distinct_colors() {
        for palette in PALETTES {
            let colors = palette.colors(5);
            assert_eq!(colors.len(), 5, "{palette}");
            assert_ne!(colors[0], colors[1], "{palette}");
        }
        assert!(Palette::Hls.colors(0).is_empty());
    }

    #[test]
    fn viridis_runs_from_purple_to_yellow() {
        let colors = Palette::Viridis.colors(9);
        let (first, last) = (colors[0], colors[8]);
        assert!(first.b() > first.g());
        assert!(last.r() > last.b() && last.g() > last.b());
    }

    #[test]
    fn pastel_cycles() {
        let colors = Palette::Pastel.colors(11);
        assert_eq!(colors[0], colors[10]);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("HUSL".parse::<Palette>(), Ok(Palette::Husl));
        assert!("jet".parse::<Palette>().is_err());
    }

    #[test]
    fn explicit_colors() {
        assert_eq!(parse_color("#ff8000"), Some(Color32::from_rgb(255, 128, 0)));
        assert_eq!(parse_color("Black"), Some(Color32::BLACK));
        assert_eq!(parse_color("#ff80"), None);
        assert_eq!(parse_color("#gg0000"), None);
        assert_eq!(parse_color("chartreuse"), None);
    }
}
