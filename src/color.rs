use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::CellValue;
use crate::stats::histogram::Bin;

// ---------------------------------------------------------------------------
// Fixed chart colours (shared by the dashboard and the PDF report)
// ---------------------------------------------------------------------------

/// Bars of bins starting below zero.
pub const LOSS_BAR: Srgb<u8> = Srgb::new(0xFF, 0x89, 0x89);
/// All other bars.
pub const GAIN_BAR: Srgb<u8> = Srgb::new(0x1F, 0x77, 0xB4);

pub fn bar_color(bin: &Bin) -> Srgb<u8> {
    if bin.is_negative() {
        LOSS_BAR
    } else {
        GAIN_BAR
    }
}

pub fn to_color32(c: Srgb<u8>) -> Color32 {
    Color32::from_rgb(c.red, c.green, c.blue)
}

/// Channels in `0.0..=1.0`, as PDF colour operators expect.
pub fn to_unit_rgb(c: Srgb<u8>) -> (f32, f32, f32) {
    let f: Srgb<f32> = c.into_format();
    (f.red, f.green, f.blue)
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: categorical value → Color32
// ---------------------------------------------------------------------------

/// Maps the unique values of a categorical filter column to distinct colours,
/// so selected values are easy to tell apart in the value list.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<CellValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map for the given column from its unique values.
    pub fn new(column: &str, unique_values: &BTreeSet<CellValue>) -> Self {
        let palette = generate_palette(unique_values.len());
        let mapping: BTreeMap<CellValue, Color32> = unique_values
            .iter()
            .cloned()
            .zip(palette)
            .collect();

        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a given value.
    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let p = generate_palette(5);
        assert_eq!(p.len(), 5);
        assert_ne!(p[0], p[1]);
    }

    #[test]
    fn unknown_values_fall_back_to_gray() {
        let values: BTreeSet<CellValue> =
            [CellValue::Text("ES".into()), CellValue::Text("NQ".into())].into_iter().collect();
        let map = ColorMap::new("Symbol", &values);
        assert_ne!(map.color_for(&CellValue::Text("ES".into())), Color32::GRAY);
        assert_eq!(map.color_for(&CellValue::Text("CL".into())), Color32::GRAY);
    }

    #[test]
    fn bars_below_zero_use_the_loss_colour() {
        let loss = Bin { start: -1.0, end: 0.0, count: 1 };
        let gain = Bin { start: 0.0, end: 1.0, count: 1 };
        assert_eq!(bar_color(&loss), LOSS_BAR);
        assert_eq!(bar_color(&gain), GAIN_BAR);
        let (r, _, _) = to_unit_rgb(LOSS_BAR);
        assert_eq!(r, 1.0);
    }
}
