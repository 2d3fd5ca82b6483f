//! Channel color resolution for grid renderers
//!
//! Stateless: every input is passed in by the caller, so any renderer (egui,
//! terminal, web) can share the same mapping.

use serde::{Deserialize, Serialize};

use super::history::ChannelHistoryEntry;
use super::source::Millis;

/// How long the last-used fade takes to reach its floor
pub const LAST_USED_FADE_MS: Millis = 5_000;
/// Minimum opacity of a faded last-used cell
pub const LAST_USED_MIN_OPACITY: f32 = 0.2;

/// RGBA with straight (unmultiplied) alpha in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Hue in degrees, saturation and lightness in [0, 1]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = lightness - c / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::rgb(to_u8(r), to_u8(g), to_u8(b))
    }

    /// CSS `rgba(...)` string for web renderers
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {:.3})", self.r, self.g, self.b, self.a)
    }
}

#[cfg(feature = "egui")]
impl From<Color> for egui::Color32 {
    fn from(c: Color) -> Self {
        egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, (c.a * 255.0).round() as u8)
    }
}

/// Fixed colors used by the resolver
pub mod palette {
    use super::Color;

    /// Single hue for intensity-only encoding (colorblind level mode)
    pub const CVD_LEVEL: Color = Color::rgb(238, 119, 51);
    /// Accent for the last-used fade
    pub const ACCENT: Color = Color::rgb(51, 187, 238);

    // === Unused mode ===
    pub const WARNING: Color = Color::rgba(239, 68, 68, 0.35);
    pub const WARNING_CVD: Color = Color::rgb(204, 51, 17);
    pub const SUCCESS: Color = Color::rgba(34, 197, 94, 0.6);
    pub const SUCCESS_CVD: Color = Color::rgb(0, 119, 187);

    /// Cyclic palette for source mode, keyed by source index
    pub const SOURCES: [Color; 10] = [
        Color::rgb(31, 119, 180),  // blue
        Color::rgb(255, 127, 14),  // orange
        Color::rgb(44, 160, 44),   // green
        Color::rgb(214, 39, 40),   // red
        Color::rgb(148, 103, 189), // purple
        Color::rgb(140, 86, 75),   // brown
        Color::rgb(227, 119, 194), // pink
        Color::rgb(127, 127, 127), // grey
        Color::rgb(188, 189, 34),  // olive
        Color::rgb(23, 190, 207),  // cyan
    ];
}

/// Grid coloring mode selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorMode {
    /// Hue sweep by intensity
    #[default]
    Level,
    /// Color by owning source
    Source,
    /// Fade since the channel was last nonzero
    LastUsed,
    /// Highlight dark channels
    Unused,
}

impl ColorMode {
    pub const ALL: &'static [ColorMode] = &[
        ColorMode::Level,
        ColorMode::Source,
        ColorMode::LastUsed,
        ColorMode::Unused,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColorMode::Level => "Level",
            ColorMode::Source => "Source",
            ColorMode::LastUsed => "Last used",
            ColorMode::Unused => "Unused",
        }
    }
}

/// Class of a resolved color, for renderers that style by class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellKind {
    Level,
    Source,
    LastUsed,
    Warning,
    Success,
    Heat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellColor {
    pub kind: CellKind,
    pub color: Color,
}

impl CellColor {
    fn new(kind: CellKind, color: Color) -> Self {
        Self { kind, color }
    }
}

/// Caller-supplied state for one cell
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorInputs {
    pub history: Option<ChannelHistoryEntry>,
    /// Index of the owning source in the global source list
    pub source_index: Option<usize>,
    pub now: Millis,
    pub colorblind: bool,
}

/// Map a channel value to a display color. `None` means unlit.
pub fn resolve_color(mode: ColorMode, value: u8, inputs: &ColorInputs) -> Option<CellColor> {
    let level = value as f32 / 255.0;
    match mode {
        ColorMode::Level => {
            if value == 0 {
                return None;
            }
            let color = if inputs.colorblind {
                palette::CVD_LEVEL.with_alpha(0.3 + level * 0.7)
            } else {
                Color::from_hsl(240.0 - level * 240.0, 0.8, 0.5)
            };
            Some(CellColor::new(CellKind::Level, color))
        }
        ColorMode::Source => {
            let index = inputs.source_index.filter(|_| value > 0)?;
            let color = palette::SOURCES[index % palette::SOURCES.len()];
            Some(CellColor::new(CellKind::Source, color))
        }
        ColorMode::LastUsed => {
            let entry = inputs.history.filter(|_| value > 0)?;
            let age = inputs.now.saturating_sub(entry.last_active_at);
            let opacity = (1.0 - age as f32 / LAST_USED_FADE_MS as f32)
                .clamp(LAST_USED_MIN_OPACITY, 1.0);
            Some(CellColor::new(
                CellKind::LastUsed,
                palette::ACCENT.with_alpha(opacity),
            ))
        }
        ColorMode::Unused => Some(match (value, inputs.colorblind) {
            (0, true) => CellColor::new(CellKind::Warning, palette::WARNING_CVD),
            (0, false) => CellColor::new(CellKind::Warning, palette::WARNING),
            (_, true) => CellColor::new(CellKind::Success, palette::SUCCESS_CVD),
            (_, false) => CellColor::new(CellKind::Success, palette::SUCCESS),
        }),
    }
}

/// Heat color for an activity score in [0, 1]; `None` when effectively idle
pub fn activity_color(activity: f32, colorblind: bool) -> Option<CellColor> {
    let activity = activity.clamp(0.0, 1.0);
    if activity < 0.01 {
        return None;
    }
    let color = if colorblind {
        palette::CVD_LEVEL.with_alpha(activity)
    } else {
        Color::from_hsl(240.0 - activity * 240.0, 0.8, 0.5).with_alpha(activity)
    };
    Some(CellColor::new(CellKind::Heat, color))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ColorInputs {
        ColorInputs::default()
    }

    #[test]
    fn test_hsl_primaries() {
        assert_eq!(Color::from_hsl(0.0, 1.0, 0.5), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsl(120.0, 1.0, 0.5), Color::rgb(0, 255, 0));
        assert_eq!(Color::from_hsl(240.0, 1.0, 0.5), Color::rgb(0, 0, 255));
        assert_eq!(Color::from_hsl(360.0, 1.0, 0.5), Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_level_mode_sweep() {
        assert!(resolve_color(ColorMode::Level, 0, &inputs()).is_none());

        let low = resolve_color(ColorMode::Level, 1, &inputs()).unwrap();
        assert_eq!(low.kind, CellKind::Level);
        assert!(low.color.b > low.color.r);

        // 80% saturation, 50% lightness at hue 0: roughly (230, 26, 26)
        let high = resolve_color(ColorMode::Level, 255, &inputs()).unwrap();
        assert!((229..=230).contains(&high.color.r));
        assert_eq!(high.color.g, high.color.b);
        assert!((25..=26).contains(&high.color.g));
    }

    #[test]
    fn test_level_mode_colorblind_alpha() {
        let cvd = ColorInputs { colorblind: true, ..inputs() };
        let full = resolve_color(ColorMode::Level, 255, &cvd).unwrap();
        assert_eq!((full.color.r, full.color.g, full.color.b), (238, 119, 51));
        assert!((full.color.a - 1.0).abs() < 1e-6);

        let dim = resolve_color(ColorMode::Level, 1, &cvd).unwrap();
        assert!((dim.color.a - (0.3 + 0.7 / 255.0)).abs() < 1e-6);
    }

    #[test]
    fn test_source_mode_cyclic_palette() {
        let with_source = |index| ColorInputs { source_index: Some(index), ..inputs() };

        assert!(resolve_color(ColorMode::Source, 10, &inputs()).is_none());
        assert!(resolve_color(ColorMode::Source, 0, &with_source(0)).is_none());

        let first = resolve_color(ColorMode::Source, 10, &with_source(0)).unwrap();
        let wrapped = resolve_color(ColorMode::Source, 10, &with_source(10)).unwrap();
        let second = resolve_color(ColorMode::Source, 10, &with_source(1)).unwrap();
        assert_eq!(first, wrapped);
        assert_ne!(first.color, second.color);
    }

    #[test]
    fn test_last_used_fade() {
        let entry = ChannelHistoryEntry { last_active_at: 1_000, last_value: 9 };
        let at = |now| ColorInputs { history: Some(entry), now, ..inputs() };

        let fresh = resolve_color(ColorMode::LastUsed, 9, &at(1_000)).unwrap();
        assert!((fresh.color.a - 1.0).abs() < 1e-6);

        let half = resolve_color(ColorMode::LastUsed, 9, &at(3_500)).unwrap();
        assert!((half.color.a - 0.5).abs() < 1e-6);

        let old = resolve_color(ColorMode::LastUsed, 9, &at(60_000)).unwrap();
        assert!((old.color.a - 0.2).abs() < 1e-6);

        // Needs both a value and a history entry
        assert!(resolve_color(ColorMode::LastUsed, 0, &at(1_000)).is_none());
        assert!(resolve_color(ColorMode::LastUsed, 9, &inputs()).is_none());
    }

    #[test]
    fn test_unused_mode_boundary() {
        for colorblind in [false, true] {
            let i = ColorInputs { colorblind, ..inputs() };
            let dark = resolve_color(ColorMode::Unused, 0, &i).unwrap();
            let lit = resolve_color(ColorMode::Unused, 1, &i).unwrap();
            assert_eq!(dark.kind, CellKind::Warning);
            assert_eq!(lit.kind, CellKind::Success);
            assert_ne!(dark.color, lit.color);
        }
        let cvd = ColorInputs { colorblind: true, ..inputs() };
        assert_eq!(
            resolve_color(ColorMode::Unused, 0, &cvd).unwrap().color,
            palette::WARNING_CVD
        );
    }

    #[test]
    fn test_activity_color() {
        assert!(activity_color(0.0, false).is_none());
        let hot = activity_color(1.0, false).unwrap();
        assert_eq!(hot.kind, CellKind::Heat);
        assert!(hot.color.r > hot.color.b);
        let cvd = activity_color(0.5, true).unwrap();
        assert!((cvd.color.a - 0.5).abs() < 1e-6);
    }

    #[cfg(feature = "egui")]
    #[test]
    fn test_into_egui_color() {
        let opaque: egui::Color32 = palette::CVD_LEVEL.into();
        assert_eq!(opaque, egui::Color32::from_rgb(238, 119, 51));

        let half: egui::Color32 = Color::rgba(10, 20, 30, 0.5).into();
        assert_eq!(half.a(), 128);
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&ColorMode::LastUsed).unwrap(), "\"lastUsed\"");
        let mode: ColorMode = serde_json::from_str("\"unused\"").unwrap();
        assert_eq!(mode, ColorMode::Unused);
        assert_eq!(Color::rgba(1, 2, 3, 0.5).to_css(), "rgba(1, 2, 3, 0.500)");
    }
}
