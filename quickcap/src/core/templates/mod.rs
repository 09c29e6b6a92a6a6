//! Caption Style Templates
//!
//! Read-only registry of named caption styles. The registry is built once on
//! first access and never mutated; unknown ids resolve to [`DEFAULT_TEMPLATE_ID`].
//!
//! ```rust,ignore
//! use crate::core::templates::catalog;
//!
//! let template = catalog().get_or_default("Bold Green");
//! assert_eq!(template.font_size, 65);
//! ```

use serde::Serialize;
use std::sync::LazyLock;
use tracing::warn;

use crate::core::Color;

/// Template used when a request names an unknown id
pub const DEFAULT_TEMPLATE_ID: &str = "MrBeast";

/// Corner radius of highlight bars in pixels
pub const BAR_CORNER_RADIUS: u32 = 8;

// =============================================================================
// Style Model
// =============================================================================

/// Text outline
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Color,
    /// Outline width in pixels (0 disables the outline)
    pub width: u32,
}

/// Drop shadow
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub color: Color,
    /// Offset (x, y) in pixels
    pub offset: (i32, i32),
}

/// Case transform applied to the whole unit before wrapping
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextCase {
    #[default]
    AsIs,
    Upper,
    Title,
}

impl TextCase {
    pub fn apply(&self, text: &str) -> String {
        match self {
            TextCase::AsIs => text.to_string(),
            TextCase::Upper => text.to_uppercase(),
            TextCase::Title => title_case(text),
        }
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            at_word_start = false;
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// How the highlighted word is emphasized
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Emphasis {
    /// Draw the word in the cycling highlight color
    #[default]
    Recolor,
    /// Rounded bar in the highlight color behind the word
    Bars { padding: u32 },
    /// Enlarge the word by `factor` and recolor it
    Scale { factor: f32 },
}

/// Whether captions show whole phrases or one word at a time
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum DisplayMode {
    #[default]
    Phrase,
    /// One frame per word, optionally at an enlarged font size
    WordByWord { font_size: Option<u32> },
}

/// A named caption style
#[derive(Clone, Debug, PartialEq)]
pub struct StyleTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Font resources in preference order
    pub font_candidates: &'static [&'static str],
    pub font_size: u32,
    pub text_color: Color,
    /// Cycled over highlighted word indices; empty disables highlighting
    pub highlight_colors: &'static [Color],
    /// Extra pixels between lines
    pub line_spacing: u32,
    pub stroke: Option<Stroke>,
    pub shadow: Option<Shadow>,
    pub text_case: TextCase,
    pub emphasis: Emphasis,
    pub display: DisplayMode,
}

impl StyleTemplate {
    pub fn has_highlighting(&self) -> bool {
        !self.highlight_colors.is_empty()
    }

    pub fn is_word_by_word(&self) -> bool {
        matches!(self.display, DisplayMode::WordByWord { .. })
    }

    /// Color for the highlighted word at global unit index `index`
    pub fn highlight_color(&self, index: usize) -> Option<Color> {
        if self.highlight_colors.is_empty() {
            return None;
        }
        Some(self.highlight_colors[index % self.highlight_colors.len()])
    }

    /// Font size for a single-word unit
    pub fn word_font_size(&self) -> u32 {
        match self.display {
            DisplayMode::WordByWord {
                font_size: Some(size),
            } => size,
            _ => self.font_size,
        }
    }

    /// Active outline, if any
    pub fn active_stroke(&self) -> Option<Stroke> {
        self.stroke.filter(|s| s.width > 0)
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            font_size: self.font_size,
            has_highlighting: self.has_highlighting(),
            has_stroke: self.stroke.is_some(),
            has_shadow: self.shadow.is_some(),
        }
    }
}

/// Client-facing description of a template
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub font_size: u32,
    pub has_highlighting: bool,
    pub has_stroke: bool,
    pub has_shadow: bool,
}

/// Listing returned to clients
#[derive(Clone, Debug, Serialize)]
pub struct TemplateListing {
    pub templates: Vec<TemplateSummary>,
    pub current_template: String,
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable template registry
#[derive(Debug)]
pub struct TemplateCatalog {
    templates: Vec<StyleTemplate>,
    default_index: usize,
}

impl TemplateCatalog {
    fn new(templates: Vec<StyleTemplate>, default_id: &str) -> Self {
        let default_index = templates
            .iter()
            .position(|t| t.id == default_id)
            .unwrap_or(0);
        Self {
            templates,
            default_index,
        }
    }

    pub fn get(&self, id: &str) -> Option<&StyleTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Looks up `id`, falling back to the default template
    pub fn get_or_default(&self, id: &str) -> &StyleTemplate {
        match self.get(id) {
            Some(template) => template,
            None => {
                let fallback = self.default_template();
                warn!(
                    "Unknown caption template '{}', using '{}'",
                    id, fallback.id
                );
                fallback
            }
        }
    }

    pub fn default_template(&self) -> &StyleTemplate {
        &self.templates[self.default_index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn listing(&self) -> TemplateListing {
        TemplateListing {
            templates: self.templates.iter().map(StyleTemplate::summary).collect(),
            current_template: self.default_template().id.to_string(),
        }
    }
}

static CATALOG: LazyLock<TemplateCatalog> =
    LazyLock::new(|| TemplateCatalog::new(builtin_templates(), DEFAULT_TEMPLATE_ID));

/// The process-wide template registry
pub fn catalog() -> &'static TemplateCatalog {
    &CATALOG
}

// =============================================================================
// Built-in Templates
// =============================================================================

const WHITE: Color = Color::WHITE;
const BLACK_STROKE_2: Option<Stroke> = Some(Stroke {
    color: Color::BLACK,
    width: 2,
});
const BLACK_STROKE_3: Option<Stroke> = Some(Stroke {
    color: Color::BLACK,
    width: 3,
});
const SOFT_SHADOW: Option<Shadow> = Some(Shadow {
    color: Color::rgba(0, 0, 0, 128),
    offset: (4, 4),
});

// Highlight palettes
const MR_BEAST_CYCLE: &[Color] = &[
    Color::rgb(255, 255, 0),
    Color::rgb(0, 255, 0),
    Color::rgb(255, 0, 0),
];
const GREEN_ONLY: &[Color] = &[Color::rgb(0, 255, 0)];
const YELLOW_ONLY: &[Color] = &[Color::rgb(255, 255, 0)];
const PREMIUM_ORANGE_ONLY: &[Color] = &[Color::rgb(235, 91, 0)];
const ORANGE_ONLY: &[Color] = &[Color::rgb(255, 140, 0)];
const RED_ORANGE_ONLY: &[Color] = &[Color::rgb(255, 69, 0)];
const ORANGE_BAR: &[Color] = &[Color::rgba(255, 140, 0, 230)];
const RED_ONLY: &[Color] = &[Color::rgb(255, 0, 0)];
const WHITE_ONLY: &[Color] = &[WHITE];

const fn fonts_for(
    primary_dir: &'static str,
    primary: &'static str,
) -> [&'static str; 4] {
    [primary_dir, primary, "fonts/arial.ttf", "C:/Windows/Fonts/arial.ttf"]
}

static KOMIKAX: [&str; 4] = fonts_for("fonts/Komikax.ttf", "Komikax.ttf");
static UNI_SANS: [&str; 4] = fonts_for("fonts/Uni Sans Heavy.otf", "Uni Sans Heavy.otf");
static BOLD_FONT: [&str; 4] = fonts_for("fonts/Theboldfont.ttf", "Theboldfont.ttf");
static POPPINS_BOLD_ITALIC: [&str; 4] =
    fonts_for("fonts/Poppins-BoldItalic.ttf", "Poppins-BoldItalic.ttf");
static SPIEGEL: [&str; 4] = fonts_for("fonts/SpiegelSans.otf", "SpiegelSans.otf");
static LUCKIEST_GUY: [&str; 4] = fonts_for("fonts/LuckiestGuy.ttf", "LuckiestGuy.ttf");
static PROXIMA_ITALIC: [&str; 4] = fonts_for(
    "fonts/Proxima Nova Alt Condensed Black Italic.otf",
    "Proxima Nova Alt Condensed Black Italic.otf",
);
static POPPINS_BLACK_ITALIC: [&str; 4] =
    fonts_for("fonts/Poppins-BlackItalic.ttf", "Poppins-BlackItalic.ttf");
static EXO2: [&str; 4] = fonts_for("fonts/Exo2-Black.ttf", "Exo2-Black.ttf");
static HELVETICA_ROUNDED: [&str; 4] = fonts_for(
    "fonts/HelveticaRoundedLTStd-Bd.ttf",
    "HelveticaRoundedLTStd-Bd.ttf",
);
static PROXIMA: [&str; 4] = fonts_for(
    "fonts/Proxima Nova Alt Condensed Black.otf",
    "Proxima Nova Alt Condensed Black.otf",
);
static SYSTEM_SANS: [&str; 6] = [
    "arial.ttf",
    "C:/Windows/Fonts/arial.ttf",
    "C:/Windows/Fonts/calibri.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

fn builtin_templates() -> Vec<StyleTemplate> {
    vec![
        StyleTemplate {
            id: "default",
            name: "Default",
            description: "Simple white text with no effects",
            font_candidates: &SYSTEM_SANS,
            font_size: 72,
            text_color: WHITE,
            highlight_colors: &[],
            line_spacing: 30,
            stroke: None,
            shadow: None,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "MrBeast",
            name: "MrBeast Style",
            description: "Komikax font with cycling colors (Yellow→Green→Red), 3px stroke, and shadow",
            font_candidates: &KOMIKAX,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: MR_BEAST_CYCLE,
            line_spacing: 30,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Bold Green",
            name: "Bold Green",
            description: "Uni Sans Heavy font with bright green word highlighting and shadow",
            font_candidates: &UNI_SANS,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: GREEN_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Bold Sunshine",
            name: "Bold Sunshine",
            description: "Theboldfont with bright yellow word highlighting, 2px outline, and extra large spacing",
            font_candidates: &BOLD_FONT,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: YELLOW_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_2,
            shadow: SOFT_SHADOW,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Premium Orange",
            name: "Premium Orange",
            description: "Poppins Bold Italic with vibrant orange highlighting, uppercase text, and dynamic spacing",
            font_candidates: &POPPINS_BOLD_ITALIC,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: PREMIUM_ORANGE_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::Upper,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Minimal White",
            name: "Minimal White",
            description: "SpiegelSans with clean white highlighting, minimal styling, and professional spacing",
            font_candidates: &SPIEGEL,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: WHITE_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Orange Meme",
            name: "Orange Meme",
            description: "LuckiestGuy with uniform orange color, bold cartoon styling, and uppercase text",
            font_candidates: &LUCKIEST_GUY,
            font_size: 65,
            text_color: Color::rgb(255, 140, 0),
            highlight_colors: ORANGE_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::Upper,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Cinematic Quote",
            name: "Cinematic Quote",
            description: "Proxima Nova Alt Condensed Black Italic with bright yellow highlighting and title case",
            font_candidates: &PROXIMA_ITALIC,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: YELLOW_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::Title,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Word by Word",
            name: "Word by Word",
            description: "Poppins Black Italic with word-by-word display, enhanced font size, and uniform white color",
            font_candidates: &POPPINS_BLACK_ITALIC,
            font_size: 75,
            text_color: WHITE,
            highlight_colors: WHITE_ONLY,
            line_spacing: 50,
            stroke: BLACK_STROKE_3,
            shadow: SOFT_SHADOW,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Recolor,
            display: DisplayMode::WordByWord {
                font_size: Some(82),
            },
        },
        StyleTemplate {
            id: "esports_caption",
            name: "Esports Caption",
            description: "Exo2-Black with vibrant red-orange highlighting, gaming-style effects, and uppercase text",
            font_candidates: &EXO2,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: RED_ORANGE_ONLY,
            line_spacing: 40,
            stroke: BLACK_STROKE_2,
            shadow: SOFT_SHADOW,
            text_case: TextCase::Upper,
            emphasis: Emphasis::Scale { factor: 1.15 },
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "explainer_pro",
            name: "Explainer Pro",
            description: "Helvetica Rounded with semi-transparent orange highlight bars behind important words",
            font_candidates: &HELVETICA_ROUNDED,
            font_size: 65,
            text_color: WHITE,
            highlight_colors: ORANGE_BAR,
            line_spacing: 40,
            stroke: BLACK_STROKE_2,
            shadow: SOFT_SHADOW,
            text_case: TextCase::AsIs,
            emphasis: Emphasis::Bars { padding: 8 },
            display: DisplayMode::Phrase,
        },
        StyleTemplate {
            id: "Reaction Pop",
            name: "Reaction Pop",
            description: "Proxima Nova Alt Condensed Black with vibrant red highlighting and title case formatting",
            font_candidates: &PROXIMA,
            font_size: 70,
            text_color: WHITE,
            highlight_colors: RED_ONLY,
            line_spacing: 45,
            stroke: BLACK_STROKE_3,
            shadow: None,
            text_case: TextCase::Title,
            emphasis: Emphasis::Scale { factor: 1.15 },
            display: DisplayMode::Phrase,
        },
    ]
}

// =============================================================================
// Tests
// =============================================================================
