use serde_json::{json, Map, Value};
use std::sync::LazyLock;

pub const DEFAULT_TIMER_SECONDS: u32 = 20;
pub const DEFAULT_POINTS_PER_CORRECT: u32 = 100;
pub const DEFAULT_MAX_QUESTIONS: u32 = 10;
pub const DEFAULT_LIVES: u32 = 3;

//
// ─── BASE DEFAULTS ─────────────────────────────────────────────────────────────
//

/// Shared base customization. Never mutated; every merge clones out of it.
static BASE_CUSTOMIZATION: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "branding": {
            "primary_color": "#0EA5E9",
            "secondary_color": "#111827",
            "logo_url": "",
            "background_url": "",
            "welcome_image_url": "",
            "watermark_text": "MODO PRUEBA",
        },
        "texts": {
            "welcome_title": "Trivia Runner",
            "welcome_subtitle": "",
            "cta_button": "Siguiente",
        },
        "rules": {
            "show_timer": true,
            "timer_seconds": DEFAULT_TIMER_SECONDS,
            "points_per_correct": DEFAULT_POINTS_PER_CORRECT,
            "max_questions": DEFAULT_MAX_QUESTIONS,
            "use_lives": true,
            "lives": DEFAULT_LIVES,
        },
        "visual": {
            "question_bg_color": "#ffffff",
            "question_border_color": "#dbeafe",
            "question_text_color": "#0f172a",
            "question_font_family": "system-ui, Arial, sans-serif",
            "option_border_color": "#dbeafe",
            "option_bg_color": "#eff6ff",
            "screen_background_color": "#ffffff",
            "container_bg_image_url": "",
        },
        "watermark": {
            "enabled": true,
            "color": "#ff0000",
            "opacity": 0.28,
            "position": "center",
            "font_size": 96,
        },
        "content": {
            "question_set_id": null,
        },
    })
});

/// Known sections and the keys each one may carry. Anything else is dropped.
const ALLOWED_KEYS: &[(&str, &[&str])] = &[
    (
        "branding",
        &[
            "primary_color",
            "secondary_color",
            "logo_url",
            "background_url",
            "welcome_image_url",
            "watermark_text",
        ],
    ),
    ("texts", &["welcome_title", "welcome_subtitle", "cta_button"]),
    (
        "rules",
        &[
            "show_timer",
            "timer_seconds",
            "points_per_correct",
            "max_questions",
            "use_lives",
            "lives",
        ],
    ),
    (
        "visual",
        &[
            "question_bg_color",
            "question_border_color",
            "question_text_color",
            "question_font_family",
            "option_border_color",
            "option_bg_color",
            "screen_background_color",
            "container_bg_image_url",
        ],
    ),
    (
        "watermark",
        &["enabled", "color", "opacity", "position", "font_size"],
    ),
    ("content", &["question_set_id"]),
];

#[must_use]
pub fn base_customization() -> &'static Value {
    &BASE_CUSTOMIZATION
}

//
// ─── MERGE ─────────────────────────────────────────────────────────────────────
//

/// Structural merge: objects merge key by key, anything else replaces wholesale.
///
/// Neither input is modified.
#[must_use]
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                let next = match merged.get(key) {
                    Some(base_value) if base_value.is_object() && patch_value.is_object() => {
                        deep_merge(base_value, patch_value)
                    }
                    _ => patch_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

/// Merge a contract's raw customization over the base defaults, keeping only allow-listed keys.
///
/// A payload that is not an object resolves to the defaults.
#[must_use]
pub fn merge_customization(raw: &Value) -> Value {
    let base = base_customization();
    if !raw.is_object() {
        return base.clone();
    }
    let (filtered, ignored) = retain_allowed(raw);
    if !ignored.is_empty() {
        tracing::debug!(keys = ?ignored, "ignoring unknown customization keys");
    }
    deep_merge(base, &filtered)
}

fn retain_allowed(raw: &Value) -> (Value, Vec<String>) {
    let mut ignored = Vec::new();
    let mut out = Map::new();
    let Some(sections) = raw.as_object() else {
        return (Value::Object(out), ignored);
    };

    for (section, value) in sections {
        let Some((_, keys)) = ALLOWED_KEYS.iter().find(|(name, _)| name == section) else {
            ignored.push(section.clone());
            continue;
        };
        match value {
            Value::Object(fields) => {
                let mut kept = Map::new();
                for (key, field) in fields {
                    if keys.contains(&key.as_str()) {
                        kept.insert(key.clone(), field.clone());
                    } else {
                        ignored.push(format!("{section}.{key}"));
                    }
                }
                out.insert(section.clone(), Value::Object(kept));
            }
            // Non-object sections replace the default wholesale; resolution falls back later.
            other => {
                out.insert(section.clone(), other.clone());
            }
        }
    }

    (Value::Object(out), ignored)
}

//
// ─── TYPED CONFIG ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq)]
pub struct Branding {
    pub primary_color: String,
    pub secondary_color: String,
    pub logo_url: Option<String>,
    pub background_url: Option<String>,
    pub welcome_image_url: Option<String>,
    pub watermark_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texts {
    pub welcome_title: String,
    pub welcome_subtitle: String,
    pub cta_button: String,
}

/// Gameplay rules resolved for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    pub show_timer: bool,
    pub timer_seconds: u32,
    pub points_per_correct: u32,
    pub max_questions: u32,
    pub use_lives: bool,
    pub lives: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub question_bg_color: String,
    pub question_border_color: String,
    pub question_text_color: String,
    pub question_font_family: String,
    pub option_border_color: String,
    pub option_bg_color: String,
    pub screen_background_color: String,
    pub container_bg_image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    #[default]
    Center,
}

impl WatermarkPosition {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            _ => Self::Center,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub enabled: bool,
    pub text: String,
    pub color: String,
    pub opacity: f64,
    pub position: WatermarkPosition,
    pub font_size: f64,
}

/// Fully resolved, default-filled configuration for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub branding: Branding,
    pub texts: Texts,
    pub rules: Rules,
    pub visual: Visual,
    pub watermark: Watermark,
    pub preview_mode: bool,
}

impl EffectiveConfig {
    /// Resolve a contract customization payload against the base defaults.
    #[must_use]
    pub fn resolve(raw: &Value, preview_mode: bool) -> Self {
        let merged = merge_customization(raw);
        let base = base_customization();

        let branding = Section::new(&merged, base, "branding");
        let texts = Section::new(&merged, base, "texts");
        let rules = Section::new(&merged, base, "rules");
        let visual = Section::new(&merged, base, "visual");
        let watermark = Section::new(&merged, base, "watermark");

        Self {
            branding: Branding {
                primary_color: branding.text("primary_color"),
                secondary_color: branding.text("secondary_color"),
                logo_url: branding.optional_text("logo_url"),
                background_url: branding.optional_text("background_url"),
                welcome_image_url: branding.optional_text("welcome_image_url"),
                watermark_text: branding.text("watermark_text"),
            },
            texts: Texts {
                welcome_title: texts.text("welcome_title"),
                welcome_subtitle: texts.text("welcome_subtitle"),
                cta_button: texts.text("cta_button"),
            },
            rules: Rules {
                show_timer: rules.truthy("show_timer"),
                timer_seconds: rules.positive_int("timer_seconds", DEFAULT_TIMER_SECONDS),
                points_per_correct: rules
                    .positive_int("points_per_correct", DEFAULT_POINTS_PER_CORRECT),
                max_questions: rules.positive_int("max_questions", DEFAULT_MAX_QUESTIONS),
                use_lives: rules.truthy("use_lives"),
                lives: rules.positive_int("lives", DEFAULT_LIVES),
            },
            visual: Visual {
                question_bg_color: visual.text("question_bg_color"),
                question_border_color: visual.text("question_border_color"),
                question_text_color: visual.text("question_text_color"),
                question_font_family: visual.text("question_font_family"),
                option_border_color: visual.text("option_border_color"),
                option_bg_color: visual.text("option_bg_color"),
                screen_background_color: visual.text("screen_background_color"),
                container_bg_image_url: visual.optional_text("container_bg_image_url"),
            },
            watermark: Watermark {
                enabled: watermark.get("enabled") != Some(&Value::Bool(false)),
                text: branding.text("watermark_text"),
                color: watermark.text("color"),
                opacity: watermark.finite("opacity", 0.28),
                position: WatermarkPosition::parse(&watermark.text("position")),
                font_size: watermark.finite("font_size", 96.0),
            },
            preview_mode,
        }
    }

    /// Configuration used when the customization cannot be fetched at all.
    #[must_use]
    pub fn defaults() -> Self {
        Self::resolve(&Value::Null, false)
    }

    /// The watermark is only drawn on preview (unpaid) sessions.
    #[must_use]
    pub fn show_watermark(&self) -> bool {
        self.preview_mode && self.watermark.enabled
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Read view over one merged section, with the base section as fallback.
struct Section<'a> {
    merged: Option<&'a Map<String, Value>>,
    base: Option<&'a Map<String, Value>>,
}

impl<'a> Section<'a> {
    fn new(merged: &'a Value, base: &'a Value, name: &str) -> Self {
        // A section overridden with a non-object falls back to the base section entirely.
        let merged = merged.get(name).and_then(Value::as_object);
        Self {
            merged,
            base: base.get(name).and_then(Value::as_object),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        match self.merged {
            Some(map) => map.get(key),
            None => self.base.and_then(|map| map.get(key)),
        }
    }

    fn base_text(&self, key: &str) -> String {
        self.base
            .and_then(|map| map.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }

    fn text(&self, key: &str) -> String {
        match self.get(key).and_then(Value::as_str) {
            Some(value) if !value.trim().is_empty() => value.to_owned(),
            _ => self.base_text(key),
        }
    }

    fn optional_text(&self, key: &str) -> Option<String> {
        Some(self.text(key)).filter(|value| !value.trim().is_empty())
    }

    fn truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }

    fn positive_int(&self, key: &str, default: u32) -> u32 {
        self.get(key).and_then(positive_int).unwrap_or(default)
    }

    fn finite(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(number).unwrap_or(default)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_int(value: &Value) -> Option<u32> {
    let floored = number(value)?.floor();
    if floored < 1.0 {
        return None;
    }
    Some(floored.min(f64::from(u32::MAX)) as u32)
}
