/// Style descriptor merged into the positive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptStyle {
    pub name: String,
    pub tagline: Option<String>,
}

impl PromptStyle {
    pub fn new(name: impl Into<String>, tagline: Option<&str>) -> Self {
        Self {
            name: name.into(),
            tagline: tagline.map(|t| t.to_string()),
        }
    }
}

/// Built-in style presets offered by the create screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StylePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub tagline: &'static str,
}

pub const STYLE_PRESETS: [StylePreset; 3] = [
    StylePreset {
        id: "realistic",
        name: "Realistic",
        tagline: "Photographic clarity with subtle lighting.",
    },
    StylePreset {
        id: "digital",
        name: "Digital art",
        tagline: "Bold colors, stylized textures, concept art ready.",
    },
    StylePreset {
        id: "watercolor",
        name: "Watercolor",
        tagline: "Soft gradients and dreamlike washes.",
    },
];

pub fn find_style_preset(id: &str) -> Option<&'static StylePreset> {
    STYLE_PRESETS.iter().find(|preset| preset.id == id)
}

impl From<&StylePreset> for PromptStyle {
    fn from(preset: &StylePreset) -> Self {
        PromptStyle::new(preset.name, Some(preset.tagline))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub positive: String,
    pub negative: Option<String>,
}

fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge prompt fragments into one positive prompt and a cleaned negative
/// prompt. Fragments are whitespace-normalized and joined with `" | "` in a
/// fixed order: base, style name, style tagline, then each extra. Nothing is
/// reordered, truncated, or deduplicated.
pub fn compose(
    prompt: &str,
    negative_prompt: Option<&str>,
    style: Option<&PromptStyle>,
    extras: &[String],
) -> ComposedPrompt {
    let mut positive_parts: Vec<String> = Vec::new();

    let main_prompt = clean_text(prompt);
    if !main_prompt.is_empty() {
        positive_parts.push(main_prompt);
    }

    if let Some(style) = style {
        if !style.name.is_empty() {
            positive_parts.push(format!("Style: {}", clean_text(&style.name)));
        }
        if let Some(tagline) = style.tagline.as_deref() {
            let tagline = clean_text(tagline);
            if !tagline.is_empty() {
                positive_parts.push(tagline);
            }
        }
    }

    for extra in extras {
        let extra = clean_text(extra);
        if !extra.is_empty() {
            positive_parts.push(extra);
        }
    }

    let negative = negative_prompt
        .map(clean_text)
        .filter(|text| !text.is_empty());

    ComposedPrompt {
        positive: positive_parts.join(" | "),
        negative,
    }
}
