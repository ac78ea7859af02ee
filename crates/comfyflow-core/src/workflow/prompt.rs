//! Prompt splitting for dual-encoder FLUX conditioning.
//!
//! `CLIPTextEncodeFlux` takes a short style prompt for CLIP-L and a full
//! descriptive prompt for T5-XXL. Comma-separated segments that carry style
//! vocabulary go to CLIP-L; T5 always receives the whole prompt.
//!
//! Vocabulary matches whole words only, so "4k" does not fire inside
//! "14k gold". Segments that are a known synonym are rewritten to their
//! canonical term before reaching CLIP-L.

/// Style vocabulary by category.
const STYLE_KEYWORDS: &[&[&str]] = &[
    // artists and platforms
    &[
        "by greg rutkowski", "by artgerm", "by wlop", "by alphonse mucha", "by makoto shinkai",
        "by hayao miyazaki", "trending on artstation", "artstation", "deviantart", "pixiv",
        "concept art", "illustration", "artwork", "digital painting",
    ],
    // art styles
    &[
        "photorealistic", "realistic", "hyperrealistic", "anime", "manga", "cartoon",
        "oil painting", "watercolor", "sketch", "digital art", "3d render", "cgi", "pixel art",
        "cinematic", "film still", "surreal", "surrealism", "impressionist", "minimalist",
        "pop art", "art nouveau", "art deco", "cyberpunk", "steampunk", "fantasy art",
    ],
    // lighting
    &[
        "lighting", "golden hour", "volumetric", "rim light", "backlit", "soft light",
        "dramatic light", "neon", "studio light", "god rays",
    ],
    // photography
    &[
        "bokeh", "depth of field", "wide angle", "close-up", "macro", "telephoto", "35mm",
        "85mm", "long exposure", "dslr", "shot on",
    ],
    // quality
    &[
        "masterpiece", "best quality", "high quality", "highly detailed", "ultra detailed",
        "intricate", "sharp focus", "4k", "8k", "hdr", "award winning",
    ],
    // rendering
    &[
        "unreal engine", "octane render", "ray tracing", "raytraced", "path tracing",
        "blender", "vray", "redshift render", "subsurface scattering", "global illumination",
    ],
    // color and mood
    &[
        "pastel colors", "monochrome", "black and white", "sepia", "high contrast",
        "muted colors", "vibrant colors", "color grading", "moody", "ethereal",
    ],
    // texture and material
    &["film grain", "glossy", "matte finish", "brushstrokes", "impasto", "metallic sheen"],
];

/// Synonyms mapped to their canonical style term.
const STYLE_SYNONYMS: &[(&str, &[&str])] = &[
    ("photorealistic", &["photo-realistic", "photo realistic", "lifelike", "true-to-life", "true to life"]),
    ("hyperrealistic", &["hyper-realistic", "hyper realistic", "ultra realistic", "ultrarealistic"]),
    ("depth of field", &["dof", "depth-of-field", "focal depth", "focus depth"]),
    ("bokeh", &["bokeh effect", "background blur", "out of focus background"]),
    ("cinematic", &["filmic", "movie-like", "film-style", "theatrical", "cinema style"]),
    ("anime", &["anime-style", "japanese animation", "animestyle"]),
    ("manga", &["manga-style", "japanese comic", "mangastyle"]),
    ("3d render", &["3d-render", "3d rendering", "3d-rendering", "three dimensional", "cgi render"]),
    ("digital art", &["digital-art", "digital artwork", "digitalart"]),
    ("4k", &["4k resolution", "4k quality", "ultra hd", "uhd", "3840x2160", "4096x2160"]),
    ("8k", &["8k resolution", "8k quality", "7680x4320", "8192x4320"]),
    ("high quality", &["high-quality", "hq", "hi quality", "hi-quality", "highquality"]),
    ("masterpiece", &["master piece", "master-piece", "magnum opus"]),
    ("golden hour", &["golden-hour", "magic hour", "sunset light", "sunrise light"]),
    ("rim lighting", &["rim-lighting", "rimlight", "edge lighting"]),
    ("volumetric lighting", &["volumetric-lighting", "light rays", "sun rays"]),
    ("octane render", &["octane-render", "octanerender", "otoy octane"]),
    ("unreal engine", &["unreal-engine", "ue4", "ue5", "unrealengine"]),
    ("ray tracing", &["ray-tracing", "raytracing", "rtx"]),
];

/// Multi-word styles recognized as a unit.
const COMPOUND_STYLES: &[&str] = &[
    "studio ghibli style", "pixar style", "disney style", "dreamworks style", "marvel style",
    "art nouveau style", "art deco style", "pop art style", "street art style", "graffiti style",
    "final fantasy style", "national geographic style", "fashion photography",
    "portrait photography", "landscape photography", "street photography", "wildlife photography",
    "macro photography", "van gogh style", "monet style", "rembrandt style", "tim burton style",
    "wes anderson style", "physically based rendering", "ambient occlusion",
    "chromatic aberration", "motion blur", "lens flare", "cinematic lighting", "dramatic lighting",
    "studio lighting", "natural lighting", "volumetric fog", "atmospheric perspective",
    "ultra high definition", "professional quality", "cyberpunk aesthetic", "vaporwave aesthetic",
    "synthwave aesthetic", "minimalist design", "brutalist architecture", "gothic architecture",
];

/// Single-word adjectives that describe look rather than subject.
const STYLE_ADJECTIVES: &[&[&str]] = &[
    // quality
    &[
        "sharp", "blur", "blurry", "clear", "crisp", "clean", "smooth", "grainy", "pristine",
        "flawless", "polished",
    ],
    // artistic
    &[
        "abstract", "surreal", "minimal", "minimalist", "ornate", "baroque", "gothic", "vintage",
        "retro", "futuristic", "avant-garde",
    ],
    // visual
    &[
        "bright", "dark", "dim", "vibrant", "vivid", "muted", "saturated", "desaturated", "warm",
        "cool", "soft", "harsh", "subtle", "bold", "pale",
    ],
    // mood
    &[
        "dramatic", "peaceful", "chaotic", "serene", "calm", "mysterious", "mystical", "magical",
        "epic", "romantic", "melancholic", "nostalgic", "whimsical", "gloomy", "ominous", "eerie",
        "dreamy", "ethereal", "moody", "atmospheric",
    ],
    // detail
    &["intricate", "elaborate", "detailed", "sophisticated", "delicate", "masterful"],
];

/// Words allowed between adjectives in an adjective-only segment.
const CONNECTORS: &[&str] = &["and", "very", "&"];

/// The two halves of a split prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPrompt {
    pub clip_l: String,
    pub t5xxl: String,
}

/// True when `term` occurs in `text` bounded by non-alphanumeric characters.
fn contains_term(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// The canonical style term for a known synonym, otherwise `term` unchanged.
pub fn normalize_style_term(term: &str) -> &str {
    let lower = term.trim().to_lowercase();
    STYLE_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&lower.as_str()))
        .map_or(term, |(canonical, _)| *canonical)
}

/// True for a single word that describes look or mood, case-insensitively.
pub fn is_style_adjective(word: &str) -> bool {
    let lower = word.to_lowercase();
    STYLE_ADJECTIVES.iter().any(|c| c.contains(&lower.as_str()))
}

fn is_style_segment(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    let mut vocabulary = STYLE_KEYWORDS
        .iter()
        .flat_map(|c| c.iter())
        .chain(COMPOUND_STYLES)
        .chain(STYLE_SYNONYMS.iter().flat_map(|(_, synonyms)| synonyms.iter()));
    if vocabulary.any(|term| contains_term(&lower, term)) {
        return true;
    }

    let mut words = lower.split_whitespace().filter(|w| !CONNECTORS.contains(w)).peekable();
    words.peek().is_some() && words.all(is_style_adjective)
}

/// Splits `prompt` for CLIP-L and T5-XXL.
///
/// When no segment carries style vocabulary, CLIP-L receives the whole prompt.
pub fn split_prompt(prompt: &str) -> SplitPrompt {
    let prompt = prompt.trim();
    let style: Vec<&str> = prompt
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && is_style_segment(s))
        .map(normalize_style_term)
        .collect();

    let clip_l = if style.is_empty() { prompt.to_string() } else { style.join(", ") };
    SplitPrompt { clip_l, t5xxl: prompt.to_string() }
}
