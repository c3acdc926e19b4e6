use edit_engine::OperationError;
use once_cell::sync::Lazy;
use regex::Regex;

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:%|percent)").expect("valid percent regex"));
static SECONDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:s\b|sec|second)").expect("valid seconds regex"));
static DEGREES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+)\s*(?:°|deg|degree)").expect("valid degrees regex"));

const DEFAULT_FADE_SECS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum VideoFilter {
    Grayscale,
    Sepia,
    Invert,
    /// Offset in [-1, 1].
    Brightness(f64),
    /// Multiplier, 1.0 leaves the image unchanged.
    Contrast(f64),
    Saturation(f64),
    Blur,
    Sharpen,
    Mirror,
    FlipVertical,
    /// Clockwise, in degrees.
    Rotate(i32),
    FadeIn(f64),
    FadeOut(f64),
    Vignette,
    /// Per-channel multipliers.
    Tint(f64, f64, f64),
}

impl VideoFilter {
    fn render(&self, duration_secs: f64) -> String {
        match self {
            VideoFilter::Grayscale => "hue=s=0".to_string(),
            VideoFilter::Sepia => {
                "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131".to_string()
            }
            VideoFilter::Invert => "negate".to_string(),
            VideoFilter::Brightness(b) => format!("eq=brightness={:.2}", b),
            VideoFilter::Contrast(c) => format!("eq=contrast={:.2}", c),
            VideoFilter::Saturation(s) => format!("eq=saturation={:.2}", s),
            VideoFilter::Blur => "gblur=sigma=6".to_string(),
            VideoFilter::Sharpen => "unsharp=5:5:1.2".to_string(),
            VideoFilter::Mirror => "hflip".to_string(),
            VideoFilter::FlipVertical => "vflip".to_string(),
            VideoFilter::Rotate(deg) => match deg.rem_euclid(360) {
                90 => "transpose=1".to_string(),
                180 => "hflip,vflip".to_string(),
                270 => "transpose=2".to_string(),
                other => format!("rotate={}*PI/180", other),
            },
            VideoFilter::FadeIn(d) => format!("fade=t=in:st=0:d={:.2}", d),
            VideoFilter::FadeOut(d) => {
                let start = (duration_secs - d).max(0.0);
                format!("fade=t=out:st={:.2}:d={:.2}", start, d)
            }
            VideoFilter::Vignette => "vignette".to_string(),
            VideoFilter::Tint(r, g, b) => format!("colorchannelmixer=rr={:.2}:gg={:.2}:bb={:.2}", r, g, b),
        }
    }
}

/// Filters recognised in one description, in a fixed application order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub filters: Vec<VideoFilter>,
}

impl FilterSpec {
    /// The `-vf` chain. Fade-out needs the clip length to place itself.
    pub fn to_vf(&self, duration_secs: f64) -> String {
        self.filters
            .iter()
            .map(|f| f.render(duration_secs))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn boundary_before(text: &str, at: usize) -> bool {
    text[..at].chars().next_back().map_or(true, |c| !c.is_alphanumeric())
}

fn boundary_after(text: &str, at: usize) -> bool {
    text[at..].chars().next().map_or(true, |c| !c.is_alphanumeric())
}

/// Any of `words` starting a word, so "blur" matches "blurry" but "red" not "bored".
fn has_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| {
        text.match_indices(w)
            .any(|(i, _)| boundary_before(text, i))
    })
}

/// Any of `words` as a whole word, so "red" does not match "reduce".
fn has_word(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| {
        text.match_indices(w)
            .any(|(i, m)| boundary_before(text, i) && boundary_after(text, i + m.len()))
    })
}

fn percent(text: &str) -> Option<f64> {
    PERCENT_RE
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|p| (p / 100.0).clamp(0.0, 1.0))
}

fn seconds(text: &str) -> Option<f64> {
    SECONDS_RE
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|s| *s > 0.0)
}

/// Map a plain-language filter description onto ffmpeg filters.
pub fn map_filter_description(description: &str) -> Result<FilterSpec, OperationError> {
    let text = description.trim().to_lowercase();
    let mut filters = Vec::new();

    if has_any(&text, &["black and white", "black & white", "b&w", "grayscale", "greyscale", "monochrome"]) {
        filters.push(VideoFilter::Grayscale);
    }
    if has_any(&text, &["sepia", "vintage", "old film", "old-timey"]) {
        filters.push(VideoFilter::Sepia);
    }
    if has_any(&text, &["invert", "negative"]) {
        filters.push(VideoFilter::Invert);
    }

    if has_any(&text, &["brighten", "brighter", "lighten", "more light", "increase brightness"]) {
        filters.push(VideoFilter::Brightness(percent(&text).unwrap_or(0.15)));
    } else if has_any(&text, &["darken", "darker", "dim", "decrease brightness", "reduce brightness"]) {
        filters.push(VideoFilter::Brightness(-percent(&text).unwrap_or(0.15)));
    }

    if text.contains("contrast") {
        let amount = percent(&text).unwrap_or(0.3);
        if has_any(&text, &["less contrast", "lower contrast", "reduce contrast", "decrease contrast"]) {
            filters.push(VideoFilter::Contrast(1.0 - amount));
        } else {
            filters.push(VideoFilter::Contrast(1.0 + amount));
        }
    }

    if has_any(&text, &["desaturate", "muted", "washed out"]) {
        filters.push(VideoFilter::Saturation(0.5));
    } else if has_any(&text, &["saturate", "vibrant", "vivid", "more color"]) {
        filters.push(VideoFilter::Saturation(1.5));
    }

    if has_any(&text, &["blur", "blurry", "soften"]) {
        filters.push(VideoFilter::Blur);
    }
    if has_any(&text, &["sharpen", "sharper", "crisp"]) {
        filters.push(VideoFilter::Sharpen);
    }

    if has_any(&text, &["upside down", "flip vertical", "vertical flip", "flip it vertically"]) {
        filters.push(VideoFilter::FlipVertical);
    } else if has_any(&text, &["mirror", "flip"]) {
        filters.push(VideoFilter::Mirror);
    }

    if text.contains("rotate") {
        let mut degrees = DEGREES_RE
            .captures(&text)
            .and_then(|c| c[1].parse::<i32>().ok())
            .unwrap_or(90);
        if has_any(&text, &["counterclockwise", "counter-clockwise", "anticlockwise", "to the left"]) {
            degrees = -degrees;
        }
        filters.push(VideoFilter::Rotate(degrees));
    }

    let fade_secs = seconds(&text).unwrap_or(DEFAULT_FADE_SECS);
    if has_any(&text, &["fade in", "fade-in", "fades in"]) {
        filters.push(VideoFilter::FadeIn(fade_secs));
    }
    if has_any(&text, &["fade out", "fade-out", "fades out", "fade to black"]) {
        filters.push(VideoFilter::FadeOut(fade_secs));
    }

    if text.contains("vignette") {
        filters.push(VideoFilter::Vignette);
    }

    if let Some(tint) = tint_for(&text) {
        filters.push(tint);
    }

    if filters.is_empty() {
        return Err(OperationError::rejected(format!(
            "unknown filter '{}'. Try something like black and white, sepia, blur, brighten, or a color tint",
            description.trim()
        )));
    }
    Ok(FilterSpec { filters })
}

fn tint_for(text: &str) -> Option<VideoFilter> {
    let tints: &[(&[&str], (f64, f64, f64))] = &[
        (&["warm", "warmer"], (1.1, 1.0, 0.85)),
        (&["cool", "cooler", "cold"], (0.85, 1.0, 1.1)),
        (&["red"], (1.0, 0.6, 0.6)),
        (&["green"], (0.6, 1.0, 0.6)),
        (&["blue"], (0.6, 0.6, 1.0)),
        (&["yellow"], (1.0, 1.0, 0.6)),
        (&["orange"], (1.0, 0.8, 0.5)),
        (&["purple", "violet"], (0.9, 0.6, 1.0)),
        (&["pink"], (1.0, 0.75, 0.85)),
    ];
    tints
        .iter()
        .find(|(words, _)| has_word(text, words))
        .map(|(_, (r, g, b))| VideoFilter::Tint(*r, *g, *b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vf(description: &str) -> String {
        map_filter_description(description).unwrap().to_vf(10.0)
    }

    #[test]
    fn common_looks() {
        assert_eq!(vf("black and white"), "hue=s=0");
        assert_eq!(vf("Grayscale"), "hue=s=0");
        assert!(vf("sepia").starts_with("colorchannelmixer=.393"));
        assert_eq!(vf("invert the colors"), "negate");
        assert_eq!(vf("make it blurry"), "gblur=sigma=6");
        assert_eq!(vf("mirror it"), "hflip");
        assert_eq!(vf("turn it upside down"), "vflip");
    }

    #[test]
    fn brightness_honours_percentages() {
        assert_eq!(vf("brighten by 30%"), "eq=brightness=0.30");
        assert_eq!(vf("darken it"), "eq=brightness=-0.15");
        assert_eq!(vf("reduce contrast by 20 percent"), "eq=contrast=0.80");
        assert_eq!(vf("bored, so blur it"), "gblur=sigma=6");
    }

    #[test]
    fn rotation_and_fades() {
        assert_eq!(vf("rotate"), "transpose=1");
        assert_eq!(vf("rotate 90 degrees counterclockwise"), "transpose=2");
        assert_eq!(vf("rotate 180 degrees"), "hflip,vflip");
        assert_eq!(vf("fade in over 2 seconds"), "fade=t=in:st=0:d=2.00");
        assert_eq!(vf("fade out"), "fade=t=out:st=9.00:d=1.00");
    }

    #[test]
    fn tints_and_combinations() {
        assert_eq!(vf("add a green tint"), "colorchannelmixer=rr=0.60:gg=1.00:bb=0.60");
        assert_eq!(vf("warm vintage look with a vignette").split(',').count(), 3);
    }

    #[test]
    fn unknown_description_is_rejected() {
        let err = map_filter_description("make it sparkle").unwrap_err();
        assert!(err.to_string().contains("unknown filter 'make it sparkle'"));
    }
}
