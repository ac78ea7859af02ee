//! Target dimensions for source images.
//!
//! Image-to-image and reference pipelines scale their input to the requested
//! size before encoding it. Each family accepts a bounded range of edge
//! lengths; sizes outside it are rescaled with the aspect ratio clamped to
//! 9:21..21:9 and both edges rounded to the family's step.

use serde::Serialize;

use crate::registry::ModelFamily;

const MIN_RATIO: f64 = 9.0 / 21.0;
const MAX_RATIO: f64 = 21.0 / 9.0;

/// Edge-length limits of one model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl SizeLimits {
    pub const fn for_family(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Flux => Self { min: 256, max: 1440, step: 32 },
            ModelFamily::Sd3 | ModelFamily::Sdxl => Self { min: 512, max: 2048, step: 64 },
            ModelFamily::Sd1 => Self { min: 256, max: 768, step: 64 },
        }
    }

    /// True when both edges lie within the limits.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        (self.min..=self.max).contains(&width) && (self.min..=self.max).contains(&height)
    }

    fn snap(&self, edge: f64) -> u32 {
        let step = f64::from(self.step);
        let snapped = ((edge / step).round() * step) as u32;
        snapped.clamp(self.min, self.max)
    }
}

/// Result of [`target_dimensions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
    pub needs_resize: bool,
}

/// Fits `width`×`height` into the limits of `family`.
///
/// Accepted sizes come back unchanged. Zero edges are treated as one pixel.
pub fn target_dimensions(width: u32, height: u32, family: ModelFamily) -> TargetDimensions {
    let limits = SizeLimits::for_family(family);
    let (width, height) = (width.max(1), height.max(1));
    if limits.accepts(width, height) {
        return TargetDimensions { width, height, needs_resize: false };
    }

    let (w, h) = (f64::from(width), f64::from(height));
    let ratio = (w / h).clamp(MIN_RATIO, MAX_RATIO);
    let long = w.max(h);
    let (mut w, mut h) = if ratio >= 1.0 { (long, long / ratio) } else { (long * ratio, long) };

    let down = (f64::from(limits.max) / w).min(f64::from(limits.max) / h).min(1.0);
    w *= down;
    h *= down;
    let up = (f64::from(limits.min) / w).max(f64::from(limits.min) / h).max(1.0);
    w *= up;
    h *= up;

    TargetDimensions { width: limits.snap(w), height: limits.snap(h), needs_resize: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(width: u32, height: u32, family: ModelFamily) -> (u32, u32, bool) {
        let t = target_dimensions(width, height, family);
        (t.width, t.height, t.needs_resize)
    }

    #[test]
    fn test_accepted_sizes_unchanged() {
        assert_eq!(fit(1024, 768, ModelFamily::Flux), (1024, 768, false));
        assert_eq!(fit(1440, 256, ModelFamily::Flux), (1440, 256, false));
        assert_eq!(fit(1000, 600, ModelFamily::Flux), (1000, 600, false));
        assert_eq!(fit(512, 512, ModelFamily::Sd1), (512, 512, false));
        assert_eq!(fit(768, 768, ModelFamily::Sd1), (768, 768, false));
        assert_eq!(fit(256, 256, ModelFamily::Sd1), (256, 256, false));
        assert_eq!(fit(1024, 1024, ModelFamily::Sd3), (1024, 1024, false));
        assert_eq!(fit(1024, 1024, ModelFamily::Sdxl), (1024, 1024, false));
    }

    #[test]
    fn test_oversized_scaled_down_to_step() {
        assert_eq!(fit(1920, 1080, ModelFamily::Flux), (1440, 800, true));
        assert_eq!(fit(10_000, 10_000, ModelFamily::Flux), (1440, 1440, true));
        assert_eq!(fit(1000, 800, ModelFamily::Sd1), (768, 640, true));
        assert_eq!(fit(2500, 2500, ModelFamily::Sdxl), (2048, 2048, true));
    }

    #[test]
    fn test_undersized_scaled_up() {
        assert_eq!(fit(100, 200, ModelFamily::Flux), (256, 512, true));
        assert_eq!(fit(300, 400, ModelFamily::Sd3), (512, 704, true));
        assert_eq!(fit(0, 0, ModelFamily::Flux), (256, 256, true));
        assert_eq!(fit(1, 1, ModelFamily::Sd1), (256, 256, true));
    }

    #[test]
    fn test_extreme_ratio_clamped() {
        assert_eq!(fit(2000, 800, ModelFamily::Flux), (1440, 608, true));
        assert_eq!(fit(4000, 300, ModelFamily::Sdxl), (2048, 896, true));

        let (w, h, _) = fit(1000, 3000, ModelFamily::Flux);
        assert_eq!(h, 1440);
        assert_eq!(w % 32, 0);
        assert!(f64::from(h) / f64::from(w) <= MAX_RATIO + 0.1);
    }

    #[test]
    fn test_every_family_resizes_out_of_range() {
        for family in ModelFamily::ALL {
            let limits = SizeLimits::for_family(family);
            for (w, h) in [(1, 1), (10_000, 10_000), (1920, 1080), (640, 480)] {
                let t = target_dimensions(w, h, family);
                assert!(limits.accepts(t.width, t.height), "{} {}x{} -> {:?}", family, w, h, t);
                if t.needs_resize {
                    assert_eq!(t.width % limits.step, 0);
                    assert_eq!(t.height % limits.step, 0);
                }
            }
        }
    }
}
