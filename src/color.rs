//! Series colors.
//!
//! [`Rgba`] and [`Hsla`] are the color representations; [`ColorRegistry`]
//! hands out stable colors per color-by dimension and category. A category
//! keeps its color for the lifetime of the registry, so the same severity
//! grade has the same color on every chart a process renders.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Serialize, Serializer};
use tracing::{trace, warn};

use crate::value::EMPTY;

/// RGBA color with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
    /// Alpha component (0-255, 255 = fully opaque).
    pub a: u8,
}

impl Rgba {
    /// Create a new RGBA color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 255).
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// `#rrggbb` for opaque colors, `#rrggbbaa` otherwise.
    #[must_use]
    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// HSLA color with floating-point components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsla {
    /// Hue (0.0-360.0 degrees).
    pub h: f32,
    /// Saturation (0.0-1.0).
    pub s: f32,
    /// Lightness (0.0-1.0).
    pub l: f32,
    /// Alpha (0.0-1.0).
    pub a: f32,
}

impl Hsla {
    /// Create a new HSLA color.
    #[must_use]
    pub const fn new(h: f32, s: f32, l: f32, a: f32) -> Self {
        Self { h, s, l, a }
    }

    /// Create an opaque HSL color (alpha = 1.0).
    #[must_use]
    pub const fn hsl(h: f32, s: f32, l: f32) -> Self {
        Self::new(h, s, l, 1.0)
    }

    /// Convert to RGBA.
    #[must_use]
    pub fn to_rgba(self) -> Rgba {
        let h = self.h.rem_euclid(360.0) / 360.0;
        let (s, l) = (self.s, self.l);

        let (r, g, b) = if s == 0.0 {
            (l, l, l)
        } else {
            let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
            let p = 2.0 * l - q;
            (
                hue_to_rgb(p, q, h + 1.0 / 3.0),
                hue_to_rgb(p, q, h),
                hue_to_rgb(p, q, h - 1.0 / 3.0),
            )
        };

        Rgba::new(
            channel(r),
            channel(g),
            channel(b),
            channel(self.a),
        )
    }
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

impl From<Hsla> for Rgba {
    fn from(hsla: Hsla) -> Self {
        hsla.to_rgba()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Default series palette (distinct, colorblind-friendly).
pub const DEFAULT_PALETTE: &[Rgba] = &[
    Rgba::rgb(66, 133, 244),  // Blue
    Rgba::rgb(234, 67, 53),   // Red
    Rgba::rgb(52, 168, 83),   // Green
    Rgba::rgb(251, 188, 5),   // Yellow
    Rgba::rgb(171, 71, 188),  // Purple
    Rgba::rgb(255, 112, 67),  // Orange
    Rgba::rgb(0, 172, 193),   // Cyan
    Rgba::rgb(121, 85, 72),   // Brown
];

/// Color of the empty category.
pub const EMPTY_COLOR: Rgba = Rgba::rgb(189, 189, 189);

const GOLDEN_ANGLE: f32 = 137.507_77;

#[derive(Debug, Default)]
struct DimensionColors {
    assigned: RwLock<HashMap<String, Rgba>>,
    next: AtomicUsize,
}

/// Stable category colors per color-by dimension.
///
/// Shared across requests; the first time a category is seen it takes the
/// next palette color, and once the palette is used up colors are generated
/// by stepping the hue by the golden angle.
#[derive(Debug)]
pub struct ColorRegistry {
    palette: Vec<Rgba>,
    dimensions: RwLock<HashMap<String, Arc<DimensionColors>>>,
}

impl Default for ColorRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec())
    }
}

impl ColorRegistry {
    /// Create a registry with the given palette.
    #[must_use]
    pub fn new(palette: Vec<Rgba>) -> Self {
        Self {
            palette,
            dimensions: RwLock::new(HashMap::new()),
        }
    }

    /// Color of `category` within `dimension`, assigning one if needed.
    pub fn color_for(&self, dimension: &str, category: &str) -> Rgba {
        if category == EMPTY {
            return EMPTY_COLOR;
        }
        let colors = self.dimension(dimension);
        if let Some(color) = colors
            .assigned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
        {
            return *color;
        }

        let mut assigned = colors.assigned.write().unwrap_or_else(PoisonError::into_inner);
        *assigned.entry(category.to_string()).or_insert_with(|| {
            let index = colors.next.fetch_add(1, Ordering::Relaxed);
            let color = self.generate(index);
            trace!(dimension, category, index, color = %color, "assigned series color");
            color
        })
    }

    /// Colors assigned so far within `dimension`.
    #[must_use]
    pub fn assigned(&self, dimension: &str) -> HashMap<String, Rgba> {
        self.dimensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dimension)
            .map(|d| d.assigned.read().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Forget all assignments.
    pub fn reset(&self) {
        self.dimensions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn dimension(&self, dimension: &str) -> Arc<DimensionColors> {
        if let Some(colors) = self
            .dimensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dimension)
        {
            return Arc::clone(colors);
        }
        let mut dimensions = self.dimensions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(dimensions.entry(dimension.to_string()).or_default())
    }

    fn generate(&self, index: usize) -> Rgba {
        if let Some(color) = self.palette.get(index) {
            return *color;
        }
        let step = index - self.palette.len();
        if step == 0 {
            warn!(
                palette = self.palette.len(),
                "series palette exhausted, generating colors"
            );
        }
        let hue = (step as f32 * GOLDEN_ANGLE).rem_euclid(360.0);
        Hsla::hsl(hue, 0.65, 0.5).to_rgba()
    }
}
