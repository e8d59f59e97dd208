use foundation::math::DEFAULT_MAX_STEP_RAD;
use scene::object::{LabelStyle, Material, Rgba};

/// Stroke and optional fill for boundary layers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundaryStyle {
    pub color: Rgba,
    pub opacity: f32,
    /// Radius the outline is drawn at; slightly above 1 to avoid z-fighting.
    pub radius: f64,
    pub max_step_rad: f64,
    pub fill: Option<FillStyle>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FillStyle {
    pub color: Rgba,
    pub opacity: f32,
    pub radius: f64,
}

impl BoundaryStyle {
    pub const fn new(color: Rgba, opacity: f32, radius: f64) -> Self {
        Self {
            color,
            opacity,
            radius,
            max_step_rad: DEFAULT_MAX_STEP_RAD,
            fill: None,
        }
    }

    pub fn with_fill(mut self, fill: FillStyle) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn material(&self) -> Material {
        Material::new(self.color, self.opacity)
    }
}

impl Default for BoundaryStyle {
    fn default() -> Self {
        Self::new([1.0, 1.0, 1.0, 1.0], 0.8, 1.002)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointStyle {
    pub color: Rgba,
    pub opacity: f32,
    pub size_px: f32,
    pub radius: f64,
}

impl PointStyle {
    pub fn material(&self) -> Material {
        Material::new(self.color, self.opacity)
    }
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 0.85, 0.2, 1.0],
            opacity: 1.0,
            size_px: 5.0,
            radius: 1.004,
        }
    }
}

/// How a labeled layer turns features into text.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelConfig {
    pub text_key: String,
    pub rank_key: String,
    /// Rank assumed for features without a usable rank property.
    pub default_rank: f64,
    pub max_text_len: usize,
    pub radius: f64,
    pub style: LabelStyle,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            text_key: "name".to_string(),
            rank_key: "rank".to_string(),
            default_rank: 3.0,
            max_text_len: 256,
            radius: 1.01,
            style: LabelStyle::default(),
        }
    }
}
