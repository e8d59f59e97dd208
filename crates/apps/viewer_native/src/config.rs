use std::collections::BTreeMap;
use std::path::Path;

use formats::predicate::{FeaturePredicate, property_equals, property_in};
use foundation::bounds::BoundsBox;
use layers::{
    BoundaryLayer, BoundaryStyle, FillStyle, LabelConfig, LabelDensityPolicy, LabelDensityTier,
    LabelTableError, LabeledLayer, Layer, LayerData, PointLayer, PointStyle,
};
use scene::object::Rgba;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::camera::CameraConfig;
use crate::highlight::HighlightConfig;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {e}"),
            ConfigError::Json(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
        }
    }
}

/// Viewer configuration; every field has a default, so `{}` is valid.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub highlight: HighlightConfig,
    /// Empty means the built-in table.
    pub label_tiers: Vec<TierSpec>,
    pub regions: BTreeMap<String, RegionSpec>,
    pub layers: Vec<LayerSpec>,
}

impl ViewerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn density_policy(&self) -> Result<LabelDensityPolicy, LabelTableError> {
        if self.label_tiers.is_empty() {
            return Ok(LabelDensityPolicy::default());
        }
        LabelDensityPolicy::new(self.label_tiers.iter().map(TierSpec::to_tier).collect())
    }

    /// Named regions with valid bounds; invalid entries are skipped.
    pub fn region_table(&self) -> BTreeMap<String, BoundsBox> {
        self.regions
            .iter()
            .filter_map(|(name, spec)| match spec.bounds() {
                Some(bounds) => Some((name.clone(), bounds)),
                None => {
                    warn!(region = %name, "ignoring region with invalid bounds");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierSpec {
    /// Absent means unbounded.
    #[serde(default)]
    pub max_zoom: Option<f64>,
    pub rank_cutoff: u32,
    pub label_cap: usize,
}

impl TierSpec {
    fn to_tier(&self) -> LabelDensityTier {
        LabelDensityTier::new(
            self.max_zoom.unwrap_or(f64::INFINITY),
            self.rank_cutoff,
            self.label_cap,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct RegionSpec {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionSpec {
    pub fn bounds(&self) -> Option<BoundsBox> {
        BoundsBox::new(self.min_lat, self.max_lat, self.min_lon, self.max_lon)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpecKind {
    Boundary,
    Points,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    Equals { property: String, equals: Value },
    AnyOf { property: String, any_of: Vec<String> },
}

impl FilterSpec {
    pub fn predicate(&self) -> FeaturePredicate {
        match self {
            FilterSpec::Equals { property, equals } => {
                property_equals(property.clone(), equals.clone())
            }
            FilterSpec::AnyOf { property, any_of } => {
                property_in(property.clone(), any_of.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StyleSpec {
    pub color: Rgba,
    pub opacity: f32,
    pub fill: Option<Rgba>,
    pub fill_opacity: f32,
    pub size_px: f32,
}

impl Default for StyleSpec {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            opacity: 0.8,
            fill: None,
            fill_opacity: 0.25,
            size_px: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LabelSpec {
    pub text_key: String,
    pub rank_key: String,
    pub default_rank: f64,
}

impl Default for LabelSpec {
    fn default() -> Self {
        let defaults = LabelConfig::default();
        Self {
            text_key: defaults.text_key,
            rank_key: defaults.rank_key,
            default_rank: defaults.default_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: LayerSpecKind,
    /// Source key handed to the feature source (a path for the file source).
    pub source: String,
    #[serde(default)]
    pub filter: Option<FilterSpec>,
    #[serde(default)]
    pub labels: Option<LabelSpec>,
    #[serde(default)]
    pub style: StyleSpec,
    #[serde(default)]
    pub enabled: bool,
}

impl LayerSpec {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn build(&self) -> Box<dyn Layer> {
        let data = LayerData::remote(self.source.clone());
        let name = self.display_name().to_string();
        let style = &self.style;

        let base: Box<dyn Layer> = match self.kind {
            LayerSpecKind::Boundary => {
                let mut boundary = BoundaryStyle {
                    color: style.color,
                    opacity: style.opacity,
                    ..BoundaryStyle::default()
                };
                if let Some(fill) = style.fill {
                    boundary = boundary.with_fill(FillStyle {
                        color: fill,
                        opacity: style.fill_opacity,
                        radius: 1.001,
                    });
                }
                match &self.filter {
                    Some(filter) => Box::new(BoundaryLayer::filtered(
                        self.id.clone(),
                        name,
                        data,
                        boundary,
                        filter.predicate(),
                    )),
                    None => Box::new(BoundaryLayer::new(self.id.clone(), name, data, boundary)),
                }
            }
            LayerSpecKind::Points => Box::new(PointLayer::new(
                self.id.clone(),
                name,
                data,
                PointStyle {
                    color: style.color,
                    opacity: style.opacity,
                    size_px: style.size_px,
                    ..PointStyle::default()
                },
            )),
        };

        match &self.labels {
            Some(spec) => Box::new(LabeledLayer::new(
                base,
                LabelConfig {
                    text_key: spec.text_key.clone(),
                    rank_key: spec.rank_key.clone(),
                    default_rank: spec.default_rank,
                    ..LabelConfig::default()
                },
            )),
            None => base,
        }
    }
}
