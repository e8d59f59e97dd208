use std::sync::Arc;

use formats::feature::{Feature, FeatureCollection, Geometry, Ring};
use foundation::math::{Vec3, unit_vector};
use scene::graph::SceneGraph;
use scene::object::{Material, RenderObject};
use scene::owned::OwnedObjects;
use tracing::debug;

use crate::density::{TierSelection, rank_of};
use crate::layer::{Layer, LayerContext, LayerId, LayerKind};
use crate::loader::LoadCompletion;
use crate::symbology::LabelConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub text: String,
    pub rank: f64,
    /// Unit-sphere anchor direction.
    pub anchor: Vec3,
}

/// Labels for the features of `collection` that pass the tier's rank cutoff,
/// most important (lowest rank) first, capped at the tier's label cap.
pub fn select_labels(
    collection: &FeatureCollection,
    config: &LabelConfig,
    tier: TierSelection,
) -> Vec<LabelCandidate> {
    let cutoff = f64::from(tier.rank_cutoff);
    let mut out: Vec<LabelCandidate> = collection
        .features
        .iter()
        .filter_map(|f| label_candidate(f, config))
        .filter(|c| c.rank <= cutoff)
        .collect();

    out.sort_by(|a, b| {
        a.rank
            .partial_cmp(&b.rank)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    out.truncate(tier.label_cap);
    out
}

fn label_candidate(feature: &Feature, config: &LabelConfig) -> Option<LabelCandidate> {
    let text = feature.property_str(&config.text_key)?.trim();
    if text.is_empty() || text.len() > config.max_text_len {
        return None;
    }
    let rank = rank_of(feature.property(&config.rank_key), config.default_rank);
    Some(LabelCandidate {
        text: text.to_string(),
        rank,
        anchor: label_anchor(&feature.geometry)?,
    })
}

/// Points anchor at themselves; polygons at the spherical centroid of their
/// largest outer ring.
pub fn label_anchor(geometry: &Geometry) -> Option<Vec3> {
    match geometry {
        Geometry::Point(p) => p.is_finite().then(|| unit_vector(*p)),
        _ => geometry
            .outer_rings()
            .into_iter()
            .max_by_key(|ring| ring.len())
            .and_then(ring_centroid),
    }
}

fn ring_centroid(ring: &Ring) -> Option<Vec3> {
    let mut points: &[_] = ring;
    if points.len() >= 2 && points.first() == points.last() {
        points = &points[..points.len() - 1];
    }
    let sum = points
        .iter()
        .filter(|p| p.is_finite())
        .fold(Vec3::ZERO, |acc, p| acc + unit_vector(*p));
    sum.normalized()
}

/// Composite layer: a base layer plus floating labels derived from the base
/// layer's features. Labels are rebuilt only when the applied tier changes.
pub struct LabeledLayer {
    base: Box<dyn Layer>,
    config: LabelConfig,
    labels: Option<OwnedObjects>,
    applied_tier: Option<TierSelection>,
    rebuilds: usize,
}

impl LabeledLayer {
    pub fn new(base: Box<dyn Layer>, config: LabelConfig) -> Self {
        Self {
            base,
            config,
            labels: None,
            applied_tier: None,
            rebuilds: 0,
        }
    }

    pub fn label_count(&self) -> usize {
        self.labels.as_ref().map_or(0, OwnedObjects::len)
    }

    /// How many times the label set was regenerated.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    pub fn applied_tier(&self) -> Option<TierSelection> {
        self.applied_tier
    }

    fn labels_mut(&mut self, scene: &mut SceneGraph) -> &mut OwnedObjects {
        let id = self.base.id();
        self.labels
            .get_or_insert_with(|| OwnedObjects::register(scene, format!("{id}/labels")))
    }

    fn clear_labels(&mut self, scene: &mut SceneGraph) -> usize {
        self.applied_tier = None;
        self.labels
            .as_mut()
            .map_or(0, |labels| labels.release_all(scene))
    }

    /// Disposes current labels and regenerates them for `tier`. Without
    /// loaded features nothing is built and the tier stays unapplied.
    fn rebuild_labels(&mut self, scene: &mut SceneGraph, tier: TierSelection) {
        self.clear_labels(scene);
        let Some(collection) = self.base.features() else {
            return;
        };
        let candidates = select_labels(&collection, &self.config, tier);
        let radius = self.config.radius;
        let style = self.config.style.clone();
        let material = Material::opaque(style.color);
        let labels = self.labels_mut(scene);
        for candidate in candidates {
            labels.add(
                scene,
                RenderObject::Label {
                    text: candidate.text,
                    position: candidate.anchor * radius,
                    style: style.clone(),
                    material,
                },
            );
        }
        self.applied_tier = Some(tier);
        self.rebuilds += 1;
        debug!(
            layer = %self.base.id(),
            tier = tier.index,
            labels = self.label_count(),
            "rebuilt labels"
        );
    }
}

impl Layer for LabeledLayer {
    fn id(&self) -> &LayerId {
        self.base.id()
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Labeled
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn init(&mut self, ctx: &mut LayerContext<'_>) {
        self.base.init(ctx);
        self.labels_mut(ctx.scene);
    }

    fn enable(&mut self, ctx: &mut LayerContext<'_>) {
        if self.base.is_enabled() {
            return;
        }
        self.base.enable(ctx);
        self.rebuild_labels(ctx.scene, ctx.label_tier);
    }

    fn disable(&mut self, ctx: &mut LayerContext<'_>) {
        self.base.disable(ctx);
        self.clear_labels(ctx.scene);
    }

    fn refresh(&mut self, ctx: &mut LayerContext<'_>) {
        self.clear_labels(ctx.scene);
        self.base.refresh(ctx);
        if self.base.is_enabled() {
            self.rebuild_labels(ctx.scene, ctx.label_tier);
        }
    }

    fn destroy(&mut self, ctx: &mut LayerContext<'_>) {
        self.base.destroy(ctx);
        self.clear_labels(ctx.scene);
    }

    fn on_load(&mut self, ctx: &mut LayerContext<'_>, completion: LoadCompletion) {
        self.base.on_load(ctx, completion);
        if self.base.is_enabled() && self.applied_tier.is_none() && self.base.features().is_some()
        {
            self.rebuild_labels(ctx.scene, ctx.label_tier);
        }
    }

    fn on_label_tier(&mut self, ctx: &mut LayerContext<'_>, tier: TierSelection) {
        if self.applied_tier == Some(tier) {
            return;
        }
        self.rebuild_labels(ctx.scene, tier);
    }

    fn on_frame(&mut self, ctx: &mut LayerContext<'_>, frame: &runtime::frame::Frame) {
        self.base.on_frame(ctx, frame);
    }

    fn features(&self) -> Option<Arc<FeatureCollection>> {
        self.base.features()
    }

    fn owned_len(&self) -> usize {
        self.base.owned_len() + self.label_count()
    }

    fn release_owned(&mut self, scene: &mut SceneGraph) -> usize {
        self.base.release_owned(scene) + self.clear_labels(scene)
    }
}
