use std::sync::Arc;

use formats::feature::{FeatureCollection, Geometry};
use foundation::math::project_point;
use scene::graph::SceneGraph;
use scene::object::RenderObject;
use tracing::{debug, warn};

use crate::data::{Accepted, LayerData};
use crate::layer::{Layer, LayerContext, LayerCore, LayerId, LayerKind};
use crate::loader::LoadCompletion;
use crate::symbology::PointStyle;

/// Point features rendered as one marker cloud.
pub struct PointLayer {
    core: LayerCore,
    data: LayerData,
    style: PointStyle,
}

impl PointLayer {
    pub fn new(
        id: impl Into<LayerId>,
        name: impl Into<String>,
        data: LayerData,
        style: PointStyle,
    ) -> Self {
        Self {
            core: LayerCore::new(id, name),
            data,
            style,
        }
    }

    fn build(&mut self, scene: &mut SceneGraph, collection: &FeatureCollection) {
        let mut skipped = 0usize;
        let positions: Vec<_> = collection
            .features
            .iter()
            .filter_map(|f| match f.geometry {
                Geometry::Point(p) if p.is_finite() => Some(project_point(p, self.style.radius)),
                Geometry::Point(_) => {
                    skipped += 1;
                    None
                }
                _ => None,
            })
            .collect();
        if skipped > 0 {
            debug!(layer = %self.core.id(), skipped, "skipped non-finite points");
        }
        if positions.is_empty() {
            return;
        }
        let object = RenderObject::Points {
            positions,
            size_px: self.style.size_px,
            material: self.style.material(),
        };
        self.core.owned(scene).add(scene, object);
    }
}

impl Layer for PointLayer {
    fn id(&self) -> &LayerId {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Points
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn init(&mut self, ctx: &mut LayerContext<'_>) {
        self.core.owned(ctx.scene);
    }

    fn enable(&mut self, ctx: &mut LayerContext<'_>) {
        if self.core.is_enabled() {
            return;
        }
        self.core.set_enabled(true);
        let id = self.core.id().clone();
        if let Some(collection) = self.data.ensure(&id, ctx.loader, ctx.status) {
            self.build(ctx.scene, &collection);
        }
    }

    fn disable(&mut self, ctx: &mut LayerContext<'_>) {
        self.core.set_enabled(false);
        self.core.release(ctx.scene);
    }

    fn refresh(&mut self, ctx: &mut LayerContext<'_>) {
        // Disable then re-enable; the data memo is kept.
        self.disable(ctx);
        self.enable(ctx);
    }

    fn destroy(&mut self, ctx: &mut LayerContext<'_>) {
        self.disable(ctx);
    }

    fn on_load(&mut self, ctx: &mut LayerContext<'_>, completion: LoadCompletion) {
        match self.data.accept(completion) {
            Accepted::Loaded(collection) => {
                if self.core.is_enabled() && self.core.owned_len() == 0 {
                    self.build(ctx.scene, &collection);
                }
            }
            Accepted::Failed(e) => {
                warn!(layer = %self.core.id(), error = %e, "point load failed");
                ctx.status.warn(
                    self.core.id().as_str(),
                    format!("failed to load {}: {e}", self.core.name()),
                );
            }
            Accepted::Stale => debug!(layer = %self.core.id(), "discarding stale load"),
        }
    }

    fn features(&self) -> Option<Arc<FeatureCollection>> {
        self.data.features()
    }

    fn owned_len(&self) -> usize {
        self.core.owned_len()
    }

    fn release_owned(&mut self, scene: &mut SceneGraph) -> usize {
        self.core.release(scene)
    }
}
