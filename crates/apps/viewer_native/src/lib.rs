//! Headless globe viewer: camera, layers, label density and highlights
//! driven by one cooperative frame tick.

pub mod camera;
pub mod config;
pub mod highlight;
pub mod source;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use formats::feature::Feature;
use formats::predicate::PredicateResult;
use foundation::bounds::BoundsBox;
use futures::executor::LocalPool;
use layers::{
    FeatureLoader, FeatureSource, LabelDensityTracker, LabelTableError, Layer, LayerContext,
    LayerId, LayerInfo, LayerRegistry, RegistryError, TierSelection,
};
use runtime::frame::Frame;
use runtime::status::{StatusBus, StatusNotice};
use scene::graph::SceneGraph;
use scene::sink::FrameSink;
use tracing::{debug, info, trace, warn};

use crate::camera::CameraController;
use crate::config::{LayerSpec, ViewerConfig};
use crate::highlight::{Flash, HighlightAnimator, HighlightId};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerError {
    LabelTable(LabelTableError),
    Registry(RegistryError),
    UnknownRegion(String),
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::LabelTable(e) => write!(f, "invalid label tier table: {e}"),
            ViewerError::Registry(e) => write!(f, "{e}"),
            ViewerError::UnknownRegion(name) => write!(f, "no region named {name:?}"),
        }
    }
}

impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewerError::LabelTable(e) => Some(e),
            ViewerError::Registry(e) => Some(e),
            ViewerError::UnknownRegion(_) => None,
        }
    }
}

impl From<RegistryError> for ViewerError {
    fn from(value: RegistryError) -> Self {
        ViewerError::Registry(value)
    }
}

impl From<LabelTableError> for ViewerError {
    fn from(value: LabelTableError) -> Self {
        ViewerError::LabelTable(value)
    }
}

/// Owns every piece of per-session state and runs the frame tick.
///
/// Each [`tick`](Viewer::tick) runs, in order: camera update, label tier
/// re-evaluation, delivery of finished loads, highlight animation, layer
/// per-frame hooks, and finally the draw through a [`FrameSink`].
pub struct Viewer {
    pool: LocalPool,
    scene: SceneGraph,
    loader: FeatureLoader,
    status: StatusBus,
    registry: LayerRegistry,
    camera: CameraController,
    density: LabelDensityTracker,
    highlights: HighlightAnimator,
    regions: BTreeMap<String, BoundsBox>,
    /// Latest zoom factor reported by the camera and not yet evaluated.
    pending_zoom: Rc<Cell<Option<f64>>>,
    frame: Option<Frame>,
}

impl Viewer {
    pub fn new(config: &ViewerConfig, source: Rc<dyn FeatureSource>) -> Result<Self, ViewerError> {
        let pool = LocalPool::new();
        let loader = FeatureLoader::new(source, pool.spawner());
        let mut scene = SceneGraph::new();
        let highlights = HighlightAnimator::new(&mut scene, config.highlight.clone());

        let mut camera = CameraController::new(config.camera.clone());
        let pending_zoom = Rc::new(Cell::new(None));
        let observer = Rc::clone(&pending_zoom);
        camera.on_change(Box::new(move |zoom| observer.set(Some(zoom))));

        let mut density = LabelDensityTracker::new(config.density_policy()?);
        density.update(camera.zoom_factor());

        Ok(Self {
            pool,
            scene,
            loader,
            status: StatusBus::new(),
            registry: LayerRegistry::new(),
            camera,
            density,
            highlights,
            regions: config.region_table(),
            pending_zoom,
            frame: None,
        })
    }

    /// Builds a viewer and registers every configured layer, enabling the
    /// ones marked `enabled`.
    pub fn from_config(
        config: &ViewerConfig,
        source: Rc<dyn FeatureSource>,
    ) -> Result<Self, ViewerError> {
        let mut viewer = Self::new(config, source)?;
        for spec in &config.layers {
            viewer.add_layer_spec(spec)?;
        }
        Ok(viewer)
    }

    pub fn add_layer_spec(&mut self, spec: &LayerSpec) -> Result<(), ViewerError> {
        let id = LayerId::new(spec.id.clone());
        self.register_layer(spec.build())?;
        if spec.enabled {
            self.enable_layer(&id)?;
        }
        Ok(())
    }

    fn parts(&mut self) -> (&mut LayerRegistry, LayerContext<'_>) {
        let label_tier = self.density.current();
        (
            &mut self.registry,
            LayerContext {
                scene: &mut self.scene,
                loader: &mut self.loader,
                status: &mut self.status,
                label_tier,
            },
        )
    }

    pub fn register_layer(&mut self, layer: Box<dyn Layer>) -> Result<(), ViewerError> {
        let (registry, mut ctx) = self.parts();
        Ok(registry.register(layer, &mut ctx)?)
    }

    pub fn unregister_layer(&mut self, id: &LayerId) -> Result<(), ViewerError> {
        let (registry, mut ctx) = self.parts();
        Ok(registry.unregister(id, &mut ctx)?)
    }

    pub fn enable_layer(&mut self, id: &LayerId) -> Result<bool, ViewerError> {
        let (registry, mut ctx) = self.parts();
        Ok(registry.enable_layer(id, &mut ctx)?)
    }

    pub fn disable_layer(&mut self, id: &LayerId) -> Result<bool, ViewerError> {
        let (registry, mut ctx) = self.parts();
        Ok(registry.disable_layer(id, &mut ctx)?)
    }

    pub fn toggle_layer(&mut self, id: &LayerId, enabled: bool) -> Result<bool, ViewerError> {
        let (registry, mut ctx) = self.parts();
        Ok(registry.toggle_layer(id, enabled, &mut ctx)?)
    }

    pub fn refresh_layer(&mut self, id: &LayerId) -> Result<bool, ViewerError> {
        let (registry, mut ctx) = self.parts();
        Ok(registry.refresh_layer(id, &mut ctx)?)
    }

    pub fn is_layer_enabled(&self, id: &LayerId) -> bool {
        self.registry.is_enabled(id)
    }

    pub fn layers(&self) -> Vec<LayerInfo> {
        self.registry.list()
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    /// Camera changes made here are picked up by the next tick.
    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn highlights(&self) -> &HighlightAnimator {
        &self.highlights
    }

    pub fn label_tier(&self) -> TierSelection {
        self.density.current()
    }

    pub fn regions(&self) -> &BTreeMap<String, BoundsBox> {
        &self.regions
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.frame
    }

    pub fn drain_notices(&mut self) -> Vec<StatusNotice> {
        self.status.drain()
    }

    pub fn focus_on(&mut self, bounds: &BoundsBox) -> bool {
        self.camera.focus_on(bounds)
    }

    pub fn focus_region(&mut self, name: &str) -> Result<(), ViewerError> {
        let bounds = self.region(name)?;
        self.camera.focus_on(&bounds);
        info!(region = name, "focused region");
        Ok(())
    }

    /// Fits the camera to the extent of a layer's loaded features. Returns
    /// `Ok(false)` while the layer has no data or no drawable extent.
    pub fn focus_layer(&mut self, id: &LayerId) -> Result<bool, ViewerError> {
        let collection = self
            .registry
            .get(id)
            .ok_or_else(|| RegistryError::UnknownLayer(id.clone()))?
            .features();
        let Some(bounds) = collection.and_then(|fc| fc.bounds()) else {
            return Ok(false);
        };
        Ok(self.camera.focus_on(&bounds))
    }

    fn region(&self, name: &str) -> Result<BoundsBox, ViewerError> {
        self.regions
            .get(name)
            .copied()
            .ok_or_else(|| ViewerError::UnknownRegion(name.to_string()))
    }

    fn now_ms(&self) -> f64 {
        self.frame.map_or(0.0, |f| f.now_ms)
    }

    pub fn flash_bounds(&mut self, bounds: &BoundsBox, flash: Flash) -> Option<HighlightId> {
        let now = self.now_ms();
        self.highlights
            .flash_bounds(&mut self.scene, bounds, flash, now)
    }

    pub fn flash_region(
        &mut self,
        name: &str,
        flash: Flash,
    ) -> Result<Option<HighlightId>, ViewerError> {
        let bounds = self.region(name)?;
        Ok(self.flash_bounds(&bounds, flash))
    }

    /// Flashes the first feature of a layer's loaded collection that the
    /// predicate accepts. A layer without loaded data flashes nothing.
    pub fn flash_feature(
        &mut self,
        layer: &LayerId,
        predicate: &dyn Fn(&Feature) -> PredicateResult,
        flash: Flash,
    ) -> Result<Option<HighlightId>, ViewerError> {
        let collection = self
            .registry
            .get(layer)
            .ok_or_else(|| RegistryError::UnknownLayer(layer.clone()))?
            .features();
        let Some(collection) = collection else {
            debug!(layer = %layer, "no features loaded to flash");
            return Ok(None);
        };
        let now = self.now_ms();
        Ok(self
            .highlights
            .flash_matching(&mut self.scene, &collection, predicate, flash, now))
    }

    pub fn cancel_highlight(&mut self, id: HighlightId) -> bool {
        self.highlights.cancel(&mut self.scene, id)
    }

    /// Runs one frame at host time `now_ms` and presents the scene.
    pub fn tick(&mut self, now_ms: f64, sink: &mut dyn FrameSink) -> Frame {
        let frame = match self.frame {
            Some(prev) => prev.next(now_ms),
            None => Frame::first(now_ms),
        };
        self.frame = Some(frame);
        self.status.begin_frame(frame);

        self.camera.update(frame.dt_s);

        if let Some(zoom) = self.pending_zoom.take() {
            if let Some(tier) = self.density.update(zoom) {
                debug!(zoom, tier = tier.index, "label tier changed");
                let (registry, mut ctx) = self.parts();
                registry.apply_label_tier(tier, &mut ctx);
            }
        }

        self.pool.run_until_stalled();
        let delivered = {
            let (registry, mut ctx) = self.parts();
            registry.dispatch_loads(&mut ctx)
        };
        if delivered > 0 {
            trace!(frame = frame.index, delivered, "delivered loads");
        }

        let finished = self.highlights.tick(&mut self.scene, frame.now_ms);
        if finished > 0 {
            trace!(frame = frame.index, finished, "highlights finished");
        }

        {
            let (registry, mut ctx) = self.parts();
            registry.tick(&frame, &mut ctx);
        }

        sink.present(&frame, &self.scene);
        frame
    }

    /// Releases every layer and highlight.
    pub fn shutdown(&mut self) {
        let ids: Vec<LayerId> = self.registry.list().into_iter().map(|l| l.id).collect();
        for id in ids {
            if let Err(e) = self.unregister_layer(&id) {
                warn!(layer = %id, error = %e, "failed to unregister layer");
            }
        }
        self.highlights.clear(&mut self.scene);
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("frame", &self.frame)
            .field("layers", &self.registry)
            .field("camera", &self.camera)
            .field("objects", &self.scene.len())
            .finish()
    }
}
