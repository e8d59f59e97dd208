use runtime::frame::Frame;
use tracing::{debug, info, warn};

use crate::density::TierSelection;
use crate::layer::{Layer, LayerContext, LayerId, LayerInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateId(LayerId),
    UnknownLayer(LayerId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateId(id) => write!(f, "layer {id:?} is already registered"),
            RegistryError::UnknownLayer(id) => write!(f, "no layer registered as {id:?}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Owns the registered layers, in registration order, and drives their
/// lifecycle. Enable and disable are idempotent.
#[derive(Default)]
pub struct LayerRegistry {
    layers: Vec<Box<dyn Layer>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn position(&self, id: &LayerId) -> Result<usize, RegistryError> {
        self.layers
            .iter()
            .position(|l| l.id() == id)
            .ok_or_else(|| RegistryError::UnknownLayer(id.clone()))
    }

    pub fn get(&self, id: &LayerId) -> Option<&dyn Layer> {
        self.layers.iter().find(|l| l.id() == id).map(|l| &**l)
    }

    /// Stores `layer` and calls its `init` exactly once.
    pub fn register(
        &mut self,
        mut layer: Box<dyn Layer>,
        ctx: &mut LayerContext<'_>,
    ) -> Result<(), RegistryError> {
        if self.layers.iter().any(|l| l.id() == layer.id()) {
            return Err(RegistryError::DuplicateId(layer.id().clone()));
        }
        layer.init(ctx);
        debug!(layer = %layer.id(), kind = ?layer.kind(), "registered layer");
        self.layers.push(layer);
        Ok(())
    }

    /// Destroys and removes a layer; its render objects are released.
    pub fn unregister(
        &mut self,
        id: &LayerId,
        ctx: &mut LayerContext<'_>,
    ) -> Result<(), RegistryError> {
        let index = self.position(id)?;
        let mut layer = self.layers.remove(index);
        layer.destroy(ctx);
        sweep_leftovers(&mut *layer, ctx);
        debug!(layer = %id, "unregistered layer");
        Ok(())
    }

    /// Returns `Ok(false)` if the layer was already enabled.
    pub fn enable_layer(
        &mut self,
        id: &LayerId,
        ctx: &mut LayerContext<'_>,
    ) -> Result<bool, RegistryError> {
        let index = self.position(id)?;
        let layer = &mut self.layers[index];
        if layer.is_enabled() {
            return Ok(false);
        }
        layer.enable(ctx);
        info!(layer = %id, "enabled layer");
        ctx.status.info(id.as_str(), format!("{} shown", layer.name()));
        Ok(true)
    }

    /// Returns `Ok(false)` if the layer was already disabled. After a
    /// successful disable the layer owns no render objects.
    pub fn disable_layer(
        &mut self,
        id: &LayerId,
        ctx: &mut LayerContext<'_>,
    ) -> Result<bool, RegistryError> {
        let index = self.position(id)?;
        let layer = &mut self.layers[index];
        if !layer.is_enabled() {
            return Ok(false);
        }
        layer.disable(ctx);
        sweep_leftovers(&mut **layer, ctx);
        info!(layer = %id, "disabled layer");
        ctx.status.info(id.as_str(), format!("{} hidden", layer.name()));
        Ok(true)
    }

    pub fn toggle_layer(
        &mut self,
        id: &LayerId,
        enabled: bool,
        ctx: &mut LayerContext<'_>,
    ) -> Result<bool, RegistryError> {
        if enabled {
            self.enable_layer(id, ctx)
        } else {
            self.disable_layer(id, ctx)
        }
    }

    /// Forwarded only while the layer is enabled.
    pub fn refresh_layer(
        &mut self,
        id: &LayerId,
        ctx: &mut LayerContext<'_>,
    ) -> Result<bool, RegistryError> {
        let index = self.position(id)?;
        let layer = &mut self.layers[index];
        if !layer.is_enabled() {
            return Ok(false);
        }
        layer.refresh(ctx);
        Ok(true)
    }

    pub fn is_enabled(&self, id: &LayerId) -> bool {
        self.get(id).is_some_and(|l| l.is_enabled())
    }

    pub fn list(&self) -> Vec<LayerInfo> {
        self.layers
            .iter()
            .map(|l| LayerInfo {
                id: l.id().clone(),
                name: l.name().to_string(),
                kind: l.kind(),
                enabled: l.is_enabled(),
                owned_objects: l.owned_len(),
            })
            .collect()
    }

    /// Hands resolved loads to the layers that requested them. Completions
    /// for layers no longer registered are dropped.
    pub fn dispatch_loads(&mut self, ctx: &mut LayerContext<'_>) -> usize {
        let completions = ctx.loader.drain_completions();
        let count = completions.len();
        for completion in completions {
            match self.layers.iter_mut().find(|l| l.id() == &completion.layer) {
                Some(layer) => layer.on_load(ctx, completion),
                None => debug!(layer = %completion.layer, "dropping load for unknown layer"),
            }
        }
        count
    }

    /// Applies a new label tier to every enabled layer.
    pub fn apply_label_tier(&mut self, tier: TierSelection, ctx: &mut LayerContext<'_>) {
        ctx.label_tier = tier;
        for layer in self.layers.iter_mut().filter(|l| l.is_enabled()) {
            layer.on_label_tier(ctx, tier);
        }
    }

    /// Runs per-frame hooks of enabled layers.
    pub fn tick(&mut self, frame: &Frame, ctx: &mut LayerContext<'_>) {
        for layer in self.layers.iter_mut().filter(|l| l.is_enabled()) {
            layer.on_frame(ctx, frame);
        }
    }
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|l| l.id()))
            .finish()
    }
}

fn sweep_leftovers(layer: &mut dyn Layer, ctx: &mut LayerContext<'_>) {
    let leftover = layer.release_owned(ctx.scene);
    if leftover > 0 {
        warn!(layer = %layer.id(), leftover, "layer left render objects behind");
    }
}
