use std::sync::Arc;

use formats::feature::FeatureCollection;
use runtime::frame::Frame;
use runtime::status::StatusBus;
use scene::graph::SceneGraph;
use scene::owned::OwnedObjects;

use crate::density::TierSelection;
use crate::loader::{FeatureLoader, LoadCompletion};

/// Unique, immutable layer identifier (e.g. `"wards"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Boundary,
    FilteredBoundary,
    Points,
    Labeled,
}

/// Everything a layer may touch while handling a lifecycle call.
pub struct LayerContext<'a> {
    pub scene: &'a mut SceneGraph,
    pub loader: &'a mut FeatureLoader,
    pub status: &'a mut StatusBus,
    /// Label tier currently applied by the viewer.
    pub label_tier: TierSelection,
}

/// Capability set of a registered layer.
///
/// A layer adds and removes its render objects only through its own
/// [`OwnedObjects`]; after `disable` returns, `owned_len` must be zero.
pub trait Layer {
    fn id(&self) -> &LayerId;
    fn name(&self) -> &str;
    fn kind(&self) -> LayerKind;
    fn is_enabled(&self) -> bool;

    fn init(&mut self, ctx: &mut LayerContext<'_>);
    fn enable(&mut self, ctx: &mut LayerContext<'_>);
    fn disable(&mut self, ctx: &mut LayerContext<'_>);
    fn refresh(&mut self, ctx: &mut LayerContext<'_>);
    fn destroy(&mut self, ctx: &mut LayerContext<'_>);

    /// A load this layer requested has resolved.
    fn on_load(&mut self, _ctx: &mut LayerContext<'_>, _completion: LoadCompletion) {}

    /// The applied label tier changed. Only called while enabled.
    fn on_label_tier(&mut self, _ctx: &mut LayerContext<'_>, _tier: TierSelection) {}

    /// Per-frame hook. Only called while enabled.
    fn on_frame(&mut self, _ctx: &mut LayerContext<'_>, _frame: &Frame) {}

    /// Currently loaded features, if any.
    fn features(&self) -> Option<Arc<FeatureCollection>>;

    fn owned_len(&self) -> usize;

    /// Drops every owned render object. Returns how many were removed.
    fn release_owned(&mut self, scene: &mut SceneGraph) -> usize;
}

/// Snapshot row returned by `LayerRegistry::list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub enabled: bool,
    pub owned_objects: usize,
}

/// Identity, enabled flag and owned-object set shared by the concrete layers.
#[derive(Debug)]
pub struct LayerCore {
    id: LayerId,
    name: String,
    enabled: bool,
    owned: Option<OwnedObjects>,
}

impl LayerCore {
    pub fn new(id: impl Into<LayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: false,
            owned: None,
        }
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The owned set, registering an owner in `scene` on first use.
    pub fn owned(&mut self, scene: &mut SceneGraph) -> &mut OwnedObjects {
        let id = &self.id;
        self.owned
            .get_or_insert_with(|| OwnedObjects::register(scene, id.as_str()))
    }

    pub fn owned_len(&self) -> usize {
        self.owned.as_ref().map_or(0, OwnedObjects::len)
    }

    pub fn release(&mut self, scene: &mut SceneGraph) -> usize {
        self.owned
            .as_mut()
            .map_or(0, |owned| owned.release_all(scene))
    }
}

impl From<String> for LayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_registers_owner_lazily() {
        let mut scene = SceneGraph::new();
        let mut core = LayerCore::new("wards", "Wards");
        assert_eq!(core.owned_len(), 0);
        assert_eq!(core.release(&mut scene), 0);

        let owner = core.owned(&mut scene).owner();
        assert_eq!(scene.owner_label(owner), Some("wards"));
        assert_eq!(core.owned(&mut scene).owner(), owner);
    }

    #[test]
    fn layer_id_displays_raw_string() {
        assert_eq!(LayerId::new("a-b").to_string(), "a-b");
        assert_eq!(LayerId::from("x").as_str(), "x");
    }
}
