use std::sync::Arc;

use formats::feature::FeatureCollection;
use runtime::status::StatusBus;
use tracing::{debug, warn};

use crate::layer::LayerId;
use crate::loader::{FeatureLoader, LoadCompletion, LoadError, LoadToken};

#[derive(Debug, Clone)]
enum DataSource {
    Remote(String),
    Inline(Arc<FeatureCollection>),
}

#[derive(Debug, Clone)]
pub enum DataState {
    Idle,
    Loading(LoadToken),
    Ready(Arc<FeatureCollection>),
    Failed(LoadError),
}

/// Outcome of offering a load completion to [`LayerData::accept`].
#[derive(Debug, Clone)]
pub enum Accepted {
    Loaded(Arc<FeatureCollection>),
    Failed(LoadError),
    /// The completion belongs to a superseded request and was dropped.
    Stale,
}

/// Per-layer memo of the feature collection a layer renders from.
///
/// At most one load is pending per layer; a second `ensure` while loading is
/// a no-op, and completions whose token no longer matches are discarded.
#[derive(Debug, Clone)]
pub struct LayerData {
    source: DataSource,
    state: DataState,
}

impl LayerData {
    pub fn remote(source: impl Into<String>) -> Self {
        Self {
            source: DataSource::Remote(source.into()),
            state: DataState::Idle,
        }
    }

    pub fn inline(collection: FeatureCollection) -> Self {
        let collection = Arc::new(collection);
        Self {
            source: DataSource::Inline(Arc::clone(&collection)),
            state: DataState::Ready(collection),
        }
    }

    pub fn source_key(&self) -> Option<&str> {
        match &self.source {
            DataSource::Remote(key) => Some(key),
            DataSource::Inline(_) => None,
        }
    }

    pub fn state(&self) -> &DataState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, DataState::Loading(_))
    }

    pub fn features(&self) -> Option<Arc<FeatureCollection>> {
        match &self.state {
            DataState::Ready(fc) => Some(Arc::clone(fc)),
            _ => None,
        }
    }

    /// Returns the collection if it is available now; otherwise makes sure a
    /// load is pending and returns `None`.
    pub fn ensure(
        &mut self,
        layer: &LayerId,
        loader: &mut FeatureLoader,
        status: &mut StatusBus,
    ) -> Option<Arc<FeatureCollection>> {
        match &self.state {
            DataState::Ready(fc) => return Some(Arc::clone(fc)),
            DataState::Loading(_) => return None,
            DataState::Idle | DataState::Failed(_) => {}
        }
        let key = match &self.source {
            DataSource::Inline(fc) => {
                let fc = Arc::clone(fc);
                self.state = DataState::Ready(Arc::clone(&fc));
                return Some(fc);
            }
            DataSource::Remote(key) => key.clone(),
        };

        if let Some(fc) = loader.cached(&key) {
            debug!(layer = %layer, source = %key, "using cached features");
            self.state = DataState::Ready(Arc::clone(&fc));
            return Some(fc);
        }

        let token = loader.next_token();
        match loader.request(layer, token, &key) {
            Ok(()) => self.state = DataState::Loading(token),
            Err(e) => {
                warn!(layer = %layer, source = %key, error = %e, "load request failed");
                status.warn(layer.as_str(), format!("failed to load {key}: {e}"));
                self.state = DataState::Failed(e);
            }
        }
        None
    }

    pub fn accept(&mut self, completion: LoadCompletion) -> Accepted {
        let DataState::Loading(expected) = self.state else {
            return Accepted::Stale;
        };
        if completion.token != expected {
            return Accepted::Stale;
        }
        match completion.result {
            Ok(fc) => {
                self.state = DataState::Ready(Arc::clone(&fc));
                Accepted::Loaded(fc)
            }
            Err(e) => {
                self.state = DataState::Failed(e.clone());
                Accepted::Failed(e)
            }
        }
    }

    /// Forgets loaded data and any pending request. Inline data is kept.
    pub fn invalidate(&mut self, loader: &mut FeatureLoader) {
        if let DataSource::Remote(key) = &self.source {
            loader.invalidate(key);
            self.state = DataState::Idle;
        }
    }
}
