use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use formats::feature::FeatureCollection;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::executor::LocalSpawner;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use futures::stream::StreamExt;
use futures::task::LocalSpawnExt;
use tracing::debug;

use crate::layer::LayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Io(String),
    Parse(String),
    /// The source went away before producing a result.
    Dropped,
    Spawn(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(msg) => write!(f, "I/O error: {msg}"),
            LoadError::Parse(msg) => write!(f, "parse error: {msg}"),
            LoadError::Dropped => write!(f, "load was dropped before completing"),
            LoadError::Spawn(msg) => write!(f, "failed to schedule load: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

pub type LoadFuture = LocalBoxFuture<'static, Result<FeatureCollection, LoadError>>;

/// Data-loading collaborator: turns a source key (path, URL) into a parsed
/// feature collection.
pub trait FeatureSource {
    fn fetch(&self, source: &str) -> LoadFuture;
}

/// Monotonic token pairing a load request with the layer state that issued
/// it. Completions carrying an outdated token are discarded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(pub u64);

pub type LoadResult = Result<Arc<FeatureCollection>, LoadError>;

type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

#[derive(Debug, Clone)]
pub struct LoadCompletion {
    pub layer: LayerId,
    pub token: LoadToken,
    pub source: String,
    epoch: u64,
    pub result: LoadResult,
}

struct InFlight {
    epoch: u64,
    load: SharedLoad,
}

/// Issues loads through a [`FeatureSource`], sharing one in-flight request per
/// source key and caching resolved collections.
///
/// Completions are delivered through a channel and picked up by
/// [`FeatureLoader::drain_completions`] on the frame thread, so no layer state
/// is touched from inside a future.
pub struct FeatureLoader {
    source: Rc<dyn FeatureSource>,
    spawner: LocalSpawner,
    in_flight: HashMap<String, InFlight>,
    cache: HashMap<String, Arc<FeatureCollection>>,
    epochs: HashMap<String, u64>,
    next_token: u64,
    fetches_issued: usize,
    tx: UnboundedSender<LoadCompletion>,
    rx: UnboundedReceiver<LoadCompletion>,
}

impl FeatureLoader {
    pub fn new(source: Rc<dyn FeatureSource>, spawner: LocalSpawner) -> Self {
        let (tx, rx) = unbounded();
        Self {
            source,
            spawner,
            in_flight: HashMap::new(),
            cache: HashMap::new(),
            epochs: HashMap::new(),
            next_token: 1,
            fetches_issued: 0,
            tx,
            rx,
        }
    }

    pub fn next_token(&mut self) -> LoadToken {
        let token = LoadToken(self.next_token);
        self.next_token += 1;
        token
    }

    /// Number of times the underlying source was actually asked to fetch.
    pub fn fetches_issued(&self) -> usize {
        self.fetches_issued
    }

    pub fn is_in_flight(&self, source: &str) -> bool {
        self.in_flight.contains_key(source)
    }

    pub fn cached(&self, source: &str) -> Option<Arc<FeatureCollection>> {
        self.cache.get(source).cloned()
    }

    /// Drops the cached collection for `source` and detaches any in-flight
    /// load so the next request fetches again.
    pub fn invalidate(&mut self, source: &str) {
        self.cache.remove(source);
        self.in_flight.remove(source);
        *self.epochs.entry(source.to_string()).or_insert(0) += 1;
    }

    /// Requests `source` on behalf of `layer`. Joins an in-flight load for the
    /// same source instead of fetching twice.
    pub fn request(
        &mut self,
        layer: &LayerId,
        token: LoadToken,
        source: &str,
    ) -> Result<(), LoadError> {
        let epoch = self.epochs.get(source).copied().unwrap_or(0);
        let load = match self.in_flight.get(source) {
            Some(existing) => {
                debug!(layer = %layer, source, "joining in-flight load");
                existing.load.clone()
            }
            None => {
                self.fetches_issued += 1;
                let fetch = self.source.fetch(source);
                let load = async move { fetch.await.map(Arc::new) }
                    .boxed_local()
                    .shared();
                self.in_flight.insert(
                    source.to_string(),
                    InFlight {
                        epoch,
                        load: load.clone(),
                    },
                );
                load
            }
        };

        let tx = self.tx.clone();
        let layer = layer.clone();
        let source = source.to_string();
        self.spawner
            .spawn_local(async move {
                let result = load.await;
                // The receiver lives as long as the loader.
                let _ = tx.unbounded_send(LoadCompletion {
                    layer,
                    token,
                    source,
                    epoch,
                    result,
                });
            })
            .map_err(|e| LoadError::Spawn(e.to_string()))
    }

    /// Completions that resolved since the last call, in resolution order.
    /// Successful loads from the current epoch are cached.
    pub fn drain_completions(&mut self) -> Vec<LoadCompletion> {
        let mut completions = Vec::new();
        // Ready messages only; an empty channel is pending, never awaited.
        while let Some(Some(completion)) = self.rx.next().now_or_never() {
            completions.push(completion);
        }
        for completion in &completions {
            let current = self.epochs.get(&completion.source).copied().unwrap_or(0);
            if completion.epoch != current {
                continue;
            }
            if self
                .in_flight
                .get(&completion.source)
                .is_some_and(|f| f.epoch == completion.epoch)
            {
                self.in_flight.remove(&completion.source);
            }
            if let Ok(collection) = &completion.result {
                self.cache
                    .insert(completion.source.clone(), Arc::clone(collection));
            }
        }
        completions
    }
}

impl std::fmt::Debug for FeatureLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureLoader")
            .field("in_flight", &self.in_flight.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .field("fetches_issued", &self.fetches_issued)
            .finish()
    }
}
