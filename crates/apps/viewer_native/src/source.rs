use std::path::{Path, PathBuf};

use formats::feature::FeatureCollection;
use futures::future::FutureExt;
use layers::{FeatureSource, LoadError, LoadFuture};

/// Reads GeoJSON feature collections from disk; source keys are paths
/// relative to `base_dir`.
#[derive(Debug, Clone)]
pub struct FileSource {
    base_dir: PathBuf,
}

impl FileSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve(&self, source: &str) -> PathBuf {
        self.base_dir.join(source)
    }
}

impl FeatureSource for FileSource {
    fn fetch(&self, source: &str) -> LoadFuture {
        let path = self.resolve(source);
        async move {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| LoadError::Io(format!("{}: {e}", path.display())))?;
            FeatureCollection::from_geojson_str(&text)
                .map_err(|e| LoadError::Parse(format!("{}: {e}", path.display())))
        }
        .boxed_local()
    }
}
