//! JSON histogram files as a series source.
//!
//! Each sample file is a JSON object mapping series names to binned
//! series. Systematic variations live next to the nominal entry under
//! `<name>__<systematic>up` and `<name>__<systematic>down`. Files are
//! parsed once and cached for the rest of the run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sp_core::{BinnedSeries, Error, Result};
use sp_pipeline::{SampleSpec, SeriesProvider};

type SeriesFile = HashMap<String, BinnedSeries>;

/// Provider rooted at the configuration file's directory; sample paths
/// are resolved relative to it.
pub struct JsonFileProvider {
    root: PathBuf,
    cache: Mutex<HashMap<PathBuf, Arc<SeriesFile>>>,
}

impl JsonFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: Mutex::new(HashMap::new()) }
    }

    fn file_for(&self, spec: &SampleSpec) -> Result<Arc<SeriesFile>> {
        let path = self.root.join(&spec.path);
        let mut cache = self.cache.lock().map_err(|_| {
            Error::Computation("series cache lock poisoned".to_string())
        })?;
        if let Some(file) = cache.get(&path) {
            return Ok(file.clone());
        }

        let bytes = std::fs::read(&path).map_err(|e| {
            Error::DataUnavailable(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let file: SeriesFile = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), series = file.len(), "loaded sample file");
        let file = Arc::new(file);
        cache.insert(path, file.clone());
        Ok(file)
    }
}

impl SeriesProvider for JsonFileProvider {
    fn nominal(&self, spec: &SampleSpec, plot_name: &str) -> Result<BinnedSeries> {
        let file = self.file_for(spec)?;
        file.get(plot_name).cloned().ok_or_else(|| {
            Error::DataUnavailable(format!(
                "'{}' carries no series named '{}'",
                spec.path, plot_name
            ))
        })
    }

    fn variation(
        &self,
        spec: &SampleSpec,
        plot_name: &str,
        systematic: &str,
        up: bool,
    ) -> Result<Option<BinnedSeries>> {
        let file = self.file_for(spec)?;
        let side = if up { "up" } else { "down" };
        Ok(file.get(&format!("{}__{}{}", plot_name, systematic, side)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_pipeline::SampleKind;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_dir() -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!("stackplot_provider_{}_{}", std::process::id(), nanos));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_series_file(path: &Path, series: &HashMap<String, BinnedSeries>) {
        std::fs::write(path, serde_json::to_string_pretty(series).unwrap()).unwrap();
    }

    #[test]
    fn nominal_and_variations_resolve_by_name() {
        let dir = tmp_dir();
        let mut series = HashMap::new();
        series.insert(
            "mll".to_string(),
            BinnedSeries::from_parts(vec![0.0, 1.0], vec![3.0], vec![3.0]).unwrap(),
        );
        series.insert(
            "mll__jecup".to_string(),
            BinnedSeries::from_parts(vec![0.0, 1.0], vec![4.0], vec![4.0]).unwrap(),
        );
        write_series_file(&dir.join("mc.json"), &series);

        let provider = JsonFileProvider::new(&dir);
        let spec = SampleSpec::new("mc.json", SampleKind::Mc);
        assert_eq!(provider.nominal(&spec, "mll").unwrap().content, vec![3.0]);
        assert!(provider.variation(&spec, "mll", "jec", true).unwrap().is_some());
        assert!(provider.variation(&spec, "mll", "jec", false).unwrap().is_none());
        assert!(matches!(
            provider.nominal(&spec, "other").unwrap_err(),
            Error::DataUnavailable(_)
        ));
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let provider = JsonFileProvider::new("/nonexistent");
        let spec = SampleSpec::new("mc.json", SampleKind::Mc);
        assert!(matches!(
            provider.nominal(&spec, "mll").unwrap_err(),
            Error::DataUnavailable(_)
        ));
    }
}
