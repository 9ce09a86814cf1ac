use crate::cache::TelemetryCache;
use crate::frame::{FrameField, FrameLayout, FrameView, LoadError};
use crate::model::DerivedMetrics;
use campaign_core::prelude::{decode, fingerprint_of_file};
use campaign_run_model::RunRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The simulator only flushes a run file once it holds more than nine frames.
pub const DEFAULT_MIN_FRAMES: usize = 10;

/// Turns run files into [DerivedMetrics], consulting the cache first.
#[derive(Debug, Clone)]
pub struct TelemetryLoader {
    records_dir: PathBuf,
    cache: Option<TelemetryCache>,
    layout: FrameLayout,
    min_frames: usize,
}

impl TelemetryLoader {
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
            cache: None,
            layout: FrameLayout::default(),
            min_frames: DEFAULT_MIN_FRAMES,
        }
    }

    pub fn with_cache(mut self, cache: TelemetryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_min_frames(mut self, min_frames: usize) -> Self {
        self.min_frames = min_frames;
        self
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    /// Derived metrics for one run file.
    pub fn load(&self, file_name: &str) -> Result<DerivedMetrics, LoadError> {
        if let Some(metrics) = self.cache.as_ref().and_then(|c| c.get(file_name)) {
            log::trace!("Cache hit for {file_name}");
            return Ok(metrics);
        }

        let path = self.records_dir.join(file_name);
        let content = std::fs::read(&path).map_err(|source| LoadError::Io {
            file: file_name.to_string(),
            source,
        })?;
        let record: RunRecord =
            serde_json::from_slice(&content).map_err(|source| LoadError::Corrupt {
                file: file_name.to_string(),
                source,
            })?;

        let metrics = derive_metrics(file_name, &record, &self.layout, self.min_frames)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&metrics) {
                log::warn!("Failed to cache metrics for {file_name}: {e:?}");
            }
        }

        Ok(metrics)
    }

    /// Load several run files. Files that fail to load are logged and left out.
    pub fn load_all(&self, file_names: &[String]) -> Vec<DerivedMetrics> {
        file_names
            .iter()
            .filter_map(|file_name| match self.load(file_name) {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    log::error!("Excluding run file: {e}");
                    None
                }
            })
            .collect()
    }
}

/// Compute the metrics of one run.
///
/// Point in time values come from the final frame. Completed requests and container counts are
/// summed over all frames and divided by the final frame counter, giving per-frame averages.
pub fn derive_metrics(
    file_name: &str,
    record: &RunRecord,
    layout: &FrameLayout,
    min_frames: usize,
) -> Result<DerivedMetrics, LoadError> {
    let frames = &record.frames;
    if frames.len() < min_frames || frames.is_empty() {
        return Err(LoadError::TooFewFrames {
            file: file_name.to_string(),
            found: frames.len(),
            required: min_frames.max(1),
        });
    }

    let view = |frame: usize| FrameView {
        file: file_name,
        frame,
        values: &frames[frame],
        layout,
    };

    let mut done_requests = 0.0;
    let mut containers = 0.0;
    for frame in 0..frames.len() {
        let view = view(frame);
        done_requests += view.number(FrameField::DoneReqCount)?;
        containers += view.number(FrameField::FncontainerCount)?;
    }

    let last = view(frames.len() - 1);
    let frame_counter = last.number(FrameField::Frame)?;
    if frame_counter <= 0.0 {
        return Err(LoadError::InvalidFrameCounter {
            file: file_name.to_string(),
            value: frame_counter,
        });
    }

    let fingerprint = record
        .fingerprint
        .clone()
        .or_else(|| fingerprint_of_file(file_name).map(str::to_string))
        .unwrap_or_else(|| file_name.to_string());

    Ok(DerivedMetrics {
        file_name: file_name.to_string(),
        flat: decode(&fingerprint),
        fingerprint,
        sample_count: 1,
        cost: last.number(FrameField::Cost)?,
        latency: last.number(FrameField::ReqDoneTimeAvg)?,
        latency_std: last.number(FrameField::ReqDoneTimeStd)?,
        latency_p90: last.number(FrameField::ReqDoneTimeAvg90p)?,
        score: last.number(FrameField::Score)?,
        throughput: done_requests / frame_counter,
        cold_start_wait: last.number(FrameField::ReqWaitColdstartTime)?,
        schedule_wait: last.number(FrameField::ReqWaitScheTime)?,
        data_recv_time: last.number(FrameField::ReqDataRecvTime)?,
        exec_time: last.number(FrameField::ReqExeTime)?,
        algo_exec_time: last.number(FrameField::AlgoExeTime)?,
        avg_containers: containers / frame_counter,
        unfinished_requests: last.list_len(FrameField::RunningReqs)? as f64,
        spread: BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frame, write_run};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FINGERPRINT: &str =
        "sd.rflow.dtsingle.cshigh.ftcpu.mtno_scale.scl(no.)(default.)(no.)[].scd(greedy.).ic(lru.10)";

    fn frames(n: usize) -> Vec<Vec<serde_json::Value>> {
        (1..=n)
            .map(|i| frame(i as f64, 2.0, 3.0, 4))
            .collect()
    }

    #[test]
    fn derives_totals_and_last_frame_values() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = write_run(dir.path(), FINGERPRINT, frames(10))?;

        let metrics = TelemetryLoader::new(dir.path()).load(&file)?;
        // 10 frames with 2 completed requests each, final frame counter 10
        assert_eq!(2.0, metrics.throughput);
        assert_eq!(3.0, metrics.avg_containers);
        assert_eq!(4.0, metrics.unfinished_requests);
        assert_eq!(10.0 * 1.5, metrics.cost);
        assert_eq!(FINGERPRINT, metrics.fingerprint);
        assert_eq!("lru.10", metrics.flat.instance_cache_policy);
        assert_eq!(1, metrics.sample_count);
        Ok(())
    }

    #[test]
    fn too_few_frames_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = write_run(dir.path(), FINGERPRINT, frames(9))?;

        let err = TelemetryLoader::new(dir.path()).load(&file).unwrap_err();
        assert!(matches!(
            err,
            LoadError::TooFewFrames {
                found: 9,
                required: 10,
                ..
            }
        ));

        let metrics = TelemetryLoader::new(dir.path())
            .with_min_frames(5)
            .load(&file)?;
        assert_eq!(2.0, metrics.throughput);
        Ok(())
    }

    #[test]
    fn non_numeric_field_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut frames = frames(10);
        frames[3][8] = json!("lots");
        let file = write_run(dir.path(), FINGERPRINT, frames)?;

        let err = TelemetryLoader::new(dir.path()).load(&file).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnexpectedValue {
                frame: 3,
                field: FrameField::DoneReqCount,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn corrupt_file_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("x.UTC_1"), "{\"frames\": [")?;
        let err = TelemetryLoader::new(dir.path()).load("x.UTC_1").unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
        Ok(())
    }

    #[test]
    fn cache_hit_skips_run_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = write_run(dir.path(), FINGERPRINT, frames(10))?;
        let loader = TelemetryLoader::new(dir.path())
            .with_cache(TelemetryCache::new(dir.path().join("cache")));

        let first = loader.load(&file)?;
        std::fs::remove_file(dir.path().join(&file))?;
        assert_eq!(first, loader.load(&file)?);
        Ok(())
    }

    #[test]
    fn load_all_excludes_failures() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let good = write_run(dir.path(), FINGERPRINT, frames(10))?;
        let loaded = TelemetryLoader::new(dir.path()).load_all(&[good, "missing.UTC_1".to_string()]);
        assert_eq!(1, loaded.len());
        Ok(())
    }

    #[test]
    fn custom_layout_moves_fields() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut frames = frames(10);
        for frame in &mut frames {
            frame.swap(6, 7);
        }
        let file = write_run(dir.path(), FINGERPRINT, frames)?;

        let overrides = [("cost".to_string(), 7), ("score".to_string(), 6)]
            .into_iter()
            .collect();
        let layout = FrameLayout::default().with_overrides(&overrides)?;
        let metrics = TelemetryLoader::new(dir.path()).with_layout(layout).load(&file)?;
        assert_eq!(15.0, metrics.cost);
        Ok(())
    }
}
