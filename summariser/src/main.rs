use anyhow::Context;
use campaign_run_model::{HarnessSettings, RunStore};
use campaign_summariser::cli::{CampaignSummariserCli, SummariserCommand};
use campaign_summariser::{
    generate_report, scaffold_report, FrameLayout, ReportSpec, TelemetryCache, TelemetryLoader,
};
use chrono::Utc;
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;

/// Environment variable name to set the records directory
const RECORDS_DIR_ENV: &str = "RECORDS_DIR";
/// Environment variable name to set the metrics cache directory
const CACHE_DIR_ENV: &str = "CACHE_DIR";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = CampaignSummariserCli::parse();

    let mut settings = HarnessSettings::load(cli.config.as_deref())
        .context("Failed to load harness settings")?;
    if let Some(dir) = cli
        .records_dir
        .or_else(|| std::env::var(RECORDS_DIR_ENV).ok().map(PathBuf::from))
    {
        settings.storage.records_dir = dir;
    }
    if let Some(dir) = cli
        .cache_dir
        .or_else(|| std::env::var(CACHE_DIR_ENV).ok().map(PathBuf::from))
    {
        settings.storage.cache_dir = dir;
    }
    log::debug!("Using settings {settings:?}");

    let cache = TelemetryCache::new(&settings.storage.cache_dir);

    match cli.command {
        SummariserCommand::CacheClear => {
            let removed = cache.clear()?;
            println!("Removed {removed} entries from {}", cache.dir().display());
        }
        SummariserCommand::Scaffold { avg_cnt, output } => {
            let store = open_store(&settings, cli.rescan)?;
            let spec = scaffold_report(&store.index(), avg_cnt);
            let content = serde_yaml::to_string(&spec)?;
            std::fs::write(&output, content)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Wrote a report for {} configurations to {}",
                spec.targets_alias.len(),
                output.display()
            );
        }
        SummariserCommand::Report { spec, output } => {
            let content = std::fs::read_to_string(&spec)
                .with_context(|| format!("Failed to read report specification {}", spec.display()))?;
            let spec = ReportSpec::from_yaml(&content).context("Invalid report specification")?;

            let store = open_store(&settings, cli.rescan)?;

            let mut layout = match &settings.frames.metric_source {
                Some(path) => {
                    let source = std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    FrameLayout::from_metric_source(&source)
                }
                None => FrameLayout::default(),
            };
            layout = layout.with_overrides(&settings.frames.indices)?;

            let mut loader = TelemetryLoader::new(store.dir())
                .with_layout(layout)
                .with_min_frames(settings.frames.min_frames);
            if !cli.no_cache {
                loader = loader.with_cache(cache);
            }

            let report = generate_report(&spec, &store.index(), &loader)?;

            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "campaign-report-{}.json",
                    Utc::now().format("%Y-%m-%dT%H.%M.%S%.fZ")
                ))
            });
            let file = File::create_new(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            serde_json::to_writer_pretty(file, &report)?;

            let placeholders = report
                .charts
                .iter()
                .flat_map(|c| &c.series)
                .map(|s| s.placeholders.len())
                .sum::<usize>();
            if placeholders > 0 {
                log::warn!("{placeholders} report values are zero placeholders for missing data");
            }
            println!(
                "Wrote a report over {} configurations to {}",
                report.records.len(),
                output.display()
            );
        }
    }

    Ok(())
}

fn open_store(settings: &HarnessSettings, rescan: bool) -> anyhow::Result<RunStore> {
    let store = RunStore::open(&settings.storage.records_dir)?;
    if rescan {
        let count = store.rebuild_manifest()?;
        log::info!("Indexed {count} run files");
    }
    Ok(store)
}
