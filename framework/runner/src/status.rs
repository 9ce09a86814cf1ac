use campaign_run_model::RunStore;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled, Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    #[tabled(rename = "Fingerprint")]
    pub fingerprint: String,
    #[tabled(rename = "Runs")]
    pub runs: usize,
    #[tabled(rename = "Missing")]
    #[tabled(display = "missing")]
    pub missing: Option<usize>,
}

fn missing(n: &Option<usize>) -> String {
    n.map(|n| n.to_string()).unwrap_or_default()
}

/// One row per recorded fingerprint, sorted by fingerprint.
///
/// With a `target`, rows also show how many runs are still missing.
pub fn status_rows(store: &RunStore, target: Option<usize>) -> Vec<StatusRow> {
    store
        .index()
        .into_iter()
        .map(|(fingerprint, files)| StatusRow {
            fingerprint: fingerprint.to_string(),
            runs: files.len(),
            missing: target.map(|target| target.saturating_sub(files.len())),
        })
        .collect()
}

pub fn render_status(rows: &[StatusRow]) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::prelude::Fingerprint;

    #[test]
    fn rows_report_missing_runs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = RunStore::open(dir.path())?;
        store.persist(&Fingerprint::new("b"), vec![])?;
        store.persist(&Fingerprint::new("a"), vec![])?;
        store.persist(&Fingerprint::new("a"), vec![])?;

        let rows = status_rows(&store, Some(3));
        assert_eq!(
            vec![
                StatusRow {
                    fingerprint: "a".to_string(),
                    runs: 2,
                    missing: Some(1)
                },
                StatusRow {
                    fingerprint: "b".to_string(),
                    runs: 1,
                    missing: Some(2)
                },
            ],
            rows
        );

        let rendered = render_status(&rows);
        assert!(rendered.contains("Fingerprint"));
        assert!(rendered.contains("Missing"));
        Ok(())
    }
}
