//! `minisel select`: one selection pass over one input file, with a status
//! record so a re-submitted job skips work that already finished.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use ms_columnar::{read_event_batch, write_snapshot, EventBatch, Mask};
use ms_core::SelectionConfig;
use ms_corrections::CorrectionsConfig;
use ms_select::{run_selection, SelectorKind};

const STATUS_COMPLETED: &str = "SELECTION COMPLETED";

fn status_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{stem}_status.txt"))
}

fn head(batch: &EventBatch, n: usize) -> Result<EventBatch> {
    let keep: Vec<bool> = (0..batch.n_events()).map(|i| i < n).collect();
    Ok(batch.filter(&Mask::from_bools(&keep))?)
}

pub fn cmd_select(
    input: &Path,
    output: &str,
    output_histos: &str,
    config: &Path,
    channel_set: &str,
    max_events: Option<usize>,
) -> Result<()> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("input path {} has no file stem", input.display()))?;
    let out_dir = PathBuf::from(format!("selection_{output}"));
    let histo_dir = PathBuf::from(format!("histos_{output_histos}"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    fs::create_dir_all(&histo_dir)
        .with_context(|| format!("creating {}", histo_dir.display()))?;

    let status = status_path(&out_dir, stem);
    if let Ok(text) = fs::read_to_string(&status) {
        if text.trim_end().ends_with(STATUS_COMPLETED) {
            tracing::info!("'{}' already completed, skipping", input.display());
            return Ok(());
        }
    }

    match run(input, stem, &out_dir, &histo_dir, config, channel_set, max_events) {
        Ok(()) => {
            fs::write(&status, format!("{STATUS_COMPLETED}\n"))
                .with_context(|| format!("writing {}", status.display()))?;
            Ok(())
        }
        Err(err) => {
            // Best effort: the error itself is what the caller needs to see.
            fs::write(&status, format!("FAILED: {err:#}\n")).ok();
            Err(err)
        }
    }
}

fn run(
    input: &Path,
    stem: &str,
    out_dir: &Path,
    histo_dir: &Path,
    config: &Path,
    channel_set: &str,
    max_events: Option<usize>,
) -> Result<()> {
    let cfg = SelectionConfig::from_file(config)
        .with_context(|| format!("loading configuration {}", config.display()))?;
    let corr = CorrectionsConfig::for_era(&cfg.data_dir, &cfg.era)
        .with_context(|| format!("loading corrections for era '{}'", cfg.era))?;
    let kind = SelectorKind::from_channel_set(channel_set)?;

    let mut batch = read_event_batch(input)
        .with_context(|| format!("reading {}", input.display()))?;
    if let Some(n) = max_events {
        if n < batch.n_events() {
            tracing::info!("keeping the first {n} of {} events", batch.n_events());
            batch = head(&batch, n)?;
        }
    }
    tracing::info!(
        "selecting {} events from '{}' (process '{}', era '{}')",
        batch.n_events(),
        input.display(),
        cfg.process,
        cfg.era
    );

    let out = run_selection(kind, &cfg, &corr, batch)?;

    for (chan, steps) in &out.minitree {
        for (key, snapshot) in steps {
            if snapshot.is_empty() {
                tracing::warn!("snapshot '{key}' for channel '{chan}' is empty, not written");
                continue;
            }
            let path = out_dir.join(format!("{chan}_{stem}_{key}.parquet"));
            write_snapshot(snapshot, &path)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    let cutflow_path = histo_dir.join(format!("{stem}_cutflow.json"));
    let json = serde_json::to_string_pretty(&out.cutflow)?;
    fs::write(&cutflow_path, json)
        .with_context(|| format!("writing {}", cutflow_path.display()))?;

    print!("{}", out.cutflow);
    Ok(())
}
