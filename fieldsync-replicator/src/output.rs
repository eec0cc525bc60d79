//! Command summaries for the terminal, as text or JSON.

use fieldsync::audit::{CompletenessReport, PendingEstimate};
use fieldsync::error::SyncError;
use fieldsync::mirror::RetryPassSummary;
use fieldsync::monitor::StatusSnapshot;
use fieldsync::report::{ReportPaths, RunReport};
use serde::Serialize;

use crate::error::ReplicatorResult;

fn print_json<T: Serialize>(value: &T) -> ReplicatorResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(SyncError::from)?;
    println!("{rendered}");

    Ok(())
}

#[derive(Serialize)]
struct SyncOutput<'a> {
    report: &'a RunReport,
    files: &'a ReportPaths,
}

pub fn print_report(report: &RunReport, paths: &ReportPaths, json: bool) -> ReplicatorResult<()> {
    if json {
        // Per-key outcomes are in the report files.
        let mut summary = report.clone();
        summary.outcomes.clear();
        return print_json(&SyncOutput {
            report: &summary,
            files: paths,
        });
    }

    let totals = &report.totals;
    println!("pipeline:            {}", report.pipeline);
    println!("run id:              {}", report.run_id);
    println!("dry run:             {}", report.dry_run);
    println!("resumed:             {}", report.resumed);
    println!("stop reason:         {:?}", report.stop_reason);
    println!("records read:        {}", totals.records_read);
    println!("records excluded:    {}", totals.records_excluded);
    println!("keys synced:         {}", totals.keys_synced);
    println!("history entries:     {}", totals.history_entries_written);
    println!("already synced:      {}", totals.already_synced);
    println!("conflicts:           {}", totals.conflicts);
    println!("missing keys:        {}", totals.missing_keys);
    println!("mapping errors:      {}", totals.mapping_errors);
    println!("pages completed:     {}", totals.pages_completed);
    println!("batches committed:   {}", totals.batches_committed);
    if let Some(error) = &report.error {
        println!("error:               {error}");
    }
    println!("report:              {}", paths.json.display());
    println!("outcomes:            {}", paths.csv.display());

    Ok(())
}

pub fn print_audit(report: &CompletenessReport, json: bool) -> ReplicatorResult<()> {
    if json {
        return print_json(report);
    }

    println!("complete:            {}", report.is_complete());
    println!("records scanned:     {}", report.records_scanned);
    println!("records without key: {}", report.records_without_key);
    println!("staging keys:        {}", report.staging_keys);
    println!("destination keys:    {}", report.destination_keys);
    println!("unsynced:            {}", report.unsynced);
    for key in &report.unsynced_sample {
        println!("  - {key}");
    }
    println!("orphaned:            {}", report.orphaned);
    for key in &report.orphaned_sample {
        println!("  - {key}");
    }

    Ok(())
}

#[derive(Serialize)]
struct MonitorOutput<'a> {
    status: &'a StatusSnapshot,
    estimate: Option<&'a PendingEstimate>,
}

pub fn print_monitor(
    status: &StatusSnapshot,
    estimate: Option<&PendingEstimate>,
    json: bool,
) -> ReplicatorResult<()> {
    if json {
        return print_json(&MonitorOutput { status, estimate });
    }

    println!("pipeline:            {}", status.pipeline);
    println!("entities:            {}", status.entities);
    println!("tagged entities:     {}", status.tagged_entities);
    println!("history entries:     {}", status.history_entries);
    match &status.checkpoint {
        Some(checkpoint) => {
            println!("checkpoint status:   {:?}", checkpoint.status);
            println!(
                "checkpoint cursor:   {}",
                checkpoint.cursor.as_ref().map(|c| c.as_str()).unwrap_or("<start>")
            );
            println!("pages completed:     {}", checkpoint.pages_completed);
            println!("keys committed:      {}", checkpoint.keys_committed);
            println!("last update:         {}", checkpoint.updated_at.to_rfc3339());
        }
        None => println!("checkpoint:          <none>"),
    }
    if let Some(mirror) = &status.mirror {
        println!("mirror events:       {}", mirror.events);
        println!("pending failures:    {}", mirror.pending_failures);
        println!("dead letters:        {}", mirror.dead_letters);
    }
    if let Some(estimate) = estimate {
        println!("unsynced:            {}", estimate.unsynced);
        println!("would sync:          {}", estimate.would_sync);
        println!("conflicts:           {}", estimate.conflicts);
        for key in &estimate.conflict_sample {
            println!("  - {key}");
        }
        println!("estimated pages:     {}", estimate.estimated_pages);
        if let Some(runs) = estimate.estimated_runs {
            println!("estimated runs:      {runs}");
        }
    }

    Ok(())
}

pub fn print_retry(summary: &RetryPassSummary, json: bool) -> ReplicatorResult<()> {
    if json {
        return print_json(summary);
    }

    println!("examined:            {}", summary.examined);
    println!("applied:             {}", summary.applied);
    println!("still failing:       {}", summary.still_failing);
    println!("dead lettered:       {}", summary.dead_lettered);

    Ok(())
}
