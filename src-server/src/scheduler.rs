//! Background tasks.
//!
//! - the import scheduler fires due jobs by reading their source file
//! - the timeout sweeper fails operations that outlive their budget

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use scrub_processing::{CleaningError, CleaningResult, ImportJob};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Fire every job that is due now. Returns the fired jobs.
pub async fn fire_due_jobs(state: &AppState) -> Vec<ImportJob> {
    let mut fired = Vec::new();
    for job in state.importer.due_jobs(Utc::now()) {
        match fire_job(state, &job).await {
            Ok(updated) => fired.push(updated),
            // Cancelled or fired between listing and firing.
            Err(e) => debug!("Skipping import job {}: {}", job.id, e),
        }
    }
    fired
}

async fn fire_job(state: &AppState, job: &ImportJob) -> CleaningResult<ImportJob> {
    let Some(source) = job.source_reference.as_deref() else {
        warn!("Import job {} has no source; marking fired", job.id);
        return state.importer.mark_fired(&job.id, None);
    };

    let content = match tokio::fs::read(source).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Import job {} could not read {}: {}", job.id, source, e);
            return state
                .importer
                .mark_fired(&job.id, Some(format!("Failed to read {}: {}", source, e)));
        }
    };

    let filename = Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string());
    let importer = state.importer.clone();
    let id = job.id.clone();
    let updated = tokio::task::spawn_blocking(move || importer.fire(&id, &filename, &content))
        .await
        .map_err(|e| CleaningError::Internal(format!("Import task failed: {}", e)))??;

    info!("Fired scheduled import {}", updated.id);
    Ok(updated)
}

/// Fail running operations older than the configured budget.
pub fn sweep_timeouts(state: &AppState) -> usize {
    let expired = state
        .pipeline
        .tracker()
        .expire_overdue(state.operation_timeout, Utc::now());
    for id in &expired {
        warn!("Operation {} exceeded its time budget", id);
    }
    expired.len()
}

/// Spawn the scheduler/sweeper loop on the current runtime.
pub fn spawn(state: AppState, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            fire_due_jobs(&state).await;
            sweep_timeouts(&state);
        }
    })
}
