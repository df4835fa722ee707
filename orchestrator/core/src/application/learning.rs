// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Learning Feedback Loop
//
// Append-only recording of outcomes and explicit feedback, plus batch
// training jobs handed off to a dedicated worker task. Recording never
// blocks on training logic, and training runs entirely outside the request
// path: a total outage here must not stop tasks from being routed or
// completed. Progress is reported over a watch channel, not a return value.

use crate::domain::events::LearningEvent;
use crate::domain::feedback::{FeedbackRecord, OutcomeRecord};
use crate::domain::llm::ModelId;
use crate::domain::repository::{BatchSelector, FeedbackStore, StoreError};
use crate::domain::task::TaskId;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TrainingJob {
    id: Uuid,
    selector: BatchSelector,
}

/// Aggregated view of one model's accumulated records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelStats {
    pub outcomes: usize,
    pub successes: usize,
    pub mean_latency_ms: u64,
    pub feedback: usize,
    pub mean_rating: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub job_id: Uuid,
    pub records: usize,
    pub model_stats: HashMap<ModelId, ModelStats>,
}

/// Training progress, observed over the status channel.
#[derive(Debug, Clone)]
pub enum TrainingStatus {
    Idle,
    Running { job_id: Uuid },
    Completed { report: TrainingReport },
    Failed { job_id: Uuid, reason: String },
}

pub struct LearningLoop {
    store: Arc<dyn FeedbackStore>,
    events: EventBus,
    job_tx: mpsc::UnboundedSender<TrainingJob>,
    status_rx: watch::Receiver<TrainingStatus>,
    shutdown: CancellationToken,
}

impl LearningLoop {
    /// Construct the loop and spawn its training worker.
    pub fn new(store: Arc<dyn FeedbackStore>, events: EventBus, min_batch_size: usize) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(TrainingStatus::Idle);
        let shutdown = CancellationToken::new();

        tokio::spawn(training_worker(
            store.clone(),
            events.clone(),
            job_rx,
            status_tx,
            min_batch_size,
            shutdown.clone(),
        ));

        Self {
            store,
            events,
            job_tx,
            status_rx,
            shutdown,
        }
    }

    /// Append one execution outcome. Fire-and-forget with respect to
    /// training: only store unavailability surfaces, and only to this
    /// caller.
    pub async fn record_outcome(
        &self,
        task_id: TaskId,
        model_id: ModelId,
        success: bool,
        latency_ms: u64,
    ) -> Result<(), StoreError> {
        let record = OutcomeRecord::new(task_id, model_id.clone(), success, latency_ms);
        self.store.append_outcome(record).await?;
        self.events
            .publish_learning_event(LearningEvent::OutcomeRecorded {
                task_id,
                model_id,
                success,
            });
        Ok(())
    }

    /// Append explicit feedback.
    pub async fn record_feedback(&self, record: FeedbackRecord) -> Result<(), StoreError> {
        self.store.append_feedback(record).await
    }

    /// Hand a training job to the background worker. Long-running; progress
    /// arrives on [`LearningLoop::status`], never here.
    pub fn trigger_training(&self, selector: BatchSelector) -> anyhow::Result<Uuid> {
        let job = TrainingJob {
            id: Uuid::new_v4(),
            selector,
        };
        let id = job.id;
        self.job_tx
            .send(job)
            .map_err(|_| anyhow::anyhow!("Training worker is no longer running"))?;
        debug!("Training job {} queued", id);
        Ok(id)
    }

    /// Status channel for observers; holds the most recent state.
    pub fn status(&self) -> watch::Receiver<TrainingStatus> {
        self.status_rx.clone()
    }

    /// Stop the training worker. Pending jobs are dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn training_worker(
    store: Arc<dyn FeedbackStore>,
    events: EventBus,
    mut job_rx: mpsc::UnboundedReceiver<TrainingJob>,
    status_tx: watch::Sender<TrainingStatus>,
    min_batch_size: usize,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Training worker shutting down");
                return;
            }
            job = job_rx.recv() => match job {
                Some(job) => job,
                None => return,
            },
        };

        let job_id = job.id;
        info!("Training job {} started", job_id);
        let _ = status_tx.send(TrainingStatus::Running { job_id });
        events.publish_learning_event(LearningEvent::TrainingStarted {
            job_id,
            started_at: Utc::now(),
        });

        match run_training_job(&*store, &job, min_batch_size).await {
            Ok(report) => {
                info!(
                    "Training job {} completed over {} record(s)",
                    job_id, report.records
                );
                events.publish_learning_event(LearningEvent::TrainingCompleted {
                    job_id,
                    records: report.records,
                    completed_at: Utc::now(),
                });
                let _ = status_tx.send(TrainingStatus::Completed { report });
            }
            Err(reason) => {
                warn!("Training job {} failed: {}", job_id, reason);
                events.publish_learning_event(LearningEvent::TrainingFailed {
                    job_id,
                    reason: reason.clone(),
                    failed_at: Utc::now(),
                });
                let _ = status_tx.send(TrainingStatus::Failed { job_id, reason });
            }
        }
    }
}

/// Read the batch and aggregate per-model evaluation statistics. The
/// training algorithm itself lives elsewhere; this job prepares and
/// summarizes the batch it would consume.
async fn run_training_job(
    store: &dyn FeedbackStore,
    job: &TrainingJob,
    min_batch_size: usize,
) -> Result<TrainingReport, String> {
    let outcomes = store
        .select_outcomes(&job.selector)
        .await
        .map_err(|e| e.to_string())?;
    let feedback = store
        .select_feedback(&job.selector)
        .await
        .map_err(|e| e.to_string())?;

    let records = outcomes.len() + feedback.len();
    if records < min_batch_size {
        return Err(format!(
            "batch of {records} record(s) is below the minimum of {min_batch_size}"
        ));
    }

    let mut model_stats: HashMap<ModelId, ModelStats> = HashMap::new();
    let mut latency_sums: HashMap<ModelId, u64> = HashMap::new();
    let mut rating_sums: HashMap<ModelId, (u32, usize)> = HashMap::new();

    for outcome in &outcomes {
        let stats = model_stats.entry(outcome.model_id.clone()).or_default();
        stats.outcomes += 1;
        if outcome.success {
            stats.successes += 1;
        }
        *latency_sums.entry(outcome.model_id.clone()).or_default() += outcome.latency_ms;
    }
    for record in &feedback {
        let stats = model_stats.entry(record.model_id.clone()).or_default();
        stats.feedback += 1;
        if let Some(rating) = record.rating {
            let (sum, count) = rating_sums.entry(record.model_id.clone()).or_default();
            *sum += rating as u32;
            *count += 1;
        }
    }
    for (model, stats) in model_stats.iter_mut() {
        if stats.outcomes > 0 {
            stats.mean_latency_ms = latency_sums[model] / stats.outcomes as u64;
        }
        if let Some((sum, count)) = rating_sums.get(model) {
            if *count > 0 {
                stats.mean_rating = Some(*sum as f32 / *count as f32);
            }
        }
    }

    Ok(TrainingReport {
        job_id: job.id,
        records,
        model_stats,
    })
}
