use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use srs_adapters::{normalize_value, UploadFormat};
use srs_core::CoopResult;
use srs_storage::{ResultStore, ScheduleCalendar, Shift, UpsertOutcome, UpsertPlan, UpsertStatus};
use tokio::task::{Id, JoinSet};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::IngestError;
use crate::mapper::{needs_calendar, plan_upsert};

/// Wire shape of a submission: `{"results": [...]}`.
#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    results: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct RejectedItem {
    pub index: usize,
    pub error: IngestError,
}

#[derive(Debug)]
pub struct IngestReport {
    pub batch_id: Uuid,
    pub format: UploadFormat,
    /// Ordered by item index.
    pub accepted: Vec<UpsertOutcome>,
    /// Ordered by item index. Always empty for atomic formats.
    pub rejected: Vec<RejectedItem>,
}

impl IngestReport {
    pub fn count(&self, status: UpsertStatus) -> usize {
        self.accepted.iter().filter(|o| o.status == status).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
}

impl From<&IngestReport> for BatchSummary {
    fn from(report: &IngestReport) -> Self {
        Self {
            created: report.count(UpsertStatus::Created),
            updated: report.count(UpsertStatus::Updated),
            rejected: report.rejected.len(),
        }
    }
}

/// Parses a submission envelope and normalizes every item, keeping
/// per-item failures in place.
pub fn normalize_batch(
    raw_batch: &[u8],
    format: UploadFormat,
) -> Result<Vec<Result<CoopResult, IngestError>>, IngestError> {
    let envelope: UploadEnvelope = serde_json::from_slice(raw_batch)?;
    let len = envelope.results.len();
    let max = format.max_batch();
    if len == 0 || len > max {
        return Err(IngestError::BatchSize { format, len, max });
    }

    Ok(envelope
        .results
        .into_iter()
        .map(|item| match normalize_value(format, item) {
            Ok(normalized) => normalized.map_err(IngestError::from),
            Err(err) => Err(IngestError::Payload(err)),
        })
        .collect())
}

pub struct IngestPipeline {
    store: Arc<dyn ResultStore>,
    calendar: Arc<dyn ScheduleCalendar>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn ResultStore>, calendar: Arc<dyn ScheduleCalendar>) -> Self {
        Self { store, calendar }
    }

    pub async fn normalize_and_upsert(
        &self,
        raw_batch: &[u8],
        format: UploadFormat,
    ) -> Result<IngestReport, IngestError> {
        let batch_id = Uuid::new_v4();
        let span = info_span!("ingest_batch", %batch_id, format = format.as_str());
        async {
            let items = normalize_batch(raw_batch, format)?;
            let report = if format.is_atomic() {
                self.upsert_atomic(batch_id, format, items).await?
            } else {
                self.upsert_each(batch_id, format, items).await?
            };

            let summary = BatchSummary::from(&report);
            info!(
                created = summary.created,
                updated = summary.updated,
                rejected = summary.rejected,
                "ingest batch finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn upsert_atomic(
        &self,
        batch_id: Uuid,
        format: UploadFormat,
        items: Vec<Result<CoopResult, IngestError>>,
    ) -> Result<IngestReport, IngestError> {
        let plans = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                item.and_then(|result| plan_upsert(result, format, &[]))
                    .map_err(|err| err.at(index))
            })
            .collect::<Result<Vec<UpsertPlan>, IngestError>>()?;

        let accepted = self.store.upsert_results_atomic(&plans).await?;
        Ok(IngestReport {
            batch_id,
            format,
            accepted,
            rejected: Vec::new(),
        })
    }

    async fn upsert_each(
        &self,
        batch_id: Uuid,
        format: UploadFormat,
        items: Vec<Result<CoopResult, IngestError>>,
    ) -> Result<IngestReport, IngestError> {
        let shifts = self.shifts_for(format, &items).await?;
        let mut rejected = Vec::new();
        let mut workers = JoinSet::new();
        let mut task_items: HashMap<Id, usize> = HashMap::new();

        for (index, item) in items.into_iter().enumerate() {
            match item.and_then(|result| plan_upsert(result, format, &shifts)) {
                Ok(plan) => {
                    let store = Arc::clone(&self.store);
                    let handle = workers
                        .spawn(async move { store.upsert_result(&plan).await }.in_current_span());
                    task_items.insert(handle.id(), index);
                }
                Err(error) => rejected.push(RejectedItem { index, error }),
            }
        }

        let mut accepted = Vec::new();
        // A failed task only loses its own item; siblings may already be committed.
        while let Some(joined) = workers.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome.map_err(IngestError::from)),
                Err(err) => (err.id(), Err(IngestError::Worker(err))),
            };
            let Some(index) = task_items.remove(&id) else {
                continue;
            };
            match outcome {
                Ok(outcome) => accepted.push((index, outcome)),
                Err(error) => rejected.push(RejectedItem { index, error }),
            }
        }

        for item in &rejected {
            warn!(index = item.index, error = %item.error, "rejected submission item");
        }
        accepted.sort_by_key(|(index, _)| *index);
        rejected.sort_by_key(|item| item.index);

        Ok(IngestReport {
            batch_id,
            format,
            accepted: accepted.into_iter().map(|(_, outcome)| outcome).collect(),
            rejected,
        })
    }

    /// Fetches the calendar once per batch, and only when some item needs it.
    async fn shifts_for(
        &self,
        format: UploadFormat,
        items: &[Result<CoopResult, IngestError>],
    ) -> Result<Vec<Shift>, IngestError> {
        let needed = items
            .iter()
            .flatten()
            .any(|result| needs_calendar(result, format));
        if !needed {
            return Ok(Vec::new());
        }
        Ok(self.calendar.shifts().await?)
    }
}
