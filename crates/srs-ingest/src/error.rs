use chrono::{DateTime, Utc};
use srs_adapters::{NormalizeError, UploadFormat};
use srs_core::Rule;
use srs_storage::{FetchError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("{len} items is outside 1..={max} for a {} batch", .format.as_str())]
    BatchSize {
        format: UploadFormat,
        len: usize,
        max: usize,
    },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("no {} shift on stage {stage_id} covers {played_time}", .rule.as_str())]
    ScheduleNotFound {
        stage_id: i32,
        rule: Rule,
        played_time: DateTime<Utc>,
    },

    #[error("schedule calendar unavailable: {0}")]
    Calendar(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("upsert worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("item {index} rejected: {source}")]
    ItemRejected {
        index: usize,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// True when the submitter sent something unacceptable, as opposed to a
    /// failure on our side.
    pub fn is_client_error(&self) -> bool {
        match self {
            IngestError::Payload(_)
            | IngestError::BatchSize { .. }
            | IngestError::Normalize(_)
            | IngestError::ScheduleNotFound { .. } => true,
            IngestError::Store(err) => {
                matches!(err, StoreError::NotFound(_) | StoreError::Constraint(_))
            }
            IngestError::Calendar(_) | IngestError::Worker(_) => false,
            IngestError::ItemRejected { source, .. } => source.is_client_error(),
        }
    }

    pub(crate) fn at(self, index: usize) -> Self {
        IngestError::ItemRejected {
            index,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_inherit_the_client_flag_of_their_cause() {
        let bad = IngestError::Normalize(NormalizeError::InvalidWaveCount(2)).at(3);
        assert!(bad.is_client_error());
        assert_eq!(bad.to_string(), "item 3 rejected: expected 3 or 4 waves, got 2");

        let stranger = IngestError::Store(StoreError::NotFound("x".into())).at(0);
        assert!(stranger.is_client_error());
        let calendar = IngestError::Calendar(FetchError::Closed).at(0);
        assert!(!calendar.is_client_error());
    }
}
