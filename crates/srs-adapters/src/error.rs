use thiserror::Error;

/// Reasons a submission item is rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("malformed identifier `{raw}`: {reason}")]
    MalformedIdentifier { raw: String, reason: &'static str },

    #[error("cannot determine the uploader: {flagged} player(s) flagged, {undetermined} undetermined")]
    AmbiguousUploader { flagged: usize, undetermined: usize },

    #[error("expected 3 or 4 waves, got {0}")]
    InvalidWaveCount(usize),

    #[error("unexpected wave number {0}")]
    InvalidWaveNumber(i32),

    #[error("boss wave and boss result disagree")]
    BossWaveMismatch,

    #[error("unsupported outcome code {0}")]
    InvalidOutcomeCode(i32),

    #[error("expected 1 to 4 players, got {0}")]
    InvalidPlayerCount(usize),

    #[error("{field} must have {expected} entries, got {len}")]
    MalformedTally {
        field: &'static str,
        expected: usize,
        len: usize,
    },

    #[error("invalid unix timestamp {0}")]
    InvalidTimestamp(i64),
}

impl NormalizeError {
    pub(crate) fn malformed(raw: &str, reason: &'static str) -> Self {
        NormalizeError::MalformedIdentifier {
            raw: raw.to_string(),
            reason,
        }
    }
}
