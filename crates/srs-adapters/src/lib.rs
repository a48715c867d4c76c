//! Upstream export adapters + the normalization pipeline into canonical results.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use srs_core::{CoopResult, UnknownVariant};

pub mod enemy;
pub mod error;
pub mod format_a;
pub mod format_b;
pub mod identity;
pub mod player;
pub mod raw;
pub mod result;
pub mod wave;

pub use enemy::{canonicalize, CanonicalEnemies, EnemyEncounter};
pub use error::NormalizeError;
pub use format_a::{from_format_a, ClientExportItem};
pub use format_b::{from_format_b, CompanionAppResult};
pub use identity::{decode_integer_id, decode_match_id, decode_player_ref, is_uploader};
pub use raw::RawCoopResult;
pub use result::{infer_mode, normalize};
pub use wave::{special_usage, wave_clear, Outcome};

pub const CRATE_NAME: &str = "srs-adapters";

/// Upstream export a submission batch was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadFormat {
    /// Raw game-client export.
    ClientExport,
    /// Third-party companion-app export.
    CompanionApp,
}

impl UploadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadFormat::ClientExport => "client-export",
            UploadFormat::CompanionApp => "companion-app",
        }
    }

    pub fn max_batch(&self) -> usize {
        match self {
            UploadFormat::ClientExport => 50,
            UploadFormat::CompanionApp => 200,
        }
    }

    /// Whether a batch of this format commits as a single unit.
    pub fn is_atomic(&self) -> bool {
        matches!(self, UploadFormat::CompanionApp)
    }
}

impl FromStr for UploadFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client-export" => Ok(UploadFormat::ClientExport),
            "companion-app" => Ok(UploadFormat::CompanionApp),
            other => Err(UnknownVariant {
                kind: "upload format",
                value: other.to_string(),
            }),
        }
    }
}

pub fn normalize_client_export(item: &ClientExportItem) -> Result<CoopResult, NormalizeError> {
    normalize(from_format_a(item)?)
}

pub fn normalize_companion_app(item: &CompanionAppResult) -> Result<CoopResult, NormalizeError> {
    normalize(from_format_b(item)?)
}

/// Normalizes one JSON item of the given format.
///
/// The outer error is a payload that does not fit the format's shape; the
/// inner one is a normalization failure.
pub fn normalize_value(
    format: UploadFormat,
    value: serde_json::Value,
) -> Result<Result<CoopResult, NormalizeError>, serde_json::Error> {
    match format {
        UploadFormat::ClientExport => {
            let item: ClientExportItem = serde_json::from_value(value)?;
            Ok(normalize_client_export(&item))
        }
        UploadFormat::CompanionApp => {
            let item: CompanionAppResult = serde_json::from_value(value)?;
            Ok(normalize_companion_app(&item))
        }
    }
}
