//! Decoding of the opaque base64 identifiers carried by upstream exports.
//!
//! A result envelope decodes to `CoopHistoryDetail-u-{owner}:{stamp}_{uuid}`
//! and a player envelope to `CoopPlayer-u-{owner}:{stamp}_{uuid}:u-{actor}`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NormalizeError;

static MATCH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{8}T\d{6}_[0-9a-f-]{36}").expect("valid match id pattern"));
static ACTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"u-([a-z0-9]{20})").expect("valid actor pattern"));
static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)$").expect("valid trailing digits pattern"));

fn decode_envelope(raw: &str) -> Result<String, NormalizeError> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|_| NormalizeError::malformed(raw, "not a base64 envelope"))?;
    String::from_utf8(bytes).map_err(|_| NormalizeError::malformed(raw, "envelope is not utf-8"))
}

/// `{yyyymmdd}T{hhmmss}_{uuid}` portion of a result envelope.
pub fn decode_match_id(raw: &str) -> Result<String, NormalizeError> {
    let decoded = decode_envelope(raw)?;
    MATCH_ID
        .find(&decoded)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| NormalizeError::malformed(raw, "no timestamped match uuid"))
}

/// Participant token of a player envelope (the last `u-` reference).
pub fn decode_player_ref(raw: &str) -> Result<String, NormalizeError> {
    let decoded = decode_envelope(raw)?;
    ACTOR
        .captures_iter(&decoded)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| NormalizeError::malformed(raw, "no actor reference"))
}

/// Whether the report owner and the participant of a player envelope are the same actor.
pub fn is_uploader(raw: &str) -> Result<bool, NormalizeError> {
    let decoded = decode_envelope(raw)?;
    let refs: Vec<&str> = ACTOR.find_iter(&decoded).map(|m| m.as_str()).collect();
    match refs.as_slice() {
        [owner, participant] => Ok(owner == participant),
        _ => Err(NormalizeError::malformed(
            raw,
            "expected exactly two actor references",
        )),
    }
}

/// Numeric id behind an opaque integer envelope such as `CoopStage-7`.
pub fn decode_integer_id(raw: &str) -> Result<i32, NormalizeError> {
    let decoded = decode_envelope(raw)?;
    TRAILING_DIGITS
        .captures(&decoded)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or_else(|| NormalizeError::malformed(raw, "no trailing integer id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "abcdefghij0123456789";
    const MATE: &str = "k1m2n3p4q5r6s7t8u9v0";
    const STAMP: &str = "20240105T123456_1b2c3d4e-5f60-4a7b-8c9d-0e1f2a3b4c5d";

    fn encode(text: &str) -> String {
        STANDARD.encode(text)
    }

    fn player_envelope(actor: &str) -> String {
        encode(&format!("CoopPlayer-u-{OWNER}:{STAMP}:u-{actor}"))
    }

    #[test]
    fn match_id_is_the_timestamped_uuid() {
        let raw = encode(&format!("CoopHistoryDetail-u-{OWNER}:{STAMP}"));
        assert_eq!(decode_match_id(&raw).unwrap(), STAMP);
    }

    #[test]
    fn match_id_without_timestamp_is_rejected() {
        let raw = encode(&format!("CoopHistoryDetail-u-{OWNER}:1b2c3d4e"));
        assert!(matches!(
            decode_match_id(&raw),
            Err(NormalizeError::MalformedIdentifier { .. })
        ));
        assert!(matches!(
            decode_match_id("%%% not base64 %%%"),
            Err(NormalizeError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn player_ref_is_the_trailing_participant_token() {
        assert_eq!(decode_player_ref(&player_envelope(MATE)).unwrap(), MATE);
        assert_eq!(decode_player_ref(&player_envelope(OWNER)).unwrap(), OWNER);
        let raw = encode("CoopPlayer-nobody");
        assert!(decode_player_ref(&raw).is_err());
    }

    #[test]
    fn uploader_is_detected_from_two_equal_references() {
        assert!(is_uploader(&player_envelope(OWNER)).unwrap());
        assert!(!is_uploader(&player_envelope(MATE)).unwrap());
    }

    #[test]
    fn uploader_check_requires_exactly_two_references() {
        let once = encode(&format!("CoopPlayer-{STAMP}:u-{OWNER}"));
        let thrice = encode(&format!("CoopPlayer-u-{OWNER}:{STAMP}:u-{OWNER}:u-{OWNER}"));
        assert!(is_uploader(&once).is_err());
        assert!(is_uploader(&thrice).is_err());
    }

    #[test]
    fn integer_ids_take_the_trailing_digits() {
        assert_eq!(decode_integer_id(&encode("CoopStage-7")).unwrap(), 7);
        assert_eq!(
            decode_integer_id(&encode("SpecialWeapon-20006")).unwrap(),
            20006
        );
        assert!(decode_integer_id(&encode("CoopStage-")).is_err());
    }
}
