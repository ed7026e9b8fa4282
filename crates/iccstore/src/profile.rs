//! In-memory ICC profiles and the timestamp format used for store keys.
use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use shaderfx::SaturationLevel;

/// Fixed-size ICC header preceding the tag table.
pub const ICC_HEADER_LEN: usize = 128;
/// Profile file signature stored at byte offset 36 of every ICC header.
pub const ICC_SIGNATURE: &[u8; 4] = b"acsp";
const SIGNATURE_OFFSET: usize = 36;

/// Basic ISO-8601 with microseconds: fixed width, so lexical order matches
/// chronological order.
const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const KEY_TIMESTAMP_PARSE: &str = "%Y%m%dT%H%M%S%.fZ";

/// A generated ICC profile and the parameters it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorProfile {
    bytes: Vec<u8>,
    created: DateTime<Utc>,
    level: SaturationLevel,
}

impl ColorProfile {
    /// `created` is truncated to microseconds, the precision the store keys
    /// carry, so stored metadata reads back identical.
    pub fn new(bytes: Vec<u8>, created: DateTime<Utc>, level: SaturationLevel) -> Self {
        Self {
            bytes,
            created: created.trunc_subsecs(6),
            level,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn level(&self) -> SaturationLevel {
        self.level
    }
}

pub fn profile_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn profile_description(level: SaturationLevel) -> String {
    format!("Custom saturation {level}")
}

/// Basic well-formedness check: long enough for a header and carrying the
/// `acsp` signature.
pub fn verify_icc(bytes: &[u8]) -> Result<(), String> {
    if bytes.is_empty() {
        return Err("profile output is empty".to_string());
    }
    if bytes.len() < ICC_HEADER_LEN {
        return Err(format!(
            "profile output is {} bytes, shorter than the {ICC_HEADER_LEN}-byte ICC header",
            bytes.len()
        ));
    }
    let signature = &bytes[SIGNATURE_OFFSET..SIGNATURE_OFFSET + ICC_SIGNATURE.len()];
    if signature != ICC_SIGNATURE {
        return Err(format!(
            "missing ICC signature at offset {SIGNATURE_OFFSET} (found {signature:02x?})"
        ));
    }
    Ok(())
}

pub(crate) fn format_key_timestamp(created: DateTime<Utc>) -> String {
    created.format(KEY_TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_key_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, KEY_TIMESTAMP_PARSE)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
