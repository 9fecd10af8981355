//! Coercion of free-text form input into typed device payloads
//!
//! A blank or unparsable numeric field means "not provided", never an error.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::gateway::{ImageFit, PlaybackSettings, TransitionType};
use crate::registry::parse_tag_list;
use crate::Result;

/// Parse an optional integer field; blank or invalid input yields `None`
#[must_use]
pub fn optional_int(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Parse an optional decimal field; blank, invalid or non-finite input yields `None`
#[must_use]
pub fn optional_float(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Optional text field; blank input yields `None`
#[must_use]
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Accept a string, number or boolean as free text; `null` is absent
fn free_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
                .collect::<Vec<_>>()
                .join(","),
        ),
        Some(other) => Some(other.to_string()),
    })
}

/// Playback settings as typed into a form, every field free text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackForm {
    #[serde(default, deserialize_with = "free_text")]
    pub image_duration: Option<String>,
    #[serde(default, deserialize_with = "free_text")]
    pub image_fit: Option<String>,
    #[serde(default, deserialize_with = "free_text")]
    pub image_rotation: Option<String>,
    #[serde(default, deserialize_with = "free_text")]
    pub transition_type: Option<String>,
    #[serde(default, deserialize_with = "free_text")]
    pub transition_duration: Option<String>,
    /// Comma separated source names, or a list
    #[serde(default, deserialize_with = "free_text")]
    pub splitscreen_sources: Option<String>,
}

impl PlaybackForm {
    /// Coerce into a partial playback update
    ///
    /// Numeric fields that are blank or unparsable are omitted. Named
    /// choices (fit, transition) must be known values when present.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an unknown fit or transition name
    pub fn into_settings(self) -> Result<PlaybackSettings> {
        let image_fit = optional_text(self.image_fit.as_deref())
            .map(|s| s.parse::<ImageFit>())
            .transpose()?;
        let transition_type = optional_text(self.transition_type.as_deref())
            .map(|s| s.parse::<TransitionType>())
            .transpose()?;
        let splitscreen_sources = optional_text(self.splitscreen_sources.as_deref())
            .map(|s| parse_tag_list(&s))
            .filter(|v| !v.is_empty());

        Ok(PlaybackSettings {
            image_duration: optional_int(self.image_duration.as_deref()),
            image_fit,
            image_rotation: optional_int(self.image_rotation.as_deref()),
            transition_type,
            transition_duration: optional_float(self.transition_duration.as_deref()),
            splitscreen_sources,
        })
    }
}
