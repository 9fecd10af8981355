//! Payloads exchanged with a slideshow device

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Player control actions accepted by `POST /api/player/<action>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerAction {
    Start,
    Stop,
    Reload,
}

impl PlayerAction {
    /// Path segment used on the device
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reload => "reload",
        }
    }
}

impl FromStr for PlayerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "reload" => Ok(Self::Reload),
            other => Err(Error::Validation(format!(
                "unknown player action '{other}' (expected start, stop or reload)"
            ))),
        }
    }
}

impl std::fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How images are scaled on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    Contain,
    Stretch,
    Original,
}

impl FromStr for ImageFit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "contain" => Ok(Self::Contain),
            "stretch" => Ok(Self::Stretch),
            "original" => Ok(Self::Original),
            other => Err(Error::Validation(format!("unknown image fit '{other}'"))),
        }
    }
}

/// Transition effect between slides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    Cut,
    Fade,
    Slide,
    Zoom,
}

impl FromStr for TransitionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cut" => Ok(Self::Cut),
            "fade" => Ok(Self::Fade),
            "slide" => Ok(Self::Slide),
            "zoom" => Ok(Self::Zoom),
            other => Err(Error::Validation(format!("unknown transition type '{other}'"))),
        }
    }
}

/// Partial playback update for `PUT /api/playback`
///
/// Only fields that are `Some` are sent; the device keeps its current value
/// for everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_fit: Option<ImageFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_rotation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<TransitionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splitscreen_sources: Option<Vec<String>>,
}

impl PlaybackSettings {
    /// Check present fields against the ranges the player accepts
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` naming the first out-of-range field
    pub fn validate(&self) -> Result<()> {
        if let Some(d) = self.image_duration {
            if !(1..=3600).contains(&d) {
                return Err(Error::Validation(
                    "image_duration must be between 1 and 3600 seconds".to_string(),
                ));
            }
        }
        if let Some(r) = self.image_rotation {
            if !(0..=359).contains(&r) {
                return Err(Error::Validation(
                    "image_rotation must be between 0 and 359 degrees".to_string(),
                ));
            }
        }
        if let Some(t) = self.transition_duration {
            if !(0.2..=10.0).contains(&t) {
                return Err(Error::Validation(
                    "transition_duration must be between 0.2 and 10 seconds".to_string(),
                ));
            }
        }
        if let Some(sources) = &self.splitscreen_sources {
            if sources.len() > 4 {
                return Err(Error::Validation(
                    "at most 4 splitscreen sources are supported".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether the update carries no fields at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.image_duration.is_none()
            && self.image_fit.is_none()
            && self.image_rotation.is_none()
            && self.transition_type.is_none()
            && self.transition_duration.is_none()
            && self.splitscreen_sources.is_none()
    }
}

/// Media source definition for `/api/sources`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smb_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
    #[serde(default)]
    pub auto_scan: bool,
}

impl SourceSpec {
    /// Drop fields that were submitted blank
    #[must_use]
    pub fn cleaned(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            name: keep(self.name).map(|n| n.trim().to_string()),
            server: keep(self.server),
            share: keep(self.share),
            smb_path: keep(self.smb_path),
            username: keep(self.username),
            password: keep(self.password),
            domain: keep(self.domain),
            subpath: keep(self.subpath),
            auto_scan: self.auto_scan,
        }
    }
}

/// Binary body returned by media, export and log endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    /// `Content-Type` reported by the device, if any
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_action_whitelist() {
        assert_eq!("start".parse::<PlayerAction>().unwrap(), PlayerAction::Start);
        assert_eq!("reload".parse::<PlayerAction>().unwrap(), PlayerAction::Reload);
        assert!(matches!(
            "Start".parse::<PlayerAction>(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            "shutdown".parse::<PlayerAction>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn playback_omits_unset_fields() {
        let settings = PlaybackSettings {
            image_duration: Some(15),
            ..Default::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json, serde_json::json!({ "image_duration": 15 }));

        assert_eq!(
            serde_json::to_value(PlaybackSettings::default()).unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn playback_enums_serialize_lowercase() {
        let settings = PlaybackSettings {
            image_fit: Some(ImageFit::Contain),
            transition_type: Some(TransitionType::Fade),
            ..Default::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["image_fit"], "contain");
        assert_eq!(json["transition_type"], "fade");
    }

    #[test]
    fn playback_range_checks() {
        let ok = PlaybackSettings {
            image_duration: Some(3600),
            image_rotation: Some(0),
            transition_duration: Some(0.2),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_duration = PlaybackSettings {
            image_duration: Some(0),
            ..Default::default()
        };
        assert!(bad_duration.validate().is_err());

        let bad_rotation = PlaybackSettings {
            image_rotation: Some(360),
            ..Default::default()
        };
        assert!(bad_rotation.validate().is_err());

        let bad_transition = PlaybackSettings {
            transition_duration: Some(12.5),
            ..Default::default()
        };
        assert!(bad_transition.validate().is_err());

        let too_many = PlaybackSettings {
            splitscreen_sources: Some(vec!["a".into(); 5]),
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn source_spec_cleaning() {
        let spec = SourceSpec {
            name: Some(" nas ".to_string()),
            server: Some(String::new()),
            share: Some("photos".to_string()),
            password: Some("   ".to_string()),
            ..Default::default()
        }
        .cleaned();

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "nas", "share": "photos", "auto_scan": false })
        );
    }
}
