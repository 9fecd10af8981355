//! Device records and the field sets used to create or patch them

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A remote slideshow device as stored in the registry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Registry-assigned identifier, immutable once minted
    pub id: String,

    /// Display label
    pub name: String,

    /// Root address of the device's REST API
    pub base_url: String,

    /// Credentials used for the device's `/login` handshake
    pub username: String,
    pub password: String,

    /// Free text; stored as `""` when absent
    #[serde(
        default,
        serialize_with = "serialize_notes",
        deserialize_with = "deserialize_notes"
    )]
    pub notes: Option<String>,

    /// Operator tags in entry order
    #[serde(default)]
    pub tags: Vec<String>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("notes", &self.notes)
            .field("tags", &self.tags)
            .finish()
    }
}

#[allow(clippy::ref_option)]
fn serialize_notes<S: Serializer>(
    notes: &Option<String>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(notes.as_deref().unwrap_or(""))
}

fn deserialize_notes<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.filter(|n| !n.is_empty()))
}

/// Fields supplied when registering a new device
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub base_url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewDevice {
    /// Trim and validate the fields, minting a record with the given id
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if name, base URL or username is blank
    pub(crate) fn into_device(self, id: String) -> Result<Device> {
        let name = required("name", &self.name)?;
        let base_url = required("base_url", &self.base_url)?;
        let username = required("username", &self.username)?;

        Ok(Device {
            id,
            name,
            base_url,
            username,
            password: self.password,
            notes: clean_notes(self.notes.as_deref()),
            tags: clean_tags(self.tags),
        })
    }
}

/// Partial update: present fields overwrite, absent fields are kept
///
/// There is no `id` field; an `id` key in an incoming JSON body is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `Some("")` clears the notes
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl DeviceUpdate {
    /// Merge this update over an existing record
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if a required field is present but blank
    pub(crate) fn apply(self, existing: &Device) -> Result<Device> {
        let mut merged = existing.clone();

        if let Some(name) = self.name {
            merged.name = required("name", &name)?;
        }
        if let Some(base_url) = self.base_url {
            merged.base_url = required("base_url", &base_url)?;
        }
        if let Some(username) = self.username {
            merged.username = required("username", &username)?;
        }
        if let Some(password) = self.password {
            merged.password = password;
        }
        if let Some(notes) = self.notes {
            merged.notes = clean_notes(Some(&notes));
        }
        if let Some(tags) = self.tags {
            merged.tags = clean_tags(tags);
        }

        Ok(merged)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(ToString::to_string)
}

/// Trim every tag and drop the empty ones, keeping entry order
#[must_use]
pub fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split a comma separated tag field as typed into a form
#[must_use]
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    clean_tags(raw.split(','))
}
