//! File-backed device registry
//!
//! The whole record set lives in one JSON array on disk. Mutations take a
//! process-wide lock, read the full set, modify it, and write it back via a
//! temporary file that is atomically renamed over the durable one, so a
//! reader only ever sees a complete prior write.

mod device;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;
use uuid::Uuid;

pub use device::{clean_tags, parse_tag_list, Device, DeviceUpdate, NewDevice};

use crate::{Error, Result};

/// Durable, concurrency-safe store of device records
#[derive(Debug)]
pub struct DeviceRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DeviceRegistry {
    /// Open the registry at `path`, creating an empty one if missing
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the directory or initial file cannot be created
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let registry = Self {
            path,
            write_lock: Mutex::new(()),
        };

        if !registry.path.exists() {
            tracing::info!(path = %registry.path.display(), "initialising empty device registry");
            registry.write_all(&[])?;
        }

        Ok(registry)
    }

    /// Location of the durable file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All devices in stored order
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be read or decoded
    pub fn list(&self) -> Result<Vec<Device>> {
        self.read_all()
    }

    /// Look up one device; a missing id is `Ok(None)`
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be read or decoded
    pub fn get(&self, id: &str) -> Result<Option<Device>> {
        Ok(self.read_all()?.into_iter().find(|d| d.id == id))
    }

    /// Register a new device under a freshly minted id
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for blank required fields, `Error::Storage`
    /// if persisting fails
    pub fn add(&self, fields: NewDevice) -> Result<Device> {
        let device = fields.into_device(Uuid::new_v4().simple().to_string())?;

        let _guard = self.lock();
        let mut devices = self.read_all()?;
        devices.push(device.clone());
        self.write_all(&devices)?;

        tracing::info!(device_id = %device.id, name = %device.name, "device added");
        Ok(device)
    }

    /// Merge `update` into the device with `id`; a missing id is `Ok(None)`
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the update blanks a required field,
    /// `Error::Storage` if persisting fails
    pub fn update(&self, id: &str, update: DeviceUpdate) -> Result<Option<Device>> {
        let _guard = self.lock();
        let mut devices = self.read_all()?;

        let Some(slot) = devices.iter_mut().find(|d| d.id == id) else {
            tracing::debug!(device_id = %id, "update for unknown device");
            return Ok(None);
        };

        let merged = update.apply(slot)?;
        *slot = merged.clone();
        self.write_all(&devices)?;

        tracing::info!(device_id = %id, "device updated");
        Ok(Some(merged))
    }

    /// Remove the device with `id`, returning whether anything was removed
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if persisting fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock();
        let mut devices = self.read_all()?;

        let before = devices.len();
        devices.retain(|d| d.id != id);
        if devices.len() == before {
            return Ok(false);
        }

        self.write_all(&devices)?;
        tracing::info!(device_id = %id, "device deleted");
        Ok(true)
    }

    // The guarded value is `()` and every write is a whole-file rename, so a
    // panic in another holder cannot leave anything half-updated.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_all(&self) -> Result<Vec<Device>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("failed to read {}: {e}", self.path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("failed to decode {}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, devices: &[Device]) -> Result<()> {
        let staged = self.stage(devices)?;
        self.commit(staged)
    }

    /// Write the record set to a temporary file next to the durable one
    fn stage(&self, devices: &[Device]) -> Result<NamedTempFile> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let storage_err = |e: std::io::Error| {
            Error::Storage(format!("failed to stage {}: {e}", self.path.display()))
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(storage_err)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), devices)
            .map_err(|e| Error::Storage(format!("failed to encode devices: {e}")))?;
        tmp.write_all(b"\n").map_err(storage_err)?;
        tmp.as_file().sync_all().map_err(storage_err)?;

        Ok(tmp)
    }

    /// Atomically replace the durable file with a staged one
    fn commit(&self, staged: NamedTempFile) -> Result<()> {
        staged.persist(&self.path).map_err(|e| {
            Error::Storage(format!("failed to replace {}: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }
}
