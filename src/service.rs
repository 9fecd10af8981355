//! Device service: registry lookups, host policy, gateway calls and audit
//!
//! Each call resolves the device record fresh from the registry and builds
//! a one-off [`DeviceGateway`], so edits to a device take effect on the
//! next operation. A device id that does not exist yields `Ok(None)`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::gateway::{DeviceGateway, MediaPayload, PlaybackSettings, SourceSpec};
use crate::registry::{Device, DeviceRegistry, DeviceUpdate, NewDevice};
use crate::security::{HostPolicy, Operator};
use crate::Result;

/// One row of the fleet overview
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub device: Device,
    /// Player state, if the device answered
    pub state: Option<Value>,
    /// Why the state could not be fetched
    pub error: Option<String>,
}

/// Operator-facing facade over the registry and device gateways
#[derive(Debug, Clone)]
pub struct DeviceService {
    registry: Arc<DeviceRegistry>,
    hosts: HostPolicy,
    timeout: Duration,
    audit: Arc<AuditLog>,
}

impl DeviceService {
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, hosts: HostPolicy, timeout: Duration) -> Self {
        Self {
            registry,
            hosts,
            timeout,
            audit: Arc::new(AuditLog::new()),
        }
    }

    /// Open the configured registry and build the service around it
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the registry cannot be opened
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = DeviceRegistry::open(&config.storage_path)?;
        Ok(Self::new(
            Arc::new(registry),
            HostPolicy::new(&config.allowed_hosts),
            config.remote_timeout,
        ))
    }

    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    // Registry

    /// # Errors
    ///
    /// Returns `Error::Storage` if the registry cannot be read
    pub fn list_devices(&self, _operator: &Operator) -> Result<Vec<Device>> {
        self.registry.list()
    }

    /// # Errors
    ///
    /// Returns `Error::Storage` if the registry cannot be read
    pub fn get_device(&self, _operator: &Operator, id: &str) -> Result<Option<Device>> {
        self.registry.get(id)
    }

    /// Register a device after checking its base URL against the host policy
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for bad fields or a disallowed host,
    /// `Error::Storage` if persisting fails
    pub fn add_device(&self, operator: &Operator, fields: NewDevice) -> Result<Device> {
        self.hosts.check(&fields.base_url)?;
        let device = self.registry.add(fields)?;
        self.audit.record(operator, &device.id, "device.create", None);
        Ok(device)
    }

    /// # Errors
    ///
    /// Returns `Error::Validation` for bad fields or a disallowed host,
    /// `Error::Storage` if persisting fails
    pub fn update_device(
        &self,
        operator: &Operator,
        id: &str,
        update: DeviceUpdate,
    ) -> Result<Option<Device>> {
        if let Some(base_url) = update.base_url.as_deref() {
            self.hosts.check(base_url)?;
        }
        let updated = self.registry.update(id, update)?;
        if updated.is_some() {
            self.audit.record(operator, id, "device.update", None);
        }
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `Error::Storage` if persisting fails
    pub fn delete_device(&self, operator: &Operator, id: &str) -> Result<bool> {
        let removed = self.registry.delete(id)?;
        if removed {
            self.audit.record(operator, id, "device.delete", None);
        }
        Ok(removed)
    }

    // Remote reads

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn get_state(&self, _operator: &Operator, id: &str) -> Result<Option<Value>> {
        self.with_gateway(id, |gw| async move { gw.get_state().await }).await
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn get_config(&self, _operator: &Operator, id: &str) -> Result<Option<Value>> {
        self.with_gateway(id, |gw| async move { gw.get_config().await }).await
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn list_sources(&self, _operator: &Operator, id: &str) -> Result<Option<Value>> {
        self.with_gateway(id, |gw| async move { gw.list_sources().await }).await
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn fetch_preview(
        &self,
        _operator: &Operator,
        id: &str,
        source: &str,
        media_path: &str,
    ) -> Result<Option<MediaPayload>> {
        self.with_gateway(id, |gw| async move { gw.fetch_preview(source, media_path).await })
            .await
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn export_config(
        &self,
        operator: &Operator,
        id: &str,
    ) -> Result<Option<MediaPayload>> {
        let exported = self
            .with_gateway(id, |gw| async move { gw.export_config().await })
            .await?;
        if exported.is_some() {
            self.audit.record(operator, id, "config.export", None);
        }
        Ok(exported)
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn download_log(
        &self,
        _operator: &Operator,
        id: &str,
        name: &str,
    ) -> Result<Option<MediaPayload>> {
        self.with_gateway(id, |gw| async move { gw.download_log(name).await })
            .await
    }

    // Remote mutations, audited on success

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn create_source(
        &self,
        operator: &Operator,
        id: &str,
        spec: &SourceSpec,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.create_source(spec).await })
            .await?;
        self.audit_if(result.is_some(), operator, id, "source.create", Some(to_value(spec)));
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn update_source(
        &self,
        operator: &Operator,
        id: &str,
        name: &str,
        spec: &SourceSpec,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.update_source(name, spec).await })
            .await?;
        self.audit_if(result.is_some(), operator, id, "source.update", Some(to_value(spec)));
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn delete_source(
        &self,
        operator: &Operator,
        id: &str,
        name: &str,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.delete_source(name).await })
            .await?;
        self.audit_if(
            result.is_some(),
            operator,
            id,
            "source.delete",
            Some(Value::String(name.to_string())),
        );
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `Error::Validation` for out-of-range settings, or the gateway's
    /// error if the device call fails
    pub async fn set_playback(
        &self,
        operator: &Operator,
        id: &str,
        settings: &PlaybackSettings,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.set_playback(settings).await })
            .await?;
        self.audit_if(result.is_some(), operator, id, "playback.update", Some(to_value(settings)));
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `Error::Validation` for an unknown action, or the gateway's
    /// error if the device call fails
    pub async fn player_action(
        &self,
        operator: &Operator,
        id: &str,
        action: &str,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.trigger_player_action(action).await })
            .await?;
        self.audit_if(result.is_some(), operator, id, &format!("player.{action}"), None);
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns the gateway's error if the device call fails
    pub async fn toggle_info_screen(
        &self,
        operator: &Operator,
        id: &str,
        enabled: bool,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.toggle_info_screen(enabled).await })
            .await?;
        self.audit_if(
            result.is_some(),
            operator,
            id,
            "info_screen.toggle",
            Some(serde_json::json!({ "enabled": enabled })),
        );
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty upload, or the gateway's
    /// error if the device call fails
    pub async fn import_config(
        &self,
        operator: &Operator,
        id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<Value>> {
        let result = self
            .with_gateway(id, |gw| async move { gw.import_config(file_name, bytes).await })
            .await?;
        self.audit_if(
            result.is_some(),
            operator,
            id,
            "config.import",
            Some(Value::String(file_name.to_string())),
        );
        Ok(result)
    }

    // Fleet

    /// State of every registered device, fetched concurrently
    ///
    /// A device that fails to answer is reported with its error message
    /// rather than failing the whole overview.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the registry cannot be read
    pub async fn overview(&self, _operator: &Operator) -> Result<Vec<DeviceSummary>> {
        let devices = self.registry.list()?;

        let fetches = devices.into_iter().map(move |device| async move {
            let outcome = match self.gateway_for(&device) {
                Ok(gw) => gw.get_state().await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(state) => DeviceSummary {
                    device,
                    state: Some(state),
                    error: None,
                },
                Err(e) => {
                    tracing::debug!(
                        device_id = %device.id,
                        error = %e,
                        "overview state fetch failed"
                    );
                    DeviceSummary {
                        device,
                        state: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        });

        Ok(futures::future::join_all(fetches).await)
    }

    fn gateway_for(&self, device: &Device) -> Result<DeviceGateway> {
        let gateway = DeviceGateway::new(device, Some(self.timeout))?;
        self.hosts.check_endpoint(gateway.endpoint())?;
        Ok(gateway)
    }

    async fn with_gateway<T, F, Fut>(&self, id: &str, op: F) -> Result<Option<T>>
    where
        F: FnOnce(DeviceGateway) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(device) = self.registry.get(id)? else {
            tracing::debug!(device_id = %id, "device not found");
            return Ok(None);
        };
        let gateway = self.gateway_for(&device)?;
        op(gateway).await.map(Some)
    }

    fn audit_if(
        &self,
        done: bool,
        operator: &Operator,
        id: &str,
        action: &str,
        payload: Option<Value>,
    ) {
        if done {
            self.audit.record(operator, id, action, payload.as_ref());
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
