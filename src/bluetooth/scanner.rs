use anyhow::{Context, Result};
use async_trait::async_trait;
use bluer::{Adapter, Address, Session};
use tracing::{debug, info};

use super::{Discovery, CONTROL_SERVICE_UUID};
use crate::error::TransportError;

/// A connected device that exposes the control service.
#[derive(Debug, Clone)]
pub struct EligibleDevice {
    pub name: String,
    pub address: Address,
}

/// Open a BlueZ session on the named adapter, or the default one.
pub async fn open_adapter(name: Option<&str>) -> Result<(Session, Adapter)> {
    let session = Session::new()
        .await
        .context("connecting to bluetoothd")?;
    let adapter = match name {
        Some(name) => session
            .adapter(name)
            .with_context(|| format!("opening adapter {}", name))?,
        None => session
            .default_adapter()
            .await
            .context("opening default adapter")?,
    };
    debug!("Using adapter {}", adapter.name());
    Ok((session, adapter))
}

/// List devices that are currently connected and advertise the control service.
/// Only BlueZ's cached state is consulted; no inquiry scan is started.
pub async fn list_eligible_devices(adapter: &Adapter) -> Result<Vec<EligibleDevice>> {
    let mut result = Vec::new();

    for addr in adapter.device_addresses().await? {
        let device = adapter.device(addr)?;
        if !device.is_connected().await? {
            continue;
        }

        let uuids = device.uuids().await?.unwrap_or_default();
        if !uuids.contains(&CONTROL_SERVICE_UUID) {
            continue;
        }

        let name = device.name().await?.unwrap_or_default();
        debug!("Found eligible device: {} ({})", name, addr);
        result.push(EligibleDevice {
            name,
            address: addr,
        });
    }

    info!("Found {} eligible devices", result.len());
    Ok(result)
}

/// [`Discovery`] backed by BlueZ.
pub struct BluezScanner {
    adapter: Adapter,
}

impl BluezScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    pub async fn list(&self) -> Result<Vec<EligibleDevice>> {
        list_eligible_devices(&self.adapter).await
    }
}

#[async_trait]
impl Discovery for BluezScanner {
    async fn eligible_devices(&self) -> Result<Vec<String>, TransportError> {
        let devices = self
            .list()
            .await
            .map_err(|e| TransportError::Discovery(format!("{:#}", e)))?;
        Ok(devices.iter().map(|d| d.address.to_string()).collect())
    }
}
