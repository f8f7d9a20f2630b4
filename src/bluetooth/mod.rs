pub mod connection;
pub mod scanner;

use async_trait::async_trait;
use bluer::Uuid;

use crate::error::TransportError;

/// Control service UUID. Only devices advertising it can be controlled, and
/// the RFCOMM endpoint for commands is registered under it.
pub const CONTROL_SERVICE_UUID: Uuid = Uuid::from_u128(0x96cc203e_5068_46ad_b32d_e316f5e069ba);

/// Byte-stream duplex channel to one device.
#[async_trait]
pub trait Transport: Send {
    /// Write all of `data`.
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read whatever the device sent, at most `max` bytes.
    /// Returns an empty buffer on end of stream.
    async fn receive(&mut self, max: usize) -> Result<Vec<u8>, TransportError>;

    /// Release the channel.
    async fn close(&mut self);
}

/// Opens a [`Transport`] to a device address.
#[async_trait]
pub trait Connector: Sync {
    type Transport: Transport;

    async fn open(&self, address: &str) -> Result<Self::Transport, TransportError>;
}

/// Source of devices that are connected and advertise [`CONTROL_SERVICE_UUID`].
#[async_trait]
pub trait Discovery: Sync {
    async fn eligible_devices(&self) -> Result<Vec<String>, TransportError>;
}
