use std::time::Duration;

use async_trait::async_trait;
use bluer::rfcomm::{Profile, ReqError, Role, Security, SecurityLevel, Socket, SocketAddr, Stream};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::{Connector, Transport, CONTROL_SERVICE_UUID};
use crate::error::TransportError;

/// Upper bound for establishing the RFCOMM link.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// RFCOMM stream to the control endpoint of one device.
pub struct RfcommConnection {
    stream: Stream,
    address: Address,
}

#[async_trait]
impl Transport for RfcommConnection {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(data)
            .await
            .map_err(TransportError::Write)?;
        self.stream.flush().await.map_err(TransportError::Write)
    }

    async fn receive(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max];
        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(TransportError::Read)?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("RFCOMM shutdown of {} failed: {}", self.address, e);
        }
        info!("Disconnected from {}", self.address);
    }
}

/// Opens authenticated, encrypted RFCOMM links through BlueZ.
///
/// Without a fixed channel, a client profile for [`CONTROL_SERVICE_UUID`] is
/// registered and BlueZ resolves the channel from the device's SDP record.
pub struct RfcommConnector {
    session: Session,
    adapter: Adapter,
    channel: Option<u8>,
}

impl RfcommConnector {
    pub fn new(session: Session, adapter: Adapter, channel: Option<u8>) -> Self {
        Self {
            session,
            adapter,
            channel,
        }
    }

    async fn connect_channel(&self, address: Address, channel: u8) -> Result<Stream, String> {
        debug!("Connecting to {} on RFCOMM channel {}", address, channel);
        let socket = Socket::new().map_err(|e| e.to_string())?;
        socket
            .set_security(Security {
                level: SecurityLevel::Medium,
                key_size: 0,
            })
            .map_err(|e| e.to_string())?;
        socket
            .connect(SocketAddr::new(address, channel))
            .await
            .map_err(|e| e.to_string())
    }

    async fn connect_profile(&self, address: Address) -> Result<Stream, String> {
        debug!("Connecting to {} via service {}", address, CONTROL_SERVICE_UUID);
        let profile = Profile {
            uuid: CONTROL_SERVICE_UUID,
            role: Some(Role::Client),
            require_authentication: Some(true),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = self
            .session
            .register_profile(profile)
            .await
            .map_err(|e| e.to_string())?;
        let device = self.adapter.device(address).map_err(|e| e.to_string())?;

        // BlueZ hands us the socket through the profile while connect_profile
        // is still pending, so both have to be polled together.
        let connect = device.connect_profile(&CONTROL_SERVICE_UUID);
        tokio::pin!(connect);
        let mut connected = false;
        loop {
            tokio::select! {
                res = &mut connect, if !connected => {
                    res.map_err(|e| e.to_string())?;
                    connected = true;
                }
                req = handle.next() => {
                    let req = req.ok_or("profile unregistered before connection")?;
                    if req.device() != address {
                        debug!("Rejecting profile connection from {}", req.device());
                        req.reject(ReqError::Rejected);
                        continue;
                    }
                    return req.accept().map_err(|e| e.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl Connector for RfcommConnector {
    type Transport = RfcommConnection;

    async fn open(&self, address: &str) -> Result<RfcommConnection, TransportError> {
        let parsed: Address = address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;

        info!("Connecting to {}", parsed);
        let attempt = async {
            match self.channel {
                Some(channel) => self.connect_channel(parsed, channel).await,
                None => self.connect_profile(parsed).await,
            }
        };
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, attempt).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {:?}", CONNECT_TIMEOUT)),
        }
        .map_err(|reason| TransportError::Open {
            address: address.to_string(),
            reason,
        })?;

        info!("Connected to {}", parsed);
        Ok(RfcommConnection {
            stream,
            address: parsed,
        })
    }
}
