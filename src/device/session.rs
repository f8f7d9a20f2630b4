use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bluetooth::{Connector, Transport};
use crate::error::{ControlError, TransportError};
use crate::protocol::commands::DATA_TYPE_COMMAND;
use crate::protocol::frame::{check_reply, hex};
use crate::protocol::Frame;

/// How long to wait for the acknowledgement before giving up.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive buffer for one reply.
pub const REPLY_BUFFER_SIZE: usize = 2048;

/// Control session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Open,
    Sending,
    AwaitingAck,
    Acked,
    Failed,
    Closed,
}

/// Exclusive connection to one device for a command/acknowledge exchange.
///
/// Owns the transport and the sequence counter. The transport is released
/// exactly once, by [`ControlSession::close`], or by drop as a fallback.
pub struct ControlSession<T: Transport> {
    address: String,
    transport: Option<T>,
    seq: u8,
    state: SessionState,
}

impl<T: Transport> ControlSession<T> {
    /// Connect to `address` through `connector`.
    pub async fn open<C>(connector: &C, address: &str) -> Result<Self, ControlError>
    where
        C: Connector<Transport = T>,
    {
        let mut session = Self {
            address: address.to_string(),
            transport: None,
            seq: 0,
            state: SessionState::Idle,
        };
        session.transition(SessionState::Opening);
        match connector.open(address).await {
            Ok(transport) => {
                session.transport = Some(transport);
                session.transition(SessionState::Open);
                info!("Session open with {}", address);
                Ok(session)
            }
            Err(e) => {
                session.transition(SessionState::Failed);
                session.transition(SessionState::Closed);
                Err(e.into())
            }
        }
    }

    /// Open a session, send one command and close again, on every path.
    pub async fn apply<C>(connector: &C, address: &str, payload: &[u8]) -> Result<(), ControlError>
    where
        C: Connector<Transport = T>,
    {
        let mut session = Self::open(connector, address).await?;
        let result = session.send_command(payload).await;
        session.close().await;
        result
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frame `payload` with the next sequence number, send it and wait for
    /// the device to acknowledge.
    pub async fn send_command(&mut self, payload: &[u8]) -> Result<(), ControlError> {
        if !matches!(self.state, SessionState::Open | SessionState::Acked) {
            return Err(TransportError::NotOpen.into());
        }
        let result = self.exchange(payload).await;
        match &result {
            Ok(()) => self.transition(SessionState::Acked),
            Err(e) => {
                warn!("Command to {} failed: {}", self.address, e);
                self.transition(SessionState::Failed);
            }
        }
        result
    }

    async fn exchange(&mut self, payload: &[u8]) -> Result<(), ControlError> {
        let transport = self.transport.as_mut().ok_or(TransportError::NotOpen)?;

        let frame = Frame::new(DATA_TYPE_COMMAND, self.seq, payload);
        let bytes = frame.to_bytes()?;
        self.seq = self.seq.wrapping_add(1);

        self.state = SessionState::Sending;
        debug!("TX: {} ({})", frame, hex::encode(&bytes));
        transport.send(&bytes).await?;

        self.state = SessionState::AwaitingAck;
        let reply = tokio::time::timeout(READ_TIMEOUT, transport.receive(REPLY_BUFFER_SIZE))
            .await
            .map_err(|_| TransportError::Timeout(READ_TIMEOUT))??;
        if reply.is_empty() {
            return Err(TransportError::Closed.into());
        }

        match Frame::from_bytes(&reply) {
            Ok(parsed) => debug!("RX: {}", parsed),
            Err(e) => debug!("RX: {} (unparsed: {})", hex::encode(&reply), e),
        }

        check_reply(&reply)?;
        Ok(())
    }

    /// Release the transport. Further calls are no-ops.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            debug!("Transport to {} released", self.address);
        }
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session {}: {:?} -> {:?}", self.address, self.state, next);
            self.state = next;
        }
    }
}

impl<T: Transport> Drop for ControlSession<T> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!("Session with {} dropped without close", self.address);
        }
    }
}
