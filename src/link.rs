// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP link to the field controller
//!
//! [`FieldLink`] owns the single connection to the field-control endpoint.
//! Connecting blocks with a fixed backoff until the endpoint becomes
//! reachable; the bench assumes the PLC will eventually come up, so there is
//! no retry cutoff. Individual reads and writes are single-shot: a failure
//! is surfaced as a [`LinkError`] and never retried or reconnected here;
//! the orchestrator decides what a failed cycle means for the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::lookup_host;
use tokio::time::sleep;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

/// Transport-layer failure carried inside [`LinkError::Transport`].
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of single-shot link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The connection dropped or the transport failed mid-call.
    #[error("field link transport failure: {0}")]
    Transport(TransportError),

    /// The endpoint answered with a Modbus exception.
    #[error("field endpoint rejected the request: {0}")]
    Exception(ExceptionCode),

    /// An operation was attempted without an established connection.
    #[error("field link is not connected")]
    NotConnected,

    /// The endpoint returned fewer values than the cycle needs.
    #[error("field endpoint returned {got} values where {expected} were required")]
    ShortResponse { expected: usize, got: usize },
}

/// Result of a [`FieldLink::connect`] call. Connecting never fails; it
/// either establishes the link or observes a shutdown request between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Cancelled,
}

/// The one live connection to the field-control endpoint.
pub struct FieldLink {
    endpoint: String,
    backoff: Duration,
    context: Option<Context>,
}

impl FieldLink {
    pub fn new(endpoint: String, backoff: Duration) -> Self {
        Self {
            endpoint,
            backoff,
            context: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    /// Establish the connection, retrying with a fixed backoff until the
    /// endpoint accepts or `cancel` is raised. Resolution failures and
    /// refused connections are treated the same way: wait and try again.
    pub async fn connect(&mut self, cancel: &AtomicBool) -> ConnectOutcome {
        let mut attempts: u64 = 0;
        loop {
            if cancel.load(Ordering::SeqCst) {
                debug!("connect to {} abandoned on shutdown request", self.endpoint);
                return ConnectOutcome::Cancelled;
            }
            attempts += 1;
            match self.try_connect().await {
                Ok(context) => {
                    info!(
                        "connected to field controller at {} (attempt {attempts})",
                        self.endpoint
                    );
                    self.context = Some(context);
                    return ConnectOutcome::Connected;
                }
                Err(e) => {
                    debug!(
                        "field controller at {} not reachable (attempt {attempts}): {e}",
                        self.endpoint
                    );
                    sleep(self.backoff).await;
                }
            }
        }
    }

    async fn try_connect(&mut self) -> Result<Context, TransportError> {
        let mut addrs = lookup_host(self.endpoint.as_str()).await?;
        let addr = addrs
            .next()
            .ok_or_else(|| format!("{} resolves to no address", self.endpoint))?;
        Ok(tcp::connect(addr).await?)
    }

    /// Read a block of coils. Single-shot; not retried on failure.
    pub async fn read_coils(&mut self, base: u16, count: u16) -> Result<Vec<bool>, LinkError> {
        let context = self.context.as_mut().ok_or(LinkError::NotConnected)?;
        match context.read_coils(base, count).await {
            Ok(Ok(bits)) => Ok(bits),
            Ok(Err(code)) => Err(LinkError::Exception(code)),
            Err(e) => Err(LinkError::Transport(Box::new(e))),
        }
    }

    /// Read a block of holding registers. Single-shot; not retried on
    /// failure.
    pub async fn read_holding_registers(
        &mut self,
        base: u16,
        count: u16,
    ) -> Result<Vec<u16>, LinkError> {
        let context = self.context.as_mut().ok_or(LinkError::NotConnected)?;
        match context.read_holding_registers(base, count).await {
            Ok(Ok(words)) => Ok(words),
            Ok(Err(code)) => Err(LinkError::Exception(code)),
            Err(e) => Err(LinkError::Transport(Box::new(e))),
        }
    }

    /// Write a block of registers starting at `base`. Single-shot; not
    /// retried on failure.
    pub async fn write_registers(&mut self, base: u16, words: &[u16]) -> Result<(), LinkError> {
        let context = self.context.as_mut().ok_or(LinkError::NotConnected)?;
        match context.write_multiple_registers(base, words).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(code)) => Err(LinkError::Exception(code)),
            Err(e) => Err(LinkError::Transport(Box::new(e))),
        }
    }

    /// Release the connection. Safe to call when already disconnected;
    /// errors during teardown are logged, never raised.
    pub async fn close(&mut self) {
        if let Some(mut context) = self.context.take() {
            match context.disconnect().await {
                Ok(()) => debug!("field link to {} closed", self.endpoint),
                Err(e) => warn!("error while closing the field link: {e}"),
            }
        }
    }
}
