// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! The poll loop never blocks on a signal. It checks a [`ShutdownToken`]
//! between iterations and races its sleep against
//! [`ShutdownToken::cancelled`], while a separate task waits for SIGINT or
//! SIGTERM and flips the coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Owns the shutdown flag and notifies every token when it flips.
///
/// # Example
///
/// ```ignore
/// use sluice_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new();
/// let token = coordinator.token();
///
/// tokio::spawn({
///     let coordinator = coordinator.clone();
///     async move { coordinator.wait_for_signal().await }
/// });
///
/// while !token.is_shutdown_requested() {
///     // poll
/// }
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Returns a token observing this coordinator.
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            sender: self.sender.clone(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }

    /// Initiates shutdown. Only the first call notifies.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for SIGINT or SIGTERM, then initiates shutdown.
    ///
    /// Returns early if shutdown was initiated some other way.
    pub async fn wait_for_signal(&self) {
        let token = self.token();

        tokio::select! {
            _ = os_signal() => self.initiate_shutdown(),
            _ = token.cancelled() => {}
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => {
                warn!("Failed to register SIGINT handler: {}", e);
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
        },
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            warn!("Failed to register Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// ShutdownToken
// =============================================================================

/// Cheap handle for checking or awaiting shutdown.
#[derive(Clone)]
pub struct ShutdownToken {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Creates a new shutdown token from a coordinator.
    pub fn from_coordinator(coordinator: &ShutdownCoordinator) -> Self {
        coordinator.token()
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        // Subscribe before checking the flag so a concurrent shutdown is not missed.
        let mut receiver = self.sender.subscribe();
        if self.is_shutdown_requested() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_initiated());

        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_token() {
        let coordinator = ShutdownCoordinator::new();
        let token = ShutdownToken::from_coordinator(&coordinator);

        assert!(!token.is_shutdown_requested());
        coordinator.initiate_shutdown();
        assert!(token.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_token_cancelled() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should resolve");

        // Already cancelled tokens resolve immediately.
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("token should resolve");
    }

    #[tokio::test]
    async fn test_wait_for_signal_returns_on_manual_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let waiter = coordinator.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_signal().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let coordinator = ShutdownCoordinator::new();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
    }
}
