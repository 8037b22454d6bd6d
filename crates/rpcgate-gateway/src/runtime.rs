//! Service runtime: listener lifecycle driven by an external shutdown signal.
//!
//! `Created -> Listening -> Draining -> Stopped`
//!
//! - `start` binds before returning, so bind failures reach the caller.
//! - When `shutdown` resolves, the broadcaster and aggregator close every
//!   subscription, then the listener stops. With `drain_timeout_ms = 0` the
//!   server is aborted right away and in-flight calls may be cut off;
//!   otherwise it gets that long to finish before the abort.
//! - The listening socket is closed by the time `Stopped` is published, so
//!   the address can be bound again immediately.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use rpcgate_core::error::{GateError, Result};

use crate::app_state::AppState;
use crate::config::{GatewayConfig, ServerSection};
use crate::router;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Listening,
    Draining,
    Stopped,
}

/// Handle to a started runtime.
pub struct ServerHandle {
    local_addr: SocketAddr,
    phase: watch::Receiver<Phase>,
    state: AppState,
}

impl ServerHandle {
    /// Bound address (useful when listening on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Wait until the runtime reached `Stopped`.
    pub async fn stopped(&mut self) {
        loop {
            if *self.phase.borrow_and_update() == Phase::Stopped {
                return;
            }
            if self.phase.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Start with a JSON acl document (`{"consumer": ["/svc/method", ...]}`) and
/// default server settings.
pub async fn start_with_acl_json<F>(listen: &str, acl_json: &str, shutdown: F) -> Result<ServerHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    let acl: HashMap<String, Vec<String>> = serde_json::from_str(acl_json)
        .map_err(|e| GateError::BadRequest(format!("invalid acl json: {e}")))?;
    let cfg = GatewayConfig {
        version: 1,
        server: ServerSection {
            listen: listen.to_string(),
            ..ServerSection::default()
        },
        acl,
    };
    start(cfg, shutdown).await
}

/// Validate, wire and bind. Returns once the listener accepts connections.
pub async fn start<F>(cfg: GatewayConfig, shutdown: F) -> Result<ServerHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    cfg.validate()?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| GateError::BadRequest(format!("server.listen is not a SocketAddr: {e}")))?;
    let drain_timeout = Duration::from_millis(cfg.server.drain_timeout_ms);

    let (phase_tx, phase_rx) = watch::channel(Phase::Created);

    // Dropping the state on a bind failure ends its dispatch worker.
    let state = AppState::new(cfg)?;
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| GateError::Internal(format!("bind {listen} failed: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| GateError::Internal(format!("listener address unavailable: {e}")))?;

    let app = router::build_router(state.clone());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    phase_tx.send_replace(Phase::Listening);
    tracing::info!(%local_addr, "rpcgate listening");

    tokio::spawn(supervise(
        state.clone(),
        server,
        stop_tx,
        shutdown,
        drain_timeout,
        phase_tx,
    ));

    Ok(ServerHandle {
        local_addr,
        phase: phase_rx,
        state,
    })
}

async fn supervise<F>(
    state: AppState,
    mut server: JoinHandle<io::Result<()>>,
    stop_tx: oneshot::Sender<()>,
    shutdown: F,
    drain_timeout: Duration,
    phase_tx: watch::Sender<Phase>,
) where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::select! {
        _ = shutdown => {
            tracing::info!("shutdown signal received, draining");
        }
        res = &mut server => {
            match res {
                Ok(Ok(())) => tracing::warn!("server exited without a shutdown signal"),
                Ok(Err(e)) => tracing::error!(error = %e, "server failed"),
                Err(e) => tracing::error!(error = %e, "server task failed"),
            }
            phase_tx.send_replace(Phase::Draining);
            state.drain().await;
            phase_tx.send_replace(Phase::Stopped);
            return;
        }
    }

    phase_tx.send_replace(Phase::Draining);
    state.drain().await;
    let _ = stop_tx.send(());

    let finished = if drain_timeout.is_zero() {
        false
    } else {
        match tokio::time::timeout(drain_timeout, &mut server).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "drain timed out, aborting in-flight calls"
                );
                false
            }
        }
    };
    if !finished {
        server.abort();
        let _ = server.await;
    }

    phase_tx.send_replace(Phase::Stopped);
    tracing::info!("rpcgate stopped");
}
