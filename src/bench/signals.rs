//! Process signal relay
//!
//! Turns SIGINT and SIGTERM into messages on the interrupt channel consumed
//! by [`forward_interrupts`](super::cancel::forward_interrupts).

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Something that yields interrupt notifications
pub trait InterruptSource {
    /// Wait for the next interrupt and name it; `None` once no more can arrive
    fn recv(&mut self) -> impl Future<Output = Option<&'static str>> + Send;
}

/// CTRL+C and, on unix, SIGTERM. The listeners are registered once, on
/// construction, and reused for every wait.
pub struct OsSignals {
    ctrl_c: bool,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl OsSignals {
    /// Must be called inside a tokio runtime
    pub fn new() -> Self {
        #[cfg(unix)]
        let terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                None
            }
        };
        Self {
            ctrl_c: true,
            #[cfg(unix)]
            terminate,
        }
    }
}

impl Default for OsSignals {
    fn default() -> Self {
        Self::new()
    }
}

enum Wake {
    CtrlC(std::io::Result<()>),
    Terminate(Option<()>),
}

impl InterruptSource for OsSignals {
    async fn recv(&mut self) -> Option<&'static str> {
        loop {
            let listen_ctrl_c = self.ctrl_c;
            let ctrl_c = async move {
                if listen_ctrl_c {
                    tokio::signal::ctrl_c().await
                } else {
                    std::future::pending::<std::io::Result<()>>().await
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match self.terminate.as_mut() {
                    Some(stream) => stream.recv().await,
                    None => std::future::pending::<Option<()>>().await,
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<Option<()>>();

            let wake = tokio::select! {
                result = ctrl_c => Wake::CtrlC(result),
                received = terminate => Wake::Terminate(received),
            };

            match wake {
                Wake::CtrlC(Ok(())) => return Some("SIGINT"),
                Wake::CtrlC(Err(err)) => {
                    warn!(error = %err, "failed to listen for CTRL+C");
                    self.ctrl_c = false;
                }
                Wake::Terminate(received) => return received.map(|()| "SIGTERM"),
            }
        }
    }
}

/// Send one message on `interrupts` per signal from `source`.
///
/// Stops when the source is exhausted or the receiving side is dropped.
/// Returns how many signals were relayed.
pub async fn relay_interrupts<S: InterruptSource>(mut source: S, interrupts: mpsc::Sender<()>) -> usize {
    let mut relayed = 0;
    while let Some(name) = source.recv().await {
        info!(signal = name, "Received signal");
        if interrupts.send(()).await.is_err() {
            debug!("interrupt receiver closed");
            break;
        }
        relayed += 1;
    }
    relayed
}
