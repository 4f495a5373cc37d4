use crate::config::ReduceConfig;
use crate::error::{Result, TreefoldError};
use crate::transport::Transport;
use crate::types::Rank;
use std::future::Future;
use std::time::Duration;

/// Run one transport step, wrapping failures as `CollectiveFailed`.
///
/// Without a configured timeout the step waits for the peer indefinitely.
async fn guarded<T>(
    step: impl Future<Output = Result<T>>,
    timeout: Option<Duration>,
    operation: &'static str,
    peer: Rank,
    verb: &str,
) -> Result<T> {
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, step).await {
            Ok(res) => res,
            Err(_) => {
                return Err(TreefoldError::CollectiveFailed {
                    operation,
                    rank: peer,
                    reason: format!("{verb} timed out after {}ms", limit.as_millis()),
                });
            }
        },
        None => step.await,
    };
    outcome.map_err(|e| TreefoldError::CollectiveFailed {
        operation,
        rank: peer,
        reason: e.to_string(),
    })
}

/// Send bytes to a peer inside a collective.
pub(crate) async fn collective_send<T: Transport + ?Sized>(
    transport: &T,
    dest: Rank,
    data: &[u8],
    operation: &'static str,
    config: &ReduceConfig,
) -> Result<()> {
    guarded(
        transport.send(dest, data),
        config.collective_timeout,
        operation,
        dest,
        "send",
    )
    .await
}

/// Receive bytes from a peer inside a collective.
pub(crate) async fn collective_recv<T: Transport + ?Sized>(
    transport: &T,
    src: Rank,
    operation: &'static str,
    config: &ReduceConfig,
) -> Result<Vec<u8>> {
    guarded(
        transport.recv(src),
        config.collective_timeout,
        operation,
        src,
        "recv",
    )
    .await
}
