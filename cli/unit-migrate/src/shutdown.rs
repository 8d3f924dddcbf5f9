// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shutdown signal handling
//!
//! The first SIGINT or SIGTERM cancels the returned token: the pipeline
//! stops dispatching and lets in-flight transfers finish. A second signal
//! exits immediately with status 130.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal forces the process down
pub const FORCED_EXIT_CODE: i32 = 130;

/// Deliveries of one signal; an `Err` means the source cannot be listened on.
type SignalStream = BoxStream<'static, std::io::Result<()>>;

#[cfg(unix)]
fn terminate_source() -> Option<SignalStream> {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(
            stream::unfold(sigterm, |mut sigterm| async move {
                sigterm.recv().await.map(|()| (Ok(()), sigterm))
            })
            .boxed(),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler");
            None
        }
    }
}

#[cfg(not(unix))]
fn terminate_source() -> Option<SignalStream> {
    None
}

fn signal_sources() -> Vec<(&'static str, SignalStream)> {
    let interrupt =
        stream::unfold((), |()| async { Some((tokio::signal::ctrl_c().await, ())) }).boxed();
    let mut sources = vec![("SIGINT", interrupt)];
    if let Some(terminate) = terminate_source() {
        sources.push(("SIGTERM", terminate));
    }
    sources
}

/// Wait for the next signal from any source.
///
/// A source that errors or ends is dropped rather than counted as a signal.
/// Returns `false` once no source is left.
async fn next_signal(sources: &mut Vec<(&'static str, SignalStream)>) -> bool {
    while !sources.is_empty() {
        let (delivered, index) = {
            let (delivered, index, _) =
                futures_util::future::select_all(sources.iter_mut().map(|(_, s)| s.next()))
                    .await;
            (delivered, index)
        };
        match delivered {
            Some(Ok(())) => return true,
            Some(Err(e)) => {
                tracing::warn!(
                    signal = sources[index].0,
                    error = %e,
                    "Failed to listen for signal, ignoring it from now on"
                );
                sources.remove(index);
            }
            None => {
                sources.remove(index);
            }
        }
    }
    false
}

/// Spawn the signal listener and return the token it cancels.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let count = Arc::new(AtomicU32::new(0));

    let handler_token = token.clone();
    tokio::spawn(async move {
        let mut sources = signal_sources();
        loop {
            if !next_signal(&mut sources).await {
                tracing::warn!("No shutdown signals can be received");
                return;
            }

            if count.fetch_add(1, Ordering::SeqCst) == 0 {
                tracing::info!(
                    "Shutdown requested, finishing in-flight transfers (signal again to force exit)"
                );
                handler_token.cancel();
            } else {
                tracing::warn!("Forced exit");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
    }

    fn failing() -> SignalStream {
        stream::iter(vec![Err(std::io::Error::other("no signal driver"))]).boxed()
    }

    #[tokio::test]
    async fn test_listener_error_is_not_a_signal() {
        let mut sources = vec![("SIGINT", failing())];
        assert!(!next_signal(&mut sources).await);
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_failed_source_is_dropped_others_kept() {
        let delivered: SignalStream = stream::iter(vec![Ok(()), Ok(())]).boxed();
        let mut sources = vec![("SIGINT", failing()), ("SIGTERM", delivered)];

        assert!(next_signal(&mut sources).await);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].0, "SIGTERM");

        assert!(next_signal(&mut sources).await);
        // The remaining source ends.
        assert!(!next_signal(&mut sources).await);
    }

    #[tokio::test]
    async fn test_pending_source_waits() {
        let mut sources: Vec<(&'static str, SignalStream)> =
            vec![("SIGINT", failing()), ("SIGTERM", stream::pending().boxed())];
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            next_signal(&mut sources),
        )
        .await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_run_token_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
