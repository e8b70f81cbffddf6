//! Cancellation helpers
//!
//! Every store entry point takes a [`CancellationToken`]. Deadlines are
//! expressed as tokens that a timer cancels, so callers only ever deal with
//! one kind of signal.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Token that cancels itself after `timeout`
///
/// A zero timeout returns an already-cancelled token.
pub fn with_timeout(timeout: Duration) -> CancellationToken {
    deadline(CancellationToken::new(), timeout)
}

/// Child of `parent` that additionally cancels after `timeout`
pub fn child_with_timeout(parent: &CancellationToken, timeout: Duration) -> CancellationToken {
    deadline(parent.child_token(), timeout)
}

fn deadline(token: CancellationToken, timeout: Duration) -> CancellationToken {
    if timeout.is_zero() {
        token.cancel();
        return token;
    }

    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => timer.cancel(),
            _ = timer.cancelled() => {}
        }
    });
    token
}

/// Deadline scoped to one unit of work
///
/// The token cancels after the timeout or when the `Deadline` is dropped,
/// whichever comes first, so the timer never outlives the work.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            token: with_timeout(timeout),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Drive `fut` unless `token` fires first
///
/// Returns `None` when cancelled, including when the token was already
/// cancelled before the call.
pub async fn race<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    if token.is_cancelled() {
        return None;
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}
