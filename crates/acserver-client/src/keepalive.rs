//! Keep-alive supervision.
//!
//! The server only talks when something happens, so silence alone is not
//! proof of a dead server. After a quiet interval the supervisor probes with a
//! session-info request and waits a short grace period before deciding.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// How long a probed server has to answer.
pub const PROBE_GRACE: Duration = Duration::from_secs(2);

/// Last time any datagram arrived.
///
/// A frozen marker holds no timestamp; the supervisor stays quiet until the
/// next datagram revives it, so a dead server raises one timeout, not one per
/// interval.
#[derive(Debug, Clone, Default)]
pub struct ActivityMarker {
    last: Arc<Mutex<Option<Instant>>>,
}

impl ActivityMarker {
    #[must_use]
    pub fn new() -> Self {
        let marker = Self::default();
        marker.touch();
        marker
    }

    pub fn touch(&self) {
        *self.last.lock() = Some(Instant::now());
    }

    pub fn freeze(&self) {
        *self.last.lock() = None;
    }

    #[must_use]
    pub fn last_activity(&self) -> Option<Instant> {
        *self.last.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveStatus {
    /// No answer to the probe.
    Timeout,
    /// The probe was answered.
    Alive,
}

/// Run the supervision loop until the task is aborted.
///
/// `probe` asks the server for a sign of life; `notify` receives exactly one
/// status per detection cycle.
pub async fn supervise<P, N>(marker: ActivityMarker, interval: Duration, probe: P, notify: N)
where
    P: Fn(),
    N: Fn(KeepAliveStatus),
{
    loop {
        tokio::time::sleep(interval).await;

        let Some(last) = marker.last_activity() else {
            continue;
        };
        if last.elapsed() <= interval {
            continue;
        }

        let probed_at = Instant::now();
        probe();
        tokio::time::sleep(PROBE_GRACE).await;

        match marker.last_activity() {
            Some(last) if last >= probed_at => notify(KeepAliveStatus::Alive),
            Some(_) => {
                marker.freeze();
                notify(KeepAliveStatus::Timeout);
            }
            // Frozen elsewhere while we waited; nothing to report.
            None => {}
        }
    }
}
