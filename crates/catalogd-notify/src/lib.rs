//! # catalogd-notify: service-manager readiness notification
//!
//! A thin seam over systemd's `sd_notify(3)` protocol so the binary can
//! report readiness and shutdown without linking libsystemd.

use std::env;

use async_trait::async_trait;
use tokio::net::UnixDatagram;
use tracing::warn;

/// A sink for service-manager lifecycle notifications.
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Signals that the agent has completed its initial sync and is ready.
    async fn ready(&self);
    /// Signals that the agent is shutting down.
    async fn stopping(&self);
}

/// Sends `READY=1` / `STOPPING=1` datagrams to `$NOTIFY_SOCKET`.
///
/// Silently a no-op if the variable is unset or the socket can't be
/// reached — a unit not run under a notify-aware service manager should
/// never fail to start because of this.
#[derive(Default)]
pub struct SystemdNotifySink;

impl SystemdNotifySink {
    pub fn new() -> Self {
        Self
    }

    async fn send(&self, message: &str) {
        let Ok(path) = env::var("NOTIFY_SOCKET") else {
            return;
        };

        let socket = match UnixDatagram::unbound() {
            Ok(socket) => socket,
            Err(err) => {
                warn!(error = %err, "failed to create notify socket");
                return;
            }
        };

        if let Err(err) = socket.send_to(message.as_bytes(), &path).await {
            warn!(error = %err, socket = %path, "failed to send service-manager notification");
        }
    }
}

#[async_trait]
impl NotifySink for SystemdNotifySink {
    async fn ready(&self) {
        self.send("READY=1").await;
    }

    async fn stopping(&self) {
        self.send("STOPPING=1").await;
    }
}

/// A sink that does nothing, for use in tests and non-systemd environments.
#[derive(Default)]
pub struct NullNotifySink;

#[async_trait]
impl NotifySink for NullNotifySink {
    async fn ready(&self) {}
    async fn stopping(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share process-global `NOTIFY_SOCKET` state, so they run as
    // one test to avoid racing against other tests mutating it concurrently.
    #[tokio::test]
    #[allow(unsafe_code)]
    async fn systemd_sink_notifies_over_the_socket_and_is_silent_without_one() {
        // SAFETY: this test is the sole reader/writer of NOTIFY_SOCKET and
        // runs single-threaded within the process; no concurrent access.
        unsafe { env::remove_var("NOTIFY_SOCKET") };
        let sink = SystemdNotifySink::new();
        sink.ready().await;
        sink.stopping().await;

        let dir = tempfile_socket_dir();
        let socket_path = dir.join("notify.sock");
        let listener = UnixDatagram::bind(&socket_path).unwrap();

        // SAFETY: see above.
        unsafe { env::set_var("NOTIFY_SOCKET", &socket_path) };
        sink.ready().await;

        let mut buf = [0u8; 16];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"READY=1");

        // SAFETY: see above.
        unsafe { env::remove_var("NOTIFY_SOCKET") };
    }

    fn tempfile_socket_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "catalogd-notify-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
