//! Inter-process telemetry bus publisher.
//!
//! One PUB socket on the loopback interface carries every classified
//! telemetry frame to downstream subscribers (ground-station relays, the
//! telemetry websocket worker). Publishing is fire-and-forget: frames are
//! queued to a pump task that owns the socket, so stream readers never block
//! on the bus and frames are never interleaved.

use miette::{IntoDiagnostic, WrapErr};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

#[derive(Clone)]
pub struct TelemetryPublisher {
    tx: mpsc::UnboundedSender<String>,
}

/// Owns the socket-draining task; kept by the supervisor for shutdown.
pub struct TelemetryPump {
    task: JoinHandle<()>,
}

impl TelemetryPublisher {
    /// Bind `tcp://127.0.0.1:<port>` and start the pump. A failed bind is
    /// fatal to supervisor construction.
    pub async fn bind(port: u16) -> crate::Result<(Self, TelemetryPump)> {
        let mut socket = PubSocket::new();
        let endpoint = format!("tcp://127.0.0.1:{port}");
        socket
            .bind(&endpoint)
            .await
            .into_diagnostic()
            .wrap_err(format!("failed to bind telemetry bus at {endpoint}"))?;
        info!("telemetry bus bound at {endpoint}");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(err) = socket.send(ZmqMessage::from(frame)).await {
                    debug!("telemetry publish failed: {err}");
                }
            }
            socket.close().await;
        });

        Ok((Self { tx }, TelemetryPump { task }))
    }

    /// Queue a frame. Never blocks; a closed bus drops the frame silently.
    pub fn publish(&self, frame: String) {
        if self.tx.send(frame).is_err() {
            trace!("telemetry bus closed, frame dropped");
        }
    }
}

impl TelemetryPump {
    pub async fn close(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_and_publish() {
        // port 0 asks the OS for an ephemeral port, so the test never collides
        let (publisher, pump) = TelemetryPublisher::bind(0).await.unwrap();
        publisher.publish("TELEMETRY INFO [drive]: ready".to_string());
        publisher.publish(r#"TELEMETRY JSON {"type":"drive","data":{}}"#.to_string());
        pump.close().await;
        // publishing after close must not panic
        publisher.publish("TELEMETRY INFO [drive]: late".to_string());
    }
}
