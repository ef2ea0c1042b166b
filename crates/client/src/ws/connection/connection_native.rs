//! Native WebSocket links using tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::link::{Connector, Link, WireFrame};
use crate::error::TransportError;

/// Connects to `{server_url}/ws/{game_id}`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    server_url: String,
}

impl TungsteniteConnector {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    pub fn url_for(&self, game_id: &str) -> String {
        socket_url(&self.server_url, game_id)
    }
}

/// Socket URL for a game on the given server.
pub fn socket_url(server_url: &str, game_id: &str) -> String {
    format!(
        "{}/ws/{}",
        server_url.trim_end_matches('/'),
        urlencoding::encode(game_id)
    )
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, game_id: &str) -> Result<Link, TransportError> {
        let url = self.url_for(game_id);
        let (ws_stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        crate::log_debug!("WebSocket handshake completed for {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<WireFrame>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<WireFrame>();

        // Read task
        let url_for_read = url.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                let frame = match msg_result {
                    Ok(Message::Text(text)) => WireFrame::Text(text.as_str().to_owned()),
                    Ok(Message::Ping(_)) => WireFrame::Ping,
                    Ok(Message::Pong(_)) => WireFrame::Pong,
                    Ok(Message::Close(_)) => {
                        crate::log_info!("WebSocket to {} received close frame", url_for_read);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        crate::log_error!("WebSocket read error on {}: {}", url_for_read, e);
                        break;
                    }
                };
                if incoming_tx.send(frame).is_err() {
                    break;
                }
            }
        });

        // Write task; ends when the link (and its sender) is dropped
        tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                let message = match frame {
                    WireFrame::Text(text) => Message::Text(text.into()),
                    WireFrame::Ping => Message::Ping(Default::default()),
                    WireFrame::Pong => Message::Pong(Default::default()),
                    WireFrame::Close => break,
                };
                if let Err(e) = write.send(message).await {
                    crate::log_error!("WebSocket send failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        Ok(Link::new(outgoing_tx, incoming_rx).with_reader(reader.abort_handle()))
    }
}
