//! WebSocket connection task for the build-log stream

use std::sync::Arc;

use futures::StreamExt;
use http::{header, HeaderValue};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::log_channel::{ChannelState, Shared};
use crate::errors::DashError;

/// Run one connection until the peer closes, the transport fails, or
/// shutdown is signalled. There is no reconnect.
pub(crate) async fn run(
    shared: Arc<Shared>,
    generation: u64,
    endpoint: Url,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let request = match build_request(&endpoint) {
        Ok(request) => request,
        Err(e) => {
            shared.stream_error(generation, e);
            return;
        }
    };

    let connection = tokio::select! {
        biased;
        _ = &mut shutdown_rx => {
            debug!("Build-log stream closed while connecting");
            return;
        }
        result = connect_async(request) => result,
    };

    let mut ws_stream = match connection {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            shared.stream_error(
                generation,
                DashError::StreamError(format!("failed to connect to {endpoint}: {e}")),
            );
            return;
        }
    };

    info!("Connected to build-log stream");
    shared.transition(generation, ChannelState::Open);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                if let Err(e) = ws_stream.close(None).await {
                    debug!("Close handshake failed: {}", e);
                }
                return;
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        shared.on_text(generation, text.as_str());
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        shared.on_binary(generation, &bytes);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!("Build-log stream closed by peer: {:?}", frame);
                        shared.transition(generation, ChannelState::Closed);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        shared.stream_error(generation, DashError::StreamError(e.to_string()));
                        return;
                    }
                    None => {
                        warn!("Build-log stream ended");
                        shared.transition(generation, ChannelState::Closed);
                        return;
                    }
                }
            }
        }
    }
}

fn build_request(
    endpoint: &Url,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, DashError> {
    let mut request = endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| DashError::StreamError(format!("invalid endpoint {endpoint}: {e}")))?;
    request
        .headers_mut()
        .insert(header::USER_AGENT, HeaderValue::from_static("deploydash"));
    Ok(request)
}

/// Derive the build-log stream URL from the backend base URL
pub fn logs_url(backend_url: &str, logs_path: &str) -> Result<Url, DashError> {
    let mut url = Url::parse(backend_url).map_err(|e| DashError::ConfigError(e.to_string()))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(DashError::ConfigError("Invalid backend URL scheme".to_string())),
    };

    url.set_scheme(scheme)
        .map_err(|_| DashError::ConfigError("Failed to set scheme".to_string()))?;

    url.set_path(&format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        logs_path.trim_start_matches('/')
    ));

    Ok(url)
}
