//! In-process fakes for the deploy backend and its build-log stream

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

use deploydash::channel::{ChannelState, LogChannel};

pub const WAIT: Duration = Duration::from_secs(5);

enum Control {
    Send(Message),
    Drop,
}

/// A build-log stream server. Connections are served one after another and
/// all draw from the same outbound queue.
pub struct FakeLogStream {
    pub url: String,
    control: mpsc::UnboundedSender<Control>,
    connections: Arc<AtomicUsize>,
}

impl FakeLogStream {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/build-logs", listener.local_addr().unwrap());
        let (control, mut control_rx) = mpsc::unbounded_channel::<Control>();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                loop {
                    tokio::select! {
                        control = control_rx.recv() => match control {
                            Some(Control::Send(msg)) => {
                                if ws.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Some(Control::Drop) => break,
                            None => return,
                        },
                        incoming = ws.next() => match incoming {
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                    }
                }
            }
        });

        Self {
            url,
            control,
            connections,
        }
    }

    /// Send `{"message": text}`
    pub fn send_message(&self, text: &str) {
        self.send_raw(&serde_json::json!({ "message": text }).to_string());
    }

    pub fn send_raw(&self, raw: &str) {
        let _ = self.control.send(Control::Send(Message::Text(raw.to_string().into())));
    }

    pub fn send_binary(&self, raw: &[u8]) {
        let _ = self.control.send(Control::Send(Message::Binary(raw.to_vec().into())));
    }

    /// Close the current connection with a close frame
    pub fn close(&self) {
        let _ = self.control.send(Control::Send(Message::Close(None)));
    }

    /// Drop the current connection without a close handshake
    pub fn drop_connection(&self) {
        let _ = self.control.send(Control::Drop);
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Serve `router` on an ephemeral port and return its base URL
pub async fn spawn_backend(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base_url
}

/// A base URL nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub async fn wait_for_state(channel: &LogChannel, state: ChannelState) {
    let mut rx = channel.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_| panic!("channel never reached {state:?}, still {:?}", channel.state()))
        .unwrap();
}

pub async fn wait_for_lines(channel: &LogChannel, count: usize) {
    wait_until(|| channel.len() >= count).await;
    assert_eq!(channel.len(), count, "more lines than expected");
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Make sure nothing further arrives for a short while
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

pub fn lines_of(channel: &LogChannel) -> Vec<String> {
    channel.lines().into_iter().map(|line| line.into_string()).collect()
}

pub async fn with_timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future).await.expect("timed out")
}
