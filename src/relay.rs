//! WebSocket channel to the rendezvous relay.
//!
//! The relay fans every envelope out to the other connected participants; it
//! does not interpret them. Outbound envelopes go through a [RelaySender]
//! (backed by a writer task), inbound ones are exposed as a [RelayStream] in
//! the order the relay delivered them.

use crate::envelope::Envelope;
use crate::error::Error;
use futures_util::stream::{BoxStream, SplitSink};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound envelopes. A decoding failure is yielded as `Err(Error::Envelope)`
/// and does not end the stream; transport failures do.
pub type RelayStream = BoxStream<'static, Result<Envelope, Error>>;

/// Sending half of the relay channel.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: UnboundedSender<Envelope>,
}

impl RelaySender {
    /// Creates a sender together with the queue it feeds.
    pub fn channel() -> (Self, UnboundedReceiver<Envelope>) {
        let (tx, rx) = unbounded_channel();
        (RelaySender { tx }, rx)
    }

    pub fn send(&self, envelope: Envelope) -> Result<(), Error> {
        self.tx.send(envelope).map_err(|_| Error::RelayClosed)
    }
}

/// Opens the relay connection. Failing to open is fatal for the client.
pub async fn connect(url: &str) -> Result<(RelaySender, RelayStream), Error> {
    info!("connecting to relay {}", url);
    let (ws, _) = connect_async(url).await?;
    info!("relay connection open");

    let (write, read) = ws.split();
    let (sender, outbound) = RelaySender::channel();
    tokio::spawn(write_loop(write, outbound));

    let inbound = read
        .filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("relay -> {}", text);
                    Some(Envelope::decode(&text))
                }
                Ok(Message::Binary(data)) => {
                    Some(serde_json::from_slice::<Envelope>(&data).map_err(Error::from))
                }
                Ok(Message::Close(frame)) => {
                    info!("relay closed the connection: {:?}", frame);
                    Some(Err(Error::RelayClosed))
                }
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            }
        })
        .boxed();

    Ok((sender, inbound))
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut outbound: UnboundedReceiver<Envelope>,
) {
    while let Some(envelope) = outbound.recv().await {
        let json = match envelope.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to encode {} envelope: {}", envelope.payload.kind(), e);
                continue;
            }
        };
        trace!("relay <- {}", json);
        if let Err(e) = write.send(Message::Text(json)).await {
            error!("failed to write to relay: {}", e);
            break;
        }
    }
    debug!("relay writer stopped");
    let _ = write.close().await;
}

#[cfg(test)]
mod test {
    use crate::envelope::{Destination, Envelope, Payload};
    use crate::error::Error;
    use crate::identity::ParticipantId;
    use crate::relay::{connect, RelaySender};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn exchange_envelopes_with_relay() -> Result<(), Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            // the first thing a client sends is its announce
            let first = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text("garbage".into())).await.unwrap();
            ws.send(Message::Text(
                r#"{"uuid":"b","dest":"a","displayName":"Calm Yak"}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
            first.into_text().unwrap()
        });

        let (sender, mut inbound) = connect(&format!("ws://{addr}")).await?;
        sender.send(Envelope::announce("a".into(), Destination::All, "Swift Otter"))?;

        let malformed = timeout(Duration::from_secs(5), inbound.next()).await.unwrap();
        assert!(matches!(malformed, Some(Err(Error::Envelope(_)))));

        let reply = timeout(Duration::from_secs(5), inbound.next())
            .await
            .unwrap()
            .unwrap()?;
        assert_eq!(reply.sender, ParticipantId::from("b"));
        assert_eq!(reply.destination, Destination::Participant("a".into()));
        assert!(matches!(reply.payload, Payload::Announce { .. }));

        let sent = server.await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&sent).unwrap();
        assert_eq!(value["dest"], "all");
        assert_eq!(value["displayName"], "Swift Otter");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_relay_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let result = connect(&format!("ws://{addr}")).await;
        assert!(matches!(result, Err(Error::Relay(_))));
    }

    #[test]
    fn send_after_receiver_dropped_fails() {
        let (sender, rx) = RelaySender::channel();
        drop(rx);
        let result = sender.send(Envelope::announce("a".into(), Destination::All, "x"));
        assert!(matches!(result, Err(Error::RelayClosed)));
    }
}
