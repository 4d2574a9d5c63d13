//! Typed websocket plumbing for the signalling channel.
//!
//! The gateway is text-framed JSON; every frame maps to a [`model::Event`].
//! Binary frames are not part of this protocol and are dropped with a
//! warning.
//!
//! [`model::Event`]: ../model/enum.Event.html

use async_trait::async_trait;
use async_tungstenite::tokio::{connect_async, ConnectStream};
use async_tungstenite::tungstenite::client::IntoClientRequest;
use async_tungstenite::tungstenite::error::Error as TungsteniteError;
use async_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use async_tungstenite::tungstenite::protocol::CloseFrame;
use async_tungstenite::tungstenite::Message;
use async_tungstenite::WebSocketStream;
use futures::{SinkExt, StreamExt};
use serde_json::Error as JsonError;
use tokio::time::{timeout, Duration};
use tracing::{instrument, warn};
use url::Url;

use crate::model::Event;

pub(crate) type WsStream = WebSocketStream<ConnectStream>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// A frame failed to (de)serialise.
    Json(JsonError),
    /// The underlying websocket failed.
    Ws(TungsteniteError),
    /// The server closed the channel, with the frame it sent doing so.
    Closed(Option<CloseFrame<'static>>),
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Error {
        Error::Json(e)
    }
}

impl From<TungsteniteError> for Error {
    fn from(e: TungsteniteError) -> Error {
        Error::Ws(e)
    }
}

#[async_trait]
pub(crate) trait ReceiverExt {
    /// Awaits the next frame, giving up (with `Ok(None)`) after a short
    /// timeout so handshake loops stay responsive.
    async fn recv_json(&mut self) -> Result<Option<Event>>;
    /// Awaits the next frame for as long as it takes.
    async fn recv_json_no_timeout(&mut self) -> Result<Option<Event>>;
}

#[async_trait]
pub(crate) trait SenderExt {
    async fn send_json(&mut self, value: &Event) -> Result<()>;
}

#[async_trait]
impl ReceiverExt for WsStream {
    async fn recv_json(&mut self) -> Result<Option<Event>> {
        const TIMEOUT: Duration = Duration::from_millis(500);

        let message = match timeout(TIMEOUT, self.next()).await {
            Ok(Some(Ok(v))) => Some(v),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) | Err(_) => None,
        };

        convert_ws_message(message)
    }

    async fn recv_json_no_timeout(&mut self) -> Result<Option<Event>> {
        let message = match self.next().await {
            Some(Ok(v)) => Some(v),
            Some(Err(e)) => return Err(e.into()),
            None => None,
        };

        convert_ws_message(message)
    }
}

#[async_trait]
impl SenderExt for WsStream {
    async fn send_json(&mut self, value: &Event) -> Result<()> {
        let body = serde_json::to_string(value)?;
        self.send(Message::Text(body)).await?;

        Ok(())
    }
}

pub(crate) fn convert_ws_message(message: Option<Message>) -> Result<Option<Event>> {
    Ok(match message {
        Some(Message::Text(payload)) =>
            serde_json::from_str(&payload).map(Some).map_err(|why| {
                warn!("Err deserializing text: {:?}; text: {}", why, payload);

                why
            })?,
        Some(Message::Binary(bytes)) => {
            warn!("Unexpected binary frame of {} bytes on text gateway.", bytes.len());

            None
        },
        Some(Message::Close(frame)) => {
            return Err(Error::Closed(frame));
        },
        // Ping/Pong message behaviour is internally handled by tungstenite.
        _ => None,
    })
}

#[instrument]
pub(crate) async fn create_client(url: Url) -> Result<WsStream> {
    let mut request = url.as_str().into_client_request()?;
    request
        .headers_mut()
        .insert(USER_AGENT, HeaderValue::from_static(crate::constants::USER_AGENT));

    let (stream, _response) = connect_async(request).await?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
    use std::borrow::Cow;

    #[test]
    fn text_frames_become_events() {
        let msg = Message::Text(r#"{"op": 8, "d": {"heartbeat_interval": 41250}}"#.into());

        assert!(matches!(
            convert_ws_message(Some(msg)),
            Ok(Some(Event::Hello(h))) if (h.heartbeat_interval - 41250.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn close_frames_surface_their_code() {
        let msg = Message::Close(Some(CloseFrame {
            code: WsCloseCode::from(4015),
            reason: Cow::Borrowed("server crashed"),
        }));

        match convert_ws_message(Some(msg)) {
            Err(Error::Closed(Some(frame))) => assert_eq!(u16::from(frame.code), 4015),
            other => panic!("expected close error, got {:?}", other),
        }
    }

    #[test]
    fn binary_frames_are_dropped() {
        let msg = Message::Binary(vec![1, 2, 3]);

        assert!(matches!(convert_ws_message(Some(msg)), Ok(None)));
    }
}
