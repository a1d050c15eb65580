use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _, future};
use secrecy::ExposeSecret as _;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::error::{
    Error as TungsteniteError, ProtocolError, SubProtocolError,
};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};

use super::error::WsError;
use super::traits::{ConnectRequest, FrameSink, FrameStream, Transport};
use crate::Result;
use crate::error::Error;

/// [`Transport`] over `tokio-tungstenite`, with TLS for `wss://` endpoints.
///
/// The requested sub-protocol is optional for the server: when the handshake completes
/// without echoing it, the attempt is repeated without requesting one.
///
/// Only text frames reach the client. A close frame ends the session with
/// [`WsError::ConnectionClosed`]; ping, pong and binary frames are skipped.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

/// Handshake request for `request`, with or without the sub-protocol header.
fn handshake_request(request: &ConnectRequest, with_protocol: bool) -> Result<Request> {
    let mut http_request = request.url.as_str().into_client_request()?;
    let headers = http_request.headers_mut();
    if with_protocol {
        headers.insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(request.protocol),
        );
    }
    if let Some(authorization) = &request.authorization {
        let mut value = HeaderValue::from_str(authorization.expose_secret())?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(http_request)
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, request: &ConnectRequest) -> Result<(FrameSink, FrameStream)> {
        let ws_stream = match connect_async(handshake_request(request, true)?).await {
            Ok((ws_stream, _response)) => ws_stream,
            Err(TungsteniteError::Protocol(ProtocolError::SecWebSocketSubProtocolError(
                SubProtocolError::NoSubProtocol,
            ))) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    protocol = request.protocol,
                    "server did not echo the sub-protocol; reconnecting without it"
                );
                connect_async(handshake_request(request, false)?).await?.0
            }
            Err(e) => return Err(e.into()),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %request.url, "opened websocket connection to server");

        let (write, read) = ws_stream.split();

        let sink: FrameSink = Box::pin(
            write
                .sink_map_err(Error::from)
                .with(|text: String| future::ready(Ok::<_, Error>(Message::Text(text.into())))),
        );

        let stream: FrameStream = Box::pin(read.filter_map(|frame| {
            future::ready::<Option<Result<String>>>(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => Some(Err(WsError::ConnectionClosed.into())),
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            })
        }));

        Ok((sink, stream))
    }
}
