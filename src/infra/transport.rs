//! Byte-stream transport
//!
//! Bridges a channel onto any `AsyncRead`/`AsyncWrite` pair using LSP
//! `Content-Length` framing. A read pump decodes inbound frames into
//! `FromServer`; a write pump drains the outbox onto the stream.

use std::io;
use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;

use super::channel::{FromServer, Outbox, OutboxReceiver};
use super::rpc::codec::Codec;

/// Reads framed messages from a byte stream
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message body
    ///
    /// ```text
    /// Content-Length: 123\r\n
    /// \r\n
    /// {"jsonrpc":"2.0",...}
    /// ```
    pub async fn read_message(&mut self) -> io::Result<String> {
        let content_length = self.read_headers().await?;

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;

        let json =
            String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tracing::trace!("LSP <- {}", json);
        Ok(json)
    }

    async fn read_headers(&mut self) -> io::Result<usize> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }

            let line = line.trim();
            if line.is_empty() {
                break;
            }

            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                );
            }
            // Content-Type and friends are ignored
        }

        content_length
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length"))
    }
}

/// Write one JSON message with framing
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> io::Result<()> {
    writer.write_all(Codec::frame(json).as_bytes()).await?;
    writer.flush().await
}

/// A channel bound to a live byte stream
pub struct Connection {
    outbox: Arc<Outbox>,
    inbound: FromServer,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Connection {
    /// Spawn both pumps over `reader`/`writer`
    pub fn spawn<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbox, rx) = Outbox::new();
        let inbound = FromServer::new();

        let read_task = tokio::spawn(read_pump(FrameReader::new(reader), inbound.clone()));
        let write_task = tokio::spawn(write_pump(writer, rx));

        Self {
            outbox: Arc::new(outbox),
            inbound,
            read_task,
            write_task,
        }
    }

    /// Connect to a server listening on TCP
    pub async fn connect_tcp(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self::spawn(read_half, write_half))
    }

    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.outbox)
    }

    pub fn inbound(&self) -> &FromServer {
        &self.inbound
    }

    /// Stop both pumps and end the inbound sequences
    pub fn shutdown(&self) {
        self.read_task.abort();
        self.write_task.abort();
        self.inbound.close();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

async fn read_pump<R: AsyncRead + Unpin>(mut reader: FrameReader<R>, inbound: FromServer) {
    loop {
        match reader.read_message().await {
            Ok(json) => match Codec::decode(&json) {
                Ok(message) => inbound.deliver(message),
                Err(e) => tracing::warn!("Dropping malformed message: {}", e),
            },
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::debug!("Server closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!("Transport read failed: {}", e);
                break;
            }
        }
    }
    inbound.close();
}

async fn write_pump<W: AsyncWrite + Unpin>(mut writer: W, mut rx: OutboxReceiver) {
    while let Some(wire) = rx.recv().await {
        if let Err(e) = write_message(&mut writer, &wire).await {
            tracing::warn!("Transport write failed: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::channel::IntoServer;
    use crate::infra::rpc::protocol::{Message, Notification, Request, RequestId};
    use futures::StreamExt;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frame_reader_reads_consecutive_messages() {
        let (mut server, client) = duplex(1024);
        let mut reader = FrameReader::new(client);

        write_message(&mut server, r#"{"a":1}"#).await.unwrap();
        server
            .write_all(b"Content-Type: application/vscode-jsonrpc\r\nContent-Length: 7\r\n\r\n{\"b\":2}")
            .await
            .unwrap();

        assert_eq!(reader.read_message().await.unwrap(), r#"{"a":1}"#);
        assert_eq!(reader.read_message().await.unwrap(), r#"{"b":2}"#);

        drop(server);
        let err = reader.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_missing_content_length_is_invalid() {
        let (mut server, client) = duplex(1024);
        let mut reader = FrameReader::new(client);
        server.write_all(b"X-Other: 1\r\n\r\n").await.unwrap();
        let err = reader.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_connection_pumps_both_directions() {
        let (client, server) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, mut server_write) = tokio::io::split(server);
        let connection = Connection::spawn(client_read, client_write);
        let mut requests = connection.inbound().requests();

        // client -> server
        let wire = Codec::encode(&Notification::new("initialized", None).into()).unwrap();
        connection.outbox().enqueue(wire).unwrap();
        let mut server_reader = FrameReader::new(server_read);
        let received = Codec::decode(&server_reader.read_message().await.unwrap()).unwrap();
        assert_eq!(received.method(), Some("initialized"));

        // server -> client, including a malformed frame that is skipped
        write_message(&mut server_write, "{not json").await.unwrap();
        let request: Message = Request::new(5, "custom/readFile", None).into();
        write_message(&mut server_write, &Codec::encode(&request).unwrap())
            .await
            .unwrap();
        assert_eq!(requests.next().await.unwrap().id, RequestId::Number(5));

        // EOF closes the inbound sequences
        drop(server_write);
        drop(server_reader);
        assert!(requests.next().await.is_none());
    }
}
