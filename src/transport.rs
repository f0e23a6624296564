use std::{future::Future, pin::Pin};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::Result;

/// Inbound half of a duplex text transport.
///
/// `receive` yields one inbound message at a time and `None` once the peer
/// closes the channel. Implementations choose their own framing; the blanket
/// implementation below frames messages as lines.
pub trait TransportRead {
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    fn boxed(self) -> BoxTransportRead
    where
        Self: Sized + Send + 'static,
    {
        BoxTransportRead(Box::new(self))
    }
}

/// Outbound half of a duplex text transport.
pub trait TransportWrite {
    fn send(&mut self, text: &str) -> impl Future<Output = Result<()>> + Send;

    fn boxed(self) -> BoxTransportWrite
    where
        Self: Sized + Send + 'static,
    {
        BoxTransportWrite(Box::new(self))
    }
}

/// Any buffered reader is a line-framed transport: one message per line,
/// blank lines skipped.
impl<R> TransportRead for R
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let text = line.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
    }
}

/// Any writer is a line-framed transport; each message is flushed so a
/// request is on the wire before its caller starts waiting.
impl<W> TransportWrite for W
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, text: &str) -> Result<()> {
        self.write_all(text.as_bytes()).await?;
        self.write_all(b"\n").await?;
        self.flush().await?;
        Ok(())
    }
}

trait DynTransportRead {
    fn dyn_receive<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;
}

impl<T: TransportRead + Send> DynTransportRead for T {
    fn dyn_receive<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(self.receive())
    }
}

pub struct BoxTransportRead(Box<dyn DynTransportRead + Send + 'static>);

impl TransportRead for BoxTransportRead {
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>>> + Send {
        self.0.dyn_receive()
    }

    fn boxed(self) -> BoxTransportRead
    where
        Self: Sized + Send + 'static,
    {
        self
    }
}

trait DynTransportWrite {
    fn dyn_send<'a>(&'a mut self, text: &'a str)
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

impl<T: TransportWrite + Send> DynTransportWrite for T {
    fn dyn_send<'a>(
        &'a mut self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.send(text))
    }
}

pub struct BoxTransportWrite(Box<dyn DynTransportWrite + Send + 'static>);

impl TransportWrite for BoxTransportWrite {
    async fn send(&mut self, text: &str) -> Result<()> {
        self.0.dyn_send(text).await
    }

    fn boxed(self) -> BoxTransportWrite
    where
        Self: Sized + Send + 'static,
    {
        self
    }
}
