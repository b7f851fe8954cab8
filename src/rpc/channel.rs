//! Ordered, message-framed transport between the two processes.
//!
//! Each frame is one line of JSON text. The channel owns two tasks: a writer
//! draining an outbound queue and a reader forwarding inbound frames. Either
//! side failing, or an explicit [`ChannelSender::close`], tears down both.

use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite, LinesCodec},
    sync::CancellationToken,
};

use crate::error::{Error, Result};

/// Sending half of a channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    outbound: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

impl ChannelSender {
    /// Queue a frame. Frames are written in the order they are queued.
    pub fn send(&self, frame: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        self.outbound.send(frame).map_err(|_| Error::ChannelClosed)
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the channel is torn down.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

/// Receiving half of a channel.
#[derive(Debug)]
pub struct ChannelReceiver {
    inbound: mpsc::UnboundedReceiver<String>,
}

impl ChannelReceiver {
    /// Next inbound frame, or `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}

/// Start the reader and writer tasks over a byte stream pair.
pub fn spawn_channel<R, W>(reader: R, writer: W) -> (ChannelSender, ChannelReceiver)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let closed = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(write_loop(writer, outbound_rx, closed.clone()));
    tokio::spawn(read_loop(reader, inbound_tx, closed.clone()));

    (
        ChannelSender {
            outbound: outbound_tx,
            closed,
        },
        ChannelReceiver {
            inbound: inbound_rx,
        },
    )
}

async fn write_loop<W>(
    writer: W,
    mut outbound: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(frame).await {
                    tracing::warn!("Channel write failed: {e}");
                    break;
                }
            }
        }
    }
    closed.cancel();
    tracing::debug!("Channel writer stopped");
}

async fn read_loop<R>(reader: R, inbound: mpsc::UnboundedSender<String>, closed: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, LinesCodec::new());
    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            frame = frames.next() => match frame {
                Some(Ok(frame)) => {
                    if frame.is_empty() {
                        continue;
                    }
                    if inbound.send(frame).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Channel read failed: {e}");
                    break;
                }
                None => {
                    tracing::debug!("Channel reached end of stream");
                    break;
                }
            }
        }
    }
    closed.cancel();
}
