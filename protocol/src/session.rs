//! One connection's framed stream.
//!
//! A `Session` owns both directions of a connection. It can be split so that
//! a read loop and a write loop run on separate tasks, each half still owned
//! by exactly one task.

use std::io;
use std::net::SocketAddr;

use futures::SinkExt; // provides send/close on top of FramedWrite
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{tcp, TcpStream, ToSocketAddrs};
use tokio_stream::StreamExt; // provides next on top of FramedRead
use tokio_util::codec::{Encoder, FramedRead, FramedWrite};
use tracing::debug;

use crate::codec::ChatCodec;
use crate::error::{ProtocolError, SessionError};
use crate::message::Frame;

pub type TcpSession = Session<tcp::OwnedReadHalf, tcp::OwnedWriteHalf>;

pub struct Session<R, W> {
    reader: SessionReader<R>,
    writer: SessionWriter<W>,
}

pub struct SessionReader<R> {
    peer_addr: SocketAddr,
    frames: FramedRead<R, ChatCodec>,
}

pub struct SessionWriter<W> {
    peer_addr: SocketAddr,
    frames: FramedWrite<W, ChatCodec>,
    closed: bool,
}

impl TcpSession {
    // server side, wraps an accepted stream
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let (tcp_read, tcp_write) = stream.into_split();
        Ok(Session::new(peer_addr, tcp_read, tcp_write))
    }

    // client side
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(peer_addr: SocketAddr, read: R, write: W) -> Self {
        Session {
            reader: SessionReader {
                peer_addr,
                frames: FramedRead::new(read, ChatCodec::new()),
            },
            writer: SessionWriter {
                peer_addr,
                frames: FramedWrite::new(write, ChatCodec::new()),
                closed: false,
            },
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.reader.peer_addr
    }

    pub async fn send<T>(&mut self, item: T) -> Result<(), SessionError>
    where
        ChatCodec: Encoder<T, Error = ProtocolError>,
    {
        self.writer.send(item).await
    }

    pub async fn receive(&mut self) -> Result<Frame, SessionError> {
        self.reader.receive().await
    }

    pub async fn close(&mut self) {
        self.writer.close().await
    }

    pub fn into_split(self) -> (SessionReader<R>, SessionWriter<W>) {
        (self.reader, self.writer)
    }
}

impl<R: AsyncRead + Unpin> SessionReader<R> {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    // Waits for the next complete frame
    pub async fn receive(&mut self) -> Result<Frame, SessionError> {
        match self.frames.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(ProtocolError::Io(e))) => {
                debug!(peer = %self.peer_addr, error = ?e, "session read failed");
                Err(SessionError::Disconnected)
            },
            Some(Err(e)) => Err(SessionError::Protocol(e)),
            None => Err(SessionError::Disconnected),
        }
    }
}

impl<W: AsyncWrite + Unpin> SessionWriter<W> {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    // Encodes and flushes a single frame
    pub async fn send<T>(&mut self, item: T) -> Result<(), SessionError>
    where
        ChatCodec: Encoder<T, Error = ProtocolError>,
    {
        if self.closed {
            return Err(SessionError::Disconnected)
        }

        match self.frames.send(item).await {
            Ok(()) => Ok(()),
            Err(ProtocolError::Io(e)) => {
                debug!(peer = %self.peer_addr, error = ?e, "session write failed");
                Err(SessionError::Disconnected)
            },
            Err(e) => Err(SessionError::Protocol(e)),
        }
    }

    // Flushes and shuts down the write half, later calls are no-ops
    pub async fn close(&mut self) {
        if self.closed {
            return
        }
        self.closed = true;

        if let Err(e) = SinkExt::<Frame>::close(&mut self.frames).await {
            debug!(peer = %self.peer_addr, error = ?e, "session close failed");
        }
    }
}
