/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! The byte-level side of the dispatch channel.
//!
//! The connection manager only sees [`Transport`], which opens a fresh
//! [`Link`] per attempt. Frames are whole JSON documents; how they are
//! delimited on the wire is up to the implementation.

use crate::tools::error::AppError;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::info;

#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: String) -> Result<(), AppError>;

    async fn close(&mut self);
}

#[async_trait]
pub trait FrameStream: Send {
    /// `None` once the peer closed the channel.
    async fn next_frame(&mut self) -> Option<Result<String, AppError>>;
}

pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self) -> Result<Link, AppError>;
}

/// Newline delimited JSON over TCP.
pub struct TcpTransport {
    /// `host:port` of the dispatch service.
    pub addr: String,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self) -> Result<Link, AppError> {
        let stream = TcpStream::connect(self.addr.as_str())
            .await
            .map_err(|err| AppError::TransportError(format!("{} : {err}", self.addr)))?;
        info!(tag = "[Dispatch Socket Opened]", remote_addr = %self.addr);

        let (read_half, write_half) = tokio::io::split(stream);
        Ok(Link {
            sink: Box::new(TcpFrameSink {
                writer: BufWriter::new(write_half),
            }),
            stream: Box::new(TcpFrameStream {
                lines: BufReader::new(read_half).lines(),
            }),
        })
    }
}

struct TcpFrameSink {
    writer: BufWriter<WriteHalf<TcpStream>>,
}

#[async_trait]
impl FrameSink for TcpFrameSink {
    async fn send_frame(&mut self, frame: String) -> Result<(), AppError> {
        let to_send = format!("{frame}\n");
        self.writer
            .write_all(to_send.as_bytes())
            .await
            .map_err(|err| AppError::TransportError(format!("Error writing to socket : {err}")))?;
        self.writer
            .flush()
            .await
            .map_err(|err| AppError::TransportError(format!("Error flushing socket : {err}")))
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

struct TcpFrameStream {
    lines: Lines<BufReader<ReadHalf<TcpStream>>>,
}

#[async_trait]
impl FrameStream for TcpFrameStream {
    async fn next_frame(&mut self) -> Option<Result<String, AppError>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => return None,
                Err(err) => return Some(Err(AppError::TransportError(err.to_string()))),
            }
        }
    }
}
