/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Establishing the transport, and reading/writing frames over it.
//!
//! The connection is generic over TCP and UNIX-domain sockets.  Rather than a trait
//! object, each direction is a two-variant enum dispatching via `match`: the capability
//! set is closed and the hot read/write paths stay monomorphic.

use std::path::Path;

use futures_util::{SinkExt, StreamExt};

use tokio::net::{self, tcp, unix, TcpStream, UnixStream};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    error::{self, Error},
    protocol::{resp::RespValue, RespCodec},
};

pub(crate) enum ReadTransport {
    Tcp(FramedRead<tcp::OwnedReadHalf, RespCodec>),
    Unix(FramedRead<unix::OwnedReadHalf, RespCodec>),
}

pub(crate) enum WriteTransport {
    Tcp(FramedWrite<tcp::OwnedWriteHalf, RespCodec>),
    Unix(FramedWrite<unix::OwnedWriteHalf, RespCodec>),
}

impl ReadTransport {
    /// Read exactly one reply.  An exhausted stream while a reply is owed means the server
    /// closed the connection mid-pipeline.
    pub(crate) async fn read_one(&mut self) -> Result<RespValue, Error> {
        let next = match self {
            ReadTransport::Tcp(stream) => stream.next().await,
            ReadTransport::Unix(stream) => stream.next().await,
        };
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e),
            None => Err(Error::EndOfStream),
        }
    }
}

impl WriteTransport {
    /// Serialize and send one query, flushing it to the socket.
    pub(crate) async fn write_one(&mut self, query: RespValue) -> Result<(), Error> {
        match self {
            WriteTransport::Tcp(sink) => sink.send(query).await.map_err(Into::into),
            WriteTransport::Unix(sink) => sink.send(query).await.map_err(Into::into),
        }
    }
}

/// Resolve `host`:`port` and connect via TCP, trying each address in turn.
pub(crate) async fn connect_tcp(
    host: &str,
    port: u16,
) -> Result<(ReadTransport, WriteTransport), Error> {
    let mut last_err = None;
    for addr in net::lookup_host((host, port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let (read, write) = stream.into_split();
                return Ok((
                    ReadTransport::Tcp(FramedRead::new(read, RespCodec)),
                    WriteTransport::Tcp(FramedWrite::new(write, RespCodec)),
                ));
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => e.into(),
        None => error::internal(format!("No addresses found for {}:{}", host, port)),
    })
}

/// Connect to a UNIX-domain socket.
pub(crate) async fn connect_unix(path: &Path) -> Result<(ReadTransport, WriteTransport), Error> {
    let stream = UnixStream::connect(path).await?;
    let (read, write) = stream.into_split();
    Ok((
        ReadTransport::Unix(FramedRead::new(read, RespCodec)),
        WriteTransport::Unix(FramedWrite::new(write, RespCodec)),
    ))
}
