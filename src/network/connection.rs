//! Connection Handler
//!
//! Handles individual client connections.
//!
//! Every request frame gets exactly one reply line. Failures are turned
//! into error replies and the connection keeps going; only I/O failures or
//! an oversized frame end it.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::time::Duration;

use crate::dispatcher::DispatcherHandle;
use crate::engine::Reply;
use crate::error::{FuqlError, Result};
use crate::protocol::{
    decode_frame, parse_command, read_frame_bytes, write_response, Response, SessionToken,
};
use crate::session::SessionId;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Route to the engine
    dispatcher: DispatcherHandle,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and disables Nagle's algorithm
    pub fn new(stream: TcpStream, dispatcher: DispatcherHandle) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            dispatcher,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let bytes = match read_frame_bytes(&mut self.reader) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(FuqlError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(FuqlError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = write_response(&mut self.writer, &Response::from_error(&e));
                    return Err(e);
                }
            };

            let response = self.process(&bytes);

            if let Err(e) = write_response(&mut self.writer, &response) {
                if let FuqlError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Turn one raw frame into its reply
    fn process(&self, bytes: &[u8]) -> Response {
        let result = decode_frame(bytes).and_then(|frame| match frame.session {
            SessionToken::New => self.dispatcher.create_session().map(Reply::Session),
            SessionToken::Existing(id) => self.execute(id, &frame.command),
        });

        match result {
            Ok(reply) => reply.into_response(),
            Err(e) => {
                tracing::debug!("Request from {} failed: {}", self.peer_addr, e);
                Response::from_error(&e)
            }
        }
    }

    /// Session check first, so unknown sessions never reach the parser
    fn execute(&self, id: SessionId, text: &str) -> Result<Reply> {
        self.dispatcher.lookup_session(id)?;
        let command = parse_command(text)?;
        tracing::trace!("{} -> {:?}", self.peer_addr, command.command_type());
        self.dispatcher.submit(id, command)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}
