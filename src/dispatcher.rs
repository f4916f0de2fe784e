//! Dispatcher Module
//!
//! Serializes every demand through one thread that owns the [`Engine`].
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │ connection │ │ connection │ │ connection │   (one thread each)
//! └─────┬──────┘ └─────┬──────┘ └─────┬──────┘
//!       │ Demand + reply sender       │
//!       └──────────────┼──────────────┘
//!                      ▼
//!          ┌───────────────────────┐
//!          │ bounded demand queue  │
//!          └───────────┬───────────┘
//!                      ▼
//!          ┌───────────────────────┐     ┌──────────────┐
//!          │  dispatcher thread    │◄────│ autosave tick│
//!          │  (owns the Engine)    │     └──────────────┘
//!          └───────────────────────┘
//! ```
//!
//! Each demand carries its own single-use reply channel, so a reply can
//! never be delivered to the wrong requester. Both the enqueue and the wait
//! for the reply share one deadline; a request that misses it reports
//! [`FuqlError::Timeout`].

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::engine::{Demand, Engine, Reply};
use crate::error::{FuqlError, Result};
use crate::protocol::Command;
use crate::session::SessionId;

/// Messages accepted by the dispatcher thread
enum Message {
    Demand {
        demand: Demand,
        reply: Sender<Result<Reply>>,
    },

    /// Save everything and stop
    Shutdown,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Owner of the dispatcher thread
pub struct Dispatcher {
    sender: Sender<Message>,
    request_timeout: Duration,
    thread: Option<JoinHandle<(Engine, Result<()>)>>,
}

impl Dispatcher {
    /// Move the engine onto its own thread and start serving demands
    pub fn spawn(engine: Engine) -> Result<Self> {
        let config = engine.config();
        let (sender, receiver) = channel::bounded(config.queue_capacity.max(1));
        let request_timeout = config.request_timeout;
        let tick = config.autosave_tick;

        let thread = thread::Builder::new()
            .name("fuqldb-dispatcher".to_string())
            .spawn(move || run_dispatcher(engine, receiver, tick))?;

        Ok(Self {
            sender,
            request_timeout,
            thread: Some(thread),
        })
    }

    /// A cloneable handle for submitting demands
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            sender: self.sender.clone(),
            request_timeout: self.request_timeout,
        }
    }

    /// Stop the thread after the demands already queued, saving every database
    ///
    /// Returns the engine so callers can inspect the final state. A failed
    /// final save is returned as the error.
    pub fn shutdown(mut self) -> Result<Engine> {
        tracing::info!("Stopping dispatcher");
        // A full queue still drains, so this blocks only until there is room.
        let _ = self.sender.send(Message::Shutdown);

        let thread = self.thread.take().ok_or(FuqlError::Shutdown)?;
        let (engine, saved) = thread.join().map_err(|_| FuqlError::Shutdown)?;
        saved.map(|_| engine)
    }
}

/// The dispatcher thread's main loop
fn run_dispatcher(
    mut engine: Engine,
    receiver: Receiver<Message>,
    tick: Duration,
) -> (Engine, Result<()>) {
    let ticker = channel::tick(tick);
    tracing::debug!("Dispatcher started");

    loop {
        crossbeam::select! {
            recv(receiver) -> message => match message {
                Ok(Message::Demand { demand, reply }) => {
                    // The requester may have given up already
                    let _ = reply.send(engine.handle(demand));
                }
                Ok(Message::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => engine.on_tick(Instant::now()),
        }
    }

    let saved = engine.save_all();
    if let Err(ref e) = saved {
        tracing::error!("Final save failed: {}", e);
    }
    tracing::debug!("Dispatcher stopped");
    (engine, saved)
}

// =============================================================================
// Handle
// =============================================================================

/// Sending side of the dispatcher, shared by connection threads
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: Sender<Message>,
    request_timeout: Duration,
}

impl DispatcherHandle {
    /// Mint a new session
    pub fn create_session(&self) -> Result<SessionId> {
        match self.request(Demand::CreateSession)? {
            Reply::Session(id) => Ok(id),
            other => Err(FuqlError::Protocol(format!("unexpected reply {:?}", other))),
        }
    }

    /// Fail with `InvalidSession` unless the session is live
    pub fn lookup_session(&self, id: SessionId) -> Result<()> {
        self.request(Demand::LookupSession(id)).map(|_| ())
    }

    /// Run a command within a session
    pub fn submit(&self, session: SessionId, command: Command) -> Result<Reply> {
        self.request(Demand::Execute { session, command })
    }

    /// Enqueue a demand and wait for its reply under one deadline
    pub fn request(&self, demand: Demand) -> Result<Reply> {
        let deadline = Instant::now() + self.request_timeout;
        let (reply, response) = channel::bounded(1);

        self.sender
            .send_timeout(Message::Demand { demand, reply }, self.request_timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    FuqlError::Timeout("demand queue is full".to_string())
                }
                SendTimeoutError::Disconnected(_) => FuqlError::Shutdown,
            })?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        match response.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                Err(FuqlError::Timeout("no reply before the deadline".to_string()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(FuqlError::Shutdown),
        }
    }
}
