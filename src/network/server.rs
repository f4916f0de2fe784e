//! TCP Server
//!
//! Accepts connections and runs each one on its own thread.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::dispatcher::DispatcherHandle;
use crate::error::Result;

use super::Connection;

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// TCP server for FUQLdb
pub struct Server {
    config: Config,
    dispatcher: DispatcherHandle,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,

    /// Streams of live connections, so shutdown can unblock their reads
    live: Arc<Mutex<HashMap<u64, TcpStream>>>,
    next_id: AtomicU64,
}

impl Server {
    /// Bind the listen address from the config
    pub fn bind(config: Config, dispatcher: DispatcherHandle) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            dispatcher,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            live: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until [`Server::shutdown`] is called
    ///
    /// On return every connection thread has been joined.
    pub fn run(&self) -> Result<()> {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    workers.retain(|worker| !worker.is_finished());
                    if self.live.lock().len() >= self.config.max_connections {
                        tracing::warn!("Refusing {}: connection limit reached", peer);
                        let _ = stream.shutdown(Shutdown::Both);
                        continue;
                    }
                    match self.spawn_connection(stream) {
                        Ok(worker) => workers.push(worker),
                        Err(e) => tracing::warn!("Failed to start connection for {}: {}", peer, e),
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        // Wake connection threads blocked in read
        for (_, stream) in self.live.lock().drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        for worker in workers {
            let _ = worker.join();
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// A flag that stops the server when set, for use from other threads
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn spawn_connection(&self, stream: TcpStream) -> Result<JoinHandle<()>> {
        stream.set_nonblocking(false)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tracked = stream.try_clone()?;
        let mut connection = Connection::new(stream, self.dispatcher.clone())?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;
        self.live.lock().insert(id, tracked);

        let live = Arc::clone(&self.live);

        let spawned = thread::Builder::new()
            .name(format!("fuqldb-conn-{}", id))
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} ended with error: {}", connection.peer_addr(), e);
                }
                live.lock().remove(&id);
            });
        if spawned.is_err() {
            self.live.lock().remove(&id);
        }
        Ok(spawned?)
    }
}
