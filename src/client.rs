// MIT License - Copyright (c) 2026 Peter Wright
// TCP connection manager

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::codec::{FrameBuffer, encode, escape_terminator};
use crate::config::TpiConfig;
use crate::error::{Result, TpiError};
use crate::event::{EventReceiver, EventSender, TpiEvent, emit, event_channel};
use crate::session::{Effect, Session};
use crate::table::CommandTable;

/// Outcome of [`TpiClient::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectStatus {
    /// Close requested; a `Disconnected` event follows once it completes.
    Pending,
    /// There was no open session.
    AlreadyClosed,
}

/// Client for one EnvisaLink TPI connection.
///
/// # Example
///
/// ```no_run
/// use envisalink_tpi::{TpiClient, TpiConfig, TpiEvent};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = TpiConfig::builder()
///         .host("192.168.0.50")
///         .password("user")
///         .zones(16)
///         .partitions(1)
///         .build();
///
///     let client = TpiClient::with_builtin_table(config)?;
///     let mut events = client.subscribe();
///     client.connect().await?;
///
///     while let Ok(event) = events.recv().await {
///         if let TpiEvent::ZoneUpdate(update) = event {
///             println!("Zone {}: {}", update.zone, update.status);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct TpiClient {
    config: TpiConfig,
    table: Arc<CommandTable>,
    event_tx: EventSender,
    link: Mutex<Option<Link>>,
}

impl TpiClient {
    pub fn new(config: TpiConfig, table: CommandTable) -> Self {
        let (event_tx, _event_rx) = event_channel(config.event_capacity.max(1));
        Self {
            config,
            table: Arc::new(table),
            event_tx,
            link: Mutex::new(None),
        }
    }

    /// Create a client using the bundled command table.
    pub fn with_builtin_table(config: TpiConfig) -> Result<Self> {
        Ok(Self::new(config, CommandTable::builtin()?))
    }

    pub fn config(&self) -> &TpiConfig {
        &self.config
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Whether a socket is currently open.
    pub async fn is_connected(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .is_some_and(|link| link.is_active())
    }

    /// Open the TCP connection and start processing inbound frames.
    ///
    /// Every connect starts with empty zone, partition, user and system
    /// state. The login handshake is driven by the panel's prompts; a
    /// `Connected` event is emitted once the password is accepted.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected().await {
            return Err(TpiError::AlreadyConnected);
        }
        self.config.validate()?;

        let address = self.config.address();
        info!("Connecting to EnvisaLink at {}", address);

        let stream = match TcpStream::connect(&address).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("TCP connect failed: {}", e);
                emit(&self.event_tx, TpiEvent::Error(e.to_string()));
                return Err(TpiError::Io(e));
            }
        };
        debug!("TCP socket connected");

        let mut guard = self.link.lock().await;
        // another connect may have won while this one was dialing
        if guard.as_ref().is_some_and(|link| link.is_active()) {
            return Err(TpiError::AlreadyConnected);
        }

        let (reader, writer) = stream.into_split();
        let writer = CommandWriter::new(writer, self.event_tx.clone());
        let active = Arc::new(AtomicBool::new(true));
        let session = Session::new(
            Arc::clone(&self.table),
            self.config.password.clone(),
            self.config.zones,
            self.config.partitions,
        );

        let reader_handle = spawn_reader_task(
            reader,
            session,
            writer.clone(),
            self.event_tx.clone(),
            Arc::clone(&active),
        );

        *guard = Some(Link {
            writer,
            active,
            closing: false,
            reader_handle,
            close_timer: None,
        });
        Ok(())
    }

    /// Half-close the socket.
    ///
    /// Returns [`DisconnectStatus::Pending`] when a close was started; the
    /// `Disconnected` event marks completion. If the panel has not closed
    /// its side within the configured timeout the session is torn down and
    /// `Disconnected` is emitted anyway.
    pub async fn disconnect(&self) -> Result<DisconnectStatus> {
        let writer = {
            let mut guard = self.link.lock().await;
            let Some(link) = guard.as_mut() else {
                return Ok(DisconnectStatus::AlreadyClosed);
            };
            if !link.is_active() {
                *guard = None;
                return Ok(DisconnectStatus::AlreadyClosed);
            }
            if link.closing {
                return Ok(DisconnectStatus::Pending);
            }

            info!("Disconnecting from EnvisaLink");
            link.closing = true;
            link.close_timer = Some(spawn_close_timer(
                Arc::clone(&link.active),
                link.reader_handle.abort_handle(),
                self.event_tx.clone(),
                self.config.disconnect_timeout(),
            ));
            link.writer.clone()
        };

        // A write stalled on a panel that stopped reading holds the writer
        // lock, so the half-close is bounded by the same timeout.
        match timeout(self.config.disconnect_timeout(), writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to half-close socket: {}", e),
            Err(_) => warn!("Half-close did not complete, writer is busy"),
        }

        Ok(DisconnectStatus::Pending)
    }

    /// Send a command, appending the checksum and terminator.
    ///
    /// e.g., `"0301"` (arm partition 1 away) goes out as `"0301C4\r\n"`.
    pub async fn send_command(&self, command: &str) -> Result<()> {
        let writer = {
            let guard = self.link.lock().await;
            match guard.as_ref() {
                Some(link) if link.is_active() && !link.closing => link.writer.clone(),
                _ => return Err(TpiError::NotConnected),
            }
        };
        writer.send(command).await
    }
}

/// The live socket of one session.
struct Link {
    writer: CommandWriter,
    /// Cleared by whichever side observes the end of the session first
    active: Arc<AtomicBool>,
    closing: bool,
    reader_handle: JoinHandle<()>,
    close_timer: Option<JoinHandle<()>>,
}

impl Link {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader_handle.abort();
        if let Some(timer) = self.close_timer.take() {
            timer.abort();
        }
    }
}

/// Shared write half. Writes are serialized but never queued.
#[derive(Clone)]
struct CommandWriter {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    event_tx: EventSender,
}

impl CommandWriter {
    fn new(writer: OwnedWriteHalf, event_tx: EventSender) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            event_tx,
        }
    }

    async fn send(&self, command: &str) -> Result<()> {
        let encoded = encode(command);
        {
            let mut writer = self.writer.lock().await;
            writer.write_all(encoded.as_bytes()).await.map_err(|e| {
                error!("Failed to write command: {}", e);
                TpiError::Io(e)
            })?;
        }
        emit(
            &self.event_tx,
            TpiEvent::LogDebug(format!("Sending: {}", escape_terminator(&encoded))),
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

/// Tear the session down if the panel has not closed its side in time.
fn spawn_close_timer(
    active: Arc<AtomicBool>,
    reader: AbortHandle,
    event_tx: EventSender,
    limit: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(limit).await;
        if active.swap(false, Ordering::SeqCst) {
            warn!("Panel did not close the connection within {:?}", limit);
            reader.abort();
            emit(&event_tx, TpiEvent::Disconnected);
        }
    })
}

/// Spawn the reader task that processes incoming data from the panel.
fn spawn_reader_task(
    mut reader: OwnedReadHalf,
    mut session: Session,
    writer: CommandWriter,
    event_tx: EventSender,
    active: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        let mut frames = FrameBuffer::new();

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("Reader: connection closed");
                    if active.swap(false, Ordering::SeqCst) {
                        emit(&event_tx, TpiEvent::Disconnected);
                    }
                    break;
                }
                Ok(n) => {
                    for frame in frames.push(&buf[..n]) {
                        let effects = session.process_frame(&frame);
                        apply_effects(effects, &writer, &event_tx).await;
                    }
                }
                Err(e) => {
                    error!("Reader: read error: {}", e);
                    if active.swap(false, Ordering::SeqCst) {
                        emit(&event_tx, TpiEvent::Error(e.to_string()));
                        emit(&event_tx, TpiEvent::Disconnected);
                    }
                    break;
                }
            }
        }
    })
}

/// Carry out one frame's effects in order.
async fn apply_effects(effects: Vec<Effect>, writer: &CommandWriter, event_tx: &EventSender) {
    for effect in effects {
        match effect {
            Effect::Emit(event) => emit(event_tx, event),
            Effect::Send(command) => {
                if let Err(e) = writer.send(&command).await {
                    emit(event_tx, TpiEvent::Error(e.to_string()));
                }
            }
        }
    }
}
