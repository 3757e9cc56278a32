// MIT License - Copyright (c) 2026 Peter Wright
//
//! # envisalink-tpi
//!
//! Client for the TPI (Terminal Protocol Interface) exposed by EnvisaLink
//! alarm-panel network modules over a persistent TCP socket.
//!
//! The client logs in, decodes status frames into zone, partition, user and
//! system updates, and sends checksummed commands. Everything the panel
//! reports arrives on a single ordered event stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use envisalink_tpi::{TpiClient, TpiConfig, TpiEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TpiConfig::builder()
//!         .host("192.168.0.50")
//!         .password("user")
//!         .zones(16)
//!         .partitions(1)
//!         .build();
//!
//!     let client = TpiClient::with_builtin_table(config)?;
//!     let mut events = client.subscribe();
//!     client.connect().await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             TpiEvent::Connected => client.send_command("0301").await?,
//!             TpiEvent::ZoneUpdate(update) if !update.initial_update => {
//!                 println!("Zone {}: {}", update.zone, update.status);
//!             }
//!             TpiEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod session;
pub mod state;
pub mod table;

// Re-exports for convenience
pub use client::{DisconnectStatus, TpiClient};
pub use config::{TpiConfig, TpiConfigBuilder};
pub use error::{Result, TpiError};
pub use event::{
    ArmMode, EventReceiver, PartitionUpdate, PartitionUserUpdate, SystemUpdate, TpiEvent,
    ZoneUpdate,
};
pub use session::{Effect, Session};
pub use state::StateTracker;
pub use table::{Action, CommandDescriptor, CommandTable};
