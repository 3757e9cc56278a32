// MIT License - Copyright (c) 2026 Peter Wright
// Frame dispatch for one connection

use std::sync::Arc;

use crate::auth::handle_login;
use crate::codec::{identify, payload};
use crate::error::Result;
use crate::event::TpiEvent;
use crate::state::StateTracker;
use crate::table::{Action, CommandTable};

/// One thing the connection must do as a result of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish on the event stream
    Emit(TpiEvent),
    /// Encode and write a command to the panel
    Send(String),
}

/// Dispatcher for a single connection: the command table, the password
/// and a fresh [`StateTracker`].
///
/// Frames are handled one at a time and each produces its effects in order.
/// Nothing here touches the socket, so the connection task decides how to
/// carry the effects out.
#[derive(Debug)]
pub struct Session {
    table: Arc<CommandTable>,
    password: String,
    state: StateTracker,
}

impl Session {
    pub fn new(
        table: Arc<CommandTable>,
        password: impl Into<String>,
        zones: u32,
        partitions: u32,
    ) -> Self {
        Self {
            table,
            password: password.into(),
            state: StateTracker::new(zones, partitions),
        }
    }

    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    /// Handle one frame, appending its effects.
    ///
    /// Unknown codes produce nothing. On error, effects pushed before the
    /// failing field are kept.
    pub fn handle_frame(&mut self, frame: &str, effects: &mut Vec<Effect>) -> Result<()> {
        let Some((code, descriptor)) = identify(&self.table, frame) else {
            return Ok(());
        };

        if descriptor.is_informational() {
            effects.push(Effect::Emit(TpiEvent::LogWarn(format!(
                "{} - {}",
                descriptor.log_prefix, descriptor.log_suffix
            ))));
            return Ok(());
        }

        effects.push(Effect::Emit(TpiEvent::LogDebug(format!(
            "{} {} {}",
            descriptor.log_prefix,
            payload(frame),
            descriptor.log_suffix
        ))));

        match descriptor.action {
            Some(Action::UpdateZone) => {
                if let Some(update) = self.state.update_zone(code, descriptor, frame)? {
                    effects.push(Effect::Emit(TpiEvent::ZoneUpdate(update)));
                }
            }
            Some(Action::UpdatePartition) => {
                if let Some(update) = self.state.update_partition(code, descriptor, frame)? {
                    effects.push(Effect::Emit(TpiEvent::PartitionUpdate(update)));
                }
            }
            Some(Action::UpdatePartitionUser) => {
                if let Some(update) = self.state.update_partition_user(code, descriptor, frame)? {
                    effects.push(Effect::Emit(TpiEvent::PartitionUserUpdate(update)));
                }
            }
            Some(Action::UpdateSystem) => {
                let update = self.state.update_system(code, descriptor, frame);
                effects.push(Effect::Emit(TpiEvent::SystemUpdate(update)));
            }
            Some(Action::LoginResponse) => handle_login(frame, &self.password, effects)?,
            None => {}
        }
        Ok(())
    }

    /// Handle one frame and return its effects, reporting a malformed frame
    /// as a trailing `log-error` event.
    pub fn process_frame(&mut self, frame: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Err(e) = self.handle_frame(frame, &mut effects) {
            effects.push(Effect::Emit(TpiEvent::LogError(e.to_string())));
        }
        effects
    }
}
