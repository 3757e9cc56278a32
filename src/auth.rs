// MIT License - Copyright (c) 2026 Peter Wright
// Login handshake

use crate::codec::field;
use crate::constants::{layout, CMD_SEND_PASSWORD, CMD_STATUS_REQUEST};
use crate::error::Result;
use crate::event::TpiEvent;
use crate::session::Effect;

/// Status digit of the login-response frame.
///
/// # Handshake
///
/// ```text
/// panel → 5053CD          password requested
/// client → 005<pw><cs>    send password
/// panel → 5051CB          accepted
/// client → 00191          status request
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// `0`: password rejected
    IncorrectPassword,
    /// `1`: logged in
    Success,
    /// `2`: panel gave up waiting for the password
    TimedOut,
    /// `3`: panel is asking for the password
    PasswordRequested,
}

impl LoginStatus {
    pub fn from_digit(digit: &str) -> Option<Self> {
        match digit {
            "0" => Some(Self::IncorrectPassword),
            "1" => Some(Self::Success),
            "2" => Some(Self::TimedOut),
            "3" => Some(Self::PasswordRequested),
            _ => None,
        }
    }
}

/// Work out the next handshake step from a login-response frame.
pub fn handle_login(frame: &str, password: &str, effects: &mut Vec<Effect>) -> Result<()> {
    let (start, len) = layout::LOGIN_STATUS;
    let digit = field(frame, start, len)?;

    match LoginStatus::from_digit(digit) {
        Some(LoginStatus::IncorrectPassword) => {
            effects.push(Effect::Emit(TpiEvent::LogDebug(
                "Incorrect password".to_string(),
            )));
        }
        Some(LoginStatus::Success) => {
            effects.push(Effect::Emit(TpiEvent::Connected));
            effects.push(Effect::Emit(TpiEvent::LogDebug(
                "Successfully logged in. Requesting current state.".to_string(),
            )));
            effects.push(Effect::Send(CMD_STATUS_REQUEST.to_string()));
        }
        Some(LoginStatus::TimedOut) => {
            effects.push(Effect::Emit(TpiEvent::LogDebug(
                "Request for password timed out.".to_string(),
            )));
        }
        Some(LoginStatus::PasswordRequested) => {
            effects.push(Effect::Emit(TpiEvent::LogDebug(
                "Login requested. Sending response.".to_string(),
            )));
            effects.push(Effect::Send(format!("{CMD_SEND_PASSWORD}{password}")));
        }
        None => {
            effects.push(Effect::Emit(TpiEvent::LogWarn(format!(
                "Unrecognised login response {digit:?}"
            ))));
        }
    }
    Ok(())
}
