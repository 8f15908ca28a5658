//! Protocol commands
//!
//! Defines the commands supported by the Exsys managed hub.

use std::fmt;

use super::{ProtocolError, COMMAND_TERMINATOR, DEFAULT_PASSWORD, PASSWORD_FIELD_LEN};

/// Protocol commands for hub communication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query model and firmware version ('?Q' command)
    Identify,

    /// Read the port power mask ('GP' command)
    GetPorts,

    /// Write the port power mask ('SP' command)
    SetPorts,

    /// Reset the hub ('RH' command)
    ResetHub,

    /// Restore factory defaults ('RD' command)
    RestoreDefaults,

    /// Store the current port states as start-up states ('WP' command)
    SavePorts,
}

impl Command {
    /// Get the two-character command mnemonic
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Command::Identify => "?Q",
            Command::GetPorts => "GP",
            Command::SetPorts => "SP",
            Command::ResetHub => "RH",
            Command::RestoreDefaults => "RD",
            Command::SavePorts => "WP",
        }
    }

    /// Look up a command from its mnemonic
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        match mnemonic {
            "?Q" => Some(Command::Identify),
            "GP" => Some(Command::GetPorts),
            "SP" => Some(Command::SetPorts),
            "RH" => Some(Command::ResetHub),
            "RD" => Some(Command::RestoreDefaults),
            "WP" => Some(Command::SavePorts),
            _ => None,
        }
    }

    /// Check if the command changes hub state and therefore needs the password
    pub fn requires_password(&self) -> bool {
        !matches!(self, Command::Identify | Command::GetPorts)
    }

    /// Check if success is signalled by a 'G' reply.
    ///
    /// Reset is accepted on any reply.
    pub fn expects_acknowledgement(&self) -> bool {
        self.requires_password() && *self != Command::ResetHub
    }

    /// Build the wire frame: mnemonic, password field (if needed), payload, '\r'
    pub fn frame(&self, password: &Password, payload: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + PASSWORD_FIELD_LEN + payload.len() + 1);
        bytes.extend_from_slice(self.mnemonic().as_bytes());
        if self.requires_password() {
            bytes.extend_from_slice(password.field().as_bytes());
        }
        bytes.extend_from_slice(payload.as_bytes());
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Management password, stored as the space-padded wire field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Password {
    field: String,
}

impl Password {
    /// Validate a password and pad it to the field width
    pub fn new(text: &str) -> Result<Self, ProtocolError> {
        let valid = !text.is_empty()
            && text.len() <= PASSWORD_FIELD_LEN
            && text.bytes().all(|b| b.is_ascii_graphic());
        if !valid {
            return Err(ProtocolError::InvalidPassword);
        }
        Ok(Self {
            field: format!("{:<width$}", text, width = PASSWORD_FIELD_LEN),
        })
    }

    /// The padded field as sent on the wire
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The password without padding
    pub fn text(&self) -> &str {
        self.field.trim_end()
    }
}

impl Default for Password {
    fn default() -> Self {
        Self {
            field: format!("{:<width$}", DEFAULT_PASSWORD, width = PASSWORD_FIELD_LEN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mnemonics() {
        assert_eq!(Command::Identify.mnemonic(), "?Q");
        assert_eq!(Command::GetPorts.mnemonic(), "GP");
        assert_eq!(Command::SavePorts.mnemonic(), "WP");
        assert_eq!(Command::from_mnemonic("RD"), Some(Command::RestoreDefaults));
        assert_eq!(Command::from_mnemonic("XX"), None);
    }

    #[test]
    fn test_command_password() {
        assert!(!Command::Identify.requires_password());
        assert!(!Command::GetPorts.requires_password());
        assert!(Command::ResetHub.requires_password());
        assert!(Command::SetPorts.requires_password());
    }

    #[test]
    fn test_reset_has_no_acknowledgement() {
        assert!(!Command::ResetHub.expects_acknowledgement());
        assert!(Command::RestoreDefaults.expects_acknowledgement());
        assert!(Command::SavePorts.expects_acknowledgement());
        assert!(!Command::GetPorts.expects_acknowledgement());
    }

    #[test]
    fn test_frames() {
        let pw = Password::default();
        assert_eq!(Command::Identify.frame(&pw, ""), b"?Q\r".to_vec());
        assert_eq!(Command::GetPorts.frame(&pw, ""), b"GP\r".to_vec());
        assert_eq!(Command::ResetHub.frame(&pw, ""), b"RHpass    \r".to_vec());
        assert_eq!(Command::RestoreDefaults.frame(&pw, ""), b"RDpass    \r".to_vec());
        assert_eq!(Command::SavePorts.frame(&pw, ""), b"WPpass    \r".to_vec());
        assert_eq!(
            Command::SetPorts.frame(&pw, "FFFFFF00"),
            b"SPpass    FFFFFF00\r".to_vec()
        );
    }

    #[test]
    fn test_password_padding() {
        let pw = Password::new("abc").unwrap();
        assert_eq!(pw.field(), "abc     ");
        assert_eq!(pw.text(), "abc");
        assert_eq!(Password::new("12345678").unwrap().field(), "12345678");
    }

    #[test]
    fn test_password_rejects_bad_input() {
        assert!(Password::new("").is_err());
        assert!(Password::new("123456789").is_err());
        assert!(Password::new("pa ss").is_err());
        assert!(Password::new("päss").is_err());
    }
}
