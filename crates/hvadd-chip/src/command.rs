// SPDX-License-Identifier: AGPL-3.0-only

//! Command register codes.
//!
//! The command register multiplexes every operation onto one
//! request/response cycle. The peripheral starts a command on the transition
//! out of `Wait`; the host must write `Wait` back once it has consumed the
//! result so the next command starts from idle.

/// Operation selected through the command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum Command {
    /// Idle. Also the reset value.
    #[default]
    Wait = 0,
    /// Load `data-read` from the word at `address`.
    Read = 1,
    /// Store `data-write` into the word at `address`.
    Write = 2,
    /// Element-wise add of vectors A and B into R.
    Add = 3,
}

impl Command {
    /// Raw register value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode a raw command register value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Wait),
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::Add),
            _ => None,
        }
    }

    /// `true` for every command except `Wait`.
    #[must_use]
    pub const fn is_operation(self) -> bool {
        !matches!(self, Self::Wait)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wait => write!(f, "wait"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Add => write!(f, "add"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_hardware() {
        assert_eq!(Command::Wait.bits(), 0);
        assert_eq!(Command::Read.bits(), 1);
        assert_eq!(Command::Write.bits(), 2);
        assert_eq!(Command::Add.bits(), 3);
    }

    #[test]
    fn decode_rejects_unknown_codes() {
        assert_eq!(Command::from_bits(3), Some(Command::Add));
        assert_eq!(Command::from_bits(4), None);
        assert_eq!(Command::from_bits(u32::MAX), None);
    }

    #[test]
    fn reset_value_is_idle() {
        assert_eq!(Command::default(), Command::Wait);
        assert!(!Command::Wait.is_operation());
        assert!(Command::Add.is_operation());
    }
}
