//! MIDI utilities and the raw event type
//!
//! The bridge only understands three-byte channel messages. Everything is kept
//! as raw bytes until the interpreter decides what a message means.

use std::fmt;

/// Mask selecting the message type from a status byte
pub const STATUS_TYPE_MASK: u8 = 0xF0;

/// Mask selecting the MIDI channel from a status byte
pub const STATUS_CHANNEL_MASK: u8 = 0x0F;

/// Control Change message type
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Controller value reported by the surface while a button is held down
pub const PRESSED: u8 = 127;

/// Raw MIDI event as delivered by the input port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl RawEvent {
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    /// Build a Control Change event on a 0-based channel
    pub const fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(
            CONTROL_CHANGE | (channel & STATUS_CHANNEL_MASK),
            controller & 0x7F,
            value & 0x7F,
        )
    }

    /// Parse a raw event from the bytes handed over by the MIDI backend
    ///
    /// System messages (0xF0 and above) and running-status data bytes are
    /// rejected. Missing data bytes on short channel messages read as zero.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        // Running status and system messages are not supported
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        Some(Self {
            status,
            data1: data.get(1).copied().unwrap_or(0) & 0x7F,
            data2: data.get(2).copied().unwrap_or(0) & 0x7F,
        })
    }

    /// Message type nibble (0x80, 0x90, ..., 0xE0)
    pub fn message_type(&self) -> u8 {
        self.status & STATUS_TYPE_MASK
    }

    /// MIDI channel (0-15)
    pub fn channel(&self) -> u8 {
        self.status & STATUS_CHANNEL_MASK
    }

    pub fn is_control_change(&self) -> bool {
        self.message_type() == CONTROL_CHANGE
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message_type() {
            0x80 => write!(f, "NoteOff ch:{} n:{} v:{}", self.channel() + 1, self.data1, self.data2),
            0x90 => write!(f, "NoteOn ch:{} n:{} v:{}", self.channel() + 1, self.data1, self.data2),
            CONTROL_CHANGE => write!(f, "CC ch:{} cc:{} v:{}", self.channel() + 1, self.data1, self.data2),
            0xC0 => write!(f, "ProgramChange ch:{} p:{}", self.channel() + 1, self.data1),
            0xE0 => {
                let value = ((self.data2 as u16) << 7) | self.data1 as u16;
                write!(f, "PitchBend ch:{} v:{}", self.channel() + 1, value)
            }
            _ => write!(f, "{}", format_hex(&self.to_bytes())),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change_parsing() {
        let event = RawEvent::parse(&[0xB2, 7, 100]).unwrap();

        assert_eq!(event, RawEvent::new(0xB2, 7, 100));
        assert!(event.is_control_change());
        assert_eq!(event.channel(), 2);
    }

    #[test]
    fn test_note_on_is_not_control_change() {
        let event = RawEvent::parse(&[0x90, 60, 100]).unwrap();

        assert_eq!(event.message_type(), 0x90);
        assert!(!event.is_control_change());
    }

    #[test]
    fn test_rejects_system_and_running_status() {
        assert_eq!(RawEvent::parse(&[]), None);
        assert_eq!(RawEvent::parse(&[0xF8]), None);
        assert_eq!(RawEvent::parse(&[0xF0, 0x00, 0xF7]), None);
        assert_eq!(RawEvent::parse(&[0x40, 0x7F]), None);
    }

    #[test]
    fn test_short_message_pads_with_zero() {
        let event = RawEvent::parse(&[0xC0, 5]).unwrap();
        assert_eq!(event, RawEvent::new(0xC0, 5, 0));
    }

    #[test]
    fn test_control_change_constructor_masks_fields() {
        let event = RawEvent::control_change(0x1F, 0x80, 0xFF);
        assert_eq!(event.to_bytes(), [0xBF, 0x00, 0x7F]);
    }

    #[test]
    fn test_display() {
        assert_eq!(RawEvent::new(0xB0, 0, 64).to_string(), "CC ch:1 cc:0 v:64");
        assert_eq!(RawEvent::new(0xE0, 0x00, 0x40).to_string(), "PitchBend ch:1 v:8192");
        assert_eq!(format_hex(&[0xB0, 0x2E, 0x7F]), "B0 2E 7F");
    }
}
