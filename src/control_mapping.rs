//! Control layout for the Korg nanoKONTROL2 in CC mode
//!
//! Maps every controller number to the physical control that sends it. The
//! table is data, built once at compile time, and total over all controller
//! numbers: anything the surface does not send resolves to `Unknown`.

use std::fmt;

/// Number of channel strips on the surface
pub const CHANNEL_COUNT: u8 = 8;

/// Kind of physical control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Fader,
    Pot,
    Solo,
    Mute,
    Play,
    Stop,
    Rewind,
    FastForward,
    Record,
    Cycle,
    TrackLeft,
    TrackRight,
    MarkerSet,
    MarkerLeft,
    MarkerRight,
    Unknown,
}

impl ControlKind {
    /// Stable name used in logs and monitor output
    pub fn name(&self) -> &'static str {
        match self {
            ControlKind::Fader => "fader",
            ControlKind::Pot => "pot",
            ControlKind::Solo => "solo",
            ControlKind::Mute => "mute",
            ControlKind::Play => "play",
            ControlKind::Stop => "stop",
            ControlKind::Rewind => "rewind",
            ControlKind::FastForward => "fast-forward",
            ControlKind::Record => "record",
            ControlKind::Cycle => "cycle",
            ControlKind::TrackLeft => "track-left",
            ControlKind::TrackRight => "track-right",
            ControlKind::MarkerSet => "marker-set",
            ControlKind::MarkerLeft => "marker-left",
            ControlKind::MarkerRight => "marker-right",
            ControlKind::Unknown => "unknown",
        }
    }

    /// Buttons report 127 on press and 0 on release; faders and pots are continuous
    pub fn is_button(&self) -> bool {
        !matches!(
            self,
            ControlKind::Fader | ControlKind::Pot | ControlKind::Unknown
        )
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A physical control and the channel strip it belongs to
///
/// `channel` is 1-based and absent for transport and navigation controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlDescriptor {
    pub kind: ControlKind,
    pub channel: Option<u8>,
}

impl ControlDescriptor {
    pub const UNKNOWN: Self = Self::global(ControlKind::Unknown);

    const fn strip(kind: ControlKind, channel: u8) -> Self {
        Self {
            kind,
            channel: Some(channel),
        }
    }

    const fn global(kind: ControlKind) -> Self {
        Self {
            kind,
            channel: None,
        }
    }
}

impl fmt::Display for ControlDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(channel) => write!(f, "{} {}", self.kind, channel),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Controller number → control table
#[derive(Debug, Clone)]
pub struct ControlLayout {
    table: [ControlDescriptor; 128],
}

/// Factory layout of the nanoKONTROL2
pub static NANO_KONTROL2: ControlLayout = ControlLayout::nano_kontrol2();

impl ControlLayout {
    /// Build the nanoKONTROL2 factory CC layout
    pub const fn nano_kontrol2() -> Self {
        let mut table = [ControlDescriptor::UNKNOWN; 128];

        // Channel strips: (first controller number, kind)
        let strips = [
            (0, ControlKind::Fader),
            (16, ControlKind::Pot),
            (32, ControlKind::Solo),
            (48, ControlKind::Mute),
            (64, ControlKind::Record),
        ];
        let mut s = 0;
        while s < strips.len() {
            let (base, kind) = strips[s];
            let mut i = 0;
            while i < CHANNEL_COUNT {
                table[base + i as usize] = ControlDescriptor::strip(kind, i + 1);
                i += 1;
            }
            s += 1;
        }

        let globals = [
            (41, ControlKind::Play),
            (42, ControlKind::Stop),
            (43, ControlKind::Rewind),
            (44, ControlKind::FastForward),
            (45, ControlKind::Record),
            (46, ControlKind::Cycle),
            (58, ControlKind::TrackLeft),
            (59, ControlKind::TrackRight),
            (60, ControlKind::MarkerSet),
            (61, ControlKind::MarkerLeft),
            (62, ControlKind::MarkerRight),
        ];
        let mut g = 0;
        while g < globals.len() {
            let (cc, kind) = globals[g];
            table[cc] = ControlDescriptor::global(kind);
            g += 1;
        }

        Self { table }
    }

    /// Resolve a controller number; numbers outside 0-127 are `Unknown`
    pub fn lookup(&self, controller: u8) -> ControlDescriptor {
        self.table
            .get(controller as usize)
            .copied()
            .unwrap_or(ControlDescriptor::UNKNOWN)
    }

    /// Iterate over all mapped controls as (controller number, descriptor)
    pub fn mapped(&self) -> impl Iterator<Item = (u8, ControlDescriptor)> + '_ {
        self.table
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind != ControlKind::Unknown)
            .map(|(cc, d)| (cc as u8, *d))
    }
}

impl Default for ControlLayout {
    fn default() -> Self {
        Self::nano_kontrol2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_strip(base: u8, kind: ControlKind) {
        for i in 0..CHANNEL_COUNT {
            assert_eq!(
                NANO_KONTROL2.lookup(base + i),
                ControlDescriptor {
                    kind,
                    channel: Some(i + 1)
                },
                "controller {}",
                base + i
            );
        }
    }

    #[test]
    fn test_channel_strips() {
        assert_strip(0, ControlKind::Fader);
        assert_strip(16, ControlKind::Pot);
        assert_strip(32, ControlKind::Solo);
        assert_strip(48, ControlKind::Mute);
        assert_strip(64, ControlKind::Record);
    }

    #[test]
    fn test_transport_controls_have_no_channel() {
        let expected = [
            (41, ControlKind::Play),
            (42, ControlKind::Stop),
            (43, ControlKind::Rewind),
            (44, ControlKind::FastForward),
            (45, ControlKind::Record),
            (46, ControlKind::Cycle),
            (58, ControlKind::TrackLeft),
            (59, ControlKind::TrackRight),
            (60, ControlKind::MarkerSet),
            (61, ControlKind::MarkerLeft),
            (62, ControlKind::MarkerRight),
        ];

        for (cc, kind) in expected {
            let descriptor = NANO_KONTROL2.lookup(cc);
            assert_eq!(descriptor.kind, kind, "controller {}", cc);
            assert_eq!(descriptor.channel, None, "controller {}", cc);
        }
    }

    #[test]
    fn test_gaps_are_unknown() {
        for cc in [8, 15, 24, 31, 40, 47, 56, 57, 63, 72, 100, 127] {
            assert_eq!(NANO_KONTROL2.lookup(cc), ControlDescriptor::UNKNOWN);
        }
    }

    #[test]
    fn test_mapped_count() {
        // 5 strips of 8 plus 11 global buttons
        assert_eq!(NANO_KONTROL2.mapped().count(), 51);
    }

    #[test]
    fn test_names() {
        assert_eq!(ControlKind::FastForward.to_string(), "fast-forward");
        assert_eq!(NANO_KONTROL2.lookup(2).to_string(), "fader 3");
        assert_eq!(NANO_KONTROL2.lookup(46).to_string(), "cycle");
        assert!(ControlKind::Mute.is_button());
        assert!(!ControlKind::Fader.is_button());
    }

    proptest! {
        #[test]
        fn lookup_is_total_and_deterministic(cc in any::<u8>()) {
            let first = NANO_KONTROL2.lookup(cc);
            prop_assert_eq!(first, NANO_KONTROL2.lookup(cc));
            if cc > 127 {
                prop_assert_eq!(first, ControlDescriptor::UNKNOWN);
            }
            if let Some(channel) = first.channel {
                prop_assert!((1..=CHANNEL_COUNT).contains(&channel));
            }
        }
    }
}
