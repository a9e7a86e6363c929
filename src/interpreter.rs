//! Event interpretation
//!
//! Turns one raw MIDI event into at most one Home Assistant service call,
//! tracking the momentary shift modifier held on the Cycle button.

use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

use crate::control_mapping::{ControlDescriptor, ControlKind, ControlLayout, NANO_KONTROL2};
use crate::entities::EntityBindings;
use crate::midi::{RawEvent, PRESSED};

/// Lower bound of the colour temperature range (Kelvin)
pub const KELVIN_MIN: u16 = 2000;

/// Upper bound of the colour temperature range (Kelvin)
pub const KELVIN_MAX: u16 = 6493;

/// State of the shift modifier (Cycle button held)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftState {
    held: bool,
}

impl ShiftState {
    pub fn is_held(&self) -> bool {
        self.held
    }

    fn set(&mut self, held: bool) {
        self.held = held;
    }
}

/// A service call waiting to be dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Service path relative to `/api/services/`, e.g. `light/turn_on`
    pub endpoint: String,
    pub body: Value,
}

impl Command {
    pub fn new(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            body,
        }
    }

    pub fn brightness(entity_id: &str, brightness_pct: u8) -> Self {
        Self::new(
            "light/turn_on",
            json!({ "entity_id": entity_id, "brightness_pct": brightness_pct }),
        )
    }

    pub fn color_temperature(entity_id: &str, kelvin: u16) -> Self {
        Self::new(
            "light/turn_on",
            json!({ "entity_id": entity_id, "kelvin": kelvin }),
        )
    }

    pub fn turn_off(entity_id: &str) -> Self {
        Self::new("light/turn_off", json!({ "entity_id": entity_id }))
    }

    pub fn toggle_switch(entity_id: &str) -> Self {
        Self::new("switch/toggle", json!({ "entity_id": entity_id }))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.endpoint, self.body)
    }
}

/// Map a 7-bit controller value to a brightness percentage (0-100)
pub fn brightness_pct(value: u8) -> u8 {
    (fraction(value) * 100.0).round() as u8
}

/// Map a 7-bit controller value onto the colour temperature range
pub fn kelvin(value: u8) -> u16 {
    let span = (KELVIN_MAX - KELVIN_MIN) as f64;
    (KELVIN_MIN as f64 + fraction(value) * span).round() as u16
}

fn fraction(value: u8) -> f64 {
    value.min(127) as f64 / 127.0
}

/// Stateless mapping from events to commands; the shift state is passed in
#[derive(Debug, Clone)]
pub struct Interpreter {
    layout: &'static ControlLayout,
    bindings: EntityBindings,
}

impl Interpreter {
    pub fn new(bindings: EntityBindings) -> Self {
        Self::with_layout(&NANO_KONTROL2, bindings)
    }

    pub fn with_layout(layout: &'static ControlLayout, bindings: EntityBindings) -> Self {
        Self { layout, bindings }
    }

    pub fn layout(&self) -> &'static ControlLayout {
        self.layout
    }

    pub fn bindings(&self) -> &EntityBindings {
        &self.bindings
    }

    /// Swap the entity bindings, e.g. after a config reload
    pub fn set_bindings(&mut self, bindings: EntityBindings) {
        self.bindings = bindings;
    }

    /// Resolve the control an event refers to, or None for non-CC events
    pub fn describe(&self, event: &RawEvent) -> Option<ControlDescriptor> {
        event
            .is_control_change()
            .then(|| self.layout.lookup(event.data1))
    }

    /// Interpret one event
    ///
    /// Only Control Change messages are considered. The Cycle button updates
    /// `shift` and never produces a command. Buttons act on release; a value
    /// of 127 is a press.
    pub fn interpret(&self, event: &RawEvent, shift: &mut ShiftState) -> Option<Command> {
        let control = self.describe(event)?;
        let value = event.data2;
        let pressed = value == PRESSED;

        match control.kind {
            ControlKind::Fader => {
                let entity = self.entity_for(&control, shift)?;
                Some(Command::brightness(entity, brightness_pct(value)))
            }
            ControlKind::Pot => {
                let entity = self.entity_for(&control, shift)?;
                Some(Command::color_temperature(entity, kelvin(value)))
            }
            ControlKind::Mute if !pressed => {
                let entity = self.entity_for(&control, shift)?;
                Some(Command::turn_off(entity))
            }
            ControlKind::Play if !pressed => {
                let entity = self.bindings.play_toggle()?;
                Some(Command::toggle_switch(entity))
            }
            ControlKind::Cycle => {
                shift.set(pressed);
                debug!(shift = pressed, "Shift modifier changed");
                None
            }
            _ => None,
        }
    }

    fn entity_for(&self, control: &ControlDescriptor, shift: &ShiftState) -> Option<&str> {
        let channel = control.channel?;
        let entity = self.bindings.resolve(channel, shift.is_held());
        if entity.is_none() {
            debug!(control = %control, shift = shift.is_held(), "No entity bound, ignoring");
        }
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DESK: &str = "light.desk";
    const SHELF: &str = "light.shelf";
    const FAN: &str = "switch.fan";

    fn interpreter() -> Interpreter {
        let mut bindings = EntityBindings::default().with_play_toggle(FAN);
        bindings.bind(1, false, DESK);
        bindings.bind(1, true, SHELF);
        Interpreter::new(bindings)
    }

    fn cc(controller: u8, value: u8) -> RawEvent {
        RawEvent::control_change(0, controller, value)
    }

    #[test]
    fn test_fader_endpoints() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        assert_eq!(
            interp.interpret(&cc(0, 0), &mut shift),
            Some(Command::brightness(DESK, 0))
        );
        assert_eq!(
            interp.interpret(&cc(0, 127), &mut shift),
            Some(Command::brightness(DESK, 100))
        );
    }

    #[test]
    fn test_fader_midpoint_payload() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        let command = interp
            .interpret(&RawEvent::new(0xB0, 0, 64), &mut shift)
            .unwrap();

        assert_eq!(command.endpoint, "light/turn_on");
        assert_eq!(
            command.body,
            json!({ "entity_id": DESK, "brightness_pct": 50 })
        );
    }

    #[test]
    fn test_pot_endpoints() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        let low = interp.interpret(&cc(16, 0), &mut shift).unwrap();
        let high = interp.interpret(&cc(16, 127), &mut shift).unwrap();

        assert_eq!(low.body, json!({ "entity_id": DESK, "kelvin": 2000 }));
        assert_eq!(high.body, json!({ "entity_id": DESK, "kelvin": 6493 }));
        assert_eq!(high.endpoint, "light/turn_on");
    }

    #[test]
    fn test_mute_acts_on_release_only() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        assert_eq!(interp.interpret(&cc(48, 127), &mut shift), None);

        let command = interp.interpret(&cc(48, 0), &mut shift).unwrap();
        assert_eq!(command.endpoint, "light/turn_off");
        assert_eq!(command.body, json!({ "entity_id": DESK }));
    }

    #[test]
    fn test_play_toggles_switch_on_release() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        assert_eq!(interp.interpret(&cc(41, 127), &mut shift), None);
        assert_eq!(
            interp.interpret(&cc(41, 0), &mut shift),
            Some(Command::toggle_switch(FAN))
        );
    }

    #[test]
    fn test_play_without_toggle_target_is_suppressed() {
        let interp = Interpreter::new(EntityBindings::default());
        let mut shift = ShiftState::default();

        assert_eq!(interp.interpret(&cc(41, 0), &mut shift), None);
    }

    #[test]
    fn test_cycle_switches_bank() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        assert_eq!(interp.interpret(&cc(46, 127), &mut shift), None);
        assert!(shift.is_held());
        assert_eq!(
            interp.interpret(&cc(0, 127), &mut shift),
            Some(Command::brightness(SHELF, 100))
        );

        assert_eq!(interp.interpret(&cc(46, 0), &mut shift), None);
        assert!(!shift.is_held());
        assert_eq!(
            interp.interpret(&cc(0, 127), &mut shift),
            Some(Command::brightness(DESK, 100))
        );
    }

    #[test]
    fn test_any_non_127_cycle_value_releases_shift() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        interp.interpret(&cc(46, 127), &mut shift);
        interp.interpret(&cc(46, 64), &mut shift);
        assert!(!shift.is_held());
    }

    #[test]
    fn test_unbound_channel_is_suppressed() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        assert_eq!(interp.interpret(&cc(1, 100), &mut shift), None);
        assert_eq!(interp.interpret(&cc(17, 100), &mut shift), None);
        assert_eq!(interp.interpret(&cc(49, 0), &mut shift), None);
    }

    #[test]
    fn test_reserved_controls_do_nothing() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        for controller in [32, 42, 43, 44, 45, 58, 59, 60, 61, 62, 64, 100] {
            for value in [0, 127] {
                assert_eq!(interp.interpret(&cc(controller, value), &mut shift), None);
            }
        }
        assert_eq!(shift, ShiftState::default());
    }

    #[test]
    fn test_non_control_change_is_ignored() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        // Note On / Pitch Bend carrying the Cycle and Fader numbers
        assert_eq!(interp.interpret(&RawEvent::new(0x90, 46, 127), &mut shift), None);
        assert_eq!(interp.interpret(&RawEvent::new(0xE0, 0, 64), &mut shift), None);
        assert!(!shift.is_held());
    }

    #[test]
    fn test_control_change_on_any_channel_is_accepted() {
        let interp = interpreter();
        let mut shift = ShiftState::default();

        assert_eq!(
            interp.interpret(&RawEvent::new(0xB5, 0, 127), &mut shift),
            Some(Command::brightness(DESK, 100))
        );
    }

    #[test]
    fn test_bindings_can_be_replaced() {
        let mut interp = interpreter();
        let mut shift = ShiftState::default();

        let mut bindings = EntityBindings::default();
        bindings.bind(1, false, "light.porch");
        interp.set_bindings(bindings);

        assert_eq!(
            interp.interpret(&cc(48, 0), &mut shift),
            Some(Command::turn_off("light.porch"))
        );
    }

    proptest! {
        #[test]
        fn brightness_is_monotonic_and_bounded(a in 0u8..=127, b in 0u8..=127) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(brightness_pct(lo) <= brightness_pct(hi));
            prop_assert!(brightness_pct(hi) <= 100);
        }

        #[test]
        fn kelvin_is_monotonic_and_bounded(a in 0u8..=127, b in 0u8..=127) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(kelvin(lo) <= kelvin(hi));
            prop_assert!((KELVIN_MIN..=KELVIN_MAX).contains(&kelvin(lo)));
            prop_assert!((KELVIN_MIN..=KELVIN_MAX).contains(&kelvin(hi)));
        }
    }
}
