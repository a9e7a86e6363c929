//! MIDI control surface input
//!
//! Opens the input port of the control surface and forwards every parsed
//! message into a bounded channel. The midir callback never blocks: when the
//! channel is full the event is dropped, which the coalescing dispatcher
//! tolerates.

use anyhow::{anyhow, Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::midi::{format_hex, RawEvent};

/// Capacity of the event channel between the MIDI thread and the gateway
pub const EVENT_BUFFER: usize = 512;

const CLIENT_NAME: &str = "m2ha";

/// Connected control surface
pub struct MidiSurface {
    /// Kept alive for as long as events should flow
    _input_conn: MidiInputConnection<()>,
    event_rx: Option<mpsc::Receiver<RawEvent>>,
    port_name: String,
}

impl MidiSurface {
    /// Open the input port matching `device`
    pub fn connect(device: &str) -> Result<Self> {
        let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (port, port_name) = discovery::find_input_port(&midi_in, device).ok_or_else(|| {
            let available = discovery::discover_input_ports()
                .map(|ports| {
                    ports
                        .into_iter()
                        .map(|p| format!("'{}'", p.name))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            anyhow!(
                "Could not find device '{}' (available inputs: {})",
                device,
                if available.is_empty() { "none" } else { available.as_str() }
            )
        })?;

        info!("Connecting to input port: {}", port_name);

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let input_conn = midi_in
            .connect(
                &port,
                "m2ha-input",
                move |_timestamp, data, _| match RawEvent::parse(data) {
                    Some(event) => {
                        if let Err(e) = event_tx.try_send(event) {
                            warn!("Dropping MIDI event {}: {}", event, e);
                        }
                    }
                    None => debug!("Ignoring MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", port_name, e))?;

        info!("Midi device opened: {}", port_name);

        Ok(Self {
            _input_conn: input_conn,
            event_rx: Some(event_rx),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Take the event receiver (for the gateway to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<RawEvent>> {
        self.event_rx.take()
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;
    use colored::*;

    /// Information about a MIDI input port
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
    }

    /// Discover input ports
    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new("m2ha-discovery")?;

        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in
                    .port_name(port)
                    .ok()
                    .map(|name| PortInfo { index, name })
            })
            .collect())
    }

    /// Pick the best matching name: exact first, then case-insensitive substring
    pub fn match_port_name<'a>(
        names: impl IntoIterator<Item = &'a str> + Clone,
        pattern: &str,
    ) -> Option<usize> {
        if let Some(i) = names.clone().into_iter().position(|n| n == pattern) {
            return Some(i);
        }
        let pattern = pattern.to_lowercase();
        names
            .into_iter()
            .position(|n| n.to_lowercase().contains(&pattern))
    }

    /// Find an input port by name
    pub fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(MidiInputPort, String)> {
        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();

        let index = match_port_name(names.iter().map(String::as_str), pattern)?;
        debug!("Found port '{}' matching '{}'", names[index], pattern);
        Some((ports[index].clone(), names[index].clone()))
    }

    /// Print input ports, marking the one `device` would select
    pub fn print_ports(device: &str) -> Result<()> {
        let ports = discover_input_ports()?;
        let selected = match_port_name(ports.iter().map(|p| p.name.as_str()), device);

        println!("\n{}", "MIDI input devices:".bold().cyan());
        if ports.is_empty() {
            println!("  {}", "No input ports found".dimmed());
        }
        for (i, port) in ports.iter().enumerate() {
            let line = format!("  {}) '{}'", port.index, port.name);
            if Some(i) == selected {
                println!("{} {}", line.green(), "[selected]".bright_green());
            } else {
                println!("{}", line);
            }
        }
        if selected.is_none() {
            println!(
                "\n{} '{}'",
                "Configured device not present:".yellow(),
                device
            );
        }
        println!();
        Ok(())
    }

}
