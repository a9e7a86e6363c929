//! Gateway event loop
//!
//! A single task owns the interpreter, the shift state and the dispatcher.
//! It alternates between interpreting incoming MIDI events and ticking the
//! dispatcher on a fixed period, so no state is shared across threads.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ConfigWatcher, Overrides};
use crate::control_mapping::ControlKind;
use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::drivers::ServiceDriver;
use crate::entities::EntityBindings;
use crate::interpreter::{Interpreter, ShiftState};
use crate::midi::{RawEvent, PRESSED};

/// Source of the throttle clock in microseconds
pub type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Monotonic microseconds since the clock was created
pub fn monotonic_clock() -> Clock {
    let anchor = Instant::now();
    Box::new(move || anchor.elapsed().as_micros() as i64)
}

pub struct Gateway {
    interpreter: Interpreter,
    dispatcher: Dispatcher,
    shift: ShiftState,
    tick_interval: Duration,
    clock: Clock,
    /// Effective configuration, used to detect settings that need a restart
    config: AppConfig,
    overrides: Overrides,
    /// Log every interpreted control at info level (monitor mode)
    log_events: bool,
}

impl Gateway {
    /// Build a gateway from an effective (already overridden) configuration
    pub fn from_config(config: AppConfig, driver: Arc<dyn ServiceDriver>) -> Self {
        let interpreter = Interpreter::new(EntityBindings::from_config(&config.entities));
        let dispatcher = Dispatcher::new(driver, config.throttle.min_interval_us);

        Self {
            interpreter,
            dispatcher,
            shift: ShiftState::default(),
            tick_interval: config.throttle.tick_interval(),
            clock: monotonic_clock(),
            config,
            overrides: Overrides::default(),
            log_events: false,
        }
    }

    /// Re-apply these command-line overrides to reloaded configs
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_log(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    pub fn shift(&self) -> ShiftState {
        self.shift
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn bindings(&self) -> &EntityBindings {
        self.interpreter.bindings()
    }

    /// Interpret one event and queue the resulting command, if any
    ///
    /// Returns whether a command was submitted.
    pub fn on_event(&mut self, event: &RawEvent) -> bool {
        debug!("Received MIDI event: {}", event);
        if self.log_events {
            self.log_control(event);
        }

        match self.interpreter.interpret(event, &mut self.shift) {
            Some(command) => {
                debug!("Queued {}", command);
                self.dispatcher.submit(command);
                true
            }
            None => false,
        }
    }

    /// Let the dispatcher send the pending command if the window allows
    pub async fn on_tick(&mut self) -> TickOutcome {
        let now = (self.clock)();
        self.dispatcher.tick(now).await
    }

    /// Swap in a reloaded configuration
    ///
    /// Entity bindings take effect immediately; shift and throttle state are
    /// kept. Device and throttle changes need a restart.
    pub fn apply_config(&mut self, mut new_config: AppConfig) {
        self.overrides.apply(&mut new_config);

        if new_config.midi.device != self.config.midi.device {
            warn!(
                "MIDI device changed to '{}'; restart to switch devices",
                new_config.midi.device
            );
        }
        if new_config.throttle != self.config.throttle {
            warn!("Throttle settings changed; restart to apply them");
        }
        if new_config.home_assistant != self.config.home_assistant {
            warn!("Home Assistant settings changed; restart to apply them");
        }

        self.interpreter
            .set_bindings(EntityBindings::from_config(&new_config.entities));
        self.config = new_config;
        info!("✅ Entity bindings reloaded");
    }

    /// One line per control that currently produces a service call
    pub fn binding_summary(&self) -> Vec<String> {
        let bindings = self.interpreter.bindings();

        self.interpreter
            .layout()
            .mapped()
            .filter_map(|(cc, control)| {
                let targets = match (control.kind, control.channel) {
                    (ControlKind::Fader | ControlKind::Pot | ControlKind::Mute, Some(channel)) => {
                        let unshifted = bindings.resolve(channel, false);
                        let shifted = bindings.resolve(channel, true);
                        if unshifted.is_none() && shifted.is_none() {
                            return None;
                        }
                        format!(
                            "{} / {}",
                            unshifted.unwrap_or("-"),
                            shifted.unwrap_or("-")
                        )
                    }
                    (ControlKind::Play, _) => bindings.play_toggle()?.to_string(),
                    _ => return None,
                };
                Some(format!("cc {:>2} {:<8} → {}", cc, control.to_string(), targets))
            })
            .collect()
    }

    fn log_control(&self, event: &RawEvent) {
        match self.interpreter.describe(event) {
            Some(control) if control.kind.is_button() => {
                let edge = if event.data2 == PRESSED { "press" } else { "release" };
                info!("{} ({}) - {}", control, event.data2, edge);
            }
            Some(control) => info!("{}: {}", control, event.data2),
            None => info!("Ignored {}", event),
        }
    }

    /// Run until shutdown or until the input channel closes
    ///
    /// In-flight service calls are awaited inline; events that arrive in the
    /// meantime wait in the channel and are coalesced afterwards.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RawEvent>,
        mut reloads: Option<ConfigWatcher>,
        shutdown: impl Future<Output = ()>,
    ) {
        info!(
            "Ready to process MIDI events (throttle {}µs, tick {:?})",
            self.dispatcher.min_interval_us(),
            self.tick_interval
        );

        if self.log_events {
            let summary = self.binding_summary();
            if summary.is_empty() {
                warn!("No controls are bound to an entity");
            }
            for line in summary {
                info!("{}", line);
            }
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        self.on_event(&event);
                    }
                    None => {
                        warn!("MIDI input closed, stopping event loop");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    self.on_tick().await;
                }

                Some(new_config) = next_reload(&mut reloads) => {
                    info!("📝 Configuration file changed, reloading...");
                    self.apply_config(new_config);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping event loop");
                    break;
                }
            }
        }

        if let Some(command) = self.dispatcher.pending() {
            debug!("Discarding unsent {}", command);
        }
    }
}

async fn next_reload(reloads: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match reloads {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}
