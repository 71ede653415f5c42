use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Unified event type consumed by the app loop
#[derive(Clone, Debug)]
pub enum TimerEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError>;
}

/// Production event source: a reader thread forwarding crossterm events
pub struct CrosstermEventSource {
    rx: Receiver<TimerEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                // Windows reports releases too; only presses drive the timer
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    Some(TimerEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => Some(TimerEvent::Resize),
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(error = %e, "terminal event reader stopped");
                    break;
                }
            };

            if let Some(ev) = forwarded {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Event source fed from a channel, for tests and scripted input
pub struct ChannelEventSource {
    rx: Receiver<TimerEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<TimerEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the app one event at a time, yielding `Tick` on a fixed schedule.
///
/// The schedule is anchored to the previous tick rather than to the last
/// event, so a burst of key presses cannot starve the ticks.
pub struct Runner<E: EventSource> {
    event_source: E,
    interval: Duration,
    next_tick: Instant,
}

impl<E: EventSource> Runner<E> {
    pub fn new(event_source: E, interval: Duration) -> Self {
        Self {
            event_source,
            interval,
            next_tick: Instant::now() + interval,
        }
    }

    /// Blocks until the next event or the next tick, whichever comes first
    pub fn step(&mut self) -> TimerEvent {
        let now = Instant::now();
        if now >= self.next_tick {
            return self.tick(now);
        }

        match self.event_source.recv_timeout(self.next_tick - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.tick(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => {
                // nothing more will arrive; keep ticking on schedule
                std::thread::sleep(self.next_tick.saturating_duration_since(Instant::now()));
                self.tick(Instant::now())
            }
        }
    }

    fn tick(&mut self, now: Instant) -> TimerEvent {
        self.next_tick += self.interval;
        if self.next_tick <= now {
            // fell behind (suspended terminal, slow draw): skip the missed ticks
            self.next_tick = now + self.interval;
        }
        TimerEvent::Tick
    }
}
