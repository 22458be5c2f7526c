//! # Workload Generation
//!
//! Purpose: Turn uniform random draws into the benchmark's command stream:
//! which command to send, which key it targets, and what value SET writes.
//!
//! ## Design Principles
//! 1. **Cumulative Thresholds**: One `f64` draw selects the command; the
//!    probability mass left over after the four ratios is PING.
//! 2. **Borrowed Arguments**: Keys are borrowed from the shared keyspace and
//!    the SET value buffer is reused, so generating a command never allocates.
//! 3. **Deterministic**: The generator is driven by a caller-seeded RNG.

use rand::Rng;
use serde::Serialize;

use crate::config::WorkerConfig;

/// Commands the load generator issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Set,
    Get,
    Del,
    Exists,
    Ping,
}

impl CommandKind {
    /// Wire name of the command.
    pub fn name(self) -> &'static [u8] {
        match self {
            CommandKind::Set => b"SET",
            CommandKind::Get => b"GET",
            CommandKind::Del => b"DEL",
            CommandKind::Exists => b"EXISTS",
            CommandKind::Ping => b"PING",
        }
    }
}

/// Selection probabilities for the keyed commands.
///
/// The four ratios must each lie in `[0, 1]` and sum to at most 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommandMix {
    pub set: f64,
    pub get: f64,
    pub del: f64,
    pub exists: f64,
}

impl CommandMix {
    /// Maps a draw `r` in `[0, 1)` onto a command.
    ///
    /// **Logic**: walk the cumulative thresholds SET, SET+GET, SET+GET+DEL,
    /// SET+GET+DEL+EXISTS; the first one strictly above `r` wins, otherwise
    /// PING.
    pub fn pick(&self, r: f64) -> CommandKind {
        let mut threshold = self.set;
        if r < threshold {
            return CommandKind::Set;
        }
        threshold += self.get;
        if r < threshold {
            return CommandKind::Get;
        }
        threshold += self.del;
        if r < threshold {
            return CommandKind::Del;
        }
        threshold += self.exists;
        if r < threshold {
            return CommandKind::Exists;
        }
        CommandKind::Ping
    }

    /// Sum of the four keyed ratios.
    pub fn total(&self) -> f64 {
        self.set + self.get + self.del + self.exists
    }
}

/// Per-worker command generator.
pub struct Workload<'a, R> {
    config: &'a WorkerConfig,
    rng: R,
    value: Vec<u8>,
}

impl<'a, R: Rng> Workload<'a, R> {
    pub fn new(config: &'a WorkerConfig, rng: R) -> Self {
        Workload {
            config,
            rng,
            value: vec![b'a'; config.value_len],
        }
    }

    /// Generates the next command and hands its arguments to `send`.
    ///
    /// The arguments only live for the duration of the callback.
    pub fn with_next<T>(&mut self, send: impl FnOnce(CommandKind, &[&[u8]]) -> T) -> T {
        let kind = self.config.mix.pick(self.rng.gen::<f64>());
        match kind {
            CommandKind::Ping => send(kind, &[kind.name()]),
            CommandKind::Set => {
                let key = self.pick_key();
                self.fill_value();
                send(kind, &[kind.name(), key, self.value.as_slice()])
            }
            CommandKind::Get | CommandKind::Del | CommandKind::Exists => {
                let key = self.pick_key();
                send(kind, &[kind.name(), key])
            }
        }
    }

    fn pick_key(&mut self) -> &'a [u8] {
        let config = self.config;
        let keyspace = &config.keyspace;
        keyspace[self.rng.gen_range(0..keyspace.len())].as_bytes()
    }

    fn fill_value(&mut self) {
        for byte in self.value.iter_mut() {
            *byte = self.rng.gen_range(b'a'..=b'z');
        }
    }
}
