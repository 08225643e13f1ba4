#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;

pub mod db;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod packet;
pub mod tcp;
pub mod uptime;

#[cfg(feature = "display")]
mod display;
#[cfg(feature = "impersonate")]
pub mod impersonate;
#[cfg(feature = "parse")]
mod parse;

pub use crate::error::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub ty: Type,
    /// OS class (e.g. `win`, `unix`); `None` for user applications (`!`).
    pub class: Option<String>,
    pub name: String,
    pub flavor: Option<String>,
    /// Systems a user application applies to, from the `sys` directive.
    pub sys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Specified,
    Generic,
}

impl Label {
    /// Userland tools are labeled with the `!` class; fuzzy matching is
    /// never applied to them.
    pub fn is_user_app(&self) -> bool {
        self.class.is_none()
    }
}

/// Direction of the observed traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// SYN, or a GET/HEAD request line.
    ClientToServer,
    /// SYN+ACK, or an `HTTP/1.x` status line.
    ServerToClient,
}

/// Tunables for matching and uptime estimation.
#[derive(Clone, Debug)]
pub struct Options {
    /// Maximum TTL distance for non-fuzzy signature matching.
    pub max_dist: u8,
    /// Minimum wait between timestamp samples (ms).
    pub min_timestamp_wait: i64,
    /// Maximum wait between timestamp samples (ms).
    pub max_timestamp_wait: i64,
    /// Window in which slightly out-of-order timestamps are tolerated (ms).
    pub timestamp_grace: i64,
    /// Minimum believable timestamp clock frequency (Hz).
    pub min_timestamp_scale: f64,
    /// Maximum believable timestamp clock frequency (Hz).
    pub max_timestamp_scale: f64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_dist: 35,
            min_timestamp_wait: 25,
            max_timestamp_wait: 10 * 60 * 1000,
            timestamp_grace: 100,
            min_timestamp_scale: 0.7,
            max_timestamp_scale: 1500.0,
        }
    }
}
