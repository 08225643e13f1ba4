use crate::{http, tcp, Direction, Label, Type};

#[cfg(feature = "parse")]
use std::fs;
#[cfg(feature = "parse")]
use std::path::Path;

#[cfg(feature = "parse")]
use crate::error::Error;

/// A database entry: one signature with its label and provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<S> {
    pub label: Label,
    pub signature: S,
    /// Raw signature text, as it appears in the database file.
    pub raw: String,
    /// 1-based line number the signature was declared on.
    pub line: usize,
}

impl<S> Record<S> {
    pub fn is_generic(&self) -> bool {
        self.label.ty == Type::Generic
    }
}

pub type TcpRecord = Record<tcp::Signature>;
pub type HttpRecord = Record<http::Signature>;

/// An MTU entry; MTU labels are a plain name.
#[derive(Clone, Debug, PartialEq)]
pub struct MtuRecord {
    pub label: String,
    pub mtu: u16,
    pub raw: String,
    pub line: usize,
}

/// The compiled signature database. Built once by the parser, read-only
/// afterwards; buckets preserve file declaration order, which the
/// matchers rely on for tie-breaks.
#[derive(Debug)]
pub struct Database {
    pub classes: Vec<String>,
    pub ua_os: Vec<(String, Option<String>)>,
    pub mtu: Vec<MtuRecord>,
    pub tcp_request: Vec<TcpRecord>,
    pub tcp_response: Vec<TcpRecord>,
    pub http_request: Vec<HttpRecord>,
    pub http_response: Vec<HttpRecord>,
}

impl Database {
    /// Load and compile a database file (`p0f.fp`).
    #[cfg(feature = "parse")]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        fs::read_to_string(path)?.parse()
    }

    pub fn tcp(&self, direction: Direction) -> &[TcpRecord] {
        match direction {
            Direction::ClientToServer => &self.tcp_request,
            Direction::ServerToClient => &self.tcp_response,
        }
    }

    pub fn http(&self, direction: Direction) -> &[HttpRecord] {
        match direction {
            Direction::ClientToServer => &self.http_request,
            Direction::ServerToClient => &self.http_response,
        }
    }
}

#[cfg(feature = "impersonate")]
mod random {
    use rand::seq::SliceRandom;
    use rand::Rng;

    use super::{Database, MtuRecord, TcpRecord};
    use crate::error::Error;
    use crate::Direction;

    impl Database {
        /// Uniformly sample a TCP record whose rendered label equals
        /// `label` (case sensitive).
        pub fn random_tcp<R: Rng>(
            &self,
            label: &str,
            direction: Direction,
            rng: &mut R,
        ) -> Result<&TcpRecord, Error> {
            let candidates: Vec<&TcpRecord> = self
                .tcp(direction)
                .iter()
                .filter(|record| record.label.to_string() == label)
                .collect();

            candidates
                .choose(rng)
                .copied()
                .ok_or_else(|| Error::database(format!("no matching record for {:?}", label)))
        }

        /// Uniformly sample an MTU record by label name.
        pub fn random_mtu<R: Rng>(&self, label: &str, rng: &mut R) -> Result<&MtuRecord, Error> {
            let candidates: Vec<&MtuRecord> = self
                .mtu
                .iter()
                .filter(|record| record.label == label)
                .collect();

            candidates
                .choose(rng)
                .copied()
                .ok_or_else(|| Error::database(format!("no matching record for {:?}", label)))
        }
    }
}

#[cfg(feature = "parse")]
impl Default for Database {
    fn default() -> Self {
        include_str!("../data/p0f.fp")
            .parse()
            .expect("parse default database")
    }
}

#[cfg(feature = "parse")]
lazy_static::lazy_static! {
    /// Shared instance of the bundled database, for callers that do not
    /// manage their own store.
    pub static ref DATABASE: Database = Database::default();
}
