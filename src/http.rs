use std::collections::HashSet;
use std::str;

use crate::error::Error;
use crate::Direction;

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    /// HTTP version
    pub version: Version,
    /// ordered list of headers that should appear in matching traffic.
    pub horder: Vec<Header>,
    /// list of headers that must *not* appear in matching traffic.
    pub habsent: Vec<Header>,
    /// expected substring in 'User-Agent' or 'Server'.
    pub expsw: String,
}

impl Signature {
    /// Case-folded names of the headers that must appear.
    pub fn required_names(&self) -> HashSet<String> {
        self.horder
            .iter()
            .filter(|h| !h.optional)
            .map(|h| h.name.to_ascii_lowercase())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Version {
    /// HTTP/1.0
    V10,
    /// HTTP/1.1
    V11,
    /// HTTP/1.0 or HTTP/1.1
    Any,
}

impl Version {
    pub fn matches(&self, minor: u8) -> bool {
        match self {
            Version::V10 => minor == 0,
            Version::V11 => minor == 1,
            Version::Any => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub optional: bool,
    pub name: String,
    pub value: Option<String>,
}

pub fn header<S: AsRef<str>>(name: S) -> Header {
    Header::new(name)
}

impl Header {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Header {
            optional: false,
            name: name.as_ref().to_owned(),
            value: None,
        }
    }

    pub fn with_value<S: AsRef<str>>(mut self, value: S) -> Self {
        self.value = Some(value.as_ref().to_owned());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn lower_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// A header as observed on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketHeader {
    pub name: String,
    pub value: String,
}

impl PacketHeader {
    pub fn lower_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// First line and headers of an observed HTTP/1.x message.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketSignature {
    /// minor HTTP version (`HTTP/1.x`).
    pub version: u8,
    pub headers: Vec<PacketHeader>,
}

impl PacketSignature {
    pub fn from_buffer(buffer: &[u8]) -> Result<(Direction, Self), Error> {
        let (direction, version, headers) = read_payload(buffer)?;

        Ok((direction, PacketSignature { version, headers }))
    }

    pub fn header_names(&self) -> HashSet<String> {
        self.headers.iter().map(|h| h.lower_name()).collect()
    }

    fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.lower_name() == name)
            .map(|h| h.value.as_str())
    }

    /// The advertised software string, if any.
    pub fn software(&self) -> Option<&str> {
        self.header_value("user-agent").or_else(|| self.header_value("server"))
    }
}

/// Read the first line and header block of an HTTP/1.x payload.
///
/// Only GET and HEAD requests classify as client traffic; anything else
/// must open with an `HTTP/1.x` status line. The header block must be
/// terminated by an empty line.
pub fn read_payload(buffer: &[u8]) -> Result<(Direction, u8, Vec<PacketHeader>), Error> {
    let text = str::from_utf8(buffer).map_err(|_| Error::payload("payload is not valid UTF-8"))?;
    let mut lines = text.split("\r\n");

    let first = lines
        .next()
        .ok_or_else(|| Error::payload("empty payload"))?;
    let (direction, version) = read_first_line(first)?;

    let mut headers: Vec<PacketHeader> = vec![];
    let mut terminated = false;

    for line in lines {
        if line.is_empty() {
            terminated = true;
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header's value.
            let last = headers
                .last_mut()
                .ok_or_else(|| Error::payload(format!("continuation without a header: {:?}", line)))?;

            last.value.push_str("\r\n ");
            last.value.push_str(line.trim());
            continue;
        }

        let mut parts = line.splitn(2, ':');
        let name = parts.next().unwrap_or_default();
        let value = parts
            .next()
            .ok_or_else(|| Error::payload(format!("invalid header line: {:?}", line)))?;

        if name.is_empty() {
            return Err(Error::payload(format!("empty header name: {:?}", line)));
        }

        headers.push(PacketHeader {
            name: name.to_owned(),
            value: value.trim().to_owned(),
        });
    }

    if !terminated {
        return Err(Error::payload("not an HTTP payload, or payload not complete"));
    }

    Ok((direction, version, headers))
}

fn read_first_line(line: &str) -> Result<(Direction, u8), Error> {
    let mut fields = line.split_whitespace();

    match fields.next() {
        Some("GET") | Some("HEAD") => {
            let version = fields
                .nth(1)
                .ok_or_else(|| Error::payload(format!("bad HTTP request line: {:?}", line)))
                .and_then(minor_version)?;

            Ok((Direction::ClientToServer, version))
        }
        Some(field) => Ok((Direction::ServerToClient, minor_version(field)?)),
        None => Err(Error::payload("empty HTTP first line")),
    }
}

/// Extract the minor version of an `HTTP/1.x` token.
fn minor_version(field: &str) -> Result<u8, Error> {
    let minor = field
        .strip_prefix("HTTP/1.")
        .filter(|digits| digits.len() == 1)
        .and_then(|digits| digits.parse().ok());

    minor.ok_or_else(|| Error::payload(format!("unknown HTTP version: {:?}", field)))
}
