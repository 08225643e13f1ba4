use crate::db::{Database, HttpRecord, MtuRecord, TcpRecord};
use crate::error::Error;
use crate::http;
use crate::packet::{Packet, TcpPacketSignature, MIN_TCP4, MIN_TCP6};
use crate::tcp::{self, IpVersion, PayloadSize, Quirks, WindowSize};
use crate::Options;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TcpMatchType {
    Exact,
    /// the signature matched except for the TTL.
    FuzzyTtl,
    /// the signature matched modulo the tolerated quirk differences.
    FuzzyQuirks,
}

#[derive(Clone, Debug)]
pub struct TcpMatch<'a> {
    pub ty: TcpMatchType,
    pub record: &'a TcpRecord,
}

impl<'a> TcpMatch<'a> {
    pub fn is_fuzzy(&self) -> bool {
        self.ty != TcpMatchType::Exact
    }
}

#[derive(Clone, Debug)]
pub struct TcpResult<'a> {
    pub signature: TcpPacketSignature,
    pub matched: Option<TcpMatch<'a>>,
    /// estimated hop distance to the origin.
    pub distance: u8,
}

#[derive(Clone, Debug)]
pub struct MtuResult<'a> {
    /// MTU implied by the advertised MSS.
    pub mtu: u16,
    pub matched: Option<&'a MtuRecord>,
}

#[derive(Clone, Debug)]
pub struct HttpResult<'a> {
    pub signature: http::PacketSignature,
    pub matched: Option<&'a HttpRecord>,
    /// software string (User-Agent or Server) looks forged?
    pub dishonest: bool,
}

/// Fingerprint the path MTU of a SYN or SYN+ACK that advertises an MSS.
pub fn fingerprint_mtu<'a>(db: &'a Database, packet: &Packet) -> Result<MtuResult<'a>, Error> {
    if !packet.should_fingerprint() {
        return Err(Error::packet("packet is invalid for MTU fingerprint"));
    }

    let mss = match packet.tcp.options.mss {
        Some(mss) if mss > 0 => mss,
        _ => return Err(Error::packet("MTU fingerprint requires an MSS value")),
    };

    let mtu = mss.saturating_add(match packet.ip.version {
        IpVersion::V6 => MIN_TCP6,
        _ => MIN_TCP4,
    });

    Ok(MtuResult {
        mtu,
        matched: db.mtu.iter().find(|record| record.mtu == mtu),
    })
}

/// Fingerprint a SYN or SYN+ACK against the TCP sections.
///
/// `syn_mss` is the MSS the peer advertised on the SYN that solicited
/// this packet, if known; it widens the window divisor search.
pub fn fingerprint_tcp<'a>(
    db: &'a Database,
    packet: &Packet,
    options: &Options,
    syn_mss: Option<u16>,
) -> Result<TcpResult<'a>, Error> {
    use crate::packet::tcp_flag::{ACK, SYN};

    let kind = packet.tcp.kind();

    if !packet.should_fingerprint() || (kind != SYN && kind != (SYN | ACK)) {
        return Err(Error::packet("packet is invalid for TCP fingerprint"));
    }

    let signature = TcpPacketSignature::from_packet(packet, syn_mss);
    let matched = find_tcp_match(db.tcp(packet.direction()), &signature, options);

    let distance = match matched {
        Some(ref m) if m.ty != TcpMatchType::FuzzyTtl => {
            m.record.signature.ttl() - signature.ttl
        }
        _ => guess_distance(signature.ttl),
    };

    Ok(TcpResult {
        signature,
        matched,
        distance,
    })
}

/// Fingerprint an HTTP/1.x request or response payload.
pub fn fingerprint_http<'a>(db: &'a Database, buffer: &[u8]) -> Result<HttpResult<'a>, Error> {
    let (direction, signature) = http::PacketSignature::from_buffer(buffer)?;
    let matched = find_http_match(db.http(direction), &signature);

    let dishonest = match (matched, signature.software()) {
        (Some(record), Some(software)) if !record.signature.expsw.is_empty() => {
            !software.contains(&record.signature.expsw)
        }
        _ => false,
    };

    Ok(HttpResult {
        signature,
        matched,
        dishonest,
    })
}

/// Figure out what the TTL distance might have been for a packet that
/// matched nothing, assuming a common initial TTL.
fn guess_distance(ttl: u8) -> u8 {
    [32u8, 64, 128]
        .iter()
        .find(|&&initial| ttl <= initial)
        .map(|&initial| initial - ttl)
        .unwrap_or(255 - ttl)
}

fn find_tcp_match<'a>(
    records: &'a [TcpRecord],
    signature: &TcpPacketSignature,
    options: &Options,
) -> Option<TcpMatch<'a>> {
    let mut generic: Option<TcpMatch<'a>> = None;
    let mut fuzzy: Option<TcpMatch<'a>> = None;

    for record in records {
        let ty = match tcp_signatures_match(&record.signature, signature, options) {
            Some(ty) => ty,
            None => continue,
        };

        if ty == TcpMatchType::Exact {
            if !record.is_generic() {
                return Some(TcpMatch { ty, record });
            }

            if generic.is_none() {
                generic = Some(TcpMatch { ty, record });
            }
        } else if fuzzy.is_none() {
            fuzzy = Some(TcpMatch { ty, record });
        }
    }

    // A generic signature beats any fuzzy candidate.
    if generic.is_some() {
        return generic;
    }

    // No fuzzy matching for userland tools.
    match fuzzy {
        Some(ref m) if m.record.label.is_user_app() => None,
        fuzzy => fuzzy,
    }
}

fn tcp_signatures_match(
    sig: &tcp::Signature,
    pkt: &TcpPacketSignature,
    options: &Options,
) -> Option<TcpMatchType> {
    let mut ty = TcpMatchType::Exact;

    if sig.olayout != pkt.options.layout {
        return None;
    }

    // If the signature leaves the IP version open, ignore the quirks
    // that cannot occur on the observed version.
    let sig_quirks = if sig.version == IpVersion::Any {
        match pkt.version {
            IpVersion::V4 => sig.quirks - Quirks::FLOW,
            _ => sig.quirks - (Quirks::DF | Quirks::NZ_ID | Quirks::ZERO_ID),
        }
    } else {
        sig.quirks
    };

    if sig_quirks != pkt.quirks {
        let deleted = sig_quirks - pkt.quirks;
        let added = pkt.quirks - sig_quirks;

        // A difference is tolerated when it is only `df` or `id+`
        // disappearing, or `id-` or `ecn` appearing.
        if !(deleted - (Quirks::DF | Quirks::NZ_ID)).is_empty()
            || !(added - (Quirks::ZERO_ID | Quirks::ECN)).is_empty()
        {
            return None;
        }

        ty = TcpMatchType::FuzzyQuirks;
    }

    // Fixed parameters.
    if sig.eol_pad() != pkt.options.eol_pad || sig.olen != pkt.olen {
        return None;
    }

    // TTL matching, with a provision to allow fuzzy matches.
    if sig.is_bad_ttl() {
        if sig.ttl() < pkt.ttl {
            return None;
        }
    } else if sig.ttl() < pkt.ttl || sig.ttl() - pkt.ttl > options.max_dist {
        ty = TcpMatchType::FuzzyTtl;
    }

    // Simple wildcards.
    if sig.mss.map_or(false, |mss| mss != pkt.options.mss.unwrap_or(0))
        || sig
            .wscale
            .map_or(false, |scale| scale != pkt.options.wscale.unwrap_or(0))
    {
        return None;
    }

    match sig.pclass {
        PayloadSize::Zero if pkt.has_payload => return None,
        PayloadSize::NonZero if !pkt.has_payload => return None,
        _ => {}
    }

    // Window size.
    let accepted = match sig.wsize {
        WindowSize::Value(size) => size == pkt.window,
        WindowSize::Mod(size) => pkt.window % size == 0,
        WindowSize::MSS(size) => {
            pkt.window_multiplier() == Some((size, false))
        }
        WindowSize::MTU(size) => {
            pkt.window_multiplier() == Some((size, true))
        }
        WindowSize::Any => true,
    };

    if accepted {
        Some(ty)
    } else {
        None
    }
}

fn find_http_match<'a>(
    records: &'a [HttpRecord],
    signature: &http::PacketSignature,
) -> Option<&'a HttpRecord> {
    let mut generic = None;

    for record in records {
        if !http_signatures_match(&record.signature, signature) {
            continue;
        }

        if !record.is_generic() {
            return Some(record);
        }

        if generic.is_none() {
            generic = Some(record);
        }
    }

    generic
}

fn http_signatures_match(sig: &http::Signature, pkt: &http::PacketSignature) -> bool {
    let pkt_names = pkt.header_names();

    sig.version.matches(pkt.version)
        && sig.required_names().is_subset(&pkt_names)
        && sig
            .habsent
            .iter()
            .all(|header| !pkt_names.contains(&header.lower_name()))
        && http_headers_match(&sig.horder, &pkt.headers)
}

/// Check the ordering and values of headers.
fn http_headers_match(sig_headers: &[http::Header], pkt_headers: &[http::PacketHeader]) -> bool {
    let mut i = 0;

    for header in sig_headers {
        let name = header.lower_name();
        let start = i;

        while i < pkt_headers.len() && pkt_headers[i].lower_name() != name {
            i += 1;
        }

        if i == pkt_headers.len() {
            // not found past the cursor
            if !header.optional {
                return false;
            }

            // an optional header may be skipped, but only if it does not
            // appear out of order elsewhere
            if pkt_headers.iter().any(|h| h.lower_name() == name) {
                return false;
            }

            i = start;
            continue;
        }

        if let Some(ref value) = header.value {
            if !pkt_headers[i].value.contains(value) {
                return false;
            }
        }

        i += 1;
    }

    true
}
