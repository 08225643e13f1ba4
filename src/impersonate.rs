use rand::seq::SliceRandom;
use rand::Rng;

use crate::db::Database;
use crate::error::Error;
use crate::packet::{
    tcp_flag, Ip, Packet, Tcp, TcpOptions, IPV4_HEADER_LENGTH, MIN_TCP4, MIN_TCP6,
    TCP_HEADER_LENGTH,
};
use crate::tcp::{IpVersion, PayloadSize, Quirks, Signature, TcpOption, WindowSize};

/// What to impersonate: a database label (one of its signatures is
/// sampled uniformly) or a raw signature text.
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    Label(&'a str),
    Signature(&'a str),
}

#[derive(Clone, Debug)]
pub struct ImpersonateConfig {
    /// MTU used to satisfy `mtu*n` window signatures.
    pub mtu: u16,
    /// hops to simulate between the impersonated host and the observer.
    pub extra_hops: u8,
    /// own timestamp to advertise instead of a random one.
    pub uptime: Option<u32>,
}

impl Default for ImpersonateConfig {
    fn default() -> Self {
        ImpersonateConfig {
            mtu: 1500,
            extra_hops: 0,
            uptime: None,
        }
    }
}

/// Copy `packet` and mutate it so that its extracted TCP signature
/// matches the target signature exactly. Fields the signature leaves
/// open keep the template's value when it is usable, and are otherwise
/// randomized from `rng`.
///
/// A pure-SYN template is impersonated as client traffic, anything else
/// as server traffic.
pub fn impersonate_tcp<R: Rng>(
    db: &Database,
    packet: &Packet,
    target: Target,
    config: &ImpersonateConfig,
    rng: &mut R,
) -> Result<Packet, Error> {
    let signature = match target {
        Target::Signature(raw) => raw.parse::<Signature>()?,
        Target::Label(label) => {
            db.random_tcp(label, packet.direction(), rng)?
                .signature
                .clone()
        }
    };

    match signature.version {
        IpVersion::Any => {}
        version if version == packet.ip.version => {}
        _ => return Err(Error::value("can't convert between IPv4 and IPv6")),
    }

    let mut packet = packet.clone();

    impersonate_ip(&mut packet.ip, &signature, config.extra_hops, rng);
    impersonate_options(&mut packet.tcp, &signature, config.uptime, rng);
    impersonate_window(&mut packet.tcp, &signature, config.mtu, rng)?;
    impersonate_flags(&mut packet.tcp, &signature, rng);
    impersonate_payload(&mut packet.tcp, &signature, rng);

    Ok(packet)
}

/// Copy `packet` and rewrite its MSS option so the implied MTU matches
/// the target signature.
pub fn impersonate_mtu<R: Rng>(
    db: &Database,
    packet: &Packet,
    target: Target,
    rng: &mut R,
) -> Result<Packet, Error> {
    let mtu = match target {
        Target::Signature(raw) => crate::parse::parse_mtu(raw.trim())?,
        Target::Label(label) => db.random_mtu(label, rng)?.mtu,
    };

    let headers = match packet.ip.version {
        IpVersion::V6 => MIN_TCP6,
        _ => MIN_TCP4,
    };
    let mss = mtu
        .checked_sub(headers)
        .ok_or_else(|| Error::value("MTU is smaller than the minimal headers"))?;

    let mut packet = packet.clone();
    let options = &mut packet.tcp.options;

    if options.layout.contains(&TcpOption::MSS) {
        options.mss = Some(mss);
    } else {
        *options = TcpOptions {
            layout: vec![TcpOption::MSS],
            mss: Some(mss),
            ..TcpOptions::default()
        };
    }

    Ok(packet)
}

fn impersonate_ip<R: Rng>(ip: &mut Ip, signature: &Signature, extra_hops: u8, rng: &mut R) {
    ip.ttl = signature.ttl().saturating_sub(extra_hops);

    match ip.version {
        IpVersion::V6 => {
            if signature.quirks.contains(Quirks::FLOW) {
                ip.flow = rng.gen_range(1u32, 1 << 20);
            }

            if signature.quirks.contains(Quirks::ECN) {
                ip.tos |= rng.gen_range(0x01u8, 0x04);
            }
        }
        _ => {
            if signature.olen == 0 {
                // non-zero IPv4 options are not synthesized
                ip.options_length = 0;
                ip.header_length = IPV4_HEADER_LENGTH;
            }

            if signature.quirks.contains(Quirks::DF) {
                ip.df = true;

                if signature.quirks.contains(Quirks::NZ_ID) {
                    // the ID must not be zero; keep a positive one
                    if ip.id == 0 {
                        ip.id = rng.gen_range(1u32, 1 << 16) as u16;
                    }
                } else {
                    ip.id = 0;
                }
            } else {
                ip.df = false;

                if signature.quirks.contains(Quirks::ZERO_ID) {
                    ip.id = 0;
                } else if ip.id == 0 {
                    ip.id = rng.gen_range(1u32, 1 << 16) as u16;
                }
            }

            if signature.quirks.contains(Quirks::ECN) {
                ip.tos |= rng.gen_range(0x01u8, 0x04);
            }

            ip.mbz = signature.quirks.contains(Quirks::NZ_MBZ);
        }
    }
}

fn impersonate_options<R: Rng>(
    tcp: &mut Tcp,
    signature: &Signature,
    uptime: Option<u32>,
    rng: &mut R,
) {
    let kind = tcp.kind();

    // The options already set serve as hints for the new packet.
    let mss_hint = tcp.options.mss;
    let wscale_hint = tcp.options.wscale;
    let ts1_hint = tcp.options.ts1;
    let ts2_hint = tcp.options.ts2;

    let mut options = TcpOptions {
        layout: signature.olayout.clone(),
        eol_pad: signature.eol_pad(),
        ..TcpOptions::default()
    };

    for option in &signature.olayout {
        match option {
            TcpOption::MSS => {
                // mss*n window signatures cap the segment size so the
                // product stays in a u16
                let max_mss = match signature.wsize {
                    WindowSize::MSS(size) => (1u32 << 16) / u32::from(size),
                    _ => 1u32 << 16,
                };

                options.mss = Some(match signature.mss {
                    Some(mss) => mss,
                    None => match mss_hint {
                        Some(hint) if u32::from(hint) < max_mss => hint,
                        _ if max_mss > 100 => rng.gen_range(100, max_mss) as u16,
                        _ => max_mss.saturating_sub(1).max(1) as u16,
                    },
                });
            }
            TcpOption::WS => {
                options.wscale = Some(match signature.wscale {
                    Some(scale) => scale,
                    None if signature.quirks.contains(Quirks::OPT_EXWS) => match wscale_hint {
                        Some(hint) if hint > 14 => hint,
                        _ => rng.gen_range(15u16, 256) as u8,
                    },
                    None => match wscale_hint {
                        Some(hint) if hint > 0 && hint <= 14 => hint,
                        _ => rng.gen_range(1u8, 14),
                    },
                });
            }
            TcpOption::TS => {
                let ts1 = if signature.quirks.contains(Quirks::OPT_ZERO_TS1) {
                    0
                } else if let Some(uptime) = uptime {
                    uptime
                } else {
                    match ts1_hint {
                        Some(hint) if hint != 0 => hint,
                        _ => rng.gen_range(120u32, 100 * 60 * 60 * 24 * 365),
                    }
                };

                // a non-zero peer timestamp only ever appears on SYN
                let ts2 = if signature.quirks.contains(Quirks::OPT_NZ_TS2) && kind == tcp_flag::SYN
                {
                    match ts2_hint {
                        Some(hint) if hint != 0 => hint,
                        _ => rng.gen_range(1u32, u32::max_value()),
                    }
                } else {
                    0
                };

                options.ts1 = Some(ts1);
                options.ts2 = Some(ts2);
            }
            TcpOption::SACK => {
                let length = [10usize, 18, 26, 34].choose(rng).copied().unwrap_or(10);

                options.sack = Some((0..length).map(|_| rng.gen()).collect());
            }
            // layout-only entries
            TcpOption::EOL(_) | TcpOption::NOP | TcpOption::SOK | TcpOption::Unknown(_) => {}
        }
    }

    // Re-derive the quirks the extractor would report for these values.
    if options.wscale.map_or(false, |scale| scale > 14) {
        options.quirks |= Quirks::OPT_EXWS;
    }
    if options.ts1 == Some(0) {
        options.quirks |= Quirks::OPT_ZERO_TS1;
    }
    if kind == tcp_flag::SYN && options.ts2.map_or(false, |ts| ts != 0) {
        options.quirks |= Quirks::OPT_NZ_TS2;
    }

    tcp.header_length = TCP_HEADER_LENGTH + wire_length(&options);
    tcp.options = options;
}

/// Serialized length of an option list, in bytes.
fn wire_length(options: &TcpOptions) -> u16 {
    options
        .layout
        .iter()
        .map(|option| match option {
            TcpOption::EOL(pad) => 1 + u16::from(*pad),
            TcpOption::NOP => 1,
            TcpOption::MSS => 4,
            TcpOption::WS => 3,
            TcpOption::SOK => 2,
            TcpOption::TS => 10,
            TcpOption::SACK => options.sack.as_ref().map_or(10, |sack| sack.len() as u16 + 2),
            TcpOption::Unknown(_) => 2,
        })
        .sum()
}

fn impersonate_window<R: Rng>(
    tcp: &mut Tcp,
    signature: &Signature,
    mtu: u16,
    rng: &mut R,
) -> Result<(), Error> {
    tcp.window = match signature.wsize {
        WindowSize::Value(size) => size,
        WindowSize::MSS(size) => {
            let mss = tcp.options.mss.ok_or_else(|| {
                Error::value("window signature requires MSS, and no MSS option is set")
            })?;

            (u32::from(mss) * u32::from(size)) as u16
        }
        WindowSize::Mod(size) => {
            let upper = (1u32 << 16) / u32::from(size);

            if upper > 1 {
                (u32::from(size) * rng.gen_range(1, upper)) as u16
            } else {
                size
            }
        }
        WindowSize::MTU(size) => (u32::from(mtu) * u32::from(size)) as u16,
        WindowSize::Any => tcp.window,
    };

    Ok(())
}

fn impersonate_flags<R: Rng>(tcp: &mut Tcp, signature: &Signature, rng: &mut R) {
    use self::tcp_flag::{ACK, PSH, URG};

    if signature.quirks.contains(Quirks::ZERO_SEQ) {
        tcp.seq = 0;
    } else if tcp.seq == 0 {
        tcp.seq = rng.gen_range(1u32, u32::max_value());
    }

    if signature.quirks.contains(Quirks::NZ_ACK) {
        tcp.flags &= !ACK;
        if tcp.ack == 0 {
            tcp.ack = rng.gen_range(1u32, u32::max_value());
        }
    } else if signature.quirks.contains(Quirks::ZERO_ACK) {
        tcp.flags |= ACK;
        tcp.ack = 0;
    }

    if signature.quirks.contains(Quirks::NZ_URG) {
        tcp.flags &= !URG;
        if tcp.urg_ptr == 0 {
            tcp.urg_ptr = rng.gen_range(1u32, 1 << 16) as u16;
        }
    } else if signature.quirks.contains(Quirks::URG) {
        tcp.flags |= URG;
    }

    if signature.quirks.contains(Quirks::PUSH) {
        tcp.flags |= PSH;
    } else {
        tcp.flags &= !PSH;
    }
}

fn impersonate_payload<R: Rng>(tcp: &mut Tcp, signature: &Signature, rng: &mut R) {
    match signature.pclass {
        PayloadSize::Zero => tcp.payload.clear(),
        PayloadSize::NonZero => {
            if tcp.payload.is_empty() {
                let length = rng.gen_range(1usize, 11);

                tcp.payload = (0..length)
                    .map(|_| rng.sample(rand::distributions::Alphanumeric) as u8)
                    .collect();
            }
        }
        PayloadSize::Any => {}
    }
}
