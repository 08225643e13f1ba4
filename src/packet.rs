use std::net::IpAddr;

use crate::tcp::{IpVersion, Quirks, TcpOption};
use crate::Direction;

/// Congestion encountered
pub const IP_TOS_CE: u8 = 0x01;
/// ECN supported
pub const IP_TOS_ECT: u8 = 0x02;

pub const IPV4_HEADER_LENGTH: u16 = 20;
pub const IPV6_HEADER_LENGTH: u16 = 40;
pub const TCP_HEADER_LENGTH: u16 = 20;

/// Minimum length of IPv4 + TCP headers.
pub const MIN_TCP4: u16 = IPV4_HEADER_LENGTH + TCP_HEADER_LENGTH;
/// Minimum length of IPv6 + TCP headers.
pub const MIN_TCP6: u16 = IPV6_HEADER_LENGTH + TCP_HEADER_LENGTH;

/// TCP flag bits, in header order.
pub mod tcp_flag {
    pub const FIN: u16 = 0x0001;
    pub const SYN: u16 = 0x0002;
    pub const RST: u16 = 0x0004;
    pub const PSH: u16 = 0x0008;
    pub const ACK: u16 = 0x0010;
    pub const URG: u16 = 0x0020;
    pub const ECE: u16 = 0x0040;
    pub const CWR: u16 = 0x0080;
    pub const NS: u16 = 0x0100;
}

/// The fields of a dissected IPv4/IPv6 + TCP packet that fingerprinting
/// cares about.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub ip: Ip,
    pub tcp: Tcp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ip {
    pub version: IpVersion,
    pub src: IpAddr,
    pub dst: IpAddr,
    /// TTL (IPv4) or hop limit (IPv6).
    pub ttl: u8,
    /// TOS byte (IPv4) or traffic class (IPv6), ECN bits included.
    pub tos: u8,
    /// IPv4 identification; zero on IPv6.
    pub id: u16,
    /// IPv6 flow label; zero on IPv4.
    pub flow: u32,
    /// "don't fragment" flag (IPv4 only).
    pub df: bool,
    /// reserved "must be zero" flag bit (IPv4 only).
    pub mbz: bool,
    pub header_length: u16,
    /// length of IPv4 options; zero on IPv6.
    pub options_length: u8,
    /// MF set, or a non-zero fragment offset (IPv4 only).
    pub is_fragment: bool,
}

impl Ip {
    pub fn quirks(&self) -> Quirks {
        let mut quirks = Quirks::empty();

        if (self.tos & (IP_TOS_CE | IP_TOS_ECT)) != 0 {
            quirks |= Quirks::ECN;
        }

        match self.version {
            IpVersion::V6 => {
                if self.flow != 0 {
                    quirks |= Quirks::FLOW;
                }
            }
            _ => {
                if self.mbz {
                    quirks |= Quirks::NZ_MBZ;
                }

                if self.df {
                    quirks |= Quirks::DF;

                    if self.id != 0 {
                        quirks |= Quirks::NZ_ID;
                    }
                } else if self.id == 0 {
                    quirks |= Quirks::ZERO_ID;
                }
            }
        }

        quirks
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tcp {
    pub flags: u16,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub urg_ptr: u16,
    pub window: u16,
    pub header_length: u16,
    pub options: TcpOptions,
    pub payload: Vec<u8>,
}

impl Tcp {
    /// Flag subset that classifies the packet (SYN, ACK, FIN, RST).
    pub fn kind(&self) -> u16 {
        use self::tcp_flag::*;

        self.flags & (SYN | ACK | FIN | RST)
    }

    pub fn is_syn(&self) -> bool {
        self.kind() == tcp_flag::SYN
    }

    pub fn quirks(&self) -> Quirks {
        use self::tcp_flag::*;

        let mut quirks = Quirks::empty();

        if (self.flags & (ECE | CWR | NS)) != 0 {
            quirks |= Quirks::ECN;
        }
        if self.seq == 0 {
            quirks |= Quirks::ZERO_SEQ;
        }
        if self.flags & ACK != 0 {
            if self.ack == 0 {
                quirks |= Quirks::ZERO_ACK;
            }
        } else if self.ack != 0 && self.flags & RST == 0 {
            quirks |= Quirks::NZ_ACK;
        }
        if self.flags & URG != 0 {
            quirks |= Quirks::URG;
        } else if self.urg_ptr != 0 {
            quirks |= Quirks::NZ_URG;
        }
        if self.flags & PSH != 0 {
            quirks |= Quirks::PUSH;
        }

        quirks
    }
}

impl Packet {
    /// Packets with a silly combination of TCP flags, or with MF or a
    /// non-zero fragment offset, are not fingerprinted.
    pub fn should_fingerprint(&self) -> bool {
        use self::tcp_flag::*;

        let kind = self.tcp.kind();

        !self.ip.is_fragment
            && kind != 0
            && kind & (SYN | FIN) != (SYN | FIN)
            && kind & (SYN | RST) != (SYN | RST)
            && kind & (FIN | RST) != (FIN | RST)
    }

    /// A pure SYN travels client to server; everything else is treated
    /// as server to client.
    pub fn direction(&self) -> Direction {
        if self.tcp.is_syn() {
            Direction::ClientToServer
        } else {
            Direction::ServerToClient
        }
    }

    /// Combined IP, TCP and option quirks.
    pub fn quirks(&self) -> Quirks {
        self.ip.quirks() | self.tcp.quirks() | self.tcp.options.quirks
    }
}

/// Parsed TCP options: layout, payload values, and the quirks the byte
/// walk uncovered.
#[derive(Clone, Debug, PartialEq)]
pub struct TcpOptions {
    pub layout: Vec<TcpOption>,
    pub mss: Option<u16>,
    pub wscale: Option<u8>,
    /// own timestamp.
    pub ts1: Option<u32>,
    /// echoed peer timestamp.
    pub ts2: Option<u32>,
    /// selective ACK payload, as seen on the wire.
    pub sack: Option<Vec<u8>>,
    /// padding bytes after an explicit end-of-options marker.
    pub eol_pad: u8,
    pub quirks: Quirks,
}

impl Default for TcpOptions {
    fn default() -> Self {
        TcpOptions {
            layout: vec![],
            mss: None,
            wscale: None,
            ts1: None,
            ts2: None,
            sack: None,
            eol_pad: 0,
            quirks: Quirks::empty(),
        }
    }
}

const OPT_EOL: u8 = 0;
const OPT_NOP: u8 = 1;
const OPT_MSS: u8 = 2;
const OPT_WS: u8 = 3;
const OPT_SACKOK: u8 = 4;
const OPT_SACK: u8 = 5;
const OPT_TS: u8 = 8;

impl TcpOptions {
    /// Walk the option region byte by byte. Malformed layouts set
    /// `OPT_BAD`; typed options with a wrong length keep the walk going
    /// at their declared length.
    pub fn parse(buffer: &[u8], is_syn: bool) -> Self {
        let mut opts = TcpOptions::default();
        let end = buffer.len();
        let mut i = 0;

        while i < end {
            let number = buffer[i];
            i += 1;

            if number == OPT_EOL {
                let pad = (end - i) as u8;

                opts.layout.push(TcpOption::EOL(pad));
                opts.eol_pad = pad;

                if buffer[i..].iter().any(|&b| b != 0) {
                    opts.quirks |= Quirks::OPT_EOL_NZ;
                }
                break;
            }

            if number == OPT_NOP {
                opts.layout.push(TcpOption::NOP);
                continue;
            }

            opts.layout.push(match number {
                OPT_MSS => TcpOption::MSS,
                OPT_WS => TcpOption::WS,
                OPT_SACKOK => TcpOption::SOK,
                OPT_SACK => TcpOption::SACK,
                OPT_TS => TcpOption::TS,
                number => TcpOption::Unknown(number),
            });

            if i == end {
                // no room left for the length field
                opts.quirks |= Quirks::OPT_BAD;
                break;
            }

            let length = buffer[i] as usize;
            let data_start = i + 1;
            let option_end = i - 1 + length;
            i += 1;

            if option_end > end {
                // option would end past the option region
                opts.quirks |= Quirks::OPT_BAD;
                break;
            }

            match number {
                OPT_SACK => {
                    // SACK is a variable-length option of 10 to 34 bytes.
                    if length < 10 || length > 34 {
                        opts.quirks |= Quirks::OPT_BAD;
                        break;
                    }

                    opts.sack = Some(buffer[data_start..option_end].to_vec());
                }
                OPT_MSS => {
                    if length != 4 {
                        opts.quirks |= Quirks::OPT_BAD;
                    } else {
                        opts.mss = Some(u16::from_be_bytes([
                            buffer[data_start],
                            buffer[data_start + 1],
                        ]));
                    }
                }
                OPT_WS => {
                    if length != 3 {
                        opts.quirks |= Quirks::OPT_BAD;
                    } else {
                        let scale = buffer[data_start];

                        opts.wscale = Some(scale);

                        if scale > 14 {
                            opts.quirks |= Quirks::OPT_EXWS;
                        }
                    }
                }
                OPT_SACKOK => {
                    if length != 2 {
                        opts.quirks |= Quirks::OPT_BAD;
                    }
                }
                OPT_TS => {
                    if length != 10 {
                        opts.quirks |= Quirks::OPT_BAD;
                    } else {
                        let ts1 = u32::from_be_bytes([
                            buffer[data_start],
                            buffer[data_start + 1],
                            buffer[data_start + 2],
                            buffer[data_start + 3],
                        ]);
                        let ts2 = u32::from_be_bytes([
                            buffer[data_start + 4],
                            buffer[data_start + 5],
                            buffer[data_start + 6],
                            buffer[data_start + 7],
                        ]);

                        opts.ts1 = Some(ts1);
                        opts.ts2 = Some(ts2);

                        if ts1 == 0 {
                            opts.quirks |= Quirks::OPT_ZERO_TS1;
                        }
                        if ts2 != 0 && is_syn {
                            opts.quirks |= Quirks::OPT_NZ_TS2;
                        }
                    }
                }
                _ => {
                    // unknown option, presumably with a specified size
                    if length < 2 || length > 40 {
                        opts.quirks |= Quirks::OPT_BAD;
                        break;
                    }
                }
            }

            i = option_end;
        }

        opts
    }
}

/// The feature vector the TCP matcher and the uptime estimator consume.
#[derive(Clone, Debug, PartialEq)]
pub struct TcpPacketSignature {
    pub version: IpVersion,
    pub olen: u8,
    pub ttl: u8,
    pub window: u16,
    pub options: TcpOptions,
    /// combined length of IP and TCP headers.
    pub headers_length: u16,
    pub has_payload: bool,
    pub quirks: Quirks,
    /// MSS the peer advertised on SYN, if known (SYN+ACK matching).
    pub syn_mss: Option<u16>,
    /// wall clock of the observation in unix milliseconds; set by the
    /// caller, consumed by uptime estimation.
    pub received_ms: i64,
}

impl TcpPacketSignature {
    pub fn from_packet(packet: &Packet, syn_mss: Option<u16>) -> Self {
        TcpPacketSignature {
            version: packet.ip.version,
            olen: packet.ip.options_length,
            ttl: packet.ip.ttl,
            window: packet.tcp.window,
            options: packet.tcp.options.clone(),
            headers_length: packet.ip.header_length + packet.tcp.header_length,
            has_payload: !packet.tcp.payload.is_empty(),
            quirks: packet.quirks(),
            syn_mss,
            received_ms: 0,
        }
    }

    /// Figure out if the window size is a multiple of MSS or MTU.
    /// Returns the multiplier and whether an MTU divisor produced it.
    pub fn window_multiplier(&self) -> Option<(u16, bool)> {
        let mss = i32::from(self.options.mss.unwrap_or(0));

        if self.window == 0 || mss < 100 {
            return None;
        }

        let mut divisors: Vec<(i32, bool)> = Vec::with_capacity(12);

        divisors.push((mss, false));

        // Some systems will sometimes subtract 12 bytes when timestamps
        // are in use.
        if self.options.ts1.map_or(false, |ts| ts != 0) {
            divisors.push((mss - 12, false));
        }

        // Some systems use the MTU of the wrong interface.
        divisors.push((1500 - i32::from(MIN_TCP4), false));
        divisors.push((1500 - i32::from(MIN_TCP4) - 12, false));

        if self.version == IpVersion::V6 {
            divisors.push((1500 - i32::from(MIN_TCP6), false));
            divisors.push((1500 - i32::from(MIN_TCP6) - 12, false));
        }

        // Some systems use MTU instead of MSS.
        divisors.push((mss + i32::from(MIN_TCP4), true));
        divisors.push((mss + i32::from(self.headers_length), true));
        if self.version == IpVersion::V6 {
            divisors.push((mss + i32::from(MIN_TCP6), true));
        }
        divisors.push((1500, true));

        // On SYN+ACK, some systems use the value of the peer.
        if let Some(syn_mss) = self.syn_mss {
            divisors.push((i32::from(syn_mss), false));
            divisors.push((i32::from(syn_mss) - 12, false));
        }

        let window = i32::from(self.window);

        divisors.into_iter().find_map(|(divisor, use_mtu)| {
            if divisor > 0 && window % divisor == 0 {
                Some(((window / divisor) as u16, use_mtu))
            } else {
                None
            }
        })
    }
}

#[cfg(feature = "packet")]
mod dissect {
    use pnet::packet::{
        ethernet::{EtherType, EtherTypes, EthernetPacket},
        ip::IpNextHeaderProtocols,
        ipv4::{Ipv4Flags, Ipv4Packet},
        ipv6::Ipv6Packet,
        tcp::TcpPacket,
        vlan::VlanPacket,
        Packet as _,
    };

    use super::*;
    use crate::error::Error;

    /// Must be zero
    const IP4_MBZ: u8 = 0b0100;

    impl Packet {
        pub fn from_ethernet(packet: &[u8]) -> Result<Self, Error> {
            EthernetPacket::new(packet)
                .ok_or_else(|| Error::packet("ethernet packet too short"))
                .and_then(|packet| visit_ethernet(packet.get_ethertype(), packet.payload()))
        }

        /// Dissect a raw IP datagram, switching on the version nibble.
        pub fn from_ip(packet: &[u8]) -> Result<Self, Error> {
            match packet.first().map(|b| b >> 4) {
                Some(4) => Ipv4Packet::new(packet)
                    .ok_or_else(|| Error::packet("ipv4 packet too short"))
                    .and_then(visit_ipv4),
                Some(6) => Ipv6Packet::new(packet)
                    .ok_or_else(|| Error::packet("ipv6 packet too short"))
                    .and_then(visit_ipv6),
                _ => Err(Error::packet("not an IP packet")),
            }
        }
    }

    fn visit_ethernet(ethertype: EtherType, payload: &[u8]) -> Result<Packet, Error> {
        match ethertype {
            EtherTypes::Vlan => VlanPacket::new(payload)
                .ok_or_else(|| Error::packet("vlan packet too short"))
                .and_then(visit_vlan),

            EtherTypes::Ipv4 => Ipv4Packet::new(payload)
                .ok_or_else(|| Error::packet("ipv4 packet too short"))
                .and_then(visit_ipv4),

            EtherTypes::Ipv6 => Ipv6Packet::new(payload)
                .ok_or_else(|| Error::packet("ipv6 packet too short"))
                .and_then(visit_ipv6),

            ty => Err(Error::packet(format!("unsupported ethernet type: {}", ty))),
        }
    }

    fn visit_vlan(packet: VlanPacket) -> Result<Packet, Error> {
        visit_ethernet(packet.get_ethertype(), packet.payload())
    }

    fn visit_ipv4(packet: Ipv4Packet) -> Result<Packet, Error> {
        if packet.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
            return Err(Error::packet(format!(
                "unsupported IPv4 packet with non-TCP payload: {}",
                packet.get_next_level_protocol()
            )));
        }

        let flags = packet.get_flags();
        let options_length = packet.get_options_raw().len();

        let ip = Ip {
            version: IpVersion::V4,
            src: IpAddr::V4(packet.get_source()),
            dst: IpAddr::V4(packet.get_destination()),
            ttl: packet.get_ttl(),
            tos: (packet.get_dscp() << 2) | packet.get_ecn(),
            id: packet.get_identification(),
            flow: 0,
            df: (flags & Ipv4Flags::DontFragment) != 0,
            mbz: (flags & IP4_MBZ) != 0,
            header_length: IPV4_HEADER_LENGTH + options_length as u16,
            options_length: options_length as u8,
            is_fragment: packet.get_fragment_offset() > 0
                || (flags & Ipv4Flags::MoreFragments) != 0,
        };

        TcpPacket::new(packet.payload())
            .ok_or_else(|| Error::packet("TCP packet too short"))
            .and_then(|tcp| visit_tcp(tcp, ip))
    }

    fn visit_ipv6(packet: Ipv6Packet) -> Result<Packet, Error> {
        if packet.get_next_header() != IpNextHeaderProtocols::Tcp {
            return Err(Error::packet(format!(
                "unsupported IPv6 packet with non-TCP payload: {}",
                packet.get_next_header()
            )));
        }

        let ip = Ip {
            version: IpVersion::V6,
            src: IpAddr::V6(packet.get_source()),
            dst: IpAddr::V6(packet.get_destination()),
            ttl: packet.get_hop_limit(),
            tos: packet.get_traffic_class(),
            id: 0,
            flow: packet.get_flow_label(),
            df: false,
            mbz: false,
            header_length: IPV6_HEADER_LENGTH, // TODO: walk extension headers
            options_length: 0,
            is_fragment: false,
        };

        TcpPacket::new(packet.payload())
            .ok_or_else(|| Error::packet("TCP packet too short"))
            .and_then(|tcp| visit_tcp(tcp, ip))
    }

    fn visit_tcp(tcp: TcpPacket, ip: Ip) -> Result<Packet, Error> {
        let flags = u16::from(tcp.get_flags());
        let header_length = u16::from(tcp.get_data_offset()) * 4;
        let is_syn = flags & (tcp_flag::SYN | tcp_flag::ACK | tcp_flag::FIN | tcp_flag::RST)
            == tcp_flag::SYN;

        Ok(Packet {
            ip,
            tcp: Tcp {
                flags,
                src_port: tcp.get_source(),
                dst_port: tcp.get_destination(),
                seq: tcp.get_sequence(),
                ack: tcp.get_acknowledgement(),
                urg_ptr: tcp.get_urgent_ptr(),
                window: tcp.get_window(),
                header_length,
                options: TcpOptions::parse(tcp.get_options_raw(), is_syn),
                payload: tcp.payload().to_vec(),
            },
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A neutral IPv4 SYN to mutate in impersonation tests.
    pub fn syn_template() -> Packet {
        Packet {
            ip: Ip {
                version: IpVersion::V4,
                src: "192.0.2.1".parse().unwrap(),
                dst: "192.0.2.2".parse().unwrap(),
                ttl: 64,
                tos: 0,
                id: 1,
                flow: 0,
                df: false,
                mbz: false,
                header_length: IPV4_HEADER_LENGTH,
                options_length: 0,
                is_fragment: false,
            },
            tcp: Tcp {
                flags: tcp_flag::SYN,
                src_port: 41_000,
                dst_port: 80,
                seq: 0x1234_5678,
                ack: 0,
                urg_ptr: 0,
                window: 8192,
                header_length: TCP_HEADER_LENGTH,
                options: TcpOptions::default(),
                payload: vec![],
            },
        }
    }

    pub fn syn_ack_template() -> Packet {
        let mut packet = syn_template();

        packet.tcp.flags = tcp_flag::SYN | tcp_flag::ACK;
        packet.tcp.ack = 6;
        packet
    }

    #[cfg(feature = "packet")]
    pub fn from_hex(s: &str) -> Packet {
        Packet::from_ip(&hex::decode(s).expect("valid hex")).expect("valid packet")
    }
}
