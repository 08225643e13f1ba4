use crate::error::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub version: IpVersion,
    /// initial TTL used by the OS.
    pub ittl: TTL,
    /// length of IPv4 options or IPv6 extension headers.
    pub olen: u8,
    /// maximum segment size, if specified in TCP options.
    pub mss: Option<u16>,
    /// window size.
    pub wsize: WindowSize,
    /// window scaling factor, if specified in TCP options.
    pub wscale: Option<u8>,
    /// layout and ordering of TCP options, if any.
    pub olayout: Vec<TcpOption>,
    /// properties and quirks observed in IP or TCP headers.
    pub quirks: Quirks,
    /// payload size classification
    pub pclass: PayloadSize,
}

impl Signature {
    /// Effective initial TTL, with any declared distance folded in.
    pub fn ttl(&self) -> u8 {
        match self.ittl {
            TTL::Value(ttl) | TTL::Bad(ttl) => ttl,
            TTL::Distance(ttl, distance) => ttl + distance,
        }
    }

    pub fn is_bad_ttl(&self) -> bool {
        match self.ittl {
            TTL::Bad(_) => true,
            _ => false,
        }
    }

    /// Expected padding after an explicit end-of-options marker.
    pub fn eol_pad(&self) -> u8 {
        self.olayout
            .iter()
            .find_map(|opt| match opt {
                TcpOption::EOL(pad) => Some(*pad),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Reject quirks that cannot occur on the declared IP version.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = match self.version {
            IpVersion::V4 => self.quirks & Quirks::V6_ONLY,
            IpVersion::V6 => self.quirks & Quirks::V4_ONLY,
            IpVersion::Any => Quirks::empty(),
        };

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(Error::field(format!(
                "quirk `{}` is invalid for IPv{}",
                invalid,
                match self.version {
                    IpVersion::V6 => 6,
                    _ => 4,
                }
            )))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IpVersion {
    V4,
    V6,
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TTL {
    Value(u8),
    Distance(u8, u8),
    Bad(u8),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowSize {
    /// multiple of the maximum segment size.
    MSS(u16),
    /// multiple of the path MTU.
    MTU(u16),
    /// fixed value.
    Value(u16),
    /// `%n` - value is a multiple of n.
    Mod(u16),
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TcpOption {
    /// eol+n  - explicit end of options, followed by n bytes of padding
    EOL(u8),
    /// nop    - no-op option
    NOP,
    /// mss    - maximum segment size
    MSS,
    /// ws     - window scaling
    WS,
    /// sok    - selective ACK permitted
    SOK,
    /// sack   - selective ACK (should not be seen)
    SACK,
    /// ts     - timestamp
    TS,
    /// ?n     - unknown option ID n
    Unknown(u8),
}

bitflags! {
    /// Header and option anomalies, p0f style.
    pub struct Quirks: u32 {
        /// df     - "don't fragment" set (probably PMTUD); ignored for IPv6
        const DF = 1;
        /// id+    - DF set but IPID non-zero; ignored for IPv6
        const NZ_ID = 1 << 1;
        /// id-    - DF not set but IPID is zero; ignored for IPv6
        const ZERO_ID = 1 << 2;
        /// ecn    - explicit congestion notification support
        const ECN = 1 << 3;
        /// 0+     - "must be zero" field not zero; ignored for IPv6
        const NZ_MBZ = 1 << 4;
        /// flow   - non-zero IPv6 flow ID; ignored for IPv4
        const FLOW = 1 << 5;
        /// seq-   - sequence number is zero
        const ZERO_SEQ = 1 << 6;
        /// ack+   - ACK number is non-zero, but ACK flag not set
        const NZ_ACK = 1 << 7;
        /// ack-   - ACK number is zero, but ACK flag set
        const ZERO_ACK = 1 << 8;
        /// uptr+  - URG pointer is non-zero, but URG flag not set
        const NZ_URG = 1 << 9;
        /// urgf+  - URG flag used
        const URG = 1 << 10;
        /// pushf+ - PUSH flag used
        const PUSH = 1 << 11;
        /// ts1-   - own timestamp specified as zero
        const OPT_ZERO_TS1 = 1 << 12;
        /// ts2+   - non-zero peer timestamp on initial SYN
        const OPT_NZ_TS2 = 1 << 13;
        /// opt+   - trailing non-zero data in options segment
        const OPT_EOL_NZ = 1 << 14;
        /// exws   - excessive window scaling factor (> 14)
        const OPT_EXWS = 1 << 15;
        /// bad    - malformed TCP options
        const OPT_BAD = 1 << 16;

        /// quirks that only occur on IPv4 headers.
        const V4_ONLY = Self::DF.bits | Self::NZ_ID.bits | Self::ZERO_ID.bits | Self::NZ_MBZ.bits;
        /// quirks that only occur on IPv6 headers.
        const V6_ONLY = Self::FLOW.bits;
    }
}

/// Canonical quirk tokens, in database rendering order.
pub const QUIRK_TOKENS: &[(Quirks, &str)] = &[
    (Quirks::DF, "df"),
    (Quirks::NZ_ID, "id+"),
    (Quirks::ZERO_ID, "id-"),
    (Quirks::ECN, "ecn"),
    (Quirks::NZ_MBZ, "0+"),
    (Quirks::FLOW, "flow"),
    (Quirks::ZERO_SEQ, "seq-"),
    (Quirks::NZ_ACK, "ack+"),
    (Quirks::ZERO_ACK, "ack-"),
    (Quirks::NZ_URG, "uptr+"),
    (Quirks::URG, "urgf+"),
    (Quirks::PUSH, "pushf+"),
    (Quirks::OPT_ZERO_TS1, "ts1-"),
    (Quirks::OPT_NZ_TS2, "ts2+"),
    (Quirks::OPT_EOL_NZ, "opt+"),
    (Quirks::OPT_EXWS, "exws"),
    (Quirks::OPT_BAD, "bad"),
];

impl std::fmt::Display for Quirks {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut first = true;

        for (quirk, token) in QUIRK_TOKENS {
            if self.contains(*quirk) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(token)?;
                first = false;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PayloadSize {
    Zero,
    NonZero,
    Any,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_ttl() {
        assert_eq!(
            Signature {
                version: IpVersion::Any,
                ittl: TTL::Distance(54, 10),
                olen: 0,
                mss: None,
                wsize: WindowSize::Any,
                wscale: None,
                olayout: vec![TcpOption::MSS],
                quirks: Quirks::empty(),
                pclass: PayloadSize::Zero,
            }
            .ttl(),
            64
        );
    }

    #[test]
    fn test_version_quirk_whitelist() {
        let mut sig = Signature {
            version: IpVersion::V6,
            ittl: TTL::Value(64),
            olen: 0,
            mss: None,
            wsize: WindowSize::Any,
            wscale: None,
            olayout: vec![TcpOption::MSS],
            quirks: Quirks::DF | Quirks::NZ_ID,
            pclass: PayloadSize::Zero,
        };

        assert!(sig.validate().is_err());

        sig.version = IpVersion::V4;
        assert!(sig.validate().is_ok());

        sig.quirks = Quirks::FLOW;
        assert!(sig.validate().is_err());

        sig.version = IpVersion::Any;
        assert!(sig.validate().is_ok());
    }
}
