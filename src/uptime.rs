use crate::error::Error;
use crate::packet::{tcp_flag, Packet, TcpPacketSignature};
use crate::Options;

/// Verdict on the peer's timestamp clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tps {
    /// not enough signal to estimate.
    Unknown,
    /// the readings imply an absurd clock rate.
    Bad,
    /// estimated timestamp ticks per second.
    Hz(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Uptime {
    /// raw frequency of the timestamp clock (Hz).
    pub raw_frequency: f64,
    /// frequency rounded to a neat value (Hz).
    pub frequency: u32,
    /// computed uptime (minutes).
    pub total_minutes: u32,
    /// wrap-around period of the uptime clock (days).
    pub modulo_days: u32,
}

impl Uptime {
    fn new(timestamp: u32, raw_frequency: f64) -> Self {
        let frequency = round_frequency(raw_frequency);

        Uptime {
            raw_frequency,
            frequency,
            total_minutes: timestamp / frequency / 60,
            modulo_days: 0xFFFF_FFFF / (frequency * 60 * 60 * 24),
        }
    }

    pub fn days(&self) -> u32 {
        self.total_minutes / 60 / 24
    }

    pub fn hours(&self) -> u32 {
        self.total_minutes / 60 % 24
    }

    pub fn minutes(&self) -> u32 {
        self.total_minutes % 60
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UptimeResult {
    pub tps: Tps,
    pub uptime: Option<Uptime>,
}

impl UptimeResult {
    fn unknown() -> Self {
        UptimeResult {
            tps: Tps::Unknown,
            uptime: None,
        }
    }
}

/// Estimate the peer's uptime from timestamp progression between two
/// observations. The only fingerprint that also works on plain ACKs.
///
/// `last` must carry the wall clock of the earlier observation in
/// `received_ms`; `now_ms` is the wall clock of `packet`.
pub fn fingerprint_uptime(
    packet: &Packet,
    last: &TcpPacketSignature,
    now_ms: i64,
    options: &Options,
) -> Result<UptimeResult, Error> {
    use self::tcp_flag::{ACK, SYN};

    let kind = packet.tcp.kind();

    if !packet.should_fingerprint() || (kind != SYN && kind != (SYN | ACK) && kind != ACK) {
        return Err(Error::packet(
            "packet is invalid for uptime fingerprint; must be SYN/SYN+ACK/ACK",
        ));
    }

    // A zero timestamp is treated like a missing option.
    let ts_now = match packet.tcp.options.ts1 {
        Some(ts) if ts != 0 => ts,
        _ => return Ok(UptimeResult::unknown()),
    };
    let ts_last = match last.options.ts1 {
        Some(ts) if ts != 0 => ts,
        _ => return Ok(UptimeResult::unknown()),
    };

    let ms_diff = now_ms - last.received_ms;
    let ts_diff = ts_now.wrapping_sub(ts_last);

    // Wait at least 25 ms and at most 10 minutes between the samples.
    if ms_diff < options.min_timestamp_wait || ms_diff > options.max_timestamp_wait {
        return Ok(UptimeResult::unknown());
    }

    // Require at least 5 timestamp ticks.
    if ts_diff < 5 {
        return Ok(UptimeResult::unknown());
    }

    // Within a short grace window the timestamp may go back slightly;
    // packets do arrive out of order.
    let max_regression = (options.max_timestamp_scale as i64 / options.timestamp_grace) as u32;

    if ms_diff < options.timestamp_grace && (!ts_diff) / 1000 < max_regression {
        return Ok(UptimeResult::unknown());
    }

    let raw_frequency = if ts_diff > !ts_diff {
        // the counter went backwards across the samples
        f64::from(!ts_diff) * -1000.0 / ms_diff as f64
    } else {
        f64::from(ts_diff) * 1000.0 / ms_diff as f64
    };

    if raw_frequency < options.min_timestamp_scale || raw_frequency > options.max_timestamp_scale {
        // Tolerate bad readings on SYN; they may be an artifact of IP
        // sharing or an OS change.
        return Ok(UptimeResult {
            tps: if kind == SYN { Tps::Unknown } else { Tps::Bad },
            uptime: None,
        });
    }

    let uptime = Uptime::new(ts_now, raw_frequency);

    Ok(UptimeResult {
        tps: Tps::Hz(uptime.frequency),
        uptime: Some(uptime),
    })
}

/// Round a raw frequency to a neat value, coarser as it grows.
fn round_frequency(raw_frequency: f64) -> u32 {
    let frequency = raw_frequency as u32;

    match frequency {
        0 => 1,
        1..=10 => frequency,
        11..=50 => (frequency + 3) / 5 * 5,
        51..=100 => (frequency + 7) / 10 * 10,
        101..=500 => (frequency + 33) / 50 * 50,
        _ => (frequency + 67) / 100 * 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::testing::syn_template;
    use crate::packet::{tcp_flag, TcpPacketSignature};

    const NOW_MS: i64 = 1_700_000_000_000;

    fn observation(flags: u16, ts1: u32) -> Packet {
        let mut packet = syn_template();

        packet.tcp.flags = flags;
        if flags & tcp_flag::ACK != 0 {
            packet.tcp.ack = 1;
        }
        packet.tcp.options.ts1 = Some(ts1);
        packet.tcp.options.ts2 = Some(0);
        packet
    }

    fn last_signature(ts1: u32, ms_ago: i64) -> TcpPacketSignature {
        let mut signature =
            TcpPacketSignature::from_packet(&observation(tcp_flag::SYN, ts1), None);

        signature.received_ms = NOW_MS - ms_ago;
        signature
    }

    #[test]
    fn test_uptime_from_capture_pair() {
        // 13 ticks over 130 ms: a 100 Hz clock.
        let last = last_signature(0x0017_9565, 130);
        let packet = observation(tcp_flag::ACK, 0x0017_9572);

        let result = fingerprint_uptime(&packet, &last, NOW_MS, &Options::default()).unwrap();

        assert_eq!(result.tps, Tps::Hz(100));

        let uptime = result.uptime.unwrap();
        assert_eq!(uptime.frequency, 100);
        assert_eq!(uptime.total_minutes, 257);
        assert_eq!(uptime.modulo_days, 497);
        assert_eq!(uptime.days(), 0);
        assert_eq!(uptime.hours(), 4);
        assert_eq!(uptime.minutes(), 17);
    }

    #[test]
    fn test_requires_ack_family() {
        let last = last_signature(1000, 130);
        let packet = observation(tcp_flag::RST, 1013);

        assert!(fingerprint_uptime(&packet, &last, NOW_MS, &Options::default()).is_err());
    }

    #[test]
    fn test_missing_or_zero_timestamps() {
        let options = Options::default();

        let last = last_signature(1000, 130);
        let mut packet = observation(tcp_flag::ACK, 1013);
        packet.tcp.options.ts1 = None;
        assert_eq!(
            fingerprint_uptime(&packet, &last, NOW_MS, &options).unwrap(),
            UptimeResult::unknown()
        );

        let packet = observation(tcp_flag::ACK, 1013);
        let zeroed = last_signature(0, 130);
        assert_eq!(
            fingerprint_uptime(&packet, &zeroed, NOW_MS, &options).unwrap(),
            UptimeResult::unknown()
        );
    }

    #[test]
    fn test_wait_window() {
        let options = Options::default();
        let packet = observation(tcp_flag::ACK, 1013);

        // too soon
        let last = last_signature(1000, 10);
        assert_eq!(
            fingerprint_uptime(&packet, &last, NOW_MS, &options).unwrap(),
            UptimeResult::unknown()
        );

        // too long ago
        let last = last_signature(1000, 11 * 60 * 1000);
        assert_eq!(
            fingerprint_uptime(&packet, &last, NOW_MS, &options).unwrap(),
            UptimeResult::unknown()
        );
    }

    #[test]
    fn test_too_few_ticks() {
        let last = last_signature(1000, 130);
        let packet = observation(tcp_flag::ACK, 1004);

        assert_eq!(
            fingerprint_uptime(&packet, &last, NOW_MS, &Options::default()).unwrap(),
            UptimeResult::unknown()
        );
    }

    #[test]
    fn test_small_regression_within_grace() {
        // The timestamp stepping back a few ticks shortly after the
        // first sample is forgiven.
        let last = last_signature(1000, 50);
        let packet = observation(tcp_flag::ACK, 997);

        assert_eq!(
            fingerprint_uptime(&packet, &last, NOW_MS, &Options::default()).unwrap(),
            UptimeResult::unknown()
        );
    }

    #[test]
    fn test_absurd_frequency() {
        let options = Options::default();

        // two million ticks over a second
        let last = last_signature(1000, 1000);
        let packet = observation(tcp_flag::ACK, 2_001_000);
        let result = fingerprint_uptime(&packet, &last, NOW_MS, &options).unwrap();
        assert_eq!(result.tps, Tps::Bad);
        assert!(result.uptime.is_none());

        // the same reading on a SYN is quietly dropped
        let packet = observation(tcp_flag::SYN, 2_001_000);
        let result = fingerprint_uptime(&packet, &last, NOW_MS, &options).unwrap();
        assert_eq!(result.tps, Tps::Unknown);
    }

    #[test]
    fn test_round_frequency_buckets() {
        assert_eq!(round_frequency(0.9), 1);
        assert_eq!(round_frequency(7.0), 7);
        assert_eq!(round_frequency(13.0), 15);
        assert_eq!(round_frequency(47.0), 50);
        assert_eq!(round_frequency(93.0), 100);
        assert_eq!(round_frequency(100.0), 100);
        assert_eq!(round_frequency(333.0), 350);
        assert_eq!(round_frequency(777.0), 800);
        assert_eq!(round_frequency(1000.0), 1000);
    }
}
