use std::str::FromStr;

use nom::types::CompleteStr;
use nom::*;

use crate::{
    db::{Database, HttpRecord, MtuRecord, Record, TcpRecord},
    error::Error,
    http::{Header as HttpHeader, Signature as HttpSignature, Version as HttpVersion},
    tcp::{IpVersion, PayloadSize, Quirks, Signature as TcpSignature, TcpOption, WindowSize, TTL},
    Direction, Label, Type,
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Section {
    Mtu,
    Tcp(Direction),
    Http(Direction),
}

/// What the next meaningful directive in a section must be. `sys` is
/// required between a user-app (`!`) label and its signatures.
#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    NeedLabel,
    NeedSys,
    NeedSig,
}

impl FromStr for Database {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut classes = vec![];
        let mut ua_os = vec![];
        let mut mtu: Vec<MtuRecord> = vec![];
        let mut tcp_request: Vec<TcpRecord> = vec![];
        let mut tcp_response: Vec<TcpRecord> = vec![];
        let mut http_request: Vec<HttpRecord> = vec![];
        let mut http_response: Vec<HttpRecord> = vec![];

        let mut section = None;
        let mut state = State::NeedLabel;
        let mut mtu_label: Option<String> = None;
        let mut label: Option<Label> = None;

        for (index, line) in s.lines().enumerate() {
            let number = index + 1;
            let line = CompleteStr(line.trim());

            if line.is_empty() || line.starts_with(";") {
                continue;
            }

            if line.starts_with("classes") {
                classes.append(
                    &mut parse_classes(line)
                        .map_err(|err| parse_error(number, format_args!("fail to parse `classes`: {}", err)))?
                        .1,
                );
                continue;
            }

            if line.starts_with("ua_os") {
                ua_os.append(
                    &mut parse_ua_os(line)
                        .map_err(|err| parse_error(number, format_args!("fail to parse `ua_os`: {}", err)))?
                        .1,
                );
                continue;
            }

            if line.starts_with("[") {
                section = Some(parse_section(&line, number)?);
                state = State::NeedLabel;
                label = None;
                mtu_label = None;
                continue;
            }

            let (_, (name, value)) = parse_named_value(line)
                .map_err(|err| parse_error(number, format_args!("fail to parse directive: {}", err)))?;
            let value = value.trim();

            let section = section
                .ok_or_else(|| parse_error(number, format_args!("directive outside a section: {}", line)))?;

            match (name.as_ref(), section) {
                ("label", Section::Mtu) => {
                    if state == State::NeedSys {
                        return Err(parse_error(number, format_args!("misplaced `label`")));
                    }

                    mtu_label = Some(value.to_owned());
                    state = State::NeedSig;
                }
                ("sig", Section::Mtu) => {
                    if state != State::NeedSig {
                        return Err(parse_error(number, format_args!("misplaced `sig`")));
                    }

                    let label = mtu_label
                        .clone()
                        .ok_or_else(|| parse_error(number, format_args!("`sig` without `label`")))?;
                    let value_mtu = parse_mtu(value).map_err(|err| err.at_line(number))?;

                    trace!("`{}` MTU : {}", label, value_mtu);

                    mtu.push(MtuRecord {
                        label,
                        mtu: value_mtu,
                        raw: value.to_owned(),
                        line: number,
                    });
                }
                ("label", Section::Tcp(_)) | ("label", Section::Http(_)) => {
                    if state == State::NeedSys {
                        return Err(parse_error(number, format_args!("misplaced `label`")));
                    }

                    let parsed: Label = value.parse().map_err(|err: Error| err.at_line(number))?;

                    state = if parsed.is_user_app() {
                        State::NeedSys
                    } else {
                        State::NeedSig
                    };
                    label = Some(parsed);
                }
                ("sys", Section::Tcp(_)) | ("sys", Section::Http(_)) => {
                    if state != State::NeedSys {
                        return Err(parse_error(number, format_args!("misplaced `sys`")));
                    }

                    if let Some(label) = label.as_mut() {
                        label.sys = value.split(',').map(|s| s.trim().to_owned()).collect();
                    }
                    state = State::NeedSig;
                }
                ("sig", Section::Tcp(direction)) => {
                    if state != State::NeedSig {
                        return Err(parse_error(number, format_args!("misplaced `sig`")));
                    }

                    let label = label
                        .clone()
                        .ok_or_else(|| parse_error(number, format_args!("`sig` without `label`")))?;
                    let signature: TcpSignature =
                        value.parse().map_err(|err: Error| err.at_line(number))?;

                    trace!("sig for `{}` tcp {:?}: {}", label, direction, signature);

                    let bucket = match direction {
                        Direction::ClientToServer => &mut tcp_request,
                        Direction::ServerToClient => &mut tcp_response,
                    };
                    bucket.push(Record {
                        label,
                        signature,
                        raw: value.to_owned(),
                        line: number,
                    });
                }
                ("sig", Section::Http(direction)) => {
                    if state != State::NeedSig {
                        return Err(parse_error(number, format_args!("misplaced `sig`")));
                    }

                    let label = label
                        .clone()
                        .ok_or_else(|| parse_error(number, format_args!("`sig` without `label`")))?;
                    let signature: HttpSignature =
                        value.parse().map_err(|err: Error| err.at_line(number))?;

                    trace!("sig for `{}` http {:?}: {}", label, direction, signature);

                    let bucket = match direction {
                        Direction::ClientToServer => &mut http_request,
                        Direction::ServerToClient => &mut http_response,
                    };
                    bucket.push(Record {
                        label,
                        signature,
                        raw: value.to_owned(),
                        line: number,
                    });
                }
                (name, _) => {
                    return Err(parse_error(
                        number,
                        format_args!("unrecognized directive `{}`", name),
                    ));
                }
            }
        }

        Ok(Database {
            classes,
            ua_os,
            mtu,
            tcp_request,
            tcp_response,
            http_request,
            http_response,
        })
    }
}

fn parse_error(line: usize, message: std::fmt::Arguments) -> Error {
    Error::Parse {
        line,
        message: message.to_string(),
    }
}

fn parse_section(line: &str, number: usize) -> Result<Section, Error> {
    let (_, (module, direction)) = parse_section_header(CompleteStr(line))
        .map_err(|err| parse_error(number, format_args!("fail to parse section: {}", err)))?;

    match (module.as_ref(), direction.as_ref().map(|s| s.as_ref())) {
        ("mtu", None) => Ok(Section::Mtu),
        ("tcp", Some("request")) => Ok(Section::Tcp(Direction::ClientToServer)),
        ("tcp", Some("response")) => Ok(Section::Tcp(Direction::ServerToClient)),
        ("http", Some("request")) => Ok(Section::Http(Direction::ClientToServer)),
        ("http", Some("response")) => Ok(Section::Http(Direction::ServerToClient)),
        _ => Err(parse_error(
            number,
            format_args!("unknown section: {}", line),
        )),
    }
}

pub(crate) fn parse_mtu(s: &str) -> Result<u16, Error> {
    number_in_range(s, 1, 65535)
        .map(|n| n as u16)
        .map_err(|_| Error::field(format!("MTU value out of range: {:?}", s)))
}

/// Parse a decimal field and check it against an inclusive range.
fn number_in_range(s: &str, min: u32, max: u32) -> Result<u32, ()> {
    match s.parse::<u32>() {
        Ok(n) if n >= min && n <= max => Ok(n),
        _ => Err(()),
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $parse:ident) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (remaining, res) = $parse(CompleteStr(s)).map_err(|err| {
                    Error::field(format!("parse {} failed: {}, {}", stringify!($ty), s, err))
                })?;

                if !remaining.is_empty() {
                    Err(Error::field(format!(
                        "parse {} failed, remaining: {}",
                        stringify!($ty),
                        remaining
                    )))
                } else {
                    Ok(res)
                }
            }
        }
    };
}

impl_from_str!(Label, parse_label);
impl_from_str!(Type, parse_type);
impl_from_str!(IpVersion, parse_ip_version);
impl_from_str!(TTL, parse_ttl);
impl_from_str!(WindowSize, parse_window_size);
impl_from_str!(TcpOption, parse_tcp_option);
impl_from_str!(Quirks, parse_quirk);
impl_from_str!(PayloadSize, parse_payload_size);
impl_from_str!(HttpSignature, parse_http_signature);
impl_from_str!(HttpHeader, parse_http_header);

impl FromStr for TcpSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (remaining, res) = parse_tcp_signature(CompleteStr(s))
            .map_err(|err| Error::field(format!("parse TcpSignature failed: {}, {}", s, err)))?;

        if !remaining.is_empty() {
            return Err(Error::field(format!(
                "parse TcpSignature failed, remaining: {}",
                remaining
            )));
        }

        res.validate()?;

        Ok(res)
    }
}

named!(parse_named_value<CompleteStr, (CompleteStr, CompleteStr)>, do_parse!(
    name: alphanumeric >>
    space0 >> tag!("=") >> space0 >>
    value: rest >>
    ( (name, value) )
));

named!(parse_classes<CompleteStr, Vec<String>>, do_parse!(
    tag!("classes") >> space0 >> tag!("=") >> space0 >>
    classes: separated_list!(tag!(","), alphanumeric) >>
    (
        classes.into_iter().map(|s| s.to_string()).collect()
    )
));

named!(parse_section_header<CompleteStr, (CompleteStr, Option<CompleteStr>)>, do_parse!(
    tag!("[") >>
    module: alpha >>
    direction: opt!(preceded!(tag!(":"), alpha)) >>
    tag!("]") >>
    ( (module, direction) )
));

named!(parse_ua_os<CompleteStr, Vec<(String, Option<String>)>>, do_parse!(
    tag!("ua_os") >> space0 >> tag!("=") >> space0 >>
    values: separated_list!(tag!(","), parse_key_value) >>
    (
        values.into_iter().map(|(name, value)| (name.to_string(), value.map(|s| s.to_string()))).collect()
    )
));

#[rustfmt::skip]
named!(
    parse_label<CompleteStr, Label>,
    do_parse!(
        ty: parse_type >>
        tag!(":") >>
        class: alt!(
            tag!("!") => { |_| None } |
            take_until!(":") => { |s: CompleteStr| Some(s.to_string()) }
        ) >>
        tag!(":") >>
        name: take_until_and_consume!(":") >>
        flavor: rest >>
        (
            Label {
                ty,
                class,
                name: name.to_string(),
                flavor: if flavor.is_empty() {
                    None
                } else {
                    Some(flavor.to_string())
                },
                sys: vec![],
            }
        )
    )
);

named!(parse_type<CompleteStr, Type>, alt!(
    tag!("s") => { |_| Type::Specified } |
    tag!("g") => { |_| Type::Generic }
));

#[rustfmt::skip]
named!(
    parse_tcp_signature<CompleteStr, TcpSignature>,
    do_parse!(
        version: parse_ip_version >>
        tag!(":") >>
        ittl: parse_ttl >>
        tag!(":") >>
        olen: map_res!(digit, |s: CompleteStr| s.parse()) >>
        tag!(":") >>
        mss: alt!(
            tag!("*")                                   => { |_| None } |
            map_res!(digit, |s: CompleteStr| s.parse()) => { |n| Some(n) }
        ) >>
        tag!(":") >>
        wsize: parse_window_size >>
        tag!(",") >>
        wscale: alt!(
            tag!("*")                                   => { |_| None } |
            map_res!(digit, |s: CompleteStr| s.parse()) => { |n| Some(n) }
        ) >>
        tag!(":") >>
        olayout: separated_nonempty_list!(tag!(","), parse_tcp_option) >>
        tag!(":") >>
        quirks: separated_list!(tag!(","), parse_quirk) >>
        tag!(":") >>
        pclass: parse_payload_size >>
        (
            TcpSignature {
                version,
                ittl,
                olen,
                mss,
                wsize,
                wscale,
                olayout,
                quirks: quirks.into_iter().fold(Quirks::empty(), |acc, quirk| acc | quirk),
                pclass,
            }
        )
    )
);

named!(parse_ip_version<CompleteStr, IpVersion>, alt!(
    tag!("4") => { |_| IpVersion::V4 } |
    tag!("6") => { |_| IpVersion::V6 } |
    tag!("*") => { |_| IpVersion::Any }
));

named!(parse_ttl<CompleteStr, TTL>, alt_complete!(
    terminated!(parse_ttl_value, tag!("-")) => { |ttl| TTL::Bad(ttl) } |
    map_res!(
        separated_pair!(parse_ttl_value, tag!("+"), map_res!(digit, |s: CompleteStr| s.parse::<u8>())),
        |(ttl, distance): (u8, u8)| if (ttl as u16) + (distance as u16) <= 255 {
            Ok(TTL::Distance(ttl, distance))
        } else {
            Err(())
        }
    ) |
    parse_ttl_value => { |ttl| TTL::Value(ttl) }
));

named!(parse_ttl_value<CompleteStr, u8>, map_res!(digit, |s: CompleteStr| {
    number_in_range(&s, 1, 255).map(|n| n as u8)
}));

named!(parse_window_size<CompleteStr, WindowSize>, alt_complete!(
    tag!("*") => { |_| WindowSize::Any } |
    map_res!(preceded!(tag!("mss*"), digit), |s: CompleteStr| number_in_range(&s, 1, 1000)) => { |n| WindowSize::MSS(n as u16) } |
    map_res!(preceded!(tag!("mtu*"), digit), |s: CompleteStr| number_in_range(&s, 1, 1000)) => { |n| WindowSize::MTU(n as u16) } |
    map_res!(preceded!(tag!("%"), digit), |s: CompleteStr| number_in_range(&s, 2, 65535)) => { |n| WindowSize::Mod(n as u16) } |
    map_res!(digit, |s: CompleteStr| s.parse()) => { |n| WindowSize::Value(n) }
));

named!(parse_tcp_option<CompleteStr, TcpOption>, alt_complete!(
    map_res!(preceded!(tag!("eol+"), digit), |s: CompleteStr| s.parse()) => { |n| TcpOption::EOL(n) } |
    tag!("nop")     => { |_| TcpOption::NOP } |
    tag!("mss")     => { |_| TcpOption::MSS } |
    tag!("ws")      => { |_| TcpOption::WS } |
    tag!("sok")     => { |_| TcpOption::SOK } |
    tag!("sack")    => { |_| TcpOption::SACK } |
    tag!("ts")      => { |_| TcpOption::TS } |
    map_res!(preceded!(tag!("?"), digit), |s: CompleteStr| s.parse()) => { |n| TcpOption::Unknown(n) }
));

named!(parse_quirk<CompleteStr, Quirks>, alt_complete!(
    tag!("df")      => { |_| Quirks::DF } |
    tag!("id+")     => { |_| Quirks::NZ_ID } |
    tag!("id-")     => { |_| Quirks::ZERO_ID } |
    tag!("ecn")     => { |_| Quirks::ECN } |
    tag!("0+")      => { |_| Quirks::NZ_MBZ } |
    tag!("flow")    => { |_| Quirks::FLOW } |
    tag!("seq-")    => { |_| Quirks::ZERO_SEQ } |
    tag!("ack+")    => { |_| Quirks::NZ_ACK } |
    tag!("ack-")    => { |_| Quirks::ZERO_ACK } |
    tag!("uptr+")   => { |_| Quirks::NZ_URG } |
    tag!("urgf+")   => { |_| Quirks::URG } |
    tag!("pushf+")  => { |_| Quirks::PUSH } |
    tag!("ts1-")    => { |_| Quirks::OPT_ZERO_TS1 } |
    tag!("ts2+")    => { |_| Quirks::OPT_NZ_TS2 } |
    tag!("opt+")    => { |_| Quirks::OPT_EOL_NZ } |
    tag!("exws")    => { |_| Quirks::OPT_EXWS } |
    tag!("bad")     => { |_| Quirks::OPT_BAD }
));

named!(parse_payload_size<CompleteStr, PayloadSize>, alt!(
    tag!("0") => { |_| PayloadSize::Zero } |
    tag!("+") => { |_| PayloadSize::NonZero } |
    tag!("*") => { |_| PayloadSize::Any }
));

named!(parse_http_signature<CompleteStr, HttpSignature>, do_parse!(
    version: parse_http_version >>
    tag!(":") >>
    horder: separated_nonempty_list!(tag!(","), parse_http_header) >>
    tag!(":") >>
    habsent: opt!(separated_list_complete!(tag!(","), parse_http_header)) >>
    tag!(":") >>
    expsw: rest >>
    (
        HttpSignature {
            version,
            horder,
            habsent: habsent.unwrap_or_default(),
            expsw: expsw.to_string(),
        }
    )
));

named!(parse_http_version<CompleteStr, HttpVersion>, alt!(
    tag!("0") => { |_| HttpVersion::V10 } |
    tag!("1") => { |_| HttpVersion::V11 } |
    tag!("*") => { |_| HttpVersion::Any }
));

named!(parse_http_header<CompleteStr, HttpHeader>, do_parse!(
    optional: opt!(tag!("?")) >>
    kv: parse_key_value >>
    (
        HttpHeader {
            optional: optional.is_some(),
            name: kv.0.to_string(),
            value: kv.1.map(|s| s.to_string()),
        }
    )
));

named!(parse_key_value<CompleteStr, (CompleteStr, Option<CompleteStr>)>, pair!(
    take_while!(|c: char| (c.is_ascii_alphanumeric() || c == '-' || c == ' ') && c != ':' && c != '='),
    opt!(preceded!(tag!("=["), take_until_and_consume!("]")))
));

#[cfg(test)]
mod tests {
    use lazy_static::lazy_static;

    use super::*;
    use crate::http::header;
    use crate::tcp::TcpOption::*;

    lazy_static! {
        static ref LABELS: Vec<(&'static str, Label)> = vec![
            (
                "s:!:Uncle John's Networked ls Utility:2.3.0.1",
                Label {
                    ty: Type::Specified,
                    class: None,
                    name: "Uncle John's Networked ls Utility".to_owned(),
                    flavor: Some("2.3.0.1".to_owned()),
                    sys: vec![],
                },
            ),
            (
                "s:unix:Linux:3.11 and newer",
                Label {
                    ty: Type::Specified,
                    class: Some("unix".to_owned()),
                    name: "Linux".to_owned(),
                    flavor: Some("3.11 and newer".to_owned()),
                    sys: vec![],
                },
            ),
            (
                "g:win:Windows:NT kernel",
                Label {
                    ty: Type::Generic,
                    class: Some("win".to_owned()),
                    name: "Windows".to_owned(),
                    flavor: Some("NT kernel".to_owned()),
                    sys: vec![],
                },
            ),
            (
                "s:!:curl:",
                Label {
                    ty: Type::Specified,
                    class: None,
                    name: "curl".to_owned(),
                    flavor: None,
                    sys: vec![],
                },
            )
        ];
        static ref TCP_SIGNATURES: Vec<(&'static str, TcpSignature)> = vec![
            (
                "*:64:0:*:mss*20,10:mss,sok,ts,nop,ws:df,id+:0",
                TcpSignature {
                    version: IpVersion::Any,
                    ittl: TTL::Value(64),
                    olen: 0,
                    mss: None,
                    wsize: WindowSize::MSS(20),
                    wscale: Some(10),
                    olayout: vec![MSS, SOK, TS, NOP, WS],
                    quirks: Quirks::DF | Quirks::NZ_ID,
                    pclass: PayloadSize::Zero,
                }
            ),
            (
                "*:64:0:*:16384,0:mss::0",
                TcpSignature {
                    version: IpVersion::Any,
                    ittl: TTL::Value(64),
                    olen: 0,
                    mss: None,
                    wsize: WindowSize::Value(16384),
                    wscale: Some(0),
                    olayout: vec![MSS],
                    quirks: Quirks::empty(),
                    pclass: PayloadSize::Zero,
                }
            ),
            (
                "4:128:0:1460:mtu*2,0:mss,nop,ws::0",
                TcpSignature {
                    version: IpVersion::V4,
                    ittl: TTL::Value(128),
                    olen: 0,
                    mss: Some(1460),
                    wsize: WindowSize::MTU(2),
                    wscale: Some(0),
                    olayout: vec![MSS, NOP, WS],
                    quirks: Quirks::empty(),
                    pclass: PayloadSize::Zero,
                }
            ),
            (
                "*:64-:0:265:%512,0:mss,sok,ts:ack+:0",
                TcpSignature {
                    version: IpVersion::Any,
                    ittl: TTL::Bad(64),
                    olen: 0,
                    mss: Some(265),
                    wsize: WindowSize::Mod(512),
                    wscale: Some(0),
                    olayout: vec![MSS, SOK, TS],
                    quirks: Quirks::NZ_ACK,
                    pclass: PayloadSize::Zero,
                }
            ),
            (
                "6:54+10:0:*:*,*:mss,eol+2,?133:flow,seq-:*",
                TcpSignature {
                    version: IpVersion::V6,
                    ittl: TTL::Distance(54, 10),
                    olen: 0,
                    mss: None,
                    wsize: WindowSize::Any,
                    wscale: None,
                    olayout: vec![MSS, EOL(2), Unknown(133)],
                    quirks: Quirks::FLOW | Quirks::ZERO_SEQ,
                    pclass: PayloadSize::Any,
                }
            )
        ];
        static ref TTLS: Vec<(&'static str, TTL)> = vec![
            (
                "64",
                TTL::Value(64)
            ),
            (
                "54+10",
                TTL::Distance(54, 10)
            ),
            (
                "64-",
                TTL::Bad(64)
            )
        ];
        static ref HTTP_SIGNATURES: Vec<(&'static str, HttpSignature)> = vec![
            (
                "*:Host,User-Agent,Accept=[,*/*;q=],?Accept-Language,Accept-Encoding=[gzip,deflate],Accept-Charset=[utf-8;q=0.7,*;q=0.7],Keep-Alive=[300],Connection=[keep-alive]::Firefox/",
                HttpSignature {
                    version: HttpVersion::Any,
                    horder: vec![
                        header("Host"),
                        header("User-Agent"),
                        header("Accept").with_value(",*/*;q="),
                        header("Accept-Language").optional(),
                        header("Accept-Encoding").with_value("gzip,deflate"),
                        header("Accept-Charset").with_value("utf-8;q=0.7,*;q=0.7"),
                        header("Keep-Alive").with_value("300"),
                        header("Connection").with_value("keep-alive"),
                    ],
                    habsent: vec![],
                    expsw: "Firefox/".to_owned(),
                }
            ),
            (
                "1:Server,Date:Keep-Alive:Apache",
                HttpSignature {
                    version: HttpVersion::V11,
                    horder: vec![header("Server"), header("Date")],
                    habsent: vec![header("Keep-Alive")],
                    expsw: "Apache".to_owned(),
                }
            )
        ];
        static ref HTTP_HEADERS: Vec<(&'static str, HttpHeader)> = vec![
            ("Host", HttpHeader{ optional: false, name: "Host".to_owned(), value: None}),
            ("User-Agent", HttpHeader{ optional: false, name: "User-Agent".to_owned(), value: None}),
            ("Accept=[,*/*;q=]", HttpHeader{ optional: false, name: "Accept".to_owned(), value: Some(",*/*;q=".to_owned())}),
            ("?Accept-Language", HttpHeader{ optional: true, name: "Accept-Language".to_owned(), value: None}),
        ];
    }

    #[test]
    fn test_label() {
        for (s, l) in LABELS.iter() {
            assert_eq!(&s.parse::<Label>().unwrap(), l);
            assert_eq!(&l.to_string(), s);
        }
    }

    #[test]
    fn test_tcp_signature() {
        for (s, sig) in TCP_SIGNATURES.iter() {
            assert_eq!(&s.parse::<TcpSignature>().unwrap(), sig);
            assert_eq!(&sig.to_string(), s);
        }
    }

    #[test]
    fn test_ttl() {
        for (s, ttl) in TTLS.iter() {
            assert_eq!(&s.parse::<TTL>().unwrap(), ttl);
            assert_eq!(&ttl.to_string(), s);
        }
    }

    #[test]
    fn test_ttl_out_of_range() {
        assert!("0".parse::<TTL>().is_err());
        assert!("256".parse::<TTL>().is_err());
        assert!("200+100".parse::<TTL>().is_err());
    }

    #[test]
    fn test_window_size_ranges() {
        assert!("mss*1000".parse::<WindowSize>().is_ok());
        assert!("mss*1001".parse::<WindowSize>().is_err());
        assert!("mtu*0".parse::<WindowSize>().is_err());
        assert!("%1".parse::<WindowSize>().is_err());
        assert!("%2".parse::<WindowSize>().is_ok());
        assert!("65536".parse::<WindowSize>().is_err());
    }

    #[test]
    fn test_quirk_version_cross_check() {
        assert!("4:64:0:*:8192,0:mss:flow:0".parse::<TcpSignature>().is_err());
        assert!("6:64:0:*:8192,0:mss:df:0".parse::<TcpSignature>().is_err());
        assert!("6:64:0:*:8192,0:mss:id+:0".parse::<TcpSignature>().is_err());
        assert!("*:64:0:*:8192,0:mss:df,flow:0".parse::<TcpSignature>().is_ok());
    }

    #[test]
    fn test_http_signature() {
        for (s, sig) in HTTP_SIGNATURES.iter() {
            assert_eq!(&s.parse::<HttpSignature>().unwrap(), sig);
            assert_eq!(&sig.to_string(), s);
        }
    }

    #[test]
    fn test_http_header() {
        for (s, h) in HTTP_HEADERS.iter() {
            assert_eq!(&s.parse::<HttpHeader>().unwrap(), h);
            assert_eq!(&h.to_string(), s);
        }
    }

    #[test]
    fn test_misplaced_directives() {
        match "[tcp:request]\nsig = *:64:0:*:8192,0:mss::0"
            .parse::<Database>()
            .unwrap_err()
        {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            err => panic!("unexpected error: {}", err),
        }

        // A user-app label must declare `sys` before its signatures.
        assert!("[http:request]\nlabel = s:!:wget:\nsig = *:Host::Wget/"
            .parse::<Database>()
            .is_err());

        assert!("[mtu]\nlabel = DSL\nsys = unix"
            .parse::<Database>()
            .is_err());

        assert!("label = s:unix:Linux:3.x".parse::<Database>().is_err());

        assert!("[tcp]\n".parse::<Database>().is_err());
    }

    #[test]
    fn test_state_machine_accepts_interleaved_labels() {
        let db: Database = "\
            [tcp:request]\n\
            label = s:unix:Linux:2.6.x\n\
            sig   = *:64:0:*:mss*4,6:mss,sok,ts,nop,ws:df,id+:0\n\
            sig   = *:64:0:*:mss*4,7:mss,sok,ts,nop,ws:df,id+:0\n\
            label = s:win:Windows:XP\n\
            sig   = *:128:0:*:16384,0:mss,nop,nop,sok:df,id+:0\n"
            .parse()
            .unwrap();

        assert_eq!(db.tcp_request.len(), 3);
        assert_eq!(db.tcp_request[1].label.to_string(), "s:unix:Linux:2.6.x");
        assert_eq!(db.tcp_request[2].line, 6);
    }

    #[test]
    fn test_sys_applies_to_user_app_label() {
        let db: Database = "\
            [http:request]\n\
            label = s:!:wget:\n\
            sys   = @unix,win\n\
            sig   = *:Host,User-Agent::Wget/\n"
            .parse()
            .unwrap();

        assert_eq!(db.http_request[0].label.sys, vec!["@unix", "win"]);
    }

    #[test]
    fn test_mtu_value_range() {
        assert!("[mtu]\nlabel = bogus\nsig = 0".parse::<Database>().is_err());
        assert!("[mtu]\nlabel = bogus\nsig = 65536".parse::<Database>().is_err());
    }
}
