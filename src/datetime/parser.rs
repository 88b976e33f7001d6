use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use combine::{
    error::UnexpectedParse,
    parser::{
        byte::digit,
        choice::{choice, optional},
        range::recognize,
        repeat::skip_many1,
        token::{satisfy, token},
    },
    Parser,
};

pub fn date_time<'a>() -> impl Parser<&'a [u8], Output = DateTime<FixedOffset>> {
    (date(), separator(), time_of_day(), optional(zone())).and_then(
        |(date, _, time, zone)| {
            let offset = zone.unwrap_or_else(|| Utc.fix());
            offset
                .from_local_datetime(&NaiveDateTime::new(date, time))
                .single()
                .ok_or(UnexpectedParse::Unexpected)
        },
    )
}

pub fn date<'a>() -> impl Parser<&'a [u8], Output = NaiveDate> {
    (
        four_digits(), // year
        token(b'-'),
        two_digits(), // month
        token(b'-'),
        two_digits(), // day
    )
        .and_then(|(year, _, month, _, day)| {
            NaiveDate::from_ymd_opt(year as i32, month, day).ok_or(UnexpectedParse::Unexpected)
        })
}

fn separator<'a>() -> impl Parser<&'a [u8], Output = u8> {
    satisfy(|b: u8| b == b'T' || b == b't' || b == b' ')
}

fn time_of_day<'a>() -> impl Parser<&'a [u8], Output = NaiveTime> {
    (
        two_digits(), // hour
        token(b':'),
        two_digits(), // minute
        optional((
            token(b':'),
            two_digits(), // second
            optional(fraction()),
        )),
    )
        .and_then(|(hour, _, minute, rest)| {
            let (second, nano) = match rest {
                Some((_, second, fraction)) => (second, fraction.unwrap_or(0)),
                None => (0, 0),
            };
            // A leap second is folded into the nanoseconds of the 59th.
            let (second, nano) = match second {
                60 => (59, nano + 1_000_000_000),
                sec => (sec, nano),
            };
            NaiveTime::from_hms_nano_opt(hour, minute, second, nano)
                .ok_or(UnexpectedParse::Unexpected)
        })
}

fn fraction<'a>() -> impl Parser<&'a [u8], Output = u32> {
    (
        satisfy(|b: u8| b == b'.' || b == b','),
        recognize(skip_many1(digit())),
    )
        .map(|(_, digits): (_, &[u8])| {
            // Nanosecond precision; anything finer is dropped.
            (0..9).fold(0, |nano, i| {
                nano * 10 + digits.get(i).map_or(0, |&d| atoi(d))
            })
        })
}

fn zone<'a>() -> impl Parser<&'a [u8], Output = FixedOffset> {
    choice((
        satisfy(|b: u8| b == b'Z' || b == b'z').map(|_| Utc.fix()),
        (
            satisfy(|b: u8| b == b'+' || b == b'-'),
            two_digits(),
            optional(token(b':')),
            two_digits(),
        )
            .and_then(|(op, hour, _, minute)| {
                let secs = (hour * 3600 + minute * 60) as i32;
                FixedOffset::east_opt(if op == b'-' { -secs } else { secs })
                    .ok_or(UnexpectedParse::Unexpected)
            }),
    ))
}

fn two_digits<'a>() -> impl Parser<&'a [u8], Output = u32> {
    (digit(), digit()).map(|(d1, d2)| atoi(d1) * 10 + atoi(d2))
}

fn four_digits<'a>() -> impl Parser<&'a [u8], Output = u32> {
    (two_digits(), two_digits()).map(|(high, low)| high * 100 + low)
}

fn atoi(a: u8) -> u32 {
    u32::from(a - b'0')
}
