//! Permissive date parsing.
//!
//! Feed dates arrive in every grammar ever shipped by a blogging tool: RFC
//! 822 with proprietary two-letter timezones, W3C date-time with field
//! overflow, bare ISO 8601 fragments, and a handful of localized formats.
//! [`parse_date_at`] tries an ordered battery of handlers; each either
//! produces a normalized UTC [`FeedDate`] or fails silently and the next one
//! runs. A date no handler understands is simply absent, never an error.

use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::FeedDate;

/// Parse with the real current date for ISO 8601 defaulting.
pub fn parse_date(value: &str) -> Option<FeedDate> {
    parse_date_at(value, Utc::now().date_naive())
}

/// Parse with an injected "today", so current-year/current-day defaulting is
/// deterministic under test.
pub fn parse_date_at(value: &str, today: NaiveDate) -> Option<FeedDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    parse_rfc822(value)
        .or_else(|| parse_hungarian(value))
        .or_else(|| parse_greek(value))
        .or_else(|| parse_mssql(value))
        .or_else(|| parse_onblog(value))
        .or_else(|| parse_nate(value))
        .or_else(|| parse_w3dtf(value))
        .or_else(|| parse_iso8601(value, today))
}

// ============================================================================
// Shared normalization
// ============================================================================

/// Carry overflowing fields upward: seconds into minutes, minutes into
/// hours, hours into days, months into years, and day-of-month overflow
/// against the actual length of each resulting month.
fn rollover(
    mut year: i32,
    mut month: u32,
    mut day: u32,
    mut hour: u32,
    mut minute: u32,
    mut second: u32,
) -> Option<(i32, u32, u32, u32, u32, u32)> {
    if month == 0 || day == 0 {
        return None;
    }
    minute += second / 60;
    second %= 60;
    hour += minute / 60;
    minute %= 60;
    day += hour / 24;
    hour %= 24;
    year += ((month - 1) / 12) as i32;
    month = (month - 1) % 12 + 1;
    loop {
        let in_month = days_in_month(year, month);
        if day <= in_month {
            break;
        }
        day -= in_month;
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    Some((year, month, day, hour, minute, second))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 31,
    }
}

/// Normalize local fields + zone offset (minutes east of UTC) to a UTC date.
fn to_utc(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    offset_minutes: i32,
) -> Option<FeedDate> {
    let (year, month, day, hour, minute, second) =
        rollover(year, month, day, hour, minute, second)?;
    let local = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let utc = local - Duration::minutes(offset_minutes as i64);
    FeedDate::from_ymd_hms(
        utc.year(),
        utc.month(),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second(),
    )
}

/// `Z`, `±hh`, `±hhmm`, `±hh:mm` → minutes east of UTC.
fn parse_zone_offset(zone: &str) -> Option<i32> {
    if zone.eq_ignore_ascii_case("z") {
        return Some(0);
    }
    let (sign, rest) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        3 => (digits[..1].parse::<i32>().ok()?, digits[1..].parse::<i32>().ok()?),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    Some(sign * (hours * 60 + minutes))
}

// ============================================================================
// RFC 822 / 2822 / 1123 / asctime
// ============================================================================

const MONTH_ABBREVS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Named zones, including the proprietary two-letter forms some publishing
/// tools emit ("ET" for US Eastern and friends).
fn named_zone_offset(zone: &str) -> Option<i32> {
    let minutes = match zone.to_ascii_lowercase().as_str() {
        "ut" | "gmt" | "utc" | "z" => 0,
        "est" => -5 * 60,
        "edt" => -4 * 60,
        "cst" => -6 * 60,
        "cdt" => -5 * 60,
        "mst" => -7 * 60,
        "mdt" => -6 * 60,
        "pst" => -8 * 60,
        "pdt" => -7 * 60,
        "at" => -4 * 60,
        "et" => -5 * 60,
        "ct" => -6 * 60,
        "mt" => -7 * 60,
        "pt" => -8 * 60,
        _ => return None,
    };
    Some(minutes)
}

/// Month token → 1-12, repairing non-3-letter abbreviations ("January",
/// "Sept") by truncating the alphabetic prefix to three letters.
fn month_number(token: &str) -> Option<u32> {
    let alpha: String = token
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_ascii_lowercase();
    MONTH_ABBREVS
        .iter()
        .position(|m| *m == alpha)
        .map(|i| i as u32 + 1)
}

fn two_digit_year(year: i32) -> i32 {
    if year < 100 {
        if year < 70 {
            year + 2000
        } else {
            year + 1900
        }
    } else {
        year
    }
}

fn parse_hms(token: &str) -> Option<(u32, u32, u32)> {
    let mut pieces = token.split(':');
    let hour = pieces.next()?.parse().ok()?;
    let minute = pieces.next()?.parse().ok()?;
    let second = match pieces.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if pieces.next().is_some() {
        return None;
    }
    Some((hour, minute, second))
}

/// "Mon, 01 Jan 2024 00:00:00 GMT" and friends, plus asctime
/// ("Sun Jan  4 16:29:06 PST 2004"). Unknown zone names are treated as UTC
/// rather than failing the whole handler.
fn parse_rfc822(value: &str) -> Option<FeedDate> {
    let mut tokens: Vec<&str> = value
        .split([' ', '\t'])
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }

    // Optional leading weekday, with or without the comma
    let first = tokens[0].trim_end_matches(',');
    if month_number(first).is_none() && first.chars().all(|c| c.is_ascii_alphabetic()) {
        tokens.remove(0);
    }
    if tokens.len() < 3 {
        return None;
    }

    let (year, month, day, time_token, zone_token);
    if tokens[0].chars().all(|c| c.is_ascii_digit()) {
        // day month year time [zone]
        day = tokens[0].parse().ok()?;
        month = month_number(tokens[1])?;
        year = two_digit_year(tokens[2].parse().ok()?);
        time_token = tokens.get(3).copied();
        zone_token = tokens.get(4).copied();
        if tokens.len() > 5 {
            return None;
        }
    } else {
        // asctime: month day time year
        if tokens.len() < 4 {
            return None;
        }
        month = month_number(tokens[0])?;
        day = tokens[1].parse().ok()?;
        time_token = Some(tokens[2]);
        let (zone, year_token) = if tokens.len() == 5 {
            (Some(tokens[3]), tokens[4])
        } else {
            (None, tokens[3])
        };
        zone_token = zone;
        year = two_digit_year(year_token.parse().ok()?);
        if tokens.len() > 5 {
            return None;
        }
    }

    let (hour, minute, second) = match time_token {
        Some(t) => parse_hms(t)?,
        None => (0, 0, 0),
    };
    let offset = match zone_token {
        Some(z) => named_zone_offset(z)
            .or_else(|| parse_zone_offset(z))
            .unwrap_or(0),
        None => 0,
    };
    if !(1..=9999).contains(&year) || day == 0 || day > 31 {
        return None;
    }
    to_utc(year, month, day, hour, minute, second, offset)
}

// ============================================================================
// Localized variants that re-dispatch
// ============================================================================

static HUNGARIAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-([^\-T]+)-(\d{1,2})T(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([+-]\d{1,2}:\d{2})?$")
        .unwrap()
});

const HUNGARIAN_MONTHS: &[(&str, u32)] = &[
    ("január", 1),
    ("február", 2),
    ("március", 3),
    ("április", 4),
    ("május", 5),
    ("június", 6),
    ("július", 7),
    ("augusztus", 8),
    ("szeptember", 9),
    ("október", 10),
    ("november", 11),
    ("december", 12),
];

/// Hungarian W3C profile: "2004-május-03T9:27:15+1:00".
fn parse_hungarian(value: &str) -> Option<FeedDate> {
    let caps = HUNGARIAN_RE.captures(value)?;
    let month_name = caps.get(2)?.as_str().to_lowercase();
    let month = HUNGARIAN_MONTHS
        .iter()
        .find(|(name, _)| *name == month_name)
        .map(|(_, n)| *n)?;
    let rebuilt = format!(
        "{}-{:02}-{:02}T{:02}:{}:{}{}",
        caps.get(1)?.as_str(),
        month,
        caps.get(3)?.as_str().parse::<u32>().ok()?,
        caps.get(4)?.as_str().parse::<u32>().ok()?,
        caps.get(5)?.as_str(),
        caps.get(6).map(|m| m.as_str()).unwrap_or("00"),
        normalize_zone_padding(caps.get(7).map(|m| m.as_str()).unwrap_or("Z")),
    );
    parse_w3dtf(&rebuilt)
}

/// "+1:00" → "+01:00"
fn normalize_zone_padding(zone: &str) -> String {
    if let Some(rest) = zone.strip_prefix('+').or_else(|| zone.strip_prefix('-')) {
        let sign = &zone[..1];
        if let Some((h, m)) = rest.split_once(':') {
            if h.len() == 1 {
                return format!("{}0{}:{}", sign, h, m);
            }
        }
    }
    zone.to_owned()
}

static GREEK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^,]+),\s+(\d{1,2})\s+(\S+)\s+(\d{4})\s+(\d{2}):(\d{2}):(\d{2})\s+(\S+)$").unwrap());

const GREEK_WEEKDAYS: &[(&str, &str)] = &[
    ("Κυρ", "Sun"),
    ("Δευ", "Mon"),
    ("Τρι", "Tue"),
    ("Τετ", "Wed"),
    ("Πεμ", "Thu"),
    ("Παρ", "Fri"),
    ("Σαβ", "Sat"),
];

const GREEK_MONTHS: &[(&str, &str)] = &[
    ("Ιαν", "Jan"),
    ("Φεβ", "Feb"),
    ("Μάώ", "Mar"),
    ("Μαρ", "Mar"),
    ("Μάρ", "Mar"),
    ("Απρ", "Apr"),
    ("Μάι", "May"),
    ("Μαϊ", "May"),
    ("Μαι", "May"),
    ("Ιούν", "Jun"),
    ("Ιουν", "Jun"),
    ("Ιούλ", "Jul"),
    ("Ιουλ", "Jul"),
    ("Αύγ", "Aug"),
    ("Αυγ", "Aug"),
    ("Σεπ", "Sep"),
    ("Οκτ", "Oct"),
    ("Νοέ", "Nov"),
    ("Νοε", "Nov"),
    ("Δεκ", "Dec"),
];

/// Greek RFC 822 variant: translate the weekday and month, then hand the
/// rebuilt string to the RFC 822 handler.
fn parse_greek(value: &str) -> Option<FeedDate> {
    let caps = GREEK_RE.captures(value)?;
    let weekday = GREEK_WEEKDAYS
        .iter()
        .find(|(gr, _)| *gr == caps.get(1).map(|m| m.as_str().trim()).unwrap_or(""))
        .map(|(_, en)| *en)?;
    let month = GREEK_MONTHS
        .iter()
        .find(|(gr, _)| *gr == caps.get(3).map(|m| m.as_str()).unwrap_or(""))
        .map(|(_, en)| *en)?;
    let rebuilt = format!(
        "{}, {} {} {} {}:{}:{} {}",
        weekday,
        caps.get(2)?.as_str(),
        month,
        caps.get(4)?.as_str(),
        caps.get(5)?.as_str(),
        caps.get(6)?.as_str(),
        caps.get(7)?.as_str(),
        caps.get(8)?.as_str(),
    );
    parse_rfc822(&rebuilt)
}

static MSSQL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})\s+(\d{2}):(\d{2}):(\d{2})(?:\.\d+)?$").unwrap()
});

/// MS SQL dump format: "2004-07-08 23:56:58.0", taken as UTC.
fn parse_mssql(value: &str) -> Option<FeedDate> {
    let caps = MSSQL_RE.captures(value)?;
    let rebuilt = format!(
        "{}-{}-{}T{}:{}:{}Z",
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6]
    );
    parse_w3dtf(&rebuilt)
}

static ONBLOG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})년\s*(\d{1,2})월\s*(\d{1,2})일\s*(\d{1,2}):(\d{2}):(\d{2})$").unwrap()
});

/// Korean OnBlog format: "2004년 05월 16일 20:58:00" in KST.
fn parse_onblog(value: &str) -> Option<FeedDate> {
    let caps = ONBLOG_RE.captures(value)?;
    let rebuilt = format!(
        "{}-{:02}-{:02}T{:02}:{}:{}+09:00",
        &caps[1],
        caps[2].parse::<u32>().ok()?,
        caps[3].parse::<u32>().ok()?,
        caps[4].parse::<u32>().ok()?,
        &caps[5],
        &caps[6],
    );
    parse_w3dtf(&rebuilt)
}

static NATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})\s+(오전|오후)\s+(\d{1,2}):(\d{1,2}):(\d{1,2})$")
        .unwrap()
});

/// Korean Nate format: "2004-05-25 오전 11:23:17". 오전/오후 is the AM/PM
/// marker, zone is KST.
fn parse_nate(value: &str) -> Option<FeedDate> {
    let caps = NATE_RE.captures(value)?;
    let mut hour: u32 = caps[5].parse().ok()?;
    if &caps[4] == "오후" && hour < 12 {
        hour += 12;
    }
    let rebuilt = format!(
        "{}-{:02}-{:02}T{:02}:{:02}:{:02}+09:00",
        &caps[1],
        caps[2].parse::<u32>().ok()?,
        caps[3].parse::<u32>().ok()?,
        hour,
        caps[6].parse::<u32>().ok()?,
        caps[7].parse::<u32>().ok()?,
    );
    parse_w3dtf(&rebuilt)
}

// ============================================================================
// W3C date-time profile
// ============================================================================

static W3DTF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^
        (?P<year>\d{4})
        (?:-(?P<month>\d{2})(?:-(?P<day>\d{2}))?)?
        (?:[Tt\x20]
            (?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?(?:\.\d+)?
            \s*(?P<zone>[Zz]|[+-]\d{2}:?\d{2})?
        )?
        $",
    )
    .unwrap()
});

/// W3C date-time: mandatory year, everything else optional, overflowing
/// fields carried upward explicitly (so "23:61" is one minute past midnight
/// the next day, not a failure).
fn parse_w3dtf(value: &str) -> Option<FeedDate> {
    let caps = W3DTF_RE.captures(value)?;
    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    let month: u32 = match caps.name("month") {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    let day: u32 = match caps.name("day") {
        Some(d) => d.as_str().parse().ok()?,
        None => 1,
    };
    let hour: u32 = match caps.name("hour") {
        Some(h) => h.as_str().parse().ok()?,
        None => 0,
    };
    let minute: u32 = match caps.name("minute") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let second: u32 = match caps.name("second") {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    let offset = match caps.name("zone") {
        Some(z) => parse_zone_offset(z.as_str())?,
        None => 0,
    };
    to_utc(year, month, day, hour, minute, second, offset)
}

// ============================================================================
// ISO 8601
// ============================================================================

/// Optional time-of-day suffix shared by every ISO template.
const ISO_TIME: &str = r"(?:[Tt\x20]?(?P<hour>\d{2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?(?:\.\d+)?(?P<zone>[Zz]|[+-]\d{2}(?::?\d{2})?)?)?";

/// Date templates, most specific first: calendar, ordinal, week-less
/// truncated, century-only. First full match wins.
static ISO8601_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    let dates = [
        r"(?P<year>\d{4})-?(?P<month>[01]\d)-?(?P<day>[0123]\d)",
        r"(?P<year>\d{4})-0(?P<month>\d)-?(?P<day>[0123]\d)",
        r"(?P<year>\d{4})-(?P<month>[01]\d)",
        r"(?P<year>\d{4})-?(?P<ordinal>[0123]\d\d)",
        r"(?P<yy>\d\d)-?(?P<month>[01]\d)-?(?P<day>[0123]\d)",
        r"(?P<yy>\d\d)-?(?P<ordinal>[0123]\d\d)",
        r"(?P<year>\d{4})",
        r"-(?P<yy>\d\d)-?(?P<month>[01]\d)",
        r"-(?P<yy>\d\d)",
        r"--(?P<month>[01]\d)-?(?P<day>[0123]\d)",
        r"--(?P<month>[01]\d)",
        r"---(?P<day>[0123]\d)",
        r"(?P<century>\d\d)",
    ];
    dates
        .iter()
        .map(|d| Regex::new(&format!("^{}{}$", d, ISO_TIME)).unwrap())
        .collect()
});

/// The ISO 8601 sweep-up handler: whatever fragment matched, fill the
/// missing fields. A missing year is the current year; 2-digit years land in
/// the current century; a missing month/day comes from the ordinal day when
/// one was captured, defaults to 1 when some coarser field was explicit, and
/// falls back to today otherwise.
fn parse_iso8601(value: &str, today: NaiveDate) -> Option<FeedDate> {
    let caps = ISO8601_RES.iter().find_map(|re| re.captures(value))?;

    let century = caps.name("century").and_then(|c| c.as_str().parse::<i32>().ok());
    let year_explicit = caps.name("year").is_some() || caps.name("yy").is_some() || century.is_some();
    let year = if let Some(y) = caps.name("year") {
        y.as_str().parse().ok()?
    } else if let Some(yy) = caps.name("yy") {
        (today.year() / 100) * 100 + yy.as_str().parse::<i32>().ok()?
    } else if let Some(century) = century {
        century * 100
    } else {
        today.year()
    };

    let ordinal = caps
        .name("ordinal")
        .and_then(|o| o.as_str().parse::<u32>().ok());

    let (month, day) = if let Some(ordinal) = ordinal {
        let date = NaiveDate::from_yo_opt(year, ordinal.max(1))?;
        (date.month(), date.day())
    } else {
        let month_explicit = caps.name("month").is_some();
        let month = match caps.name("month") {
            Some(m) => m.as_str().parse().ok()?,
            None if year_explicit => 1,
            None => today.month(),
        };
        let day = match caps.name("day") {
            Some(d) => d.as_str().parse().ok()?,
            None if year_explicit || month_explicit => 1,
            None => today.day(),
        };
        (month, day)
    };

    let hour: u32 = match caps.name("hour") {
        Some(h) => h.as_str().parse().ok()?,
        None => 0,
    };
    let minute: u32 = match caps.name("minute") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let second: u32 = match caps.name("second") {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    let offset = match caps.name("zone") {
        Some(z) => parse_zone_offset(z.as_str())?,
        None => 0,
    };
    to_utc(year, month, day, hour, minute, second, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn parse(value: &str) -> Option<FeedDate> {
        parse_date_at(value, fixed_today())
    }

    #[test]
    fn test_rfc822_gmt() {
        let d = parse("Mon, 01 Jan 2024 00:00:00 GMT").unwrap();
        assert_eq!(d.as_tuple(), (2024, 1, 1, 0, 0, 0, 0, 1, 0));
    }

    #[test]
    fn test_rfc822_without_weekday() {
        let d = parse("01 Jan 2024 12:30 GMT").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour, d.minute), (2024, 1, 1, 12, 30));
    }

    #[test]
    fn test_rfc822_numeric_zone() {
        let d = parse("Thu, 01 Jan 2004 19:48:21 +0545").unwrap();
        assert_eq!((d.hour, d.minute, d.day), (14, 3, 1));
    }

    #[test]
    fn test_rfc822_named_zone_converts_to_utc() {
        let d = parse("Mon, 01 Jan 2024 00:00:00 EST").unwrap();
        assert_eq!((d.day, d.hour), (1, 5));
    }

    #[test]
    fn test_rfc822_two_letter_proprietary_zone() {
        let d = parse("Thu, 01 Jan 2004 19:48:21 ET").unwrap();
        assert_eq!((d.hour, d.minute, d.second), (0, 48, 21));
        assert_eq!(d.day, 2);
    }

    #[test]
    fn test_rfc822_long_month_repaired() {
        let d = parse("Mon, 26 January 2004 16:31:00 EST").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour), (2004, 1, 26, 21));
    }

    #[test]
    fn test_rfc822_two_digit_year() {
        let d = parse("Thu, 01 Jan 04 19:48:21 GMT").unwrap();
        assert_eq!(d.year, 2004);
        let d = parse("Thu, 01 Jan 99 19:48:21 GMT").unwrap();
        assert_eq!(d.year, 1999);
    }

    #[test]
    fn test_asctime() {
        let d = parse("Sun Jan  4 16:29:06 PST 2004").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour), (2004, 1, 5, 0));
    }

    #[test]
    fn test_w3dtf_utc() {
        let d = parse("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(d.as_tuple(), (2024, 1, 1, 0, 0, 0, 0, 1, 0));
    }

    #[test]
    fn test_w3dtf_numeric_zone() {
        let d = parse("2003-12-31T10:14:55-08:00").unwrap();
        assert_eq!((d.day, d.hour, d.minute), (31, 18, 14));
    }

    #[test]
    fn test_w3dtf_year_only() {
        let d = parse("2024").unwrap();
        assert_eq!((d.year, d.month, d.day), (2024, 1, 1));
    }

    #[test]
    fn test_w3dtf_minute_rollover() {
        let d = parse("2024-01-01T23:61:00Z").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour, d.minute, d.second), (2024, 1, 2, 0, 1, 0));
    }

    #[test]
    fn test_w3dtf_rollover_across_year() {
        let d = parse("2004-12-31T25:14:55Z").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour), (2005, 1, 1, 1));
    }

    #[test]
    fn test_w3dtf_leap_second_carries() {
        let d = parse("2024-06-30T23:59:60Z").unwrap();
        assert_eq!((d.day, d.hour, d.minute, d.second), (1, 0, 0, 0));
        assert_eq!(d.month, 7);
    }

    #[test]
    fn test_mssql() {
        let d = parse("2004-07-08 23:56:58.0").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour, d.minute, d.second), (2004, 7, 8, 23, 56, 58));
    }

    #[test]
    fn test_hungarian() {
        let d = parse("2004-május-03T9:27:15+1:00").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour, d.minute), (2004, 5, 3, 8, 27));
    }

    #[test]
    fn test_greek() {
        let d = parse("Κυρ, 11 Ιαν 2004 12:01:00 EET").unwrap();
        // Unknown zone names fall back to UTC
        assert_eq!((d.year, d.month, d.day, d.hour), (2004, 1, 11, 12));
    }

    #[test]
    fn test_korean_onblog() {
        let d = parse("2004년 05월 16일 20:58:00").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour), (2004, 5, 16, 11));
    }

    #[test]
    fn test_korean_nate_pm() {
        let d = parse("2004-05-25 오후 11:23:17").unwrap();
        assert_eq!((d.year, d.month, d.day, d.hour), (2004, 5, 25, 14));
    }

    #[test]
    fn test_iso8601_ordinal() {
        let d = parse("2003-335").unwrap();
        assert_eq!((d.year, d.month, d.day), (2003, 12, 1));
    }

    #[test]
    fn test_iso8601_month_only_defaults_day_one() {
        let d = parse("2003-12").unwrap();
        assert_eq!((d.year, d.month, d.day), (2003, 12, 1));
    }

    #[test]
    fn test_iso8601_two_digit_year_current_century() {
        let d = parse("03-12-31").unwrap();
        assert_eq!((d.year, d.month, d.day), (2003, 12, 31));
    }

    #[test]
    fn test_iso8601_month_day_uses_current_year() {
        let d = parse("--05-01").unwrap();
        assert_eq!((d.year, d.month, d.day), (2024, 5, 1));
    }

    #[test]
    fn test_iso8601_day_only_uses_current_year_and_month() {
        let d = parse("---20").unwrap();
        assert_eq!((d.year, d.month, d.day), (2024, 6, 20));
    }

    #[test]
    fn test_garbage_is_silently_absent() {
        assert_eq!(parse("not a date"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("Mon, 99 Zzz 2024 00:00:00 GMT"), None);
    }

    #[test]
    fn test_determinism_same_input_same_output() {
        let a = parse("--05-01");
        let b = parse("--05-01");
        assert_eq!(a, b);
    }

    #[cfg(test)]
    mod robustness {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(s in "\\PC*") {
                let _ = parse_date_at(&s, fixed_today());
            }

            #[test]
            fn parsed_dates_are_calendar_valid(s in "\\PC*") {
                if let Some(d) = parse_date_at(&s, fixed_today()) {
                    prop_assert!((1..=12).contains(&d.month));
                    prop_assert!((1..=31).contains(&d.day));
                    prop_assert!(d.hour < 24 && d.minute < 60 && d.second <= 60);
                    prop_assert!(d.weekday < 7);
                }
            }
        }
    }
}
