//! Results file format constants and small helpers.

/// Every results file starts with this byte.
pub const TAG_START: u8 = b'#';

/// Length of the file tag, including the leading `#`.
pub const TAG_LEN: usize = 32;

/// Size of the endian field following the tag.
pub const ENDIAN_LEN: usize = 2;

/// Size of the checksum following the endian field.
pub const CHECKSUM_LEN: usize = 8;

/// Endian field written by big endian machines.
pub const BIG_ENDIAN_MARK: [u8; 2] = [0x12, 0x34];

/// Endian field written by little endian machines.
pub const LITTLE_ENDIAN_MARK: [u8; 2] = [0x34, 0x12];

/// Section labels.
pub const LABEL_VARIABLES: &str = "VARIABLES";
pub const LABEL_DATABLOCKS: &str = "DATABLOCKS";
pub const LABEL_DATA: &str = "DATA";

/// Heading labels.
pub const HEADING_MODULE: &str = "MODULE";
pub const HEADING_DATETIME: &str = "DATETIME";

/// Description of the top-level variable holding each step's time key.
pub const PHYSICAL_TIME: &str = "Physical time";

/// Description of the top-level variable holding the solver step number.
pub const TIME_STEP_NUMBER: &str = "Time step number";

/// Module name of eigenmode result files.
pub const MODES_MODULE: &str = "fedem_modes";

/// Time comparison tolerance (single precision epsilon).
pub const TIME_EPS: f64 = f32::EPSILON as f64;

/// Byte order of the binary section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Byte order of the running machine.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Interpret the two-byte endian field.
    pub const fn from_mark(mark: [u8; 2]) -> Option<Self> {
        match mark {
            [0x12, 0x34] => Some(Self::Big),
            [0x34, 0x12] => Some(Self::Little),
            _ => None,
        }
    }

    pub const fn mark(self) -> [u8; 2] {
        match self {
            Self::Big => BIG_ENDIAN_MARK,
            Self::Little => LITTLE_ENDIAN_MARK,
        }
    }
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parse a `DATETIME` heading (`"19 Oct 2026 12:30:05"`) into a
/// monotonically increasing number of seconds. Only the relative order of
/// two dates is meaningful. Returns 0 when the value is not understood.
pub fn parse_date(value: &str) -> u64 {
    let mut parts = value.split_whitespace();
    let (Some(day), Some(month), Some(year), Some(clock)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return 0;
    };

    let Some(month) = MONTHS.iter().position(|m| month.eq_ignore_ascii_case(m)) else {
        return 0;
    };
    let day: u64 = day.parse().unwrap_or(1).max(1);
    let year: u64 = year.parse().unwrap_or(2000).max(2000);

    let mut hms = clock.split(':').map(|s| s.parse::<u64>().unwrap_or(0));
    let hour = hms.next().unwrap_or(0);
    let min = hms.next().unwrap_or(0);
    let sec = hms.next().unwrap_or(0);

    let days = (day - 1)
        .saturating_add(31u64.saturating_mul((month as u64).saturating_add(12u64.saturating_mul(year - 2000))));
    let hours = hour.saturating_add(24u64.saturating_mul(days));
    let mins = min.saturating_add(60u64.saturating_mul(hours));
    sec.saturating_add(60u64.saturating_mul(mins))
}

/// C `atoi` semantics: optional sign and leading digits, 0 otherwise.
pub fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut value: i64 = 0;
    for c in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(c - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let value = if neg { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_mark() {
        assert_eq!(Endian::from_mark([0x12, 0x34]), Some(Endian::Big));
        assert_eq!(Endian::from_mark([0x34, 0x12]), Some(Endian::Little));
        assert_eq!(Endian::from_mark([0, 0]), None);
        assert_eq!(Endian::from_mark(Endian::Big.mark()), Some(Endian::Big));
    }

    #[test]
    fn test_parse_date_order() {
        let a = parse_date("31 Jan 2026 23:59:59");
        let b = parse_date("1 Feb 2026 00:00:00");
        let c = parse_date("1 Feb 2026 00:00:01");
        assert!(a > 0);
        assert!(a < b && b < c);
        assert_eq!(parse_date("yesterday"), 0);
    }

    #[test]
    fn test_parse_date_far_future() {
        let a = parse_date("1 Jan 2200 00:00:00");
        let b = parse_date("2 Jan 2200 00:00:00");
        assert!(a > parse_date("31 Dec 2199 23:59:59"));
        assert_eq!(b - a, 86_400);
        assert_eq!(parse_date("99999999999 Jan 18446744073709551615 99999:0:0"), u64::MAX);
    }

    #[test]
    fn test_atoi() {
        assert_eq!(atoi("42"), 42);
        assert_eq!(atoi(" -7abc"), -7);
        assert_eq!(atoi("x1"), 0);
        assert_eq!(atoi(""), 0);
    }
}
