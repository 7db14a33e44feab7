// Cron field parsing
//
// Each field is resolved once, at parse time, into a 64-bit membership mask.
// All supported bounds fit below 64, so matching is a single bit test.

use crate::errors::ScheduleError;

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Position of a field inside a 6-field expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    /// Field order inside an expression string
    pub const ALL: [FieldKind; 6] = [
        FieldKind::Second,
        FieldKind::Minute,
        FieldKind::Hour,
        FieldKind::DayOfMonth,
        FieldKind::Month,
        FieldKind::DayOfWeek,
    ];

    /// Position inside `ALL`
    pub fn index(self) -> usize {
        match self {
            FieldKind::Second => 0,
            FieldKind::Minute => 1,
            FieldKind::Hour => 2,
            FieldKind::DayOfMonth => 3,
            FieldKind::Month => 4,
            FieldKind::DayOfWeek => 5,
        }
    }

    /// Inclusive bounds accepted by the field
    pub fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Second | FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 6),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Second => "second",
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
        }
    }
}

/// Syntactic form the field was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    Any,
    Value,
    Range,
    List,
    Step,
}

/// A fully resolved cron field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    kind: FieldKind,
    tag: FieldTag,
    mask: u64,
}

impl CronField {
    /// Parse one field of `expression` (used for error messages only)
    pub fn parse(kind: FieldKind, token: &str, expression: &str) -> Result<Self, ScheduleError> {
        let parser = FieldParser { kind, expression };
        let (tag, mask) = parser.parse(token)?;
        Ok(Self { kind, tag, mask })
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn tag(&self) -> FieldTag {
        self.tag
    }

    /// Whether `value` is a member of the resolved set
    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.tag == FieldTag::Any || (value < 64 && self.mask & (1u64 << value) != 0)
    }

    /// Resolved members in ascending order
    pub fn values(&self) -> Vec<u32> {
        (0..64).filter(|v| self.mask & (1u64 << v) != 0).collect()
    }
}

struct FieldParser<'a> {
    kind: FieldKind,
    expression: &'a str,
}

impl FieldParser<'_> {
    fn error(&self, reason: String) -> ScheduleError {
        ScheduleError::invalid(self.expression, format!("{} field: {}", self.kind.name(), reason))
    }

    fn parse(&self, token: &str) -> Result<(FieldTag, u64), ScheduleError> {
        if token.is_empty() {
            return Err(self.error("empty element".to_string()));
        }

        if token.contains(',') {
            let mut mask = 0u64;
            for element in token.split(',') {
                let (_, element_mask) = self.parse(element)?;
                mask |= element_mask;
            }
            return Ok((FieldTag::List, mask));
        }

        let (min, max) = self.kind.bounds();

        if token == "*" {
            return Ok((FieldTag::Any, span_mask(min, max, 1)));
        }

        if let Some((base, step)) = token.split_once('/') {
            let step = parse_digits(step)
                .filter(|s| *s > 0)
                .ok_or_else(|| self.error(format!("invalid step '{}' in '{}'", step, token)))?;
            let start = if base == "*" { min } else { self.value(base)? };
            return Ok((FieldTag::Step, span_mask(start, max, step)));
        }

        if let Some((start, end)) = token.split_once('-') {
            let start = self.value(start)?;
            let end = self.value(end)?;
            if start > end {
                return Err(self.error(format!("range start exceeds end in '{}'", token)));
            }
            return Ok((FieldTag::Range, span_mask(start, end, 1)));
        }

        let value = self.value(token)?;
        Ok((FieldTag::Value, 1u64 << value))
    }

    /// A single numeric (or weekday name) token within the field bounds
    fn value(&self, token: &str) -> Result<u32, ScheduleError> {
        let (min, max) = self.kind.bounds();

        let value = match parse_digits(token) {
            Some(v) => v,
            None if self.kind == FieldKind::DayOfWeek => weekday_from_name(token)
                .ok_or_else(|| self.error(format!("unknown weekday '{}'", token)))?,
            None => return Err(self.error(format!("'{}' is not a number", token))),
        };

        if value < min || value > max {
            return Err(self.error(format!(
                "value {} out of bounds {}-{}",
                value, min, max
            )));
        }
        Ok(value)
    }
}

fn parse_digits(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn weekday_from_name(token: &str) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    WEEKDAY_NAMES
        .iter()
        .position(|name| *name == upper)
        .map(|index| index as u32)
}

fn span_mask(start: u32, end: u32, step: u32) -> u64 {
    (start..=end)
        .step_by(step as usize)
        .fold(0u64, |mask, v| mask | (1u64 << v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: FieldKind, token: &str) -> CronField {
        CronField::parse(kind, token, token).unwrap()
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let f = field(FieldKind::Hour, "*");
        assert_eq!(f.tag(), FieldTag::Any);
        assert!((0..24).all(|h| f.contains(h)));
    }

    #[test]
    fn test_step_from_wildcard() {
        let f = field(FieldKind::Second, "*/10");
        assert_eq!(f.tag(), FieldTag::Step);
        assert_eq!(f.values(), vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_step_from_base() {
        let f = field(FieldKind::Minute, "5/15");
        assert_eq!(f.values(), vec![5, 20, 35, 50]);
    }

    #[test]
    fn test_range_and_list() {
        assert_eq!(field(FieldKind::Minute, "10-15").values(), vec![10, 11, 12, 13, 14, 15]);

        let list = field(FieldKind::Hour, "1,5-6,*/12");
        assert_eq!(list.tag(), FieldTag::List);
        assert_eq!(list.values(), vec![0, 1, 5, 6, 12]);
    }

    #[test]
    fn test_weekday_names_case_insensitive() {
        assert_eq!(field(FieldKind::DayOfWeek, "mon-FRI").values(), vec![1, 2, 3, 4, 5]);
        assert_eq!(field(FieldKind::DayOfWeek, "Sun,sat").values(), vec![0, 6]);
        assert_eq!(field(FieldKind::DayOfWeek, "WED").values(), vec![3]);
    }

    #[test]
    fn test_weekday_names_rejected_elsewhere() {
        assert!(CronField::parse(FieldKind::Month, "MON", "x").is_err());
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        for (kind, token) in [
            (FieldKind::Second, "60"),
            (FieldKind::DayOfMonth, "0"),
            (FieldKind::Month, "13"),
            (FieldKind::DayOfWeek, "7"),
            (FieldKind::DayOfWeek, "FUNDAY"),
            (FieldKind::Minute, "15-10"),
            (FieldKind::Minute, "a-b"),
            (FieldKind::Minute, "*/0"),
            (FieldKind::Minute, "*/x"),
            (FieldKind::Minute, "1,,2"),
            (FieldKind::Minute, "5abc"),
            (FieldKind::Minute, "+5"),
            (FieldKind::Hour, "70/2"),
        ] {
            assert!(
                CronField::parse(kind, token, token).is_err(),
                "{:?} '{}' should be rejected",
                kind,
                token
            );
        }
    }
}
