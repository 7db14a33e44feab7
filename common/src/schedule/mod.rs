// Schedule parsing and next execution time calculation
//
// Six-field cron grammar with second precision:
//
//   second minute hour day-of-month month day-of-week
//
// Each field accepts `*`, `N`, `N-M`, `A,B,...`, `*/S` and `N/S`. The
// day-of-week field also accepts SUN..SAT (case-insensitive).

pub mod expression;
pub mod field;

pub use expression::{truncate_to_second, CronExpression, SEARCH_HORIZON_SECONDS};
pub use field::{CronField, FieldKind, FieldTag};

use crate::errors::ScheduleError;

/// Parse and validate a cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronExpression, ScheduleError> {
    CronExpression::parse(expression)
}

/// Default timezone used to decompose instants into calendar components
pub fn default_timezone() -> chrono_tz::Tz {
    chrono_tz::UTC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_cron_expression() {
        assert!(parse_cron_expression("0 0 12 * * *").is_ok());
    }

    #[test]
    fn test_parse_invalid_cron_expression() {
        assert!(parse_cron_expression("invalid").is_err());
    }

    #[test]
    fn test_default_timezone() {
        assert_eq!(default_timezone().to_string(), "UTC");
    }
}
