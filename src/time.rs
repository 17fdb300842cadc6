//! Retention-expression parsing and the fixed-grid time math shared by the
//! splitter and correlation engine.

use crate::error::{AlertMagnetError, Result};

const DAY: u64 = 86_400;
const YEAR_DAYS: u64 = 365;
const MONTH_DAYS: u64 = 28;
const WEEK_DAYS: u64 = 7;

/// Parses a retention expression of the form `Ny Nm Nw Nd` (components in
/// that order, each optional, no separators — e.g. `"1y6m2w3d"`). Empty
/// string yields zero. Conversions: year=365d, month=28d, week=7d.
pub fn parse_retention(expr: &str) -> Result<u64> {
    if expr.is_empty() {
        return Ok(0);
    }

    let mut rest = expr;
    let mut total_days: u64 = 0;
    let mut last_unit_rank = 0u8; // enforces y,m,w,d ordering

    let unit_rank = |c: char| -> Option<u8> {
        match c {
            'y' => Some(1),
            'm' => Some(2),
            'w' => Some(3),
            'd' => Some(4),
            _ => None,
        }
    };

    while !rest.is_empty() {
        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len == 0 {
            return Err(invalid(expr));
        }
        let (num_str, tail) = rest.split_at(digits_len);
        let mut chars = tail.chars();
        let unit = chars.next().ok_or_else(|| invalid(expr))?;
        let rank = unit_rank(unit).ok_or_else(|| invalid(expr))?;
        if rank <= last_unit_rank {
            return Err(invalid(expr));
        }
        last_unit_rank = rank;

        let n: u64 = num_str.parse().map_err(|_| invalid(expr))?;
        let days = match unit {
            'y' => n.checked_mul(YEAR_DAYS),
            'm' => n.checked_mul(MONTH_DAYS),
            'w' => n.checked_mul(WEEK_DAYS),
            'd' => Some(n),
            _ => unreachable!(),
        }
        .ok_or_else(|| invalid(expr))?;

        total_days = total_days.checked_add(days).ok_or_else(|| invalid(expr))?;
        rest = chars.as_str();
    }

    total_days
        .checked_mul(DAY)
        .ok_or_else(|| invalid(expr))
}

fn invalid(expr: &str) -> AlertMagnetError {
    AlertMagnetError::InvalidConfigValue {
        key: "retention expression".to_string(),
        value: expr.to_string(),
    }
}

/// `now - parse_retention(expr)`, saturating at zero.
pub fn compute_start(now: u64, expr: &str) -> Result<u64> {
    let retention = parse_retention(expr)?;
    Ok(now.saturating_sub(retention))
}
