use thiserror::Error;

/// Amounts are stored as integer cents. A balance of 1323.23 is 132323.
pub type Cents = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    #[error("empty amount")]
    Empty,

    #[error("invalid money format: {0}")]
    InvalidFormat(String),

    #[error("too many decimal places in {0} (at most 2)")]
    TooPrecise(String),

    #[error("amount out of range: {0}")]
    Overflow(String),
}

/// Format cents as a decimal string with two fractional digits.
/// Example: 132323 -> "1323.23", -5 -> "-0.05"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a signed decimal amount into cents.
/// Accepts "100", "1323.23", "12.5", ".50", "+7" and "-50.00".
/// More than two decimal places is rejected rather than silently truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, digits) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (units_str, fraction_str) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (units_str.is_empty() && fraction_str.is_empty())
        || !all_digits(units_str)
        || !all_digits(fraction_str)
    {
        return Err(ParseCentsError::InvalidFormat(input.to_string()));
    }
    if fraction_str.len() > 2 {
        return Err(ParseCentsError::TooPrecise(input.to_string()));
    }

    let overflow = || ParseCentsError::Overflow(input.to_string());
    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| overflow())?
    };
    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<i64>().map_err(|_| overflow())? * 10,
        _ => fraction_str.parse().map_err(|_| overflow())?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(overflow)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert an amount with an exchange rate, rounding half away from zero.
pub fn convert_cents(cents: Cents, rate: f64) -> Cents {
    (cents as f64 * rate).round() as Cents
}

/// Inclusive range of balances that `amount` can be added to without
/// overflowing.
pub fn increment_bounds(amount: Cents) -> (Cents, Cents) {
    if amount >= 0 {
        (Cents::MIN, Cents::MAX - amount)
    } else {
        (Cents::MIN - amount, Cents::MAX)
    }
}
