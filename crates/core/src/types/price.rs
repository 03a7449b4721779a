//! Price display for the catalog.
//!
//! Prices are stored exactly as entered (a numeric string); they are only
//! interpreted when rendered. Rendering follows the Indonesian locale:
//! whole rupiah, `.` as the thousands separator, `Rp` prefix.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Currency prefix shown before every price.
pub const CURRENCY_PREFIX: &str = "Rp";

/// Format a stored price string as rupiah.
///
/// The fractional part is truncated. A price that does not parse as a
/// number is shown verbatim after the prefix.
///
/// ```
/// use bangun_rumah_core::format_rupiah;
///
/// assert_eq!(format_rupiah("65000"), "Rp65.000");
/// assert_eq!(format_rupiah("1250000.90"), "Rp1.250.000");
/// assert_eq!(format_rupiah("call us"), "Rpcall us");
/// ```
#[must_use]
pub fn format_rupiah(price: &str) -> String {
    let trimmed = price.trim();
    match Decimal::from_str(trimmed) {
        Ok(amount) => {
            let whole = amount.trunc().normalize().to_string();
            let (sign, digits) = whole
                .strip_prefix('-')
                .map_or(("", whole.as_str()), |rest| ("-", rest));
            format!("{CURRENCY_PREFIX}{sign}{}", group_thousands(digits))
        }
        Err(_) => format!("{CURRENCY_PREFIX}{trimmed}"),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}
