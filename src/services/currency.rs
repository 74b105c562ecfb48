//! Currency lookup and amount formatting
//!
//! Amounts are computed unrounded and in the base currency (rate 1.0).
//! Rounding to two decimals happens here, at presentation.

use crate::domain::{Currency, DomainError, DomainResult, QuoteSettings};

/// Two-decimal rounding, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert between two currencies of the settings' rate table
pub fn convert(settings: &QuoteSettings, amount: f64, from: &str, to: &str) -> DomainResult<f64> {
    let source = find_currency(settings, from)?;
    let target = find_currency(settings, to)?;
    if source.rate == 0.0 {
        return Err(DomainError::InvalidInput(format!("currency {} has a zero rate", from)));
    }
    Ok(amount / source.rate * target.rate)
}

fn find_currency<'a>(settings: &'a QuoteSettings, code: &str) -> DomainResult<&'a Currency> {
    settings
        .currencies
        .iter()
        .find(|c| c.code == code)
        .ok_or_else(|| DomainError::NotFound(format!("currency {}", code)))
}

/// `1234.5` → `"1 234.50 €"`
pub fn format_amount(amount: f64, currency: &Currency) -> String {
    let rounded = round2(amount);
    let sign = if rounded < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", rounded.abs());
    let (integer, decimals) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    format!("{}{}.{} {}", sign, grouped, decimals, currency.symbol)
}

/// Base-currency amount shown in the selected currency.
///
/// Falls back to the base amount without symbol when the selection is stale.
pub fn display_amount(settings: &QuoteSettings, amount: f64) -> String {
    match settings.selected_currency() {
        Some(currency) => format_amount(amount * currency.rate, currency),
        None => format!("{:.2}", round2(amount)),
    }
}
