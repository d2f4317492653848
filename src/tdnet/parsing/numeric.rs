use std::collections::HashMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use unicode_normalization::UnicodeNormalization;

/// Glyph used in Japanese statements in front of negative amounts.
pub const NEGATIVE_GLYPH: char = '△';

static YEN_SEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d[\d,]*)円)?(?:(\d{1,2})銭)?$").unwrap());

const ZERO_DASHES: &[&str] = &["-", "－", "―", "—", "‐", "ー"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Jpy,
    JpyPerShares,
    Shares,
    Pure,
    Persons,
    Other,
}

impl UnitKind {
    pub fn of(unit_ref: &str) -> UnitKind {
        match unit_ref.to_ascii_lowercase().as_str() {
            "jpy" => UnitKind::Jpy,
            "jpypershares" | "jpypershare" => UnitKind::JpyPerShares,
            "shares" => UnitKind::Shares,
            "pure" => UnitKind::Pure,
            "persons" | "numberofpersons" => UnitKind::Persons,
            _ => UnitKind::Other,
        }
    }
}

static DISPLAY_SCALES: Lazy<HashMap<(UnitKind, i32), &'static str>> = Lazy::new(|| {
    HashMap::from([
        ((UnitKind::Jpy, 0), "yen"),
        ((UnitKind::Jpy, 3), "thousands of yen"),
        ((UnitKind::Jpy, 6), "millions of yen"),
        ((UnitKind::Jpy, 9), "billions of yen"),
        ((UnitKind::JpyPerShares, 0), "yen per share"),
        ((UnitKind::Shares, 0), "shares"),
        ((UnitKind::Shares, 3), "thousands of shares"),
        ((UnitKind::Pure, 0), "pure"),
        ((UnitKind::Pure, -2), "%"),
        ((UnitKind::Persons, 0), "persons"),
    ])
});

/// Human label for the magnitude a value is displayed in, e.g.
/// `("JPY", 6)` is "millions of yen".
pub fn display_scale(unit_ref: Option<&str>, scale: i32) -> Option<&'static str> {
    let kind = UnitKind::of(unit_ref?);
    DISPLAY_SCALES.get(&(kind, scale)).copied()
}

/// Parses the text of an `ix:nonFraction`. Returns `None` when the text is
/// not a number; callers keep the raw text in that case.
pub fn parse_numeric(text: &str, format: Option<&str>) -> Option<Decimal> {
    let s: String = text.nfkc().filter(|c| !c.is_whitespace()).collect();

    let zero_dash = format.map(|f| f.to_ascii_lowercase().contains("zerodash")).unwrap_or(false);
    if zero_dash || ZERO_DASHES.contains(&s.as_str()) {
        return Some(Decimal::ZERO);
    }

    if s.contains('円') || s.contains('銭') {
        let caps = YEN_SEN.captures(&s)?;
        let yen = caps.get(1).map(|m| m.as_str().replace(',', "")).unwrap_or_else(|| "0".to_string());
        let sen = caps.get(2).map(|m| format!("{:0>2}", m.as_str())).unwrap_or_else(|| "00".to_string());
        return Decimal::from_str(&format!("{}.{}", yen, sen)).ok();
    }

    let cleaned = s.replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Groups thousands and renders negatives with the `△` glyph.
pub fn display_string(value: &Decimal) -> String {
    let formatted = value.abs().to_string();
    let (int_part, dec_part) = match formatted.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (formatted.as_str(), None),
    };

    let mut result = String::new();
    let chars: Vec<_> = int_part.chars().collect();
    for (i, c) in chars.iter().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, *c);
    }

    if let Some(dec) = dec_part {
        result.push('.');
        result.push_str(dec);
    }

    if value.is_sign_negative() && !value.is_zero() {
        result.insert(0, NEGATIVE_GLYPH);
    }
    result
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericValue {
    pub value: Option<Decimal>,
    pub display: Option<String>,
    pub display_scale: Option<&'static str>,
}

/// Full normalisation of one numeric fact. Never fails: unparsable text gives
/// a `None` value.
pub fn normalize_numeric(
    text: &str,
    format: Option<&str>,
    sign: Option<&str>,
    scale: Option<i32>,
    unit_ref: Option<&str>,
) -> NumericValue {
    // Negating zero would give -0.
    let value = parse_numeric(text, format).map(|v| if sign == Some("-") && !v.is_zero() { -v } else { v });
    NumericValue {
        display: value.as_ref().map(display_string),
        display_scale: display_scale(unit_ref, scale.unwrap_or(0)),
        value,
    }
}
