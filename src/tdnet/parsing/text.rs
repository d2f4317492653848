use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());
static CJK_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})年(\d{1,2})月(\d{1,2})日$").unwrap());
static ERA_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\p{Han}{2})(元|\d{1,2})年(\d{1,2})月(\d{1,2})日$").unwrap());

/// Imperial era names and the Gregorian year their first year falls in.
const ERAS: &[(&str, i32)] = &[
    ("明治", 1868),
    ("大正", 1912),
    ("昭和", 1926),
    ("平成", 1989),
    ("令和", 2019),
];

/// Ordered shape rules used when a fact has no explicit format. The first
/// match wins; this is a heuristic, not a taxonomy lookup.
static FORMAT_RULES: Lazy<Vec<(InferredFormat, Regex)>> = Lazy::new(|| {
    vec![
        (InferredFormat::Boolean, Regex::new(r"^(?i:true|false)$").unwrap()),
        (
            InferredFormat::Date,
            Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$|^\d{4}年\d{1,2}月\d{1,2}日$").unwrap(),
        ),
        (InferredFormat::Url, Regex::new(r"^(?i:https?://)\S+$").unwrap()),
        (InferredFormat::Telephone, Regex::new(r"^\(?\d{2,5}\)?-?\d{1,4}-\d{3,4}$").unwrap()),
        (InferredFormat::Decimal, Regex::new(r"^[-+]?[\d,]*\.\d+$").unwrap()),
        (InferredFormat::Number, Regex::new(r"^[-+]?\d[\d,]*$").unwrap()),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredFormat {
    String,
    Number,
    Decimal,
    Boolean,
    Date,
    Telephone,
    Url,
}

pub fn infer_format(text: &str) -> InferredFormat {
    FORMAT_RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(format, _)| *format)
        .unwrap_or(InferredFormat::String)
}

/// Removes ASCII and full-width whitespace and applies NFKC, which also folds
/// full-width digits and letters to ASCII.
pub fn normalize_text(raw: &str) -> String {
    raw.nfkc().filter(|c| !c.is_whitespace()).collect()
}

/// A normalised non-numeric value. `failed` marks values left as-is because
/// their declared format could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub failed: bool,
}

impl Normalized {
    fn ok(value: String) -> Self {
        Self { value, failed: false }
    }

    fn unchanged(value: &str) -> Self {
        Self {
            value: value.to_string(),
            failed: true,
        }
    }
}

fn ymd(y: i32, m: &str, d: &str) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(y, m.parse().ok()?, d.parse().ok()?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

pub fn iso_to_iso(text: &str) -> Option<String> {
    let caps = ISO_DATE.captures(text)?;
    ymd(caps[1].parse().ok()?, &caps[2], &caps[3])
}

pub fn cjk_to_iso(text: &str) -> Option<String> {
    let caps = CJK_DATE.captures(text)?;
    ymd(caps[1].parse().ok()?, &caps[2], &caps[3])
}

/// `令和5年5月12日` → `2023-05-12`. `元年` is the first year of an era.
pub fn era_to_iso(text: &str) -> Option<String> {
    let caps = ERA_DATE.captures(text)?;
    let start = ERAS.iter().find(|(name, _)| *name == &caps[1])?.1;
    let year_in_era: i32 = match &caps[2] {
        "元" => 1,
        n => n.parse().ok()?,
    };
    if year_in_era < 1 {
        return None;
    }
    ymd(start + year_in_era - 1, &caps[3], &caps[4])
}

/// Converts ISO, CJK and imperial-era dates to `YYYY-MM-DD`. Anything else
/// comes back unchanged with `failed` set.
pub fn normalize_date(text: &str) -> Normalized {
    let text = normalize_text(text);
    iso_to_iso(&text)
        .or_else(|| cjk_to_iso(&text))
        .or_else(|| era_to_iso(&text))
        .map(Normalized::ok)
        .unwrap_or_else(|| Normalized::unchanged(&text))
}

pub fn is_date_format(format: &str) -> bool {
    format.to_ascii_lowercase().contains("date")
}

/// `ixt:booleantrue` / `ixt:booleanfalse` carry their value in the format.
pub fn boolean_from_format(format: &str) -> Option<&'static str> {
    let lower = format.to_ascii_lowercase();
    if lower.ends_with("booleantrue") {
        Some("true")
    } else if lower.ends_with("booleanfalse") {
        Some("false")
    } else {
        None
    }
}

/// Normalises the text of an `ix:nonNumeric` given its declared format.
pub fn normalize_non_numeric(raw: &str, format: Option<&str>) -> Normalized {
    if let Some(value) = format.and_then(boolean_from_format) {
        return Normalized::ok(value.to_string());
    }
    match format {
        Some(f) if is_date_format(f) => normalize_date(raw),
        _ => Normalized::ok(normalize_text(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_strips_full_width_space_and_digits() {
        assert_eq!(normalize_text(" トヨタ　自動車 "), "トヨタ自動車");
        assert_eq!(normalize_text("７２０３"), "7203");
        assert_eq!(normalize_text("ｶﾌﾞｼｷｶﾞｲｼｬ"), "カブシキガイシャ");
    }

    #[test]
    fn test_dates_in_all_three_forms() {
        assert_eq!(normalize_date("2023-05-12"), Normalized::ok("2023-05-12".to_string()));
        assert_eq!(normalize_date("2023年5月12日"), Normalized::ok("2023-05-12".to_string()));
        assert_eq!(normalize_date("２０２３年５月１２日"), Normalized::ok("2023-05-12".to_string()));
        assert_eq!(normalize_date("令和5年5月12日"), Normalized::ok("2023-05-12".to_string()));
        assert_eq!(normalize_date("令和元年6月1日"), Normalized::ok("2019-06-01".to_string()));
        assert_eq!(normalize_date("平成31年3月31日"), Normalized::ok("2019-03-31".to_string()));
        assert_eq!(normalize_date("昭和64年1月7日"), Normalized::ok("1989-01-07".to_string()));
    }

    #[test]
    fn test_unmappable_era_returns_original_with_marker() {
        let n = normalize_date("天平5年5月12日");
        assert!(n.failed);
        assert_eq!(n.value, "天平5年5月12日");

        let n = normalize_date("令和0年1月1日");
        assert!(n.failed);

        let n = normalize_date("2023年13月1日");
        assert!(n.failed);
        assert_eq!(n.value, "2023年13月1日");
    }

    #[test]
    fn test_date_normalisation_is_total() {
        for input in ["", "年月日", "令和", "令和99999999999年1月1日", "9999-99-99", "abc"] {
            let n = normalize_date(input);
            assert!(n.failed, "{} should fail", input);
        }
    }

    #[test]
    fn test_boolean_formats() {
        assert_eq!(normalize_non_numeric("該当", Some("ixt:booleantrue")).value, "true");
        assert_eq!(normalize_non_numeric("-", Some("ixt:booleanfalse")).value, "false");
    }

    #[test]
    fn test_declared_date_format() {
        let n = normalize_non_numeric("令和5年3月31日", Some("ixt:dateerayearmonthdayjp"));
        assert_eq!(n.value, "2023-03-31");
        assert!(!n.failed);
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(infer_format("true"), InferredFormat::Boolean);
        assert_eq!(infer_format("2023-05-12"), InferredFormat::Date);
        assert_eq!(infer_format("https://global.toyota/jp/ir/"), InferredFormat::Url);
        assert_eq!(infer_format("0565-28-2121"), InferredFormat::Telephone);
        assert_eq!(infer_format("03-1234-5678"), InferredFormat::Telephone);
        assert_eq!(infer_format("12.5"), InferredFormat::Decimal);
        assert_eq!(infer_format("7203"), InferredFormat::Number);
        assert_eq!(infer_format("トヨタ自動車株式会社"), InferredFormat::String);
    }
}
