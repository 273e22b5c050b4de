//! Date extraction for receipts.

use chrono::NaiveDate;
use regex::Captures;

use super::patterns::{DATE_CJK, DATE_DMY, DATE_DMY_DOTTED, DATE_MDY, DATE_ROC, DATE_YMD};
use super::{normalize_width, ExtractionMatch, FieldExtractor};

/// Offset between ROC (Minguo) years and Gregorian years.
const ROC_OFFSET: i32 = 1911;

/// Date field extractor.
///
/// Every supported format is scanned and matches are returned in text
/// order, so `extract` yields the date printed nearest the top.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        // YYYY-MM-DD
        for caps in DATE_YMD.captures_iter(text) {
            let year = parse_num(&caps[1]) as i32;
            if !is_plausible_year(year) {
                continue;
            }
            if let Some(date) = NaiveDate::from_ymd_opt(year, parse_num(&caps[2]), parse_num(&caps[3])) {
                results.push(date_match(&caps, text, date, 0.95, 1, 3));
            }
        }

        // DD-MM-YYYY, DD.MM.YYYY, day first
        for caps in DATE_DMY.captures_iter(text).chain(DATE_DMY_DOTTED.captures_iter(text)) {
            let year = parse_year(&caps[3]);
            let (a, b) = (parse_num(&caps[1]), parse_num(&caps[2]));
            if let Some(date) = ymd_either_order(year, b, a) {
                results.push(date_match(&caps, text, date, 0.85, 1, 3));
            }
        }

        // MM/DD/YYYY, month first
        for caps in DATE_MDY.captures_iter(text) {
            let year = parse_year(&caps[3]);
            let (a, b) = (parse_num(&caps[1]), parse_num(&caps[2]));
            if let Some(date) = ymd_either_order(year, a, b) {
                results.push(date_match(&caps, text, date, 0.85, 1, 3));
            }
        }

        // 113/03/15
        for caps in DATE_ROC.captures_iter(text) {
            let Some(year) = roc_to_gregorian(parse_num(&caps[1]) as i32) else {
                continue;
            };
            if let Some(date) = NaiveDate::from_ymd_opt(year, parse_num(&caps[2]), parse_num(&caps[3])) {
                results.push(date_match(&caps, text, date, 0.9, 1, 3));
            }
        }

        // 2024年3月15日, 民國113年3月15日
        for caps in DATE_CJK.captures_iter(text) {
            let printed = parse_num(&caps[2]) as i32;
            // 民國 or a three-digit year is ROC era; 24年 is 2024
            let year = match (caps.get(1).is_some(), caps[2].len()) {
                (true, _) | (false, 3) => roc_to_gregorian(printed),
                (false, 2) => Some(parse_year(&caps[2])),
                _ => Some(printed).filter(|y| is_plausible_year(*y)),
            };
            let Some(year) = year else {
                continue;
            };
            if let Some(date) = NaiveDate::from_ymd_opt(year, parse_num(&caps[3]), parse_num(&caps[4])) {
                let first = if caps.get(1).is_some() { 1 } else { 2 };
                let start = caps.get(first).map(|m| m.start()).unwrap_or(0);
                let end = caps.get(0).map(|m| m.end()).unwrap_or(text.len());
                results.push(
                    ExtractionMatch::new(date, 0.95, &text[start..end]).with_position(start, end),
                );
            }
        }

        results.sort_by_key(|m| m.start());
        results
    }
}

/// First date printed in `text`, if any.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(&normalize_width(text)).map(|m| m.value)
}

/// Replace every date in `text` with spaces of equal byte length.
///
/// Used before amount scanning so `2024.03.15` is not read as a price.
pub fn mask_dates(text: &str) -> String {
    let spans: Vec<(usize, usize)> = DateExtractor::new()
        .extract_all(text)
        .into_iter()
        .filter_map(|m| m.position)
        .collect();

    if spans.is_empty() {
        return text.to_string();
    }

    let mut masked = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        if start < cursor {
            continue;
        }
        masked.push_str(&text[cursor..start]);
        masked.extend(std::iter::repeat_n(' ', end - start));
        cursor = end;
    }
    masked.push_str(&text[cursor..]);
    masked
}

fn date_match(
    caps: &Captures<'_>,
    text: &str,
    date: NaiveDate,
    confidence: f32,
    first: usize,
    last: usize,
) -> ExtractionMatch<NaiveDate> {
    let start = caps.get(first).map(|m| m.start()).unwrap_or(0);
    let end = caps.get(last).map(|m| m.end()).unwrap_or(text.len());
    ExtractionMatch::new(date, confidence, &text[start..end]).with_position(start, end)
}

/// Try (month, day) first, then the swapped reading.
fn ymd_either_order(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

fn parse_num(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn roc_to_gregorian(year: i32) -> Option<i32> {
    (1..=200).contains(&year).then_some(year + ROC_OFFSET)
}

fn is_plausible_year(year: i32) -> bool {
    (1900..=2100).contains(&year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_date_ymd() {
        assert_eq!(extract_date("2024-03-15"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("2024/3/5"), Some(ymd(2024, 3, 5)));
        assert_eq!(extract_date("2024.03.15"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_extract_date_mdy_and_dmy() {
        assert_eq!(extract_date("03/15/2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("15-03-2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("15.03.2024"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_slash_date_falls_back_to_day_first() {
        assert_eq!(extract_date("25/03/2024"), Some(ymd(2024, 3, 25)));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(extract_date("03/15/24"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("15-03-99"), Some(ymd(1999, 3, 15)));
    }

    #[test]
    fn test_chinese_dates() {
        assert_eq!(extract_date("2024年3月15日"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("日期2024年03月15日"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("民國113年3月15日"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("113年3月15日"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_two_digit_cjk_year_is_gregorian() {
        assert_eq!(extract_date("24年3月15日"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("民國99年12月31日"), Some(ymd(2010, 12, 31)));
    }

    #[test]
    fn test_dotted_dates_need_four_digit_year() {
        assert_eq!(extract_date("Qty 1.5.24 x"), None);
        assert_eq!(extract_date("1.5.2024"), Some(ymd(2024, 5, 1)));
        assert_eq!(extract_date("01-05-24"), Some(ymd(2024, 5, 1)));
    }

    #[test]
    fn test_full_width_dates() {
        assert_eq!(extract_date("２０２４年３月１５日"), Some(ymd(2024, 3, 15)));
        assert_eq!(extract_date("１１３／０３／１５"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_roc_slash_date() {
        assert_eq!(extract_date("交易日期:113/03/15"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_first_date_wins() {
        let text = "SHOP\n15-01-2024\nDue 2024-02-01";
        assert_eq!(extract_date(text), Some(ymd(2024, 1, 15)));

        let text = "Printed 2024-02-01\n03/15/2024";
        assert_eq!(extract_date(text), Some(ymd(2024, 2, 1)));
    }

    #[test]
    fn test_invalid_dates_skipped() {
        assert_eq!(extract_date("2024-13-45"), None);
        assert_eq!(extract_date("Call 2024-99-99 or 2024-04-01"), Some(ymd(2024, 4, 1)));
    }

    #[test]
    fn test_no_date() {
        assert_eq!(extract_date("no dates here"), None);
        assert_eq!(extract_date(""), None);
        assert_eq!(extract_date("Total: $12.50"), None);
    }

    #[test]
    fn test_mask_dates() {
        let masked = mask_dates("Date: 2024.03.15 Total 12.50");
        assert!(!masked.contains("2024"));
        assert!(masked.contains("12.50"));
        assert_eq!(masked.len(), "Date: 2024.03.15 Total 12.50".len());
    }
}
