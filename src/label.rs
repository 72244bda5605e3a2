use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::sync::LazyLock;

/// Years accepted as a bare year token
const YEAR_RANGE: RangeInclusive<i32> = 1800..=2199;

/// Characters stripped from both ends of each headline fragment
const HEADLINE_TRIM: &[char] = &['-', '_', '.', ',', ';', ':', '(', ')', '[', ']'];

static FULL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-_.](\d{2})[-_.](\d{2})").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Date inferred from a directory name.
///
/// Year-only names stay year-precision; they are never padded to a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDate {
    Year(i32),
    Day(NaiveDate),
}

impl CaptureDate {
    pub fn year(&self) -> i32 {
        match self {
            CaptureDate::Year(y) => *y,
            CaptureDate::Day(d) => d.year(),
        }
    }

    pub fn is_full_date(&self) -> bool {
        matches!(self, CaptureDate::Day(_))
    }

    /// Value in the form exiftool expects for date tags: `YYYY` or `YYYY:MM:DD`
    pub fn exif_value(&self) -> String {
        match self {
            CaptureDate::Year(y) => format!("{:04}", y),
            CaptureDate::Day(d) => d.format("%Y:%m:%d").to_string(),
        }
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureDate::Year(y) => write!(f, "{:04}", y),
            CaptureDate::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Result of parsing a single directory name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryLabel {
    pub date: Option<CaptureDate>,
    pub headline: Option<String>,
}

impl DirectoryLabel {
    /// Parse a directory name into a capture date and headline.
    ///
    /// A full `YYYY-MM-DD` date (separators `-`, `_` or `.`) is looked for first,
    /// then a bare four-digit year. The leftmost valid token wins and the text
    /// around it becomes the headline. Names without a date token yield nothing,
    /// even when they carry descriptive text.
    pub fn parse(name: &str) -> Self {
        if let Some((range, date)) = find_full_date(name) {
            return DirectoryLabel {
                date: Some(CaptureDate::Day(date)),
                headline: headline_around(name, range),
            };
        }

        if let Some((range, year)) = find_year(name) {
            return DirectoryLabel {
                date: Some(CaptureDate::Year(year)),
                headline: headline_around(name, range),
            };
        }

        DirectoryLabel::default()
    }

    pub fn is_dated(&self) -> bool {
        self.date.is_some()
    }
}

/// Check that a regex match is not glued to further digits on either side
fn is_isolated(text: &str, range: &Range<usize>) -> bool {
    let before = text[..range.start].chars().next_back();
    let after = text[range.end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

fn find_full_date(name: &str) -> Option<(Range<usize>, NaiveDate)> {
    // Step one byte at a time so a rejected candidate does not hide an
    // overlapping one further right.
    let mut start = 0;
    while let Some(caps) = FULL_DATE_RE.captures_at(name, start) {
        let whole = caps.get(0)?;
        let range = whole.range();
        if is_isolated(name, &range) {
            let year = caps[1].parse::<i32>().ok();
            let month = caps[2].parse::<u32>().ok();
            let day = caps[3].parse::<u32>().ok();
            if let (Some(y), Some(m), Some(d)) = (year, month, day) {
                if YEAR_RANGE.contains(&y) {
                    if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                        return Some((range, date));
                    }
                }
            }
        }
        start = range.start + 1;
    }
    None
}

fn find_year(name: &str) -> Option<(Range<usize>, i32)> {
    let mut start = 0;
    while let Some(m) = YEAR_RE.find_at(name, start) {
        let range = m.range();
        if is_isolated(name, &range) {
            if let Ok(year) = m.as_str().parse::<i32>() {
                if YEAR_RANGE.contains(&year) {
                    return Some((range, year));
                }
            }
        }
        start = range.start + 1;
    }
    None
}

fn headline_around(name: &str, token: Range<usize>) -> Option<String> {
    let parts = [&name[..token.start], &name[token.end..]];
    let joined = parts
        .iter()
        .map(|p| clean_fragment(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_headline(&joined)
}

fn clean_fragment(fragment: &str) -> &str {
    fragment.trim_matches(|c: char| c.is_whitespace() || HEADLINE_TRIM.contains(&c))
}

/// Trim a headline candidate; empty-after-trim becomes absent.
///
/// Control characters (line breaks, tabs) become plain spaces.
pub fn normalize_headline(text: &str) -> Option<String> {
    let flattened: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let cleaned = clean_fragment(&flattened);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Date and headline that apply to files in one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inference {
    pub date: Option<CaptureDate>,
    pub headline: Option<String>,
}

impl Inference {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.headline.is_none()
    }
}

/// Infer the date and headline for a directory from its chain of names,
/// outermost first and ending with the directory itself.
///
/// The anchor is the deepest name carrying a full date, otherwise the deepest
/// carrying a year. When the anchor has no headline of its own and the
/// directory itself is an undated child of it, the directory name is used.
pub fn infer_from_chain<'a, I>(chain: I) -> Inference
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = chain.into_iter().collect();
    let labels: Vec<DirectoryLabel> = names.iter().map(|n| DirectoryLabel::parse(n)).collect();

    let deepest = |full: bool| {
        labels
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| l.date.is_some_and(|d| d.is_full_date() == full))
            .map(|(i, _)| i)
    };

    let anchor = match deepest(true).or_else(|| deepest(false)) {
        Some(i) => i,
        None => return Inference::default(),
    };

    let label = &labels[anchor];
    let last = names.len() - 1;
    let headline = match &label.headline {
        Some(h) => Some(h.clone()),
        None if last > anchor && !labels[last].is_dated() => normalize_headline(names[last]),
        None => None,
    };

    Inference {
        date: label.date,
        headline,
    }
}
