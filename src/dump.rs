//! Element Dump text format shared by the scraper and the analyzer
//!
//! ```text
//! Element 1:
//! <html>...</html>
//! ==================================================
//! ```

/// Record separator: 50 `=` characters
pub const SEPARATOR: &str = "==================================================";

/// Serialize markup strings into dump text, numbering from 1
pub fn render<S: AsRef<str>>(markups: &[S]) -> String {
    let mut out = String::new();
    for (idx, markup) in markups.iter().enumerate() {
        out.push_str(&format!(
            "Element {}:\n{}\n{}\n",
            idx + 1,
            markup.as_ref(),
            SEPARATOR
        ));
    }
    out
}

/// Non-empty trimmed records, headers included
pub fn records(text: &str) -> Vec<&str> {
    text.split(SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect()
}

/// Markup of each record, with the `Element N:` header removed
pub fn markups(text: &str) -> Vec<&str> {
    records(text)
        .into_iter()
        .map(|record| match record.split_once('\n') {
            Some((header, rest)) if is_header(header) => rest.trim(),
            None if is_header(record) => "",
            _ => record,
        })
        .collect()
}

fn is_header(line: &str) -> bool {
    line.strip_prefix("Element ")
        .and_then(|rest| rest.trim_end().strip_suffix(':'))
        .is_some_and(|n| n.parse::<usize>().is_ok())
}

#[cfg(test)]
#[path = "dump_test.rs"]
mod dump_test;
