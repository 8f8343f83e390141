use chrono::NaiveDate;

/// Long-form date, e.g. `Friday, October 16, 2026`.
pub fn format_date_line(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}
