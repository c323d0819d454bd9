use time::macros::format_description;
use time::PrimitiveDateTime;

const TIMESTAMP_TEMPLATE: &str = "00010101000000";

pub fn list_from_value(value: &str) -> Vec<&str> {
    value.split_whitespace().collect()
}

pub fn bool_value(value: &str) -> bool {
    let value = value.trim();
    match value.bytes().next() {
        None => false,
        Some(first) => !matches!(first, b'0' | b'f' | b'F' | b'n' | b'N'),
    }
}

pub fn number_value(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

pub fn timestamp_value(value: &str) -> Option<PrimitiveDateTime> {
    let value = value.trim();
    let len = value.len();
    if !(4..=14).contains(&len) || len % 2 != 0 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let full = format!("{}{}", value, &TIMESTAMP_TEMPLATE[len..]);
    let format = format_description!("[year][month][day][hour][minute][second]");
    PrimitiveDateTime::parse(&full, &format).ok()
}

pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    let tag = tag.strip_prefix('#').unwrap_or(&tag);
    if tag.is_empty() {
        None
    } else {
        Some(format!("#{}", tag))
    }
}

pub fn clean_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.trim().chars() {
        if ch.is_control() {
            pending_space = true;
            continue;
        }
        if pending_space {
            result.push(' ');
            pending_space = false;
        }
        result.push(ch);
    }
    result
}
