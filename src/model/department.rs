/// Bucket used when an employee has no department on file.
pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// Normalizes a department label for grouping: trims, collapses inner
/// whitespace and title-cases each word. Blank labels map to `Unknown`.
pub fn normalize_department(name: Option<&str>) -> String {
    let words: Vec<String> = name
        .unwrap_or_default()
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        UNKNOWN_DEPARTMENT.to_string()
    } else {
        words.join(" ")
    }
}
