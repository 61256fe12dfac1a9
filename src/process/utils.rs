use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9a-z]+").unwrap());
static REPEATED_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__+").unwrap());

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a free-form header into a SQL-safe column name.
///
/// `"UniqueID "` → `uniqueid`, `"Sale Date"` → `sale_date`, `"2nd Owner"` → `col_2nd_owner`.
pub fn sanitize_column(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let replaced = NON_ALNUM.replace_all(&lower, "_");
    let collapsed = REPEATED_UNDERSCORE.replace_all(&replaced, "_");
    let s = collapsed.trim_matches('_');
    if s.is_empty() || s.starts_with(|c: char| c.is_ascii_digit()) {
        format!("col_{}", s)
    } else {
        s.to_string()
    }
}

/// Headers that are spill-over from a dataframe index rather than real columns.
pub fn is_index_column(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || t.to_lowercase().starts_with("unnamed")
}

/// Sanitize every header, suffixing `_2`, `_3`, … onto names that collide.
pub fn sanitize_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for h in raw {
        let base = sanitize_column(h);
        let mut name = base.clone();
        let mut n = 2;
        while out.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        out.push(name);
    }
    out
}
