//! Identifier inflection for labels and titles: singularize, humanize, titleize.

/// Irregular plural -> singular pairs, checked before suffix rules.
const IRREGULAR: &[(&str, &str)] = &[
    ("people", "person"),
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("mice", "mouse"),
    ("geese", "goose"),
];

/// Words that are the same in singular and plural.
const UNCOUNTABLE: &[&str] = &["series", "species", "news", "equipment", "information", "data", "status"];

/// Singularize the last underscore-separated word of an identifier.
/// e.g. "members" -> "member", "ship_names" -> "ship_name", "categories" -> "category"
pub fn singularize(s: &str) -> String {
    let (head, last) = match s.rfind('_') {
        Some(i) => (&s[..=i], &s[i + 1..]),
        None => ("", s),
    };
    let mut out = String::with_capacity(s.len());
    out.push_str(head);
    out.push_str(&singularize_word(last));
    out
}

/// `word` without an ASCII `suffix`, matched case-insensitively on the original bytes.
fn strip_suffix_ci<'a>(word: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = word.len().checked_sub(suffix.len())?;
    if !word.is_char_boundary(cut) || !word[cut..].eq_ignore_ascii_case(suffix) {
        return None;
    }
    Some(&word[..cut])
}

fn singularize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    for (plural, singular) in IRREGULAR {
        if lower == *plural {
            return (*singular).to_string();
        }
    }
    if let Some(stem) = strip_suffix_ci(word, "ies").filter(|stem| !stem.is_empty()) {
        return format!("{}y", stem);
    }
    for suffix in ["sses", "ches", "shes", "xes", "zzes"] {
        if strip_suffix_ci(word, suffix).is_some() {
            return word[..word.len() - 2].to_string();
        }
    }
    if ["ss", "us", "is"].iter().any(|suffix| strip_suffix_ci(word, suffix).is_some()) {
        return word.to_string();
    }
    match strip_suffix_ci(word, "s") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Turn an identifier into a human label: drop a trailing "_id", underscores to spaces,
/// first letter capitalized. e.g. "ship_name" -> "Ship name", "ship_id" -> "Ship"
pub fn humanize(s: &str) -> String {
    let trimmed = s.strip_suffix("_id").filter(|t| !t.is_empty()).unwrap_or(s);
    let spaced = trimmed.replace('_', " ");
    let spaced = spaced.trim();
    let mut chars = spaced.chars();
    let mut out = String::with_capacity(spaced.len());
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.extend(chars.flat_map(char::to_lowercase));
    }
    out
}

/// Capitalize every word of a humanized identifier. e.g. "space_ships" -> "Space Ships"
pub fn titleize(s: &str) -> String {
    humanize(s)
        .split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
