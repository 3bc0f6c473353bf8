use crate::text::lexicon::{
    ID_MERGE, SIBLING_TEXT_MERGE, TEXT_MERGE, TEXT_REPLACE, expansion_of, is_stopword,
};

/// Which attribute a raw value came from. Splitting rules differ per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    ResourceId,
    Text,
    ContentDesc,
    ParentText,
    SiblingText,
    /// Screen (activity) identifier, e.g. `com.app.ui.MainActivity`
    Screen,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::ResourceId => "resource-id",
            FieldKind::Text => "text",
            FieldKind::ContentDesc => "content-desc",
            FieldKind::ParentText => "parent_text",
            FieldKind::SiblingText => "sibling_text",
            FieldKind::Screen => "screen",
        }
    }

    fn is_free_text(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::ContentDesc | FieldKind::ParentText | FieldKind::SiblingText
        )
    }
}

/// Turn a raw attribute value into normalized lowercase tokens.
///
/// Stopword removal only runs when `use_stopwords` is set and more than one
/// token remains, so a lone meaningful token always survives.
pub fn tokenize(kind: FieldKind, raw: &str, use_stopwords: bool) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let tokens = match kind {
        FieldKind::ResourceId => {
            let short_id = raw.rsplit('/').next().unwrap_or(raw);
            let tokens = merge_adjacent(identifier_tokens(short_id));
            expand_identifiers(tokens)
        }
        FieldKind::Screen => {
            let short_name = raw.rsplit('.').next().unwrap_or(raw);
            identifier_tokens(short_name)
        }
        _ if kind.is_free_text() => {
            let tokens: Vec<String> = sanitize(raw)
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .collect();
            let tokens = merge_leading(tokens, TEXT_MERGE);
            if kind == FieldKind::SiblingText {
                merge_leading(tokens, SIBLING_TEXT_MERGE)
            } else {
                tokens
            }
        }
        _ => Vec::new(),
    };

    if use_stopwords {
        remove_stopwords(tokens)
    } else {
        tokens
    }
}

/// Render tokens back into a value that re-tokenizes to the same list.
pub fn render_tokens(tokens: &[String]) -> String {
    tokens.join(" ")
}

/// Normalize a raw string: trim, unify whitespace, render integral numbers
/// without a fraction, apply the rewrite table, and replace punctuation with
/// spaces.
pub fn sanitize(raw: &str) -> String {
    let mut s: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    if let Some(integral) = integral_number(&s) {
        s = integral;
    }

    for (from, to) in TEXT_REPLACE {
        s = s.replace(from, to);
    }

    let s: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == ' ' {
                c
            } else {
                ' '
            }
        })
        .collect();

    s.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"15.0"` -> `Some("15")`. Zero, non-finite and non-integral values are
/// left alone.
fn integral_number(s: &str) -> Option<String> {
    let value: f64 = s.parse().ok()?;
    if !value.is_finite() || value == 0.0 || value.fract() != 0.0 || value.abs() >= 1e15 {
        return None;
    }
    Some(format!("{}", value as i64))
}

/// Split on camel-case boundaries: before an uppercase letter that follows a
/// lowercase one, and before the last capital of an acronym that starts a
/// new word (`"HTMLParser"` -> `["HTML", "Parser"]`).
pub fn camel_case_split(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        let lower_to_upper = prev.is_ascii_lowercase() && cur.is_ascii_uppercase();
        let acronym_end = prev.is_ascii_uppercase()
            && cur.is_ascii_uppercase()
            && chars.get(i + 1).is_some_and(|next| next.is_ascii_lowercase());

        if lower_to_upper || acronym_end {
            parts.push(chars[start..i].iter().collect());
            start = i;
        }
    }

    if start < chars.len() {
        parts.push(chars[start..].iter().collect());
    }
    parts
}

fn identifier_tokens(identifier: &str) -> Vec<String> {
    sanitize(identifier)
        .split('_')
        .flat_map(camel_case_split)
        .flat_map(|part| {
            part.to_lowercase()
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Merge the first occurrences of adjacent word pairs (`to` + `do` -> `todo`).
fn merge_adjacent(mut tokens: Vec<String>) -> Vec<String> {
    for (left, right, merged) in ID_MERGE {
        let l = tokens.iter().position(|t| t == left);
        let r = tokens.iter().position(|t| t == right);
        if let (Some(l), Some(r)) = (l, r) {
            if l + 1 == r {
                tokens[l] = merged.to_string();
                tokens.remove(r);
            }
        }
    }
    tokens
}

/// Collapse a leading phrase into a single token.
fn merge_leading(tokens: Vec<String>, table: &[(&[&str], &str)]) -> Vec<String> {
    for (phrase, merged) in table {
        if tokens.len() >= phrase.len() && tokens.iter().zip(phrase.iter()).all(|(t, p)| t == p) {
            let mut out = vec![merged.to_string()];
            out.extend(tokens.into_iter().skip(phrase.len()));
            return out;
        }
    }
    tokens
}

fn expand_identifiers(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .flat_map(|t| match expansion_of(&t) {
            Some(parts) => parts.iter().map(|p| p.to_string()).collect(),
            None => vec![t],
        })
        .collect()
}

fn remove_stopwords(tokens: Vec<String>) -> Vec<String> {
    if tokens.len() > 1 {
        tokens.into_iter().filter(|t| !is_stopword(t)).collect()
    } else {
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adjacent_requires_first_occurrences_to_touch() {
        let tokens = vec!["to".to_string(), "x".into(), "to".into(), "do".into()];
        assert_eq!(merge_adjacent(tokens.clone()), tokens);

        let tokens = vec!["my".to_string(), "to".into(), "do".into()];
        assert_eq!(merge_adjacent(tokens), vec!["my", "todo"]);
    }

    #[test]
    fn integral_number_skips_zero_and_fractions() {
        assert_eq!(integral_number("15.0"), Some("15".into()));
        assert_eq!(integral_number("0.0"), None);
        assert_eq!(integral_number("1.5"), None);
        assert_eq!(integral_number("inf"), None);
    }
}
