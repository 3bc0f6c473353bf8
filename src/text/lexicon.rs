// Fixed lexical tables consulted by the tokenizer. All token-level tables
// are lowercase because tokens are lowercased before any rule runs.

/// English stopwords (NLTK list).
pub const STOPWORDS: &[&str] = &[
    "ourselves", "hers", "between", "yourself", "but", "again", "there", "about", "once",
    "during", "out", "very", "having", "with", "they", "own", "an", "be", "some", "for", "do",
    "its", "yours", "such", "into", "of", "most", "itself", "other", "off", "is", "s", "am",
    "or", "who", "as", "from", "him", "each", "the", "themselves", "until", "below", "are",
    "we", "these", "your", "his", "through", "don", "nor", "me", "were", "her", "more",
    "himself", "this", "down", "should", "our", "their", "while", "above", "both", "up", "to",
    "ours", "had", "she", "all", "no", "when", "at", "any", "before", "them", "same", "and",
    "been", "have", "in", "will", "on", "does", "yourselves", "then", "that", "because",
    "what", "over", "why", "so", "can", "did", "not", "now", "under", "he", "you", "herself",
    "has", "just", "where", "too", "only", "myself", "which", "those", "i", "after", "few",
    "whom", "t", "being", "if", "theirs", "my", "against", "a", "by", "doing", "it", "how",
    "further", "was", "here", "than",
];

/// Substring rewrites applied to the raw value, in order, before punctuation
/// is stripped.
pub const TEXT_REPLACE: &[(&str, &str)] = &[
    ("%", "percent"),
    ("# of", "number of"),
    ("# Of", "number Of"),
    ("SAVE", "Save"),
    ("EDIT", "Edit"),
];

/// Adjacent identifier tokens that form one word: `(left, right, merged)`.
pub const ID_MERGE: &[(&str, &str, &str)] = &[
    ("to", "do", "todo"),
    ("sign", "up", "signup"),
    ("log", "in", "login"),
];

/// Leading free-text phrases collapsed into one token.
pub const TEXT_MERGE: &[(&[&str], &str)] = &[(&["log", "in"], "login")];

/// Leading sibling-text phrases collapsed into one token.
pub const SIBLING_TEXT_MERGE: &[(&[&str], &str)] = &[
    (&["sign", "in"], "signin"),
    (&["sign", "up"], "sign_up"),
];

/// Identifier tokens that stand for several words.
pub const ID_EXPANSIONS: &[(&str, &[&str])] = &[
    ("searchbox", &["search", "box"]),
    ("mkdir", &["make", "directory", "folder"]),
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

pub fn expansion_of(token: &str) -> Option<&'static [&'static str]> {
    ID_EXPANSIONS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, parts)| *parts)
}
