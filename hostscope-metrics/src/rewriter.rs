//! Host scoping of instant queries
//!
//! Injects label matchers derived from a [`HostFilter`] into every metric
//! selector of a PromQL expression. The query is walked token by token so that
//! string literals, numbers, durations, function names, keywords and grouping
//! label lists are copied through untouched.

use std::collections::BTreeMap;

/// Label carrying the business group a host belongs to.
pub const BUSINESS_GROUP_LABEL: &str = "businigroup";

const REGEX_META: &[char] = &[
    '\\', '.', '+', '*', '?', '^', '$', '(', ')', '[', ']', '{', '}', '|',
];

// Words that can never start a metric selector.
const KEYWORDS: &[&str] = &[
    "and",
    "or",
    "unless",
    "atan2",
    "bool",
    "offset",
    "inf",
    "nan",
];

// Aggregation operators. Only treated as operators when a parameter list or a
// `by`/`without` clause follows; a bare `count` is a metric name.
const AGGREGATIONS: &[&str] = &[
    "sum",
    "avg",
    "count",
    "min",
    "max",
    "group",
    "stddev",
    "stdvar",
    "topk",
    "bottomk",
    "count_values",
    "quantile",
    "limitk",
    "limit_ratio",
];

// Keywords followed by a parenthesised list of label names.
const GROUPING_KEYWORDS: &[&str] = &[
    "by",
    "without",
    "on",
    "ignoring",
    "group_left",
    "group_right",
];

/// Subset of monitored hosts a query should be scoped to.
///
/// Business groups are alternatives (any of them matches), tags must all
/// match exactly. Tags are kept sorted by key so the rewritten query is
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostFilter {
    pub business_groups: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

impl HostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_business_group(mut self, group: impl Into<String>) -> Self {
        self.business_groups.push(group.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.business_groups.is_empty() && self.tags.is_empty()
    }

    /// Label matchers for this filter: the business group alternation first,
    /// then one exact matcher per tag in key order.
    pub fn matchers(&self) -> Vec<String> {
        let mut matchers = Vec::with_capacity(1 + self.tags.len());

        if !self.business_groups.is_empty() {
            let alternation = self
                .business_groups
                .iter()
                .map(|group| escape_regex(group))
                .collect::<Vec<_>>()
                .join("|");
            matchers.push(format!("{}=~\"{}\"", BUSINESS_GROUP_LABEL, alternation));
        }

        for (key, value) in &self.tags {
            if key.is_empty() {
                continue;
            }
            matchers.push(format!("{}=\"{}\"", key, escape_label_value(value)));
        }

        matchers
    }
}

/// Escapes every regex metacharacter with a backslash.
pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if REGEX_META.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_label_value(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Scopes `query` to the hosts selected by `filter`.
///
/// Without a filter, or with one that yields no matchers, the query is
/// returned byte for byte.
pub fn rewrite(query: &str, filter: Option<&HostFilter>) -> String {
    let Some(filter) = filter else {
        return query.to_string();
    };

    let matchers = filter.matchers();
    if matchers.is_empty() {
        return query.to_string();
    }

    inject_matchers(query, &matchers.join(", "))
}

fn inject_matchers(query: &str, clause: &str) -> String {
    let bytes = query.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len + clause.len() + 2);
    // bytes before `flushed` are already in `out`
    let mut flushed = 0;
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        let token_end = match b {
            b'"' | b'\'' | b'`' => skip_string(bytes, i),
            b'[' => skip_past(bytes, i, b']'),
            b'{' => skip_block(bytes, i).unwrap_or(len),
            b'0'..=b'9' => scan_number(bytes, i),
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => scan_number(bytes, i),
            b if is_ident_start(b) => {
                let word_end = scan_ident(bytes, i);
                let word = query[i..word_end].to_ascii_lowercase();
                let next = skip_whitespace(bytes, word_end);
                let next_byte = bytes.get(next).copied();

                if GROUPING_KEYWORDS.contains(&word.as_str()) {
                    if next_byte == Some(b'(') {
                        skip_parens(bytes, next)
                    } else {
                        word_end
                    }
                } else if next_byte == Some(b'(')
                    || KEYWORDS.contains(&word.as_str())
                    || (AGGREGATIONS.contains(&word.as_str()) && starts_grouping(query, next))
                {
                    word_end
                } else {
                    // metric selector
                    out.push_str(&query[flushed..word_end]);
                    let end = if next_byte == Some(b'{') {
                        match skip_block(bytes, next) {
                            Some(close) => {
                                out.push_str(&query[word_end..next]);
                                append_block(&mut out, &query[next + 1..close - 1], clause);
                                close
                            }
                            None => {
                                // unterminated selector, leave the rest alone
                                out.push_str(&query[word_end..]);
                                len
                            }
                        }
                    } else {
                        append_block(&mut out, "", clause);
                        word_end
                    };
                    flushed = end;
                    i = end;
                    continue;
                }
            }
            _ => i + 1,
        };
        i = token_end;
    }

    out.push_str(&query[flushed..]);
    out
}

/// Whether the token at `start` is a `by` or `without` clause.
fn starts_grouping(query: &str, start: usize) -> bool {
    let bytes = query.as_bytes();
    if !bytes.get(start).copied().is_some_and(is_ident_start) {
        return false;
    }
    let word = &query[start..scan_ident(bytes, start)];
    word.eq_ignore_ascii_case("by") || word.eq_ignore_ascii_case("without")
}

fn append_block(out: &mut String, existing: &str, clause: &str) {
    let existing = existing.trim_end().trim_end_matches(',').trim_end();
    out.push('{');
    if !existing.trim().is_empty() {
        out.push_str(existing);
        out.push_str(", ");
    }
    out.push_str(clause);
    out.push('}');
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':'
}

fn scan_ident(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() && is_ident_continue(bytes[i]) {
        i += 1;
    }
    i
}

/// Numbers and durations: `42`, `1.5e-3`, `0x1f`, `5m`, `1h30m`.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let hex = bytes[start..].starts_with(b"0x") || bytes[start..].starts_with(b"0X");
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i];
        let exponent_sign = (c == b'+' || c == b'-')
            && !hex
            && i > start
            && matches!(bytes[i - 1], b'e' | b'E')
            && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
        if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn skip_whitespace(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index just past the closing quote, or the end of input if unterminated.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote != b'`' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_past(bytes: &[u8], start: usize, close: u8) -> usize {
    bytes[start + 1..]
        .iter()
        .position(|&b| b == close)
        .map_or(bytes.len(), |pos| start + 1 + pos + 1)
}

/// Index just past the `}` closing the block opened at `start`, honouring
/// quoted label values.
fn skip_block(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
            b'}' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_parens(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}
