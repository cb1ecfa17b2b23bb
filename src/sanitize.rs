//! Response sanitization
//!
//! Deterministic cleaning and statement extraction applied to raw model
//! output. The model's text is untrusted: it mixes SQL with markup
//! delimiters, protocol tokens, comments and echoed instruction fragments.
//! Cleaning is an ordered list of independent rules so each one can be
//! tested in isolation, followed by a line walk that reassembles
//! semicolon-terminated statements.

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

/// Fixed end-of-response marker the prompts instruct the model to finish
/// with. Everything at and after it is discarded.
pub const END_OF_ANSWER: &str = "Answer complete";

/// Marker the generation prompt places before the SQL body.
pub const SQL_PREFIX_MARKER: &str = "-_-";

/// One named normalization rule. Rules are applied in table order.
pub struct NormalizationRule {
    pub name: &'static str,
    pattern: Regex,
}

impl NormalizationRule {
    pub fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, "").into_owned()
    }
}

lazy_static! {
    /// Markup and artifact stripping, in application order. `://` must be
    /// removed before the `//` line-comment rule eats half a URL token.
    pub static ref MARKUP_RULES: Vec<NormalizationRule> = vec![
        rule("protocol-tokens", r"<\|.*?\|>"),
        rule("code-fences", r"```(?:sql)?"),
        rule("html-comments", r"(?s)<!--.*?-->"),
        rule("endif-junk", r"<!\[endif[^\]]*\]"),
        rule("stray-scheme", r"://"),
        rule("slash-comments", r"//[^\n]*"),
        rule("block-comments", r"(?s)/\*.*?\*/"),
        rule("echoed-labels", r"(?i)SQL query:|SQL:|Query:|### SQL|###"),
        rule("structure-tags", r"</?database_structure>|<sql_query>\.?|<generated_sql>\.?"),
        rule("prefix-marker", r"-_-"),
    ];

    static ref SQL_KEYWORD: Regex =
        Regex::new(r"(?i)^(SELECT|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP)\b").unwrap();

    static ref LINE_COMMENT: Regex = Regex::new(r"--.*$").unwrap();
}

fn rule(name: &'static str, pattern: &str) -> NormalizationRule {
    NormalizationRule {
        name,
        pattern: Regex::new(pattern).unwrap(),
    }
}

/// Apply every markup rule in order.
pub fn strip_markup(text: &str) -> String {
    MARKUP_RULES
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc))
}

/// Drop everything at and after the first occurrence of `marker`.
pub fn truncate_at_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    match text.find(marker) {
        Some(position) => &text[..position],
        None => text,
    }
}

/// Strip a trailing `-- ...` single-line SQL comment.
pub fn strip_line_comment(line: &str) -> String {
    LINE_COMMENT.replace(line, "").into_owned()
}

pub fn starts_with_sql_keyword(line: &str) -> bool {
    SQL_KEYWORD.is_match(line)
}

fn is_echoed_instruction(line: &str) -> bool {
    line.contains("Your Answer:")
}

/// Full cleaning pass for prose responses: markup stripped, truncated at
/// the end-of-answer marker, trimmed.
pub fn clean_text(raw: &str) -> String {
    let stripped = strip_markup(raw);
    truncate_at_marker(&stripped, END_OF_ANSWER).trim().to_string()
}

/// Recover SQL statements from raw model text.
///
/// A line beginning with a DML/DDL keyword opens a statement when none is
/// open; while a statement is open every line is a continuation. A
/// statement closes when its buffer ends with `;`. Prose lines outside a
/// statement are discarded. A non-empty buffer left open at end of text is
/// flushed as implicitly complete rather than dropped (documented policy:
/// tolerate a missing trailing semicolon). The result is deduplicated by
/// exact string equality; callers must not rely on ordering.
pub fn extract_statements(raw: &str) -> Vec<String> {
    let stripped = strip_markup(raw);
    let cleaned = truncate_at_marker(&stripped, END_OF_ANSWER);

    let mut statements: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in cleaned.lines() {
        let line = strip_line_comment(line);
        let line = line.trim();
        if line.is_empty() || is_echoed_instruction(line) {
            continue;
        }
        if current.is_empty() && !starts_with_sql_keyword(line) {
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);

        if current.ends_with(';') {
            statements.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }

    statements.into_iter().unique().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn as_set(statements: Vec<String>) -> HashSet<String> {
        statements.into_iter().collect()
    }

    #[test]
    fn protocol_tokens_are_stripped() {
        assert_eq!(strip_markup("sql_generation<|end|>"), "sql_generation");
    }

    #[test]
    fn code_fences_are_stripped() {
        let cleaned = strip_markup("```sql\nSELECT 1;\n```");
        assert_eq!(cleaned.trim(), "SELECT 1;");
    }

    #[test]
    fn block_and_html_comments_are_stripped() {
        let cleaned = strip_markup("SELECT 1; /* note\nspanning lines */ <!-- html -->");
        assert_eq!(cleaned.trim(), "SELECT 1;");
    }

    #[test]
    fn echoed_labels_are_stripped() {
        let cleaned = strip_markup("SQL query: SELECT * FROM t;");
        assert_eq!(cleaned.trim(), "SELECT * FROM t;");
    }

    #[test]
    fn truncation_stops_at_marker() {
        let text = "SELECT 1;\nAnswer complete.\nSELECT 2;";
        assert_eq!(truncate_at_marker(text, END_OF_ANSWER).trim(), "SELECT 1;");
    }

    #[test]
    fn line_comments_are_removed_but_statement_kept() {
        assert_eq!(
            strip_line_comment("SELECT id FROM t; -- pick everything"),
            "SELECT id FROM t; "
        );
    }

    #[test]
    fn keyword_detection_is_case_insensitive_and_anchored() {
        assert!(starts_with_sql_keyword("select * from t"));
        assert!(starts_with_sql_keyword("DROP TABLE t;"));
        assert!(!starts_with_sql_keyword("the SELECT keyword"));
        assert!(!starts_with_sql_keyword("SELECTED rows follow"));
    }

    #[test]
    fn recovers_statements_from_noisy_response() {
        let raw = "\
Here is your answer:
```sql
SELECT name FROM customers -- all customers
WHERE country = 'canada';
<|assistant|>
INSERT INTO orders (id) VALUES (1);
```
Answer complete.";
        let statements = as_set(extract_statements(raw));
        assert_eq!(
            statements,
            as_set(vec![
                "SELECT name FROM customers WHERE country = 'canada';".to_string(),
                "INSERT INTO orders (id) VALUES (1);".to_string(),
            ])
        );
    }

    #[test]
    fn multi_line_statement_is_reassembled() {
        let raw = "SELECT a, b\nFROM t1\nJOIN t2 ON t1.id = t2.id\nWHERE a > 1;";
        let statements = extract_statements(raw);
        assert_eq!(
            statements,
            vec!["SELECT a, b FROM t1 JOIN t2 ON t1.id = t2.id WHERE a > 1;"]
        );
    }

    #[test]
    fn duplicate_statements_collapse_to_one() {
        let raw = "SELECT 1;\nSELECT 1;\nSELECT 2;";
        let statements = as_set(extract_statements(raw));
        assert_eq!(
            statements,
            as_set(vec!["SELECT 1;".to_string(), "SELECT 2;".to_string()])
        );
    }

    #[test]
    fn trailing_statement_without_semicolon_is_flushed() {
        let raw = "SELECT id FROM customers\nWHERE country = 'canada'";
        let statements = extract_statements(raw);
        assert_eq!(statements, vec!["SELECT id FROM customers WHERE country = 'canada'"]);
    }

    #[test]
    fn prose_outside_statements_is_discarded() {
        let raw = "The query you asked for is below.\nSELECT 1;\nHope this helps!";
        let statements = extract_statements(raw);
        assert_eq!(statements, vec!["SELECT 1;"]);
    }

    #[test]
    fn empty_response_yields_no_statements() {
        assert!(extract_statements("").is_empty());
        assert!(extract_statements("No SQL needed here.").is_empty());
    }

    #[test]
    fn clean_text_strips_and_truncates() {
        let raw = "The schema has three tables.<|end|> Answer complete. trailing junk";
        assert_eq!(clean_text(raw), "The schema has three tables.");
    }
}
