//! Column name normalization and de-duplication.

use std::collections::HashSet;

use crate::error::{IngestionError, IngestionResult};

/// What to do when a table has two columns with the same name.
///
/// Names are compared ASCII case-insensitively, as SQLite does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DupColumnPolicy {
    /// Later duplicates get `_1`, `_2`, ... suffixes, skipping suffixes already in use.
    #[default]
    Rename,
    /// Fail the table with a value error.
    Error,
}

/// Clean one header cell. Blank headers become `col<N>` (1-based position).
pub fn clean_header(position: usize, raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '"' | '\'' | '`' | '[' | ']' => '_',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        format!("col{}", position + 1)
    } else {
        cleaned
    }
}

/// Make `names` unique according to `policy`. Order is preserved.
///
/// ```
/// use sqlite_ingest::processing::{dedup_columns, DupColumnPolicy};
///
/// let names = vec!["a".to_string(), "a".to_string(), "b".to_string()];
/// let out = dedup_columns(names, DupColumnPolicy::Rename).unwrap();
/// assert_eq!(out, vec!["a", "a_1", "b"]);
/// ```
pub fn dedup_columns(names: Vec<String>, policy: DupColumnPolicy) -> IngestionResult<Vec<String>> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        if seen.insert(name.to_ascii_lowercase()) {
            out.push(name);
            continue;
        }
        match policy {
            DupColumnPolicy::Error => {
                return Err(IngestionError::value(format!("duplicate column name '{name}'")));
            }
            DupColumnPolicy::Rename => {
                let renamed = (1..)
                    .map(|n| format!("{name}_{n}"))
                    .find(|candidate| !seen.contains(&candidate.to_ascii_lowercase()))
                    .unwrap_or_else(|| name.clone());
                seen.insert(renamed.to_ascii_lowercase());
                out.push(renamed);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rename_skips_taken_suffixes() {
        let out = dedup_columns(names(&["a", "a_1", "a", "A"]), DupColumnPolicy::Rename).unwrap();
        assert_eq!(out, vec!["a", "a_1", "a_2", "A_3"]);
    }

    #[test]
    fn error_policy_rejects_duplicates() {
        let err = dedup_columns(names(&["id", "ID"]), DupColumnPolicy::Error).unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'ID'"));
    }

    #[test]
    fn headers_are_cleaned() {
        assert_eq!(clean_header(0, "  first\tname "), "first name");
        assert_eq!(clean_header(1, "say \"hi\""), "say _hi_");
        assert_eq!(clean_header(2, "   "), "col3");
    }
}
