//! Readers for the plain-text formats used throughout a package tree.
//!
//! Two shapes cover nearly every file: line lists (`categories`,
//! `use.mask`, `parent`, `packages`) where `#` starts a comment, and
//! `KEY="value"` assignments (`make.defaults`, metadata cache entries).

/// Iterates the meaningful lines of a line-list file.
///
/// Leading and trailing whitespace is removed, blank lines are skipped, and
/// anything after a `#` is treated as a comment.
pub fn config_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(before, _)| before).trim())
        .filter(|line| !line.is_empty())
}

/// Splits a line into whitespace-separated tokens.
pub fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
}

/// Strips one level of matching single or double quotes.
pub fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parses shell-style `KEY=value` assignments in file order, as found in
/// `make.defaults`.
///
/// Values may be quoted, and a quoted value may span several lines; the
/// lines are joined with `\n`. An optional leading `export ` is ignored.
/// Lines without `=` or with an empty key are skipped. Values are returned
/// raw, without variable expansion.
pub fn key_values(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            continue;
        }

        let mut value = value.trim().to_string();
        if let Some(quote) = unclosed_quote(&value) {
            let mut closed = false;
            for next in lines.by_ref() {
                value.push('\n');
                value.push_str(next.trim());
                if next.contains(quote) {
                    closed = true;
                    break;
                }
            }
            if !closed {
                value.remove(0);
            }
        }
        pairs.push((key.to_string(), unquote(&value).to_string()));
    }

    pairs
}

/// The quote `value` opens without closing on the same line.
fn unclosed_quote(value: &str) -> Option<char> {
    let quote = value.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    (!value[1..].contains(quote)).then_some(quote)
}

/// Parses flat `KEY=value` lines, one entry per line and no quoting, as
/// written by metadata caches.
pub fn flat_entries(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim_end().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_lines() {
        let content = "# header\nfoo\n\n  bar  # trailing\n#baz\n";
        let lines: Vec<_> = config_lines(content).collect();
        assert_eq!(lines, vec!["foo", "bar"]);
    }

    #[test]
    fn test_tokens() {
        let toks: Vec<_> = tokens("foo/bar  test3\t-test4").collect();
        assert_eq!(toks, vec!["foo/bar", "test3", "-test4"]);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"test1 -test2\""), "test1 -test2");
        assert_eq!(unquote("'x86'"), "x86");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_key_values() {
        let content = "# comment\nARCH=\"test\"\nexport USE='a -b'\nHOMEPAGE=https://x.org/#frag\nbogus line\n=novalue\n";
        let pairs = key_values(content);
        assert_eq!(
            pairs,
            vec![
                ("ARCH".to_string(), "test".to_string()),
                ("USE".to_string(), "a -b".to_string()),
                ("HOMEPAGE".to_string(), "https://x.org/#frag".to_string()),
            ]
        );
    }

    #[test]
    fn test_key_values_multiline() {
        let content = "USE=\"a\n  -b\n  c\"\nARCH=\"x86\"\nBROKEN=\"never\nclosed\n";
        let pairs = key_values(content);
        assert_eq!(
            pairs,
            vec![
                ("USE".to_string(), "a\n-b\nc".to_string()),
                ("ARCH".to_string(), "x86".to_string()),
                ("BROKEN".to_string(), "never\nclosed".to_string()),
            ]
        );
        let flags: Vec<_> = tokens(&pairs[0].1).collect();
        assert_eq!(flags, vec!["a", "-b", "c"]);
    }

    #[test]
    fn test_flat_entries() {
        let content = "DESCRIPTION='s quote\nSLOT=0\n\nnoise\nIUSE=a b\n";
        assert_eq!(
            flat_entries(content),
            vec![
                ("DESCRIPTION".to_string(), "'s quote".to_string()),
                ("SLOT".to_string(), "0".to_string()),
                ("IUSE".to_string(), "a b".to_string()),
            ]
        );
    }
}
