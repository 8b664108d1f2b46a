use super::{ConfigParser, FlatConfig, ParseError};

/// Parses `.properties` text.
///
/// Follows the usual properties grammar: `#`/`!` comment lines, `=`, `:` or
/// whitespace as the key separator, trailing-backslash line continuation and
/// `\t \n \r \f \uXXXX` escapes. Later duplicates win.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatParser;

impl ConfigParser for FlatParser {
    fn parse(&self, text: &str) -> Result<FlatConfig, ParseError> {
        let mut out = FlatConfig::new();
        for (line, logical) in logical_lines(text) {
            let (raw_key, raw_value) = split_key_value(&logical);
            let key = unescape(raw_key, line)?;
            let value = unescape(raw_value, line)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Joins continued lines, dropping blanks and comments. Each logical line is
/// paired with the 1-based number of the natural line it started on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (index, natural) in text.lines().enumerate() {
        let trimmed = natural.trim_start_matches(is_blank);

        let (start, mut buffer) = match current.take() {
            Some(pending) => pending,
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                (index + 1, String::new())
            }
        };

        let trailing = trimmed.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            buffer.push_str(&trimmed[..trimmed.len() - 1]);
            current = Some((start, buffer));
        } else {
            buffer.push_str(trimmed);
            lines.push((start, buffer));
        }
    }

    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

/// Splits a logical line at its first unescaped separator.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    let mut separator = None;

    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = index;
                separator = Some(c);
                break;
            }
            c if is_blank(c) => {
                key_end = index;
                separator = Some(c);
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let Some(separator) = separator else {
        return (key, "");
    };

    let mut rest = &line[key_end + separator.len_utf8()..];
    rest = rest.trim_start_matches(is_blank);
    if is_blank(separator) {
        if let Some(stripped) = rest.strip_prefix(['=', ':']) {
            rest = stripped.trim_start_matches(is_blank);
        }
    }
    (key, rest)
}

fn unescape(raw: &str, line: usize) -> Result<String, ParseError> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    let mut pending_high: Option<u32> = None;

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_surrogate(&mut out, &mut pending_high);
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            break;
        };
        if escape != 'u' {
            flush_surrogate(&mut out, &mut pending_high);
            out.push(match escape {
                't' => '\t',
                'n' => '\n',
                'r' => '\r',
                'f' => '\x0c',
                other => other,
            });
            continue;
        }

        let hex: String = chars.by_ref().take(4).collect();
        if hex.len() != 4 {
            return Err(ParseError::MalformedEscape { line });
        }
        let unit =
            u32::from_str_radix(&hex, 16).map_err(|_| ParseError::MalformedEscape { line })?;

        match (pending_high.take(), unit) {
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                out.push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            (previous, 0xD800..=0xDBFF) => {
                if previous.is_some() {
                    out.push(char::REPLACEMENT_CHARACTER);
                }
                pending_high = Some(unit);
            }
            (previous, _) => {
                if previous.is_some() {
                    out.push(char::REPLACEMENT_CHARACTER);
                }
                out.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
        }
    }
    flush_surrogate(&mut out, &mut pending_high);
    Ok(out)
}

fn flush_surrogate(out: &mut String, pending_high: &mut Option<u32>) {
    if pending_high.take().is_some() {
        out.push(char::REPLACEMENT_CHARACTER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> FlatConfig {
        FlatParser.parse(text).unwrap()
    }

    #[test]
    fn test_separators() {
        let config = parse("a=1\nb:2\nc 3\nd = 4\ne : 5\nf\t=\t6\n");
        let expected: FlatConfig = [
            ("a", "1"),
            ("b", "2"),
            ("c", "3"),
            ("d", "4"),
            ("e", "5"),
            ("f", "6"),
        ]
        .into_iter()
        .collect();
        assert_eq!(config, expected);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let config = parse("# comment\n! also comment\n\n   \nkey=value\n");
        assert_eq!(config.len(), 1);
        assert_eq!(config.get("key"), Some("value"));
    }

    #[test]
    fn test_key_without_value() {
        let config = parse("flag\nempty=\n");
        assert_eq!(config.get("flag"), Some(""));
        assert_eq!(config.get("empty"), Some(""));
    }

    #[test]
    fn test_value_keeps_later_separators() {
        let config = parse("url=jdbc:mysql://localhost:3306/db?a=b\n");
        assert_eq!(config.get("url"), Some("jdbc:mysql://localhost:3306/db?a=b"));
    }

    #[test]
    fn test_line_continuation() {
        let config = parse("list=a,\\\n    b,\\\n    c\nnext=1\n");
        assert_eq!(config.get("list"), Some("a,b,c"));
        assert_eq!(config.get("next"), Some("1"));
    }

    #[test]
    fn test_escaped_backslash_does_not_continue() {
        let config = parse("path=C:\\\\\nnext=1\n");
        assert_eq!(config.get("path"), Some("C:\\"));
        assert_eq!(config.get("next"), Some("1"));
    }

    #[test]
    fn test_escapes() {
        let config = parse("a\\=b=c\\td\nu=\\u00e9\\u0041\nemoji=\\ud83d\\ude00\n");
        assert_eq!(config.get("a=b"), Some("c\td"));
        assert_eq!(config.get("u"), Some("éA"));
        assert_eq!(config.get("emoji"), Some("😀"));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let config = parse("k=1\nk=2\n");
        assert_eq!(config.get("k"), Some("2"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let config = parse("a=1\r\nb=2\r\n");
        assert_eq!(config.get("a"), Some("1"));
        assert_eq!(config.get("b"), Some("2"));
    }

    #[test]
    fn test_malformed_unicode_escape() {
        let result = FlatParser.parse("ok=1\nbad=\\u12g4\n");
        assert!(matches!(result, Err(ParseError::MalformedEscape { line: 2 })));
    }
}
