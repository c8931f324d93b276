//! dotenv lines.
//!
//! A value is double-quoted when it contains a newline, `"`, `#` or `$`.
//! Inside quotes `"` is backslash-escaped, newlines become `\n`, and `$` is
//! escaped unless it starts a `$(...)` command substitution.

fn needs_quotes(value: &str) -> bool {
    value.contains(['\n', '"', '#', '$'])
}

pub fn line(name: &str, value: &str) -> String {
    if !needs_quotes(value) {
        return format!("{}={}", name, value);
    }

    let mut quoted = String::with_capacity(value.len() + 8);
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '$' if chars.peek().is_some_and(|next| *next != '(') => quoted.push_str("\\$"),
            c => quoted.push(c),
        }
    }
    format!("{}=\"{}\"", name, quoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value() {
        assert_eq!(line("KEY", "VALUE"), "KEY=VALUE");
        assert_eq!(line("KEY", ""), "KEY=");
    }

    #[test]
    fn test_multiline() {
        assert_eq!(line("KEY", "a\nb"), r#"KEY="a\nb""#);
    }

    #[test]
    fn test_hash_and_quote() {
        assert_eq!(line("KEY", "a#b"), r#"KEY="a#b""#);
        assert_eq!(line("KEY", "a\"b"), r#"KEY="a\"b""#);
    }

    #[test]
    fn test_dollar_escaping() {
        assert_eq!(line("KEY", "a$(..)"), r#"KEY="a$(..)""#);
        assert_eq!(line("KEY", "a${XX}"), r#"KEY="a\${XX}""#);
        assert_eq!(line("KEY", "a$FOO"), r#"KEY="a\$FOO""#);
        assert_eq!(line("KEY", "a\\$(..)"), r#"KEY="a\$(..)""#);
        // A trailing dollar has nothing to introduce
        assert_eq!(line("KEY", "cost$"), r#"KEY="cost$""#);
    }
}
