//! Identifier case conversion.
//!
//! New migration files are named `<version>_<snake_name>.<ext>`, and native
//! migration skeletons declare a type named after the migration in StudlyCase.

use regex::Regex;
use std::sync::OnceLock;

/// Splits a human or code identifier into words.
///
/// Runs of non-alphanumeric characters separate words, as do lower-to-upper
/// transitions and the last capital of an acronym followed by a lowercase letter
/// (`HTTPServer` -> `HTTP`, `Server`).
fn split_words(s: &str) -> Vec<String> {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    let separator = SEPARATOR.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

    let mut words = Vec::new();
    for chunk in separator.split(s).filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && c.is_ascii_uppercase() {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
                let boundary = prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next_is_lower);
                if boundary && !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

fn capitalize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}

/// Converts an identifier to `snake_case`.
///
/// # Examples
///
/// ```
/// use uno_rs_core::utils::text::snake_case;
///
/// assert_eq!(snake_case("XxYy"), "xx_yy");
/// assert_eq!(snake_case("add users table"), "add_users_table");
/// ```
pub fn snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Converts an identifier to `StudlyCase` (upper camel case).
///
/// # Examples
///
/// ```
/// use uno_rs_core::utils::text::studly_case;
///
/// assert_eq!(studly_case("xx_yy"), "XxYy");
/// ```
pub fn studly_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// Converts an identifier to `camelCase`.
///
/// # Examples
///
/// ```
/// use uno_rs_core::utils::text::camel_case;
///
/// assert_eq!(camel_case("xx_yy"), "xxYy");
/// ```
pub fn camel_case(s: &str) -> String {
    let words = split_words(s);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_ascii_lowercase());
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_studly_case() {
        assert_eq!(studly_case("xx_yy"), "XxYy");
        assert_eq!(studly_case("create users table"), "CreateUsersTable");
        assert_eq!(studly_case(""), "");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("xx_yy"), "xxYy");
        assert_eq!(camel_case("x"), "x");
        assert_eq!(camel_case("Add-Index"), "addIndex");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("XxYy"), "xx_yy");
        assert_eq!(snake_case("XxYY"), "xx_yy");
        assert_eq!(snake_case("ID"), "id");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("add users--table"), "add_users_table");
        assert_eq!(snake_case("v2Schema"), "v2_schema");
    }

    #[test]
    fn test_snake_case_idempotent() {
        let once = snake_case("AddUserEmailIndex");
        assert_eq!(once, "add_user_email_index");
        assert_eq!(snake_case(&once), once);
    }
}
