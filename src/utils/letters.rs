use regex::Regex;
use std::sync::OnceLock;

/// Convert a 1-based number to spreadsheet-style letters: 1 -> A, 26 -> Z, 27 -> AA.
pub fn to_letters(num: u64) -> String {
    let mut n = num;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Turn `XmlHTTPRequest` into `Xml HTTP Request` and `firstName` into `First Name`.
pub fn un_camel_case(s: &str) -> String {
    static LOWER_UPPER: OnceLock<Regex> = OnceLock::new();
    static ACRONYM: OnceLock<Regex> = OnceLock::new();
    let lower_upper = LOWER_UPPER.get_or_init(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
    let acronym =
        ACRONYM.get_or_init(|| Regex::new(r"\b([A-Z]+)([A-Z])([a-z])").expect("valid regex"));

    let spaced = lower_upper.replace_all(s, "$1 $2");
    let spaced = acronym.replace(&spaced, "$1 $2$3");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_bijective_base_26() {
        assert_eq!(to_letters(1), "A");
        assert_eq!(to_letters(2), "B");
        assert_eq!(to_letters(26), "Z");
        assert_eq!(to_letters(27), "AA");
        assert_eq!(to_letters(52), "AZ");
        assert_eq!(to_letters(53), "BA");
        assert_eq!(to_letters(702), "ZZ");
        assert_eq!(to_letters(703), "AAA");
        assert_eq!(to_letters(0), "");
    }

    #[test]
    fn camel_case_is_spaced() {
        assert_eq!(un_camel_case("firstName"), "First Name");
        assert_eq!(un_camel_case("XmlHTTPRequest"), "Xml HTTP Request");
        assert_eq!(un_camel_case("url"), "Url");
        assert_eq!(un_camel_case(""), "");
    }
}
