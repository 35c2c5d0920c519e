//! C symbol generation and validation: validate identifiers, derive
//! `lower_snake` symbols from `CamelCase`/`dotted.interface.Names`, and
//! build the three families of prefixed name a generated stub needs
//! (statically-linked helper names, user-visible external names, and
//! typedef names).

use crate::error::{GenError, Result};

/// `[A-Za-z_][A-Za-z0-9_]*`, the character class a C identifier accepts.
pub fn valid(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn require_valid(symbol: &str) -> Result<()> {
    if valid(symbol) {
        Ok(())
    } else {
        Err(GenError::InvalidSymbol(symbol.to_owned()))
    }
}

/// Converts a D-Bus style name to C style: lower-cased, with an underscore
/// inserted before any capital that follows a lowercase/digit and is not
/// itself preceded by an underscore or another capital — so a run of
/// capitals (an acronym) only breaks before its first letter.
pub fn from_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0
            && c.is_ascii_uppercase()
            && chars[i - 1] != '_'
            && !(chars[i - 1].is_ascii_uppercase())
        {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Builds a symbol for a statically-linked helper: `prefix_interface_name[_postfix]`
/// with interface-name periods replaced by underscores.
pub fn impl_name(prefix: &str, interface_name: &str, name: Option<&str>, postfix: Option<&str>) -> String {
    let mut s = format!("{}_", prefix);
    s += &interface_name.replace('.', "_");
    if let Some(name) = name {
        s += "_";
        s += name;
    }
    if let Some(postfix) = postfix {
        s += "_";
        s += postfix;
    }
    s
}

/// Builds a symbol for a user-visible external function/name:
/// `prefix[_interface_symbol][_midfix]_symbol[_postfix]`.
pub fn extern_name(
    prefix: &str,
    interface_symbol: Option<&str>,
    midfix: Option<&str>,
    symbol: &str,
    postfix: Option<&str>,
) -> String {
    let mut s = format!("{}_", prefix);
    if let Some(i) = interface_symbol {
        s += i;
        s += "_";
    }
    if let Some(m) = midfix {
        s += m;
        s += "_";
    }
    s += symbol;
    if let Some(p) = postfix {
        s += "_";
        s += p;
    }
    s
}

fn title_case_append(out: &mut String, word: &str) {
    let mut first = true;
    for c in word.chars() {
        if c == '_' {
            first = true;
            continue;
        }
        if first {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        first = false;
    }
}

/// Same structure as `extern_name`, but each underscore-delimited component
/// is rendered `TitleCase` with underscores removed, for naming typedefs of
/// handler function pointers and generated structs.
pub fn typedef_name(
    prefix: &str,
    interface_symbol: Option<&str>,
    midfix: Option<&str>,
    symbol: &str,
    postfix: Option<&str>,
) -> String {
    let mut s = String::new();
    title_case_append(&mut s, prefix);
    if let Some(i) = interface_symbol {
        title_case_append(&mut s, i);
    }
    if let Some(m) = midfix {
        title_case_append(&mut s, m);
    }
    title_case_append(&mut s, symbol);
    if let Some(p) = postfix {
        title_case_append(&mut s, p);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_rejects_leading_digit() {
        assert!(!valid("9lives"));
        assert!(valid("_9lives"));
        assert!(valid("lives9"));
    }

    #[test]
    fn valid_rejects_empty_and_punctuation() {
        assert!(!valid(""));
        assert!(!valid("my-method"));
        assert!(valid("my_method"));
    }

    #[test]
    fn from_name_camel_case() {
        assert_eq!(from_name("CamelCase"), "camel_case");
        assert_eq!(from_name("CamelCase_Mixed"), "camel_case_mixed");
    }

    #[test]
    fn from_name_acronym_run_stays_together() {
        // A run of capitals only breaks before the first capital of the run.
        assert_eq!(from_name("GetURLFor"), "get_urlfor");
    }

    #[test]
    fn impl_name_dots_become_underscores() {
        assert_eq!(
            impl_name("my", "com.example.Foo", Some("Bar"), None),
            "my_com_example_Foo_Bar"
        );
    }

    #[test]
    fn extern_name_joins_components() {
        assert_eq!(
            extern_name("my", Some("com_example_foo"), None, "bar", None),
            "my_com_example_foo_bar"
        );
        assert_eq!(
            extern_name("my", Some("com_example_foo"), Some("async"), "bar", Some("reply")),
            "my_com_example_foo_async_bar_reply"
        );
    }

    #[test]
    fn typedef_round_trips_title_case() {
        let t = typedef_name("my", Some("com_example_foo"), None, "bar", None);
        assert_eq!(t, "MyComExampleFooBar");
        assert_eq!(from_name(&t), "my_com_example_foo_bar");
    }

    #[test]
    fn typedef_chains_with_from_name() {
        let original = "my_com_example_foo_async_bar_reply";
        let t = typedef_name("my", Some("com_example_foo"), Some("async"), "bar", Some("reply"));
        assert_eq!(from_name(&t), original);
    }
}
