//! Minimal text-assembly helpers the emitters use to join generated
//! fragments. Deliberately thin: the walker already produces fully-indented
//! C text (see `walker.rs::indent_lines`), so this module only needs the
//! block-level joining and comment-wrapping operations the emitters
//! compose with, not a general-purpose reflow engine.

/// Prefixes every non-empty line of `s` with `level` tabs.
pub fn indent(s: &str, level: usize) -> String {
    let pad = "\t".repeat(level);
    s.lines()
        .map(|line| if line.is_empty() { "\n".to_owned() } else { format!("{}{}\n", pad, line) })
        .collect()
}

/// Wraps `s` as a `/** ... */` doc comment block, one `" * "` per line.
pub fn comment_block(s: &str) -> String {
    let mut out = String::from("/**\n");
    for line in s.lines() {
        if line.is_empty() {
            out += " *\n";
        } else {
            out += " * ";
            out += line;
            out += "\n";
        }
    }
    out += " **/\n";
    out
}

/// Joins a sequence of top-level declarations/definitions with a single
/// blank line between each, trimming any trailing whitespace from each
/// piece first.
pub fn join_blocks<I: IntoIterator<Item = S>, S: AsRef<str>>(blocks: I) -> String {
    blocks
        .into_iter()
        .map(|b| b.as_ref().trim_end().to_owned())
        .collect::<Vec<_>>()
        .join("\n\n")
        + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_adds_tabs_to_non_empty_lines_only() {
        let out = indent("a\n\nb\n", 1);
        assert_eq!(out, "\ta\n\n\tb\n");
    }

    #[test]
    fn comment_block_wraps_each_line() {
        let out = comment_block("first\nsecond");
        assert_eq!(out, "/**\n * first\n * second\n **/\n");
    }

    #[test]
    fn join_blocks_separates_with_blank_line() {
        let out = join_blocks(["a;", "b;"]);
        assert_eq!(out, "a;\n\nb;\n");
    }
}
