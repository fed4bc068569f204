//! Comment stripping and line splitting. One statement per non-comment
//! line (§4.B); `#` and `//` start a comment that runs to end of line.

/// A source line with its comment stripped and whitespace trimmed, paired
/// with its 1-indexed line number. Blank lines (after stripping) are
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: u32,
    pub text: String,
}

/// Strip a trailing `#` or `//` comment from `line`, whichever appears
/// first.
pub fn strip_comment(line: &str) -> &str {
    let hash = line.find('#');
    let slashes = line.find("//");
    let cut = match (hash, slashes) {
        (Some(h), Some(s)) => Some(h.min(s)),
        (Some(h), None) => Some(h),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    };
    match cut {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Split `text` into non-blank, comment-stripped, trimmed source lines.
pub fn lines(text: &str) -> Vec<SourceLine> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let stripped = strip_comment(raw).trim();
            if stripped.is_empty() {
                None
            } else {
                Some(SourceLine {
                    number: (i + 1) as u32,
                    text: stripped.to_string(),
                })
            }
        })
        .collect()
}

/// Split a statement line into `(keyword, rest)` on the first run of
/// whitespace.
pub fn split_keyword(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim_start()),
        None => (line, ""),
    }
}

/// Split a `<target>: <args>` tail into `(target, args)` on the first
/// colon.
pub fn split_target(rest: &str) -> Option<(&str, &str)> {
    let i = rest.find(':')?;
    Some((rest[..i].trim(), rest[i + 1..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comment_cuts_at_hash() {
        assert_eq!(strip_comment("seq kick: x... # four on the floor"), "seq kick: x... ");
    }

    #[test]
    fn strip_comment_cuts_at_double_slash() {
        assert_eq!(strip_comment("TEMPO 120 // standard house tempo"), "TEMPO 120 ");
    }

    #[test]
    fn strip_comment_leaves_plain_lines_untouched() {
        assert_eq!(strip_comment("TEMPO 120"), "TEMPO 120");
    }

    #[test]
    fn lines_skips_blank_and_comment_only_lines() {
        let src = "TEMPO 120\n\n# a comment\nseq kick: x...\n";
        let out = lines(src);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].number, 1);
        assert_eq!(out[1].number, 4);
    }

    #[test]
    fn split_keyword_separates_first_word() {
        assert_eq!(split_keyword("seq kick: x..."), ("seq", "kick: x..."));
        assert_eq!(split_keyword("TEMPO 120"), ("TEMPO", "120"));
    }

    #[test]
    fn split_target_separates_on_colon() {
        assert_eq!(split_target("kick: x...x..."), Some(("kick", "x...x...")));
        assert_eq!(split_target("master: low=1 mid=0"), Some(("master", "low=1 mid=0")));
        assert_eq!(split_target("no colon here"), None);
    }
}
