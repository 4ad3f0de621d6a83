//! Pure text cleanup applied to model output before it reaches the book.

/// Leading words some models use to announce their answer ("Here is ...:", "Вот ...:").
const PREAMBLE_MARKERS: &[&str] = &["Here", "Вот"];

/// Characters not allowed in file names on common filesystems.
const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Byte budget for a file stem; leaves room for `.epub` under the common 255-byte limit.
pub const MAX_TITLE_BYTES: usize = 200;

/// Drop a meta-commentary first line such as `Here is chapter 3:`.
///
/// Fires only when the text starts with a preamble marker *and* the first line ends with
/// a colon. Everything after the first newline is returned untouched. Text without a
/// newline is returned as is.
pub fn remove_first_line(text: &str) -> &str {
    if !PREAMBLE_MARKERS.iter().any(|m| text.starts_with(m)) {
        return text;
    }
    match text.split_once('\n') {
        Some((first, rest)) if first.trim().ends_with(':') => rest,
        _ => text,
    }
}

/// Turn a free-text title into a safe file stem.
///
/// Removes `< > : " / \ | ? *`, trims, and replaces whitespace with `_`. Stems longer than
/// [MAX_TITLE_BYTES] are cut on a char boundary and lose trailing `_`. Idempotent.
/// An empty result falls back to `book`.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect();
    let mut s: String = kept
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if s.len() > MAX_TITLE_BYTES {
        let mut end = MAX_TITLE_BYTES;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        let trimmed = s.trim_end_matches('_').len();
        s.truncate(trimmed);
    }
    if s.is_empty() {
        "book".to_string()
    } else {
        s
    }
}

/// Collapse blank-line runs into one line break and space/tab runs into one space.
///
/// Line breaks survive so the EPUB writer can still split paragraphs.
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_first_line_drops_english_preamble() {
        let text = "Here is chapter one:\nIt was a dark night.\nRain fell.";
        assert_eq!(remove_first_line(text), "It was a dark night.\nRain fell.");
    }

    #[test]
    fn remove_first_line_drops_russian_preamble() {
        assert_eq!(
            remove_first_line("Вот интересное название:\nТайна особняка"),
            "Тайна особняка"
        );
    }

    #[test]
    fn remove_first_line_tolerates_trailing_spaces_after_colon() {
        assert_eq!(remove_first_line("Here it is:   \nBody"), "Body");
    }

    #[test]
    fn remove_first_line_keeps_text_without_marker() {
        let text = "Chapter one:\nIt was a dark night.";
        assert_eq!(remove_first_line(text), text);
    }

    #[test]
    fn remove_first_line_keeps_text_without_colon() {
        let text = "Here we go again\nIt was a dark night.";
        assert_eq!(remove_first_line(text), text);
    }

    #[test]
    fn remove_first_line_keeps_single_line() {
        assert_eq!(remove_first_line("Here is the title:"), "Here is the title:");
    }

    #[test]
    fn remove_first_line_only_drops_one_line() {
        let text = "Here is the text:\nHere is another:\nBody";
        assert_eq!(remove_first_line(text), "Here is another:\nBody");
    }

    #[test]
    fn sanitize_title_replaces_spaces() {
        assert_eq!(sanitize_title("Тайна особняка"), "Тайна_особняка");
    }

    #[test]
    fn sanitize_title_removes_illegal_characters() {
        assert_eq!(sanitize_title(r#"Who? Me: a "story" <1/2>\|*"#), "Who_Me_a_story_12");
    }

    #[test]
    fn sanitize_title_trims_and_falls_back() {
        assert_eq!(sanitize_title("  Title \n"), "Title");
        assert_eq!(sanitize_title("???"), "book");
        assert_eq!(sanitize_title(""), "book");
    }

    #[test]
    fn sanitize_title_is_idempotent() {
        let samples = [
            "Тайна особняка",
            " a : b ",
            "\t:\tmixed\twhitespace\n",
            "<>:\"/\\|?*",
            "already_clean",
            "  spaced   out  ",
        ];
        for s in samples {
            let once = sanitize_title(s);
            assert_eq!(sanitize_title(&once), once, "input {:?}", s);
            assert!(!once.contains(ILLEGAL_FILENAME_CHARS), "input {:?}", s);
            assert!(!once.contains(' '), "input {:?}", s);
        }
    }

    #[test]
    fn sanitize_title_caps_long_cyrillic_title() {
        let title = "Тайна старого особняка на краю города, где никто не жил долгие годы, \
                     и о которой не знал никто, кроме старой служанки и её молчаливого кота";
        let once = sanitize_title(title);
        assert!(once.len() <= MAX_TITLE_BYTES, "{} bytes", once.len());
        assert!(once.starts_with("Тайна_старого_особняка"));
        assert!(!once.ends_with('_'));
        assert_eq!(sanitize_title(&once), once);

        let file_name = format!("{}.epub", once);
        assert!(file_name.len() < 255);
    }

    #[test]
    fn sanitize_title_cut_drops_trailing_underscore() {
        let title = format!("{} tail", "a".repeat(MAX_TITLE_BYTES - 1));
        assert_eq!(sanitize_title(&title), "a".repeat(MAX_TITLE_BYTES - 1));
        assert_eq!(sanitize_title(&"_".repeat(300)), "book");
    }

    #[test]
    fn normalize_whitespace_keeps_paragraphs() {
        let text = "First  line\twith   gaps\n\n\n  Second line  \n";
        assert_eq!(normalize_whitespace(text), "First line with gaps\nSecond line");
    }
}
