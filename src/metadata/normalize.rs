//! Title canonicalization for comparison.
//!
//! [`normalize`] folds the cosmetic differences catalogs disagree on (case,
//! leading articles, a trailing release year, punctuation, spacing) so the
//! edit distance in [`scoring`](super::scoring) only sees meaningful
//! differences.

/// Articles stripped from the start of a title.
const LEADING_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Canonicalize a title for comparison.
///
/// Rules, in order: lowercase; drop one leading "the"/"a"/"an" followed by
/// whitespace; drop a trailing four-digit year, either parenthesized or as a
/// bare trailing token; delete every character that is not a letter, digit or
/// whitespace (so "Ocean's" becomes "oceans" and "Spider-Man" becomes
/// "spiderman"); collapse whitespace runs and trim.
///
/// The rules are reapplied until the output stops changing, which makes the
/// function idempotent even for inputs like "The The" or "Title 1999!" where
/// one pass exposes a new article or year.
///
/// ```
/// use reelmatch::metadata::normalize::normalize;
///
/// assert_eq!(normalize("The Matrix (1999)"), "matrix");
/// assert_eq!(normalize("Ocean's Eleven"), "oceans eleven");
/// assert_eq!(normalize("Spider-Man"), "spiderman");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(title: &str) -> String {
    let mut current = normalize_once(title);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(title: &str) -> String {
    let lowered = title.to_lowercase();
    let without_article = strip_leading_article(lowered.trim());
    let without_year = strip_trailing_year(without_article);

    let cleaned: String = without_year
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_alphanumeric() {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_leading_article(title: &str) -> &str {
    for article in LEADING_ARTICLES {
        if let Some(rest) = title.strip_prefix(article) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    title
}

/// Remove a trailing `(YYYY)` or ` YYYY`. A title that is nothing but a year
/// ("1917", "2012") is left alone.
fn strip_trailing_year(title: &str) -> &str {
    let trimmed = title.trim_end();

    if let Some(inner) = trimmed.strip_suffix(')') {
        if let Some((head, year)) = inner.rsplit_once('(') {
            if is_year(year) && !head.trim().is_empty() {
                return head.trim_end();
            }
        }
    }

    if let Some((head, last)) = trimmed.rsplit_once(char::is_whitespace) {
        if is_year(last) && !head.trim().is_empty() {
            return head.trim_end();
        }
    }

    trimmed
}

fn is_year(token: &str) -> bool {
    token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize("  INCEPTION  "), "inception");
    }

    #[test]
    fn strips_one_leading_article() {
        assert_eq!(normalize("The Matrix"), "matrix");
        assert_eq!(normalize("A Quiet Place"), "quiet place");
        assert_eq!(normalize("An American Werewolf in London"), "american werewolf in london");
    }

    #[test]
    fn article_must_be_a_separate_word() {
        assert_eq!(normalize("Theodore Rex"), "theodore rex");
        assert_eq!(normalize("Annie"), "annie");
        assert_eq!(normalize("Amelie"), "amelie");
    }

    #[test]
    fn strips_trailing_year() {
        assert_eq!(normalize("The Matrix (1999)"), "matrix");
        assert_eq!(normalize("Dune 2021"), "dune");
        assert_eq!(normalize("Dune   (2021)  "), "dune");
    }

    #[test]
    fn keeps_title_that_is_only_a_year() {
        assert_eq!(normalize("1917"), "1917");
        assert_eq!(normalize("(2012)"), "2012");
    }

    #[test]
    fn keeps_non_year_numbers() {
        assert_eq!(normalize("Ocean's 11"), "oceans 11");
        assert_eq!(normalize("Apollo 13"), "apollo 13");
    }

    #[test]
    fn punctuation_collapses_to_nothing() {
        assert_eq!(normalize("Ocean's Eleven"), "oceans eleven");
        assert_eq!(normalize("Spider-Man"), "spiderman");
        assert_eq!(normalize("Mission: Impossible"), "mission impossible");
        assert_eq!(normalize("Wall\u{2022}E"), "walle");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("Star \t Wars\n  Episode  IV"), "star wars episode iv");
    }

    #[test]
    fn empty_and_blank_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(normalize("Amélie"), "amélie");
        assert_eq!(normalize("千と千尋の神隠し"), "千と千尋の神隠し");
    }

    #[test]
    fn idempotent_on_tricky_inputs() {
        let inputs = [
            "The The",
            "The Matrix 1999!",
            "(The) Matrix",
            "A - The Beginning",
            "Blade Runner 2049 (2017)",
            "  THE   OFFICE (US) (2005) ",
            "2001 1968",
            "",
            "the",
            "Léon: The Professional",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }
}
