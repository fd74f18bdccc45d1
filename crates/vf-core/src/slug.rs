//! Tag slugs: lowercase ASCII words joined by single dashes.

/// Normalises free text into a tag slug.
///
/// Latin accents are folded to their base letter, every run of other
/// characters becomes one `-`, and leading/trailing dashes are dropped.
/// Returns an empty string when nothing alphanumeric is left.
pub fn slugify_tag(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        match fold_accent(c) {
            Some(folded) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(folded);
            }
            None => pending_dash = true,
        }
    }

    slug
}

/// Human label for a slug ("grow-indoor" → "grow indoor").
pub fn label_from_slug(slug: &str) -> String {
    slug.replace('-', " ")
}

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'a'..='z' | '0'..='9' => return ascii(c),
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        _ => return None,
    };
    Some(folded)
}

fn ascii(c: char) -> Option<&'static str> {
    const ALNUM: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
    ALNUM.find(c).map(|i| &ALNUM[i..i + 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spaces_and_casing() {
        assert_eq!(slugify_tag("Grow Indoor"), "grow-indoor");
    }

    #[test]
    fn strips_special_characters_and_accents() {
        assert_eq!(slugify_tag("Redução de Danos!"), "reducao-de-danos");
        assert_eq!(slugify_tag("ÁGUA Pura"), "agua-pura");
    }

    #[test]
    fn collapses_multiple_separators() {
        assert_eq!(slugify_tag("  cultivo---outdoor  "), "cultivo-outdoor");
    }

    #[test]
    fn returns_empty_without_letters() {
        assert_eq!(slugify_tag("!!!"), "");
    }

    #[test]
    fn labels_restore_spaces() {
        assert_eq!(label_from_slug("reducao-de-danos"), "reducao de danos");
    }
}
