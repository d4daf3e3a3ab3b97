/// URL-safe slug: lowercase ASCII alphanumerics separated by single hyphens.
///
/// Common Latin accents fold to their base letter, `@` reads as "at",
/// everything else separates words. `slugify(slugify(x)) == slugify(x)`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;

    fn push_word(slug: &mut String, word: &str, pending: &mut bool) {
        if *pending && !slug.is_empty() {
            slug.push('-');
        }
        *pending = false;
        slug.push_str(word);
    }

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            let lower = ch.to_ascii_lowercase();
            push_word(&mut slug, lower.encode_utf8(&mut [0; 4]), &mut pending_separator);
        } else if ch == '@' {
            pending_separator = true;
            push_word(&mut slug, "at", &mut pending_separator);
            pending_separator = true;
        } else if let Some(folded) = fold_latin(ch) {
            push_word(&mut slug, folded, &mut pending_separator);
        } else if ch == '\'' || ch == '\u{2019}' {
            // apostrophes join: "don't" -> "dont"
        } else {
            pending_separator = true;
        }
    }

    slug
}

fn fold_latin(ch: char) -> Option<&'static str> {
    let folded = match ch.to_lowercase().next()? {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_names() {
        assert_eq!(slugify("Science Tech"), "science-tech");
        assert_eq!(slugify("  Rust & Go!  "), "rust-go");
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("don't panic"), "dont-panic");
        assert_eq!(slugify("ask@home"), "ask-at-home");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn slugify_is_idempotent() {
        for name in ["Science Tech", "Ünïcode Ñame", "a--b__c", "Hello, World 2024", "x@y"] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
        }
    }
}
