//! Content and shape rules applied before any draft write.

use readzone_types::book::BookData;
use readzone_types::config::DraftsConfig;
use readzone_types::error::ValidationError;

/// Remove `<...>` tags, leaving the text between them.
///
/// An unterminated `<` swallows the rest of the input, matching how a
/// browser would treat it as an open tag.
pub fn strip_markup(content: &str) -> String {
    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match (in_tag, c) {
            (false, '<') => in_tag = true,
            (true, '>') => in_tag = false,
            (false, c) => text.push(c),
            (true, _) => {}
        }
    }
    text
}

/// Check size and "real text" rules on draft content.
pub fn validate_content(content: &str, rules: &DraftsConfig) -> Result<(), ValidationError> {
    if content.len() > rules.max_content_bytes {
        return Err(ValidationError::ContentTooLarge {
            actual: content.len(),
            max: rules.max_content_bytes,
        });
    }

    let text_chars = strip_markup(content).trim().chars().count();
    if text_chars < rules.min_text_chars {
        return Err(ValidationError::ContentTooShort {
            actual: text_chars,
            min: rules.min_text_chars,
        });
    }

    Ok(())
}

pub fn validate_title(title: &str, rules: &DraftsConfig) -> Result<(), ValidationError> {
    let chars = title.chars().count();
    if chars > rules.max_title_chars {
        return Err(ValidationError::TitleTooLong {
            actual: chars,
            max: rules.max_title_chars,
        });
    }
    Ok(())
}

/// Book data must be a JSON object with a non-empty title.
pub fn validate_book_data(raw: &str) -> Result<BookData, ValidationError> {
    let data = BookData::parse(raw).map_err(|e| ValidationError::InvalidBookData(e.to_string()))?;
    if data.title.trim().is_empty() {
        return Err(ValidationError::InvalidBookData("title is empty".to_string()));
    }
    Ok(data)
}

/// Resolve paging input into `(page, limit)`, applying the default limit.
pub fn validate_page(
    page: Option<u32>,
    limit: Option<u32>,
    rules: &DraftsConfig,
) -> Result<(u32, u32), ValidationError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ValidationError::InvalidPage);
    }
    let limit = limit.unwrap_or(rules.default_page_size);
    if limit < 1 || limit > rules.max_page_size {
        return Err(ValidationError::InvalidLimit {
            max: rules.max_page_size,
        });
    }
    Ok((page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> DraftsConfig {
        DraftsConfig::default()
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_markup("no tags"), "no tags");
        assert_eq!(strip_markup("before <unterminated"), "before ");
    }

    #[test]
    fn test_content_needs_ten_text_chars() {
        assert!(validate_content("<p>0123456789</p>", &rules()).is_ok());
        let err = validate_content("<p><br/>   short   </p>", &rules()).unwrap_err();
        assert_eq!(err, ValidationError::ContentTooShort { actual: 5, min: 10 });
    }

    #[test]
    fn test_content_counts_characters_not_bytes() {
        // Ten Hangul syllables: 30 bytes, 10 characters.
        assert!(validate_content("가나다라마바사아자차", &rules()).is_ok());
    }

    #[test]
    fn test_content_over_one_mebibyte() {
        let content = "a".repeat(1_048_577);
        let err = validate_content(&content, &rules()).unwrap_err();
        assert_eq!(err.code(), "content_too_large");

        let exact = "a".repeat(1_048_576);
        assert!(validate_content(&exact, &rules()).is_ok());
    }

    #[test]
    fn test_title_limit() {
        assert!(validate_title(&"t".repeat(200), &rules()).is_ok());
        assert!(validate_title(&"t".repeat(201), &rules()).is_err());
    }

    #[test]
    fn test_book_data_rules() {
        assert!(validate_book_data(r#"{"title":"Foo","author":"Bar"}"#).is_ok());
        assert!(validate_book_data("not json").is_err());
        assert!(validate_book_data(r#"["Foo"]"#).is_err());
        assert!(validate_book_data(r#"{"title":"  "}"#).is_err());
    }

    #[test]
    fn test_page_defaults_and_bounds() {
        assert_eq!(validate_page(None, None, &rules()).unwrap(), (1, 5));
        assert_eq!(validate_page(Some(3), Some(50), &rules()).unwrap(), (3, 50));
        assert_eq!(
            validate_page(Some(0), None, &rules()).unwrap_err(),
            ValidationError::InvalidPage
        );
        assert!(validate_page(None, Some(51), &rules()).is_err());
        assert!(validate_page(None, Some(0), &rules()).is_err());
    }
}
