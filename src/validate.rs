use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::analysis::PostId;
use crate::example::ExampleKey;
use crate::fetch::FetchKey;

pub const EXAMPLE_URL: &str = "twitter.com/user/status/123";

static POST_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.)?(?:twitter\.com|x\.com)/[A-Za-z0-9_]+/status/([0-9]+)/*$",
    )
    .expect("valid post url regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Tweet URL is required!")]
    EmptyInput,
    #[error(
        "Invalid Tweet URL! Did you copy the URL right? For example, 'twitter.com/user/status/123' is a valid URL"
    )]
    MalformedUrl,
}

/// Extracts the numeric post id from a post URL.
pub fn validate(input: &str) -> Result<PostId, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    POST_URL_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|id| PostId::new(id.as_str()))
        .ok_or(ValidationError::MalformedUrl)
}

/// Interprets the inbound route parameter: a bare numeric id, an example key,
/// or a full post URL. Returns `None` when nothing usable was supplied.
pub fn parse_route(param: &str) -> Option<FetchKey> {
    let param = param.trim();
    if param.is_empty() {
        return None;
    }
    if param.bytes().all(|b| b.is_ascii_digit()) {
        return Some(FetchKey::Post(PostId::new(param)));
    }
    if let Some(key) = ExampleKey::parse(param) {
        return Some(FetchKey::Example(key));
    }
    validate(param).ok().map(FetchKey::Post)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_status_digits() {
        let accepted = [
            "twitter.com/user/status/123",
            "http://twitter.com/user/status/123",
            "https://twitter.com/user/status/123",
            "https://www.twitter.com/user/status/123",
            "www.twitter.com/some_user/status/123/",
            "https://twitter.com/user/status/123//",
            "https://x.com/User_42/status/123",
        ];
        for input in accepted {
            assert_eq!(validate(input), Ok(PostId::new("123")), "input: {input}");
        }
    }

    #[test]
    fn empty_and_blank_input_is_reported_as_empty() {
        assert_eq!(validate(""), Err(ValidationError::EmptyInput));
        assert_eq!(validate("   \t"), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn rejects_other_shapes() {
        let rejected = [
            "123",
            "twitter.com/user/status/",
            "twitter.com/user/status/12a",
            "twitter.com/status/123",
            "ftp://twitter.com/user/status/123",
            "https://facebook.com/user/status/123",
            "https://twitter.com/user/status/123?s=20",
            "https://twitter.com/us-er/status/123",
            "twitter.com/user/status/123 extra",
            "twitter.com/user/status/١٢٣",
            "twitter.com/user/status/１２３",
            "twitter.com/user/status/12٣",
        ];
        for input in rejected {
            assert_eq!(
                validate(input),
                Err(ValidationError::MalformedUrl),
                "input: {input}"
            );
        }
    }

    #[test]
    fn trailing_slash_does_not_change_result() {
        let bare = validate("https://twitter.com/user/status/987");
        assert_eq!(bare, validate("https://twitter.com/user/status/987/"));
        assert_eq!(bare, validate("https://twitter.com/user/status/987///"));
    }

    #[test]
    fn validation_is_repeatable() {
        let input = "twitter.com/user/status/42";
        assert_eq!(validate(input), validate(input));
    }

    #[test]
    fn error_messages_suggest_a_fix() {
        assert!(ValidationError::MalformedUrl
            .to_string()
            .contains(EXAMPLE_URL));
        assert_eq!(ValidationError::EmptyInput.to_string(), "Tweet URL is required!");
    }

    #[test]
    fn route_accepts_ids_examples_and_urls() {
        assert_eq!(
            parse_route("123"),
            Some(FetchKey::Post(PostId::new("123")))
        );
        assert_eq!(
            parse_route("tweetExample2"),
            Some(FetchKey::Example(ExampleKey::Two))
        );
        assert_eq!(
            parse_route("https://twitter.com/user/status/77"),
            Some(FetchKey::Post(PostId::new("77")))
        );
        assert_eq!(parse_route(""), None);
        assert_eq!(parse_route("tweetExample9"), None);
        assert_eq!(parse_route("not-a-post"), None);
    }

    #[test]
    fn only_ascii_digits_count_as_ids() {
        assert_eq!(parse_route("١٢٣"), None);
        assert_eq!(parse_route("https://twitter.com/user/status/１２３"), None);
    }
}
