use proptest::prelude::*;
use rstest::rstest;

use topicbus::{sanitize, StatusCode, Topic, TopicError};

proptest! {
    #[test]
    fn prop_unterminated_topic_gets_separator(s in "[a-zA-Z0-9._/-]{0,31}[a-zA-Z0-9._-]") {
        prop_assert_eq!(sanitize(&s), format!("{s}/"));
    }

    #[test]
    fn prop_terminated_topic_is_identity(s in "[a-zA-Z0-9._/-]{0,31}/") {
        prop_assert_eq!(sanitize(&s), s);
    }

    #[test]
    fn prop_canonical_form_is_fixed_point(s in "[a-zA-Z0-9._/-]{1,32}") {
        let once = sanitize(&s);
        prop_assert_eq!(sanitize(&once), once.clone());
        prop_assert!(once.ends_with('/'));
    }

    #[test]
    fn prop_foreign_character_is_rejected(
        prefix in "[a-zA-Z0-9._/-]{0,8}",
        bad in "[ *#?+:@!\t\u{e9}\u{416}]",
        suffix in "[a-zA-Z0-9._/-]{0,8}",
    ) {
        let raw = format!("{prefix}{bad}{suffix}");
        prop_assert_eq!(sanitize(&raw), "");
        let is_malformed = matches!(Topic::parse(&raw), Err(TopicError::Malformed { .. }));
        prop_assert!(is_malformed);
    }
}

#[rstest]
#[case("home", Ok("home/"))]
#[case("home/", Ok("home/"))]
#[case("sensors/temp", Ok("sensors/temp/"))]
#[case("edgex.core-data_v2", Ok("edgex.core-data_v2/"))]
#[case("", Err(StatusCode::InvalidTopic))]
#[case("This is a topic", Err(StatusCode::InvalidTopic))]
#[case("home/#", Err(StatusCode::InvalidTopic))]
fn test_topic_table(
    #[case] raw: &str,
    #[case] expected: Result<&str, StatusCode>,
) {
    let parsed = Topic::parse(raw)
        .map(Topic::into_string)
        .map_err(|e| topicbus::StackError::from(e).status_code());
    assert_eq!(parsed, expected.map(str::to_string));
}
