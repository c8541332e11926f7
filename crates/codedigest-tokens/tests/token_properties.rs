use codedigest_tokens::{TokenEstimator, TokenModel, estimate, split_chars};
use proptest::prelude::*;

fn source_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,40}",
        "// [a-z ]{0,30}",
        "# [a-z ]{0,30}",
        "/\\* [a-z ]{0,20} \\*/",
    ]
}

fn source() -> impl Strategy<Value = String> {
    prop::collection::vec(source_line(), 0..20).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn prop_monotonic_in_comment_weight(text in source(), a in 0.0f64..4.0, b in 0.0f64..4.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low = TokenEstimator::default().with_comment_weight(low);
        let high = TokenEstimator::default().with_comment_weight(high);

        prop_assert!(low.estimate(&text, Some("rs")) <= high.estimate(&text, Some("rs")));
    }

    #[test]
    fn prop_weight_is_noop_without_comments(text in "[a-z0-9 \n(){}=.]{0,200}", weight in 0.0f64..4.0) {
        let weighted = TokenEstimator::default().with_comment_weight(weight);

        prop_assert_eq!(
            weighted.estimate(&text, None),
            estimate(&text, TokenModel::default(), None)
        );
    }

    #[test]
    fn prop_split_covers_every_char(text in source()) {
        prop_assert_eq!(split_chars(&text).total(), text.chars().count());
    }
}
