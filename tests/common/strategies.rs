use proptest::prelude::*;

/// Strategy for uploaded image names, including dots, spaces and separators
pub fn filename_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ .-]{1,40}(\\.jpg|\\.png|\\.gif)?"
}

/// Strategy for two-letter language codes
pub fn language_strategy() -> impl Strategy<Value = String> {
    "[a-z]{2}"
}

/// Strategy for a non-empty list of distinct target languages
pub fn targets_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(language_strategy(), 1..6)
        .prop_map(|targets| targets.into_iter().collect())
}

/// Strategy for artifact content: any Unicode text, including empty
pub fn content_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "\\PC{0,200}",
        "[a-zA-Zéèàüß日本語 ]{1,64}",
    ]
}
