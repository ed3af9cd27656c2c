//! Property tests for `${var}` substitution

use proptest::prelude::*;
use types::TestContext;

proptest! {
    #[test]
    fn text_without_placeholders_is_unchanged(text in "[^$]*") {
        let context = TestContext::new();
        prop_assert_eq!(context.replace_dynamic_content(&text).unwrap(), text);
    }

    #[test]
    fn every_placeholder_is_replaced(
        name in "[a-z][a-z0-9_]{0,12}",
        value in "[A-Za-z0-9 ]{0,24}",
        prefix in "[A-Za-z ]{0,8}",
        suffix in "[A-Za-z ]{0,8}",
    ) {
        let context = TestContext::new();
        context.set_variable(name.clone(), value.clone());

        let text = format!("{prefix}${{{name}}}{suffix}${{{name}}}");
        prop_assert_eq!(
            context.replace_dynamic_content(&text).unwrap(),
            format!("{prefix}{value}{suffix}{value}")
        );
    }
}
