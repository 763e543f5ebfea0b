use convoctl_core::markdown;
use convoctl_core::merge::merge;
use convoctl_core::{Conversation, DocumentOptions, Message, Metadata, Platform, ThemeRegistry};
use proptest::prelude::*;

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// Nested list source: (depth, ordered, text) per line.
fn arb_list() -> impl Strategy<Value = String> {
    prop::collection::vec((0usize..3, any::<bool>(), "[a-z]{1,8}"), 1..25).prop_map(|items| {
        items
            .into_iter()
            .map(|(depth, ordered, text)| {
                let marker = if ordered { "1." } else { "-" };
                format!("{}{marker} {text}", "  ".repeat(depth))
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn arb_role_message() -> impl Strategy<Value = Message> {
    (any::<bool>(), "[a-c ]{1,4}").prop_map(|(prompt, text)| {
        if prompt {
            Message::prompt(text)
        } else {
            Message::response(text)
        }
    })
}

proptest! {
    /// Property: script tags in message content never reach any skin unescaped
    #[test]
    fn prop_script_never_unescaped(prefix in "\\PC{0,40}", suffix in "\\PC{0,40}") {
        let content = format!("{prefix}<script>alert(1)</script>{suffix}");
        let mut metadata = Metadata::default();
        metadata.title = content.clone();
        let conv = Conversation::new(
            metadata,
            vec![
                Message::prompt(content.clone()),
                Message::response(content.clone()).with_reasoning(content.clone()),
            ],
        );

        let registry = ThemeRegistry::new();
        for id in registry.ids() {
            let options = DocumentOptions::for_conversation(&conv, Platform::Generic);
            let html = registry.resolve(id).generate_document(&conv, &options);
            prop_assert!(!html.to_lowercase().contains("<script"), "skin {}", id);
        }
    }

    /// Property: opened list tags always match closed list tags
    #[test]
    fn prop_lists_are_balanced(source in arb_list()) {
        let html = markdown::render(&source, true);
        prop_assert_eq!(count(&html, "<ul>"), count(&html, "</ul>"));
        prop_assert_eq!(count(&html, "<ol"), count(&html, "</ol>"));
        prop_assert_eq!(count(&html, "<li>"), count(&html, "</li>"));
    }

    /// Property: the block engine never panics on arbitrary input
    #[test]
    fn prop_render_never_panics(source in "\\PC{0,200}", reasoning in any::<bool>()) {
        let _ = markdown::render(&source, reasoning);
    }

    /// Property: merging a conversation into itself adds nothing
    #[test]
    fn prop_merge_self_is_idempotent(messages in prop::collection::vec(arb_role_message(), 0..20)) {
        let result = merge(&messages, &messages);
        prop_assert!(!result.has_new_content);
        prop_assert_eq!(result.skipped_count, messages.len());
        prop_assert_eq!(result.messages, messages);
    }

    /// Property: merged output always starts with the stored messages
    #[test]
    fn prop_merge_is_append_only(
        existing in prop::collection::vec(arb_role_message(), 0..12),
        incoming in prop::collection::vec(arb_role_message(), 0..12),
    ) {
        let result = merge(&existing, &incoming);
        prop_assert_eq!(&result.messages[..existing.len()], &existing[..]);
        prop_assert_eq!(
            result.skipped_count + result.appended_count(existing.len()),
            incoming.len()
        );
        prop_assert_eq!(result.has_new_content, result.messages.len() > existing.len());
    }
}
