// ABOUTME: Message-key resolution so hosts can localize user-visible errors

/// Resolves a stable message key to a localized label. Returning `None`
/// falls back to the built-in English rendering.
pub trait MessageResolver {
    fn resolve(&self, key: &str) -> Option<String>;
}

/// The English table shipped with the core.
pub struct DefaultMessages;

impl MessageResolver for DefaultMessages {
    fn resolve(&self, key: &str) -> Option<String> {
        let label = match key {
            "error.lex" => "lex error",
            "error.parse" => "parse error",
            "error.semantic" => "semantic error",
            "error.runtime" => "runtime error",
            "error.runtime.assertion" => "assertion failed",
            "error.runtime.loop-limit" => "loop guard tripped",
            "error.runtime.action" => "action failed",
            "error.module" => "module error",
            _ => return None,
        };
        Some(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keys_resolve() {
        assert_eq!(
            DefaultMessages.resolve("error.runtime").as_deref(),
            Some("runtime error")
        );
        assert!(DefaultMessages.resolve("error.unknown-key").is_none());
    }
}
