//! Name helpers shared by the services and the tool factory.

use std::sync::LazyLock;

use regex::Regex;

/// Separator between an origin prefix and a capability name.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Replace characters that agent frameworks reject in tool names.
pub fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build `<prefix>__<name>` and sanitize the result.
pub fn namespaced(prefix: &str, name: &str) -> String {
    sanitize_tool_name(&format!("{prefix}{NAMESPACE_SEPARATOR}{name}"))
}

static CAPABILITY_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").expect("capability name regex must compile")
});

/// Capability names: 1-64 characters of `[A-Za-z0-9_.-]`.
pub fn is_valid_capability_name(name: &str) -> bool {
    CAPABILITY_NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_replaces_invalid_characters() {
        assert_eq!(namespaced("weather.eu", "get forecast"), "weather_eu__get_forecast");
        assert_eq!(namespaced("alpha", "search"), "alpha__search");
    }

    #[test]
    fn capability_names_reject_spaces_and_empty() {
        assert!(is_valid_capability_name("get_weather"));
        assert!(is_valid_capability_name("docs.v2-readme"));
        assert!(!is_valid_capability_name(""));
        assert!(!is_valid_capability_name("has space"));
        assert!(!is_valid_capability_name(&"x".repeat(65)));
    }
}
