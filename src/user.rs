const USERNAME_VARS: [&str; 4] = ["KULL_USERNAME", "SUDO_USER", "USER", "LOGNAME"];

/// Name of the invoking user, preferring the real user when running under sudo
pub fn current_username() -> String {
    username_from(|name| std::env::var(name).ok())
}

fn username_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    USERNAME_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> String {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        username_from(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_sudo_user_wins_over_user() {
        assert_eq!(resolve(&[("USER", "root"), ("SUDO_USER", "alice")]), "alice");
    }

    #[test]
    fn test_explicit_override_wins() {
        assert_eq!(
            resolve(&[("KULL_USERNAME", "ops"), ("SUDO_USER", "alice"), ("USER", "root")]),
            "ops"
        );
    }

    #[test]
    fn test_empty_values_are_skipped() {
        assert_eq!(resolve(&[("SUDO_USER", ""), ("LOGNAME", "bob")]), "bob");
        assert_eq!(resolve(&[]), "user");
    }
}
