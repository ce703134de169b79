//! Handles normalization of capability names
use std::collections::BTreeSet;

/// Canonical prefix of every kernel capability name
pub const CAP_PREFIX: &str = "CAP_";

/// Converts a capability token into its canonical `CAP_XXX` form.
///
/// Older buildah releases only understand prefixed names, so `sys_admin`
/// becomes `CAP_SYS_ADMIN` and `cap_chown` becomes `CAP_CHOWN`.
pub fn normalize(cap: &str) -> String {
    let upper = cap.to_uppercase();
    if upper.starts_with(CAP_PREFIX) {
        upper
    } else {
        format!("{CAP_PREFIX}{upper}")
    }
}

/// Normalizes every token and collects them into an ordered set
pub fn normalize_all<I, S>(caps: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    caps.into_iter().map(|c| normalize(c.as_ref())).collect()
}

/// Returns the first capability that is both added and dropped.
/// Newer buildah refuses such a container, so it has to be caught up front.
pub fn find_conflict<'a>(
    add: &'a BTreeSet<String>,
    drop: &'a BTreeSet<String>,
) -> Option<&'a String> {
    add.intersection(drop).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let tests = vec![
            ("sys_admin", "CAP_SYS_ADMIN"),
            ("CAP_chown", "CAP_CHOWN"),
            ("cap_net_raw", "CAP_NET_RAW"),
            ("NET_BIND_SERVICE", "CAP_NET_BIND_SERVICE"),
            ("CAP_KILL", "CAP_KILL"),
        ];
        for (input, want) in tests {
            assert_eq!(normalize(input), want, "normalizing {input}");
        }
    }

    #[test]
    fn test_normalize_all_dedups() {
        let set = normalize_all(["chown", "CAP_CHOWN", "cap_chown", "kill"]);
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec!["CAP_CHOWN".to_string(), "CAP_KILL".to_string()]
        );
    }

    #[test]
    fn test_find_conflict() {
        let add = normalize_all(["sys_admin", "chown"]);
        let drop = normalize_all(["CAP_SYS_ADMIN"]);
        assert_eq!(find_conflict(&add, &drop).map(String::as_str), Some("CAP_SYS_ADMIN"));

        let drop = normalize_all(["net_raw"]);
        assert_eq!(find_conflict(&add, &drop), None);
    }

    fn token(raw: String) -> String {
        raw.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect()
    }

    quickcheck! {
        fn property_test_normalize_is_idempotent(raw: String) -> bool {
            let once = normalize(&token(raw));
            normalize(&once) == once
        }

        fn property_test_normalize_is_prefixed(raw: String) -> bool {
            normalize(&token(raw)).starts_with(CAP_PREFIX)
        }

        fn property_test_conflict_ignores_spelling(raw: String) -> bool {
            // the leading letter keeps the token from carrying its own prefix
            let name = format!("x{}", token(raw));
            let add = normalize_all([name.to_lowercase()]);
            let drop = normalize_all([format!("cap_{}", name.to_uppercase())]);
            find_conflict(&add, &drop).is_some()
        }
    }
}
