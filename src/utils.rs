//! Utility functions shared across tiers, stores and the worker

/// Normalise a member name into its cache and store key.
///
/// Member names are case-insensitive; surrounding whitespace is ignored.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Reduce a tier name to an identifier safe to use as a table name
pub fn slug(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Name of the backing table that stores a tier's ladder
pub fn table_name(tier_name: &str) -> String {
    format!("tier_{}", slug(tier_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Ash "), "ash");
        assert_eq!(normalize_name("MISTY"), "misty");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("OverUsed"), "overused");
        assert_eq!(slug("Wifi OU"), "wifi_ou");
        assert_eq!(slug("Uber-2"), "uber_2");
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("Wifi OU"), "tier_wifi_ou");
        assert_eq!(table_name(""), "tier_");
    }
}
