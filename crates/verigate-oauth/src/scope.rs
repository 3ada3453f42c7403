//! Scope string arithmetic.
//!
//! Scopes are space-separated names compared by exact string equality.
//! No normalization, no case folding.

/// Split a scope string into its names, dropping empty segments.
pub fn split(scope: &str) -> Vec<&str> {
    scope.split(' ').filter(|s| !s.is_empty()).collect()
}

/// Every name in `requested` appears in `allowed`.
pub fn is_subset(requested: &str, allowed: &str) -> bool {
    let allowed = split(allowed);
    split(requested).iter().all(|name| allowed.contains(name))
}

/// Join scope names back into the wire form.
pub fn join(names: &[&str]) -> String {
    names.join(" ")
}

/// Check the wire format: non-empty, space-separated, each name matching
/// `[A-Za-z0-9_-]+`.
pub fn is_well_formed(scope: &str) -> bool {
    if scope.is_empty() {
        return false;
    }
    scope.split(' ').all(|name| {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}
