/// Returns true if the identifier is already safe to use as a catalog,
/// schema or table path component.
pub fn is_safe_ident(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Canonicalize identifiers into filesystem-safe path components.
///
/// Unsafe names are slugged and suffixed with a short hash so that two
/// different inputs never collapse onto the same table file.
pub fn safe_ident(name: &str) -> String {
    if is_safe_ident(name) {
        return name.to_string();
    }

    let mut slug = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };

        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
            slug.push('_');
        } else {
            last_was_underscore = false;
            slug.push(mapped);
        }
    }

    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "table" } else { slug };
    let hash = blake3::hash(name.as_bytes()).to_hex();
    format!("{}_{}", slug, &hash[..8])
}
