//! Identifier case conversion and naive English plural handling.
//! Client path segments arrive as camelCase and map to kebab-case route segments;
//! model names may be configured plural.

/// Convert a single identifier from camelCase to kebab-case.
/// e.g. "markRead" -> "mark-read", "user" -> "user"
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

pub fn pluralize(s: &str) -> String {
    if s.ends_with('s') {
        return s.to_string();
    }
    if let Some(stem) = s.strip_suffix('y') {
        if !stem.ends_with(&['a', 'e', 'i', 'o', 'u'][..]) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", s)
}

pub fn singularize(s: &str) -> String {
    if let Some(stem) = s.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if s.ends_with("ss") {
        return s.to_string();
    }
    s.strip_suffix('s').unwrap_or(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_to_kebab() {
        assert_eq!(to_kebab_case("markRead"), "mark-read");
        assert_eq!(to_kebab_case("user"), "user");
        assert_eq!(to_kebab_case("created_at"), "created-at");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("company"), "companies");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("companies"), "company");
        assert_eq!(singularize("address"), "address");
    }
}
