//! Path-based result queries.

use std::fmt;

/// Identifies a result: an object group (type and base id, or just type)
/// plus a path of descriptions through its item groups down to a
/// variable. An empty `og_type` addresses a top-level variable or item
/// group by the first path segment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResultDescription {
    pub og_type: String,
    pub base_id: i32,
    pub user_id: i32,
    pub var_descr_path: Vec<String>,
}

impl ResultDescription {
    pub fn new(og_type: impl Into<String>) -> Self {
        Self { og_type: og_type.into(), ..Default::default() }
    }

    /// Top-level variable or item group, e.g. `Physical time`.
    pub fn top_level(path: &str) -> Self {
        Self { var_descr_path: Self::parse_path(path), ..Default::default() }
    }

    pub fn with_base_id(mut self, base_id: i32) -> Self {
        self.base_id = base_id;
        self
    }

    pub fn with_user_id(mut self, user_id: i32) -> Self {
        self.user_id = user_id;
        self
    }

    /// Set the path from `|`-separated segments, e.g. `Section|Moment`.
    pub fn with_path(mut self, path: &str) -> Self {
        self.var_descr_path = Self::parse_path(path);
        self
    }

    pub fn with_segments<S: Into<String>>(mut self, segments: impl IntoIterator<Item = S>) -> Self {
        self.var_descr_path = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn parse_path(path: &str) -> Vec<String> {
        path.split('|').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    }

    pub fn is_top_level(&self) -> bool {
        self.og_type.is_empty()
    }

    /// True if the type or any path segment contains `*`.
    pub fn has_wildcards(&self) -> bool {
        self.og_type.contains('*') || self.var_descr_path.iter().any(|s| s.contains('*'))
    }
}

impl fmt::Display for ResultDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.og_type.is_empty() {
            write!(f, "{}", self.og_type)?;
            if self.base_id > 0 {
                write!(f, " [{}]", self.base_id)?;
            }
            if self.user_id > 0 {
                write!(f, " id {}", self.user_id)?;
            }
            f.write_str(": ")?;
        }
        f.write_str(&self.var_descr_path.join(" | "))
    }
}

/// Match `text` against a pattern where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let Some((first, rest)) = pattern.split_once('*') else {
        return pattern == text;
    };
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };

    let mut parts: Vec<&str> = rest.split('*').collect();
    let last = parts.pop().unwrap_or("");
    for part in parts {
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_and_display() {
        let d = ResultDescription::new("Triad").with_base_id(3).with_path("Position matrix");
        assert_eq!(d.var_descr_path, ["Position matrix"]);
        assert_eq!(d.to_string(), "Triad [3]: Position matrix");

        let t = ResultDescription::top_level("Physical time");
        assert!(t.is_top_level());
        assert_eq!(t.to_string(), "Physical time");
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(ResultDescription::parse_path("Section | Moment|"), ["Section", "Moment"]);
        assert!(ResultDescription::parse_path("").is_empty());
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("Position*", "Position matrix"));
        assert!(wildcard_match("*matrix", "Position matrix"));
        assert!(wildcard_match("P*s*x", "Position matrix"));
        assert!(!wildcard_match("Velocity*", "Position matrix"));
        assert!(!wildcard_match("*ab*ab", "ab"));
        assert!(wildcard_match("Force", "Force"));
        assert!(ResultDescription::new("*").has_wildcards());
    }
}
