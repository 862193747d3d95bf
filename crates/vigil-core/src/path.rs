#![forbid(unsafe_code)]

//! Canonical path strings.
//!
//! Paths are the dotted/bracketed route from an observation root: properties
//! join with `.` (`sprite.position.x`), array indices with brackets
//! (`items[2]`). The root itself has the empty path, so a root-level join
//! yields the bare segment.

/// Join a property name onto a parent path.
#[must_use]
pub fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Join an array index onto a parent path.
#[must_use]
pub fn join_index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_join_is_bare_segment() {
        assert_eq!(join_key("", "x"), "x");
        assert_eq!(join_index("", 0), "[0]");
    }

    #[test]
    fn nested_joins() {
        assert_eq!(join_key("a.b", "c"), "a.b.c");
        assert_eq!(join_index("a.items", 3), "a.items[3]");
        assert_eq!(join_key(&join_index("a", 1), "x"), "a[1].x");
    }
}
