//! Environment-variable expansion for the filename argument.
//!
//! Accepts the Windows `%NAME%` form as well as `$NAME` and `${NAME}`.
//! References to unset variables are left untouched, matching
//! `ExpandEnvironmentStrings`.

/// Expand variables in `input` using the process environment.
pub fn expand(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand variables in `input`, resolving names through `lookup`.
pub fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['%', '$']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let (name, consumed) = if let Some(after) = tail.strip_prefix('%') {
            match after.find('%') {
                Some(end) if end > 0 => (Some(&after[..end]), end + 2),
                _ => (None, 1),
            }
        } else if let Some(after) = tail.strip_prefix("${") {
            match after.find('}') {
                Some(end) if end > 0 => (Some(&after[..end]), end + 3),
                _ => (None, 1),
            }
        } else {
            let after = &tail[1..];
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if end > 0 {
                (Some(&after[..end]), end + 1)
            } else {
                (None, 1)
            }
        };

        match name.and_then(|n| lookup(n)) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/ada".into()),
            "USERPROFILE" => Some(r"C:\Users\ada".into()),
            "A_1" => Some("x".into()),
            _ => None,
        }
    }

    #[test]
    fn expands_all_three_forms() {
        assert_eq!(expand_with("$HOME/pic.jpg", lookup), "/home/ada/pic.jpg");
        assert_eq!(expand_with("${HOME}s/pic.jpg", lookup), "/home/adas/pic.jpg");
        assert_eq!(
            expand_with(r"%USERPROFILE%\Pictures\a.jpg", lookup),
            r"C:\Users\ada\Pictures\a.jpg"
        );
        assert_eq!(expand_with("$A_1-$A_1", lookup), "x-x");
    }

    #[test]
    fn unknown_and_incomplete_references_stay_verbatim() {
        assert_eq!(expand_with("%NOPE%/a", lookup), "%NOPE%/a");
        assert_eq!(expand_with("$NOPE/a", lookup), "$NOPE/a");
        assert_eq!(expand_with("${NOPE}", lookup), "${NOPE}");
        assert_eq!(expand_with("100% sure", lookup), "100% sure");
        assert_eq!(expand_with("cost $5", lookup), "cost $5");
        assert_eq!(expand_with("trailing $", lookup), "trailing $");
        assert_eq!(expand_with("%%", lookup), "%%");
        assert_eq!(expand_with("${unterminated", lookup), "${unterminated");
    }

    #[test]
    fn plain_paths_pass_through() {
        assert_eq!(expand_with("/tmp/photo.jpg", lookup), "/tmp/photo.jpg");
        assert_eq!(expand_with("", lookup), "");
    }
}
