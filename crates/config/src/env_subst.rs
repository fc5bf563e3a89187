/// Expand `${NAME}` references in raw config text from the process environment.
///
/// References to unset variables stay in the output verbatim so validation
/// can point at them.
pub fn substitute_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated reference, keep the tail as written.
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SLACK_TOKEN" => Some("xoxp-123".into()),
            "GOTIFY_HOST" => Some("push.example.com".into()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_vars() {
        assert_eq!(
            expand_with("token = \"${SLACK_TOKEN}\"", lookup),
            "token = \"xoxp-123\""
        );
    }

    #[test]
    fn expands_several_vars_in_one_line() {
        assert_eq!(
            expand_with("${GOTIFY_HOST}/${SLACK_TOKEN}", lookup),
            "push.example.com/xoxp-123"
        );
    }

    #[test]
    fn keeps_unknown_and_empty_refs() {
        assert_eq!(expand_with("${NOPE} ${}", lookup), "${NOPE} ${}");
    }

    #[test]
    fn keeps_unterminated_ref() {
        assert_eq!(expand_with("a ${SLACK_TOKEN", lookup), "a ${SLACK_TOKEN");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(substitute_env("no refs here"), "no refs here");
    }
}
