//! Inline mention rewriting.
//!
//! Slack encodes user mentions as `<@U024BE7LH>` (optionally with a label,
//! `<@U024BE7LH|bob>`). Each one is replaced by `@` plus the user's display
//! name, or by [`UNRESOLVED_MENTION`] when the lookup fails.

use std::sync::LazyLock;

use {regex::Regex, tracing::debug};

use crate::resolver::Resolver;

/// Substituted for a mention whose user could not be resolved.
pub const UNRESOLVED_MENTION: &str = "@Error";

#[allow(clippy::expect_used)]
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[^>]+>").expect("mention pattern compiles"));

/// User id embedded in a raw `<@...>` match.
fn mention_id(raw: &str) -> &str {
    let inner = raw.trim_matches(|c| matches!(c, '<' | '@' | '>'));
    inner.split('|').next().unwrap_or(inner)
}

/// Rewrite every mention in `text`, left to right. A failed lookup only
/// affects its own match.
pub async fn rewrite_mentions(text: &str, resolver: &Resolver) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    let spans: Vec<(usize, usize)> = MENTION_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    for (start, end) in spans {
        out.push_str(&text[last..start]);
        let id = mention_id(&text[start..end]);
        match resolver.resolve_user(id).await {
            Ok(name) => {
                out.push('@');
                out.push_str(&name);
            },
            Err(e) => {
                debug!(user_id = id, error = %e, "mention left unresolved");
                out.push_str(UNRESOLVED_MENTION);
            },
        }
        last = end;
    }

    out.push_str(&text[last..]);
    out
}
