//! Text rules shared by all modes: length fitting, thread splitting, post selection.

use crate::domain::{MAX_POST_CHARS, Post};

const ELLIPSIS: &str = "...";

/// Trim generator output and cut it to `limit` characters, ending with `...` when cut.
pub fn fit_to_limit(text: &str, limit: usize) -> String {
    let trimmed = strip_wrapping_quotes(text.trim());
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut out: String = trimmed.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

/// Models like to quote their answer; a single pair of outer quotes is dropped.
fn strip_wrapping_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].trim()
    } else {
        s
    }
}

/// Parse a numbered thread (`1/4 ...`, `2/4: ...`) into at most `parts` posts.
///
/// Lines without a `k/` prefix (k in 1..=parts) are ignored, as are parts that
/// are empty or longer than a single post.
pub fn split_thread(text: &str, parts: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['*', '-', '#']).trim();
        let Some(body) = numbered_body(line, parts) else {
            continue;
        };
        if !body.is_empty() && body.chars().count() <= MAX_POST_CHARS {
            out.push(body.to_string());
        }
        if out.len() == parts {
            break;
        }
    }
    out
}

fn numbered_body(line: &str, parts: usize) -> Option<&str> {
    let slash = line.find('/')?;
    let index: usize = line[..slash].parse().ok()?;
    if index == 0 || index > parts {
        return None;
    }
    let rest = &line[slash + 1..];
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    Some(rest.trim_start_matches([':', ')', '.', '*', ' ', '\t']).trim())
}

/// Whether a post is worth engaging with: real text, not a retweet, no link.
pub fn is_suitable(post: &Post) -> bool {
    let text = post.text.trim();
    !text.is_empty()
        && text.chars().count() > 30
        && !text.starts_with("RT @")
        && !text.to_lowercase().contains("http")
}

/// Pick up to `count` posts to act on. Suitable posts come first; when there
/// are fewer than `count` of them, the first fetched posts are used instead.
pub fn select_posts(posts: &[Post], count: usize) -> Vec<&Post> {
    let suitable: Vec<&Post> = posts.iter().filter(|p| is_suitable(p)).collect();
    if suitable.len() >= count {
        suitable.into_iter().take(count).collect()
    } else {
        posts.iter().take(count).collect()
    }
}

/// Generator context for a post-driven mode.
pub fn post_context(post: &Post) -> String {
    format!("Post by @{}: {}", post.author, post.text.trim())
}
