//! Utility functions for the planner pipeline

use anyhow::{bail, Result};
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::planner::phase::PhaseError;

/// Extract JSON content from markdown code blocks or raw text
///
/// Tried in order, first valid JSON wins:
/// - The whole reply, trimmed
/// - ```json blocks, closed by the last fence
/// - Generic ``` blocks, closed by the last fence
/// - Raw JSON with surrounding prose (first `{`/`[` to last `}`/`]`)
///
/// When nothing parses, the first candidate found is returned so the caller
/// reports the error against it.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if is_json(trimmed) {
        return trimmed;
    }

    let candidates = [
        fenced_block(text, "```json"),
        fenced_block(text, "```"),
        braced_span(trimmed),
    ];

    candidates
        .iter()
        .flatten()
        .find(|candidate| is_json(candidate))
        .or_else(|| candidates.iter().flatten().next())
        .copied()
        .unwrap_or(trimmed)
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(text).is_ok()
}

/// Body between `marker` and the last closing fence
fn fenced_block<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)?;
    let body = &text[start + marker.len()..];
    let end = body.rfind("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

fn braced_span(text: &str) -> Option<&str> {
    let open = text.find(|c| c == '{' || c == '[')?;
    let close = text.rfind(|c| c == '}' || c == ']')?;
    (open < close).then(|| &text[open..=close])
}

/// Parse a reasoning reply into a typed structure
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, PhaseError> {
    let json = extract_json(text);
    if json.is_empty() {
        return Err(PhaseError::EmptyReply);
    }
    serde_json::from_str(json).map_err(|e| {
        PhaseError::MalformedReply(format!("{} (reply starts with: {})", e, preview(json, 120)))
    })
}

/// Split a repository URL into `(owner, name)`
///
/// Accepts `https://host/owner/name`, with or without a trailing slash or
/// `.git` suffix.
pub fn parse_repo_url(url: &str) -> Result<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let Some((_, path)) = trimmed.split_once("://") else {
        bail!("Repository URL must include a scheme: {}", url);
    };

    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 {
        bail!("Repository URL must look like https://host/owner/repo: {}", url);
    }

    let owner = parts[parts.len() - 2];
    let name = parts[parts.len() - 1];
    Ok((owner.to_string(), name.to_string()))
}

/// First `max_chars` characters of `text`, marked when truncated
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
