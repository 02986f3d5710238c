//! Path pattern segments for route declarations
//!
//! A route declared with `path: "/post/:post_id"` owns a `:post_id` dynamic
//! segment; `*rest` captures the remainder of the URL. Patterns are parsed
//! once when the route tree is built and reused for recognition and URL
//! generation.

use std::collections::BTreeMap;

use crate::transition::Params;

/// One segment of a route's URL pattern
///
/// # Examples
///
/// ```
/// use trellis_router::pattern::{classify_segment, PatternSegment};
///
/// assert_eq!(classify_segment("posts"), PatternSegment::Static("posts".into()));
/// assert_eq!(classify_segment(":post_id"), PatternSegment::Dynamic("post_id".into()));
/// assert_eq!(classify_segment("*path"), PatternSegment::Wildcard("path".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// Literal text that must match exactly
    Static(String),
    /// `:name`, captures exactly one URL segment
    Dynamic(String),
    /// `*name`, captures one or more remaining segments joined with `/`
    Wildcard(String),
}

impl PatternSegment {
    /// Name of the captured parameter, `None` for static text
    pub fn param_name(&self) -> Option<&str> {
        match self {
            PatternSegment::Static(_) => None,
            PatternSegment::Dynamic(name) | PatternSegment::Wildcard(name) => Some(name),
        }
    }
}

/// Classifies a single pattern segment (pure function)
pub fn classify_segment(segment: &str) -> PatternSegment {
    if let Some(name) = segment.strip_prefix(':') {
        PatternSegment::Dynamic(name.to_string())
    } else if let Some(name) = segment.strip_prefix('*') {
        PatternSegment::Wildcard(name.to_string())
    } else {
        PatternSegment::Static(segment.to_string())
    }
}

/// Parses a path pattern into its segments, ignoring empty segments
///
/// # Examples
///
/// ```
/// use trellis_router::pattern::{parse_pattern, PatternSegment};
///
/// let segments = parse_pattern("/post/:post_id");
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[1], PatternSegment::Dynamic("post_id".into()));
/// assert!(parse_pattern("/").is_empty());
/// ```
pub fn parse_pattern(pattern: &str) -> Vec<PatternSegment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(classify_segment)
        .collect()
}

/// Matching priority for a full pattern (lower = tried first)
///
/// Static routes beat dynamic ones, and wildcards come last, so `/posts/new`
/// wins over `/posts/:post_id` regardless of declaration order.
pub fn calculate_priority(segments: &[PatternSegment]) -> usize {
    let dynamic_count = segments
        .iter()
        .filter(|s| matches!(s, PatternSegment::Dynamic(_)))
        .count();
    let has_wildcard = segments
        .iter()
        .any(|s| matches!(s, PatternSegment::Wildcard(_)));

    if has_wildcard {
        1000 + segments.len()
    } else if dynamic_count > 0 {
        dynamic_count * 10 + segments.len()
    } else {
        0
    }
}

/// Matches URL segments against pattern segments, returning captured params
///
/// Walks both slices in lockstep; parameter values are percent-decoded.
///
/// # Examples
///
/// ```
/// use trellis_router::pattern::{match_segments, parse_pattern};
///
/// let pattern = parse_pattern("/post/:post_id/comments");
/// let params = match_segments(&pattern, &["post", "12", "comments"]).unwrap();
/// assert_eq!(params.get("post_id").map(String::as_str), Some("12"));
/// assert!(match_segments(&pattern, &["post", "12"]).is_none());
/// ```
pub fn match_segments(pattern: &[PatternSegment], path: &[&str]) -> Option<Params> {
    fn step(pattern: &[PatternSegment], path: &[&str], mut params: Params) -> Option<Params> {
        let Some((head, rest)) = pattern.split_first() else {
            return path.is_empty().then_some(params);
        };

        match head {
            PatternSegment::Wildcard(name) => {
                if path.is_empty() {
                    return None;
                }
                let captured: Vec<String> = path.iter().map(|s| crate::path::decode(s)).collect();
                params.insert(name.clone(), captured.join("/"));
                rest.is_empty().then_some(params)
            }
            PatternSegment::Dynamic(name) => {
                let (value, remaining) = path.split_first()?;
                params.insert(name.clone(), crate::path::decode(value));
                step(rest, remaining, params)
            }
            PatternSegment::Static(text) => {
                let (value, remaining) = path.split_first()?;
                if value != text {
                    return None;
                }
                step(rest, remaining, params)
            }
        }
    }

    step(pattern, path, BTreeMap::new())
}

/// Builds a URL from pattern segments, substituting params
///
/// Returns the names of missing params as the error so callers can report
/// every missing segment at once.
///
/// # Examples
///
/// ```
/// use trellis_router::pattern::{generate_url, parse_pattern};
/// use std::collections::BTreeMap;
///
/// let mut params = BTreeMap::new();
/// params.insert("post_id".to_string(), "12".to_string());
///
/// let url = generate_url(&parse_pattern("/post/:post_id"), &params).unwrap();
/// assert_eq!(url, "/post/12");
/// ```
pub fn generate_url(pattern: &[PatternSegment], params: &Params) -> Result<String, Vec<String>> {
    let mut missing = Vec::new();
    let segments: Vec<String> = pattern
        .iter()
        .map(|segment| match segment {
            PatternSegment::Static(text) => text.clone(),
            PatternSegment::Dynamic(name) => match params.get(name) {
                Some(value) => urlencoding::encode(value).into_owned(),
                None => {
                    missing.push(name.clone());
                    String::new()
                }
            },
            PatternSegment::Wildcard(name) => match params.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.push(name.clone());
                    String::new()
                }
            },
        })
        .collect();

    if !missing.is_empty() {
        return Err(missing);
    }

    if segments.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", segments.join("/")))
    }
}
