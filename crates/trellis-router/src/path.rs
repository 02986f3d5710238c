//! URL plumbing shared by recognition and generation

use std::borrow::Cow;

use crate::transition::QueryParams;

/// Whether `path` already has the shape route patterns are stored in
fn is_canonical(path: &str) -> bool {
    path == "/"
        || (path.starts_with('/')
            && !path.ends_with('/')
            && !path.contains('\\')
            && !path.contains("//"))
}

/// Brings a URL path to the shape route patterns are stored in
///
/// Recognition compares against `/`-rooted paths with one slash between
/// segments and none at the end. A path that already has that shape comes
/// back borrowed.
///
/// ```
/// use trellis_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(normalize_path("/grandma/mom"), Cow::Borrowed("/grandma/mom")));
/// assert_eq!(normalize_path("/grandma//mom/"), "/grandma/mom");
/// assert_eq!(normalize_path("\\foo\\bar"), "/foo/bar");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split(['/', '\\']).filter(|segment| !segment.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(normalized)
    }
}

/// Joins a parent URL pattern and a child path segment
///
/// The child's leading `/` is optional and a child path of `/` adds nothing,
/// which is how index routes share their parent's URL.
pub fn join_paths(parent: &str, child: &str) -> String {
    let joined = format!("{}/{}", parent, child);
    normalize_path(&joined).into_owned()
}

/// Splits a URL into its path and optional query string, dropping any fragment
///
/// # Examples
///
/// ```
/// use trellis_router::path::split_url;
///
/// assert_eq!(split_url("/posts?sort=asc#top"), ("/posts", Some("sort=asc")));
/// assert_eq!(split_url("/posts"), ("/posts", None));
/// ```
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    let without_fragment = url.split_once('#').map(|(head, _)| head).unwrap_or(url);

    match without_fragment.split_once('?') {
        Some((path, query)) if !query.is_empty() => (path, Some(query)),
        Some((path, _)) => (path, None),
        None => (without_fragment, None),
    }
}

/// Parses a query string into ordered, percent-decoded key/value pairs
///
/// Keys without a value (`?flag`) map to an empty string. Later duplicates win.
///
/// # Examples
///
/// ```
/// use trellis_router::path::parse_query;
///
/// let query = parse_query("sort=asc&name=J%C3%BCrgen&flag");
/// assert_eq!(query.get("sort").map(String::as_str), Some("asc"));
/// assert_eq!(query.get("name").map(String::as_str), Some("Jürgen"));
/// assert_eq!(query.get("flag").map(String::as_str), Some(""));
/// ```
pub fn parse_query(query: &str) -> QueryParams {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

/// Percent-decodes a URL component, treating `+` as a space
///
/// Malformed escapes fall back to the raw text rather than failing recognition.
pub fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_route_urls_are_borrowed() {
        assert!(matches!(normalize_path("/"), Cow::Borrowed("/")));
        assert!(matches!(normalize_path("/post/12"), Cow::Borrowed("/post/12")));
        assert!(matches!(
            normalize_path("/grandma/mom/sally"),
            Cow::Borrowed("/grandma/mom/sally")
        ));
    }

    #[test]
    fn test_sloppy_visits_recognize_like_canonical_ones() {
        assert_eq!(normalize_path("/foo/bar/"), "/foo/bar");
        assert_eq!(normalize_path("foo/bar"), "/foo/bar");
        assert_eq!(normalize_path("//post///12"), "/post/12");
        assert_eq!(normalize_path("\\grandma\\mom"), "/grandma/mom");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/foo"), "/foo");
        assert_eq!(join_paths("/foo", "/"), "/foo");
        assert_eq!(join_paths("/foo", "bar/:id"), "/foo/bar/:id");
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("/a?x=1"), ("/a", Some("x=1")));
        assert_eq!(split_url("/a?"), ("/a", None));
        assert_eq!(split_url("/a#frag"), ("/a", None));
    }

    #[test]
    fn test_parse_query_last_duplicate_wins() {
        let query = parse_query("page=1&page=2&q=hello+world");
        assert_eq!(query.get("page").map(String::as_str), Some("2"));
        assert_eq!(query.get("q").map(String::as_str), Some("hello world"));
    }
}
