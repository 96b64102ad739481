// src/path.rs
//
// Path grammar: segment parsing and the validation rules a registered
// route template must satisfy before it is handed to the trie.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    MustStartWithSlash,
    TrailingSlash,
    EmptySegment,
    EmptyParamName,
    EmptyWildcardName,
    BadRegex { pattern: String, reason: String },
    SegmentsAfterWildcard,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::MustStartWithSlash => write!(f, "path must begin with '/'"),
            PathError::TrailingSlash => write!(f, "path may not end with '/' (except the root)"),
            PathError::EmptySegment => write!(f, "path contains an empty segment"),
            PathError::EmptyParamName => write!(f, "parameter segment has an empty name"),
            PathError::EmptyWildcardName => write!(f, "wildcard segment has an empty name"),
            PathError::BadRegex { pattern, reason } => {
                write!(f, "regex segment pattern '{pattern}' failed to compile: {reason}")
            }
            PathError::SegmentsAfterWildcard => {
                write!(f, "no segments may follow a wildcard segment")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A single parsed path segment, tag-discriminated per the four segment
/// kinds the router understands.
#[derive(Debug, Clone)]
pub enum Segment {
    Static(String),
    Param(String),
    Regex { name: String, pattern: Regex, source: String },
    /// `None` for the unnamed `*` wildcard, which matches but does not
    /// capture its span (spec choice: no capture when unnamed).
    Wildcard(Option<String>),
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Static(a), Segment::Static(b)) => a == b,
            (Segment::Param(a), Segment::Param(b)) => a == b,
            (Segment::Regex { source: a, .. }, Segment::Regex { source: b, .. }) => a == b,
            (Segment::Wildcard(a), Segment::Wildcard(b)) => a == b,
            _ => false,
        }
    }
}

/// Parse and validate a registration path template (e.g. `/users/:id`,
/// `/users/{id:[0-9]+}`, `/files/*path`) into an ordered list of segments.
///
/// The lone root path `"/"` parses to an empty segment list.
pub fn parse_template(path: &str) -> Result<Vec<Segment>, PathError> {
    if !path.starts_with('/') {
        return Err(PathError::MustStartWithSlash);
    }
    if path.len() > 1 && path.ends_with('/') {
        return Err(PathError::TrailingSlash);
    }
    if path == "/" {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut saw_wildcard = false;

    for raw in path[1..].split('/') {
        if raw.is_empty() {
            return Err(PathError::EmptySegment);
        }
        if saw_wildcard {
            return Err(PathError::SegmentsAfterWildcard);
        }

        let segment = if let Some(name) = raw.strip_prefix(':') {
            if name.is_empty() {
                return Err(PathError::EmptyParamName);
            }
            Segment::Param(name.to_string())
        } else if raw.starts_with('{') && raw.ends_with('}') && raw.contains(':') {
            let inner = &raw[1..raw.len() - 1];
            let colon = inner.find(':').expect("checked above");
            let name = &inner[..colon];
            let pattern_src = &inner[colon + 1..];
            if name.is_empty() {
                return Err(PathError::EmptyParamName);
            }
            let anchored = format!("^(?:{pattern_src})$");
            let compiled = Regex::new(&anchored).map_err(|e| PathError::BadRegex {
                pattern: pattern_src.to_string(),
                reason: e.to_string(),
            })?;
            Segment::Regex {
                name: name.to_string(),
                pattern: compiled,
                source: pattern_src.to_string(),
            }
        } else if let Some(name) = raw.strip_prefix('*') {
            saw_wildcard = true;
            if name.is_empty() {
                Segment::Wildcard(None)
            } else {
                Segment::Wildcard(Some(name.to_string()))
            }
        } else {
            Segment::Static(raw.to_string())
        };

        segments.push(segment);
    }

    Ok(segments)
}

/// Split an incoming request path into segments for matching. Leading and
/// trailing slashes are trimmed; empty segments from repeated `/` are kept
/// out by `split` + filter, matching the registration-side rule.
pub fn split_request_path(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_parses_empty() {
        assert_eq!(parse_template("/").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert_eq!(parse_template("users"), Err(PathError::MustStartWithSlash));
    }

    #[test]
    fn rejects_trailing_slash() {
        assert_eq!(parse_template("/users/"), Err(PathError::TrailingSlash));
    }

    #[test]
    fn rejects_empty_segment() {
        assert_eq!(parse_template("/users//123"), Err(PathError::EmptySegment));
    }

    #[test]
    fn parses_static_and_param() {
        let segs = parse_template("/users/:id").unwrap();
        assert_eq!(segs, vec![Segment::Static("users".into()), Segment::Param("id".into())]);
    }

    #[test]
    fn parses_regex_segment() {
        let segs = parse_template("/users/{id:[0-9]+}").unwrap();
        match &segs[1] {
            Segment::Regex { name, source, .. } => {
                assert_eq!(name, "id");
                assert_eq!(source, "[0-9]+");
            }
            _ => panic!("expected regex segment"),
        }
    }

    #[test]
    fn rejects_bad_regex() {
        let err = parse_template("/users/{id:(}").unwrap_err();
        assert!(matches!(err, PathError::BadRegex { .. }));
    }

    #[test]
    fn parses_named_and_unnamed_wildcard() {
        let segs = parse_template("/files/*path").unwrap();
        assert_eq!(segs, vec![Segment::Static("files".into()), Segment::Wildcard(Some("path".into()))]);

        let segs = parse_template("/files/*").unwrap();
        assert_eq!(segs, vec![Segment::Static("files".into()), Segment::Wildcard(None)]);
    }

    #[test]
    fn rejects_segments_after_wildcard() {
        assert_eq!(
            parse_template("/files/*path/extra"),
            Err(PathError::SegmentsAfterWildcard)
        );
    }

    #[test]
    fn split_request_path_trims_and_filters() {
        assert_eq!(split_request_path("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(split_request_path("/"), Vec::<&str>::new());
        assert_eq!(split_request_path("/a//b/"), vec!["a", "b"]);
    }
}
