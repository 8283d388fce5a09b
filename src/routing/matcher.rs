//! Path template parsing and matching.
//!
//! # Responsibilities
//! - Parse templates like `/v1/items/{id}` into literal and parameter segments
//! - Match a concrete request path and extract parameter values
//! - Expose the specificity of a template for route ordering
//!
//! # Design Decisions
//! - Literal segments compare verbatim (case-sensitive, no decoding)
//! - Parameters match exactly one non-empty segment; values are percent-decoded
//! - No regex, no multi-segment wildcards: matching is a single linear pass

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Error for templates that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template must start with '/'")]
    MissingLeadingSlash,
    #[error("template contains an empty segment")]
    EmptySegment,
    #[error("unbalanced braces in segment `{0}`")]
    UnbalancedBraces(String),
    #[error("invalid parameter name in segment `{0}`")]
    InvalidParam(String),
    #[error("unsupported pattern in segment `{0}` (only `*` is allowed)")]
    UnsupportedPattern(String),
    #[error("parameter `{0}` is bound more than once")]
    DuplicateParam(String),
}

/// One segment of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Binds one path segment to a (possibly dotted) request field.
    Param(String),
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

fn valid_field_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn parse_segment(segment: &str) -> Result<Segment, TemplateError> {
    if segment.is_empty() {
        return Err(TemplateError::EmptySegment);
    }
    let opens = segment.matches('{').count();
    let closes = segment.matches('}').count();
    if opens == 0 && closes == 0 {
        return Ok(Segment::Literal(segment.to_string()));
    }
    if opens != 1 || closes != 1 || !segment.starts_with('{') || !segment.ends_with('}') {
        return Err(TemplateError::UnbalancedBraces(segment.to_string()));
    }

    let inner = &segment[1..segment.len() - 1];
    let name = match inner.split_once('=') {
        Some((name, "*")) => name,
        Some(_) => return Err(TemplateError::UnsupportedPattern(segment.to_string())),
        None => inner,
    };
    if !valid_field_path(name) {
        return Err(TemplateError::InvalidParam(segment.to_string()));
    }
    Ok(Segment::Param(name.to_string()))
}

impl PathTemplate {
    /// Compile a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let rest = raw
            .strip_prefix('/')
            .ok_or(TemplateError::MissingLeadingSlash)?;

        let segments = rest
            .split('/')
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if seen.contains(&name.as_str()) {
                    return Err(TemplateError::DuplicateParam(name.clone()));
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Field paths bound by this template, in order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of literal segments; more literals means more specific.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Segment kinds as a sortable key: literals (0) before params (1).
    pub(crate) fn shape_key(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(_) => 0,
                Segment::Param(_) => 1,
            })
            .collect()
    }

    /// True when both templates match exactly the same set of paths.
    pub fn same_shape(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// Match a request path, returning `(field path, decoded value)` pairs.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = Vec::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if part != literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value: Cow<'_, str> = percent_decode_str(part).decode_utf8().ok()?;
                    params.push((name.clone(), value.into_owned()));
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals_and_params() {
        let t = PathTemplate::parse("/v1/items/{id}").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Literal("v1".into()),
                Segment::Literal("items".into()),
                Segment::Param("id".into()),
            ]
        );
        assert_eq!(t.literal_count(), 2);

        let wildcard = PathTemplate::parse("/v1/{user.name=*}").unwrap();
        assert_eq!(wildcard.params().collect::<Vec<_>>(), vec!["user.name"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PathTemplate::parse("v1/items"), Err(TemplateError::MissingLeadingSlash));
        assert_eq!(PathTemplate::parse("/v1//items"), Err(TemplateError::EmptySegment));
        assert_eq!(PathTemplate::parse("/v1/items/"), Err(TemplateError::EmptySegment));
        assert!(matches!(PathTemplate::parse("/v1/{id"), Err(TemplateError::UnbalancedBraces(_))));
        assert!(matches!(PathTemplate::parse("/v1/x{id}"), Err(TemplateError::UnbalancedBraces(_))));
        assert!(matches!(PathTemplate::parse("/v1/{}"), Err(TemplateError::InvalidParam(_))));
        assert!(matches!(
            PathTemplate::parse("/v1/{id=**}"),
            Err(TemplateError::UnsupportedPattern(_))
        ));
        assert_eq!(
            PathTemplate::parse("/v1/{id}/{id}"),
            Err(TemplateError::DuplicateParam("id".into()))
        );
    }

    #[test]
    fn test_match_extracts_params() {
        let t = PathTemplate::parse("/v1/items/{id}").unwrap();
        assert_eq!(t.matches("/v1/items/42"), Some(vec![("id".into(), "42".into())]));
        assert_eq!(t.matches("/v1/items"), None);
        assert_eq!(t.matches("/v1/items/"), None);
        assert_eq!(t.matches("/v1/items/42/extra"), None);
        assert_eq!(t.matches("/V1/items/42"), None);
    }

    #[test]
    fn test_match_percent_decodes_values() {
        let t = PathTemplate::parse("/v1/greet/{name}").unwrap();
        assert_eq!(
            t.matches("/v1/greet/Ada%20Lovelace"),
            Some(vec![("name".into(), "Ada Lovelace".into())])
        );
        assert_eq!(t.matches("/v1/greet/%FF"), None);
    }

    #[test]
    fn test_same_shape_ignores_param_names() {
        let a = PathTemplate::parse("/v1/items/{id}").unwrap();
        let b = PathTemplate::parse("/v1/items/{name}").unwrap();
        let c = PathTemplate::parse("/v1/items/special").unwrap();
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
