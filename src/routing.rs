//! Route patterns with `{name}` placeholders, matched against request paths and used to build URLs.
//!
//! Placeholders match one path segment (`[^/]+`) unless they carry their own regex,
//! e.g. `{id:\d+}`. A pattern like `/things/{id}.json` matches `/things/4.json` with `id = "4"`.
//! Captured values are percent-decoded; generated values are percent-encoded.

use crate::error::{ConfigError, RestError};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Everything but RFC 3986 unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
pub struct RoutePattern {
    pattern: String,
    regex: Regex,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{}", pattern)
        };
        let invalid = |why: &str| ConfigError::InvalidPattern(format!("{}: {}", pattern, why));

        let mut segments = Vec::new();
        let mut re = String::from("^");
        let mut rest = pattern.as_str();
        while let Some(start) = rest.find('{') {
            let literal = &rest[..start];
            if literal.contains('}') {
                return Err(invalid("unbalanced '}'"));
            }
            if !literal.is_empty() {
                re.push_str(&regex::escape(literal));
                segments.push(Segment::Literal(literal.to_string()));
            }
            let after = &rest[start + 1..];
            let end = closing_brace(after).ok_or_else(|| invalid("unclosed '{'"))?;
            let spec = &after[..end];
            let (name, custom) = match spec.split_once(':') {
                Some((name, custom)) => (name.trim(), Some(custom)),
                None => (spec.trim(), None),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid("placeholder names are identifiers"));
            }
            if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                return Err(invalid("duplicate placeholder"));
            }
            re.push_str(&format!("(?P<{}>{})", name, custom.unwrap_or("[^/]+")));
            segments.push(Segment::Param(name.to_string()));
            rest = &after[end + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unbalanced '}'"));
        }
        if !rest.is_empty() {
            re.push_str(&regex::escape(rest));
            segments.push(Segment::Literal(rest.to_string()));
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| invalid(&e.to_string()))?;
        Ok(RoutePattern {
            pattern,
            regex,
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Placeholder names in pattern order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Captured values when `path` matches; a value that does not decode to UTF-8 is a 400.
    pub fn matches(&self, path: &str) -> Result<Option<BTreeMap<String, String>>, RestError> {
        let Some(caps) = self.regex.captures(path) else {
            return Ok(None);
        };
        let mut matchdict = BTreeMap::new();
        for name in self.params() {
            if let Some(m) = caps.name(name) {
                let value = percent_decode_str(m.as_str()).decode_utf8().map_err(|_| {
                    RestError::BadRequest(format!("Path parameter {} is not valid UTF-8", name))
                })?;
                matchdict.insert(name.to_string(), value.into_owned());
            }
        }
        Ok(Some(matchdict))
    }

    /// Fill the placeholders. Every placeholder must be given.
    pub fn generate(&self, params: &[(&str, &str)]) -> Result<String, RestError> {
        let mut out = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Param(name) => {
                    let value = params
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            RestError::Internal(format!(
                                "missing parameter {} for route pattern {}",
                                name, self.pattern
                            ))
                        })?;
                    out.extend(utf8_percent_encode(value, SEGMENT));
                }
            }
        }
        Ok(out)
    }
}

/// Index of the `}` closing a placeholder, allowing nested braces in custom regexes.
fn closing_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Named route patterns shared with requests for URL generation.
#[derive(Clone, Debug, Default)]
pub struct RouteUrls(Arc<HashMap<String, RoutePattern>>);

impl RouteUrls {
    pub fn new(patterns: HashMap<String, RoutePattern>) -> Self {
        RouteUrls(Arc::new(patterns))
    }

    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RestError> {
        self.0
            .get(name)
            .ok_or_else(|| RestError::Internal(format!("no route named {}", name)))?
            .generate(params)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_placeholders() {
        let p = RoutePattern::parse("/things/{id}").unwrap();
        let m = p.matches("/things/4").unwrap().unwrap();
        assert_eq!(m["id"], "4");
        assert!(p.matches("/things").unwrap().is_none());
        assert!(p.matches("/things/4/more").unwrap().is_none());
    }

    #[test]
    fn extension_suffix() {
        let p = RoutePattern::parse("/things/{id}.json").unwrap();
        assert_eq!(p.matches("/things/4.json").unwrap().unwrap()["id"], "4");
        assert!(p.matches("/things/4").unwrap().is_none());
        // Without the suffix route registered first, the plain route swallows the extension.
        let plain = RoutePattern::parse("/things/{id}").unwrap();
        assert_eq!(plain.matches("/things/4.json").unwrap().unwrap()["id"], "4.json");
    }

    #[test]
    fn custom_regex_and_composite_keys() {
        let p = RoutePattern::parse("orders/{order_id:\\d+}/lines/{line}").unwrap();
        assert_eq!(p.as_str(), "/orders/{order_id:\\d+}/lines/{line}");
        let m = p.matches("/orders/7/lines/a").unwrap().unwrap();
        assert_eq!(m["order_id"], "7");
        assert_eq!(m["line"], "a");
        assert!(p.matches("/orders/x/lines/a").unwrap().is_none());
        assert_eq!(p.params().collect::<Vec<_>>(), vec!["order_id", "line"]);
    }

    #[test]
    fn generates_urls() {
        let p = RoutePattern::parse("/things/{id}.json").unwrap();
        assert_eq!(p.generate(&[("id", "4")]).unwrap(), "/things/4.json");
        assert!(p.generate(&[]).is_err());
    }

    #[test]
    fn decodes_and_encodes_values() {
        let p = RoutePattern::parse("/tags/{name}").unwrap();
        assert_eq!(p.matches("/tags/hello%20world").unwrap().unwrap()["name"], "hello world");
        assert_eq!(p.matches("/tags/caf%C3%A9").unwrap().unwrap()["name"], "café");
        assert_eq!(p.matches("/tags/a%2Fb").unwrap().unwrap()["name"], "a/b");
        assert!(p.matches("/tags/%FF").is_err());

        assert_eq!(p.generate(&[("name", "hello world")]).unwrap(), "/tags/hello%20world");
        assert_eq!(p.generate(&[("name", "café")]).unwrap(), "/tags/caf%C3%A9");
        assert_eq!(p.generate(&[("name", "a/b")]).unwrap(), "/tags/a%2Fb");
        assert_eq!(p.generate(&[("name", "v1.2_x-y~")]).unwrap(), "/tags/v1.2_x-y~");
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(RoutePattern::parse("/things/{id").is_err());
        assert!(RoutePattern::parse("/things/id}").is_err());
        assert!(RoutePattern::parse("/things/{}").is_err());
        assert!(RoutePattern::parse("/{a}/{a}").is_err());
    }

    #[test]
    fn named_urls() {
        let mut map = HashMap::new();
        map.insert("thing".to_string(), RoutePattern::parse("/things/{id}").unwrap());
        let urls = RouteUrls::new(map);
        assert_eq!(urls.url("thing", &[("id", "1")]).unwrap(), "/things/1");
        assert!(urls.url("other", &[]).is_err());
    }
}
