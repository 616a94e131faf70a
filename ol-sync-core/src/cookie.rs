//! Minimal cookie jar fed from `Set-Cookie` response headers.
//!
//! Only `name=value` pairs are kept; attributes such as `Path` or `HttpOnly`
//! are discarded. The jar exists to replay the session cookie on later
//! requests and to persist it between command invocations.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Cookie store keyed by cookie name. Later values replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses raw `Set-Cookie` header values.
    ///
    /// Entries without `=`, or with an empty name, are ignored.
    pub fn add_from_set_cookie<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for header in headers {
            let first = header.as_ref().split(';').next().unwrap_or_default();
            let Some((name, value)) = first.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.cookies.insert(name.to_string(), value.trim().to_string());
        }
    }

    /// Absorbs every `Set-Cookie` header of a response.
    pub fn add_from_headers(&mut self, headers: &HeaderMap) {
        let values = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        self.add_from_set_cookie(values);
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for a `Cookie` request header; empty when the jar is empty.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Serializable form used by the session store.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.cookies.clone()
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let mut jar = Self::new();
        for (name, value) in map {
            jar.set(name, value);
        }
        jar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_stores_first_segment_of_set_cookie() {
        let mut jar = CookieJar::new();
        jar.add_from_set_cookie([
            "overleaf.sid=s%3Aabc123; Path=/; HttpOnly; SameSite=Lax",
            "other=value; Path=/",
        ]);

        let header = jar.header_value();
        assert!(header.contains("overleaf.sid=s%3Aabc123"));
        assert!(header.contains("other=value"));
        assert!(!header.contains("HttpOnly"));
        assert!(!header.contains("Path"));
    }

    #[test]
    fn test_ignores_malformed_entries() {
        let mut jar = CookieJar::new();
        jar.add_from_set_cookie(["", "noequals", "=novalue", " spaced = value ; Path=/"]);

        assert_eq!(jar.header_value(), "spaced=value");
        assert_eq!(jar.get("spaced"), Some("value"));
    }

    #[test]
    fn test_last_write_wins_per_name() {
        let mut jar = CookieJar::new();
        jar.add_from_set_cookie(["sid=one", "sid=two; Path=/"]);
        assert_eq!(jar.header_value(), "sid=two");
    }

    #[test]
    fn test_value_may_contain_equals() {
        let mut jar = CookieJar::new();
        jar.add_from_set_cookie(["token=a=b=c; Secure"]);
        assert_eq!(jar.get("token"), Some("a=b=c"));
    }

    #[test]
    fn test_empty_jar_header_is_empty_string() {
        assert_eq!(CookieJar::new().header_value(), "");
    }

    #[test]
    fn test_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "1".to_string());
        map.insert("b".to_string(), "2".to_string());

        let jar = CookieJar::from_map(map.clone());
        assert_eq!(jar.to_map(), map);
        assert_eq!(CookieJar::from_map(jar.to_map()).to_map(), jar.to_map());
        assert_eq!(jar.header_value(), "a=1; b=2");
    }

    #[test]
    fn test_add_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=xyz; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("gclb=1; Path=/"));

        let mut jar = CookieJar::new();
        jar.add_from_headers(&headers);
        assert_eq!(jar.get("sid"), Some("xyz"));
        assert_eq!(jar.get("gclb"), Some("1"));
    }
}
