use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Value of the `$mid` field marking a serialized [`UriComponents`].
pub const URI_MARKER: u8 = 1;

/// A resource identifier split into its five components.
///
/// Parsing never normalizes, so `parse(text).to_string() == text` for every
/// text that parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriParts {
    pub scheme: String,
    pub authority: Option<String>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl UriParts {
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            authority: None,
            path: path.into(),
            query: None,
            fragment: None,
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Split `text` into components (RFC 3986, appendix B).
    ///
    /// Fails with [`Error::MalformedIdentifier`] when there is no valid scheme,
    /// when the text contains whitespace or control characters, or when a
    /// percent escape is broken.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || Error::MalformedIdentifier(text.to_string());

        check_characters(text).ok_or_else(malformed)?;
        let (scheme, rest) = text.split_once(':').ok_or_else(malformed)?;
        if !is_valid_scheme(scheme) {
            return Err(malformed());
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };
        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(after[..end].to_string()), &after[end..])
            }
            None => (None, rest),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            authority,
            path: path.to_string(),
            query,
            fragment,
        })
    }

    /// Native `file` identifier for an absolute path.
    pub fn from_file_path(path: &Path) -> Option<Self> {
        let url = url::Url::from_file_path(path).ok()?;
        Self::parse(url.as_str()).ok()
    }

    /// Filesystem path of a `file` identifier.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.scheme != super::NATIVE_SCHEME {
            return None;
        }
        url::Url::parse(&self.to_string())
            .ok()?
            .to_file_path()
            .ok()
    }
}

impl fmt::Display for UriParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(authority) = &self.authority {
            write!(f, "//{authority}")?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for UriParts {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn check_characters(text: &str) -> Option<()> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_control() || b.is_ascii_whitespace() => return None,
            b'%' => {
                let escape = bytes.get(i + 1..i + 3)?;
                if !escape.iter().all(u8::is_ascii_hexdigit) {
                    return None;
                }
                i += 3;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Some(())
}

/// Wire form of an identifier: every component present, absent ones empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriComponents {
    #[serde(rename = "$mid", default = "uri_marker")]
    pub mid: u8,
    pub scheme: String,
    #[serde(default)]
    pub authority: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub fragment: String,
}

const fn uri_marker() -> u8 {
    URI_MARKER
}

impl From<&UriParts> for UriComponents {
    fn from(parts: &UriParts) -> Self {
        Self {
            mid: URI_MARKER,
            scheme: parts.scheme.clone(),
            authority: parts.authority.clone().unwrap_or_default(),
            path: parts.path.clone(),
            query: parts.query.clone().unwrap_or_default(),
            fragment: parts.fragment.clone().unwrap_or_default(),
        }
    }
}

impl From<UriComponents> for UriParts {
    fn from(c: UriComponents) -> Self {
        let non_empty = |s: String| (!s.is_empty()).then_some(s);
        Self {
            scheme: c.scheme,
            authority: non_empty(c.authority),
            path: c.path,
            query: non_empty(c.query),
            fragment: non_empty(c.fragment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_components() {
        let parts = UriParts::parse("vscode-remote://ssh-host/src/main.rs?line=3#L3").unwrap();
        assert_eq!(parts.scheme, "vscode-remote");
        assert_eq!(parts.authority.as_deref(), Some("ssh-host"));
        assert_eq!(parts.path, "/src/main.rs");
        assert_eq!(parts.query.as_deref(), Some("line=3"));
        assert_eq!(parts.fragment.as_deref(), Some("L3"));
    }

    #[test]
    fn test_parse_rebuild_is_byte_identical() {
        let samples = [
            "file:///home/user/project/a.txt",
            "file:/no/authority",
            "file://server/share/x",
            "untitled:Untitled-1",
            "git:/repo/file.rs?%7B%22ref%22%3A%22HEAD%22%7D",
            "https://example.com:8080/path?q=1&r=2#frag?with#marks",
            "mailto:someone@example.com",
            "vscode-local:",
            "x://",
            "x:?#",
        ];
        for sample in samples {
            let parts = UriParts::parse(sample).unwrap();
            assert_eq!(parts.to_string(), sample);
        }
    }

    #[test]
    fn test_question_mark_inside_fragment_stays_in_fragment() {
        let parts = UriParts::parse("file:///a#b?c").unwrap();
        assert_eq!(parts.query, None);
        assert_eq!(parts.fragment.as_deref(), Some("b?c"));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for text in [
            "",
            "no-colon-here",
            ":missing-scheme",
            "1abc:/digits-first",
            "has space:/x",
            "file:///a b",
            "file:///bad%zzescape",
            "file:///trailing%2",
            "path/with:colon",
        ] {
            let err = UriParts::parse(text).unwrap_err();
            assert!(
                matches!(err, Error::MalformedIdentifier(_)),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn test_file_path_conversion() {
        let parts = UriParts::from_file_path(Path::new("/tmp/some dir/file.txt")).unwrap();
        assert_eq!(parts.to_string(), "file:///tmp/some%20dir/file.txt");
        assert_eq!(
            parts.to_file_path(),
            Some(PathBuf::from("/tmp/some dir/file.txt"))
        );
        assert!(UriParts::from_file_path(Path::new("relative/path")).is_none());
        assert!(UriParts::new("untitled", "x").to_file_path().is_none());
    }

    #[test]
    fn test_components_conversion() {
        let parts = UriParts::new("file", "/a").with_authority("").with_fragment("f");
        let components = UriComponents::from(&parts);
        assert_eq!(components.mid, URI_MARKER);
        assert_eq!(components.query, "");

        let json = serde_json::to_value(&components).unwrap();
        assert_eq!(json["$mid"], 1);
        assert_eq!(json["fragment"], "f");

        let back = UriParts::from(components);
        assert_eq!(back.authority, None);
        assert_eq!(back.fragment.as_deref(), Some("f"));
    }
}
