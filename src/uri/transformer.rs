use super::{UriComponents, UriParts};

/// Scheme the host uses for its own filesystem.
pub const NATIVE_SCHEME: &str = "file";
/// Scheme the extension host uses for host files.
pub const REMOTE_SCHEME: &str = "vscode-remote";
/// Scheme marking a native identifier that already crossed the boundary.
pub const SHADOW_LOCAL_SCHEME: &str = "vscode-local";

/// Which way an identifier is travelling, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Extension host to host.
    Incoming,
    /// Host to extension host.
    Outgoing,
}

/// Rewrites identifiers between the host and extension host namespaces.
///
/// Schemes other than the native, remote and shadow-local ones pass through
/// untouched in both directions.
#[derive(Debug, Clone)]
pub struct UriTransformer {
    remote_authority: String,
}

impl UriTransformer {
    pub fn new(remote_authority: impl Into<String>) -> Self {
        Self {
            remote_authority: remote_authority.into(),
        }
    }

    pub fn remote_authority(&self) -> &str {
        &self.remote_authority
    }

    pub fn transform_incoming(&self, parts: &UriParts) -> UriParts {
        match parts.scheme.as_str() {
            REMOTE_SCHEME => UriParts {
                scheme: NATIVE_SCHEME.to_string(),
                authority: parts.authority.as_ref().map(|_| String::new()),
                ..parts.clone()
            },
            NATIVE_SCHEME => UriParts {
                scheme: SHADOW_LOCAL_SCHEME.to_string(),
                ..parts.clone()
            },
            _ => parts.clone(),
        }
    }

    pub fn transform_outgoing(&self, parts: &UriParts) -> UriParts {
        match parts.scheme.as_str() {
            // A rootless path cannot follow an authority.
            NATIVE_SCHEME if parts.path.is_empty() || parts.path.starts_with('/') => UriParts {
                scheme: REMOTE_SCHEME.to_string(),
                authority: Some(self.remote_authority.clone()),
                ..parts.clone()
            },
            NATIVE_SCHEME => UriParts {
                scheme: REMOTE_SCHEME.to_string(),
                ..parts.clone()
            },
            SHADOW_LOCAL_SCHEME => UriParts {
                scheme: NATIVE_SCHEME.to_string(),
                ..parts.clone()
            },
            _ => parts.clone(),
        }
    }

    /// Scheme-only fast path, agreeing with [`Self::transform_outgoing`].
    pub fn transform_outgoing_scheme<'a>(&self, scheme: &'a str) -> &'a str {
        match scheme {
            NATIVE_SCHEME => REMOTE_SCHEME,
            SHADOW_LOCAL_SCHEME => NATIVE_SCHEME,
            other => other,
        }
    }

    /// Scheme-only fast path, agreeing with [`Self::transform_incoming`].
    pub fn transform_incoming_scheme<'a>(&self, scheme: &'a str) -> &'a str {
        match scheme {
            REMOTE_SCHEME => NATIVE_SCHEME,
            NATIVE_SCHEME => SHADOW_LOCAL_SCHEME,
            other => other,
        }
    }

    pub fn transform(&self, direction: Direction, parts: &UriParts) -> UriParts {
        match direction {
            Direction::Incoming => self.transform_incoming(parts),
            Direction::Outgoing => self.transform_outgoing(parts),
        }
    }

    pub fn transform_scheme<'a>(&self, direction: Direction, scheme: &'a str) -> &'a str {
        match direction {
            Direction::Incoming => self.transform_incoming_scheme(scheme),
            Direction::Outgoing => self.transform_outgoing_scheme(scheme),
        }
    }

    /// Translate an identifier given as text. Always returns a string.
    ///
    /// Text that does not parse gets its scheme prefix (everything before the
    /// first `:`) rewritten textually, or comes back unchanged when there is
    /// no such prefix.
    pub fn transform_text(&self, direction: Direction, text: &str) -> String {
        match UriParts::parse(text) {
            Ok(parts) => self.transform(direction, &parts).to_string(),
            Err(e) => {
                tracing::debug!("Falling back to scheme rewrite: {e}");
                self.rewrite_scheme_prefix(direction, text)
            }
        }
    }

    pub fn transform_components(
        &self,
        direction: Direction,
        components: &UriComponents,
    ) -> UriComponents {
        let parts = UriParts::from(components.clone());
        UriComponents::from(&self.transform(direction, &parts))
    }

    fn rewrite_scheme_prefix(&self, direction: Direction, text: &str) -> String {
        let Some((prefix, rest)) = text.split_once(':') else {
            return text.to_string();
        };
        if prefix.is_empty() {
            return text.to_string();
        }
        let scheme = self.transform_scheme(direction, prefix);
        if scheme == prefix {
            text.to_string()
        } else {
            format!("{scheme}:{rest}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> UriTransformer {
        UriTransformer::new("ssh-remote+devbox")
    }

    fn samples(scheme: &str) -> Vec<UriParts> {
        vec![
            UriParts::new(scheme, "/home/user/a.rs").with_authority(""),
            UriParts::new(scheme, "/with query")
                .with_authority("")
                .with_query("x=1")
                .with_fragment("frag"),
            UriParts::new(scheme, "/no/authority"),
            UriParts::new(scheme, "").with_fragment("only-fragment"),
        ]
    }

    #[test]
    fn test_outgoing_maps_native_to_remote() {
        let t = transformer();
        let out = t.transform_outgoing(&UriParts::parse("file:///src/lib.rs").unwrap());
        assert_eq!(out.to_string(), "vscode-remote://ssh-remote+devbox/src/lib.rs");
    }

    #[test]
    fn test_incoming_maps_remote_to_native_and_native_to_shadow() {
        let t = transformer();
        let remote = UriParts::parse("vscode-remote://ssh-remote+devbox/src/lib.rs").unwrap();
        assert_eq!(t.transform_incoming(&remote).to_string(), "file:///src/lib.rs");

        let native = UriParts::parse("file:///src/lib.rs").unwrap();
        assert_eq!(
            t.transform_incoming(&native).to_string(),
            "vscode-local:///src/lib.rs"
        );
    }

    #[test]
    fn test_round_trip_for_recognized_schemes() {
        let t = transformer();
        for scheme in [NATIVE_SCHEME, SHADOW_LOCAL_SCHEME] {
            for original in samples(scheme) {
                let back = t.transform_incoming(&t.transform_outgoing(&original));
                assert_eq!(back.scheme, original.scheme);
                assert_eq!(back.path, original.path);
                assert_eq!(back.query, original.query);
                assert_eq!(back.fragment, original.fragment);
            }
        }
    }

    #[test]
    fn test_text_round_trip_keeps_rootless_paths() {
        let t = transformer();
        for text in [
            "file:///src/lib.rs",
            "file:notes.txt",
            "file:relative/dir/a.rs?x=1#top",
            "vscode-local:/a/b",
        ] {
            let out = t.transform_text(Direction::Outgoing, text);
            assert_eq!(t.transform_text(Direction::Incoming, &out), text, "via {out}");
        }
        assert_eq!(
            t.transform_text(Direction::Outgoing, "file:notes.txt"),
            "vscode-remote:notes.txt"
        );
    }

    #[test]
    fn test_unrecognized_schemes_pass_through() {
        let t = transformer();
        for scheme in ["untitled", "git", "https", "vscode-userdata"] {
            for original in samples(scheme) {
                assert_eq!(t.transform_incoming(&original), original);
                assert_eq!(t.transform_outgoing(&original), original);
            }
            assert_eq!(t.transform_outgoing_scheme(scheme), scheme);
            assert_eq!(t.transform_incoming_scheme(scheme), scheme);
        }
        let text = "untitled:Untitled-1";
        assert_eq!(t.transform_text(Direction::Outgoing, text), text);
        assert_eq!(t.transform_text(Direction::Incoming, text), text);
    }

    #[test]
    fn test_scheme_fast_path_agrees_with_full_transform() {
        let t = transformer();
        for scheme in [NATIVE_SCHEME, SHADOW_LOCAL_SCHEME, REMOTE_SCHEME, "other"] {
            let parts = UriParts::new(scheme, "/p");
            assert_eq!(
                t.transform_outgoing_scheme(scheme),
                t.transform_outgoing(&parts).scheme
            );
            assert_eq!(
                t.transform_incoming_scheme(scheme),
                t.transform_incoming(&parts).scheme
            );
        }
    }

    #[test]
    fn test_malformed_text_is_total() {
        let t = transformer();
        for text in ["", "no colon", ":", "::", "file", "   ", "%%%:x", "\u{0}:\u{1}"] {
            for direction in [Direction::Incoming, Direction::Outgoing] {
                // Must not panic, and unrecognized garbage comes back as-is.
                assert_eq!(t.transform_text(direction, text), text);
            }
        }
    }

    #[test]
    fn test_malformed_text_with_known_scheme_rewrites_prefix() {
        let t = transformer();
        assert_eq!(
            t.transform_text(Direction::Outgoing, "file:///has space.txt"),
            "vscode-remote:///has space.txt"
        );
        assert_eq!(
            t.transform_text(Direction::Incoming, "vscode-remote:/bad%zz"),
            "file:/bad%zz"
        );
        assert_eq!(
            t.transform_text(Direction::Outgoing, "vscode-local:/a b"),
            "file:/a b"
        );
    }

    #[test]
    fn test_components_keep_path_query_fragment() {
        let t = transformer();
        let components = UriComponents::from(
            &UriParts::new(NATIVE_SCHEME, "/x").with_authority("").with_query("q"),
        );
        let out = t.transform_components(Direction::Outgoing, &components);
        assert_eq!(out.scheme, REMOTE_SCHEME);
        assert_eq!(out.authority, "ssh-remote+devbox");
        assert_eq!(out.path, "/x");
        assert_eq!(out.query, "q");
    }
}
