//! Rewrites resource identifiers inside call arguments and results.

use serde_json::{Map, Value};

use crate::uri::{Direction, UriParts, UriTransformer, URI_MARKER};

/// Keys whose string values are resource identifiers.
pub fn is_uri_key(key: &str) -> bool {
    key == "uri" || key.ends_with("Uri")
}

/// Walk `value` and translate every identifier it carries.
pub fn rewrite_uris(value: &mut Value, transformer: &UriTransformer, direction: Direction) {
    match value {
        Value::Array(items) => {
            for item in items {
                rewrite_uris(item, transformer, direction);
            }
        }
        Value::Object(map) => rewrite_object(map, transformer, direction),
        _ => {}
    }
}

fn rewrite_object(map: &mut Map<String, Value>, transformer: &UriTransformer, direction: Direction) {
    if is_components(map) {
        rewrite_components(map, transformer, direction);
        return;
    }
    for (key, value) in map.iter_mut() {
        if !is_uri_key(key) {
            rewrite_uris(value, transformer, direction);
            continue;
        }
        match value {
            Value::String(text) => *text = transformer.transform_text(direction, text),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(text) => *text = transformer.transform_text(direction, text),
                        other => rewrite_uris(other, transformer, direction),
                    }
                }
            }
            other => rewrite_uris(other, transformer, direction),
        }
    }
}

fn is_components(map: &Map<String, Value>) -> bool {
    map.get("$mid").and_then(Value::as_u64) == Some(u64::from(URI_MARKER))
}

fn rewrite_components(map: &mut Map<String, Value>, transformer: &UriTransformer, direction: Direction) {
    let field = |name: &str| {
        map.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let non_empty = |s: String| (!s.is_empty()).then_some(s);

    let parts = UriParts {
        scheme: field("scheme"),
        authority: non_empty(field("authority")),
        path: field("path"),
        query: non_empty(field("query")),
        fragment: non_empty(field("fragment")),
    };
    let out = transformer.transform(direction, &parts);
    map.insert("scheme".into(), Value::String(out.scheme));
    map.insert(
        "authority".into(),
        Value::String(out.authority.unwrap_or_default()),
    );
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_uri_keys() {
        for key in ["uri", "documentUri", "targetUri", "sourceUri", "configurationUri"] {
            assert!(is_uri_key(key), "{key}");
        }
        for key in ["url", "name", "uris", "uriScheme"] {
            assert!(!is_uri_key(key), "{key}");
        }
    }

    #[test]
    fn test_rewrites_keys_arrays_and_components() {
        let t = UriTransformer::new("devbox");
        let mut value = json!([
            "file:///not/under/a/key",
            {
                "uri": "file:///a.rs",
                "name": "file:///kept.rs",
                "nested": { "targetUri": "vscode-local:/b.rs" },
                "resourceUri": ["file:///c.rs", "untitled:Untitled-1"],
                "folder": {
                    "$mid": 1,
                    "scheme": "file",
                    "authority": "",
                    "path": "/d",
                    "query": "",
                    "fragment": ""
                }
            }
        ]);
        rewrite_uris(&mut value, &t, Direction::Outgoing);

        assert_eq!(value[0], "file:///not/under/a/key");
        let obj = &value[1];
        assert_eq!(obj["uri"], "vscode-remote://devbox/a.rs");
        assert_eq!(obj["name"], "file:///kept.rs");
        assert_eq!(obj["nested"]["targetUri"], "file:/b.rs");
        assert_eq!(
            obj["resourceUri"],
            json!(["vscode-remote://devbox/c.rs", "untitled:Untitled-1"])
        );
        assert_eq!(obj["folder"]["scheme"], "vscode-remote");
        assert_eq!(obj["folder"]["authority"], "devbox");
        assert_eq!(obj["folder"]["path"], "/d");
    }

    #[test]
    fn test_incoming_components_drop_authority() {
        let t = UriTransformer::new("devbox");
        let mut value = json!({
            "$mid": 1,
            "scheme": "vscode-remote",
            "authority": "devbox",
            "path": "/src/main.rs"
        });
        rewrite_uris(&mut value, &t, Direction::Incoming);
        assert_eq!(value["scheme"], "file");
        assert_eq!(value["authority"], "");
        assert_eq!(value["path"], "/src/main.rs");
    }
}
