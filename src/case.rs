//! Name conversions used to derive route names and URL paths from resource types.

/// Convert a CamelCase identifier to snake_case.
///
/// "ThingResource" -> "thing_resource", "HTTPServer" -> "http_server",
/// "fooBar" -> "foo_bar". Existing underscores are kept as they are.
pub fn camel_to_underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let prev_is_word = prev.is_alphanumeric();
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // "HTTPServer": break before the capital that starts a word.
            // "fooBar": break between lower and upper.
            if prev_is_word && (next_is_lower || prev.is_lowercase() || prev.is_ascii_digit()) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Route name for a Rust type path: `<module>.<type in snake case without _resource>`.
///
/// `my_app::api::things::ThingContainerResource` -> `things.thing_container`.
/// Generic arguments are ignored; a type at the crate root uses the crate name as module.
pub fn type_route_name(type_path: &str) -> String {
    let base = type_path.split('<').next().unwrap_or(type_path);
    let mut segments = base.rsplit("::");
    let type_name = segments.next().unwrap_or(base);
    let module = segments.next().unwrap_or("root");
    let mut snake = camel_to_underscore(type_name);
    if let Some(stripped) = snake.strip_suffix("_resource") {
        if !stripped.is_empty() {
            snake = stripped.to_string();
        }
    }
    format!("{}.{}", module, snake)
}

/// URL path for a route name: dots become slashes, underscores become dashes.
///
/// "things.thing_container" -> "/things/thing-container".
pub fn path_from_name(name: &str) -> String {
    let path = name.replace('.', "/").replace('_', "-");
    format!("/{}", path.trim_matches('/'))
}

/// Join URL path pieces with exactly one slash between them (posix join semantics
/// without absolute-path resets).
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{}/{}", prefix, path)
    }
}
