//! Conversion between xpath-style expressions and gNMI paths.
//!
//! Accepted syntax: `/interfaces/interface[name=Ethernet1/1]/state`.
//! Elements are separated by `/` outside of key brackets; each element may
//! carry any number of `[key=value]` groups. A backslash escapes the next
//! character, so `]`, `[` and `/` can appear in names and values.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{GnmiError, Result};
use crate::gnmi::{Path, PathElem};

/// Parse an xpath expression into a structured gNMI path.
///
/// `""` and `"/"` yield an empty path. Malformed input returns
/// [`GnmiError::Path`] naming the expression.
pub fn to_gnmi_path(expr: &str) -> Result<Path> {
    let elem = split_elements(expr)?
        .iter()
        .map(|segment| parse_elem(expr, segment))
        .collect::<Result<Vec<_>>>()?;

    Ok(Path {
        elem,
        ..Default::default()
    })
}

/// Parse several expressions, stopping at the first invalid one.
pub fn to_gnmi_paths<S: AsRef<str>>(exprs: &[S]) -> Result<Vec<Path>> {
    exprs.iter().map(|e| to_gnmi_path(e.as_ref())).collect()
}

/// Render a gNMI path back into xpath form, keys sorted by name.
pub fn path_to_xpath(path: &Path) -> String {
    if path.elem.is_empty() {
        return "/".to_string();
    }

    let mut out = String::new();
    for elem in &path.elem {
        out.push('/');
        escape_into(&mut out, &elem.name, &['/', '[', ']', '\\']);

        let mut keys: Vec<(&String, &String)> = elem.key.iter().collect();
        keys.sort();
        for (k, v) in keys {
            out.push('[');
            escape_into(&mut out, k, &['=', ']', '\\']);
            out.push('=');
            escape_into(&mut out, v, &[']', '\\']);
            out.push(']');
        }
    }
    out
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Split on unescaped `/` outside brackets, keeping escapes for the element
/// parser. Bracket balance is checked here.
fn split_elements(expr: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_key = false;
    let mut chars = expr.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| GnmiError::path(expr, "trailing escape character"))?;
                current.push('\\');
                current.push(escaped);
            }
            '[' if in_key => {
                return Err(GnmiError::path(expr, "unescaped '[' inside a key"));
            }
            '[' => {
                in_key = true;
                current.push(c);
            }
            ']' if !in_key => {
                return Err(GnmiError::path(expr, "']' without matching '['"));
            }
            ']' => {
                in_key = false;
                current.push(c);
            }
            '/' if !in_key => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_key {
        return Err(GnmiError::path(expr, "unterminated key, missing ']'"));
    }
    segments.push(current);

    // Leading and trailing separators are optional.
    if segments.first().is_some_and(String::is_empty) {
        segments.remove(0);
    }
    if segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }
    if segments.iter().any(String::is_empty) {
        return Err(GnmiError::path(expr, "empty path element"));
    }

    Ok(segments)
}

fn parse_elem(expr: &str, segment: &str) -> Result<PathElem> {
    let mut chars = segment.chars().peekable();

    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c == '[' {
            break;
        }
        chars.next();
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                name.push(escaped);
            }
        } else {
            name.push(c);
        }
    }
    if name.is_empty() {
        return Err(GnmiError::path(expr, "key without an element name"));
    }

    let mut key = HashMap::new();
    while let Some(c) = chars.next() {
        if c != '[' {
            return Err(GnmiError::path(
                expr,
                format!("unexpected {:?} after key of element {:?}", c, name),
            ));
        }
        let (k, v) = parse_key(expr, &name, &mut chars)?;
        if key.contains_key(&k) {
            return Err(GnmiError::path(
                expr,
                format!("duplicate key {:?} in element {:?}", k, name),
            ));
        }
        key.insert(k, v);
    }

    Ok(PathElem { name, key })
}

/// Read `key=value]`, the opening bracket already consumed.
fn parse_key(expr: &str, name: &str, chars: &mut Peekable<Chars<'_>>) -> Result<(String, String)> {
    let mut k = String::new();
    let mut v = String::new();
    let mut seen_eq = false;

    loop {
        match chars.next() {
            None => return Err(GnmiError::path(expr, "unterminated key, missing ']'")),
            Some(']') => break,
            Some('=') if !seen_eq => seen_eq = true,
            Some(c) => {
                let c = if c == '\\' {
                    chars
                        .next()
                        .ok_or_else(|| GnmiError::path(expr, "trailing escape character"))?
                } else {
                    c
                };
                if seen_eq { v.push(c) } else { k.push(c) }
            }
        }
    }

    if !seen_eq {
        return Err(GnmiError::path(
            expr,
            format!("key {:?} of element {:?} has no value", k, name),
        ));
    }
    if k.is_empty() {
        return Err(GnmiError::path(
            expr,
            format!("empty key name in element {:?}", name),
        ));
    }

    Ok((k, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(path: &Path) -> Vec<&str> {
        path.elem.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_parse_simple() {
        let path = to_gnmi_path("/interfaces/interface/state").unwrap();
        assert_eq!(names(&path), ["interfaces", "interface", "state"]);
        assert!(path.elem.iter().all(|e| e.key.is_empty()));
    }

    #[test]
    fn test_parse_without_leading_slash() {
        let path = to_gnmi_path("system/config/hostname/").unwrap();
        assert_eq!(names(&path), ["system", "config", "hostname"]);
    }

    #[test]
    fn test_parse_with_keys() {
        let path = to_gnmi_path("/interfaces/interface[name=eth0]/state").unwrap();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[1].name, "interface");
        assert_eq!(path.elem[1].key.len(), 1);
        assert_eq!(path.elem[1].key.get("name"), Some(&"eth0".to_string()));
    }

    #[test]
    fn test_parse_multiple_keys() {
        let path =
            to_gnmi_path("/network-instances/network-instance[name=default]/protocols/protocol[identifier=BGP][name=bgp]")
                .unwrap();
        assert_eq!(path.elem.len(), 4);
        let proto = &path.elem[3];
        assert_eq!(proto.key.len(), 2);
        assert_eq!(proto.key["identifier"], "BGP");
        assert_eq!(proto.key["name"], "bgp");
    }

    #[test]
    fn test_slash_and_equals_inside_key_value() {
        let path = to_gnmi_path("/interfaces/interface[name=Ethernet1/1]/subinterfaces").unwrap();
        assert_eq!(names(&path), ["interfaces", "interface", "subinterfaces"]);
        assert_eq!(path.elem[1].key["name"], "Ethernet1/1");

        let path = to_gnmi_path("/acl[filter=a=b]").unwrap();
        assert_eq!(path.elem[0].key["filter"], "a=b");
    }

    #[test]
    fn test_escaped_brackets() {
        let path = to_gnmi_path(r"/a[k=x\]y]/b\/c").unwrap();
        assert_eq!(path.elem[0].key["k"], "x]y");
        assert_eq!(path.elem[1].name, "b/c");
    }

    #[test]
    fn test_empty_expressions() {
        assert!(to_gnmi_path("").unwrap().elem.is_empty());
        assert!(to_gnmi_path("/").unwrap().elem.is_empty());
    }

    #[test]
    fn test_malformed_expressions() {
        let bad = [
            "/interfaces/interface[name=eth0",
            "/interfaces/interface]name=eth0[",
            "/a[b[c=d]]",
            "/a[b]",
            "/a[=c]",
            "/a//b",
            "/a[b=c]x",
            "/a[b=1][b=2]",
            "/[k=v]",
            "/a\\",
        ];
        for expr in bad {
            match to_gnmi_path(expr) {
                Err(GnmiError::Path { expr: e, .. }) => assert_eq!(e, expr),
                other => panic!("expected path error for {expr:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_to_gnmi_paths_reports_first_failure() {
        let err = to_gnmi_paths(&["/a", "/b[", "/c["]).unwrap_err();
        match err {
            GnmiError::Path { expr, .. } => assert_eq!(expr, "/b["),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_path_to_xpath() {
        let mut path = Path::default();
        path.elem.push(PathElem {
            name: "interfaces".to_string(),
            key: HashMap::new(),
        });
        path.elem.push(PathElem {
            name: "interface".to_string(),
            key: [("name".to_string(), "eth0".to_string())]
                .into_iter()
                .collect(),
        });

        assert_eq!(path_to_xpath(&path), "/interfaces/interface[name=eth0]");
        assert_eq!(path_to_xpath(&Path::default()), "/");
    }

    #[test]
    fn test_xpath_round_trip() {
        let exprs = [
            "/interfaces/interface[name=Ethernet1/1]/state/counters",
            "/protocols/protocol[identifier=BGP][name=bgp]/bgp",
            r"/a[k=x\]y]/b\/c",
        ];
        for expr in exprs {
            let path = to_gnmi_path(expr).unwrap();
            let rendered = path_to_xpath(&path);
            assert_eq!(to_gnmi_path(&rendered).unwrap(), path, "{expr}");
        }
    }
}
