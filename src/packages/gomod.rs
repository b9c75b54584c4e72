//! `go.mod` discovery.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::Module;

pub const GO_MOD: &str = "go.mod";

static MODULE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?\s*(?://.*)?$"#).unwrap());
static GO_DIRECTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*go\s+(\S+)").unwrap());

/// Find the module enclosing `dir`: the nearest `go.mod` in `dir` or one of
/// its ancestors. Only the first module found is used.
pub fn find_module(dir: &Path) -> Option<Module> {
    for candidate in dir.ancestors() {
        let go_mod = candidate.join(GO_MOD);
        if !go_mod.is_file() {
            continue;
        }

        let content = match std::fs::read_to_string(&go_mod) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", go_mod.display(), e);
                return None;
            }
        };

        let module = parse_go_mod(&content, candidate);
        if module.is_none() {
            tracing::warn!("No module directive in {}", go_mod.display());
        }
        return module;
    }
    None
}

/// Read the `module` and `go` directives of a `go.mod` file.
pub fn parse_go_mod(content: &str, dir: &Path) -> Option<Module> {
    let path = MODULE_DIRECTIVE.captures(content)?.get(1)?.as_str().to_string();
    let go_version = GO_DIRECTIVE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Some(Module {
        path,
        dir: dir.to_path_buf(),
        go_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_go_mod() {
        let content = "module example.com/app\n\ngo 1.24\n\nrequire golang.org/x/tools v0.30.0\n";
        let module = parse_go_mod(content, Path::new("/src")).unwrap();

        assert_eq!(module.path, "example.com/app");
        assert_eq!(module.go_version.as_deref(), Some("1.24"));
        assert_eq!(module.dir, Path::new("/src"));
    }

    #[test]
    fn test_parse_go_mod_quoted_with_comment() {
        let content = "// leading comment\nmodule \"testmod\" // trailing\n";
        let module = parse_go_mod(content, Path::new("/src")).unwrap();

        assert_eq!(module.path, "testmod");
        assert!(module.go_version.is_none());
    }

    #[test]
    fn test_parse_go_mod_without_module_directive() {
        assert!(parse_go_mod("go 1.22\n", Path::new("/src")).is_none());
    }

    #[test]
    fn test_find_module_in_ancestor() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(GO_MOD), "module testmod\n\ngo 1.24\n").unwrap();
        let nested = temp_dir.path().join("internal/util");
        fs::create_dir_all(&nested).unwrap();

        let module = find_module(&nested).unwrap();

        assert_eq!(module.path, "testmod");
        assert_eq!(module.dir, temp_dir.path());
    }

    #[test]
    fn test_find_module_prefers_nearest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(GO_MOD), "module outer\n").unwrap();
        let inner = temp_dir.path().join("inner");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join(GO_MOD), "module inner\n").unwrap();

        assert_eq!(find_module(&inner).unwrap().path, "inner");
    }
}
