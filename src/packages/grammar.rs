use once_cell::sync::OnceCell;
use tree_sitter::Query;

pub struct GoGrammar;

// Static query caches
static GO_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static GO_PACKAGE_QUERY: OnceCell<Query> = OnceCell::new();

impl GoGrammar {
    pub fn name(&self) -> &'static str {
        "go"
    }

    pub fn file_extensions(&self) -> &[&'static str] {
        &["go"]
    }

    pub fn language(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    pub fn imports_query(&self) -> &str {
        r#"
        (import_declaration
            (import_spec
                path: (_) @import_path
            )
        )

        (import_declaration
            (import_spec_list
                (import_spec
                    path: (_) @import_path
                )
            )
        )
        "#
    }

    pub fn package_query(&self) -> &str {
        r#"
        (package_clause
            (package_identifier) @package_name
        )
        "#
    }

    /// Get cached imports query (compiled once)
    pub fn cached_imports_query(&self) -> Option<&'static Query> {
        GO_IMPORTS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.imports_query()))
            .ok()
    }

    /// Get cached package clause query (compiled once)
    pub fn cached_package_query(&self) -> Option<&'static Query> {
        GO_PACKAGE_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.package_query()))
            .ok()
    }

    pub fn is_source_file(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.file_extensions().contains(&ext))
            .unwrap_or(false)
    }
}
