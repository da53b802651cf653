use rustpython_ast::TextSize;
use std::path::Path;

/// Maps byte offsets into a source file to 1-indexed line numbers.
///
/// The parser reports locations as byte offsets; findings and entry points
/// are reported with line numbers.
pub struct LineIndex {
    /// Byte index of the start of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Builds the index by scanning the source for newlines.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a `TextSize` offset to a 1-indexed line number.
    pub fn line_index(&self, offset: TextSize) -> usize {
        let offset = offset.to_usize();
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}

/// Derives the dotted module identifier from a project-relative path.
///
/// `app/views.py` becomes `app.views`; a package initializer collapses to
/// its package, so `pkg/__init__.py` becomes `pkg`. A bare `__init__.py` at
/// the project root keeps its own name.
pub fn module_id_from_path(path: &Path) -> String {
    let mut parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if let Some(last) = parts.last_mut() {
        if let Some(stem) = last.strip_suffix(".py") {
            *last = stem.to_string();
        }
    }

    if parts.len() > 1 && parts.last().map(String::as_str) == Some("__init__") {
        parts.pop();
    }

    parts.join(".")
}

/// True when the path names a package initializer file.
pub fn is_package_init(path: &Path) -> bool {
    path.file_name().map_or(false, |name| name == "__init__.py")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_line_index_maps_offsets() {
        let source = "a = 1\nb = 2\nc = 3\n";
        let index = LineIndex::new(source);

        assert_eq!(index.line_index(TextSize::from(0)), 1);
        assert_eq!(index.line_index(TextSize::from(6)), 2);
        assert_eq!(index.line_index(TextSize::from(13)), 3);
    }

    #[test]
    fn test_module_id_from_nested_path() {
        assert_eq!(module_id_from_path(&PathBuf::from("app/views.py")), "app.views");
        assert_eq!(module_id_from_path(&PathBuf::from("main.py")), "main");
    }

    #[test]
    fn test_module_id_collapses_package_init() {
        assert_eq!(module_id_from_path(&PathBuf::from("app/__init__.py")), "app");
        assert_eq!(
            module_id_from_path(&PathBuf::from("app/sub/__init__.py")),
            "app.sub"
        );
        assert_eq!(module_id_from_path(&PathBuf::from("__init__.py")), "__init__");
    }

    #[test]
    fn test_is_package_init() {
        assert!(is_package_init(&PathBuf::from("app/__init__.py")));
        assert!(!is_package_init(&PathBuf::from("app/views.py")));
    }
}
