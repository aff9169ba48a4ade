//! File loading helpers for application code
//!
//! Thin wrappers over [`Parser`] that report failures as `anyhow` errors
//! with file context, or fall back to a default instance.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::instance::InstanceRef;
use crate::parser::{ParseOutput, Parser};

/// Parses `path`, requiring a root of `type_name` or a type derived from it.
pub fn load_root(parser: &Parser<'_>, path: &Path, type_name: &str) -> Result<ParseOutput> {
    let output = parser
        .parse_file_as(path, type_name)
        .with_context(|| format!("Failed to load {type_name} from {}", path.display()))?;
    info!(
        "Loaded {} from {} ({} includes)",
        output.root.borrow().describe(),
        path.display(),
        output.dependencies.len()
    );
    Ok(output)
}

/// Like [`load_root`], but logs any failure and returns `default` instead.
pub fn load_or_default(
    parser: &Parser<'_>,
    path: &Path,
    type_name: &str,
    default: InstanceRef,
) -> InstanceRef {
    match load_root(parser, path, type_name) {
        Ok(output) => output.root,
        Err(e) => {
            warn!("Using default {type_name}: {e:#}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::instance::{same_instance, view};
    use crate::registry::Registry;
    use crate::spec::SpecBuilder;
    use crate::value::Field;
    use std::io::Write;

    #[derive(Default)]
    struct Settings {
        volume: Field<i32>,
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.add_type(
            SpecBuilder::<Settings>::new()
                .add_int("volume", field!(Settings, volume))
                .build("Settings"),
        )
        .unwrap();
        reg
    }

    #[test]
    fn test_load_root() {
        let reg = registry();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Settings {{ volume: 7 }}").unwrap();
        let output = load_root(&Parser::new(&reg), file.path(), "Settings").unwrap();
        assert_eq!(*view::<Settings>(&output.root).unwrap().volume, 7);
    }

    #[test]
    fn test_load_error_has_file_context() {
        let reg = registry();
        let err = load_root(&Parser::new(&reg), Path::new("missing.og"), "Settings").unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("Failed to load Settings from missing.og"));
        assert!(text.contains("Failed to open file"));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let reg = registry();
        let default = reg.create("Settings").unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Settings {{ volume: loud }}").unwrap();
        let root = load_or_default(&Parser::new(&reg), file.path(), "Settings", default.clone());
        assert!(same_instance(&root, &default));
    }
}
