//! Writing generated artifacts
//!
//! The graph is handed to the executor as pretty JSON. Fetch targets can
//! additionally get a make-style depfile listing what they produce, so the
//! executor can re-run them when a checkout goes missing.

use std::path::{Path, PathBuf};

use crate::config::defaults::DEPFILE_PREFIX;
use crate::core::component::{components_of, Component};
use crate::core::graph::{fetch_target_id, BuildGraph};
use crate::core::tree::ConfigNode;
use crate::error::{GraphError, KilnError};
use crate::infra::filesystem;

/// Write the graph as JSON; returns `false` when the file was already current
pub fn write_graph(graph: &BuildGraph, path: &Path) -> Result<bool, KilnError> {
    let mut json = graph
        .to_json()
        .map_err(|e| KilnError::Serialize(e.to_string()))?;
    json.push('\n');
    let written = filesystem::write_if_changed(path, &json)?;
    if written {
        tracing::info!("Wrote {} ({} targets)", path.display(), graph.targets.len());
    } else {
        tracing::info!("{} is up to date", path.display());
    }
    Ok(written)
}

/// Depfile name for a component
pub fn depfile_name(component: &str) -> String {
    format!("{DEPFILE_PREFIX}{component}.d")
}

fn escape_make(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' | '#' => {
                out.push('\\');
                out.push(c);
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a make-style depfile rule: `target: dep dep ...`
pub fn render_depfile(target: &str, deps: &[String]) -> String {
    let mut out = escape_make(target);
    out.push(':');
    for dep in deps {
        out.push_str(" \\\n  ");
        out.push_str(&escape_make(dep));
    }
    out.push('\n');
    out
}

/// Render the fetch depfile of one component
pub fn fetcher_depfile(component: &Component) -> Result<String, KilnError> {
    let outputs = component.fetch_outputs()?;
    Ok(render_depfile(&fetch_target_id(&component.name), &outputs))
}

/// Write `{dir}/.kiln_{name}.d` for the named component of a resolved tree
pub fn write_fetcher_depfile(tree: &ConfigNode, name: &str, dir: &Path) -> Result<PathBuf, KilnError> {
    let component = components_of(tree)?
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| GraphError::UnknownComponent {
            name: name.to_string(),
        })?;

    let path = dir.join(depfile_name(name));
    filesystem::write_file(&path, &fetcher_depfile(&component)?)?;
    tracing::info!("Generated deps for component '{name}' in {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{build_graph, GeneratorRule};
    use tempfile::TempDir;
    use crate::test_utils::yaml;

    const DOC: &str = r#"
desc: x
components:
  domd:
    build_dir: yocto
    sources:
      - type: git
        url: "https://git.yoctoproject.org/poky"
      - type: git
        url: "https://example.com/my layer.git"
    builder:
      type: custom_script
      script: build.sh
      target_images: [yocto/out.img]
"#;

    #[test]
    fn test_render_depfile() {
        assert_eq!(
            render_depfile("fetch-a", &["a/x".to_string(), "a/my dir".to_string()]),
            "fetch-a: \\\n  a/x \\\n  a/my\\ dir\n"
        );
        assert_eq!(render_depfile("fetch-a", &[]), "fetch-a:\n");
    }

    #[test]
    fn test_write_fetcher_depfile() {
        let temp = TempDir::new().unwrap();
        let path = write_fetcher_depfile(&yaml(DOC), "domd", temp.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), ".kiln_domd.d");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("fetch-domd:"));
        assert!(content.contains("yocto/poky"));
        assert!(content.contains("yocto/my\\ layer"));
    }

    #[test]
    fn test_unknown_component() {
        let temp = TempDir::new().unwrap();
        let err = write_fetcher_depfile(&yaml(DOC), "dom0", temp.path()).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Graph(GraphError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_write_graph_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.graph.json");
        let generator = GeneratorRule {
            document: "build.yaml".into(),
            argv: vec!["kiln".into(), "build.yaml".into()],
            output: "build.graph.json".into(),
        };
        let graph = build_graph(&yaml(DOC), generator).unwrap();
        assert!(write_graph(&graph, &path).unwrap());
        assert!(!write_graph(&graph, &path).unwrap());

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["targets"][0]["id"], "fetch-domd");
    }
}
