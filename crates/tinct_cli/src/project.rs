//! Project scaffolding for `tinct init`

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::config::{TinctConfig, CONFIG_FILE};

const ENTRY_FILE: &str = "theme.yaml";

/// Create a new Tinct project in `path`
pub fn create_project(path: &Path, name: &str) -> Result<()> {
    if path.join(CONFIG_FILE).exists() {
        anyhow::bail!("{} already exists in {}", CONFIG_FILE, path.display());
    }

    let config = TinctConfig::new(name, ENTRY_FILE);
    let source_root = path.join(&config.project.source_root);
    fs::create_dir_all(&source_root)?;

    fs::write(path.join(CONFIG_FILE), config.to_toml()?)?;
    fs::write(source_root.join("palette.yaml"), TEMPLATE_PALETTE)?;
    fs::write(source_root.join(ENTRY_FILE), TEMPLATE_THEME)?;

    fs::write(
        path.join(".gitignore"),
        r#"# Tinct build output
/dist/
"#,
    )?;

    Ok(())
}

const TEMPLATE_PALETTE: &str = r##"# Raw color scales, imported by theme.yaml
gray:
  "100": "#f3f4f6"
  "500": "#6b7280"
  "900": "#111827"
blue:
  "500": "#3b82f6"
  "600": "#2563eb"
"##;

const TEMPLATE_THEME: &str = r##"scale:
  s: 4px
  m: 8px
  l: 16px
  xl: 24px

$build:
  imports:
    palette: { from: ./palette.yaml, build: false }
  patches:
    - name: colors
      operations:
        - { op: copy, from: /palette/blue/500, path: /color/primary }
        - { op: copy, from: /palette/gray/900, path: /color/text }
    - name: spacing
      matrix:
        size: ["$[[s..xl]]"]
      operations:
        - op: add
          path: /space/${{ matrix.size }}
          value: ${{ scale.${{ matrix.size }} }}
  exports:
    include: ["**"]
    exclude: ["scale/**"]
"##;
