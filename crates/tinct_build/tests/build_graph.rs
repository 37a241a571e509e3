use pretty_assertions::assert_eq;
use serde_json::json;
use tinct_build::io::MemorySourceIo;
use tinct_build::{build_entry, Builder, Error, LoadError, SourceLoader, TokenTable};

const PALETTE: &str = r##"
red:
  "500": "#ef4444"
  "600": "#dc2626"
blue:
  "500": "#3b82f6"
$build:
  exports: ["**"]
"##;

const SCALE: &str = r#"
s: 4px
m: 8px
l: 16px
xl: 24px
"#;

const THEME: &str = r#"
$build:
  imports:
    palette: ./palette.yaml
    scale: { from: ./scale.yaml, build: false }
  patches:
    - name: colors
      operations:
        - { op: copy, from: /palette/red/500, path: /color/danger }
        - { op: copy, from: /palette/blue/500, path: /color/info }
    - name: spacing
      matrix:
        size: ["$[[s..xl]]"]
      operations:
        - op: add
          path: /space/${{ matrix.size }}
          value: ${{ scale.${{ matrix.size }} }}
    - name: aliases
      operations:
        - op: move
          from: /space/$[[s..l]]
          path: /gap/$[[sm..lg]]
  exports:
    include: ["**"]
    exclude: ["space/xl"]
"#;

fn project() -> MemorySourceIo {
    MemorySourceIo::new()
        .with_text("/proj/tokens/palette.yaml", PALETTE)
        .with_text("/proj/tokens/scale.yaml", SCALE)
        .with_text("/proj/tokens/theme.yaml", THEME)
}

#[test]
fn builds_a_theme_from_imports_patches_and_matrix() {
    let exports = build_entry(project(), "/proj/tokens", "theme.yaml")
        .unwrap()
        .unwrap();

    assert_eq!(
        exports,
        json!({
            "color": {"danger": "#ef4444", "info": "#3b82f6"},
            "gap": {"sm": "4px", "md": "8px", "lg": "16px"}
        })
    );
}

#[test]
fn shared_builder_memoizes_imports() {
    let loader = SourceLoader::new(project(), "/proj/tokens");
    let theme = loader.load("theme.yaml").unwrap();
    assert_eq!(loader.len(), 3);

    let mut builder = Builder::new();
    let first = builder.build(&theme).unwrap();
    let palette = loader.cached("/proj/tokens/palette.yaml".as_ref()).unwrap();
    assert!(builder.built(palette.path()).is_some());
    // Raw imports are never built.
    assert!(builder.built("/proj/tokens/scale.yaml".as_ref()).is_none());
    assert_eq!(builder.build(&theme).unwrap(), first);
}

#[test]
fn exports_feed_token_emission() {
    let exports = build_entry(project(), "/proj/tokens", "theme.yaml")
        .unwrap()
        .unwrap();
    let table = TokenTable::from_exports("acme", &exports);

    assert_eq!(table.len(), 5);
    assert_eq!(
        table.get(&["gap", "md"]).map(|e| e.variable.as_str()),
        Some("--acme-gap-md")
    );
    assert!(table
        .to_css(":root")
        .contains("  --acme-color-danger: #ef4444;\n"));
}

#[test]
fn cycle_is_reported_before_any_build() {
    let io = MemorySourceIo::new()
        .with_text(
            "/p/a.yaml",
            "$build:\n  imports: { b: b.yaml }\n  exports: ['**']\n",
        )
        .with_text(
            "/p/b.yaml",
            "$build:\n  imports: { a: a.yaml }\n  exports: ['**']\n",
        );

    let err = build_entry(io, "/p", "a.yaml").unwrap_err();
    match &err {
        Error::Load(LoadError::CircularImport { chain }) => assert_eq!(chain.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "circular import: /p/a.yaml -> /p/b.yaml -> /p/a.yaml"
    );
}

#[test]
fn patch_errors_keep_their_cause_chain() {
    let io = MemorySourceIo::new().with_text(
        "/p/theme.yaml",
        r#"
color: {}
$build:
  patches:
    - name: alias
      operations:
        - { op: add, path: /color/main, value: "${{ brand.primry }}" }
  exports: ["**"]
"#,
    );
    let err = build_entry(io, "/p", "theme.yaml").unwrap_err();
    let mut messages = Vec::new();
    let mut cause: Option<&dyn std::error::Error> = Some(&err);
    while let Some(e) = cause {
        messages.push(e.to_string());
        cause = e.source();
    }
    assert_eq!(messages[0], "patch 1 (`alias`) failed in /p/theme.yaml");
    assert_eq!(messages[1], "operation 1 failed");
    assert!(messages
        .last()
        .unwrap()
        .starts_with("variable `brand.primry` not found"));
}
