//! Integration tests: parse a small kit from disk, compile it, and render
//! its authoring documents.

use cpt_blueprint::{
    Coverage, Policy, compile, parse_blueprint, render_schema, write_outputs, write_schema,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "cpt-blueprint-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path.join(name);
        fs::write(&path, content).expect("fixture should be written");
        path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const PRD: &str = r#"# PRD

`@cpt:blueprint`
```toml
artifact = "PRD"
kit = "sdlc"
```
`@/cpt:blueprint`

`@cpt:heading`
```toml
id = "title"
level = 1
pattern = "^PRD"
```
`@/cpt:heading`

`@cpt:heading`
```toml
id = "requirements"
level = 2
pattern = "Functional Requirements"
numbered = true
```
`@/cpt:heading`

`@cpt:id`
```toml
kind = "fr"
required = true
task = "prohibited"
headings = ["requirements"]

[references.DESIGN]
coverage = "required"
headings = ["capabilities"]

[references.ADR]
coverage = "prohibited"
```
`@/cpt:id`
"#;

const ADR: &str = r#"`@cpt:blueprint`
```toml
artifact = "ADR"
```
`@/cpt:blueprint`

`@cpt:heading`
```toml
id = "title"
level = 1
pattern = "ADR"
```
`@/cpt:heading`
"#;

#[test]
fn compiled_schema_is_byte_identical_across_input_order() {
    let dir = TempDirGuard::new("order");
    let prd = parse_blueprint(dir.write("PRD.md", PRD)).unwrap();
    let adr = parse_blueprint(dir.write("ADR.md", ADR)).unwrap();

    let forward = render_schema(&compile(&[prd.clone(), adr.clone()]).unwrap()).unwrap();
    let backward = render_schema(&compile(&[adr, prd]).unwrap()).unwrap();
    assert_eq!(forward, backward);

    let adr_at = forward.find("\"ADR\"").unwrap();
    let prd_at = forward.find("\"PRD\"").unwrap();
    assert!(adr_at < prd_at, "artifact kinds should be sorted");
}

#[test]
fn id_constraint_carries_reference_rules() {
    let dir = TempDirGuard::new("refs");
    let prd = parse_blueprint(dir.write("PRD.md", PRD)).unwrap();
    let schema = compile(&[prd]).unwrap();

    let fr = schema.artifacts["PRD"].id_constraint("fr").unwrap();
    assert!(fr.required);
    assert_eq!(fr.task, Policy::Prohibited);
    assert_eq!(fr.priority, Policy::Allowed);
    assert!(fr.headings.contains("requirements"));
    assert_eq!(fr.references["DESIGN"].coverage, Coverage::Required);
    assert!(fr.references["DESIGN"].headings.contains("capabilities"));
    assert_eq!(fr.references["ADR"].coverage, Coverage::Prohibited);

    let requirements = schema.artifacts["PRD"].heading("requirements").unwrap();
    assert_eq!(requirements.numbered, Policy::Required);
}

#[test]
fn adr_headings_snapshot() {
    let dir = TempDirGuard::new("snapshot");
    let adr = parse_blueprint(dir.write("ADR.md", ADR)).unwrap();
    let schema = compile(&[adr]).unwrap();
    insta::assert_json_snapshot!(schema.artifacts["ADR"].headings, @r#"
    [
      {
        "id": "title",
        "level": 1,
        "pattern": "ADR",
        "required": true,
        "multiple": "allowed",
        "numbered": "allowed"
      }
    ]
    "#);
}

#[test]
fn write_schema_reports_change_only_once() {
    let dir = TempDirGuard::new("write");
    let prd = parse_blueprint(dir.write("PRD.md", PRD)).unwrap();
    let schema = compile(&[prd]).unwrap();
    let out = dir.path().join("out/constraints.json");
    assert!(write_schema(&out, &schema).unwrap());
    assert!(!write_schema(&out, &schema).unwrap());
    let loaded = cpt_blueprint::load_schema(&out).unwrap();
    assert_eq!(loaded, schema);
}

#[test]
fn outputs_are_written_per_blueprint() {
    let dir = TempDirGuard::new("outputs");
    let prd = parse_blueprint(dir.write("PRD.md", PRD)).unwrap();
    let written = write_outputs(&prd, dir.path().join("PRD")).unwrap();
    let names: Vec<_> = written
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["rules.md", "checklist.md", "template.md", "example.md"]
    );
    let template = fs::read_to_string(dir.path().join("PRD/template.md")).unwrap();
    assert!(template.contains("## Functional Requirements"));
}

#[test]
fn unreadable_blueprint_is_an_io_error() {
    let dir = TempDirGuard::new("missing");
    let err = parse_blueprint(dir.path().join("nope.md")).unwrap_err();
    assert!(err.to_string().starts_with("failed to read blueprint"));
}
