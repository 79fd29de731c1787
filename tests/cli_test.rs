//! CLI integration tests for the ds-verify binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("ds-verify"))
}

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const VOCABULARY: &str = r#"{
    "@graph": [
        { "@id": "schema:Thing", "@type": "rdfs:Class" },
        {
            "@id": "schema:Hotel",
            "@type": "rdfs:Class",
            "rdfs:subClassOf": { "@id": "schema:Thing" }
        }
    ]
}"#;

const HOTEL_DS: &str = r#"{
    "@id": "https://example.com/ds/hotel",
    "@type": ["sh:NodeShape", "schema:CreativeWork"],
    "schema:schemaVersion": "https://schema.org/version/11.0/",
    "sh:targetClass": "schema:Hotel",
    "sh:property": [{
        "sh:path": "schema:name",
        "sh:minCount": 1,
        "sh:or": [ { "sh:datatype": "xsd:string", "sh:maxLength": 50 } ]
    }]
}"#;

const VALID_DATA: &str = r#"{
    "https://example.com/hotel1": {
        "@type": ["http://schema.org/Hotel"],
        "http://schema.org/name": [
            { "type": "literal", "value": "Grand Budapest" }
        ]
    }
}"#;

const INVALID_DATA: &str = r#"{
    "https://example.com/hotel1": {
        "@type": ["http://schema.org/Hotel"]
    }
}"#;

struct Fixture {
    _dir: TempDir,
    data: std::path::PathBuf,
    ds: std::path::PathBuf,
    vocab: std::path::PathBuf,
}

fn fixture(data: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let data = write_temp_file(&dir, "data.json", data);
    let ds = write_temp_file(&dir, "ds.json", HOTEL_DS);
    let vocab = write_temp_file(&dir, "vocab.jsonld", VOCABULARY);
    Fixture {
        _dir: dir,
        data,
        ds,
        vocab,
    }
}

fn verify_args(f: &Fixture) -> Vec<String> {
    vec![
        "verify".to_owned(),
        f.data.to_str().unwrap().to_owned(),
        f.ds.to_str().unwrap().to_owned(),
        "--vocab".to_owned(),
        f.vocab.to_str().unwrap().to_owned(),
    ]
}

mod verify_command {
    use super::*;

    #[test]
    fn conformant_data_exits_zero() {
        let f = fixture(VALID_DATA);
        cmd()
            .args(verify_args(&f))
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""ds:validationResult":"Valid""#));
    }

    #[test]
    fn violations_exit_one() {
        let f = fixture(INVALID_DATA);
        cmd()
            .args(verify_args(&f))
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""ds:errorCode":503"#))
            .stdout(predicate::str::contains("Invalid"));
    }

    #[test]
    fn warnings_still_exit_zero() {
        let data = r#"{
            "https://example.com/hotel1": {
                "@type": ["http://schema.org/Hotel"],
                "http://schema.org/name": [ { "type": "literal", "value": "ok" } ],
                "http://schema.org/telephone": [ { "type": "literal", "value": "123" } ]
            }
        }"#;
        let f = fixture(data);
        cmd()
            .args(verify_args(&f))
            .assert()
            .success()
            .stdout(predicate::str::contains("ValidWithWarnings"))
            .stdout(predicate::str::contains(r#""ds:errorCode":502"#));
    }

    #[test]
    fn shacl_format() {
        let f = fixture(INVALID_DATA);
        let mut args = verify_args(&f);
        args.extend(["--format".to_owned(), "shacl".to_owned()]);
        cmd()
            .args(args)
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""sh:conforms":false"#))
            .stdout(predicate::str::contains("sh:MinCountConstraintComponent"));
    }

    #[test]
    fn unknown_format_exits_two() {
        let f = fixture(VALID_DATA);
        let mut args = verify_args(&f);
        args.extend(["--format".to_owned(), "xml".to_owned()]);
        cmd()
            .args(args)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown report format"));
    }

    #[test]
    fn pretty_output() {
        let f = fixture(VALID_DATA);
        let mut args = verify_args(&f);
        args.push("--pretty".to_owned());
        cmd()
            .args(args)
            .assert()
            .success()
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn output_file() {
        let f = fixture(VALID_DATA);
        let out = f._dir.path().join("report.json");
        let mut args = verify_args(&f);
        args.extend(["--output".to_owned(), out.to_str().unwrap().to_owned()]);
        cmd()
            .args(args)
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&out).unwrap();
        assert!(content.contains("ds:VerificationReport"));
    }

    #[test]
    fn missing_data_file_exits_three() {
        let f = fixture(VALID_DATA);
        cmd()
            .args([
                "verify",
                "/nonexistent/data.json",
                f.ds.to_str().unwrap(),
                "--vocab",
                f.vocab.to_str().unwrap(),
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn unparseable_data_is_a_lexical_report() {
        let f = fixture("{not json");
        cmd()
            .args(verify_args(&f))
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""ds:errorCode":101"#));
    }

    #[test]
    fn invalid_vocabulary_exits_two() {
        let dir = TempDir::new().unwrap();
        let data = write_temp_file(&dir, "data.json", VALID_DATA);
        let ds = write_temp_file(&dir, "ds.json", HOTEL_DS);
        let vocab = write_temp_file(&dir, "vocab.jsonld", r#"{"no-graph": true}"#);
        cmd()
            .args([
                "verify",
                data.to_str().unwrap(),
                ds.to_str().unwrap(),
                "--vocab",
                vocab.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("vocabulary"));
    }

    #[test]
    fn target_matching_can_be_skipped() {
        let data = r#"{
            "https://example.com/x": {
                "@type": ["http://schema.org/Thing"],
                "http://schema.org/name": [ { "type": "literal", "value": "ok" } ]
            }
        }"#;
        let f = fixture(data);
        let mut args = verify_args(&f);
        cmd().args(args.clone()).assert().code(1);

        args.push("--ignore-target-matching".to_owned());
        cmd().args(args).assert().success();
    }
}

mod cli_basics {
    use super::*;

    #[test]
    fn help_lists_verify() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("verify"));
    }

    #[test]
    fn missing_arguments_fail() {
        cmd().arg("verify").assert().failure();
    }
}
