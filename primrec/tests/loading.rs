use std::{fs, path::PathBuf};

use primrec::{Error, Term, TermSource, load_term_file, read_term_source, standard};

fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("primrec-{}-{name}.json", std::process::id()));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn tree_files_load_as_terms() {
    let path = write_fixture("tree", &standard::multiplication().to_json().unwrap());
    assert_eq!(load_term_file(&path).unwrap(), standard::multiplication());
    fs::remove_file(path).unwrap();
}

#[test]
fn node_tables_load_as_terms() {
    let path = write_fixture(
        "table",
        r#"{
            "root": 2,
            "nodes": [
                { "type": "projection", "n": 1, "i": 1 },
                { "type": "composition", "f": 3, "g_list": [4] },
                { "type": "primitive_recursion", "g": 0, "h": 1 },
                { "type": "successor" },
                { "type": "projection", "n": 3, "i": 2 }
            ]
        }"#,
    );
    assert_eq!(load_term_file(&path).unwrap(), standard::addition());
    fs::remove_file(path).unwrap();
}

#[test]
fn malformed_node_tables_are_refused() {
    let path = write_fixture(
        "dangling",
        r#"{ "nodes": [{ "type": "primitive_recursion", "g": 1, "h": 7 }] }"#,
    );
    let source = read_term_source(&path).unwrap();
    assert!(matches!(source, TermSource::Graph(_)));
    assert_eq!(source.violations().len(), 2);
    assert!(source.into_term().is_err());
    fs::remove_file(path).unwrap();
}

#[test]
fn bad_trees_fail_to_decode() {
    let path = write_fixture("unknown", r#"{ "type": "minimisation" }"#);
    let err = load_term_file(&path).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::UnknownVariant("minimisation".to_string()))
    );
    fs::remove_file(path).unwrap();

    let path = write_fixture("shape", r#"{ "type": "projection", "n": 2, "i": 3 }"#);
    assert!(load_term_file(&path).is_err());
    fs::remove_file(path).unwrap();

    assert!(load_term_file(&std::env::temp_dir().join("primrec-missing.json")).is_err());
}

#[test]
fn loaded_terms_evaluate() {
    let path = write_fixture("constant", r#"{ "type": "constant", "value": 7, "arity": 3 }"#);
    let term = load_term_file(&path).unwrap();
    fs::remove_file(path).unwrap();
    assert_eq!(term, Term::Constant { value: 7, arity: 3 });
    let args = primrec::parse_arguments(&term, &["1".into(), "2".into(), "3".into()]).unwrap();
    assert_eq!(term.apply(&args), Ok(7));
}

#[test]
fn deep_shared_tables_fail_fast() {
    let levels = 40;
    let mut nodes = vec![];
    for level in 0..levels {
        nodes.push(serde_json::json!({
            "type": "composition",
            "f": 2 * level + 1,
            "g_list": [2 * level + 2, 2 * level + 2]
        }));
        nodes.push(serde_json::json!({ "type": "projection", "n": 2, "i": 1 }));
    }
    nodes.push(serde_json::json!({ "type": "successor" }));
    let table = serde_json::json!({ "root": 0, "nodes": nodes });
    let path = write_fixture("diamonds", &table.to_string());

    assert!(read_term_source(&path).unwrap().violations().is_empty());
    let err = load_term_file(&path).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::TermTooLarge {
            limit: primrec::graph::DEFAULT_MAX_TERM_NODES
        })
    );
    fs::remove_file(path).unwrap();
}
