//! Integration tests for project loading, the manifest, and compilation.

mod common;

use common::TestProject;
use quarry::compiler::Compiler;
use quarry::error::QuarryError;
use quarry::manifest::Node;
use quarry::project::Access;
use quarry::template::Materialization;

fn model<'a>(manifest: &'a quarry::Manifest, name: &str) -> &'a quarry::manifest::ModelNode {
    match manifest.get(name) {
        Some(Node::Model(m)) => m,
        other => panic!("expected model node '{name}', got {other:?}"),
    }
}

#[test]
fn base_project_manifest() {
    let project = TestProject::base();
    let (_, manifest) = quarry::load_project(project.root()).unwrap();

    assert!(manifest.get("sample_seed").is_some());
    assert_eq!(manifest.get("sample_seed").unwrap().relation(), "dev.sample_seed");

    let sample = model(&manifest, "sample_model");
    assert_eq!(sample.relation, "dev.sample_model");
    assert_eq!(sample.materialized, Materialization::Table);
    assert_eq!(sample.access, Access::Protected);

    let ephemeral = model(&manifest, "ephemeral_model");
    assert_eq!(ephemeral.materialized, Materialization::Ephemeral);
    assert!(!ephemeral.raw_sql.contains("config"));

    let second = model(&manifest, "second_model");
    assert_eq!(second.depends_on, vec![("sample_model".to_string(), None)]);
}

#[test]
fn versioned_manifest_expands_versions() {
    let project = TestProject::versioned();
    let (_, manifest) = quarry::load_project(project.root()).unwrap();

    let v1 = model(&manifest, "sample_model.v1");
    assert_eq!(v1.relation, "dev.sample_model_v1");
    assert!(!v1.latest);

    let v2 = model(&manifest, "sample_model.v2");
    assert_eq!(v2.relation, "dev.sample_model_v2");
    assert!(v2.latest);

    // Unqualified refs land on the latest version.
    let resolved = manifest.resolve_ref("sample_model", None).unwrap();
    assert_eq!(resolved.display_name(), "sample_model.v2");
    let pinned = manifest.resolve_ref("sample_model", Some(1)).unwrap();
    assert_eq!(pinned.display_name(), "sample_model.v1");

    assert_eq!(manifest.select("sample_model").len(), 2);
    assert_eq!(manifest.select("sample_model.v1").len(), 1);
}

#[test]
fn properties_for_unknown_model_fail() {
    let project = TestProject::empty();
    project.write("models/schema.yml", "models:\n  - name: ghost\n");
    let err = quarry::load_project(project.root()).unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
    assert!(err.to_string().contains("unknown model 'ghost'"));
}

#[test]
fn undeclared_group_fails() {
    let project = TestProject::empty();
    project.write("models/orders.sql", "select 1 as id\n");
    project.write(
        "models/schema.yml",
        "models:\n  - name: orders\n    group: nonexistent\n",
    );
    let err = quarry::load_project(project.root()).unwrap_err();
    assert!(err.to_string().contains("undeclared group 'nonexistent'"));
}

#[test]
fn version_without_backing_source_fails() {
    let project = TestProject::empty();
    project.write("models/orders_v1.sql", "select 1 as id\n");
    project.write(
        "models/schema.yml",
        "models:\n  - name: orders\n    versions:\n      - v: 1\n      - v: 2\n",
    );
    let err = quarry::load_project(project.root()).unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
    assert!(err
        .to_string()
        .contains("version 2 of model 'orders' has no backing source file"));
}

#[test]
fn model_and_seed_name_collision_fails() {
    let project = TestProject::empty();
    project.write("models/sample.sql", "select 1 as id\n");
    project.write("seeds/sample.csv", "id\n1\n");
    let err = quarry::load_project(project.root()).unwrap_err();
    assert!(err.to_string().contains("duplicate node 'sample'"));
}

#[test]
fn ephemeral_ref_becomes_cte() {
    let project = TestProject::base();
    let (_, manifest) = quarry::load_project(project.root()).unwrap();
    let compiler = Compiler::new(&manifest);
    let sql = compiler
        .compile_inline("select * from {{ ref('ephemeral_model') }}")
        .unwrap();
    assert!(sql.starts_with("with __quarry__cte__ephemeral_model as ("));
    assert!(sql.contains("dev.sample_model"));
    assert!(sql.ends_with("select * from __quarry__cte__ephemeral_model"));
}

#[test]
fn circular_ephemeral_refs_fail() {
    let project = TestProject::empty();
    project.write(
        "models/a.sql",
        "{{ config(materialized='ephemeral') }}\nselect * from {{ ref('b') }}\n",
    );
    project.write(
        "models/b.sql",
        "{{ config(materialized='ephemeral') }}\nselect * from {{ ref('a') }}\n",
    );
    let (_, manifest) = quarry::load_project(project.root()).unwrap();
    let compiler = Compiler::new(&manifest);
    let err = compiler
        .compile_inline("select * from {{ ref('a') }}")
        .unwrap_err();
    assert!(matches!(err, QuarryError::Compilation(_)));
    assert!(err.to_string().contains("circular reference"));
}

#[test]
fn private_model_rejects_cross_group_ref() {
    let project = TestProject::empty();
    project.write("models/private_model.sql", "select 1 as x\n");
    project.write(
        "models/consumer.sql",
        "select * from {{ ref('private_model') }}\n",
    );
    project.write(
        "models/schema.yml",
        r#"
groups:
  - name: analytics
  - name: marketing
models:
  - name: private_model
    access: private
    group: analytics
  - name: consumer
    group: marketing
"#,
    );
    let (_, manifest) = quarry::load_project(project.root()).unwrap();
    let compiler = Compiler::new(&manifest);
    let err = compiler.compile_model(model(&manifest, "consumer")).unwrap_err();
    assert!(err.to_string().contains("private"));
}

#[test]
fn private_model_allows_same_group_ref() {
    let project = TestProject::empty();
    project.write("models/private_model.sql", "select 1 as x\n");
    project.write(
        "models/consumer.sql",
        "select * from {{ ref('private_model') }}\n",
    );
    project.write(
        "models/schema.yml",
        r#"
groups:
  - name: analytics
models:
  - name: private_model
    access: private
    group: analytics
  - name: consumer
    group: analytics
"#,
    );
    let (_, manifest) = quarry::load_project(project.root()).unwrap();
    let compiler = Compiler::new(&manifest);
    let sql = compiler.compile_model(model(&manifest, "consumer")).unwrap();
    assert!(sql.contains("dev.private_model"));
}

#[test]
fn build_order_follows_dependencies() {
    let project = TestProject::base();
    let (_, manifest) = quarry::load_project(project.root()).unwrap();
    let order: Vec<&str> = manifest
        .build_order()
        .unwrap()
        .into_iter()
        .map(|m| m.display_name.as_str())
        .collect();
    let sample = order.iter().position(|n| *n == "sample_model").unwrap();
    let second = order.iter().position(|n| *n == "second_model").unwrap();
    assert!(sample < second);
}

#[test]
fn unresolved_expression_in_model_fails_with_model_prefix() {
    let project = TestProject::empty();
    project.write(
        "models/orders.sql",
        "select * from {{ source('raw', 'orders') }}\n",
    );
    let (_, manifest) = quarry::load_project(project.root()).unwrap();
    let compiler = Compiler::new(&manifest);
    let err = compiler.compile_model(model(&manifest, "orders")).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Compilation error in model 'orders'"));
}
