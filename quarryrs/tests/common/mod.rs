//! Shared fixture projects and run helpers for the functional tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use quarry::error::Result;
use quarry::output::LogSink;
use quarry::runner::{run_and_capture, RunResults, Runner};

/// Target schema used by every fixture project.
pub const SCHEMA: &str = "dev";

const QUARRY_TOML: &str = r#"
name = "show_fixture"

[database]
path = "quarry.duckdb"
schema = "dev"
"#;

pub const SAMPLE_SEED_CSV: &str = "\
id,sample_num,sample_bool
1,1,true
2,3,false
3,,true
";

/// More rows than the default preview limit, for limit truncation tests.
pub const BIG_SEED_CSV: &str = "\
id
1
2
3
4
5
6
7
8
";

pub const SAMPLE_MODEL: &str = "select * from {{ ref('sample_seed') }}\n";

pub const SECOND_MODEL: &str = "\
select
    sample_num as col_one,
    sample_bool as col_two,
    42 as answer
from {{ ref('sample_model') }}
";

pub const SAMPLE_NUMBER_MODEL: &str = "\
select
    cast(1.0 as integer) as float_to_int_field,
    cast(3.0 as double) as float_field,
    cast(4.3 as double) as float_with_dec_field,
    cast(5 as bigint) as int_field
";

pub const SAMPLE_NUMBER_MODEL_WITH_NULLS: &str = "\
select
    cast(1.0 as integer) as float_to_int_field,
    cast(3.0 as double) as float_field,
    cast(4.3 as double) as float_with_dec_field,
    cast(5 as bigint) as int_field
union all
select
    cast(null as integer),
    cast(null as double),
    cast(null as double),
    cast(null as bigint)
";

pub const EPHEMERAL_MODEL: &str = "\
{{ config(materialized='ephemeral') }}
select coalesce(sample_num, 0) + 10 as col_deci from {{ ref('sample_model') }}
";

/// Passed as inline query text; refs an ephemeral model so the preview
/// exercises CTE inlining.
pub const SECOND_EPHEMERAL_MODEL: &str = "\
{{ config(materialized='ephemeral') }}
select col_deci + 100 as col_hundo from {{ ref('ephemeral_model') }}
";

pub const SAMPLE_MODEL_V2: &str = "select *, 2 as version_tag from {{ ref('sample_seed') }}\n";

pub const VERSIONED_SCHEMA_YML: &str = "\
models:
  - name: sample_model
    latest_version: 2
    versions:
      - v: 1
      - v: 2
        defined_in: sample_model_v2
";

pub const PRIVATE_SCHEMA_YML: &str = "\
groups:
  - name: analytics
    owner:
      name: data-team
models:
  - name: private_model
    access: private
    group: analytics
";

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Bare project: config file plus empty model and seed directories.
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("create temp project dir");
        let project = Self { dir };
        project.write("quarry.toml", QUARRY_TOML);
        fs::create_dir_all(project.root().join("models")).expect("create models dir");
        fs::create_dir_all(project.root().join("seeds")).expect("create seeds dir");
        project
    }

    /// The standard fixture: sample seed plus five models.
    pub fn base() -> Self {
        let project = Self::empty();
        project.write("seeds/sample_seed.csv", SAMPLE_SEED_CSV);
        project.write("models/sample_model.sql", SAMPLE_MODEL);
        project.write("models/second_model.sql", SECOND_MODEL);
        project.write("models/sample_number_model.sql", SAMPLE_NUMBER_MODEL);
        project.write(
            "models/sample_number_model_with_nulls.sql",
            SAMPLE_NUMBER_MODEL_WITH_NULLS,
        );
        project.write("models/ephemeral_model.sql", EPHEMERAL_MODEL);
        project
    }

    /// Two versions of `sample_model` declared through a property file.
    pub fn versioned() -> Self {
        let project = Self::empty();
        project.write("seeds/sample_seed.csv", SAMPLE_SEED_CSV);
        project.write("models/sample_model.sql", SAMPLE_MODEL);
        project.write("models/sample_model_v2.sql", SAMPLE_MODEL_V2);
        project.write("models/schema.yml", VERSIONED_SCHEMA_YML);
        project
    }

    /// A grouped private model.
    pub fn private() -> Self {
        let project = Self::empty();
        project.write("seeds/sample_seed.csv", SAMPLE_SEED_CSV);
        project.write("models/private_model.sql", SAMPLE_MODEL);
        project.write("models/schema.yml", PRIVATE_SCHEMA_YML);
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(path, contents).expect("write fixture file");
    }
}

pub async fn run_quarry(project: &TestProject, args: &[&str]) -> Result<RunResults> {
    let sink = Arc::new(LogSink::new(false));
    Runner::with_sink(project.root(), sink)?.run(args).await
}

pub async fn run_quarry_and_capture(
    project: &TestProject,
    args: &[&str],
) -> Result<(RunResults, String)> {
    run_and_capture(project.root(), args).await
}
