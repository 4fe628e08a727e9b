//! Query compilation.
//!
//! Turns a node's template (or ad hoc inline text) into executable SQL:
//! refs become schema-qualified relations, ephemeral targets are spliced
//! in as CTEs, and access rules are enforced at the point of reference.

use crate::error::Result;
use crate::manifest::{Manifest, ModelNode, Node};
use crate::project::Access;
use crate::template::{self, Materialization, Origin};

const CTE_PREFIX: &str = "__quarry__cte__";

pub struct Compiler<'a> {
    manifest: &'a Manifest,
}

impl<'a> Compiler<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest }
    }

    /// Compile a model node into a full select statement.
    pub fn compile_model(&self, node: &ModelNode) -> Result<String> {
        let mut ctes = Vec::new();
        let mut stack = vec![node.display_name.clone()];
        let body = self.render_body(
            &node.raw_sql,
            Origin::Model(&node.display_name),
            node.group.as_deref(),
            &mut ctes,
            &mut stack,
        )?;
        Ok(assemble(ctes, body))
    }

    /// Compile inline query text against the manifest.
    ///
    /// A config block is tolerated (and ignored) so a model body can be
    /// pasted on the command line unchanged.
    pub fn compile_inline(&self, raw: &str) -> Result<String> {
        let (_config, body) = template::extract_config(raw, Origin::Inline)?;
        let mut ctes = Vec::new();
        let mut stack = Vec::new();
        let body = self.render_body(&body, Origin::Inline, None, &mut ctes, &mut stack)?;
        Ok(assemble(ctes, body))
    }

    fn render_body(
        &self,
        sql: &str,
        origin: Origin<'_>,
        origin_group: Option<&str>,
        ctes: &mut Vec<(String, String)>,
        stack: &mut Vec<String>,
    ) -> Result<String> {
        template::render(sql, origin, |name, version| {
            let node = self
                .manifest
                .resolve_ref(name, version)
                .ok_or_else(|| origin.error(format!("unknown reference '{name}'")))?;
            match node {
                Node::Seed(seed) => Ok(seed.relation.clone()),
                Node::Model(model) => {
                    self.check_access(model, origin, origin_group)?;
                    if model.materialized != Materialization::Ephemeral {
                        return Ok(model.relation.clone());
                    }
                    let cte_name = cte_name(model);
                    if stack.contains(&model.display_name) {
                        return Err(origin.error(format!(
                            "circular reference to '{}'",
                            model.display_name
                        )));
                    }
                    if !ctes.iter().any(|(existing, _)| existing == &cte_name) {
                        stack.push(model.display_name.clone());
                        let body = self.render_body(
                            &model.raw_sql,
                            Origin::Model(&model.display_name),
                            model.group.as_deref(),
                            ctes,
                            stack,
                        )?;
                        stack.pop();
                        ctes.push((cte_name.clone(), body));
                    }
                    Ok(cte_name)
                }
            }
        })
    }

    /// Private models may only be ref'd from models in the same group.
    /// Inline preview queries reference anything explicitly, so they pass.
    fn check_access(
        &self,
        target: &ModelNode,
        origin: Origin<'_>,
        origin_group: Option<&str>,
    ) -> Result<()> {
        if target.access != Access::Private || matches!(origin, Origin::Inline) {
            return Ok(());
        }
        if target.group.as_deref() == origin_group && origin_group.is_some() {
            return Ok(());
        }
        Err(origin.error(format!(
            "model '{}' is private and cannot be referenced across groups",
            target.display_name
        )))
    }
}

fn cte_name(model: &ModelNode) -> String {
    let ident = model
        .relation
        .rsplit('.')
        .next()
        .unwrap_or(model.name.as_str());
    format!("{CTE_PREFIX}{ident}")
}

fn assemble(ctes: Vec<(String, String)>, body: String) -> String {
    if ctes.is_empty() {
        return body;
    }
    let mut out = String::from("with ");
    for (idx, (name, sql)) in ctes.iter().enumerate() {
        if idx > 0 {
            out.push_str(",\n");
        }
        out.push_str(&format!("{name} as (\n{sql}\n)"));
    }
    out.push('\n');
    out.push_str(&body);
    out
}
