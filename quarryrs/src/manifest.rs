//! The compiled manifest: every source file resolved into a node.
//!
//! Versioned models expand into one node per version (`orders.v1`,
//! `orders.v2`); seeds and unversioned models keep their bare name. All
//! nodes share one namespace so `ref` and `--select` use the same lookup.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use crate::config::ProjectConfig;
use crate::error::{QuarryError, Result};
use crate::project::{Access, ModelProperties, ModelSource, Project};
use crate::template::{self, Materialization, Origin};

#[derive(Debug, Clone)]
pub struct ModelNode {
    /// Base model name without version qualifier.
    pub name: String,
    pub version: Option<u32>,
    /// Whether this is the latest version of its model.
    pub latest: bool,
    /// Name shown in banners and accepted by selectors, e.g. `orders.v2`.
    pub display_name: String,
    /// Schema-qualified relation, e.g. `dev.orders_v2`.
    pub relation: String,
    /// Template body with the config block stripped.
    pub raw_sql: String,
    pub materialized: Materialization,
    pub access: Access,
    pub group: Option<String>,
    /// Ref targets appearing in the body, with any pinned version.
    pub depends_on: Vec<(String, Option<u32>)>,
}

#[derive(Debug, Clone)]
pub struct SeedNode {
    pub name: String,
    pub relation: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Node {
    Model(ModelNode),
    Seed(SeedNode),
}

impl Node {
    pub fn display_name(&self) -> &str {
        match self {
            Node::Model(m) => &m.display_name,
            Node::Seed(s) => &s.name,
        }
    }

    pub fn relation(&self) -> &str {
        match self {
            Node::Model(m) => &m.relation,
            Node::Seed(s) => &s.relation,
        }
    }
}

/// All nodes of a project, keyed by display name.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub nodes: BTreeMap<String, Node>,
}

impl Manifest {
    pub fn build(project: &Project, config: &ProjectConfig) -> Result<Self> {
        let schema = &config.database.schema;
        let mut manifest = Manifest::default();

        let group_names: HashSet<&str> = project.groups.iter().map(|g| g.name.as_str()).collect();
        let sources: HashMap<&str, &ModelSource> =
            project.models.iter().map(|m| (m.name.as_str(), m)).collect();
        let props_by_name: HashMap<&str, &ModelProperties> = project
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();

        for props in &project.properties {
            if let Some(group) = &props.group {
                if !group_names.contains(group.as_str()) {
                    return Err(QuarryError::Validation(format!(
                        "model '{}' references undeclared group '{group}'",
                        props.name
                    )));
                }
            }
            if props.versions.is_empty() && !sources.contains_key(props.name.as_str()) {
                return Err(QuarryError::Validation(format!(
                    "properties reference unknown model '{}'",
                    props.name
                )));
            }
        }

        let mut consumed: HashSet<&str> = HashSet::new();
        for props in &project.properties {
            if props.versions.is_empty() {
                continue;
            }
            let latest = props
                .latest_version
                .or_else(|| props.versions.iter().map(|s| s.v).max())
                .unwrap_or(0);
            for spec in &props.versions {
                let source = resolve_version_source(&sources, props, spec.v, &spec.defined_in)?;
                consumed.insert(source.name.as_str());
                let display_name = format!("{}.v{}", props.name, spec.v);
                let relation = format!("{schema}.{}_v{}", props.name, spec.v);
                let node = model_node(
                    source,
                    props.name.clone(),
                    Some(spec.v),
                    spec.v == latest,
                    display_name,
                    relation,
                    Some(props),
                )?;
                manifest.insert(Node::Model(node))?;
            }
        }

        for source in &project.models {
            if consumed.contains(source.name.as_str()) {
                continue;
            }
            let props = props_by_name
                .get(source.name.as_str())
                .filter(|p| p.versions.is_empty())
                .copied();
            let node = model_node(
                source,
                source.name.clone(),
                None,
                true,
                source.name.clone(),
                format!("{schema}.{}", source.name),
                props,
            )?;
            manifest.insert(Node::Model(node))?;
        }

        for seed in &project.seeds {
            manifest.insert(Node::Seed(SeedNode {
                name: seed.name.clone(),
                relation: format!("{schema}.{}", seed.name),
                path: seed.path.clone(),
            }))?;
        }

        tracing::debug!(nodes = manifest.nodes.len(), "manifest built");
        Ok(manifest)
    }

    fn insert(&mut self, node: Node) -> Result<()> {
        let key = node.display_name().to_string();
        if self.nodes.insert(key.clone(), node).is_some() {
            return Err(QuarryError::Validation(format!("duplicate node '{key}'")));
        }
        Ok(())
    }

    pub fn get(&self, display_name: &str) -> Option<&Node> {
        self.nodes.get(display_name)
    }

    /// Resolve a `ref` target. Unqualified refs to a versioned model get
    /// its latest version.
    pub fn resolve_ref(&self, name: &str, version: Option<u32>) -> Option<&Node> {
        match version {
            Some(v) => self.nodes.get(&format!("{name}.v{v}")),
            None => self.nodes.get(name).or_else(|| self.latest_version(name)),
        }
    }

    fn latest_version(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(
            |node| matches!(node, Node::Model(m) if m.name == name && m.version.is_some() && m.latest),
        )
    }

    /// Resolve one selector token. A bare versioned model name selects
    /// every version; `<name>.v<N>` selects exactly one.
    pub fn select(&self, token: &str) -> Vec<&Node> {
        if let Some(node) = self.nodes.get(token) {
            return vec![node];
        }
        self.nodes
            .values()
            .filter(|node| matches!(node, Node::Model(m) if m.name == token && m.version.is_some()))
            .collect()
    }

    /// Model nodes in dependency order for materialization.
    pub fn build_order(&self) -> Result<Vec<&ModelNode>> {
        let models: Vec<&ModelNode> = self
            .nodes
            .values()
            .filter_map(|node| match node {
                Node::Model(m) => Some(m),
                Node::Seed(_) => None,
            })
            .collect();

        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        for model in &models {
            indegree.entry(model.display_name.as_str()).or_insert(0);
            for (dep, version) in &model.depends_on {
                let Some(Node::Model(target)) = self.resolve_ref(dep, *version) else {
                    continue;
                };
                dependents
                    .entry(target.display_name.as_str())
                    .or_default()
                    .push(model.display_name.as_str());
                *indegree.entry(model.display_name.as_str()).or_insert(0) += 1;
            }
        }

        let mut ready: VecDeque<&str> = models
            .iter()
            .map(|m| m.display_name.as_str())
            .filter(|name| indegree.get(name).copied().unwrap_or(0) == 0)
            .collect();
        let mut order = Vec::with_capacity(models.len());
        while let Some(name) = ready.pop_front() {
            if let Some(Node::Model(m)) = self.nodes.get(name) {
                order.push(m);
            }
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }
        if order.len() != models.len() {
            return Err(QuarryError::Compilation(
                "circular dependency detected in model graph".to_string(),
            ));
        }
        Ok(order)
    }
}

fn resolve_version_source<'a>(
    sources: &HashMap<&str, &'a ModelSource>,
    props: &ModelProperties,
    v: u32,
    defined_in: &Option<String>,
) -> Result<&'a ModelSource> {
    let candidates: Vec<String> = match defined_in {
        Some(name) => vec![name.clone()],
        None => vec![format!("{}_v{v}", props.name), props.name.clone()],
    };
    candidates
        .iter()
        .find_map(|c| sources.get(c.as_str()).copied())
        .ok_or_else(|| {
            QuarryError::Validation(format!(
                "version {v} of model '{}' has no backing source file",
                props.name
            ))
        })
}

fn model_node(
    source: &ModelSource,
    name: String,
    version: Option<u32>,
    latest: bool,
    display_name: String,
    relation: String,
    props: Option<&ModelProperties>,
) -> Result<ModelNode> {
    let (config, body) =
        template::extract_config(&source.raw_sql, Origin::Model(&display_name))?;
    let depends_on = template::find_refs(&body);
    Ok(ModelNode {
        name,
        version,
        latest,
        display_name,
        relation,
        raw_sql: body,
        materialized: config.materialized,
        access: props.and_then(|p| p.access).unwrap_or(Access::Protected),
        group: props.and_then(|p| p.group.clone()),
        depends_on,
    })
}
