//! Build graph synthesis
//!
//! Turns a resolved build description into targets and dependency edges:
//!
//! - `fetch-{name}` populates a component's sources
//! - `conf-{name}` prepares the build directory (builders with a conf stage)
//! - `{name}` runs the builder
//! - `image-{name}` assembles a disk image
//!
//! Cross-component edges come from `additional_deps` and image file lists
//! matching another component's `target_images`. The graph is a pure
//! function of the resolved tree and the regeneration command.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::config::defaults::IMAGE_SUFFIX;
use crate::core::component::{components_of, Component};
use crate::core::plugins::images::{images_of, ImageSpec};
use crate::core::plugins::{Capability, CommandDescription, Stage, StepContext};
use crate::core::resolver::DependencyGraph;
use crate::core::tree::ConfigNode;
use crate::error::{GraphError, PluginError};

/// Kind of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Fetch,
    Conf,
    Build,
    Image,
}

/// One node of the build graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    /// Unique, stable id
    pub id: String,
    pub kind: TargetKind,
    /// Component or image the target belongs to
    pub owner: String,
    /// Files the target produces
    pub outputs: Vec<String>,
    /// Ids of targets that must finish first
    pub deps: Vec<String>,
    /// Files read that no target produces
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Work to run, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandDescription>,
}

impl Target {
    fn new(id: String, kind: TargetKind, owner: &str) -> Self {
        Self {
            id,
            kind,
            owner: owner.to_string(),
            outputs: Vec::new(),
            deps: Vec::new(),
            inputs: Vec::new(),
            commands: Vec::new(),
        }
    }
}

/// How to re-run kiln when the document changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorRule {
    /// Build description the graph was generated from
    pub document: String,
    /// Command line that regenerates the graph
    pub argv: Vec<String>,
    /// File the graph is written to
    pub output: String,
}

/// Targets and edges handed to an external emitter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildGraph {
    /// Targets in document order
    pub targets: Vec<Target>,
    /// Ids of default top-level targets
    pub defaults: Vec<String>,
    /// Self-regeneration rule
    pub generator: GeneratorRule,
}

impl BuildGraph {
    /// Look up a target by id
    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Target ids ordered so that dependencies come first
    pub fn build_order(&self) -> Result<Vec<String>, GraphError> {
        let mut graph = DependencyGraph::new();
        for target in &self.targets {
            graph.add_component(&target.id, target.deps.clone());
        }
        graph.topological_sort()
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Id of a component's fetch target
pub fn fetch_target_id(component: &str) -> String {
    format!("fetch-{component}")
}

/// Id of a component's conf target
pub fn conf_target_id(component: &str) -> String {
    format!("conf-{component}")
}

/// Id of an image target
pub fn image_target_id(image: &str) -> String {
    format!("image-{image}")
}

/// Output path -> producing component
type OutputIndex = IndexMap<String, String>;

fn index_outputs(components: &[Component]) -> Result<OutputIndex, GraphError> {
    let mut index = OutputIndex::new();
    for component in components {
        for path in &component.builder.target_images {
            match index.get(path) {
                Some(first) if *first != component.name => {
                    return Err(GraphError::DuplicateOutputPath {
                        path: path.clone(),
                        first: first.clone(),
                        second: component.name.clone(),
                    })
                }
                Some(_) => {}
                None => {
                    index.insert(path.clone(), component.name.clone());
                }
            }
        }
    }
    Ok(index)
}

/// Clone directory -> component that checks it out first
type CheckoutOwners = IndexMap<String, String>;

/// Two sources cloning into one directory must agree on the revision
fn check_checkouts(components: &[Component]) -> Result<CheckoutOwners, PluginError> {
    let mut seen: IndexMap<String, (String, String, String)> = IndexMap::new();
    for component in components {
        for source in &component.sources {
            let Some(checkout) =
                source
                    .kind
                    .checkout(&source.spec, &component.build_dir, &source.path)?
            else {
                continue;
            };
            match seen.get(&checkout.dir) {
                Some((_, url, rev)) if *rev != checkout.rev => {
                    return Err(PluginError::ConflictingRevision {
                        url: url.clone(),
                        dir: checkout.dir,
                        first: rev.clone(),
                        second: checkout.rev,
                        path: source.path.key("rev"),
                    })
                }
                Some(_) => {}
                None => {
                    seen.insert(
                        checkout.dir,
                        (component.name.clone(), checkout.url, checkout.rev),
                    );
                }
            }
        }
    }
    Ok(seen
        .into_iter()
        .map(|(dir, (owner, _, _))| (dir, owner))
        .collect())
}

struct GraphAssembly {
    targets: Vec<Target>,
    ids: IndexSet<String>,
}

impl GraphAssembly {
    fn push(&mut self, target: Target) -> Result<(), GraphError> {
        if !self.ids.insert(target.id.clone()) {
            return Err(GraphError::DuplicateTarget { id: target.id });
        }
        self.targets.push(target);
        Ok(())
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn component_targets(
    component: &Component,
    index: &OutputIndex,
    checkouts: &CheckoutOwners,
) -> Result<(Vec<Target>, Vec<String>), GraphError> {
    let name = component.name.as_str();
    let ctx = StepContext {
        component: name,
        build_dir: &component.build_dir,
    };

    // A checkout is cloned once, by its first owner; later users wait for it
    let mut fetch = Target::new(fetch_target_id(name), TargetKind::Fetch, name);
    let mut cloned = IndexSet::new();
    for source in &component.sources {
        let checkout = source
            .kind
            .checkout(&source.spec, &component.build_dir, &source.path)?;
        if let Some(checkout) = checkout {
            let owner = checkouts.get(&checkout.dir).map_or(name, String::as_str);
            if owner != name {
                tracing::debug!("{name} reuses {} cloned by {owner}", checkout.dir);
                push_unique(&mut fetch.deps, fetch_target_id(owner));
                continue;
            }
            if !cloned.insert(checkout.dir) {
                continue;
            }
        }
        for output in source
            .kind
            .declared_outputs(&source.spec, &component.build_dir, &source.path)?
        {
            push_unique(&mut fetch.outputs, output);
        }
        fetch
            .commands
            .extend(source.kind.command_description(&source.spec, ctx, &source.path)?);
    }

    let builder = &component.builder;
    let steps = builder
        .kind
        .command_description(&builder.spec, ctx, &builder.path)?;

    let mut targets = Vec::with_capacity(3);
    let mut build = Target::new(name.to_string(), TargetKind::Build, name);
    build.outputs.clone_from(&builder.target_images);
    push_unique(&mut build.deps, fetch.id.clone());

    if builder.kind.has_conf_stage() {
        let mut conf = Target::new(conf_target_id(name), TargetKind::Conf, name);
        conf.deps.push(fetch.id.clone());
        for step in steps.iter().filter(|s| s.stage == Stage::Conf) {
            for output in &step.outputs {
                push_unique(&mut conf.outputs, output.clone());
            }
            conf.commands.push(step.clone());
        }
        push_unique(&mut build.deps, conf.id.clone());
        targets.push(fetch);
        targets.push(conf);
    } else {
        targets.push(fetch);
    }

    let mut cross = Vec::new();
    let deps_path = builder.path.key("additional_deps");
    for (i, path) in builder.additional_deps.iter().enumerate() {
        match index.get(path) {
            Some(producer) if producer == name => {}
            Some(producer) => {
                push_unique(&mut build.deps, producer.clone());
                push_unique(&mut cross, producer.clone());
            }
            None => {
                return Err(GraphError::UnresolvedDependency {
                    component: name.to_string(),
                    path: path.clone(),
                    location: deps_path.index(i),
                })
            }
        }
    }
    build.commands = steps
        .into_iter()
        .filter(|s| s.stage == Stage::Build)
        .collect();
    targets.push(build);

    Ok((targets, cross))
}

fn image_target(image: &ImageSpec, index: &OutputIndex) -> Target {
    let mut target = Target::new(image_target_id(&image.name), TargetKind::Image, &image.name);
    let output = format!("{}{IMAGE_SUFFIX}", image.name);
    let files = image.required_files();

    for file in &files {
        match index.get(file) {
            Some(producer) => push_unique(&mut target.deps, producer.clone()),
            None => target.inputs.push(file.clone()),
        }
    }
    if !target.inputs.is_empty() {
        tracing::debug!(
            "image '{}' reads {} file(s) no component produces",
            image.name,
            target.inputs.len()
        );
    }

    target.commands.push(
        CommandDescription::new(Stage::Image, "rouge_image", vec![output.clone()])
            .inputs(files)
            .var("image", &image.name),
    );
    target.outputs.push(output);
    target
}

/// Build the graph for a resolved tree
pub fn build_graph(root: &ConfigNode, generator: GeneratorRule) -> Result<BuildGraph, GraphError> {
    let components = components_of(root)?;
    let images = images_of(root)?;
    let checkouts = check_checkouts(&components)?;

    let index = index_outputs(&components)?;
    tracing::debug!("Indexed {} builder output(s)", index.len());

    let mut assembly = GraphAssembly {
        targets: Vec::new(),
        ids: IndexSet::new(),
    };
    let mut component_deps = DependencyGraph::new();

    for component in &components {
        let (targets, cross) = component_targets(component, &index, &checkouts)?;
        component_deps.add_component(&component.name, cross);
        for target in targets {
            assembly.push(target)?;
        }
    }

    let order = component_deps.topological_sort()?;
    tracing::debug!("Component order: {}", order.join(", "));

    let defaults = components
        .iter()
        .filter(|c| c.default)
        .map(|c| c.name.clone())
        .collect();

    for image in &images {
        assembly.push(image_target(image, &index))?;
    }

    Ok(BuildGraph {
        targets: assembly.targets,
        defaults,
        generator,
    })
}
