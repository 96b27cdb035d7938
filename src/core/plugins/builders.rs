//! Builder variants

use std::fmt;

use crate::config::defaults::{
    DEFAULT_ANDROID_KERNEL_SCRIPT, DEFAULT_YOCTO_WORK_DIR, DEFAULT_ZEPHYR_WORK_DIR, DEPFILE_PREFIX,
};
use crate::core::plugins::{
    join_path, stamp_name, Capability, CommandDescription, Fields, Stage, StepContext,
};
use crate::core::tree::{ConfigNode, Mapping, NodePath};
use crate::error::PluginError;

/// Known builder types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderKind {
    /// Yocto/poky image build via bitbake
    Yocto,
    /// AOSP build via lunch and m
    Android,
    /// Android kernel build script
    AndroidKernel,
    /// Zephyr build via west
    Zephyr,
    /// Pack existing files into one archive
    Archive,
    /// Arbitrary user script
    CustomScript,
}

impl BuilderKind {
    /// All builder kinds in `--help-config` order
    pub const ALL: [Self; 6] = [
        Self::Yocto,
        Self::Android,
        Self::AndroidKernel,
        Self::Zephyr,
        Self::Archive,
        Self::CustomScript,
    ];

    /// Look up a builder by its `type` discriminator
    pub fn from_type(kind: &str, path: &NodePath) -> Result<Self, PluginError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == kind)
            .ok_or_else(|| PluginError::UnknownBuilderType {
                kind: kind.to_string(),
                path: path.key("type"),
            })
    }

    /// Discriminator as written in documents
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yocto => "yocto",
            Self::Android => "android",
            Self::AndroidKernel => "android_kernel",
            Self::Zephyr => "zephyr",
            Self::Archive => "archive",
            Self::CustomScript => "custom_script",
        }
    }

    /// Whether the builder has a separate configuration stage (`conf-{name}`)
    pub fn has_conf_stage(self) -> bool {
        matches!(self, Self::Yocto)
    }

    /// Artifacts the builder produces
    pub fn target_images(spec: &Mapping, path: &NodePath) -> Result<Vec<String>, PluginError> {
        Fields::new(spec, path).required_list("target_images")
    }

    /// Artifacts produced by other components that this builder consumes
    pub fn additional_deps(spec: &Mapping, path: &NodePath) -> Result<Vec<String>, PluginError> {
        Fields::new(spec, path).text_list("additional_deps")
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `local.conf` assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfEntry {
    pub key: String,
    pub value: String,
}

fn conf_pair(node: &ConfigNode, path: &NodePath) -> Result<ConfEntry, PluginError> {
    let invalid = || PluginError::InvalidField {
        field: "conf".to_string(),
        expected: "a [key, value] pair".to_string(),
        path: path.clone(),
    };
    match node.as_sequence() {
        Some([ConfigNode::Scalar(k), ConfigNode::Scalar(v)]) => Ok(ConfEntry {
            key: k.to_text().ok_or_else(invalid)?,
            value: v.to_text().unwrap_or_default(),
        }),
        _ => Err(invalid()),
    }
}

/// Read `conf`, flattening nested lists of pairs
///
/// YAML anchors such as `- *common_conf` put a whole list of pairs where a
/// single pair is expected; those inner lists are spliced in place.
pub fn yocto_conf(spec: &Mapping, path: &NodePath) -> Result<Vec<ConfEntry>, PluginError> {
    let conf_path = path.key("conf");
    let items = match spec.get("conf") {
        None => return Ok(Vec::new()),
        Some(node) => node.as_sequence().ok_or_else(|| PluginError::InvalidField {
            field: "conf".to_string(),
            expected: "a list of [key, value] pairs".to_string(),
            path: conf_path.clone(),
        })?,
    };

    let mut entries = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_path = conf_path.index(i);
        match item.as_sequence() {
            Some(inner) if matches!(inner.first(), Some(ConfigNode::Sequence(_))) => {
                for (j, pair) in inner.iter().enumerate() {
                    entries.push(conf_pair(pair, &item_path.index(j))?);
                }
            }
            _ => entries.push(conf_pair(item, &item_path)?),
        }
    }
    Ok(entries)
}

/// `EXTERNALSRC` assignments from the `external_src` mapping
fn external_src(fields: &Fields<'_>) -> Result<Vec<ConfEntry>, PluginError> {
    let Some(mapping) = fields.mapping("external_src")? else {
        return Ok(Vec::new());
    };
    mapping
        .iter()
        .map(|(recipe, value)| {
            let location = match value {
                ConfigNode::Scalar(s) => s.to_text(),
                ConfigNode::Sequence(parts) => parts
                    .iter()
                    .map(|p| p.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(|parts| parts.join("/")),
                ConfigNode::Mapping(_) => None,
            };
            location
                .map(|value| ConfEntry {
                    key: format!("EXTERNALSRC_pn-{recipe}"),
                    value,
                })
                .ok_or_else(|| PluginError::InvalidField {
                    field: recipe.clone(),
                    expected: "a path or a list of path parts".to_string(),
                    path: fields.path().key("external_src"),
                })
        })
        .collect()
}

fn validate_common(fields: &Fields<'_>) -> Result<(), PluginError> {
    fields.required_list("target_images")?;
    fields.text_list("additional_deps").map(|_| ())
}

impl Capability for BuilderKind {
    fn validate(&self, spec: &Mapping, path: &NodePath) -> Result<(), PluginError> {
        let fields = Fields::new(spec, path);
        validate_common(&fields)?;
        match self {
            Self::Yocto => {
                fields.required_text("build_target")?;
                fields.text("work_dir")?;
                fields.text_list("layers")?;
                yocto_conf(spec, path)?;
                external_src(&fields).map(|_| ())
            }
            Self::Android => {
                fields.required_text("lunch-target")?;
                fields.text_list("env").map(|_| ())
            }
            Self::AndroidKernel => {
                fields.text("build_script")?;
                fields.text_list("env").map(|_| ())
            }
            Self::Zephyr => {
                fields.required_text("board")?;
                fields.required_text("target")?;
                fields.text("work_dir")?;
                for list in ["env", "shields", "vars", "snippets"] {
                    fields.text_list(list)?;
                }
                Ok(())
            }
            Self::Archive => {
                let targets = fields.required_list("target_images")?;
                if targets.len() != 1 {
                    return Err(PluginError::InvalidField {
                        field: "target_images".to_string(),
                        expected: "exactly one archive path".to_string(),
                        path: path.key("target_images"),
                    });
                }
                fields.required_list("items")?;
                fields.text("base_dir").map(|_| ())
            }
            Self::CustomScript => {
                fields.required_text("script")?;
                fields.text_or_list("args")?;
                fields.text("work_dir").map(|_| ())
            }
        }
    }

    /// Builders produce exactly their `target_images`
    fn declared_outputs(
        &self,
        spec: &Mapping,
        _build_dir: &str,
        path: &NodePath,
    ) -> Result<Vec<String>, PluginError> {
        Self::target_images(spec, path)
    }

    fn command_description(
        &self,
        spec: &Mapping,
        ctx: StepContext<'_>,
        path: &NodePath,
    ) -> Result<Vec<CommandDescription>, PluginError> {
        let fields = Fields::new(spec, path);
        let build_dir = ctx.build_dir;
        let outputs = Self::target_images(spec, path)?;

        Ok(match self {
            Self::Yocto => {
                let work_dir = fields.text_or("work_dir", DEFAULT_YOCTO_WORK_DIR)?;
                let env_target = join_path(&join_path(build_dir, &work_dir), "conf");
                let layers_stamp = stamp_name(&[build_dir, &work_dir, "yocto", "layers"]);
                let local_conf_stamp = stamp_name(&[build_dir, &work_dir, "yocto", "local_conf"]);

                let mut conf = yocto_conf(spec, path)?;
                conf.extend(external_src(&fields)?);
                let conf_lines: Vec<String> = conf
                    .iter()
                    .map(|entry| format!("{} = \"{}\"", entry.key, entry.value))
                    .collect();

                vec![
                    CommandDescription::new(Stage::Conf, "yocto_init_env", vec![env_target.clone()])
                        .var("yocto_dir", build_dir)
                        .var("work_dir", &work_dir),
                    CommandDescription::new(Stage::Conf, "yocto_add_layers", vec![layers_stamp.clone()])
                        .input(env_target)
                        .var("yocto_dir", build_dir)
                        .var("work_dir", &work_dir)
                        .var("layers", fields.text_list("layers")?.join(" "))
                        .console(),
                    CommandDescription::new(
                        Stage::Conf,
                        "yocto_update_conf",
                        vec![local_conf_stamp.clone()],
                    )
                    .input(layers_stamp)
                    .var("yocto_dir", build_dir)
                    .var("work_dir", &work_dir)
                    .var("conf", conf_lines.join("\n")),
                    CommandDescription::new(Stage::Build, "yocto_build", outputs)
                        .input(local_conf_stamp)
                        .var("yocto_dir", build_dir)
                        .var("work_dir", work_dir)
                        .var("target", fields.required_text("build_target")?)
                        .var("name", ctx.component)
                        .console(),
                ]
            }
            Self::Android => vec![CommandDescription::new(Stage::Build, "android_build", outputs)
                .var("build_dir", build_dir)
                .var("env", fields.text_list("env")?.join(" "))
                .var("lunch_target", fields.required_text("lunch-target")?)
                .console()],
            Self::AndroidKernel => vec![CommandDescription::new(
                Stage::Build,
                "android_kernel_build",
                outputs,
            )
            .var("build_dir", build_dir)
            .var("env", fields.text_list("env")?.join(" "))
            .var(
                "build_script",
                fields.text_or("build_script", DEFAULT_ANDROID_KERNEL_SCRIPT)?,
            )
            .console()],
            Self::Zephyr => {
                let shields = fields.text_list("shields")?;
                let shields = if shields.is_empty() {
                    String::new()
                } else {
                    format!("-DSHIELD=\"{}\"", shields.join(" "))
                };
                let vars: Vec<String> = fields
                    .text_list("vars")?
                    .iter()
                    .map(|v| format!("-D{v}"))
                    .collect();
                let snippets: Vec<String> = fields
                    .text_list("snippets")?
                    .iter()
                    .map(|s| format!("-S {s}"))
                    .collect();

                vec![CommandDescription::new(Stage::Build, "zephyr_build", outputs)
                    .var("name", ctx.component)
                    .var("build_dir", build_dir)
                    .var("board", fields.required_text("board")?)
                    .var("target", fields.required_text("target")?)
                    .var("work_dir", fields.text_or("work_dir", DEFAULT_ZEPHYR_WORK_DIR)?)
                    .var("shields", shields)
                    .var("vars", vars.join(" "))
                    .var("snippets", snippets.join(" "))
                    .var("env", fields.text_list("env")?.join(" "))
                    .var("depfile", format!("{DEPFILE_PREFIX}{}.d", ctx.component))
                    .console()]
            }
            Self::Archive => vec![CommandDescription::new(Stage::Build, "archive", outputs)
                .inputs(fields.required_list("items")?)
                .var("base_dir", fields.text_or("base_dir", ".")?)],
            Self::CustomScript => {
                let work_dir = match fields.text("work_dir")? {
                    Some(dir) => join_path(build_dir, &dir),
                    None => build_dir.to_string(),
                };
                vec![CommandDescription::new(Stage::Build, "custom_script", outputs)
                    .var("name", ctx.component)
                    .var("build_dir", build_dir)
                    .var("work_dir", work_dir)
                    .var("script", fields.required_text("script")?)
                    .var("args", fields.text_or_list("args")?.join(" "))
                    .console()]
            }
        })
    }
}
