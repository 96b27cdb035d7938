//! Source fetcher variants

use std::fmt;

use crate::config::defaults::{ARCHIVE_TYPES, DEFAULT_GIT_REV};
use crate::core::plugins::{
    join_path, stamp_name, Capability, CommandDescription, Fields, Stage, StepContext,
};
use crate::core::tree::{Mapping, NodePath};
use crate::error::PluginError;

/// Known fetcher types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetcherKind {
    /// Plain git clone and checkout
    Git,
    /// Android `repo` workspace
    Repo,
    /// Zephyr `west` workspace
    West,
    /// Local tar or zip archive
    Unpack,
    /// Single file downloaded over HTTP(S)
    Http,
    /// Nothing to fetch
    Null,
}

impl FetcherKind {
    /// All fetcher kinds in `--help-config` order
    pub const ALL: [Self; 6] = [
        Self::Git,
        Self::Repo,
        Self::West,
        Self::Unpack,
        Self::Http,
        Self::Null,
    ];

    /// Look up a fetcher by its `type` discriminator
    pub fn from_type(kind: &str, path: &NodePath) -> Result<Self, PluginError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == kind)
            .ok_or_else(|| PluginError::UnknownFetcherType {
                kind: kind.to_string(),
                path: path.key("type"),
            })
    }

    /// Discriminator as written in documents
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Repo => "repo",
            Self::West => "west",
            Self::Unpack => "unpack",
            Self::Http => "http",
            Self::Null => "null",
        }
    }

    /// Clone directory, URL and revision of a git source
    ///
    /// Two sources cloning into the same directory must agree on the revision.
    pub fn checkout(
        self,
        spec: &Mapping,
        build_dir: &str,
        path: &NodePath,
    ) -> Result<Option<GitCheckout>, PluginError> {
        if self != Self::Git {
            return Ok(None);
        }
        let git = GitSource::read(&Fields::new(spec, path), build_dir)?;
        Ok(Some(GitCheckout {
            dir: git.dir,
            url: git.url,
            rev: git.rev,
        }))
    }
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a git source lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCheckout {
    pub dir: String,
    pub url: String,
    pub rev: String,
}

/// Directory name a clone of `url` gets when `dir` is not given
fn guess_dirname(url: &str) -> &str {
    let url = url.strip_suffix(".git").unwrap_or(url);
    let url = url.strip_suffix('/').unwrap_or(url);
    url.rsplit('/').next().unwrap_or(url)
}

/// File name a download of `url` gets when `filename` is not given
fn guess_filename(url: &str) -> Option<&str> {
    if url.ends_with('/') {
        return None;
    }
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

struct GitSource {
    url: String,
    dir: String,
    rev: String,
    depth: Option<i64>,
    submodules: bool,
}

impl GitSource {
    fn read(fields: &Fields<'_>, build_dir: &str) -> Result<Self, PluginError> {
        let url = fields.required_text("url")?;
        let dirname = match fields.text("dir")? {
            Some(dir) => dir,
            None => guess_dirname(&url).to_string(),
        };
        Ok(Self {
            dir: join_path(build_dir, &dirname),
            rev: fields.text_or("rev", DEFAULT_GIT_REV)?,
            depth: fields.int("depth")?.filter(|d| *d > 0),
            submodules: fields.bool_or("submodules", false)?,
            url,
        })
    }

    fn clone_opts(&self) -> Vec<String> {
        let mut opts = Vec::new();
        if let Some(depth) = self.depth {
            opts.push(format!("--depth {depth}"));
        }
        if self.submodules {
            opts.push("--recurse-submodules".to_string());
            if self.depth.is_some() {
                opts.push("--shallow-submodules".to_string());
            }
        }
        // Shallow and submodule clones fetch the requested revision only
        if self.depth.is_some() || self.submodules {
            opts.push(format!("--branch {}", self.rev));
        } else {
            opts.push("--no-checkout".to_string());
        }
        opts
    }
}

fn http_output(fields: &Fields<'_>, build_dir: &str) -> Result<String, PluginError> {
    let url = fields.required_text("url")?;
    let dir = join_path(build_dir, &fields.text_or("dir", ".")?);
    let filename = match fields.text("filename")?.filter(|f| !f.is_empty()) {
        Some(name) => name,
        None => guess_filename(&url)
            .ok_or_else(|| PluginError::MissingField {
                field: "filename".to_string(),
                path: fields.path().clone(),
            })?
            .to_string(),
    };
    Ok(join_path(&dir, &filename))
}

fn archive_type(fields: &Fields<'_>) -> Result<String, PluginError> {
    let kind = fields.required_text("archive_type")?;
    if ARCHIVE_TYPES.contains(&kind.as_str()) {
        Ok(kind)
    } else {
        Err(PluginError::InvalidField {
            field: "archive_type".to_string(),
            expected: format!("one of: {}", ARCHIVE_TYPES.join(", ")),
            path: fields.path().key("archive_type"),
        })
    }
}

impl Capability for FetcherKind {
    fn validate(&self, spec: &Mapping, path: &NodePath) -> Result<(), PluginError> {
        let fields = Fields::new(spec, path);
        match self {
            Self::Git => GitSource::read(&fields, "").map(|_| ()),
            Self::Repo => {
                fields.required_text("url")?;
                for field in ["dir", "manifest", "rev", "groups"] {
                    fields.text(field)?;
                }
                fields.int("depth").map(|_| ())
            }
            Self::West => {
                for field in ["url", "rev", "file"] {
                    fields.text(field)?;
                }
                Ok(())
            }
            Self::Unpack => {
                fields.required_text("file")?;
                archive_type(&fields)?;
                fields.text("dir").map(|_| ())
            }
            Self::Http => http_output(&fields, "").map(|_| ()),
            Self::Null => Ok(()),
        }
    }

    fn declared_outputs(
        &self,
        spec: &Mapping,
        build_dir: &str,
        path: &NodePath,
    ) -> Result<Vec<String>, PluginError> {
        let fields = Fields::new(spec, path);
        Ok(match self {
            Self::Git => vec![GitSource::read(&fields, build_dir)?.dir],
            Self::Repo => {
                let dir = join_path(build_dir, &fields.text_or("dir", ".")?);
                vec![join_path(&dir, ".repo")]
            }
            Self::West => vec![join_path(build_dir, ".west")],
            Self::Unpack => vec![join_path(build_dir, &fields.text_or("dir", ".")?)],
            Self::Http => vec![http_output(&fields, build_dir)?],
            Self::Null => Vec::new(),
        })
    }

    fn command_description(
        &self,
        spec: &Mapping,
        ctx: StepContext<'_>,
        path: &NodePath,
    ) -> Result<Vec<CommandDescription>, PluginError> {
        let fields = Fields::new(spec, path);
        let build_dir = ctx.build_dir;

        Ok(match self {
            Self::Git => {
                let git = GitSource::read(&fields, build_dir)?;
                let clone_stamp = stamp_name(&[build_dir, &git.dir, &git.url, "clone"]);
                let checkout_stamp = stamp_name(&[build_dir, &git.dir, &git.url, "checkout"]);
                let checkout_opts = if git.submodules {
                    "--recurse-submodules"
                } else {
                    ""
                };
                vec![
                    CommandDescription::new(
                        Stage::Fetch,
                        "git_clone",
                        vec![git.dir.clone(), clone_stamp.clone()],
                    )
                    .var("git_url", &git.url)
                    .var("git_dir", &git.dir)
                    .var("git_clone_opts", git.clone_opts().join(" ")),
                    CommandDescription::new(Stage::Fetch, "git_checkout", vec![checkout_stamp])
                        .input(clone_stamp)
                        .var("git_dir", &git.dir)
                        .var("git_rev", &git.rev)
                        .var("git_checkout_opts", checkout_opts),
                ]
            }
            Self::Repo => {
                let url = fields.required_text("url")?;
                let repo_dir = join_path(build_dir, &fields.text_or("dir", ".")?);
                let init_target = join_path(&repo_dir, ".repo");
                let sync_stamp = stamp_name(&[build_dir, &url, "sync"]);

                let mut repo_args = Vec::new();
                if let Some(manifest) = fields.text("manifest")? {
                    repo_args.push(format!("-m {manifest}"));
                }
                if let Some(rev) = fields.text("rev")? {
                    repo_args.push(format!("-b {rev}"));
                }
                if let Some(depth) = fields.int("depth")? {
                    repo_args.push(format!("--depth={depth}"));
                }
                if let Some(groups) = fields.text("groups")? {
                    repo_args.push(format!("-g {groups}"));
                }

                vec![
                    CommandDescription::new(Stage::Fetch, "repo_init", vec![init_target.clone()])
                        .var("repo_dir", &repo_dir)
                        .var("url", url)
                        .var("repo_args", repo_args.join(" ")),
                    CommandDescription::new(Stage::Fetch, "repo_sync", vec![sync_stamp])
                        .input(init_target)
                        .var("repo_dir", repo_dir),
                ]
            }
            Self::West => {
                let mut west_args = Vec::new();
                for (field, flag) in [("url", "-m"), ("rev", "--mr"), ("file", "--mf")] {
                    if let Some(value) = fields.text(field)?.filter(|v| !v.is_empty()) {
                        west_args.push(format!("{flag} {value}"));
                    }
                }
                let init_target = join_path(build_dir, ".west");
                let update_stamp = stamp_name(&[build_dir, "update"]);
                vec![
                    CommandDescription::new(Stage::Fetch, "west_init", vec![init_target.clone()])
                        .var("build_dir", build_dir)
                        .var("west_args", west_args.join(" ")),
                    CommandDescription::new(Stage::Fetch, "west_update", vec![update_stamp])
                        .input(init_target)
                        .var("build_dir", build_dir),
                ]
            }
            Self::Unpack => {
                let file = fields.required_text("file")?;
                let kind = archive_type(&fields)?;
                let out_dir = join_path(build_dir, &fields.text_or("dir", ".")?);
                vec![CommandDescription::new(
                    Stage::Fetch,
                    &format!("{kind}_unpack"),
                    vec![out_dir.clone()],
                )
                .input(file)
                .var("out_dir", out_dir)]
            }
            Self::Http => {
                let url = fields.required_text("url")?;
                let output = http_output(&fields, build_dir)?;
                vec![CommandDescription::new(Stage::Fetch, "curl_download", vec![output])
                    .var("url", url)]
            }
            Self::Null => Vec::new(),
        })
    }
}
