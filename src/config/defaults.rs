//! Default configuration values

/// Default graph file written next to the build description
pub const GRAPH_FILENAME: &str = "build.graph.json";

/// Directory holding stamp files for targets without real outputs
pub const STAMP_DIR: &str = ".stamps";

/// Prefix of make-style depfiles (`.kiln_{component}.d`)
pub const DEPFILE_PREFIX: &str = ".kiln_";

/// Suffix of assembled disk images
pub const IMAGE_SUFFIX: &str = ".img";

/// Revision checked out when a git source names none
pub const DEFAULT_GIT_REV: &str = "master";

/// Yocto build directory, relative to the component's build_dir
pub const DEFAULT_YOCTO_WORK_DIR: &str = "build";

/// Zephyr build directory, relative to the component's build_dir
pub const DEFAULT_ZEPHYR_WORK_DIR: &str = "zephyr/build";

/// Android kernel build script, relative to the component's build_dir
pub const DEFAULT_ANDROID_KERNEL_SCRIPT: &str = "build/build.sh";

/// Archive formats the unpack fetcher understands
pub const ARCHIVE_TYPES: &[&str] = &["tar", "zip"];
