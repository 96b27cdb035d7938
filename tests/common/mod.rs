//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use kiln::core::tree::ConfigNode;

/// Test project context
///
/// A temporary directory holding build descriptions and generated files.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a project holding one build description
    pub fn with_document(name: &str, content: &str) -> Self {
        let project = Self::new();
        project.create_file(name, content);
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Read a generated graph as JSON
    pub fn read_graph(&self, name: &str) -> serde_json::Value {
        serde_json::from_str(&self.read_file(name)).expect("Graph is not valid JSON")
    }

    /// Run the kiln binary inside the project
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_kiln"))
            .current_dir(self.path())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute kiln")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a YAML document into a tree
pub fn yaml(doc: &str) -> ConfigNode {
    kiln::infra::loader::parse_document(
        doc,
        kiln::infra::loader::DocumentFormat::Yaml,
        Path::new("test.yaml"),
    )
    .expect("Invalid test document")
}

/// Ids of a JSON graph's targets
pub fn target_ids(graph: &serde_json::Value) -> Vec<String> {
    graph["targets"]
        .as_array()
        .expect("targets must be a list")
        .iter()
        .map(|t| t["id"].as_str().expect("id must be a string").to_string())
        .collect()
}

/// Sample Xen-based build description with a MACHINE parameter
pub const SAMPLE_BUILD: &str = r#"
desc: "Xen-troops development setup for %{MACHINE}"
min_ver: "0.3"

variables:
  MACHINE: "unset"
  YOCTOS_WORK_DIR: "yocto"
  DOM0_BUILD_DIR: "build-dom0"
  DOMD_BUILD_DIR: "build-domd"
  XT_DOMD_DTB_NAME: "%{MACHINE}.dtb"

common_data:
  common_conf: &COMMON_CONF
    - [SSTATE_DIR, "${TOPDIR}/../../../common_data/sstate"]
    - [DL_DIR, "${TOPDIR}/../../../common_data/downloads"]

components:
  dom0:
    build_dir: "%{YOCTOS_WORK_DIR}"
    default: true
    sources:
      - type: git
        url: "https://git.yoctoproject.org/poky"
        rev: kirkstone
      - type: git
        url: "https://github.com/xen-troops/meta-xt-prod-devel.git"
        rev: master
    builder:
      type: yocto
      work_dir: "%{DOM0_BUILD_DIR}"
      conf: *COMMON_CONF
      build_target: core-image-thin-initramfs
      layers:
        - "../meta-xt-prod-devel/layers/meta-xt-dom0"
      additional_deps:
        - "%{DOMD_BUILD_DIR}/tmp/deploy/images/%{MACHINE}/Image"
      target_images:
        - "tmp/deploy/images/generic-armv8-xt/core-image-thin-initramfs-generic-armv8-xt.cpio.gz"
  domd:
    build_dir: "%{YOCTOS_WORK_DIR}"
    sources:
      - type: git
        url: "https://git.yoctoproject.org/poky"
        rev: kirkstone
    builder:
      type: yocto
      work_dir: "%{DOMD_BUILD_DIR}"
      conf: *COMMON_CONF
      build_target: core-image-weston
      target_images:
        - "%{DOMD_BUILD_DIR}/tmp/deploy/images/%{MACHINE}/Image"
        - "%{DOMD_BUILD_DIR}/tmp/deploy/images/%{MACHINE}/%{XT_DOMD_DTB_NAME}"

images:
  full:
    desc: "Full SD-card image"
    type: gpt
    partitions:
      boot:
        type: ext4
        files:
          "Image": "%{DOMD_BUILD_DIR}/tmp/deploy/images/%{MACHINE}/Image"
          "xen.cfg": "local/xen.cfg"

parameters:
  MACHINE:
    desc: "Machine to build for"
    zc702-zynq7:
      default: true
      overrides:
        variables:
          MACHINE: "zc702-zynq7"
    zc706-zynq7:
      overrides:
        variables:
          MACHINE: "zc706-zynq7"
    qemu-zynq7:
      overrides:
        variables:
          MACHINE: "qemu-zynq7"
        components:
          domd:
            builder:
              conf:
                - [QEMU_EXTRA, "1"]
"#;
