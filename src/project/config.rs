use crate::project::types::{FunctionDescriptor, Runtime, TestConfig};
use crate::{HarnessError, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// 项目 manifest（fntest.toml）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectManifest {
    #[serde(default)]
    pub project: ProjectInfo,

    #[serde(default)]
    pub stages: HashMap<String, StageConfig>,

    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,

    pub default_stage: Option<String>,
}

/// 一个部署阶段（如 dev、prod）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageConfig {
    pub region: Option<String>,

    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// manifest 中的 `[[functions]]` 条目
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionEntry {
    pub path: String,
    pub handler: String,

    #[serde(default)]
    pub runtime: Runtime,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_memory_size")]
    pub memory_size: u32,

    pub test: Option<TestConfig>,
}

fn default_timeout() -> u64 {
    FunctionDescriptor::DEFAULT_TIMEOUT_SECS
}

fn default_memory_size() -> u32 {
    FunctionDescriptor::DEFAULT_MEMORY_SIZE
}

/// 选中的阶段，变量已展开
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub region: String,
    pub variables: HashMap<String, String>,
}

impl Stage {
    pub const DEFAULT_REGION: &'static str = "us-east-1";
}

/// 加载完成的项目
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub manifest: ProjectManifest,
    pub stage: Option<Stage>,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.manifest.project.name
    }

    /// 按 manifest 顺序生成所有函数描述符
    pub fn functions(&self) -> Result<Vec<FunctionDescriptor>> {
        self.manifest
            .functions
            .iter()
            .map(|entry| self.describe(entry))
            .collect()
    }

    fn describe(&self, entry: &FunctionEntry) -> Result<FunctionDescriptor> {
        let mut descriptor = FunctionDescriptor::new(entry.path.clone(), &entry.handler)?
            .in_directory(self.root.join(&entry.path))
            .with_timeout(Duration::from_secs(entry.timeout));
        descriptor.runtime = entry.runtime.clone();
        descriptor.memory_size = entry.memory_size;
        descriptor.test = entry.test.clone();
        Ok(descriptor)
    }
}

/// 项目加载器
pub struct ProjectLoader;

impl ProjectLoader {
    /// manifest 文件名
    pub const MANIFEST_FILE: &'static str = "fntest.toml";

    /// 从指定路径加载 manifest
    pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<ProjectManifest> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// 从 start 开始向上查找 manifest
    pub fn find_manifest(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let manifest_path = current.join(Self::MANIFEST_FILE);
            if manifest_path.is_file() {
                return Some(manifest_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// 查找并加载项目，同时选定阶段
    pub fn find_from(start: &Path, stage: Option<&str>) -> Result<Project> {
        let manifest_path = Self::find_manifest(start)
            .ok_or_else(|| HarnessError::ManifestNotFound(start.to_path_buf()))?;
        let manifest = Self::load_manifest(&manifest_path)?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        tracing::debug!(manifest = %manifest_path.display(), "Loaded project manifest");
        Self::assemble(root, manifest, stage)
    }

    /// 用已解析的 manifest 构建项目
    pub fn assemble(root: PathBuf, manifest: ProjectManifest, stage: Option<&str>) -> Result<Project> {
        let stage = Self::select_stage(&manifest, stage)?;
        Ok(Project {
            root,
            manifest,
            stage,
        })
    }

    /// 阶段选择顺序：显式指定 > default_stage > 唯一阶段
    fn select_stage(manifest: &ProjectManifest, requested: Option<&str>) -> Result<Option<Stage>> {
        let name = match requested.or(manifest.project.default_stage.as_deref()) {
            Some(name) => name.to_string(),
            None => match manifest.stages.len() {
                0 => return Ok(None),
                1 => manifest.stages.keys().next().cloned().unwrap_or_default(),
                _ => {
                    return Err(HarnessError::Config(
                        "Project defines several stages, choose one with --stage".to_string(),
                    ));
                }
            },
        };

        let config = manifest
            .stages
            .get(&name)
            .ok_or_else(|| HarnessError::Config(format!("Stage '{}' not found in project", name)))?;

        let variables = config
            .variables
            .iter()
            .map(|(key, value)| (key.clone(), resolve_env_vars(value)))
            .collect();

        Ok(Some(Stage {
            name,
            region: config
                .region
                .clone()
                .unwrap_or_else(|| Stage::DEFAULT_REGION.to_string()),
            variables,
        }))
    }
}

/// 替换文本中的系统环境变量 ${VAR}，不存在的保持原样
pub fn resolve_env_vars(text: &str) -> String {
    static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = ENV_REGEX
        .get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid"));

    re.replace_all(text, |caps: &Captures| {
        let env_name = &caps[1];
        std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .to_string()
}
