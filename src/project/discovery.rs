use crate::project::config::Project;
use crate::project::types::FunctionDescriptor;
use crate::{HarnessError, Result};

/// 函数选择方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// 测试项目中的全部函数
    All,
    /// 按路径选择，路径也可以是目录前缀
    Paths(Vec<String>),
}

impl Selection {
    /// 由 CLI 参数构造；--all 优先于路径
    pub fn from_args(all: bool, paths: Vec<String>) -> Self {
        if all { Selection::All } else { Selection::Paths(paths) }
    }
}

/// 按选择解析函数列表，保持 manifest 顺序
///
/// 结果为空时返回 `NoFunctions`。
pub fn discover(project: &Project, selection: &Selection) -> Result<Vec<FunctionDescriptor>> {
    let all = project.functions()?;

    let selected: Vec<FunctionDescriptor> = match selection {
        Selection::All => all,
        Selection::Paths(paths) => {
            let paths: Vec<&str> = paths.iter().map(|p| p.trim_matches('/')).collect();
            for path in &paths {
                if !all.iter().any(|f| matches_path(&f.identifier, path)) {
                    tracing::warn!(path = %path, "No function matches path");
                }
            }
            all.into_iter()
                .filter(|f| paths.iter().any(|p| matches_path(&f.identifier, p)))
                .collect()
        }
    };

    if selected.is_empty() {
        return Err(HarnessError::NoFunctions);
    }

    tracing::debug!(count = selected.len(), "Resolved functions");
    Ok(selected)
}

fn matches_path(identifier: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    identifier == path
        || identifier
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
}
