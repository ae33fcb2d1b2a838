use crate::Result;
use crate::project::types::FunctionDescriptor;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;

/// 读取函数的测试事件
///
/// 文件不存在时返回空对象 `{}`，不算错误。
pub fn load_event(descriptor: &FunctionDescriptor) -> Result<Value> {
    let path = descriptor.event_path();

    match fs::read_to_string(&path) {
        Ok(content) => {
            tracing::debug!(path = %path.display(), "Loaded event file");
            Ok(serde_json::from_str(&content)?)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Value::Object(Default::default())),
        Err(e) => Err(e.into()),
    }
}
