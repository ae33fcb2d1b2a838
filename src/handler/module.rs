use crate::handler::completion::HandlerFuture;
use crate::handler::context::{Context, HandlerError, HandlerResult};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// handler 同步返回的内容
pub enum Returned {
    /// 完成信号稍后通过 context 或 callback 到达
    Deferred,
    /// promise 风格：future 的结果就是完成信号
    Promise(HandlerFuture),
}

impl Returned {
    pub fn deferred() -> Self {
        Returned::Deferred
    }

    pub fn promise<F>(future: F) -> Self
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Returned::Promise(Box::pin(future))
    }
}

/// 被测函数的入口
///
/// 同步返回 `Err` 或 panic 都视为同步失败。
pub trait Handler: Send + Sync {
    fn call(&self, event: Value, ctx: Context) -> Result<Returned, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(Value, Context) -> Result<Returned, HandlerError> + Send + Sync,
{
    fn call(&self, event: Value, ctx: Context) -> Result<Returned, HandlerError> {
        self(event, ctx)
    }
}

/// 一个 handler 模块：按名字导出的入口集合
#[derive(Default, Clone)]
pub struct HandlerModule {
    exports: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(mut self, symbol: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.exports.insert(symbol.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, symbol: &str) -> Option<Arc<dyn Handler>> {
        self.exports.get(symbol).cloned()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    #[error("Failed to load module '{module}': {message}")]
    Init { module: String, message: String },
}

/// 按模块路径加载 handler 模块
pub trait ModuleLoader: Send + Sync {
    fn load(&self, module: &str) -> Result<Arc<HandlerModule>, LoadError>;
}

type ModuleFactory = Box<dyn Fn() -> Result<HandlerModule, String> + Send + Sync>;

/// 进程内的模块注册表
///
/// 模块在第一次加载时初始化并缓存，初始化失败不缓存。
#[derive(Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
    cache: Mutex<HashMap<String, Arc<HandlerModule>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个已经构建好的模块
    pub fn register(&mut self, path: &str, module: HandlerModule) -> &mut Self {
        self.register_with(path, move || Ok(module.clone()))
    }

    /// 注册一个延迟初始化的模块，初始化可以失败
    pub fn register_with<F>(&mut self, path: &str, init: F) -> &mut Self
    where
        F: Fn() -> Result<HandlerModule, String> + Send + Sync + 'static,
    {
        self.factories.insert(normalize(path), Box::new(init));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.factories.contains_key(&normalize(path))
    }
}

impl ModuleRegistry {
    fn cached(&self, key: &str) -> Option<Arc<HandlerModule>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&self, module: &str) -> Result<Arc<HandlerModule>, LoadError> {
        let key = normalize(module);

        if let Some(loaded) = self.cached(&key) {
            return Ok(loaded);
        }

        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| LoadError::NotFound(module.to_string()))?;

        // 初始化时不持有缓存锁，模块可以在初始化里加载其他模块
        let loaded = Arc::new(factory().map_err(|message| LoadError::Init {
            module: module.to_string(),
            message,
        })?);

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let loaded = Arc::clone(cache.entry(key.clone()).or_insert(loaded));
        tracing::debug!(module = %key, "Loaded handler module");
        Ok(loaded)
    }
}

/// "./users\\create/index" -> "users/create/index"
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").trim_matches('/').to_string()
}
