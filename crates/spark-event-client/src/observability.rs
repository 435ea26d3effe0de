//! 日志订阅器安装入口。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主只需调用一次 [`install_tracing`]，即可看到客户端 span（`spark_event.send` 等）与转码日志；
//! - **逻辑（How）**：组装 `fmt + EnvFilter` 并设置为全局 Subscriber；环境变量 `RUST_LOG` 优先于传入的过滤器；
//! - **契约（What）**：重复调用返回 [`InstallError::AlreadyInstalled`]；外部已设置 Subscriber 时返回
//!   [`InstallError::SubscriberAlreadySet`]。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

static INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("tracing subscriber already installed by spark-event-client")]
    AlreadyInstalled,

    #[error("a global tracing subscriber has already been set")]
    SubscriberAlreadySet,

    #[error("invalid log filter `{filter}`: {detail}")]
    Filter { filter: String, detail: String },

    #[error(transparent)]
    SetGlobalSubscriber(#[from] dispatcher::SetGlobalDefaultError),
}

/// 安装全局日志订阅器；`filter` 通常来自 `ClientConfig::logging.filter`。
pub fn install_tracing(filter: &str) -> Result<(), InstallError> {
    if INSTALLED.get().is_some() {
        return Err(InstallError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(InstallError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter(filter)?)
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;
    INSTALLED
        .set(())
        .map_err(|_| InstallError::AlreadyInstalled)
}

fn build_env_filter(filter: &str) -> Result<EnvFilter, InstallError> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }
    EnvFilter::try_new(filter).map_err(|err| InstallError::Filter {
        filter: filter.to_owned(),
        detail: err.to_string(),
    })
}
