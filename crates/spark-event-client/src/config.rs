//! 客户端配置。
//!
//! # 设计背景（Why）
//! - 宿主通常以 TOML 文件声明默认编码偏好、补全钩子与日志过滤器，而不是在代码里逐项拼装；
//! - 配置只在构建客户端时读取一次，运行期不再变化。
//!
//! # 契约说明（What）
//! - 所有字段都有默认值，空文档即合法配置；未知字段视为错误，避免拼写错误被静默忽略；
//! - 字符串形式的枚举值（编码偏好、规范版本）在 [`ClientConfig::from_toml_str`] 中一次性校验。
//!
//! ```toml
//! encoding = "structured"
//! binary_versions = ["0.3", "1.0"]
//!
//! [defaults]
//! id = true
//! time = true
//!
//! [logging]
//! filter = "spark_event=debug,info"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use spark_event::{EncodingPreference, SpecVersion};

use crate::error::ClientError;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// `binary` / `structured` / `unspecified`。
    pub encoding: String,
    /// 拥有带版本线上编码的规范版本。
    pub binary_versions: Vec<String>,
    pub defaults: DefaultsConfig,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingPreference::Unspecified.as_str().to_owned(),
            binary_versions: vec![
                SpecVersion::V03.as_str().to_owned(),
                SpecVersion::V10.as_str().to_owned(),
            ],
            defaults: DefaultsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// 出站事件补全钩子开关。
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub id: bool,
    pub time: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl ClientConfig {
    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(text: &str) -> Result<Self, ClientError> {
        let config: ClientConfig =
            toml::from_str(text).map_err(|err| ClientError::config(err.to_string()))?;
        config.encoding_preference()?;
        config.spec_versions()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| ClientError::config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn encoding_preference(&self) -> Result<EncodingPreference, ClientError> {
        EncodingPreference::parse(&self.encoding)
            .ok_or_else(|| ClientError::config(format!("unknown encoding `{}`", self.encoding)))
    }

    pub fn spec_versions(&self) -> Result<Vec<SpecVersion>, ClientError> {
        self.binary_versions
            .iter()
            .map(|raw| {
                SpecVersion::parse(raw)
                    .ok_or_else(|| ClientError::config(format!("unknown spec version `{raw}`")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ClientConfig::from_toml_str("").expect("空配置");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(
            config.encoding_preference().expect("编码"),
            EncodingPreference::Unspecified
        );
        assert_eq!(
            config.spec_versions().expect("版本"),
            vec![SpecVersion::V03, SpecVersion::V10]
        );
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn full_document_is_parsed() {
        let config = ClientConfig::from_toml_str(
            r#"
            encoding = "structured"
            binary_versions = ["0.2", "1.0"]

            [defaults]
            id = true
            time = true

            [logging]
            filter = "spark_event=debug"
            "#,
        )
        .expect("完整配置");
        assert_eq!(
            config.encoding_preference().expect("编码"),
            EncodingPreference::Structured
        );
        assert_eq!(
            config.spec_versions().expect("版本"),
            vec![SpecVersion::V02, SpecVersion::V10]
        );
        assert!(config.defaults.id && config.defaults.time);
        assert_eq!(config.logging.filter, "spark_event=debug");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            r#"encoding = "morse""#,
            r#"binary_versions = ["9.9"]"#,
            r#"retries = 3"#,
        ] {
            let err = ClientConfig::from_toml_str(text).expect_err(text);
            assert_eq!(err.code(), "client.config");
        }
    }
}
