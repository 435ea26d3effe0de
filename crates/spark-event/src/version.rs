//! 规范版本标识与固定转换链。
//!
//! # 设计背景（Why）
//! - 事件信封协议先后发布了 v0.1、v0.2、v0.3、v0.4、v1.0 五个修订版，各版本的必填/可选属性与命名互不相同；
//! - 版本之间只允许沿固定链 `v0.1 ↔ v0.2 ↔ v0.3 ↔ v0.4 ↔ v1.0` 逐级转换，避免维护 O(n²) 的全量转换矩阵。
//!
//! # 契约说明（What）
//! - [`SpecVersion`] 为封闭枚举，`as_str` 返回线上传输的稳定字符串；
//! - [`SpecVersion::step_toward`] 返回朝目标版本前进一步的相邻版本，是 [`crate::EventContext::convert`] 的唯一驱动。

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// 已知的规范版本。
///
/// 枚举顺序即转换链顺序，`Ord` 推导依赖于此，新增版本只能追加在链尾。
/// 序列化形态与线上版本字符串一致。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecVersion {
    #[serde(rename = "0.1")]
    V01,
    #[serde(rename = "0.2")]
    V02,
    #[serde(rename = "0.3")]
    V03,
    #[serde(rename = "0.4")]
    V04,
    #[serde(rename = "1.0")]
    V10,
}

impl SpecVersion {
    /// 转换链上的全部版本，按链顺序排列。
    pub const ALL: [SpecVersion; 5] = [
        SpecVersion::V01,
        SpecVersion::V02,
        SpecVersion::V03,
        SpecVersion::V04,
        SpecVersion::V10,
    ];

    /// 返回线上传输使用的版本字符串。
    pub const fn as_str(self) -> &'static str {
        match self {
            SpecVersion::V01 => "0.1",
            SpecVersion::V02 => "0.2",
            SpecVersion::V03 => "0.3",
            SpecVersion::V04 => "0.4",
            SpecVersion::V10 => "1.0",
        }
    }

    /// 按版本字符串解析，未知版本返回 `None`。
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "0.1" => Some(SpecVersion::V01),
            "0.2" => Some(SpecVersion::V02),
            "0.3" => Some(SpecVersion::V03),
            "0.4" => Some(SpecVersion::V04),
            "1.0" => Some(SpecVersion::V10),
            _ => None,
        }
    }

    /// 链上的前驱版本。
    pub const fn previous(self) -> Option<Self> {
        match self {
            SpecVersion::V01 => None,
            SpecVersion::V02 => Some(SpecVersion::V01),
            SpecVersion::V03 => Some(SpecVersion::V02),
            SpecVersion::V04 => Some(SpecVersion::V03),
            SpecVersion::V10 => Some(SpecVersion::V04),
        }
    }

    /// 链上的后继版本。
    pub const fn next(self) -> Option<Self> {
        match self {
            SpecVersion::V01 => Some(SpecVersion::V02),
            SpecVersion::V02 => Some(SpecVersion::V03),
            SpecVersion::V03 => Some(SpecVersion::V04),
            SpecVersion::V04 => Some(SpecVersion::V10),
            SpecVersion::V10 => None,
        }
    }

    /// 朝 `target` 前进一步；已经到达时返回 `None`。
    pub fn step_toward(self, target: SpecVersion) -> Option<Self> {
        if self < target {
            self.next()
        } else if self > target {
            self.previous()
        } else {
            None
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecVersion {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecVersion::parse(s).ok_or_else(|| EventError::UnknownSpecVersion(s.to_owned()))
    }
}
