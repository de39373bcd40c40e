//! 容器统一错误类型
//!
//! 所有失败都是同步的、局部的，直接返回给触发操作的调用方，
//! 内部不做任何重试。

use thiserror::Error;

/// 容器与编译器共享的错误类型
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 名称无法解析，且自身也不是已注册的可构造类型
    #[error("Service not found: '{0}'")]
    NotFound(String),

    /// 描述符格式非法：构建目标无法确定、别名指向自身等
    #[error("Invalid specification for '{name}': {reason}")]
    InvalidSpecification { name: String, reason: String },

    /// 参数绑定用尽了全部优先级规则
    #[error("Unable to resolve parameter '{name}' declared at {declared_at}")]
    UnresolvedParameter {
        name: String,
        declared_type: Option<String>,
        declared_at: String,
    },

    /// 生命周期状态不允许该操作（已激活、未初始化等）
    #[error("State conflict for '{name}': {reason}")]
    StateConflict { name: String, reason: String },

    /// 解析过程中再次请求了正在解析的名称
    #[error("Cyclic dependency detected while resolving '{0}'")]
    CyclicDependency(String),

    /// 目标无法解析为具体的、可实例化的定义
    #[error("Target is not introspectable: {0}")]
    NotIntrospectable(String),

    /// 用户提供的工厂或方法在执行时失败
    #[error("Failed to create service '{service}': {reason}")]
    CreationFailed { service: String, reason: String },
}

impl ContainerError {
    /// 便捷构造：描述符非法
    pub fn invalid_spec(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ContainerError::InvalidSpecification {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 便捷构造：状态冲突
    pub fn state_conflict(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ContainerError::StateConflict {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 便捷构造：工厂执行失败
    pub fn creation_failed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        ContainerError::CreationFailed {
            service: service.into(),
            reason: reason.into(),
        }
    }
}
