//! wirebox - 声明式服务规格绑定
//!
//! 同一份有序的服务规格（名称 → 速记字符串或嵌套映射）有两种消费方式：
//! [`container::Container`] 在运行时惰性解析并记忆化，
//! [`compiler::Compiler`] 在构建时翻译成静态分发源文本。
//! 两条路径共享 [`spec::Specification`] 的描述符模型、
//! [`binder`] 的参数绑定优先级和 [`registry::TypeRegistry`] 的类型元数据。

pub mod binder;
pub mod compiler;
pub mod container;
pub mod error;
pub mod reference;
pub mod registry;
pub mod spec;
pub mod value;

// Re-export commonly used items for convenience
pub use binder::{bind, ArgKey, ArgMap, BindMode};
pub use compiler::{CompiledUnit, Compiler, EntryPoint};
pub use container::{Container, Define};
pub use error::ContainerError;
pub use reference::{RefPool, Reference};
pub use registry::{CallTarget, Callable, ParameterSpec, TypeDef, TypeRegistry};
pub use spec::{ServiceDescriptor, ServiceKind, Specification};
pub use value::{ObjectHandle, Value};
