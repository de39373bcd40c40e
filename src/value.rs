//! 容器值模型
//!
//! 注册表中缓存的一切都是 `Value`：标量字面量、列表、类型擦除的对象句柄、
//! 延迟引用，以及容器自引用标记。对象通过 `Arc<dyn Any>` 擦除，
//! 并携带注册时的类型名以便按名分发方法和属性。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::reference::Reference;

/// 类型擦除的对象句柄
///
/// `type_name` 是类型注册表中的键，方法调用和属性访问都以它为分发依据。
#[derive(Clone)]
pub struct ObjectHandle {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    pub fn new<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            inner: Arc::new(value),
        }
    }

    /// 从已有的共享实例构造句柄（单例访问器使用）
    pub fn from_arc<T: Any + Send + Sync>(type_name: &str, value: Arc<T>) -> Self {
        Self {
            type_name: Arc::from(type_name),
            inner: value,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 取回具体类型；类型不匹配时返回 None
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    /// 句柄相等即底层实例相同
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle<{}>", self.type_name)
    }
}

/// 动态值
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(ObjectHandle),
    /// 延迟引用，在被使用的瞬间才向注册表取值
    Ref(Reference),
    /// 解析器在构造时以此标记注册自身的规范名称
    Container,
}

impl Value {
    /// 构造一个对象值
    pub fn object<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Value::Object(ObjectHandle::new(type_name, value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// 取回对象的具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_object().and_then(ObjectHandle::downcast)
    }

    /// 从 JSON 字面量转换（规格文件中的标量与数组参数）
    pub fn from_json(raw: &serde_json::Value) -> Value {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::List(
                map.iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), Value::from_json(v)]))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // 对象相等即同一实例
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Container, Value::Container) => true,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_equality_is_identity() {
        let a = Value::object("Widget", 1u32);
        let b = a.clone();
        let c = Value::object("Widget", 1u32);

        // 克隆共享同一实例，独立构造的不相等
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_downcast_round_trip() {
        let v = Value::object("Counter", 7usize);
        let inner = v.downcast::<usize>().unwrap();
        assert_eq!(*inner, 7);
        assert!(v.downcast::<String>().is_none());
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(&serde_json::json!(true)), Value::Bool(true));
        assert_eq!(
            Value::from_json(&serde_json::json!("x")),
            Value::Str("x".into())
        );
        assert_eq!(Value::from_json(&serde_json::Value::Null), Value::Null);
    }
}
