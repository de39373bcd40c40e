//! 延迟引用
//!
//! `Reference` 只包装一个名称，不在创建时做任何查找；
//! 解引用必须显式给定注册表，发生在被使用的瞬间。
//! 驻留表由构造引用的作用域（容器）持有，不是进程级全局状态，
//! 相等性就是名称的值相等。

use std::collections::HashMap;
use std::sync::Arc;

use crate::container::Container;
use crate::error::ContainerError;
use crate::value::Value;

/// 指向尚未解析名称的不可变句柄
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Reference {
    name: Arc<str>,
}

impl Reference {
    /// 不经驻留表直接构造（测试和一次性场景）
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 对给定注册表解引用
    pub fn resolve(&self, container: &mut Container) -> Result<Value, ContainerError> {
        container.get(&self.name)
    }
}

/// 引用驻留表：同一池内每个名称只存在一个共享实例
#[derive(Default)]
pub struct RefPool {
    interned: HashMap<String, Reference>,
}

impl RefPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Reference {
        if let Some(existing) = self.interned.get(name) {
            return existing.clone();
        }
        let reference = Reference::new(name);
        self.interned.insert(name.to_string(), reference.clone());
        reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interned_references_share_allocation() {
        let mut pool = RefPool::new();
        let a = pool.intern("db");
        let b = pool.intern("db");
        assert!(Arc::ptr_eq(&a.name, &b.name));
    }

    #[test]
    fn test_equality_is_by_name() {
        let mut pool = RefPool::new();
        let a = pool.intern("db");
        let b = Reference::new("db");
        let c = pool.intern("cache");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
