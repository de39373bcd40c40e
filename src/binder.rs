//! 参数绑定
//!
//! 把一组参数声明对照覆盖映射与注册表解析成有序实参列表。
//! 优先级固定为八步，首个命中即停：
//! 按名覆盖 → 按位覆盖 → 按类型覆盖 → 注册表按类型 →
//! （仅 Safe 模式）注册表按名 → 默认值 → 可空补 Null → 报错。
//!
//! 构造参数一律 Strict 模式（跳过按名回退），普通调用与钩子一律 Safe 模式：
//! 类型自身的字段名不应意外遮蔽无关的注册项，临时调用则允许这种便利。

use std::collections::HashMap;

use crate::container::Container;
use crate::error::ContainerError;
use crate::registry::ParameterSpec;
use crate::value::Value;

/// 覆盖映射的键：参数名/类型名，或位置下标
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    Name(String),
    Index(usize),
}

impl From<&str> for ArgKey {
    fn from(v: &str) -> Self {
        ArgKey::Name(v.to_string())
    }
}

impl From<String> for ArgKey {
    fn from(v: String) -> Self {
        ArgKey::Name(v)
    }
}

impl From<usize> for ArgKey {
    fn from(v: usize) -> Self {
        ArgKey::Index(v)
    }
}

impl From<i32> for ArgKey {
    fn from(v: i32) -> Self {
        ArgKey::Index(v as usize)
    }
}

/// 覆盖映射
pub type ArgMap = HashMap<ArgKey, Value>;

/// 覆盖映射构造宏：`argmap! { "x" => 1, 0 => "y" }`
#[macro_export]
macro_rules! argmap {
    () => { $crate::binder::ArgMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::binder::ArgMap::new();
        $( map.insert($crate::binder::ArgKey::from($key), $crate::value::Value::from($value)); )+
        map
    }};
}

/// 绑定模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// 额外允许按参数名在注册表中回退查找
    Safe,
    /// 构造专用，省略按名回退
    Strict,
}

/// 解析一组参数；输出中出现的延迟引用在放入列表前被解引用
pub fn bind(
    container: &mut Container,
    params: &[ParameterSpec],
    overrides: &ArgMap,
    mode: BindMode,
) -> Result<Vec<Value>, ContainerError> {
    let mut args = Vec::with_capacity(params.len());
    for (index, param) in params.iter().enumerate() {
        let value = bind_one(container, param, index, overrides, mode)?;
        let value = match value {
            Value::Ref(reference) => reference.resolve(container)?,
            other => other,
        };
        args.push(value);
    }
    Ok(args)
}

fn bind_one(
    container: &mut Container,
    param: &ParameterSpec,
    index: usize,
    overrides: &ArgMap,
    mode: BindMode,
) -> Result<Value, ContainerError> {
    if let Some(value) = overrides.get(&ArgKey::Name(param.name.clone())) {
        return Ok(value.clone());
    }

    if let Some(value) = overrides.get(&ArgKey::Index(index)) {
        return Ok(value.clone());
    }

    if let Some(declared_type) = &param.declared_type {
        if let Some(value) = overrides.get(&ArgKey::Name(declared_type.clone())) {
            return Ok(value.clone());
        }

        if container.has(declared_type) {
            return container.get(declared_type);
        }
    }

    if mode == BindMode::Safe && container.has(&param.name) {
        return container.get(&param.name);
    }

    if let Some(default) = &param.default {
        return Ok(default.clone());
    }

    if param.declared_type.is_some() && param.nullable {
        return Ok(Value::Null);
    }

    Err(ContainerError::UnresolvedParameter {
        name: param.name.clone(),
        declared_type: param.declared_type.clone(),
        declared_at: param.declared_at.clone(),
    })
}
