//! 类型注册表（内省能力的静态替身）
//!
//! 目标语言没有运行期签名反射，这里用启动时构建的注册表代替：
//! 每个可构造类型预先声明自己的参数元数据、构造闭包、可选的单例访问器、
//! 实例方法、静态方法以及属性读写器。单例支持是显式能力标记，
//! 不做结构性探测。
//!
//! 运行时解析器通过 [`TypeRegistry::parameters_of`] 取参数元数据；
//! 静态编译器只调用 [`TypeRegistry::is_known`] / [`is_constructible`] /
//! [`has_singleton`] 这三类查询。
//!
//! [`is_constructible`]: TypeRegistry::is_constructible
//! [`has_singleton`]: TypeRegistry::has_singleton

use std::collections::HashMap;
use std::sync::Arc;

use crate::container::Container;
use crate::error::ContainerError;
use crate::value::Value;

/// 构造/静态方法闭包：入参已按声明顺序绑定完成
pub type ConstructFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, ContainerError> + Send + Sync>;
/// 单例访问器闭包
pub type SingletonFn = Arc<dyn Fn() -> Value + Send + Sync>;
/// 实例方法闭包：第一个参数是接收者
pub type MethodFn = Arc<dyn Fn(&Value, Vec<Value>) -> Result<Value, ContainerError> + Send + Sync>;
/// 属性读取闭包
pub type GetterFn = Arc<dyn Fn(&Value) -> Result<Value, ContainerError> + Send + Sync>;
/// 属性赋值闭包（对象内部可变性由实现方保证）
pub type SetterFn = Arc<dyn Fn(&Value, Value) -> Result<(), ContainerError> + Send + Sync>;
/// 自由可调用目标闭包，容器以与工厂相同的方式传入自身
pub type CallableFn =
    Arc<dyn Fn(&mut Container, Vec<Value>) -> Result<Value, ContainerError> + Send + Sync>;

/// 单个参数的声明元数据
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    /// 只记录有意义的非内建类型
    pub declared_type: Option<String>,
    pub default: Option<Value>,
    pub nullable: bool,
    /// 声明位置（诊断用），形如 `Widget::new`
    pub declared_at: String,
}

impl ParameterSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: None,
            default: None,
            nullable: false,
            declared_at: String::new(),
        }
    }

    pub fn typed(mut self, declared_type: &str) -> Self {
        self.declared_type = Some(declared_type.to_string());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn declared_at(mut self, location: &str) -> Self {
        if self.declared_at.is_empty() {
            self.declared_at = location.to_string();
        }
        self
    }
}

/// 实例方法定义
#[derive(Clone)]
pub struct MethodDef {
    pub params: Vec<ParameterSpec>,
    pub invoke: MethodFn,
}

/// 静态方法定义（FactoryCall 的目标）
#[derive(Clone)]
pub struct StaticDef {
    pub params: Vec<ParameterSpec>,
    pub invoke: ConstructFn,
}

/// 一个可构造类型的完整声明
#[derive(Clone)]
pub struct TypeDef {
    name: String,
    params: Vec<ParameterSpec>,
    construct: Option<ConstructFn>,
    singleton: Option<SingletonFn>,
    methods: HashMap<String, MethodDef>,
    statics: HashMap<String, StaticDef>,
    getters: HashMap<String, GetterFn>,
    setters: HashMap<String, SetterFn>,
}

impl TypeDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            construct: None,
            singleton: None,
            methods: HashMap::new(),
            statics: HashMap::new(),
            getters: HashMap::new(),
            setters: HashMap::new(),
        }
    }

    /// 追加一个构造参数声明
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        let location = format!("{}::new", self.name);
        self.params.push(spec.declared_at(&location));
        self
    }

    /// 声明构造闭包；缺省时类型被视为抽象（已知但不可实例化）
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, ContainerError> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(f));
        self
    }

    /// 显式单例能力标记：构造路径改为取该访问器的返回值
    pub fn singleton<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.singleton = Some(Arc::new(f));
        self
    }

    pub fn method<F>(mut self, name: &str, params: Vec<ParameterSpec>, f: F) -> Self
    where
        F: Fn(&Value, Vec<Value>) -> Result<Value, ContainerError> + Send + Sync + 'static,
    {
        let location = format!("{}::{}", self.name, name);
        let params = params
            .into_iter()
            .map(|p| p.declared_at(&location))
            .collect();
        self.methods.insert(
            name.to_string(),
            MethodDef {
                params,
                invoke: Arc::new(f),
            },
        );
        self
    }

    pub fn static_method<F>(mut self, name: &str, params: Vec<ParameterSpec>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, ContainerError> + Send + Sync + 'static,
    {
        let location = format!("{}::{}", self.name, name);
        let params = params
            .into_iter()
            .map(|p| p.declared_at(&location))
            .collect();
        self.statics.insert(
            name.to_string(),
            StaticDef {
                params,
                invoke: Arc::new(f),
            },
        );
        self
    }

    pub fn getter<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ContainerError> + Send + Sync + 'static,
    {
        self.getters.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn setter<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Value, Value) -> Result<(), ContainerError> + Send + Sync + 'static,
    {
        self.setters.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn construct_fn(&self) -> Option<&ConstructFn> {
        self.construct.as_ref()
    }

    pub fn singleton_fn(&self) -> Option<&SingletonFn> {
        self.singleton.as_ref()
    }

    pub fn method_def(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(name)
    }

    pub fn static_def(&self, name: &str) -> Option<&StaticDef> {
        self.statics.get(name)
    }

    pub fn getter_fn(&self, name: &str) -> Option<&GetterFn> {
        self.getters.get(name)
    }

    pub fn setter_fn(&self, name: &str) -> Option<&SetterFn> {
        self.setters.get(name)
    }
}

/// 可内省的自由调用目标（工厂闭包、配置器）
#[derive(Clone)]
pub struct Callable {
    name: String,
    params: Vec<ParameterSpec>,
    func: CallableFn,
}

impl Callable {
    pub fn new<F>(name: &str, params: Vec<ParameterSpec>, f: F) -> Self
    where
        F: Fn(&mut Container, Vec<Value>) -> Result<Value, ContainerError> + Send + Sync + 'static,
    {
        let params = params.into_iter().map(|p| p.declared_at(name)).collect();
        Self {
            name: name.to_string(),
            params,
            func: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn invoke(
        &self,
        container: &mut Container,
        args: Vec<Value>,
    ) -> Result<Value, ContainerError> {
        (self.func)(container, args)
    }
}

/// `parameters_of` 的查询目标
pub enum CallTarget<'a> {
    Constructor(&'a str),
    StaticMethod(&'a str, &'a str),
    Method(&'a str, &'a str),
    Callable(&'a Callable),
}

/// 启动时构建的类型注册表
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// 名称是否为已声明的类型（含抽象类型）
    pub fn is_known(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// 名称是否可实例化
    pub fn is_constructible(&self, name: &str) -> bool {
        self.types
            .get(name)
            .map(|d| d.construct.is_some() || d.singleton.is_some())
            .unwrap_or(false)
    }

    pub fn has_singleton(&self, name: &str) -> bool {
        self.types
            .get(name)
            .map(|d| d.singleton.is_some())
            .unwrap_or(false)
    }

    /// 返回目标的有序参数元数据；目标未知或不可实例化时报错
    pub fn parameters_of<'a>(
        &'a self,
        target: CallTarget<'a>,
    ) -> Result<&'a [ParameterSpec], ContainerError> {
        match target {
            CallTarget::Constructor(name) => {
                let def = self
                    .types
                    .get(name)
                    .ok_or_else(|| ContainerError::NotIntrospectable(name.to_string()))?;
                if def.construct.is_none() && def.singleton.is_none() {
                    return Err(ContainerError::NotIntrospectable(format!(
                        "'{}' is abstract and cannot be instantiated",
                        name
                    )));
                }
                Ok(def.params())
            }
            CallTarget::StaticMethod(type_name, method) => {
                let def = self
                    .types
                    .get(type_name)
                    .ok_or_else(|| ContainerError::NotIntrospectable(type_name.to_string()))?;
                def.static_def(method)
                    .map(|s| s.params.as_slice())
                    .ok_or_else(|| {
                        ContainerError::NotIntrospectable(format!("{}::{}", type_name, method))
                    })
            }
            CallTarget::Method(type_name, method) => {
                let def = self
                    .types
                    .get(type_name)
                    .ok_or_else(|| ContainerError::NotIntrospectable(type_name.to_string()))?;
                def.method_def(method)
                    .map(|m| m.params.as_slice())
                    .ok_or_else(|| {
                        ContainerError::NotIntrospectable(format!("{}::{}", type_name, method))
                    })
            }
            CallTarget::Callable(callable) => Ok(callable.params()),
        }
    }
}
