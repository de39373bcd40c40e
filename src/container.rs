//! 运行时解析器
//!
//! 名称键控的惰性记忆化容器。每个名称经历
//! 未定义 → 待定（注册了工厂）→ 已解析（缓存了值）→ 已激活（被取用过、
//! 钩子已运行）的单向生命周期，激活后的名称拒绝一切重定义。
//!
//! 解析期间维护一个"正在解析"集合，重入请求立即报循环依赖，
//! 不靠栈溢出暴露问题。别名走行时逐跳解析，同样带环检测。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace};

use crate::binder::{bind, ArgKey, ArgMap, BindMode};
use crate::error::ContainerError;
use crate::reference::RefPool;
use crate::registry::{Callable, TypeRegistry};
use crate::spec::{Expr, RefChain, ServiceDescriptor, ServiceKind, SuffixOp, Target};
use crate::value::Value;

/// 容器自身的规范注册名
const SELF_NAMES: [&str; 2] = ["di", "container"];

/// `register` 接受的定义形式
pub enum Define {
    /// 容器自引用标记
    SelfType,
    /// 按类型标识构造
    Type(String),
    /// 名称自身作为类型标识，附带构造覆盖映射
    Args(ArgMap),
    /// 自由可调用目标
    Callable(Callable),
    /// 规格解析产出的完整配方
    Recipe(ServiceDescriptor),
}

/// 待定工厂；成功产出前保持注册不变
#[derive(Clone)]
enum Factory {
    Type(String, ArgMap),
    Callable(Callable, ArgMap),
    Recipe(Box<ServiceDescriptor>),
}

/// 激活时按序运行的钩子：先方法调用，后配置器
#[derive(Default, Clone)]
struct Hooks {
    methods: Vec<(String, ArgMap)>,
    configurators: Vec<(Callable, ArgMap)>,
}

/// 名称键控的惰性记忆化解析器
pub struct Container {
    types: Arc<TypeRegistry>,
    values: HashMap<String, Value>,
    factories: HashMap<String, Factory>,
    hooks: HashMap<String, Hooks>,
    active: HashSet<String>,
    aliases: HashMap<String, String>,
    resolving: HashSet<String>,
    refs: RefPool,
}

impl Container {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        let mut container = Self {
            types,
            values: HashMap::new(),
            factories: HashMap::new(),
            hooks: HashMap::new(),
            active: HashSet::new(),
            aliases: HashMap::new(),
            resolving: HashSet::new(),
            refs: RefPool::new(),
        };
        for name in SELF_NAMES {
            container.values.insert(name.to_string(), Value::Container);
            container.active.insert(name.to_string());
        }
        container
    }

    pub fn type_registry(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// 解析名称并返回缓存值；首次取用触发构建与钩子
    pub fn get(&mut self, name: &str) -> Result<Value, ContainerError> {
        let name = self.canonical(name)?;

        if let Some(value) = self.values.get(&name) {
            if self.active.contains(&name) {
                return Ok(value.clone());
            }
            let value = value.clone();
            return self.activate(&name, value);
        }

        if self.factories.contains_key(&name) {
            if !self.resolving.insert(name.clone()) {
                return Err(ContainerError::CyclicDependency(name));
            }
            debug!("resolving service '{}'", name);
            let produced = self.produce(&name);
            self.resolving.remove(&name);
            let value = produced?;
            self.factories.remove(&name);
            return self.activate(&name, value);
        }

        // 名称本身是可构造类型时按需建一个并缓存
        if self.types.is_constructible(&name) {
            if !self.resolving.insert(name.clone()) {
                return Err(ContainerError::CyclicDependency(name));
            }
            debug!("constructing unregistered type '{}'", name);
            let created = self.create(&name, &ArgMap::new());
            self.resolving.remove(&name);
            let value = created?;
            return self.activate(&name, value);
        }

        Err(ContainerError::NotFound(name))
    }

    /// 名称是否已定义（值、待定工厂或别名）；不触发任何构建
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
            || self.factories.contains_key(name)
            || self.aliases.contains_key(name)
    }

    /// 调用一个自由目标，参数按 Safe 模式绑定；结果不缓存
    pub fn call(&mut self, callable: &Callable, overrides: &ArgMap) -> Result<Value, ContainerError> {
        let args = bind(self, callable.params(), overrides, BindMode::Safe)?;
        callable.invoke(self, args)
    }

    /// 构造一个全新实例，绕过缓存；构造参数按 Strict 模式绑定。
    /// 带单例标记的类型直接取其访问器的返回值。
    pub fn create(&mut self, type_name: &str, overrides: &ArgMap) -> Result<Value, ContainerError> {
        let types = Arc::clone(&self.types);
        let def = types
            .get(type_name)
            .ok_or_else(|| ContainerError::NotIntrospectable(type_name.to_string()))?;

        if let Some(singleton) = def.singleton_fn() {
            trace!("taking singleton accessor for '{}'", type_name);
            return Ok(singleton());
        }

        let construct = def.construct_fn().ok_or_else(|| {
            ContainerError::NotIntrospectable(format!(
                "'{}' is abstract and cannot be instantiated",
                type_name
            ))
        })?;
        let args = bind(self, def.params(), overrides, BindMode::Strict)?;
        construct(args)
    }

    /// 立即且永久地注册一个从未定义过的名称；注册即激活
    pub fn insert(&mut self, name: &str, value: Value) -> Result<(), ContainerError> {
        if self.has(name) {
            return Err(ContainerError::state_conflict(name, "already defined"));
        }
        self.values.insert(name.to_string(), value);
        self.active.insert(name.to_string());
        Ok(())
    }

    /// 缓存一个现成的值，清掉同名的待定定义与别名；已激活的名称拒绝
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ContainerError> {
        if self.active.contains(name) {
            return Err(ContainerError::state_conflict(name, "already active"));
        }
        self.factories.remove(name);
        self.aliases.remove(name);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// 安装一个待定工厂；已激活的名称拒绝
    pub fn register(
        &mut self,
        name: &str,
        define: Define,
        overrides: ArgMap,
    ) -> Result<(), ContainerError> {
        if self.active.contains(name) {
            return Err(ContainerError::state_conflict(name, "already active"));
        }
        self.values.remove(name);
        self.factories.remove(name);
        self.aliases.remove(name);
        self.install(name, define, overrides);
        Ok(())
    }

    /// 换掉已激活名称的缓存值；名称保持激活，钩子不再运行
    pub fn replace(&mut self, name: &str, value: Value) -> Result<(), ContainerError> {
        if !self.active.contains(name) {
            return Err(ContainerError::state_conflict(
                name,
                "cannot replace a service that was never activated",
            ));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// 按类型标识注册（register 的便捷形式）
    pub fn register_type(
        &mut self,
        name: &str,
        type_name: &str,
        overrides: ArgMap,
    ) -> Result<(), ContainerError> {
        self.register(name, Define::Type(type_name.to_string()), overrides)
    }

    /// 按可调用目标注册（register 的便捷形式）
    pub fn register_factory(
        &mut self,
        name: &str,
        callable: Callable,
        overrides: ArgMap,
    ) -> Result<(), ContainerError> {
        self.register(name, Define::Callable(callable), overrides)
    }

    /// 建立别名；自指、已定义的别名侧、不可解析的目标侧都拒绝
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), ContainerError> {
        if alias == target {
            return Err(ContainerError::invalid_spec(
                alias,
                "alias cannot point to itself",
            ));
        }
        if self.has(alias) {
            return Err(ContainerError::invalid_spec(
                alias,
                "alias name already resolves to something",
            ));
        }
        if !self.has(target) && !self.types.is_constructible(target) {
            return Err(ContainerError::invalid_spec(
                alias,
                format!("alias target '{}' is undefined", target),
            ));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// 附加一个激活时运行的方法调用钩子；按别名解析后的名称登记
    pub fn calls(
        &mut self,
        name: &str,
        method: &str,
        overrides: ArgMap,
    ) -> Result<(), ContainerError> {
        let name = self.canonical(name)?;
        if self.active.contains(&name) {
            return Err(ContainerError::state_conflict(name.as_str(), "already active"));
        }
        self.hooks
            .entry(name)
            .or_default()
            .methods
            .push((method.to_string(), overrides));
        Ok(())
    }

    /// 附加一个激活时运行的配置器；首位参数缺省时注入对该名称的引用
    pub fn configure(
        &mut self,
        name: &str,
        callable: Callable,
        mut overrides: ArgMap,
    ) -> Result<(), ContainerError> {
        let name = self.canonical(name)?;
        if self.active.contains(&name) {
            return Err(ContainerError::state_conflict(name.as_str(), "already active"));
        }
        if !overrides.contains_key(&ArgKey::Index(0)) {
            let reference = self.ref_to(&name);
            overrides.insert(ArgKey::Index(0), reference);
        }
        self.hooks
            .entry(name)
            .or_default()
            .configurators
            .push((callable, overrides));
        Ok(())
    }

    /// 已激活的名称直接给值，其余给延迟引用（驻留，同名共享）
    pub fn ref_to(&mut self, name: &str) -> Value {
        if self.active.contains(name) {
            if let Some(value) = self.values.get(name) {
                return value.clone();
            }
        }
        Value::Ref(self.refs.intern(name))
    }

    /// 清除名称的全部登记状态
    pub fn delete(&mut self, name: &str) {
        self.values.remove(name);
        self.factories.remove(name);
        self.hooks.remove(name);
        self.aliases.remove(name);
        self.active.remove(name);
    }

    /// 把解析完的规格装入容器：先描述符，后别名表（允许前向引用）
    pub fn load(&mut self, spec: &crate::spec::Specification) -> Result<(), ContainerError> {
        for descriptor in spec.descriptors() {
            match (&descriptor.kind, &descriptor.target) {
                (ServiceKind::Alias, _) => continue,
                (ServiceKind::DirectValue, Target::Value(value)) => {
                    self.set(&descriptor.name, value.clone())?;
                }
                _ => {
                    self.register(
                        &descriptor.name,
                        Define::Recipe(descriptor.clone()),
                        ArgMap::new(),
                    )?;
                }
            }
        }
        for (alias, target) in spec.alias_table() {
            self.alias(alias, target)?;
        }
        debug!("loaded specification into container");
        Ok(())
    }

    /// 逐跳解析别名链，带环检测
    fn canonical(&self, name: &str) -> Result<String, ContainerError> {
        let mut current = name;
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(next) = self.aliases.get(current) {
            if !visited.insert(current) {
                return Err(ContainerError::CyclicDependency(name.to_string()));
            }
            current = next;
        }
        Ok(current.to_string())
    }

    fn install(&mut self, name: &str, define: Define, overrides: ArgMap) {
        match define {
            Define::SelfType => {
                self.values.insert(name.to_string(), Value::Container);
            }
            Define::Type(type_name) => {
                self.factories
                    .insert(name.to_string(), Factory::Type(type_name, overrides));
            }
            Define::Args(args) => {
                // 名称自身就是类型标识
                self.factories
                    .insert(name.to_string(), Factory::Type(name.to_string(), args));
            }
            Define::Callable(callable) => {
                self.factories
                    .insert(name.to_string(), Factory::Callable(callable, overrides));
            }
            Define::Recipe(descriptor) => {
                self.factories
                    .insert(name.to_string(), Factory::Recipe(Box::new(descriptor)));
            }
        }
    }

    /// 运行待定工厂；注册在成功前保持原样
    fn produce(&mut self, name: &str) -> Result<Value, ContainerError> {
        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;
        match factory {
            Factory::Type(type_name, overrides) => self.create(&type_name, &overrides),
            Factory::Callable(callable, overrides) => self.call(&callable, &overrides),
            Factory::Recipe(descriptor) => self.evaluate_descriptor(&descriptor),
        }
    }

    /// 缓存值、置激活、按登记顺序运行一次钩子
    fn activate(&mut self, name: &str, value: Value) -> Result<Value, ContainerError> {
        self.values.insert(name.to_string(), value);
        self.active.insert(name.to_string());

        if let Some(hooks) = self.hooks.remove(name) {
            trace!(
                "running {} method hooks and {} configurators for '{}'",
                hooks.methods.len(),
                hooks.configurators.len(),
                name
            );
            for (method, overrides) in &hooks.methods {
                let receiver = self
                    .values
                    .get(name)
                    .cloned()
                    .unwrap_or(Value::Null);
                self.invoke_method(&receiver, method, overrides)?;
            }
            for (callable, overrides) in &hooks.configurators {
                let result = self.call(callable, overrides)?;
                // 配置器的非 Null 返回值换掉缓存值
                if !result.is_null() {
                    self.values.insert(name.to_string(), result);
                }
            }
        }

        Ok(self
            .values
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// 按配方求值：目标 → 后缀操作
    fn evaluate_descriptor(
        &mut self,
        descriptor: &ServiceDescriptor,
    ) -> Result<Value, ContainerError> {
        let value = match &descriptor.target {
            Target::Value(value) => value.clone(),
            Target::Reference(chain) => self.eval_chain(chain)?,
            Target::Type(type_name) => {
                let overrides = self.args_to_map(&descriptor.arguments)?;
                self.create(type_name, &overrides)?
            }
            Target::StaticMethod(type_name, method) => {
                let overrides = self.args_to_map(&descriptor.arguments)?;
                self.call_static(type_name, method, &overrides)?
            }
        };

        for op in &descriptor.suffix {
            match op {
                SuffixOp::Property(prop, expr) => self.set_property(&value, prop, expr)?,
                SuffixOp::Call(method, exprs) => {
                    let overrides = self.args_to_map(exprs)?;
                    self.invoke_method(&value, method, &overrides)?;
                }
            }
        }

        Ok(value)
    }

    /// 在接收者上按注册的签名分发一次方法调用（Safe 绑定）
    pub fn invoke_method(
        &mut self,
        receiver: &Value,
        method: &str,
        overrides: &ArgMap,
    ) -> Result<Value, ContainerError> {
        let handle = receiver.as_object().ok_or_else(|| {
            ContainerError::NotIntrospectable(format!("method '{}' on non-object value", method))
        })?;
        let type_name = handle.type_name().to_string();
        let types = Arc::clone(&self.types);
        let def = types
            .get(&type_name)
            .ok_or_else(|| ContainerError::NotIntrospectable(type_name.clone()))?;
        let method_def = def.method_def(method).ok_or_else(|| {
            ContainerError::NotIntrospectable(format!("{}::{}", type_name, method))
        })?;
        let args = bind(self, &method_def.params, overrides, BindMode::Safe)?;
        (method_def.invoke)(receiver, args)
    }

    fn call_static(
        &mut self,
        type_name: &str,
        method: &str,
        overrides: &ArgMap,
    ) -> Result<Value, ContainerError> {
        let types = Arc::clone(&self.types);
        let def = types
            .get(type_name)
            .ok_or_else(|| ContainerError::NotIntrospectable(type_name.to_string()))?;
        let static_def = def.static_def(method).ok_or_else(|| {
            ContainerError::NotIntrospectable(format!("{}::{}", type_name, method))
        })?;
        let args = bind(self, &static_def.params, overrides, BindMode::Safe)?;
        (static_def.invoke)(args)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, ContainerError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ref(chain) => self.eval_chain(chain),
        }
    }

    /// 解析引用链：取根名称，逐段做属性读取或方法调用
    fn eval_chain(&mut self, chain: &RefChain) -> Result<Value, ContainerError> {
        let mut current = self.get(&chain.name)?;
        for access in &chain.path {
            current = match &access.args {
                Some(exprs) => {
                    let overrides = self.args_to_map(exprs)?;
                    self.invoke_method(&current, &access.member, &overrides)?
                }
                None => self.read_property(&current, &access.member)?,
            };
        }
        Ok(current)
    }

    fn read_property(&mut self, receiver: &Value, prop: &str) -> Result<Value, ContainerError> {
        let handle = receiver.as_object().ok_or_else(|| {
            ContainerError::NotIntrospectable(format!("property '{}' on non-object value", prop))
        })?;
        let type_name = handle.type_name().to_string();
        let types = Arc::clone(&self.types);
        let def = types
            .get(&type_name)
            .ok_or_else(|| ContainerError::NotIntrospectable(type_name.clone()))?;
        let getter = def
            .getter_fn(prop)
            .ok_or_else(|| ContainerError::NotIntrospectable(format!("{}::{}", type_name, prop)))?;
        getter(receiver)
    }

    fn set_property(
        &mut self,
        receiver: &Value,
        prop: &str,
        expr: &Expr,
    ) -> Result<(), ContainerError> {
        let assigned = self.eval_expr(expr)?;
        let handle = receiver.as_object().ok_or_else(|| {
            ContainerError::NotIntrospectable(format!("property '{}' on non-object value", prop))
        })?;
        let type_name = handle.type_name().to_string();
        let types = Arc::clone(&self.types);
        let def = types
            .get(&type_name)
            .ok_or_else(|| ContainerError::NotIntrospectable(type_name.clone()))?;
        let setter = def
            .setter_fn(prop)
            .ok_or_else(|| ContainerError::NotIntrospectable(format!("{}::{}", type_name, prop)))?;
        setter(receiver, assigned)
    }

    /// 把配方里的位置实参求值成覆盖映射，交给绑定器补齐其余参数
    fn args_to_map(&mut self, exprs: &[Expr]) -> Result<ArgMap, ContainerError> {
        let mut map = ArgMap::new();
        for (index, expr) in exprs.iter().enumerate() {
            let value = self.eval_expr(expr)?;
            map.insert(ArgKey::Index(index), value);
        }
        Ok(map)
    }
}
