//! 规格解析
//!
//! 把一条原始配置项（字符串速记或嵌套映射）规范化为结构化描述符。
//! 速记文法：
//! - 前导 `@` 为引用；其余部分含 `->` 时是对引用值的属性/方法链访问
//!   （每段可带冒号分隔的实参表），否则是纯别名。
//! - 含 `::` 为静态工厂调用：左侧为目标类型，右侧为方法（可冒号带参）。
//! - 其余为构造调用：整串是类型标识，可冒号带逗号分隔的字面量/引用实参表。
//!
//! 映射形式识别 `alias`、`to`、`class`、`factory`、`arguments`、`property`、
//! `calls` 这些键，未识别的键忽略不报错。构建目标优先级：
//! `factory` > `class` > 名称自身是已注册的可构造类型。
//!
//! 别名表与抽象别名反查表在每次解析时一次性派生，不做增量维护。

use log::{debug, warn};

use crate::error::ContainerError;
use crate::registry::TypeRegistry;
use crate::value::Value;

/// 描述符种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Alias,
    FactoryCall,
    ConstructorCall,
    DirectValue,
}

/// 链式访问的一段；`args` 为 `None` 表示属性读取，`Some` 表示方法调用
#[derive(Debug, Clone)]
pub struct Access {
    pub member: String,
    pub args: Option<Vec<Expr>>,
}

/// 引用链：`name->seg1->seg2:arg,...`
#[derive(Debug, Clone)]
pub struct RefChain {
    pub name: String,
    pub path: Vec<Access>,
}

/// 字面量或引用表达式
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Ref(RefChain),
}

/// 构建目标
#[derive(Debug, Clone)]
pub enum Target {
    /// 构造调用的类型标识
    Type(String),
    /// 静态工厂调用：类型 + 方法
    StaticMethod(String, String),
    /// 被引用的名称（纯别名或链式访问）
    Reference(RefChain),
    /// 直接字面量
    Value(Value),
}

/// 构造完成后按序施加的操作
#[derive(Debug, Clone)]
pub enum SuffixOp {
    Property(String, Expr),
    Call(String, Vec<Expr>),
}

/// 一个组件的规范化构建配方
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub kind: ServiceKind,
    pub target: Target,
    pub arguments: Vec<Expr>,
    pub suffix: Vec<SuffixOp>,
    /// 应当解析到本描述符的名称
    pub reverse_aliases: Vec<String>,
}

/// 解析完成的规格：有序描述符 + 一次性派生的两张别名表
#[derive(Debug)]
pub struct Specification {
    descriptors: Vec<ServiceDescriptor>,
    aliases: Vec<(String, String)>,
    abstract_aliases: Vec<(String, Vec<String>)>,
}

impl Specification {
    /// 从 JSON 文本解析
    pub fn from_json_str(registry: &TypeRegistry, text: &str) -> Result<Self, ContainerError> {
        let raw: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ContainerError::invalid_spec("<specification>", e.to_string()))?;
        Self::parse(registry, &raw)
    }

    /// 解析一棵已加载的 JSON 规格树
    pub fn parse(registry: &TypeRegistry, raw: &serde_json::Value) -> Result<Self, ContainerError> {
        let map = raw.as_object().ok_or_else(|| {
            ContainerError::invalid_spec("<specification>", "top level must be a mapping")
        })?;

        let mut parser = Parser {
            registry,
            descriptors: Vec::new(),
            aliases: Vec::new(),
        };

        for (name, entry) in map {
            parser.parse_entry(name, entry)?;
        }

        let abstract_aliases = derive_abstract_aliases(&parser.aliases);
        debug!(
            "parsed specification: {} descriptors, {} aliases",
            parser.descriptors.len(),
            parser.aliases.len()
        );

        Ok(Specification {
            descriptors: parser.descriptors,
            aliases: parser.aliases,
            abstract_aliases,
        })
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// 别名 → 规范名
    pub fn alias_table(&self) -> &[(String, String)] {
        &self.aliases
    }

    /// 规范名 → 指向它的全部别名
    pub fn abstract_alias_index(&self) -> &[(String, Vec<String>)] {
        &self.abstract_aliases
    }
}

fn derive_abstract_aliases(aliases: &[(String, String)]) -> Vec<(String, Vec<String>)> {
    let mut index: Vec<(String, Vec<String>)> = Vec::new();
    for (alias, canonical) in aliases {
        match index.iter_mut().find(|(k, _)| k == canonical) {
            Some((_, list)) => list.push(alias.clone()),
            None => index.push((canonical.clone(), vec![alias.clone()])),
        }
    }
    index
}

struct Parser<'a> {
    registry: &'a TypeRegistry,
    descriptors: Vec<ServiceDescriptor>,
    aliases: Vec<(String, String)>,
}

impl<'a> Parser<'a> {
    fn parse_entry(&mut self, name: &str, entry: &serde_json::Value) -> Result<(), ContainerError> {
        match entry {
            serde_json::Value::String(s) => self.parse_shorthand(name, s),
            serde_json::Value::Array(items) => self.parse_bare_array(name, items),
            serde_json::Value::Object(map) => self.parse_mapping(name, map),
            scalar => {
                // 标量项是直接值
                self.descriptors.push(ServiceDescriptor {
                    name: name.to_string(),
                    kind: ServiceKind::DirectValue,
                    target: Target::Value(Value::from_json(scalar)),
                    arguments: Vec::new(),
                    suffix: Vec::new(),
                    reverse_aliases: Vec::new(),
                });
                Ok(())
            }
        }
    }

    fn parse_shorthand(&mut self, name: &str, s: &str) -> Result<(), ContainerError> {
        if let Some(rest) = s.strip_prefix('@') {
            if rest.is_empty() {
                return Err(ContainerError::invalid_spec(name, "empty reference"));
            }
            if rest.contains("->") {
                let chain = parse_chain(name, rest)?;
                self.descriptors.push(ServiceDescriptor {
                    name: name.to_string(),
                    kind: ServiceKind::DirectValue,
                    target: Target::Reference(chain),
                    arguments: Vec::new(),
                    suffix: Vec::new(),
                    reverse_aliases: Vec::new(),
                });
            } else {
                self.push_alias(name, rest)?;
            }
            return Ok(());
        }

        if let Some((type_name, rest)) = s.split_once("::") {
            let (method, arguments) = match rest.split_once(':') {
                Some((m, args)) => (m, parse_arg_list(name, args)?),
                None => (rest, Vec::new()),
            };
            if method.is_empty() {
                return Err(ContainerError::invalid_spec(name, "empty factory method"));
            }
            self.descriptors.push(ServiceDescriptor {
                name: name.to_string(),
                kind: ServiceKind::FactoryCall,
                target: Target::StaticMethod(type_name.to_string(), method.to_string()),
                arguments,
                suffix: Vec::new(),
                reverse_aliases: Vec::new(),
            });
            return Ok(());
        }

        let bare = !s.contains(':');
        let (type_name, arguments) = match s.split_once(':') {
            Some((t, args)) => (t, parse_arg_list(name, args)?),
            None => (s, Vec::new()),
        };
        if !self.registry.is_known(type_name) {
            return Err(ContainerError::invalid_spec(
                name,
                format!("'{}' is not a recognized constructible type", type_name),
            ));
        }

        // 整串是裸类型名时，类型名反向解析到本项；
        // 带实参的特化实例不占用类型名
        let mut reverse_aliases = Vec::new();
        if bare && type_name != name {
            reverse_aliases.push(type_name.to_string());
            self.set_alias_pair(type_name, name);
        }

        self.descriptors.push(ServiceDescriptor {
            name: name.to_string(),
            kind: ServiceKind::ConstructorCall,
            target: Target::Type(type_name.to_string()),
            arguments,
            suffix: Vec::new(),
            reverse_aliases,
        });
        Ok(())
    }

    fn parse_bare_array(
        &mut self,
        name: &str,
        items: &[serde_json::Value],
    ) -> Result<(), ContainerError> {
        if !self.registry.is_constructible(name) {
            warn!("ignoring entry '{}': bare array but name is not a constructible type", name);
            return Ok(());
        }

        let mut arguments = Vec::with_capacity(items.len());
        for item in items {
            arguments.push(parse_arg_json(name, item)?);
        }
        self.descriptors.push(ServiceDescriptor {
            name: name.to_string(),
            kind: ServiceKind::ConstructorCall,
            target: Target::Type(name.to_string()),
            arguments,
            suffix: Vec::new(),
            reverse_aliases: Vec::new(),
        });
        Ok(())
    }

    fn parse_mapping(
        &mut self,
        name: &str,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ContainerError> {
        if let Some(alias) = map.get("alias") {
            let alias = alias.as_str().ok_or_else(|| {
                ContainerError::invalid_spec(name, "'alias' must be a string")
            })?;
            if alias.contains("->") {
                let chain = parse_chain(name, alias)?;
                self.descriptors.push(ServiceDescriptor {
                    name: name.to_string(),
                    kind: ServiceKind::DirectValue,
                    target: Target::Reference(chain),
                    arguments: Vec::new(),
                    suffix: Vec::new(),
                    reverse_aliases: Vec::new(),
                });
            } else {
                self.push_alias(name, alias)?;
            }
            return Ok(());
        }

        let class = map.get("class").and_then(|v| v.as_str());

        // `to` 键把其他名称反向指到本项
        let mut reverse_aliases = Vec::new();
        match map.get("to") {
            Some(serde_json::Value::Bool(true)) => {
                if let Some(class) = class {
                    reverse_aliases.push(class.to_string());
                }
            }
            Some(serde_json::Value::String(target)) => {
                reverse_aliases.push(target.clone());
            }
            Some(serde_json::Value::Array(targets)) => {
                for target in targets {
                    if let Some(target) = target.as_str() {
                        reverse_aliases.push(target.to_string());
                    }
                }
            }
            _ => {}
        }
        reverse_aliases.retain(|r| r != name);
        for reverse in &reverse_aliases {
            self.set_alias_pair(reverse, name);
        }

        let mut arguments = Vec::new();
        if let Some(raw_args) = map.get("arguments") {
            let raw_args = raw_args.as_array().ok_or_else(|| {
                ContainerError::invalid_spec(name, "'arguments' must be an array")
            })?;
            for item in raw_args {
                arguments.push(parse_arg_json(name, item)?);
            }
        }

        let mut suffix = Vec::new();
        if let Some(props) = map.get("property") {
            let props = props.as_object().ok_or_else(|| {
                ContainerError::invalid_spec(name, "'property' must be a mapping")
            })?;
            for (prop, raw) in props {
                suffix.push(SuffixOp::Property(prop.clone(), parse_arg_json(name, raw)?));
            }
        }
        if let Some(calls) = map.get("calls") {
            let calls = calls.as_object().ok_or_else(|| {
                ContainerError::invalid_spec(name, "'calls' must be a mapping")
            })?;
            for (method, raw) in calls {
                let args = match raw {
                    serde_json::Value::Array(items) => {
                        let mut parsed = Vec::with_capacity(items.len());
                        for item in items {
                            parsed.push(parse_arg_json(name, item)?);
                        }
                        parsed
                    }
                    _ => Vec::new(),
                };
                suffix.push(SuffixOp::Call(method.clone(), args));
            }
        }

        let (kind, target, mut leading_args) = self.determine_target(name, map, class)?;
        leading_args.extend(arguments);

        self.descriptors.push(ServiceDescriptor {
            name: name.to_string(),
            kind,
            target,
            arguments: leading_args,
            suffix,
            reverse_aliases,
        });
        Ok(())
    }

    /// 目标优先级：factory > class > 名称自身是可构造类型
    fn determine_target(
        &self,
        name: &str,
        map: &serde_json::Map<String, serde_json::Value>,
        class: Option<&str>,
    ) -> Result<(ServiceKind, Target, Vec<Expr>), ContainerError> {
        if let Some(factory) = map.get("factory") {
            return match factory {
                serde_json::Value::String(f) => self.parse_factory_string(name, f),
                serde_json::Value::Array(pair) => {
                    let type_name = pair.first().and_then(|v| v.as_str());
                    let method = pair.get(1).and_then(|v| v.as_str());
                    match (type_name, method, pair.len()) {
                        (Some(t), Some(m), 2) => Ok((
                            ServiceKind::FactoryCall,
                            Target::StaticMethod(t.to_string(), m.to_string()),
                            Vec::new(),
                        )),
                        _ => Err(ContainerError::invalid_spec(
                            name,
                            "'factory' pair must be [type, method]",
                        )),
                    }
                }
                _ => Err(ContainerError::invalid_spec(
                    name,
                    "factory expression not reducible to a callable or type identifier",
                )),
            };
        }

        if let Some(class) = class {
            let (type_name, args) = self.parse_class_string(name, class)?;
            return Ok((ServiceKind::ConstructorCall, Target::Type(type_name), args));
        }

        if self.registry.is_constructible(name) {
            return Ok((
                ServiceKind::ConstructorCall,
                Target::Type(name.to_string()),
                Vec::new(),
            ));
        }

        Err(ContainerError::invalid_spec(
            name,
            "no determinable build target",
        ))
    }

    fn parse_factory_string(
        &self,
        name: &str,
        factory: &str,
    ) -> Result<(ServiceKind, Target, Vec<Expr>), ContainerError> {
        if factory.starts_with('@') {
            return Err(ContainerError::invalid_spec(
                name,
                "factory expression not reducible to a callable or type identifier",
            ));
        }

        if let Some((type_name, rest)) = factory.split_once("::") {
            let (method, args) = match rest.split_once(':') {
                Some((m, args)) => (m, parse_arg_list(name, args)?),
                None => (rest, Vec::new()),
            };
            if method.is_empty() {
                return Err(ContainerError::invalid_spec(name, "empty factory method"));
            }
            return Ok((
                ServiceKind::FactoryCall,
                Target::StaticMethod(type_name.to_string(), method.to_string()),
                args,
            ));
        }

        let (type_name, args) = self.parse_class_string(name, factory)?;
        Ok((ServiceKind::ConstructorCall, Target::Type(type_name), args))
    }

    fn parse_class_string(
        &self,
        name: &str,
        class: &str,
    ) -> Result<(String, Vec<Expr>), ContainerError> {
        let (type_name, args) = match class.split_once(':') {
            Some((t, args)) => (t, parse_arg_list(name, args)?),
            None => (class, Vec::new()),
        };
        if !self.registry.is_known(type_name) {
            return Err(ContainerError::invalid_spec(
                name,
                format!("'{}' is not a recognized constructible type", type_name),
            ));
        }
        Ok((type_name.to_string(), args))
    }

    fn push_alias(&mut self, alias: &str, canonical: &str) -> Result<(), ContainerError> {
        if alias == canonical {
            return Err(ContainerError::invalid_spec(
                alias,
                "alias cannot point to itself",
            ));
        }
        self.set_alias_pair(alias, canonical);
        self.descriptors.push(ServiceDescriptor {
            name: alias.to_string(),
            kind: ServiceKind::Alias,
            target: Target::Reference(RefChain {
                name: canonical.to_string(),
                path: Vec::new(),
            }),
            arguments: Vec::new(),
            suffix: Vec::new(),
            reverse_aliases: Vec::new(),
        });
        Ok(())
    }

    /// 同名别名后写者胜
    fn set_alias_pair(&mut self, alias: &str, canonical: &str) {
        match self.aliases.iter_mut().find(|(a, _)| a == alias) {
            Some((_, c)) => *c = canonical.to_string(),
            None => self.aliases.push((alias.to_string(), canonical.to_string())),
        }
    }
}

fn parse_arg_json(owner: &str, raw: &serde_json::Value) -> Result<Expr, ContainerError> {
    match raw {
        serde_json::Value::String(s) => parse_arg_str(owner, s),
        other => Ok(Expr::Literal(Value::from_json(other))),
    }
}

/// 单个 `@`（非双写）开头是引用，其余原样作为字面量
fn parse_arg_str(owner: &str, s: &str) -> Result<Expr, ContainerError> {
    if s.len() > 1 && s.starts_with('@') && !s.starts_with("@@") {
        return Ok(Expr::Ref(parse_chain(owner, &s[1..])?));
    }
    Ok(Expr::Literal(Value::Str(s.to_string())))
}

fn parse_arg_list(owner: &str, args: &str) -> Result<Vec<Expr>, ContainerError> {
    if args.is_empty() {
        return Ok(Vec::new());
    }
    args.split(',').map(|a| parse_arg_str(owner, a)).collect()
}

fn parse_chain(owner: &str, s: &str) -> Result<RefChain, ContainerError> {
    let mut parts = s.split("->");
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(ContainerError::invalid_spec(owner, "empty reference name"));
    }

    let mut path = Vec::new();
    for segment in parts {
        let access = match segment.split_once(':') {
            Some((member, args)) => Access {
                member: member.to_string(),
                args: Some(parse_arg_list(owner, args)?),
            },
            None => Access {
                member: segment.to_string(),
                args: None,
            },
        };
        if access.member.is_empty() {
            return Err(ContainerError::invalid_spec(owner, "empty chain segment"));
        }
        path.push(access);
    }

    Ok(RefChain {
        name: name.to_string(),
        path,
    })
}
