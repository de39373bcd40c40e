//! 静态编译器
//!
//! 把解析完的规格翻译成生成式分发源文本：每个非别名描述符产出一个
//! 确定性命名的访问器方法体，外加三张有序表（名称 → 访问器、别名表、
//! 抽象别名反查表）。产物只是文本与表，拼装进文件骨架是外部协作方的事。
//!
//! 访问器标识按种类加前缀以避免跨类冲突：名称是已声明类型时用
//! `srv_type__`，否则用 `srv_name__`；`::` 映射为 `__`，
//! 其余非字母数字字符映射为 `_`，统一小写。同一份规格编译两次
//! 必须得到逐字节相同的产物。

use serde::Serialize;

use log::debug;

use crate::error::ContainerError;
use crate::registry::TypeRegistry;
use crate::spec::{
    Expr, RefChain, ServiceDescriptor, ServiceKind, Specification, SuffixOp, Target,
};
use crate::value::Value;

/// 单个入口访问器
#[derive(Debug, Clone, Serialize)]
pub struct EntryPoint {
    pub name: String,
    pub ident: String,
    /// 生成的方法体源文本
    pub body: String,
}

/// 编译产物：三张有序表加方法体
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompiledUnit {
    /// 服务名 → 访问器标识
    pub methods: Vec<(String, String)>,
    /// 别名 → 规范名
    pub aliases: Vec<(String, String)>,
    /// 规范名 → 指向它的全部别名
    pub abstract_aliases: Vec<(String, Vec<String>)>,
    pub entry_points: Vec<EntryPoint>,
}

impl CompiledUnit {
    /// 平文本转储：表在前，方法体在后
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("// methods\n");
        for (name, ident) in &self.methods {
            out.push_str(&format!("{:?} => {},\n", name, ident));
        }

        out.push_str("\n// aliases\n");
        for (alias, canonical) in &self.aliases {
            out.push_str(&format!("{:?} => {:?},\n", alias, canonical));
        }

        out.push_str("\n// abstract aliases\n");
        for (canonical, aliases) in &self.abstract_aliases {
            out.push_str(&format!("{:?} <= {:?},\n", canonical, aliases));
        }

        for entry in &self.entry_points {
            out.push_str(&format!("\nfn {}(&mut self) -> Value {{\n", entry.ident));
            for line in entry.body.lines() {
                out.push_str(&format!("    {}\n", line));
            }
            out.push_str("}\n");
        }

        out
    }
}

/// 规格 → 分发源文本的翻译器；只向注册表发已知/单例两类查询
pub struct Compiler<'a> {
    types: &'a TypeRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    pub fn compile(&self, spec: &Specification) -> Result<CompiledUnit, ContainerError> {
        let mut unit = CompiledUnit {
            aliases: spec.alias_table().to_vec(),
            abstract_aliases: spec.abstract_alias_index().to_vec(),
            ..CompiledUnit::default()
        };

        for descriptor in spec.descriptors() {
            if descriptor.kind == ServiceKind::Alias {
                continue;
            }
            let ident = accessor_ident(self.types.is_known(&descriptor.name), &descriptor.name);
            let body = self.render_body(descriptor)?;
            unit.methods.push((descriptor.name.clone(), ident.clone()));
            unit.entry_points.push(EntryPoint {
                name: descriptor.name.clone(),
                ident,
                body,
            });
        }

        debug!(
            "compiled specification: {} entry points, {} aliases",
            unit.entry_points.len(),
            unit.aliases.len()
        );
        Ok(unit)
    }

    fn render_body(&self, descriptor: &ServiceDescriptor) -> Result<String, ContainerError> {
        let target = match &descriptor.target {
            Target::Value(value) => render_literal(&descriptor.name, value)?,
            Target::Reference(chain) => render_chain(&descriptor.name, chain)?,
            Target::Type(type_name) => {
                if self.types.has_singleton(type_name) {
                    format!("{}::instance()", type_name)
                } else {
                    format!(
                        "{}::new({})",
                        type_name,
                        render_args(&descriptor.name, &descriptor.arguments)?
                    )
                }
            }
            Target::StaticMethod(type_name, method) => format!(
                "{}::{}({})",
                type_name,
                method,
                render_args(&descriptor.name, &descriptor.arguments)?
            ),
        };

        if descriptor.suffix.is_empty() {
            return Ok(target);
        }

        let mut body = format!("let mut value = {};\n", target);
        for op in &descriptor.suffix {
            match op {
                SuffixOp::Property(prop, expr) => {
                    body.push_str(&format!(
                        "value.{} = {};\n",
                        prop,
                        render_expr(&descriptor.name, expr)?
                    ));
                }
                SuffixOp::Call(method, exprs) => {
                    body.push_str(&format!(
                        "value.{}({});\n",
                        method,
                        render_args(&descriptor.name, exprs)?
                    ));
                }
            }
        }
        body.push_str("value");
        Ok(body)
    }
}

/// 确定性访问器标识
pub fn accessor_ident(is_type: bool, name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 10);
    out.push_str(if is_type { "srv_type__" } else { "srv_name__" });
    for ch in name.replace("::", "__").chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    out
}

fn render_args(owner: &str, exprs: &[Expr]) -> Result<String, ContainerError> {
    let rendered = exprs
        .iter()
        .map(|e| render_expr(owner, e))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(", "))
}

fn render_expr(owner: &str, expr: &Expr) -> Result<String, ContainerError> {
    match expr {
        Expr::Literal(value) => render_literal(owner, value),
        Expr::Ref(chain) => render_chain(owner, chain),
    }
}

/// 引用 → `self.get("name")` 加链式成员访问
fn render_chain(owner: &str, chain: &RefChain) -> Result<String, ContainerError> {
    let mut out = format!("self.get({:?})", chain.name);
    for access in &chain.path {
        match &access.args {
            Some(exprs) => {
                out.push_str(&format!(
                    ".{}({})",
                    access.member,
                    render_args(owner, exprs)?
                ));
            }
            None => out.push_str(&format!(".{}", access.member)),
        }
    }
    Ok(out)
}

/// 字面量转义成可嵌入源文本的形式
fn render_literal(owner: &str, value: &Value) -> Result<String, ContainerError> {
    match value {
        Value::Null => Ok("None".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(format!("{:?}", f)),
        Value::Str(s) => Ok(format!("{:?}", s)),
        Value::List(items) => {
            let rendered = items
                .iter()
                .map(|v| render_literal(owner, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("vec![{}]", rendered.join(", ")))
        }
        other => Err(ContainerError::invalid_spec(
            owner,
            format!("value {:?} cannot be embedded in generated source", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeDef;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(TypeDef::new("Widget").constructor(|_| Ok(Value::Null)));
        registry.register(TypeDef::new("Logger").constructor(|_| Ok(Value::Null)));
        registry.register(TypeDef::new("Config").singleton(|| Value::Null));
        registry
    }

    fn compile(json: &str) -> CompiledUnit {
        let registry = registry();
        let spec = Specification::from_json_str(&registry, json).unwrap();
        Compiler::new(&registry).compile(&spec).unwrap()
    }

    #[test]
    fn test_accessor_ident_sanitization() {
        assert_eq!(accessor_ident(true, "App::Db"), "srv_type__app__db");
        assert_eq!(accessor_ident(false, "cache-pool"), "srv_name__cache_pool");
        assert_eq!(accessor_ident(false, "db"), "srv_name__db");
    }

    #[test]
    fn test_kind_prefix_prevents_collisions() {
        assert_ne!(accessor_ident(true, "db"), accessor_ident(false, "db"));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let json = r#"{
            "Widget": {},
            "svc": { "class": "Logger", "arguments": [1, "@Widget"] },
            "w": "@Widget"
        }"#;
        let a = compile(json);
        let b = compile(json);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_entry_point_and_alias_tables() {
        let unit = compile(r#"{ "Foo": 1, "Widget": {}, "Bar": "@Widget" }"#);

        // 每个非别名项一个访问器，别名单独建表
        assert_eq!(unit.entry_points.len(), 2);
        assert_eq!(unit.methods.len(), 2);
        assert_eq!(
            unit.aliases,
            vec![("Bar".to_string(), "Widget".to_string())]
        );
        assert_eq!(unit.methods[0], ("Foo".to_string(), "srv_name__foo".to_string()));
        assert_eq!(
            unit.methods[1],
            ("Widget".to_string(), "srv_type__widget".to_string())
        );
    }

    #[test]
    fn test_constructor_body() {
        let unit = compile(r#"{ "svc": { "class": "Widget", "arguments": ["@Logger", 42] } }"#);
        assert_eq!(
            unit.entry_points[0].body,
            "Widget::new(self.get(\"Logger\"), 42)"
        );
    }

    #[test]
    fn test_singleton_type_renders_instance_accessor() {
        let unit = compile(r#"{ "cfg": "Config" }"#);
        assert_eq!(unit.entry_points[0].body, "Config::instance()");
    }

    #[test]
    fn test_static_factory_body() {
        let unit = compile(r#"{ "pool": "Widget::open:dsn" }"#);
        assert_eq!(unit.entry_points[0].body, "Widget::open(\"dsn\")");
    }

    #[test]
    fn test_chained_reference_body() {
        let unit = compile(r#"{ "conn": "@Widget->connect:ro->handle" }"#);
        assert_eq!(
            unit.entry_points[0].body,
            "self.get(\"Widget\").connect(\"ro\").handle"
        );
    }

    #[test]
    fn test_suffix_ops_emit_statements() {
        let unit = compile(
            r#"{ "svc": {
                "class": "Widget",
                "property": { "label": "main" },
                "calls": { "init": [7] }
            } }"#,
        );
        assert_eq!(
            unit.entry_points[0].body,
            "let mut value = Widget::new();\nvalue.label = \"main\";\nvalue.init(7);\nvalue"
        );
    }

    #[test]
    fn test_string_literal_is_escaped() {
        let unit = compile(r#"{ "svc": { "class": "Widget", "arguments": ["a\"b"] } }"#);
        assert_eq!(unit.entry_points[0].body, "Widget::new(\"a\\\"b\")");
    }

    #[test]
    fn test_render_dump_contains_tables_and_bodies() {
        let unit = compile(r#"{ "Widget": {}, "w": "@Widget" }"#);
        let text = unit.render();
        assert!(text.contains("// methods"));
        assert!(text.contains("\"Widget\" => srv_type__widget"));
        assert!(text.contains("// aliases"));
        assert!(text.contains("\"w\" => \"Widget\""));
        assert!(text.contains("fn srv_type__widget(&mut self) -> Value {"));
        assert!(text.contains("Widget::new()"));
    }
}
