//! 静态编译器的集成测试：同一份规格走运行时路径与编译路径

use std::sync::Arc;

use wirebox::{
    Compiler, Container, ParameterSpec, Specification, TypeDef, TypeRegistry, Value,
};

fn build_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register(TypeDef::new("Foo").constructor(|_| Ok(Value::object("Foo", ()))));
    registry.register(
        TypeDef::new("Widget")
            .param(ParameterSpec::new("log").typed("Logger"))
            .param(ParameterSpec::new("size"))
            .constructor(|args| Ok(Value::object("Widget", args)))
            .method("init", vec![], |_, _| Ok(Value::Null)),
    );
    registry.register(TypeDef::new("Logger").constructor(|_| Ok(Value::object("Logger", ()))));
    registry
}

#[test]
fn test_alias_scenario_compiles_to_tables() {
    let registry = build_registry();
    let spec =
        Specification::from_json_str(&registry, r#"{ "Foo": {}, "Bar": "@Foo" }"#).unwrap();
    let unit = Compiler::new(&registry).compile(&spec).unwrap();

    // 每个非别名项一个访问器
    assert_eq!(unit.entry_points.len(), 1);
    assert_eq!(unit.entry_points[0].name, "Foo");
    assert_eq!(unit.entry_points[0].ident, "srv_type__foo");

    // 别名表把 Bar 映射到 Foo，反查表分组到规范名
    assert_eq!(unit.aliases, vec![("Bar".to_string(), "Foo".to_string())]);
    assert_eq!(
        unit.abstract_aliases,
        vec![("Foo".to_string(), vec!["Bar".to_string()])]
    );
}

#[test]
fn test_same_spec_satisfies_both_interpreters() {
    let registry = build_registry();
    let json = r#"{ "svc": {
        "class": "Widget",
        "arguments": ["@Logger", 42],
        "calls": { "init": [] }
    } }"#;

    let spec = Specification::from_json_str(&registry, json).unwrap();
    let unit = Compiler::new(&registry).compile(&spec).unwrap();

    // 编译路径：构造实参与钩子都出现在生成文本里
    assert_eq!(
        unit.entry_points[0].body,
        "let mut value = Widget::new(self.get(\"Logger\"), 42);\nvalue.init();\nvalue"
    );

    // 运行时路径：同一份规格装载后可以解析
    let spec = Specification::from_json_str(&registry, json).unwrap();
    let mut c = Container::new(Arc::new(build_registry()));
    c.load(&spec).unwrap();
    let svc = c.get("svc").unwrap();
    let args = svc.downcast::<Vec<Value>>().unwrap();
    assert_eq!(args[1], Value::Int(42));
}

#[test]
fn test_compilation_is_byte_identical_across_runs() {
    let registry = build_registry();
    let json = r#"{
        "Widget": { "arguments": [null, 1], "to": ["w1", "w2"] },
        "log": "@Logger",
        "pool": "Foo"
    }"#;

    let first = {
        let spec = Specification::from_json_str(&registry, json).unwrap();
        Compiler::new(&registry).compile(&spec).unwrap().render()
    };
    let second = {
        let spec = Specification::from_json_str(&registry, json).unwrap();
        Compiler::new(&registry).compile(&spec).unwrap().render()
    };
    assert_eq!(first, second);
}

#[test]
fn test_compiled_unit_serializes_for_assembly() {
    let registry = build_registry();
    let spec = Specification::from_json_str(&registry, r#"{ "Foo": {} }"#).unwrap();
    let unit = Compiler::new(&registry).compile(&spec).unwrap();

    // 外部拼装方消费 JSON 形态的表
    let encoded = serde_json::to_value(&unit).unwrap();
    assert_eq!(encoded["entry_points"][0]["ident"], "srv_type__foo");
    assert_eq!(encoded["entry_points"][0]["body"], "Foo::new()");
}
