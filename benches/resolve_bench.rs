//! 解析与编译的性能基准测试

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use wirebox::{
    ArgMap, Compiler, Container, ParameterSpec, Specification, TypeDef, TypeRegistry, Value,
};

fn build_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register(TypeDef::new("Logger").constructor(|_| Ok(Value::object("Logger", ()))));
    registry.register(
        TypeDef::new("Widget")
            .param(
                ParameterSpec::new("log")
                    .typed("Logger")
                    .with_default(Value::Null),
            )
            .param(ParameterSpec::new("size").with_default(Value::Int(1)))
            .constructor(|args| Ok(Value::object("Widget", args))),
    );
    registry
}

/// 合成一份 n 个服务的规格，间隔引用前一个服务
fn synthesize_spec(n: usize) -> String {
    let mut out = String::from("{\n\"svc0\": { \"class\": \"Widget\" }");
    for i in 1..n {
        out.push_str(&format!(
            ",\n\"svc{}\": {{ \"class\": \"Widget\", \"arguments\": [\"@svc{}\"] }}",
            i,
            i - 1
        ));
    }
    out.push('}');
    out
}

/// 基准测试：缓存命中的重复解析
fn bench_cached_resolution(c: &mut Criterion) {
    let registry = Arc::new(build_registry());
    let mut container = Container::new(Arc::clone(&registry));
    container
        .register_type("widget", "Widget", ArgMap::new())
        .unwrap();
    container.get("widget").unwrap();

    c.bench_function("cached_get", |b| {
        b.iter(|| black_box(container.get(black_box("widget")).unwrap()))
    });
}

/// 基准测试：首次解析（含参数绑定与构造）
fn bench_cold_resolution(c: &mut Criterion) {
    let registry = Arc::new(build_registry());

    c.bench_function("cold_get", |b| {
        b.iter(|| {
            let mut container = Container::new(Arc::clone(&registry));
            container
                .register_type("widget", "Widget", ArgMap::new())
                .unwrap();
            black_box(container.get("widget").unwrap())
        })
    });
}

/// 基准测试：不同规模规格的解析 + 装载 + 全量求值
fn bench_spec_load_and_resolve(c: &mut Criterion) {
    let registry = Arc::new(build_registry());
    let mut group = c.benchmark_group("spec_resolve");

    for size in [10usize, 50, 100] {
        let json = synthesize_spec(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &json, |b, json| {
            b.iter(|| {
                let spec = Specification::from_json_str(&registry, json).unwrap();
                let mut container = Container::new(Arc::clone(&registry));
                container.load(&spec).unwrap();
                black_box(container.get(&format!("svc{}", size - 1)).unwrap())
            })
        });
    }
    group.finish();
}

/// 基准测试：静态编译
fn bench_compile(c: &mut Criterion) {
    let registry = build_registry();
    let json = synthesize_spec(100);
    let spec = Specification::from_json_str(&registry, &json).unwrap();

    c.bench_function("compile_100", |b| {
        let compiler = Compiler::new(&registry);
        b.iter(|| black_box(compiler.compile(&spec).unwrap().render()))
    });
}

criterion_group!(
    benches,
    bench_cached_resolution,
    bench_cold_resolution,
    bench_spec_load_and_resolve,
    bench_compile
);
criterion_main!(benches);
