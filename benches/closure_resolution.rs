use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::path::Path;
use tempfile::TempDir;
use webfx_modgraph::module::registry::DESCRIPTOR_FILE;
use webfx_modgraph::{BuildInfo, ResolverConfig, Target, TargetTag, Workspace};

const LAYERS: usize = 6;
const WIDTH: usize = 8;

fn write(dir: &Path, text: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(DESCRIPTOR_FILE), text).unwrap();
}

/// Layered project: every module depends transitively on the whole next layer
fn create_layered_tree() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("project");
    let mut children = vec!["\"app\"".to_string()];
    for layer in 0..LAYERS {
        for i in 0..WIDTH {
            children.push(format!("\"l{}-m{}\"", layer, i));
        }
    }
    write(&root, &format!("name = \"bench\"\nmodules = [{}]\n", children.join(", ")));

    let layer_deps = |layer: usize| -> String {
        (0..WIDTH)
            .map(|i| format!("[[dependencies]]\nname = \"l{}-m{}\"\ntransitive = true\n\n", layer, i))
            .collect()
    };
    write(&root.join("app"), &format!("executable = true\n\n{}", layer_deps(0)));
    for layer in 0..LAYERS {
        let deps = if layer + 1 < LAYERS {
            layer_deps(layer + 1)
        } else {
            String::new()
        };
        for i in 0..WIDTH {
            write(&root.join(format!("l{}-m{}", layer, i)), &deps);
        }
    }
    temp_dir
}

fn open(temp_dir: &TempDir) -> Workspace {
    let mut config = ResolverConfig::for_workspace(temp_dir.path().join("project"));
    config.repository.local_dir = temp_dir.path().join("repo");
    config.repository.offline = true;
    Workspace::open(&config).unwrap()
}

fn benchmark_cold_closure(c: &mut Criterion) {
    let temp_dir = create_layered_tree();
    let build = BuildInfo::library();

    c.bench_function("closure_cold_library", |b| {
        b.iter_batched(
            || open(&temp_dir),
            |workspace| {
                let app = workspace.module("app").unwrap();
                let closure = workspace.resolver().transitive_dependencies(&app, &build);
                black_box(closure.count())
            },
            BatchSize::SmallInput,
        )
    });
}

fn benchmark_cached_closure(c: &mut Criterion) {
    let temp_dir = create_layered_tree();
    let workspace = open(&temp_dir);
    let app = workspace.module("app").unwrap();
    let build = BuildInfo::executable(Target::single(TargetTag::Jre));
    let closure = workspace.resolver().transitive_dependencies(&app, &build);
    closure.count();

    c.bench_function("closure_cached_replay", |b| {
        b.iter(|| black_box(closure.count()))
    });
}

fn benchmark_web_artifacts(c: &mut Criterion) {
    let temp_dir = create_layered_tree();
    let build = BuildInfo::executable(Target::single(TargetTag::Gwt));

    c.bench_function("artifacts_web_executable", |b| {
        b.iter_batched(
            || open(&temp_dir),
            |workspace| {
                let app = workspace.module("app").unwrap();
                black_box(workspace.artifacts().artifacts(&app, &build).unwrap().len())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    benchmark_cold_closure,
    benchmark_cached_closure,
    benchmark_web_artifacts
);
criterion_main!(benches);
