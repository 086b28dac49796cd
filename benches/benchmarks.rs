// benches/benchmarks.rs

use camino::Utf8PathBuf;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use digger_config::config::Project;
use digger_config::match_include_exclude_patterns_to_file;
use digger_config::terragrunt::parser::parse_terragrunt_file;
use digger_config::walker::{DirWalker, TerragruntDirWalker, TopLevelTerraformDirWalker, DEFAULT_TERRAFORM_FILE_PATTERN};

fn fixture(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn bench_walkers(c: &mut Criterion) {
    let terraform = fixture("terraform_only");
    let terragrunt = fixture("terragrunt");
    let walker = TopLevelTerraformDirWalker::new(DEFAULT_TERRAFORM_FILE_PATTERN).unwrap();

    c.bench_function("walk/terraform", |b| b.iter(|| walker.get_dirs(black_box(&terraform))));
    c.bench_function("walk/terragrunt", |b| {
        b.iter(|| TerragruntDirWalker.get_dirs(black_box(&terragrunt)))
    });
}

fn bench_matcher(c: &mut Criterion) {
    let include = vec!["projects/dev/**/*".to_string(), "modules/**".to_string()];
    let exclude = vec!["projects/dev/project".to_string()];
    let files = ["projects/dev/test/test1", "projects/dev/project", "other/main.tf"];

    let mut group = c.benchmark_group("match_patterns");
    for file in files {
        group.bench_with_input(BenchmarkId::new("file", file), file, |b, file| {
            b.iter(|| match_include_exclude_patterns_to_file(black_box(file), &include, &exclude))
        });
    }
    group.finish();
}

fn bench_select_affected(c: &mut Criterion) {
    let projects: Vec<Project> = (0..200)
        .map(|i| Project {
            name: format!("project-{}", i),
            dir: format!("envs/env{:03}", i),
            include_patterns: vec!["modules/**".to_string()],
            ..Default::default()
        })
        .collect();
    let changed = ["envs/env150/main.tf", "docs/README.md"];

    c.bench_function("select_affected/200_projects", |b| {
        b.iter(|| {
            projects
                .iter()
                .filter(|p| p.is_modified_by(black_box(&changed)).unwrap_or(false))
                .count()
        })
    });
}

fn bench_parse_hcl(c: &mut Criterion) {
    let path = fixture("terragrunt/live/app/terragrunt.hcl");

    c.bench_function("parse_hcl/dependency", |b| b.iter(|| parse_terragrunt_file(black_box(&path))));
}

criterion_group!(benches, bench_walkers, bench_matcher, bench_select_affected, bench_parse_hcl);
criterion_main!(benches);
