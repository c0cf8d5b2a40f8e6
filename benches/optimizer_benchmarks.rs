use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use csearch::prelude::*;
use csearch::registry;
use ndarray::prelude::*;
use std::time::Duration;

#[derive(Clone)]
struct TestProblem {
    name: String,
    function: fn(&Array1<f64>) -> f64,
    dimensions: usize,
}

fn sphere_function(x: &Array1<f64>) -> f64 {
    x.iter().map(|xi| (xi - 0.3) * (xi - 0.3)).sum()
}

fn rosenbrock_function(x: &Array1<f64>) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        sum += 100.0 * (x[i + 1] - x[i] * x[i]).powi(2) + (1.0 - x[i]).powi(2);
    }
    sum
}

fn rastrigin_function(x: &Array1<f64>) -> f64 {
    let a = 10.0;
    let n = x.len() as f64;
    a * n
        + x.iter()
            .map(|xi| xi * xi - a * (2.0 * std::f64::consts::PI * xi).cos())
            .sum::<f64>()
}

fn setup_test_problems() -> Vec<TestProblem> {
    vec![
        TestProblem {
            name: "sphere_2d".to_string(),
            function: sphere_function,
            dimensions: 2,
        },
        TestProblem {
            name: "rosenbrock_2d".to_string(),
            function: rosenbrock_function,
            dimensions: 2,
        },
        TestProblem {
            name: "sphere_5d".to_string(),
            function: sphere_function,
            dimensions: 5,
        },
        TestProblem {
            name: "rastrigin_3d".to_string(),
            function: rastrigin_function,
            dimensions: 3,
        },
    ]
}

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Simplex,
    Algorithm::Powell,
    Algorithm::ParticleSwarm,
    Algorithm::DifferentialEvolution,
];

fn run_search(problem: &TestProblem, algorithm: Algorithm, max_evals: usize) -> Option<(f64, usize)> {
    let cfg = OptimizerConfig::new().with_max_evaluations(max_evals).with_seed(17);
    let mut job = SearchJob::new(problem.dimensions, 0.5);
    registry::run(algorithm.def(), &cfg, &mut job, Box::new(problem.function))
        .ok()
        .map(|report| (report.fmin, report.fn_evals))
}

fn bench_algorithms(c: &mut Criterion) {
    let problems = setup_test_problems();

    let mut group = c.benchmark_group("search_algorithms");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for problem in &problems {
        for algorithm in ALGORITHMS {
            group.throughput(Throughput::Elements(problem.dimensions as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("search_{}", algorithm), &problem.name),
                &(problem, algorithm),
                |b, (prob, alg)| {
                    b.iter(|| black_box(run_search(black_box(prob), black_box(*alg), black_box(2000))));
                },
            );
        }
    }
    group.finish();
}

fn bench_dimension_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_dimensions");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(12);

    for algorithm in ALGORITHMS {
        for &dim in &[2, 5, 10] {
            let problem = TestProblem {
                name: format!("sphere_{}d", dim),
                function: sphere_function,
                dimensions: dim,
            };

            group.throughput(Throughput::Elements(dim as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("sphere_{}", algorithm), dim),
                &(problem, algorithm),
                |b, (prob, alg)| {
                    b.iter(|| black_box(run_search(black_box(prob), black_box(*alg), black_box(5000))));
                },
            );
        }
    }
    group.finish();
}

fn bench_annealing_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("annealing_schedule");
    group.sample_size(10);

    for &evals in &[50usize, 200] {
        group.bench_with_input(BenchmarkId::new("sphere_2d", evals), &evals, |b, &evals| {
            b.iter(|| {
                let mut budgets = Budgets::default();
                budgets.annealing_iter_limit = evals;
                let mut job = SearchJob::new(2, 0.5).with_budgets(budgets);
                black_box(csearch::driver::run_annealing(&mut job, Box::new(sphere_function)).ok())
            });
        });
    }
    group.finish();
}

criterion_group!(
    optimizer_benches,
    bench_algorithms,
    bench_dimension_scaling,
    bench_annealing_schedule,
);
criterion_main!(optimizer_benches);
