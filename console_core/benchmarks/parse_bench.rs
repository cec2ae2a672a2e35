use console_core::{Callbacks, CommandSchema, Console, ConsoleConfig, Inspect, OptionSpec, ScalarKind};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

struct Idle;

impl Inspect for Idle {
    type Stats = u64;

    fn stats(&self) -> u64 {
        0
    }
}

fn build_console() -> Console<Idle> {
    let mut console = Console::new(ConsoleConfig::default(), Callbacks::new());
    console
        .add_command(
            CommandSchema::new("query")
                .option(OptionSpec::int("n").default_value(25))
                .option(OptionSpec::int("page").default_value(1))
                .option(OptionSpec::list("comps", ScalarKind::Text))
                .option(OptionSpec::list("without", ScalarKind::Text))
                .option(OptionSpec::flag("full")),
            |_, _, _| Ok(()),
        )
        .expect("query should register");
    console
}

fn bench_parse(c: &mut Criterion) {
    let console = build_console();
    let mut group = c.benchmark_group("parse");

    let inputs = [
        ("bare", "query"),
        ("options", "query n=100 page=3 full"),
        ("lists", "query comps=Position,Velocity,Mass without=Hidden,Frozen"),
        ("help", "help query"),
        ("block", "$\nspawn 10\nstep 5\n$"),
    ];
    for (name, input) in inputs {
        group.bench_with_input(BenchmarkId::new("input", name), &input, |b, input| {
            b.iter(|| console.parse(input))
        });
    }

    group.finish();
}

criterion_group!(parse_benches, bench_parse);
criterion_main!(parse_benches);
