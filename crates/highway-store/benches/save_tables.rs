use criterion::{Criterion, black_box, criterion_group, criterion_main};
use highway_core::{MemoryConfig, MemorySystem, Tables};
use highway_store::Store;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const PASSAGE: &str = "床前明月光，疑是地上霜。\n举头望明月，低头思故乡。";

fn tables() -> Tables {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut system = MemorySystem::new(MemoryConfig {
        vector_dim: 16,
        ..MemoryConfig::default()
    });
    for _ in 0..4 {
        system.recite_text(PASSAGE, &mut rng).unwrap();
    }
    system.snapshot()
}

fn bench_save(c: &mut Criterion) {
    let tables = tables();
    let store = Store::open_in_memory().unwrap();
    c.bench_function("save_tables", |b| {
        b.iter(|| store.save_tables(black_box(&tables)).unwrap())
    });
}

fn bench_load(c: &mut Criterion) {
    let store = Store::open_in_memory().unwrap();
    store.save_tables(&tables()).unwrap();
    c.bench_function("load_tables", |b| b.iter(|| store.load_tables().unwrap()));
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
