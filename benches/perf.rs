use criterion::{Criterion, black_box, criterion_group, criterion_main};
use entity_mvcc::model::{Entity, Id, Scope};
use entity_mvcc::pipeline::CollectionIoEvent;
use entity_mvcc::{CollectionManager, EngineConfig, EntityEngine};
use tokio::runtime::Runtime;
use uuid::Uuid;

const FIELDS: i64 = 16;
const PARTIAL_VERSIONS: i64 = 8;

fn payload(id: &Id, generation: i64) -> Entity {
    let mut entity = Entity::new(id.clone());
    for field in 0..FIELDS {
        entity.set_field(format!("field_{field}"), generation * 100 + field);
    }
    entity.set_field("name", format!("user-{generation}"));
    entity
}

fn setup() -> (EntityEngine, CollectionManager) {
    let engine = EntityEngine::in_memory(EngineConfig::default()).expect("engine");
    let users = engine
        .collection(Scope::new(Uuid::new_v4(), "users"))
        .expect("collection");
    (engine, users)
}

fn bench_write(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let (_, users) = setup();
    let id = Id::new("user");
    let mut generation = 0i64;
    c.bench_function("write_full_pipeline", |b| {
        b.to_async(&rt).iter(|| {
            generation += 1;
            let entity = payload(&id, generation);
            let users = users.clone();
            async move { black_box(users.write(entity).await.expect("write")) }
        })
    });
}

fn bench_load_complete(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let (_, users) = setup();
    let id = Id::new("user");
    rt.block_on(async {
        for generation in 0..4 {
            users.write(payload(&id, generation)).await.expect("seed");
        }
    });
    c.bench_function("load_newest_complete", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(users.load(&id).await.expect("load")) })
    });
}

fn bench_load_repair(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let (engine, users) = setup();
    let id = Id::new("user");
    rt.block_on(async {
        users.write(payload(&id, 0)).await.expect("base");
        // Commit markers without promoted rows force a replay on every read.
        let pipeline = engine.pipeline();
        for generation in 1..=PARTIAL_VERSIONS {
            let started = pipeline
                .write_start()
                .call(CollectionIoEvent::new(
                    users.scope().clone(),
                    payload(&id, generation),
                ))
                .await
                .expect("start");
            let persisted = pipeline.write_persist().call(started).await.expect("persist");
            let (scope, row) = persisted.into_parts();
            users
                .log_store()
                .write(
                    &scope,
                    &entity_mvcc::MvccLogEntry::new(
                        id.clone(),
                        row.version(),
                        entity_mvcc::Stage::Complete,
                    ),
                )
                .await
                .expect("commit marker");
        }
    });
    c.bench_function("load_with_repair", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(users.load(&id).await.expect("load")) })
    });
}

criterion_group!(benches, bench_write, bench_load_complete, bench_load_repair);
criterion_main!(benches);
