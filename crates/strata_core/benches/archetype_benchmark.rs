//! # Archetype Access Benchmark
//!
//! Compares linear chunk iteration with handle-based random access, and
//! measures how iteration holds up when entities are spread over several
//! archetypes.

#![allow(missing_docs)]

use bytemuck::{Pod, Zeroable};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_core::{ChunkLayout, Component, ComponentInfo, Entity, World};

const ENTITY_COUNT: usize = 100_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Tint {
    rgba: u32,
}
impl Component for Tint {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Mass {
    kg: f64,
}
impl Component for Mass {}

/// Generate deterministic "random" indices
fn generate_random_indices(count: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut indices = Vec::with_capacity(count);
    let mut state = seed;

    for _ in 0..count {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        indices.push((state as usize) % max);
    }

    indices
}

fn spawn_pv(world: &mut World, i: usize) -> Entity {
    world.spawn((
        Position { x: i as f32, y: i as f32, z: i as f32 },
        Velocity { x: 0.1, y: 0.2, z: 0.3 },
    ))
}

fn bench_linear(c: &mut Criterion) {
    let mut world = World::new();
    for i in 0..ENTITY_COUNT {
        spawn_pv(&mut world, i);
    }

    c.bench_function("archetype_linear_update_100k", |b| {
        b.iter(|| {
            for (_, (pos, vel)) in world.query_mut::<(Position, Velocity)>() {
                pos.x += vel.x;
            }
            black_box(world.entity_count())
        });
    });
}

fn bench_random(c: &mut Criterion) {
    let mut world = World::new();
    let entity_ids: Vec<Entity> = (0..ENTITY_COUNT).map(|i| spawn_pv(&mut world, i)).collect();
    let random_indices = generate_random_indices(ENTITY_COUNT, ENTITY_COUNT, 0xDEAD_BEEF);

    c.bench_function("archetype_random_access_100k", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for &idx in &random_indices {
                if let Some(pos) = world.get_component_ref::<Position>(entity_ids[idx]) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });
}

// =============================================================================
// FRAGMENTATION
// =============================================================================

fn bench_fragmented(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmentation");

    group.bench_function("four_archetypes", |b| {
        let mut world = World::new();
        for i in 0..ENTITY_COUNT {
            let entity = spawn_pv(&mut world, i);
            if i % 2 == 0 {
                world.add_component(entity, Tint { rgba: 0xFF00_FFFF });
            }
            if i % 3 == 0 {
                world.add_component(entity, Mass { kg: 1.0 });
            }
        }

        b.iter(|| {
            let mut sum = 0.0f32;
            world.for_each::<(Position, Velocity)>(|_, (pos, vel)| sum += pos.x * vel.x);
            black_box(sum)
        });
    });

    group.bench_function("half_destroyed", |b| {
        let mut world = World::new();
        let entities: Vec<Entity> = (0..ENTITY_COUNT).map(|i| spawn_pv(&mut world, i)).collect();
        for &idx in &generate_random_indices(ENTITY_COUNT / 2, ENTITY_COUNT, 0x1234_5678) {
            world.destroy_entity(entities[idx]);
        }

        b.iter(|| {
            let mut sum = 0.0f32;
            world.for_each::<(Position,)>(|_, (pos,)| sum += pos.x);
            black_box(sum)
        });
    });

    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let infos = [
        ComponentInfo::of::<Position>(),
        ComponentInfo::of::<Velocity>(),
        ComponentInfo::of::<Tint>(),
        ComponentInfo::of::<Mass>(),
    ];

    c.bench_function("chunk_layout_compute_4", |b| {
        b.iter(|| black_box(ChunkLayout::compute(black_box(&infos)).capacity()));
    });
}

criterion_group!(benches, bench_linear, bench_random, bench_fragmented, bench_layout);
criterion_main!(benches);
