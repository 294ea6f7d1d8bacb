//! Randomized structural-change stress test.
//!
//! Replays a deterministic stream of create/destroy/add/remove/write
//! operations against a world and a plain shadow model, checking values
//! and storage invariants as it goes.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use strata_core::{Component, Entity, World, WorldConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Small {
    value: u8,
}
impl Component for Small {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Wide {
    value: u64,
}
impl Component for Wide {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Heavy {
    payload: [u32; 32],
}
impl Component for Heavy {}

/// Shadow copy of one entity's components.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Expected {
    small: Option<u8>,
    wide: Option<u64>,
    heavy: Option<u32>,
}

/// Xorshift64, deterministic across runs.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

fn check(world: &World, model: &HashMap<Entity, Expected>) {
    world.verify_integrity().unwrap();
    assert_eq!(world.entity_count(), model.len());

    for (&entity, expected) in model {
        let actual = Expected {
            small: world.get_component_ref::<Small>(entity).map(|c| c.value),
            wide: world.get_component_ref::<Wide>(entity).map(|c| c.value),
            heavy: world.get_component_ref::<Heavy>(entity).map(|c| c.payload[31]),
        };
        assert_eq!(&actual, expected, "entity {entity}");
    }

    let with_small = model.values().filter(|e| e.small.is_some()).count();
    assert_eq!(world.query_count::<(Small,)>(), with_small);
    let mut visited = 0;
    world.for_each::<(Small, Wide)>(|entity, (small, wide)| {
        let expected = model[&entity];
        assert_eq!(Some(small.value), expected.small);
        assert_eq!(Some(wide.value), expected.wide);
        visited += 1;
    });
    let with_both = model
        .values()
        .filter(|e| e.small.is_some() && e.wide.is_some())
        .count();
    assert_eq!(visited, with_both);
}

fn run(seed: u64, config: WorldConfig, steps: usize) {
    let mut rng = Rng(seed);
    let mut world = World::with_config(config);
    let mut model: HashMap<Entity, Expected> = HashMap::new();
    let mut live: Vec<Entity> = Vec::new();
    let mut dead: Vec<Entity> = Vec::new();

    for step in 0..steps {
        let pick = if live.is_empty() { None } else { Some(rng.below(live.len())) };
        match (rng.below(8), pick) {
            (0 | 1, _) | (_, None) => {
                let tag = rng.next() as u8;
                let entity = world.spawn((Small { value: tag },));
                model.insert(entity, Expected { small: Some(tag), ..Expected::default() });
                live.push(entity);
            }
            (2, Some(i)) => {
                let entity = live.swap_remove(i);
                assert!(world.destroy_entity(entity));
                model.remove(&entity);
                dead.push(entity);
            }
            (3, Some(i)) => {
                let entity = live[i];
                let value = rng.next();
                let added = world.add_component(entity, Wide { value });
                let slot = &mut model.get_mut(&entity).unwrap().wide;
                assert_eq!(added, slot.is_none());
                if added {
                    *slot = Some(value);
                }
            }
            (4, Some(i)) => {
                let entity = live[i];
                let fill = rng.next() as u32;
                let added = world.add_component(entity, Heavy { payload: [fill; 32] });
                let slot = &mut model.get_mut(&entity).unwrap().heavy;
                assert_eq!(added, slot.is_none());
                if added {
                    *slot = Some(fill);
                }
            }
            (5, Some(i)) => {
                let entity = live[i];
                let expected = model.get_mut(&entity).unwrap();
                let (removed, had) = match rng.below(3) {
                    0 => (world.remove_component::<Small>(entity), expected.small.take().is_some()),
                    1 => (world.remove_component::<Wide>(entity), expected.wide.take().is_some()),
                    _ => (world.remove_component::<Heavy>(entity), expected.heavy.take().is_some()),
                };
                assert_eq!(removed, had);
            }
            (6, Some(i)) => {
                let entity = live[i];
                let value = rng.next();
                let written = world.set_component(entity, Wide { value });
                let slot = &mut model.get_mut(&entity).unwrap().wide;
                assert_eq!(written, slot.is_some());
                if written {
                    *slot = Some(value);
                }
            }
            (_, Some(_)) => {
                if let Some(&stale) = dead.last() {
                    assert!(!world.destroy_entity(stale));
                    assert!(!world.add_component(stale, Wide::default()));
                    assert!(world.get_component_ref::<Small>(stale).is_none());
                }
            }
        }

        if step % 97 == 0 {
            check(&world, &model);
        }
    }

    check(&world, &model);

    world.clear();
    model.clear();
    check(&world, &model);
}

#[test]
fn test_stress_default_config() {
    run(0xDEAD_BEEF, WorldConfig::default(), 20_000);
}

#[test]
fn test_stress_eager_reuse() {
    run(0x1234_5678, WorldConfig::default().with_min_free_indices(0), 20_000);
}

#[test]
fn test_stress_without_scrub() {
    let config = WorldConfig::default()
        .with_min_free_indices(8)
        .with_scrub_removed_components(false);
    run(0x0BAD_F00D, config, 10_000);
}
