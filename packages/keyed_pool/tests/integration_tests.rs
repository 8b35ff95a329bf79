//! End-to-end behavior of keyed pools as seen by a game loop.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use capability_registry::{CapabilityRegistry, RegistryError};
use keyed_pool::{
    AcquireOptions, KeyedPool, Lifecycle, PoolConfig, PoolError, PoolService, Poolable, Released,
    TickScheduler,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Pickup {
    Health,
    Ammo,
    Armor,
}

#[derive(Clone, Default)]
struct Item {
    kind: Option<Pickup>,
    serial: u32,
    reclaimed: Rc<Cell<u32>>,
}

impl Poolable for Item {
    type Key = Pickup;

    fn key(&self) -> Option<&Pickup> {
        self.kind.as_ref()
    }

    fn set_key(&mut self, key: Pickup) {
        self.kind = Some(key);
    }

    fn activate(&mut self, _lifecycle: &mut Lifecycle<'_, Pickup>) {}

    fn deactivate(&mut self) {
        self.reclaimed.set(self.reclaimed.get() + 1);
    }
}

fn numbered_items(reclaimed: &Rc<Cell<u32>>) -> PoolConfig<Item> {
    let reclaimed = Rc::clone(reclaimed);
    let mut next_serial = 0;

    PoolConfig::from_factory(move || {
        next_serial += 1;

        Item {
            kind: None,
            serial: next_serial,
            reclaimed: Rc::clone(&reclaimed),
        }
    })
}

#[test]
fn bounded_key_hands_back_returned_instance() {
    let reclaimed = Rc::new(Cell::new(0));

    let pool = KeyedPool::builder()
        .key(
            Pickup::Health,
            numbered_items(&reclaimed).initial_size(2).max_size(3),
        )
        .build()
        .unwrap();

    let leases: Vec<_> = (0..3)
        .map(|_| pool.acquire(&Pickup::Health).unwrap())
        .collect();

    let serials: Vec<_> = leases
        .iter()
        .map(|lease| pool.get(*lease).unwrap().serial)
        .collect();
    assert_eq!(serials, vec![1, 2, 3]);

    match pool.acquire(&Pickup::Health) {
        Err(PoolError::Exhausted { max_size, .. }) => assert_eq!(max_size, 3),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(pool.len(), 3);

    pool.release(leases[1]).unwrap();

    let again = pool.acquire(&Pickup::Health).unwrap();
    assert_eq!(pool.get(again).unwrap().serial, 2);
    assert_eq!(reclaimed.get(), 1);
}

#[test]
fn issued_plus_available_always_equals_materialized() {
    let reclaimed = Rc::new(Cell::new(0));

    let pool = KeyedPool::builder()
        .key(
            Pickup::Ammo,
            numbered_items(&reclaimed).initial_size(1).max_size(5),
        )
        .build()
        .unwrap();

    let mut held = Vec::new();

    for step in 0_usize..40 {
        if step % 3 == 2 {
            if let Some(lease) = held.pop() {
                pool.release(lease).unwrap();
            }
        } else if let Ok(lease) = pool.acquire(&Pickup::Ammo) {
            held.push(lease);
        }

        let stats = pool.stats(&Pickup::Ammo).unwrap();
        assert_eq!(stats.available + stats.in_use, stats.materialized);
        assert_eq!(stats.in_use, held.len());
        assert!(stats.materialized <= stats.max_size);
    }
}

#[test]
fn releasing_twice_changes_nothing() {
    let reclaimed = Rc::new(Cell::new(0));

    let pool = KeyedPool::builder()
        .key(Pickup::Armor, numbered_items(&reclaimed).max_size(2))
        .build()
        .unwrap();

    let lease = pool.acquire(&Pickup::Armor).unwrap();

    assert_eq!(pool.release(lease).unwrap(), Released::Reclaimed);
    assert_eq!(pool.release(lease).unwrap(), Released::AlreadyAvailable);

    let stats = pool.stats(&Pickup::Armor).unwrap();
    assert_eq!(stats.available, 1);
    assert_eq!(reclaimed.get(), 1);
}

#[test]
fn explicit_release_before_delay_reclaims_once() {
    let reclaimed = Rc::new(Cell::new(0));
    let scheduler = Rc::new(TickScheduler::new());

    let pool = KeyedPool::builder()
        .key(Pickup::Health, numbered_items(&reclaimed).max_size(1))
        .scheduler(scheduler.clone())
        .build()
        .unwrap();

    let lease = pool.acquire(&Pickup::Health).unwrap();
    assert_eq!(
        pool.release_after(lease, Duration::from_millis(500))
            .unwrap(),
        Released::Scheduled
    );

    scheduler.advance(Duration::from_millis(100));
    pool.release(lease).unwrap();

    scheduler.advance(Duration::from_secs(1));

    assert_eq!(reclaimed.get(), 1);
    assert_eq!(pool.stats(&Pickup::Health).unwrap().available, 1);
}

#[test]
fn random_acquire_is_uniform_over_keys() {
    let reclaimed = Rc::new(Cell::new(0));

    let pool = KeyedPool::builder()
        .key(Pickup::Health, numbered_items(&reclaimed).max_size(1))
        .key(Pickup::Ammo, numbered_items(&reclaimed).max_size(1))
        .key(Pickup::Armor, numbered_items(&reclaimed).max_size(8))
        .build()
        .unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut counts = [0_u32; 3];

    for _ in 0..3000 {
        let lease = pool
            .acquire_random_with_rng(&mut rng, AcquireOptions::new())
            .unwrap();

        let kind = *pool.get(lease).unwrap().key().unwrap();
        let index = match kind {
            Pickup::Health => 0,
            Pickup::Ammo => 1,
            Pickup::Armor => 2,
        };
        counts[index] += 1;

        pool.release(lease).unwrap();
    }

    for count in counts {
        assert!((800..=1200).contains(&count), "skewed counts: {counts:?}");
    }
}

#[test]
fn consumers_reach_pools_through_registry() {
    let reclaimed = Rc::new(Cell::new(0));
    let mut registry = CapabilityRegistry::new();

    let pickups = KeyedPool::builder()
        .key(Pickup::Ammo, numbered_items(&reclaimed).max_size(4))
        .build()
        .unwrap();

    let installed = PoolService::builder()
        .pool("pickups", pickups)
        .build()
        .unwrap()
        .install(&mut registry)
        .unwrap();

    // A spawner that only knows the registry.
    let spawn = |registry: &CapabilityRegistry| {
        let service = registry.require::<PoolService>().unwrap();
        let pool = service.pool::<Item>("pickups").unwrap();
        pool.acquire(&Pickup::Ammo).unwrap()
    };

    spawn(&registry);
    spawn(&registry);

    assert_eq!(installed.release_all(), 2);
    assert_eq!(reclaimed.get(), 2);

    installed.uninstall(&mut registry).unwrap();
    assert!(matches!(
        registry.require::<PoolService>(),
        Err(RegistryError::NotRegistered { .. })
    ));
}
