//! A small game loop that spawns projectiles from keyed pools.
//!
//! The spawner only knows the capability registry. It finds the projectile pool through the
//! registered pool service, spawns a few projectiles per tick and lets them expire on their own
//! through the tick-driven scheduler. Pool activity is logged through `tracing`.

use std::rc::Rc;
use std::time::Duration;

use capability_registry::CapabilityRegistry;
use keyed_pool::{
    AcquireOptions, KeyedPool, Lifecycle, Placeable, PoolConfig, PoolService, Poolable,
    TickScheduler,
};

const TICK: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Projectile {
    Arrow,
    Bolt,
    Fireball,
}

impl Projectile {
    fn lifetime(self) -> Duration {
        match self {
            Self::Arrow => Duration::from_millis(300),
            Self::Bolt => Duration::from_millis(200),
            Self::Fireball => Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Shot {
    kind: Option<Projectile>,
    origin: (i32, i32),
    travelled: u32,
}

impl Poolable for Shot {
    type Key = Projectile;

    fn key(&self) -> Option<&Projectile> {
        self.kind.as_ref()
    }

    fn set_key(&mut self, key: Projectile) {
        self.kind = Some(key);
    }

    fn activate(&mut self, lifecycle: &mut Lifecycle<'_, Projectile>) {
        self.travelled = 0;
        lifecycle.release_after(lifecycle.key().lifetime());
    }

    fn deactivate(&mut self) {
        self.travelled = 0;
    }

    fn park(&mut self) {
        self.origin = (0, 0);
    }
}

impl Placeable for Shot {
    type Placement = (i32, i32);

    fn place(&mut self, placement: (i32, i32)) {
        self.origin = placement;
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let scheduler = Rc::new(TickScheduler::new());

    let shots = KeyedPool::builder()
        .key(
            Projectile::Arrow,
            PoolConfig::from_prototype(Shot::default())
                .initial_size(4)
                .max_size(6),
        )
        .key(
            Projectile::Bolt,
            PoolConfig::from_prototype(Shot::default()).max_size(2),
        )
        .key(
            Projectile::Fireball,
            PoolConfig::from_prototype(Shot::default()).max_size(1),
        )
        .scheduler(scheduler.clone())
        .build()
        .expect("pool configuration is valid");

    let mut registry = CapabilityRegistry::new();

    let service = PoolService::builder()
        .pool("shots", shots)
        .build()
        .expect("service configuration is valid")
        .install(&mut registry)
        .expect("no other pool service is registered");

    for tick in 0..10_i32 {
        spawn_volley(&registry, tick);
        scheduler.advance(TICK);
    }

    println!("Reclaimed at shutdown: {}", service.release_all());

    service
        .uninstall(&mut registry)
        .expect("the service was installed above");
}

fn spawn_volley(registry: &CapabilityRegistry, tick: i32) {
    let Some(service) = registry.get::<PoolService>() else {
        println!("No pool service, nothing to spawn");
        return;
    };

    let shots = service
        .pool::<Shot>("shots")
        .expect("the shots pool is registered with the right type");

    for volley in 0..3 {
        match shots.acquire_random_placed((tick, volley), AcquireOptions::new()) {
            Ok(lease) => {
                if let Some(shot) = shots.get(lease) {
                    println!("tick {tick}: spawned {:?} at {:?}", shot.kind, shot.origin);
                }
            }
            Err(e) if e.is_exhausted() => println!("tick {tick}: {e}, skipping"),
            Err(e) => println!("tick {tick}: unexpected error: {e}"),
        }
    }

    for key in shots.keys() {
        if let Ok(stats) = shots.stats(&key) {
            println!(
                "tick {tick}: {key:?} available={} in_use={} materialized={}/{}",
                stats.available, stats.in_use, stats.materialized, stats.max_size
            );
        }
    }
}
