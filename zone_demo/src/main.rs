//! Headless zone demo: players wander between two rooms and a relocated
//! pickup area while zones report who comes and goes

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::rc::Rc;
use zone_engine::foundation::logging;
use zone_engine::prelude::*;

// Demo configuration
const CONFIG_PATH: &str = "zone_demo/zones.toml";
const SIMULATION_SECONDS: f64 = 10.0;
const NUM_PLAYERS: usize = 4;
const ROOM_SIZE: f32 = 20.0;
const WANDER_SPEED: f32 = 6.0;
const WORLD_HALF_EXTENT: f32 = 30.0;
const PICKUP_REACH: f32 = 3.0;
const RNG_SEED: u64 = 7;

struct Wanderer {
    character: CharacterId,
    position: Vec3,
    heading: Vec3,
}

struct ZoneDemoApp {
    scene: MemoryScene,
    registry: ZoneRegistry,
    clock: FrameClock,
    rng: StdRng,
    wanderers: Vec<Wanderer>,
    pickup_zone: ZoneId,
    pickup: Option<BodyId>,
    pickup_taken: Rc<Cell<bool>>,
    pickups_collected: u32,
}

impl ZoneDemoApp {
    fn new(registry: ZoneRegistry) -> Result<Self, ZoneError> {
        let mut app = Self {
            scene: MemoryScene::new(),
            registry,
            clock: FrameClock::default(),
            rng: StdRng::seed_from_u64(RNG_SEED),
            wanderers: Vec::new(),
            pickup_zone: ZoneId::default(),
            pickup: None,
            pickup_taken: Rc::new(Cell::new(false)),
            pickups_collected: 0,
        };
        app.build_rooms()?;
        app.build_pickup_area()?;
        app.spawn_players();
        Ok(app)
    }

    /// Two rooms sharing a wall, exclusive through a settings group
    fn build_rooms(&mut self) -> Result<(), ZoneError> {
        let size = Vec3::new(ROOM_SIZE, ROOM_SIZE, ROOM_SIZE);
        for (name, x) in [("west", -ROOM_SIZE * 0.5), ("east", ROOM_SIZE * 0.5)] {
            let floor = self
                .scene
                .add_block(Transform::from_position(Vec3::new(x, 0.0, 0.0)), size);
            let id = self.registry.create_from_body(&self.scene, floor)?;
            self.registry.bind_group(id, "rooms")?;

            let zone = self.registry.zone_mut(id)?;
            zone.set_accuracy(Accuracy::High);
            zone.signals_mut()
                .player_entered
                .connect(move |player| info!("{player} entered the {name} room"));
            zone.signals_mut()
                .player_exited
                .connect(move |player| info!("{player} left the {name} room"));
        }
        Ok(())
    }

    /// A relocated region zone that spawns pickups at random points
    fn build_pickup_area(&mut self) -> Result<(), ZoneError> {
        let transform = Transform::from_position(Vec3::new(0.0, 0.0, -ROOM_SIZE));
        let id = self.registry.create_from_region(
            &mut self.scene,
            transform,
            Vec3::new(ROOM_SIZE * 2.0, ROOM_SIZE, ROOM_SIZE),
        )?;
        let zone = self.registry.zone_mut(id)?;
        zone.set_accuracy(Accuracy::Precise);
        zone.set_detection(Detection::Centre);
        zone.signals_mut()
            .body_exited
            .connect(|body| info!("{body} left the pickup area"));
        self.pickup_zone = id;
        self.spawn_pickup()
    }

    fn spawn_pickup(&mut self) -> Result<(), ZoneError> {
        let zone = self.registry.zone_mut(self.pickup_zone)?;
        let Some((point, parts)) = zone.random_point(&mut self.rng) else {
            warn!("No pickup spawn point found this round");
            return Ok(());
        };
        let body = self
            .scene
            .add_ball(Transform::from_position(point), Vec3::new(1.0, 1.0, 1.0));
        info!("Pickup {body} spawned at {point:?} in {} part(s)", parts.len());

        let taken = Rc::clone(&self.pickup_taken);
        taken.set(false);
        zone.on_item_exit(&self.scene, Item::Body(body), move || taken.set(true))?;
        self.pickup = Some(body);
        Ok(())
    }

    fn spawn_players(&mut self) {
        for _ in 0..NUM_PLAYERS {
            let position = self.random_position();
            let character = self.scene.add_character(position, Vec3::new(1.0, 2.0, 1.0));
            let player = self.scene.add_player(Some(character));
            info!("{player} joined at {position:?}");
            let heading = self.random_heading();
            self.wanderers.push(Wanderer {
                character,
                position,
                heading,
            });
        }
    }

    fn random_position(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT),
            0.0,
            self.rng.gen_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT),
        )
    }

    fn random_heading(&mut self) -> Vec3 {
        let angle: f32 = self.rng.gen_range(0.0..std::f32::consts::TAU);
        Vec3::new(angle.cos(), 0.0, angle.sin())
    }

    fn update(&mut self) -> Result<(), ZoneError> {
        let now = self.clock.tick();
        let delta_time = self.clock.delta_time() as f32;

        for index in 0..self.wanderers.len() {
            if self.rng.gen_bool(0.02) {
                self.wanderers[index].heading = self.random_heading();
            }
            let wanderer = &mut self.wanderers[index];
            wanderer.position += wanderer.heading * WANDER_SPEED * delta_time;
            for axis in [0, 2] {
                if wanderer.position[axis].abs() > WORLD_HALF_EXTENT {
                    wanderer.heading[axis] = -wanderer.heading[axis];
                    wanderer.position[axis] =
                        wanderer.position[axis].clamp(-WORLD_HALF_EXTENT, WORLD_HALF_EXTENT);
                }
            }
            self.scene.move_character(wanderer.character, wanderer.position);
        }

        // A player standing over the pickup carries it off
        if let Some(pickup) = self.pickup {
            let target = self.pickup_position(pickup);
            let carrier = self
                .wanderers
                .iter()
                .find(|w| {
                    let offset = w.position - target;
                    offset.x.hypot(offset.z) < PICKUP_REACH
                })
                .map(|w| w.position);
            if let Some(position) = carrier {
                let lifted = position + Vec3::new(0.0, ROOM_SIZE, 0.0);
                self.scene.set_body_transform(pickup, Transform::from_position(lifted));
            }
        }

        self.registry.heartbeat(&self.scene, now);

        if self.pickup_taken.replace(false) {
            if let Some(old) = self.pickup.take() {
                self.scene.remove_body(old);
                self.registry.notify_body_removed(&self.scene, old, now);
            }
            self.pickups_collected += 1;
            self.spawn_pickup()?;
        }
        Ok(())
    }

    fn pickup_position(&self, pickup: BodyId) -> Vec3 {
        self.scene
            .body(pickup)
            .map_or_else(Vec3::zeros, |body| body.transform.position)
    }

    fn run(&mut self) -> Result<(), ZoneError> {
        info!("Running zone demo for {SIMULATION_SECONDS} seconds");
        while self.clock.now() < SIMULATION_SECONDS {
            self.update()?;
        }

        for (id, parts) in self.registry.touching_zones() {
            info!("Zone {:?} occupied, touching {} part(s)", id, parts.len());
        }
        info!(
            "Demo finished after {} frames, {} pickup(s) collected",
            self.clock.frame_count(),
            self.pickups_collected
        );
        Ok(())
    }
}

fn load_registry() -> Result<ZoneRegistry, ZoneError> {
    let path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    match ZoneRegistry::from_config_file(&path) {
        Ok(registry) => {
            info!("Loaded zone configuration from {path}");
            Ok(registry)
        }
        Err(e) => {
            warn!("Using default zone configuration ({e})");
            ZoneRegistry::new(ZoneConfig::default())
        }
    }
}

fn main() {
    logging::init();

    let result = load_registry().and_then(ZoneDemoApp::new).and_then(|mut app| app.run());
    if let Err(e) = result {
        log::error!("Zone demo failed: {e}");
        std::process::exit(1);
    }
}
