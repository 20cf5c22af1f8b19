//! # Zone Registry
//!
//! Catalog of every live zone and settings group, and the host's single
//! entry point for driving them. Hosts call [`ZoneRegistry::heartbeat`]
//! once per frame and forward scene changes through the `notify_*`
//! methods; everything else is queries and configuration.
//!
//! Registries are plain values: tests build as many isolated ones as they
//! like, and dropping a registry tears down all of its zones.

use crate::config::{Config, ZoneConfig};
use crate::containment::{Item, Target};
use crate::error::{Result, ZoneError};
use crate::foundation::math::{Transform, Vec3};
use crate::geometry::{decompose, Region};
use crate::groups::{GroupCoordinator, SettingsGroup, SettingsGroupProperties};
use crate::membership::Occupant;
use crate::scene::{BodyId, CharacterId, ContainerId, ExecutionContext, RegionBuilder, SceneQuery};
use crate::schedule::UpdateScheduler;
use crate::zone::{PartSource, Pass, Zone};
use log::{debug, warn};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key of a zone in its registry
    ///
    /// Keys are generational: a key kept after its zone was destroyed
    /// never resolves to a later zone.
    pub struct ZoneId;
}

/// Process-wide catalog of zones and settings groups
#[derive(Debug)]
pub struct ZoneRegistry {
    config: ZoneConfig,
    zones: SlotMap<ZoneId, Zone>,
    groups: GroupCoordinator,
    scheduler: UpdateScheduler,
}

impl ZoneRegistry {
    /// Create an empty registry
    pub fn new(config: ZoneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            zones: SlotMap::with_key(),
            groups: GroupCoordinator::new(),
            scheduler: UpdateScheduler::new(),
        })
    }

    /// Create an empty registry configured from a TOML or RON file
    pub fn from_config_file(path: &str) -> Result<Self> {
        Self::new(ZoneConfig::load_from_file(path)?)
    }

    /// Engine settings shared by every zone
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Create a zone bounded by a single body
    pub fn create_from_body(&mut self, scene: &dyn SceneQuery, body: BodyId) -> Result<ZoneId> {
        self.create_from_bodies(scene, &[body])
    }

    /// Create a zone bounded by an ordered list of bodies
    pub fn create_from_bodies(&mut self, scene: &dyn SceneQuery, bodies: &[BodyId]) -> Result<ZoneId> {
        if bodies.is_empty() {
            return Err(ZoneError::construction("a zone needs at least one body"));
        }
        self.insert(scene, PartSource::Bodies(bodies.to_vec()), bodies.to_vec())
    }

    /// Create a zone from every body below a container
    ///
    /// The container is searched again whenever a descendant changes.
    pub fn create_from_container(&mut self, scene: &dyn SceneQuery, container: ContainerId) -> Result<ZoneId> {
        let bodies = scene
            .descendant_bodies(container)
            .ok_or_else(|| ZoneError::construction(format!("{container} does not exist")))?;
        if bodies.is_empty() {
            return Err(ZoneError::construction(format!("{container} holds no bodies")));
        }
        self.insert(scene, PartSource::Container(container), bodies)
    }

    /// Create a zone from a transform and size
    ///
    /// Extents above the scene's maximum body size are split into several
    /// boxes. The synthesized bodies are relocated out of the primary
    /// scene, so they neither render nor collide.
    pub fn create_from_region<S>(&mut self, scene: &mut S, transform: Transform, size: Vec3) -> Result<ZoneId>
    where
        S: SceneQuery + RegionBuilder,
    {
        if !size.iter().all(|extent| extent.is_finite() && *extent > 0.0) {
            return Err(ZoneError::construction(format!(
                "region size must be positive, got [{}, {}, {}]",
                size.x, size.y, size.z
            )));
        }

        let boxes = decompose(&transform, size, self.config.cell_limits())?;
        let bodies = scene.synthesize(&boxes)?;
        let id = self.insert(&*scene, PartSource::Bodies(bodies.clone()), bodies)?;
        let relocated = self.zone_mut(id)?.relocate(scene);
        if let Err(e) = relocated {
            self.zones.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    fn insert(&mut self, scene: &dyn SceneQuery, source: PartSource, bodies: Vec<BodyId>) -> Result<ZoneId> {
        let region = Region::resolve(scene, &bodies, self.config.cell_limits())?;
        let config = &self.config;
        let id = self
            .zones
            .insert_with_key(|id| Zone::new(id, source, region, config));

        if let Some(zone) = self.zones.get(id) {
            debug!(
                "Created zone {:?}: {} parts, volume {:.2}",
                id,
                zone.region().parts().len(),
                zone.volume()
            );
        }
        Ok(id)
    }

    /// Look up a live zone
    pub fn zone(&self, id: ZoneId) -> Result<&Zone> {
        self.zones
            .get(id)
            .filter(|zone| !zone.is_destroyed())
            .ok_or(ZoneError::UseAfterDestroy(id))
    }

    /// Look up a live zone for mutation
    pub fn zone_mut(&mut self, id: ZoneId) -> Result<&mut Zone> {
        self.zones
            .get_mut(id)
            .filter(|zone| !zone.is_destroyed())
            .ok_or(ZoneError::UseAfterDestroy(id))
    }

    /// Destroy a zone
    ///
    /// Subscriptions, tracked items and pending one-shots are dropped
    /// without firing. Destroying twice is an error.
    pub fn destroy_zone(&mut self, id: ZoneId) -> Result<()> {
        self.zone(id)?;
        if let Some(mut zone) = self.zones.remove(id) {
            zone.teardown();
            debug!("Destroyed zone {:?}", id);
        }
        Ok(())
    }

    /// Every live zone
    pub fn zones(&self) -> Vec<ZoneId> {
        self.zones
            .iter()
            .filter(|(_, zone)| !zone.is_destroyed())
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of live zones
    pub fn len(&self) -> usize {
        self.zones.values().filter(|zone| !zone.is_destroyed()).count()
    }

    /// Whether there are no live zones
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every zone with something recorded inside, paired with the parts
    /// those occupants touch
    pub fn touching_zones(&self) -> Vec<(ZoneId, Vec<BodyId>)> {
        self.zones
            .iter()
            .filter(|(_, zone)| !zone.is_destroyed())
            .filter_map(|(id, zone)| {
                let parts = zone.touching_parts();
                (!parts.is_empty()).then(|| (id, parts.into_iter().collect()))
            })
            .collect()
    }

    /// Every zone `target` is inside right now, with the parts it touches
    pub fn touching_zones_for(&self, scene: &dyn SceneQuery, target: Target) -> Result<Vec<(ZoneId, Vec<BodyId>)>> {
        let mut touching = Vec::new();
        for id in self.zones() {
            let result = self.zone(id)?.find(scene, target)?;
            if result.is_inside() {
                touching.push((id, result.into_touching().into_iter().collect()));
            }
        }
        Ok(touching)
    }

    /// Create or update a settings group
    pub fn set_group(&mut self, name: &str, properties: SettingsGroupProperties) {
        debug!("Settings group '{}': {:?}", name, properties);
        self.groups.set_group(name, properties);
    }

    /// Properties of a settings group, creating it with defaults if needed
    pub fn group(&mut self, name: &str) -> SettingsGroupProperties {
        self.groups.group_or_default(name).properties()
    }

    /// Look up a settings group without creating it
    pub fn find_group(&self, name: &str) -> Option<&SettingsGroup> {
        self.groups.group(name)
    }

    /// Bind a zone to a settings group, replacing any previous binding
    pub fn bind_group(&mut self, id: ZoneId, name: &str) -> Result<()> {
        self.zone(id)?;
        self.groups.group_or_default(name);
        self.zone_mut(id)?.set_settings_group(Some(name.to_string()));
        debug!("Zone {:?} bound to settings group '{}'", id, name);
        Ok(())
    }

    /// Remove a zone's settings group binding
    pub fn unbind_group(&mut self, id: ZoneId) -> Result<()> {
        self.zone_mut(id)?.set_settings_group(None);
        debug!("Zone {:?} unbound from its settings group", id);
        Ok(())
    }

    /// Advance the registry to `now` (seconds)
    ///
    /// Evaluates every zone whose accuracy tier is due. A zone whose
    /// evaluation fails is logged and retried on its next tick; other
    /// zones are unaffected.
    pub fn heartbeat(&mut self, scene: &dyn SceneQuery, now: f64) {
        self.reap();

        let due = self.scheduler.due_tiers(now);
        if due.is_empty() {
            return;
        }
        self.rebuild_group_occupancy();

        let ids: Vec<ZoneId> = self
            .zones
            .iter_mut()
            .filter(|(_, zone)| due.contains(&zone.accuracy()))
            .map(|(id, zone)| {
                zone.schedule();
                id
            })
            .collect();

        let players = scene.players();
        let local_player = match scene.context() {
            ExecutionContext::Client => scene.local_player(),
            ExecutionContext::Server => None,
        };
        let mut pass = Pass {
            scene,
            groups: &mut self.groups,
            players: &players,
            local_player,
            now,
        };

        for id in ids {
            let Some(zone) = self.zones.get_mut(id) else {
                continue;
            };
            if let Err(e) = zone.evaluate(&mut pass) {
                warn!("Zone {:?} evaluation failed, retrying next tick: {}", id, e);
            }
        }

        self.reap();
    }

    /// A body's transform or size changed
    pub fn notify_body_changed(&mut self, scene: &dyn SceneQuery, body: BodyId, now: f64) {
        for zone in self.zones.values_mut() {
            if !zone.is_destroyed() && zone.depends_on(scene, body) {
                zone.request_recompute(scene, now);
            }
        }
    }

    /// A body was parented below some container
    pub fn notify_descendant_added(&mut self, scene: &dyn SceneQuery, body: BodyId, now: f64) {
        self.notify_body_changed(scene, body, now);
    }

    /// A body was moved out from below some container
    ///
    /// Must be called after the scene reflects the change; zones that
    /// still list the body as a part re-search their container.
    pub fn notify_descendant_removed(&mut self, scene: &dyn SceneQuery, body: BodyId, now: f64) {
        self.notify_body_changed(scene, body, now);
    }

    /// A body was torn down
    ///
    /// Tracked items and body records for it are dropped silently; zones
    /// built from it recompute without it.
    pub fn notify_body_removed(&mut self, scene: &dyn SceneQuery, body: BodyId, now: f64) {
        for zone in self.zones.values_mut() {
            if zone.is_destroyed() {
                continue;
            }
            zone.untrack_item(Item::Body(body));
            zone.forget(&Occupant::Body(body));
            if zone.region().has_part(body) {
                zone.remove_part(body);
                zone.request_recompute(scene, now);
            }
        }
    }

    /// A character was torn down; tracked items for it are dropped silently
    pub fn notify_character_removed(&mut self, character: CharacterId) {
        for zone in self.zones.values_mut() {
            zone.untrack_item(Item::Character(character));
        }
    }

    fn rebuild_group_occupancy(&mut self) {
        self.groups.clear_occupancy();
        for (id, zone) in &self.zones {
            let Some(group) = zone.settings_group() else {
                continue;
            };
            for occupant in zone.membership().occupants() {
                self.groups.occupy(group, *occupant, id);
            }
        }
    }

    /// Remove zones destroyed through a [`DestroyHandle`](crate::DestroyHandle)
    fn reap(&mut self) {
        let destroyed: Vec<ZoneId> = self
            .zones
            .iter()
            .filter(|(_, zone)| zone.is_destroyed())
            .map(|(id, _)| id)
            .collect();
        for id in destroyed {
            if let Some(mut zone) = self.zones.remove(id) {
                zone.teardown();
                debug!("Reaped destroyed zone {:?}", id);
            }
        }
    }
}

impl Default for ZoneRegistry {
    fn default() -> Self {
        Self {
            config: ZoneConfig::default(),
            zones: SlotMap::with_key(),
            groups: GroupCoordinator::new(),
            scheduler: UpdateScheduler::new(),
        }
    }
}
