//! # Zones
//!
//! A [`Zone`] is a volume bounded by one or more scene bodies. It owns the
//! cached region geometry, the membership record of everything it has seen
//! inside, its signals and its tracked items. Zones are created and
//! destroyed through the [`ZoneRegistry`](crate::ZoneRegistry), which also
//! drives their evaluation.
//!
//! ## Evaluation order
//!
//! One pass evaluates, in order: a pending region recomputation, every
//! connected player, every tracked item, then (only while someone listens
//! for body events) every scene body near the zone. A subscriber that
//! destroys the zone through its [`DestroyHandle`] stops the pass at the
//! next check; nothing fires after that.

use crate::config::ZoneConfig;
use crate::containment::{self, Containment, Item, OverlapConfirmation, Target};
use crate::error::{Result, ZoneError};
use crate::events::{ConnectionId, ZoneSignals};
use crate::foundation::math::Vec3;
use crate::geometry::{PartVolume, Region};
use crate::groups::GroupCoordinator;
use crate::membership::{Channels, Membership, Occupant, OneShotId, OneShots, TransitionKind};
use crate::registry::ZoneId;
use crate::scene::{
    BodyId, BodyShape, ContainerId, ExecutionContext, PlayerId, RegionBuilder, SceneError,
    SceneQuery,
};
use crate::schedule::{EvalState, RecomputeQueue};
use crate::tiers::{Accuracy, Detection, Sampling};
use log::{debug, trace, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Where a zone's constituent bodies come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartSource {
    /// An explicit, ordered body list
    Bodies(Vec<BodyId>),
    /// Every body below a container, collected again on each recompute
    Container(ContainerId),
}

/// Lets a subscriber destroy the zone it is subscribed to
///
/// Clones share one flag. Once set, the zone fires nothing further and
/// the registry reaps it on its next heartbeat.
#[derive(Debug, Clone, Default)]
pub struct DestroyHandle(Rc<Cell<bool>>);

impl DestroyHandle {
    /// Destroy the zone; irreversible
    pub fn destroy(&self) {
        self.0.set(true);
    }

    /// Whether the zone has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.0.get()
    }
}

/// Everything a single evaluation pass reads from the registry and scene
pub(crate) struct Pass<'a> {
    pub scene: &'a dyn SceneQuery,
    pub groups: &'a mut GroupCoordinator,
    pub players: &'a [PlayerId],
    pub local_player: Option<PlayerId>,
    pub now: f64,
}

/// A containment volume
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    source: PartSource,
    region: Region,
    accuracy: Accuracy,
    enter_detection: Detection,
    exit_detection: Detection,
    auto_update: bool,
    respect_update_queue: bool,
    settings_group: Option<String>,
    relocated: bool,
    limits: ZoneConfig,
    signals: ZoneSignals,
    tracked: BTreeSet<Item>,
    membership: Membership,
    one_shots: OneShots,
    state: EvalState,
    recompute: RecomputeQueue,
    destroyed: DestroyHandle,
    evaluation_count: u64,
    recompute_count: u64,
}

impl Zone {
    pub(crate) fn new(id: ZoneId, source: PartSource, region: Region, config: &ZoneConfig) -> Self {
        Self {
            id,
            source,
            region,
            accuracy: config.default_accuracy,
            enter_detection: config.default_enter_detection,
            exit_detection: config.default_exit_detection,
            auto_update: config.auto_update,
            respect_update_queue: config.respect_update_queue,
            settings_group: None,
            relocated: false,
            limits: config.clone(),
            signals: ZoneSignals::default(),
            tracked: BTreeSet::new(),
            membership: Membership::new(),
            one_shots: OneShots::new(),
            state: EvalState::Idle,
            recompute: RecomputeQueue::new(),
            destroyed: DestroyHandle::default(),
            evaluation_count: 0,
            recompute_count: 0,
        }
    }

    /// Registry key of this zone
    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Constituent bodies in zone order
    pub fn zone_parts(&self) -> Vec<BodyId> {
        self.region.bodies().collect()
    }

    /// Where the constituent bodies come from
    pub fn source(&self) -> &PartSource {
        &self.source
    }

    /// Cached region geometry
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Sum of part volumes
    pub fn volume(&self) -> f32 {
        self.region.volume()
    }

    /// Polling tier
    pub fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    /// Detection for occupants recorded outside
    pub fn enter_detection(&self) -> Detection {
        self.enter_detection
    }

    /// Detection for occupants recorded inside
    pub fn exit_detection(&self) -> Detection {
        self.exit_detection
    }

    /// Whether structural changes recompute right away
    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    /// Whether recomputation is debounced
    pub fn respect_update_queue(&self) -> bool {
        self.respect_update_queue
    }

    /// Name of the bound settings group
    pub fn settings_group(&self) -> Option<&str> {
        self.settings_group.as_deref()
    }

    /// Whether the parts were moved out of the primary scene
    pub fn is_relocated(&self) -> bool {
        self.relocated
    }

    /// Evaluation passes run so far
    pub fn evaluation_count(&self) -> u64 {
        self.evaluation_count
    }

    /// Successful region recomputations so far
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    /// Where the zone is in its evaluation cycle
    pub fn eval_state(&self) -> EvalState {
        self.state
    }

    /// Set the polling tier; takes effect on the next heartbeat
    pub fn set_accuracy(&mut self, accuracy: Accuracy) {
        if self.accuracy != accuracy {
            debug!("Zone {:?} accuracy {} -> {}", self.id, self.accuracy, accuracy);
            self.accuracy = accuracy;
        }
    }

    /// Set the polling tier from its name or numeric value
    pub fn set_accuracy_by_name(&mut self, name: &str) -> Result<()> {
        let accuracy = match name.parse::<u8>() {
            Ok(value) => Accuracy::try_from(value)?,
            Err(_) => name.parse()?,
        };
        self.set_accuracy(accuracy);
        Ok(())
    }

    /// Set both enter and exit detection
    pub fn set_detection(&mut self, detection: Detection) {
        self.set_enter_detection(detection);
        self.set_exit_detection(detection);
    }

    /// Detection used for occupants currently recorded outside
    pub fn set_enter_detection(&mut self, detection: Detection) {
        debug!("Zone {:?} enter detection {}", self.id, detection);
        self.enter_detection = detection;
    }

    /// Detection used for occupants currently recorded inside
    pub fn set_exit_detection(&mut self, detection: Detection) {
        debug!("Zone {:?} exit detection {}", self.id, detection);
        self.exit_detection = detection;
    }

    /// Whether structural changes trigger recomputation right away
    pub fn set_auto_update(&mut self, enabled: bool) {
        self.auto_update = enabled;
    }

    /// Whether structural recomputation is debounced
    pub fn set_respect_update_queue(&mut self, enabled: bool) {
        self.respect_update_queue = enabled;
    }

    pub(crate) fn set_settings_group(&mut self, group: Option<String>) {
        self.settings_group = group;
    }

    /// Read access to the signals
    pub fn signals(&self) -> &ZoneSignals {
        &self.signals
    }

    /// Subscribe to or unsubscribe from the signals
    pub fn signals_mut(&mut self) -> &mut ZoneSignals {
        &mut self.signals
    }

    /// Subscribe to the local player entering; client context only
    pub fn connect_local_player_entered<F>(
        &mut self,
        scene: &dyn SceneQuery,
        handler: F,
    ) -> Result<ConnectionId>
    where
        F: FnMut(&PlayerId) + 'static,
    {
        require_client(scene, "local_player_entered")?;
        Ok(self.signals.local_player_entered.connect(handler))
    }

    /// Subscribe to the local player exiting; client context only
    pub fn connect_local_player_exited<F>(
        &mut self,
        scene: &dyn SceneQuery,
        handler: F,
    ) -> Result<ConnectionId>
    where
        F: FnMut(&PlayerId) + 'static,
    {
        require_client(scene, "local_player_exited")?;
        Ok(self.signals.local_player_exited.connect(handler))
    }

    /// Drop a local player subscription
    pub fn disconnect_local_player(&mut self, id: ConnectionId) -> bool {
        self.signals.local_player_entered.disconnect(id)
            | self.signals.local_player_exited.disconnect(id)
    }

    /// Place an item under observation, returning false if it already was
    pub fn track_item(&mut self, item: Item) -> bool {
        let added = self.tracked.insert(item);
        if added {
            trace!("Zone {:?} tracking {}", self.id, item);
        }
        added
    }

    /// Stop observing an item
    ///
    /// Its recorded state and pending one-shots are discarded; no exit
    /// event fires.
    pub fn untrack_item(&mut self, item: Item) -> bool {
        self.membership.forget(&Occupant::Item(item));
        self.one_shots.discard(item);
        self.tracked.remove(&item)
    }

    /// Items under observation
    pub fn tracked_items(&self) -> impl Iterator<Item = Item> + '_ {
        self.tracked.iter().copied()
    }

    /// Call `callback` once `item` is inside
    ///
    /// Tracks the item. If it is already inside the callback runs before
    /// this returns and `None` is returned; otherwise it runs on the
    /// item's next entry.
    pub fn on_item_enter<F>(&mut self, scene: &dyn SceneQuery, item: Item, callback: F) -> Result<Option<OneShotId>>
    where
        F: FnOnce() + 'static,
    {
        self.one_shot(scene, item, TransitionKind::Entered, Box::new(callback))
    }

    /// Call `callback` once `item` is outside
    pub fn on_item_exit<F>(&mut self, scene: &dyn SceneQuery, item: Item, callback: F) -> Result<Option<OneShotId>>
    where
        F: FnOnce() + 'static,
    {
        self.one_shot(scene, item, TransitionKind::Exited, Box::new(callback))
    }

    /// Cancel a waiting one-shot
    pub fn cancel_one_shot(&mut self, id: OneShotId) -> bool {
        self.one_shots.cancel(id)
    }

    fn one_shot(
        &mut self,
        scene: &dyn SceneQuery,
        item: Item,
        kind: TransitionKind,
        callback: Box<dyn FnOnce()>,
    ) -> Result<Option<OneShotId>> {
        let live = self.find_item(scene, item)?;
        self.track_item(item);

        let satisfied = match kind {
            TransitionKind::Entered => live.is_inside(),
            TransitionKind::Exited => !live.is_inside(),
        };
        if satisfied {
            callback();
            return Ok(None);
        }
        Ok(Some(self.one_shots.push(item, kind, callback)))
    }

    /// Test any target
    pub fn find(&self, scene: &dyn SceneQuery, target: Target) -> Result<Containment> {
        match target {
            Target::Point(point) => Ok(self.find_point(point)),
            Target::Body(body) => self.find_body(scene, body),
            Target::Character(character) => self.find_item(scene, Item::Character(character)),
        }
    }

    /// Test a world-space point
    pub fn find_point(&self, point: Vec3) -> Containment {
        containment::test_point(&self.region, point)
    }

    /// Test a body
    pub fn find_body(&self, scene: &dyn SceneQuery, body: BodyId) -> Result<Containment> {
        self.test(scene, Target::Body(body), Sampling::Centre)
    }

    /// Test an item, sampling characters with the zone's detection
    pub fn find_item(&self, scene: &dyn SceneQuery, item: Item) -> Result<Containment> {
        let sampling = self.sampling_for(&Occupant::Item(item), scene.players().len());
        self.test(scene, item.into(), sampling)
    }

    /// Test a player's character; a player without one is outside
    pub fn find_player(&self, scene: &dyn SceneQuery, player: PlayerId) -> Result<Containment> {
        let Some(character) = scene.player_character(player) else {
            return Ok(Containment::outside());
        };
        let sampling = self.sampling_for(&Occupant::Player(player), scene.players().len());
        self.test(scene, Target::Character(character), sampling)
    }

    /// Test the observing player; client context only
    pub fn find_local_player(&self, scene: &dyn SceneQuery) -> Result<Containment> {
        require_client(scene, "find_local_player")?;
        match scene.local_player() {
            Some(player) => self.find_player(scene, player),
            None => Ok(Containment::outside()),
        }
    }

    /// Players recorded inside
    pub fn players_inside(&self) -> Vec<PlayerId> {
        self.membership
            .occupants()
            .filter_map(|occupant| match occupant {
                Occupant::Player(player) => Some(*player),
                _ => None,
            })
            .collect()
    }

    /// Tracked items recorded inside
    pub fn items_inside(&self) -> Vec<Item> {
        self.membership
            .occupants()
            .filter_map(|occupant| match occupant {
                Occupant::Item(item) => Some(*item),
                _ => None,
            })
            .collect()
    }

    /// Scene bodies inside right now
    pub fn bodies_inside(&self, scene: &dyn SceneQuery) -> Result<Vec<BodyId>> {
        let mut inside = Vec::new();
        for body in self.nearby_bodies(scene)? {
            if self.test(scene, Target::Body(body), Sampling::Centre)?.is_inside() {
                inside.push(body);
            }
        }
        Ok(inside)
    }

    /// Zone parts touched by anything recorded inside
    pub fn touching_parts(&self) -> BTreeSet<BodyId> {
        self.membership.touched_parts()
    }

    /// A uniformly random point inside the zone and the parts containing it
    ///
    /// Each attempt picks a part weighted by the box it samples from, then
    /// rejects points outside the part. Weighting by that box rather than
    /// the part's volume keeps the accepted points uniform across mixed
    /// block and ball zones. Overlapping parts are sampled once per part
    /// they share. Returns `None` if every attempt was rejected.
    pub fn random_point<R>(&self, rng: &mut R) -> Option<(Vec3, Vec<BodyId>)>
    where
        R: Rng + ?Sized,
    {
        let parts = self.region.parts();
        let weights = WeightedIndex::new(parts.iter().map(PartVolume::sampling_volume)).ok()?;

        for _ in 0..self.limits.random_point_attempts {
            let part = &parts[weights.sample(rng)];
            let unit = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            );
            let point = match part.shape {
                BodyShape::Block => part.obb.point_from_unit(unit),
                BodyShape::Ball => {
                    part.obb.center()
                        + part.obb.transform.transform_vector(unit * part.obb.inscribed_radius())
                }
            };
            if part.contains_point(point) {
                return Some((point, self.region.parts_containing(point)));
            }
        }
        None
    }

    /// Move the parts out of the primary scene; later calls do nothing
    pub fn relocate(&mut self, builder: &mut dyn RegionBuilder) -> Result<()> {
        if self.relocated {
            return Ok(());
        }
        builder.relocate(&self.zone_parts())?;
        self.relocated = true;
        debug!("Zone {:?} relocated {} parts", self.id, self.region.parts().len());
        Ok(())
    }

    /// Handle for destroying this zone from inside a subscriber
    pub fn destroy_handle(&self) -> DestroyHandle {
        self.destroyed.clone()
    }

    /// Whether the zone has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_destroyed()
    }

    pub(crate) fn teardown(&mut self) {
        self.destroyed.destroy();
        self.signals.clear();
        self.one_shots.clear();
        self.membership.clear();
        self.tracked.clear();
        self.settings_group = None;
    }

    pub(crate) fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Drop a record without firing anything
    pub(crate) fn forget(&mut self, occupant: &Occupant) {
        self.membership.forget(occupant);
    }

    /// Whether a change to `body` affects this zone's region
    pub(crate) fn depends_on(&self, scene: &dyn SceneQuery, body: BodyId) -> bool {
        if self.region.has_part(body) {
            return true;
        }
        match &self.source {
            PartSource::Bodies(_) => false,
            PartSource::Container(container) => scene
                .descendant_bodies(*container)
                .is_some_and(|bodies| bodies.contains(&body)),
        }
    }

    /// Drop a torn-down body from an explicit part list
    ///
    /// The last part is kept so the list never becomes empty; the region
    /// then stays at its previous geometry.
    pub(crate) fn remove_part(&mut self, body: BodyId) {
        if let PartSource::Bodies(bodies) = &mut self.source {
            if bodies.len() > 1 {
                bodies.retain(|&part| part != body);
            }
        }
    }

    /// A structural change to the zone's bodies arrived at `now`
    pub(crate) fn request_recompute(&mut self, scene: &dyn SceneQuery, now: f64) {
        let run_now = self.recompute.request(
            now,
            self.limits.update_queue_interval,
            self.auto_update,
            self.respect_update_queue,
        );
        if run_now {
            self.recompute(scene);
        }
    }

    fn recompute(&mut self, scene: &dyn SceneQuery) {
        let bodies = match &self.source {
            PartSource::Bodies(bodies) => bodies
                .iter()
                .copied()
                .filter(|&body| scene.body(body).is_some())
                .collect(),
            PartSource::Container(container) => scene.descendant_bodies(*container).unwrap_or_default(),
        };

        match Region::resolve(scene, &bodies, self.limits.cell_limits()) {
            Ok(region) => {
                self.region = region;
                self.recompute_count += 1;
                debug!(
                    "Zone {:?} recomputed: {} parts, volume {:.2}",
                    self.id,
                    self.region.parts().len(),
                    self.region.volume()
                );
            }
            Err(e) => warn!("Zone {:?} keeps its previous region: {}", self.id, e),
        }
    }

    /// Run one evaluation pass
    ///
    /// A pass already in progress is never re-entered. Scene failures end
    /// the pass early; the next tick retries from scratch.
    pub(crate) fn evaluate(&mut self, pass: &mut Pass<'_>) -> Result<()> {
        if self.is_destroyed() || !self.state.begin() {
            return Ok(());
        }
        let result = self.run_pass(pass);
        self.state.finish();
        self.evaluation_count += 1;
        result
    }

    pub(crate) fn schedule(&mut self) {
        self.state.schedule();
    }

    fn run_pass(&mut self, pass: &mut Pass<'_>) -> Result<()> {
        if self.recompute.take_due(
            pass.now,
            self.limits.update_queue_interval,
            self.respect_update_queue,
        ) {
            self.recompute(pass.scene);
        }

        self.evaluate_players(pass)?;
        self.evaluate_items(pass)?;
        if self.signals.wants_bodies() {
            self.evaluate_bodies(pass)?;
        } else {
            self.membership
                .retain(|occupant| !matches!(occupant, Occupant::Body(_)));
        }
        Ok(())
    }

    fn evaluate_players(&mut self, pass: &mut Pass<'_>) -> Result<()> {
        let connected: BTreeSet<PlayerId> = pass.players.iter().copied().collect();
        self.membership.retain(|occupant| match occupant {
            Occupant::Player(player) => connected.contains(player),
            _ => true,
        });

        for &player in pass.players {
            if self.is_destroyed() {
                return Ok(());
            }
            let occupant = Occupant::Player(player);
            let result = match pass.scene.player_character(player) {
                Some(character) if pass.scene.character(character).is_some() => {
                    let sampling = self.sampling_for(&occupant, pass.players.len());
                    self.test(pass.scene, Target::Character(character), sampling)?
                }
                _ => Containment::outside(),
            };
            self.apply(pass, occupant, result);
        }
        Ok(())
    }

    fn evaluate_items(&mut self, pass: &mut Pass<'_>) -> Result<()> {
        let items: Vec<Item> = self.tracked.iter().copied().collect();
        for item in items {
            if self.is_destroyed() {
                return Ok(());
            }
            if !item.exists(pass.scene) {
                trace!("Zone {:?} untracking torn down {}", self.id, item);
                self.untrack_item(item);
                continue;
            }
            let occupant = Occupant::Item(item);
            let sampling = self.sampling_for(&occupant, pass.players.len());
            let result = self.test(pass.scene, item.into(), sampling)?;
            self.apply(pass, occupant, result);
        }
        Ok(())
    }

    fn evaluate_bodies(&mut self, pass: &mut Pass<'_>) -> Result<()> {
        let mut candidates: BTreeSet<BodyId> = self.nearby_bodies(pass.scene)?.into_iter().collect();
        candidates.extend(self.membership.occupants().filter_map(|occupant| match occupant {
            Occupant::Body(body) => Some(*body),
            _ => None,
        }));

        for body in candidates {
            if self.is_destroyed() {
                return Ok(());
            }
            let occupant = Occupant::Body(body);
            if pass.scene.body(body).is_none() {
                self.membership.forget(&occupant);
                continue;
            }
            let result = self.test(pass.scene, Target::Body(body), Sampling::Centre)?;
            self.apply(pass, occupant, result);
        }
        Ok(())
    }

    /// Candidate bodies overlapping the region's cells, excluding parts
    ///
    /// One scene query per cell, and cells follow the parts.
    fn nearby_bodies(&self, scene: &dyn SceneQuery) -> std::result::Result<Vec<BodyId>, SceneError> {
        let mut found = BTreeSet::new();
        for cell in self.region.cells() {
            found.extend(scene.bodies_in_box(cell)?);
        }
        Ok(found
            .into_iter()
            .filter(|&body| !self.region.has_part(body))
            .collect())
    }

    /// Diff, filter through the settings group, record and publish
    fn apply(&mut self, pass: &mut Pass<'_>, occupant: Occupant, result: Containment) {
        let Some(kind) = self.membership.diff(&occupant, &result) else {
            self.membership.record(occupant, result);
            return;
        };

        if let Some(group) = &self.settings_group {
            match kind {
                TransitionKind::Entered => {
                    if !pass.groups.try_enter(group, occupant, self.id) {
                        trace!("Zone {:?} holding back {} (group {})", self.id, occupant, group);
                        return;
                    }
                }
                TransitionKind::Exited => pass.groups.exit(group, &occupant, self.id),
            }
        }

        self.membership.record(occupant, result);
        self.publish(occupant, kind, pass.local_player);
    }

    fn publish(&mut self, occupant: Occupant, kind: TransitionKind, local_player: Option<PlayerId>) {
        let handle = self.destroyed.clone();
        let halted = || handle.is_destroyed();
        let channels = occupant.channels(local_player);
        let signals = &mut self.signals;

        match (occupant, kind) {
            (Occupant::Player(player), TransitionKind::Entered) => {
                signals.player_entered.fire_unless(&player, halted);
                if channels.contains(Channels::LOCAL_OBSERVER) {
                    signals.local_player_entered.fire_unless(&player, halted);
                }
            }
            (Occupant::Player(player), TransitionKind::Exited) => {
                signals.player_exited.fire_unless(&player, halted);
                if channels.contains(Channels::LOCAL_OBSERVER) {
                    signals.local_player_exited.fire_unless(&player, halted);
                }
            }
            (Occupant::Body(body), TransitionKind::Entered) => {
                signals.body_entered.fire_unless(&body, halted);
            }
            (Occupant::Body(body), TransitionKind::Exited) => {
                signals.body_exited.fire_unless(&body, halted);
            }
            (Occupant::Item(item), kind) => {
                match kind {
                    TransitionKind::Entered => signals.item_entered.fire_unless(&item, halted),
                    TransitionKind::Exited => signals.item_exited.fire_unless(&item, halted),
                }
                for callback in self.one_shots.take(item, kind) {
                    if halted() {
                        break;
                    }
                    callback();
                }
            }
        }
    }

    fn sampling_for(&self, occupant: &Occupant, player_count: usize) -> Sampling {
        let detection = if self.membership.is_inside(occupant) {
            self.exit_detection
        } else {
            self.enter_detection
        };
        detection.resolve(player_count, self.limits.automatic_detection_threshold)
    }

    fn test(&self, scene: &dyn SceneQuery, target: Target, sampling: Sampling) -> Result<Containment> {
        let confirmation = if self.relocated {
            OverlapConfirmation::Geometry
        } else {
            OverlapConfirmation::Scene
        };
        containment::test(scene, &self.region, target, sampling, confirmation)
    }
}

fn require_client(scene: &dyn SceneQuery, operation: &'static str) -> Result<()> {
    if scene.context() != ExecutionContext::Client {
        return Err(ZoneError::Context {
            operation,
            required: ExecutionContext::Client,
        });
    }
    Ok(())
}
