//! End-to-end scenarios: point tests, synchronous one-shots, group
//! exclusivity on a shared border, live accuracy changes and destruction
//! from inside a subscriber.

use super::{cube_at, labels, new_log, record, FRAME};
use crate::config::ZoneConfig;
use crate::containment::Item;
use crate::error::ZoneError;
use crate::foundation::math::{Transform, Vec3};
use crate::foundation::time::FrameClock;
use crate::groups::SettingsGroupProperties;
use crate::registry::ZoneRegistry;
use crate::scene::memory::MemoryScene;
use crate::tiers::Accuracy;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_point_in_single_body_zone() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    let body = cube_at(&mut scene, Vec3::zeros(), 10.0);
    let id = registry.create_from_body(&scene, body).unwrap();
    let zone = registry.zone(id).unwrap();

    let inside = zone.find_point(Vec3::zeros());
    assert!(inside.is_inside());
    assert_eq!(inside.touching().iter().copied().collect::<Vec<_>>(), vec![body]);

    let outside = zone.find_point(Vec3::new(100.0, 0.0, 0.0));
    assert!(!outside.is_inside());
    assert!(outside.touching().is_empty());
}

#[test]
fn test_one_shot_fires_synchronously_when_already_inside() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    let part = cube_at(&mut scene, Vec3::zeros(), 10.0);
    let id = registry.create_from_body(&scene, part).unwrap();
    let item = Item::Body(cube_at(&mut scene, Vec3::zeros(), 1.0));

    let fired = Rc::new(Cell::new(false));
    let flag = Rc::clone(&fired);
    let zone = registry.zone_mut(id).unwrap();
    zone.track_item(item);
    let pending = zone.on_item_enter(&scene, item, move || flag.set(true)).unwrap();

    assert!(pending.is_none());
    assert!(fired.get());
    assert_eq!(zone.evaluation_count(), 0);
}

#[test]
fn test_one_shot_waits_then_fires_once() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    let part = cube_at(&mut scene, Vec3::zeros(), 10.0);
    let id = registry.create_from_body(&scene, part).unwrap();
    registry.zone_mut(id).unwrap().set_accuracy(Accuracy::Precise);

    let body = cube_at(&mut scene, Vec3::new(50.0, 0.0, 0.0), 1.0);
    let item = Item::Body(body);
    let count = Rc::new(Cell::new(0));
    let counter = Rc::clone(&count);
    let pending = registry
        .zone_mut(id)
        .unwrap()
        .on_item_enter(&scene, item, move || counter.set(counter.get() + 1))
        .unwrap();
    assert!(pending.is_some());

    let mut clock = FrameClock::new(FRAME);
    registry.heartbeat(&scene, clock.tick());
    assert_eq!(count.get(), 0);

    // In, out and in again: the callback only ever runs once
    for x in [0.0, 50.0, 0.0] {
        scene.set_body_transform(body, Transform::from_position(Vec3::new(x, 0.0, 0.0)));
        registry.heartbeat(&scene, clock.tick());
    }
    assert_eq!(count.get(), 1);
    assert_eq!(registry.zone(id).unwrap().items_inside(), vec![item]);
}

#[test]
fn test_shared_border_enters_at_most_one_zone() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    let left = cube_at(&mut scene, Vec3::new(-5.0, 0.0, 0.0), 10.0);
    let right = cube_at(&mut scene, Vec3::new(5.0, 0.0, 0.0), 10.0);
    let a = registry.create_from_body(&scene, left).unwrap();
    let b = registry.create_from_body(&scene, right).unwrap();

    let character = scene.add_character(Vec3::new(0.0, 0.0, 50.0), Vec3::new(1.0, 2.0, 1.0));
    let player = scene.add_player(Some(character));

    let entered = new_log();
    for id in [a, b] {
        registry.bind_group(id, "rooms").unwrap();
        let zone = registry.zone_mut(id).unwrap();
        zone.set_accuracy(Accuracy::Precise);
        record(&mut zone.signals_mut().player_entered, &entered, "entered");
    }

    let mut clock = FrameClock::new(FRAME);
    registry.heartbeat(&scene, clock.tick());
    assert!(entered.borrow().is_empty());

    // Straddle the shared face: geometrically inside both
    scene.move_character(character, Vec3::zeros());
    for _ in 0..10 {
        registry.heartbeat(&scene, clock.tick());
        let holders = [a, b]
            .iter()
            .filter(|&&id| registry.zone(id).unwrap().players_inside().contains(&player))
            .count();
        assert_eq!(holders, 1);
    }
    assert_eq!(entered.borrow().len(), 1);

    // Step fully into the right zone; the held-back entry is released
    scene.move_character(character, Vec3::new(5.0, 0.0, 0.0));
    registry.heartbeat(&scene, clock.tick());
    registry.heartbeat(&scene, clock.tick());
    assert_eq!(registry.zone(b).unwrap().players_inside(), vec![player]);
    assert!(registry.zone(a).unwrap().players_inside().is_empty());
}

#[test]
fn test_group_without_exclusivity_passes_through() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    registry.set_group(
        "overlap",
        SettingsGroupProperties {
            only_enter_once_exited_all: false,
        },
    );
    let left = cube_at(&mut scene, Vec3::new(-5.0, 0.0, 0.0), 10.0);
    let right = cube_at(&mut scene, Vec3::new(5.0, 0.0, 0.0), 10.0);
    let a = registry.create_from_body(&scene, left).unwrap();
    let b = registry.create_from_body(&scene, right).unwrap();
    registry.bind_group(a, "overlap").unwrap();
    registry.bind_group(b, "overlap").unwrap();

    let character = scene.add_character(Vec3::zeros(), Vec3::new(1.0, 2.0, 1.0));
    let player = scene.add_player(Some(character));
    registry.heartbeat(&scene, 0.0);

    assert_eq!(registry.zone(a).unwrap().players_inside(), vec![player]);
    assert_eq!(registry.zone(b).unwrap().players_inside(), vec![player]);
}

#[test]
fn test_accuracy_change_on_live_zone() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    let body = cube_at(&mut scene, Vec3::zeros(), 10.0);
    let id = registry.create_from_body(&scene, body).unwrap();
    registry.zone_mut(id).unwrap().set_accuracy(Accuracy::Low);

    let mut clock = FrameClock::new(FRAME);
    for _ in 0..60 {
        registry.heartbeat(&scene, clock.tick());
    }
    assert_eq!(registry.zone(id).unwrap().evaluation_count(), 1);

    registry.zone_mut(id).unwrap().set_accuracy(Accuracy::Precise);
    for _ in 0..60 {
        registry.heartbeat(&scene, clock.tick());
    }
    assert_eq!(registry.zone(id).unwrap().evaluation_count(), 61);
}

#[test]
fn test_destroy_from_inside_subscriber() {
    let mut scene = MemoryScene::new();
    let mut registry = ZoneRegistry::default();
    let body = cube_at(&mut scene, Vec3::zeros(), 10.0);
    let id = registry.create_from_body(&scene, body).unwrap();

    for x in [-1.0, 1.0] {
        let character = scene.add_character(Vec3::new(x, 0.0, 0.0), Vec3::new(1.0, 2.0, 1.0));
        scene.add_player(Some(character));
    }

    let destroyer_calls = Rc::new(Cell::new(0));
    let later_calls = new_log();
    {
        let zone = registry.zone_mut(id).unwrap();
        let handle = zone.destroy_handle();
        let calls = Rc::clone(&destroyer_calls);
        zone.signals_mut().player_entered.connect(move |_| {
            calls.set(calls.get() + 1);
            handle.destroy();
        });
        record(&mut zone.signals_mut().player_entered, &later_calls, "entered");
        record(&mut zone.signals_mut().player_exited, &later_calls, "exited");
    }

    registry.heartbeat(&scene, 0.0);
    assert_eq!(destroyer_calls.get(), 1);
    assert!(labels(&later_calls).is_empty());
    assert!(matches!(registry.zone(id), Err(ZoneError::UseAfterDestroy(_))));

    // The next ticks run cleanly with nothing left to evaluate
    scene.set_failing(true);
    registry.heartbeat(&scene, 1.0);
    registry.heartbeat(&scene, 2.0);
    assert!(registry.zones().is_empty());
    assert_eq!(destroyer_calls.get(), 1);
}

#[test]
fn test_registry_config_from_defaults() {
    let registry = ZoneRegistry::new(ZoneConfig::new().with_default_accuracy(Accuracy::Medium)).unwrap();
    assert_eq!(registry.config().default_accuracy, Accuracy::Medium);
    assert!(registry.is_empty());
}
