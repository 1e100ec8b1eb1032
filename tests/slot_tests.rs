//! Scalar Slot Tests
//!
//! Tests for:
//! - Stored slots: write-then-read, change notification
//! - Procedural slots: lazy evaluation, caching, invalidation order, setters
//! - Connections: read-through, policies, disconnect, controller deletion
//! - Dependent bookkeeping and cycle detection

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use myth::prelude::*;
use myth::{ConnectionPolicy, ErrorKind, GraphSettings};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Procedural slot computing `2 * source`, counting its evaluations.
fn doubled(graph: &mut SlotGraph, source: Slot<f64>) -> (Slot<f64>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    let slot = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
        counter.set(counter.get() + 1);
        Ok(2.0 * g.get(source)?)
    }));
    graph.add_dependent(source, slot).unwrap();
    (slot, count)
}

// ============================================================================
// Stored Slots
// ============================================================================

#[test]
fn write_then_read() {
    init_logging();
    let mut graph = SlotGraph::new();
    let slot = graph.add_slot(1.5_f64);
    assert_eq!(graph.get(slot).unwrap(), 1.5);

    graph.set(slot, -4.0).unwrap();
    assert_eq!(graph.get(slot).unwrap(), -4.0);
    assert_eq!(*graph.value(slot).unwrap(), -4.0);
}

#[test]
fn write_notifies_observers() {
    let mut graph = SlotGraph::new();
    let slot = graph.add_slot(String::from("a"));
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    let observer = graph.add_observer(Forwarder::new().on_value_changed(move || h.set(h.get() + 1)));
    graph.add_dependent(slot, observer).unwrap();

    graph.set(slot, "b".into()).unwrap();
    graph.set(slot, "c".into()).unwrap();
    assert_eq!(hits.get(), 2);

    graph.remove_observer(observer).unwrap();
    graph.set(slot, "d".into()).unwrap();
    assert_eq!(hits.get(), 2);
    assert!(graph.dependents(slot).unwrap().is_empty());
}

#[test]
fn typed_lookup_checks_payload_type() {
    let mut graph = SlotGraph::new();
    let slot = graph.add_slot(1.0_f64);
    let err = graph.typed_slot::<i32>(slot.key()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(graph.typed_slot::<f64>(slot.key()).is_ok());
    assert!(graph.typed_array::<f64>(slot.key()).is_err());
}

#[test]
fn removed_slot_handles_go_stale() {
    let mut graph = SlotGraph::new();
    let slot = graph.add_slot(3_i32);
    graph.remove_slot(slot).unwrap();

    assert!(!graph.contains(slot));
    assert_eq!(graph.get(slot).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(graph.remove_slot(slot).unwrap_err().kind(), ErrorKind::NotFound);
}

// ============================================================================
// Procedural Slots
// ============================================================================

#[test]
fn procedural_read_is_idempotent() {
    let mut graph = SlotGraph::new();
    let source = graph.add_slot(3.0_f64);
    let (slot, count) = doubled(&mut graph, source);

    assert!(!graph.is_cached(slot).unwrap());
    assert_eq!(graph.get(slot).unwrap(), 6.0);
    assert_eq!(graph.get(slot).unwrap(), 6.0);
    assert_eq!(count.get(), 1);
    assert!(graph.is_cached(slot).unwrap());
}

#[test]
fn upstream_write_invalidates() {
    let mut graph = SlotGraph::new();
    let source = graph.add_slot(3.0_f64);
    let (slot, count) = doubled(&mut graph, source);
    graph.get(slot).unwrap();

    graph.set(source, 5.0).unwrap();
    assert!(!graph.is_cached(slot).unwrap());
    assert_eq!(count.get(), 1, "recomputation is deferred until read");
    assert_eq!(graph.get(slot).unwrap(), 10.0);
    assert_eq!(count.get(), 2);
}

#[test]
fn chained_procedurals_recompute_in_order_once() {
    init_logging();
    let mut graph = SlotGraph::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let a = graph.add_slot(1.0_f64);
    let log_b = order.clone();
    let b = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
        let v = g.get(a)? + 1.0;
        log_b.borrow_mut().push("B");
        Ok(v)
    }));
    graph.add_dependent(a, b).unwrap();
    let log_c = order.clone();
    let c = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
        let v = g.get(b)? * 10.0;
        log_c.borrow_mut().push("C");
        Ok(v)
    }));
    graph.add_dependent(b, c).unwrap();

    assert_eq!(graph.get(c).unwrap(), 20.0);
    order.borrow_mut().clear();

    graph.set(a, 4.0).unwrap();
    assert!(!graph.is_cached(b).unwrap());
    assert!(!graph.is_cached(c).unwrap());
    assert_eq!(graph.get(c).unwrap(), 50.0);
    assert_eq!(*order.borrow(), vec!["B", "C"]);

    graph.get(c).unwrap();
    graph.get(b).unwrap();
    assert_eq!(order.borrow().len(), 2);
}

#[test]
fn procedural_without_setter_is_read_only() {
    let mut graph = SlotGraph::new();
    let slot = graph.add_procedural(FnProcedure::new(|_: &mut SlotGraph| Ok(1_u32)));
    let err = graph.set(slot, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(graph.get(slot).unwrap(), 1);
}

#[test]
fn procedural_setter_feeds_the_next_computation() {
    let mut graph = SlotGraph::new();
    let store = Rc::new(Cell::new(1_i64));
    let (read, write) = (store.clone(), store.clone());
    let slot = graph.add_procedural(
        FnProcedure::new(move |_: &mut SlotGraph| Ok(read.get() * 100)).with_setter(move |_, v| {
            write.set(v);
            Ok(())
        }),
    );
    assert_eq!(graph.get(slot).unwrap(), 100);
    graph.set(slot, 7).unwrap();
    assert_eq!(store.get(), 7);
    assert_eq!(graph.get(slot).unwrap(), 700);
}

#[test]
fn procedure_hooks_follow_invalidation() {
    let mut graph = SlotGraph::new();
    let source = graph.add_slot(0_i32);
    let stale = Rc::new(Cell::new(false));
    let flag = stale.clone();
    let slot = graph.add_procedural(
        FnProcedure::new(move |g: &mut SlotGraph| g.get(source)).on_value_changed(move || flag.set(true)),
    );
    graph.add_dependent(source, slot).unwrap();

    graph.set(source, 1).unwrap();
    assert!(stale.get());
}

#[test]
fn invalidate_forces_recomputation() {
    let mut graph = SlotGraph::new();
    let external = Rc::new(Cell::new(1.0_f64));
    let read = external.clone();
    let slot = graph.add_procedural(FnProcedure::new(move |_: &mut SlotGraph| Ok(read.get())));
    assert_eq!(graph.get(slot).unwrap(), 1.0);

    external.set(2.0);
    assert_eq!(graph.get(slot).unwrap(), 1.0);
    graph.invalidate(slot).unwrap();
    assert_eq!(graph.get(slot).unwrap(), 2.0);
}

// ============================================================================
// Connections
// ============================================================================

#[test]
fn connected_slot_reads_through_and_is_read_only() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(DVec3::X);
    let b = graph.add_slot(DVec3::ZERO);
    let c = graph.add_slot(DVec3::ZERO);
    graph.connect(a, b).unwrap();
    graph.connect(b, c).unwrap();

    assert_eq!(graph.get(c).unwrap(), DVec3::X);
    graph.set(a, DVec3::Y).unwrap();
    assert_eq!(graph.get(c).unwrap(), DVec3::Y);

    let err = graph.set(b, DVec3::Z).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn connected_procedural_consumers_are_invalidated() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(1.0_f64);
    let b = graph.add_slot(0.0_f64);
    let (twice_b, count) = doubled(&mut graph, b);
    assert_eq!(graph.get(twice_b).unwrap(), 0.0);

    graph.connect(a, b).unwrap();
    assert_eq!(graph.get(twice_b).unwrap(), 2.0);
    graph.set(a, 4.0).unwrap();
    assert_eq!(graph.get(twice_b).unwrap(), 8.0);
    assert_eq!(count.get(), 3);
}

#[test]
fn single_policy_rejects_reconnection() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(1_i32);
    let b = graph.add_slot(2_i32);
    let target = graph.add_slot(0_i32);
    graph.connect(a, target).unwrap();

    let err = graph.connect(b, target).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(graph.controller(target).unwrap(), Some(a.key()));
}

#[test]
fn multiple_policy_replaces_controller() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(1_i32);
    let b = graph.add_slot(2_i32);
    let target = graph.add_slot_with_policy(0_i32, ConnectionPolicy::Multiple);
    graph.connect(a, target).unwrap();
    graph.connect(b, target).unwrap();

    assert_eq!(graph.get(target).unwrap(), 2);
    assert!(graph.dependents(a).unwrap().is_empty());
    graph.set(a, 10).unwrap();
    assert_eq!(graph.get(target).unwrap(), 2);
}

#[test]
fn procedural_slots_take_no_input() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(1_i32);
    let p = graph.add_procedural(FnProcedure::new(|_: &mut SlotGraph| Ok(0_i32)));
    let err = graph.connect(a, p).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn connect_any_checks_types() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(1_i32);
    let b = graph.add_slot(1.0_f32);
    let err = graph.connect_any(a.key(), b.key()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn disconnect_keeps_last_value() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(5_i32);
    let b = graph.add_slot(0_i32);
    graph.connect(a, b).unwrap();
    graph.disconnect(b).unwrap();

    assert_eq!(graph.get(b).unwrap(), 5);
    graph.set(a, 6).unwrap();
    assert_eq!(graph.get(b).unwrap(), 5);
    graph.set(b, 7).unwrap();
    assert_eq!(graph.get(b).unwrap(), 7);

    let err = graph.disconnect(b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn deleting_controller_detaches_dependents() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(9_i32);
    let b = graph.add_slot(0_i32);
    graph.connect(a, b).unwrap();
    let deleted = Rc::new(Cell::new(false));
    let flag = deleted.clone();
    let observer = graph.add_observer(Forwarder::new().on_controller_deleted(move || flag.set(true)));
    graph.add_dependent(a, observer).unwrap();

    graph.remove_slot(a).unwrap();
    assert!(deleted.get());
    assert_eq!(graph.controller(b).unwrap(), None);
    assert_eq!(graph.get(b).unwrap(), 9);
    graph.set(b, 1).unwrap();
}

// ============================================================================
// Dependents & Cycles
// ============================================================================

#[test]
fn dependent_registration_is_unique() {
    let mut graph = SlotGraph::new();
    let source = graph.add_slot(0_i32);
    let (other, _) = {
        let s = graph.add_slot(0.0_f64);
        doubled(&mut graph, s)
    };

    graph.add_dependent(source, other).unwrap();
    let err = graph.add_dependent(source, other).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRegistered);

    graph.remove_dependent(source, other).unwrap();
    let err = graph.remove_dependent(source, other).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn dependency_cycles_are_rejected() {
    let mut graph = SlotGraph::new();
    let a = graph.add_slot(0_i32);
    let b = graph.add_slot(0_i32);
    let c = graph.add_slot(0_i32);
    graph.add_dependent(a, b).unwrap();
    graph.add_dependent(b, c).unwrap();

    assert_eq!(graph.add_dependent(c, a).unwrap_err().kind(), ErrorKind::Cycle);
    assert_eq!(graph.add_dependent(a, a).unwrap_err().kind(), ErrorKind::Cycle);
    assert_eq!(graph.connect(c, a).unwrap_err().kind(), ErrorKind::Cycle);
    assert_eq!(graph.controller(a).unwrap(), None);
}

#[test]
fn cycle_detection_can_be_disabled() {
    let mut graph = SlotGraph::with_settings(GraphSettings {
        detect_cycles: false,
        ..Default::default()
    });
    let a = graph.add_slot(0_i32);
    let b = graph.add_slot(0_i32);
    graph.add_dependent(a, b).unwrap();
    graph.add_dependent(b, a).unwrap();

    // Stored slots ignore upstream notifications, so the loop is inert.
    graph.set(a, 1).unwrap();
    assert_eq!(graph.get(b).unwrap(), 0);
}

#[test]
fn self_reading_procedure_reports_cycle() {
    init_logging();
    let mut graph = SlotGraph::new();
    let me: Rc<Cell<Option<Slot<i32>>>> = Rc::new(Cell::new(None));
    let handle = me.clone();
    let slot = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| match handle.get() {
        Some(me) => Ok(g.get(me)? + 1),
        None => Ok(0),
    }));
    me.set(Some(slot));

    let err = graph.get(slot).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
    assert!(!graph.is_cached(slot).unwrap());

    // The procedure is restored after the failed evaluation.
    me.set(None);
    assert_eq!(graph.get(slot).unwrap(), 0);
}
