//! Size Constraint Tests
//!
//! Tests for:
//! - User, fixed and linear constraints
//! - Registration bookkeeping
//! - Veto flowing upstream from constrained slots to the controller
//! - Rollback of partially applied constraint resizes

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use myth::prelude::*;
use myth::{ErrorKind, SizeConstraintKind};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// User Constraints
// ============================================================================

#[test]
fn registration_adopts_constraint_size() {
    init_logging();
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(4);
    let a = graph.add_array::<f64>(1).unwrap();
    graph.register_slot(c, a).unwrap();
    assert_eq!(graph.array_size(a).unwrap(), 4);
    assert_eq!(graph.slot_constraint(a).unwrap(), Some(c));

    graph.set_constraint_size(c, 2).unwrap();
    assert_eq!(graph.array_size(a).unwrap(), 2);
}

#[test]
fn constrained_slots_reject_direct_resize() {
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(1);
    let a = graph.add_array_with_constraint::<i32>(1, c).unwrap();

    let err = graph.resize(a, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert!(!graph.is_resizable(a, 5, false).unwrap());
    assert!(graph.is_resizable(a, 5, true).unwrap());
}

#[test]
fn registration_bookkeeping() {
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(0);
    let other = graph.add_user_constraint(0);
    let a = graph.add_array::<i32>(1).unwrap();
    graph.register_slot(c, a).unwrap();

    assert_eq!(graph.register_slot(c, a).unwrap_err().kind(), ErrorKind::AlreadyRegistered);
    assert_eq!(graph.register_slot(other, a).unwrap_err().kind(), ErrorKind::AlreadyRegistered);
    assert_eq!(graph.unregister_slot(other, a).unwrap_err().kind(), ErrorKind::NotFound);

    assert_eq!(graph.remove_constraint(c).unwrap_err().kind(), ErrorKind::InvalidOperation);
    graph.unregister_slot(c, a).unwrap();
    graph.resize(a, 3).unwrap();
    graph.remove_constraint(c).unwrap();
    assert_eq!(graph.constraint_size(c).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn scalar_slots_cannot_be_constrained() {
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(1);
    let s = graph.add_slot(0_i32);
    assert_eq!(graph.register_slot(c, s).unwrap_err().kind(), ErrorKind::InvalidOperation);
}

#[test]
fn removed_slot_leaves_constraint() {
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(2);
    let a = graph.add_array_with_constraint::<i32>(1, c).unwrap();
    graph.remove_slot(a).unwrap();
    assert!(graph.constraint_slots(c).unwrap().is_empty());
    graph.remove_constraint(c).unwrap();
}

#[test]
fn rollback_restores_every_registered_slot() {
    init_logging();
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(2);
    let first = graph.add_array_with_constraint::<f64>(1, c).unwrap();
    let second = graph.add_array_with_constraint::<f64>(1, c).unwrap();
    graph.set_values(first, 0, &[1.0, 2.0]).unwrap();

    let vetoer = graph.add_observer(Forwarder::new().query_resize_veto(|n| n == 5));
    graph.add_dependent(second, vetoer).unwrap();

    let err = graph.set_constraint_size(c, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Vetoed);
    assert_eq!(graph.constraint_size(c).unwrap(), 2);
    assert_eq!(graph.array_size(first).unwrap(), 2);
    assert_eq!(graph.array_size(second).unwrap(), 2);
    assert_eq!(graph.values(first).unwrap(), &[1.0, 2.0]);

    graph.set_constraint_size(c, 3).unwrap();
    assert_eq!(graph.array_size(second).unwrap(), 3);
}

#[test]
fn shrinking_rollback_restores_sibling_contents() {
    init_logging();
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(3);
    let first = graph.add_array_with_constraint::<f64>(1, c).unwrap();
    let second = graph.add_array_with_constraint::<f64>(1, c).unwrap();
    graph.set_values(first, 0, &[1.0, 2.0, 3.0]).unwrap();
    graph.set_values(second, 0, &[4.0, 5.0, 6.0]).unwrap();

    let sizes = Rc::new(RefCell::new(Vec::new()));
    let s = sizes.clone();
    let listener = graph.add_observer(Forwarder::new().on_resize(move |n| s.borrow_mut().push(n)));
    graph.add_dependent(first, listener).unwrap();
    let vetoer = graph.add_observer(Forwarder::new().query_resize_veto(|n| n == 1));
    graph.add_dependent(second, vetoer).unwrap();

    // `first` follows before `second` refuses.
    let err = graph.set_constraint_size(c, 1).unwrap_err();
    assert_eq!(err, GraphError::Vetoed { size: 1 });
    assert_eq!(graph.constraint_size(c).unwrap(), 3);
    assert_eq!(graph.values(first).unwrap(), &[1.0, 2.0, 3.0]);
    assert_eq!(graph.values(second).unwrap(), &[4.0, 5.0, 6.0]);
    assert_eq!(*sizes.borrow(), vec![1, 3]);
}

#[test]
fn unallocatable_size_is_rolled_back() {
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(2);
    let a = graph.add_array_with_constraint::<f64>(1, c).unwrap();
    graph.set_values(a, 0, &[1.0, 2.0]).unwrap();

    let err = graph.set_constraint_size(c, usize::MAX).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(graph.constraint_size(c).unwrap(), 2);
    assert_eq!(graph.values(a).unwrap(), &[1.0, 2.0]);
}

// ============================================================================
// Fixed Constraints
// ============================================================================

#[test]
fn fixed_constraints_are_shared() {
    let mut graph = SlotGraph::new();
    let one = graph.fixed_size_constraint(1);
    assert_eq!(graph.fixed_size_constraint(1), one);
    assert_ne!(graph.fixed_size_constraint(4), one);
    assert_eq!(graph.constraint_kind(one).unwrap(), SizeConstraintKind::Fixed);

    let a = graph.add_array_with_constraint::<DVec3>(1, one).unwrap();
    assert_eq!(graph.array_size(a).unwrap(), 1);
    let err = graph.set_constraint_size(one, 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

// ============================================================================
// Linear Constraints
// ============================================================================

#[test]
fn linear_constraint_follows_controller() {
    let mut graph = SlotGraph::new();
    let faces = graph.add_array::<i32>(3).unwrap();
    let corners = graph.add_linear_constraint(faces, 3, 0).unwrap();
    let uv = graph.add_array_with_constraint::<DVec3>(1, corners).unwrap();

    graph.resize(faces, 2).unwrap();
    assert_eq!(graph.constraint_size(corners).unwrap(), 6);
    assert_eq!(graph.array_size(uv).unwrap(), 6);

    graph.set_linear_coeffs(corners, 1, 1).unwrap();
    assert_eq!(graph.array_size(uv).unwrap(), 3);
    assert_eq!(
        graph.constraint_kind(corners).unwrap(),
        SizeConstraintKind::Linear {
            controller: Some(faces.key()),
            a: 1,
            b: 1,
        }
    );
}

#[test]
fn linear_constraint_vetoes_controller_resize() {
    let mut graph = SlotGraph::new();
    let verts = graph.add_array::<DVec3>(1).unwrap();
    graph.resize(verts, 4).unwrap();
    let varying = graph.add_linear_constraint(verts, 1, 0).unwrap();
    let cs = graph.add_array_with_constraint::<DVec3>(1, varying).unwrap();

    let resizes = Rc::new(Cell::new(0));
    let r = resizes.clone();
    let listener = graph.add_observer(Forwarder::new().on_resize(move |_| r.set(r.get() + 1)));
    graph.add_dependent(verts, listener).unwrap();
    let vetoer = graph.add_observer(Forwarder::new().query_resize_veto(|n| n == 6));
    graph.add_dependent(cs, vetoer).unwrap();

    assert!(graph.query_resize_veto(varying, 6).unwrap());
    assert!(!graph.query_resize_veto(varying, 7).unwrap());

    let err = graph.resize(verts, 6).unwrap_err();
    assert_eq!(err, GraphError::Vetoed { size: 6 });
    assert_eq!(graph.array_size(verts).unwrap(), 4);
    assert_eq!(graph.array_size(cs).unwrap(), 4);
    assert_eq!(resizes.get(), 0);
}

#[test]
fn failed_coefficient_change_keeps_old_coefficients() {
    let mut graph = SlotGraph::new();
    let verts = graph.add_array::<f64>(1).unwrap();
    graph.resize(verts, 2).unwrap();
    let c = graph.add_linear_constraint(verts, 1, 0).unwrap();
    let a = graph.add_array_with_constraint::<f64>(1, c).unwrap();
    let vetoer = graph.add_observer(Forwarder::new().query_resize_veto(|n| n > 2));
    graph.add_dependent(a, vetoer).unwrap();

    assert!(graph.set_linear_coeffs(c, 2, 0).is_err());
    assert_eq!(graph.constraint_size(c).unwrap(), 2);
    assert_eq!(
        graph.constraint_kind(c).unwrap(),
        SizeConstraintKind::Linear {
            controller: Some(verts.key()),
            a: 1,
            b: 0,
        }
    );
}

#[test]
fn destroyed_controller_freezes_constraint() {
    let mut graph = SlotGraph::new();
    let verts = graph.add_array::<f64>(1).unwrap();
    graph.resize(verts, 3).unwrap();
    let c = graph.add_linear_constraint(verts, 2, 0).unwrap();
    let a = graph.add_array_with_constraint::<f64>(1, c).unwrap();

    graph.remove_slot(verts).unwrap();
    assert_eq!(graph.constraint_size(c).unwrap(), 6);
    assert_eq!(graph.array_size(a).unwrap(), 6);
    assert_eq!(
        graph.constraint_kind(c).unwrap(),
        SizeConstraintKind::Linear {
            controller: None,
            a: 2,
            b: 0,
        }
    );
}

#[test]
fn constraint_cannot_drive_its_own_controller() {
    let mut graph = SlotGraph::new();
    let verts = graph.add_array::<f64>(1).unwrap();
    let c = graph.add_linear_constraint(verts, 1, 0).unwrap();
    let err = graph.register_slot(c, verts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
    assert_eq!(graph.slot_constraint(verts).unwrap(), None);
}

#[test]
fn constrained_arrays_cannot_be_connected() {
    let mut graph = SlotGraph::new();
    let c = graph.add_user_constraint(2);
    let source = graph.add_array::<i32>(1).unwrap();
    let target = graph.add_array_with_constraint::<i32>(1, c).unwrap();
    let err = graph.connect(source, target).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let mirror = graph.add_array::<i32>(1).unwrap();
    graph.connect(source, mirror).unwrap();
    let err = graph.register_slot(c, mirror).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn failed_follow_up_restores_every_constraint_of_the_controller() {
    init_logging();
    let mut graph = SlotGraph::new();
    let verts = graph.add_array::<f64>(1).unwrap();
    graph.resize(verts, 3).unwrap();
    graph.set_values(verts, 0, &[1.0, 2.0, 3.0]).unwrap();

    let weights_size = graph.add_linear_constraint(verts, 1, 0).unwrap();
    let colors_size = graph.add_linear_constraint(verts, 1, 0).unwrap();
    let weights = graph.add_array_with_constraint::<f64>(1, weights_size).unwrap();
    let colors = graph.add_array_with_constraint::<f64>(1, colors_size).unwrap();
    graph.set_values(weights, 0, &[10.0, 20.0, 30.0]).unwrap();

    // Accepts when asked up front, rejects once the resize is under way.
    let asked = Rc::new(Cell::new(0));
    let a = asked.clone();
    let fickle = graph.add_observer(Forwarder::new().query_resize_veto(move |_| {
        a.set(a.get() + 1);
        a.get() > 1
    }));
    graph.add_dependent(colors, fickle).unwrap();

    let err = graph.resize(verts, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Vetoed);
    assert_eq!(graph.values(verts).unwrap(), &[1.0, 2.0, 3.0]);
    assert_eq!(graph.values(weights).unwrap(), &[10.0, 20.0, 30.0]);
    assert_eq!(graph.array_size(colors).unwrap(), 3);
    assert_eq!(graph.constraint_size(weights_size).unwrap(), 3);
    assert_eq!(graph.constraint_size(colors_size).unwrap(), 3);
}

#[test]
fn overflowing_linear_sizes_are_rejected() {
    let mut graph = SlotGraph::new();
    let verts = graph.add_array::<f64>(1).unwrap();
    graph.resize(verts, 2).unwrap();

    let err = graph.add_linear_constraint(verts, usize::MAX, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let c = graph.add_linear_constraint(verts, usize::MAX / 4, 0).unwrap();
    let err = graph.resize(verts, 8).unwrap_err();
    assert_eq!(err, GraphError::Vetoed { size: 8 });
    assert_eq!(graph.array_size(verts).unwrap(), 2);
    assert!(graph.query_resize_veto(c, 8).unwrap());

    let err = graph.set_linear_coeffs(c, usize::MAX, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(
        graph.constraint_kind(c).unwrap(),
        SizeConstraintKind::Linear {
            controller: Some(verts.key()),
            a: usize::MAX / 4,
            b: 0,
        }
    );
}
