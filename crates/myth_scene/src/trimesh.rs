//! Triangle Mesh
//!
//! `verts` holds one point per vertex, `faces` three vertex indices per
//! triangle. Three linear constraints size the primitive variables:
//!
//! | Storage                   | Size           |
//! |---------------------------|----------------|
//! | Uniform                   | faces          |
//! | Varying, Vertex           | verts          |
//! | FaceVarying, FaceVertex   | 3 * faces      |
//!
//! The bounding box and the mass properties behind the procedural `cog` and
//! `inertiatensor` slots are cached and dropped by forwarders on `verts` and
//! `faces`.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DMat3, DVec3};

use myth_core::{ComponentKey, ConstraintKey, GraphError, ObserverKey, Result};
use myth_slots::{ArraySlot, DependentId, FnProcedure, Forwarder, Slot, SlotGraph};

use crate::bounding_box::BoundingBox;
use crate::geometry::{GeomObject, PrimVars, VarStorage};

/// Mass properties of a closed mesh of uniform density and unit mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    pub volume: f64,
    pub cog: DVec3,
    pub inertia: DMat3,
}

type Cache<T> = Rc<RefCell<Option<T>>>;

#[derive(Debug)]
pub struct TriMesh {
    component: ComponentKey,
    pub verts: ArraySlot<DVec3>,
    pub faces: ArraySlot<i32>,
    pub cog: Slot<DVec3>,
    pub inertiatensor: Slot<DMat3>,
    uniform: ConstraintKey,
    varying: ConstraintKey,
    facevarying: ConstraintKey,
    prim_vars: PrimVars,
    bb_cache: Cache<BoundingBox>,
    mass_props: Cache<MassProperties>,
    observers: [ObserverKey; 2],
}

impl TriMesh {
    pub fn new(graph: &mut SlotGraph, name: &str) -> Result<Self> {
        let component = graph.add_component(name);
        let verts = graph.add_array::<DVec3>(1)?;
        let faces = graph.add_array::<i32>(3)?;

        let bb_cache: Cache<BoundingBox> = Rc::default();
        let mass_props: Cache<MassProperties> = Rc::default();

        let (bb, mp) = (bb_cache.clone(), mass_props.clone());
        let (bb2, mp2) = (bb_cache.clone(), mass_props.clone());
        let on_verts = graph.add_observer(
            Forwarder::new()
                .on_value_changed_range(move |_, _| {
                    bb.take();
                    mp.take();
                })
                .on_resize(move |_| {
                    bb2.take();
                    mp2.take();
                }),
        );
        let (mp, mp2) = (mass_props.clone(), mass_props.clone());
        let on_faces = graph.add_observer(
            Forwarder::new()
                .on_value_changed_range(move |_, _| {
                    mp.take();
                })
                .on_resize(move |_| {
                    mp2.take();
                }),
        );
        graph.add_dependent(verts, on_verts)?;
        graph.add_dependent(faces, on_faces)?;

        let uniform = graph.add_linear_constraint(faces, 1, 0)?;
        let varying = graph.add_linear_constraint(verts, 1, 0)?;
        let facevarying = graph.add_linear_constraint(faces, 3, 0)?;

        let props = mass_props.clone();
        let cog = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
            Ok(cached_mass_properties(g, &props, verts, faces)?.cog)
        }));
        let props = mass_props.clone();
        let inertiatensor = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
            Ok(cached_mass_properties(g, &props, verts, faces)?.inertia)
        }));
        for target in [DependentId::from(cog), DependentId::from(inertiatensor)] {
            graph.add_dependent(verts, target)?;
            graph.add_dependent(faces, target)?;
        }

        graph.add_owned_slot(component, "verts", verts)?;
        graph.add_owned_slot(component, "faces", faces)?;
        graph.add_owned_slot(component, "cog", cog)?;
        graph.add_owned_slot(component, "inertiatensor", inertiatensor)?;

        Ok(Self {
            component,
            verts,
            faces,
            cog,
            inertiatensor,
            uniform,
            varying,
            facevarying,
            prim_vars: PrimVars::default(),
            bb_cache,
            mass_props,
            observers: [on_verts, on_faces],
        })
    }

    /// Volume enclosed by the mesh (zero for open meshes).
    pub fn volume(&self, graph: &SlotGraph) -> Result<f64> {
        Ok(cached_mass_properties(graph, &self.mass_props, self.verts, self.faces)?.volume)
    }

    /// Whether the bounding box is cached.
    pub fn bounding_box_cached(&self) -> bool {
        self.bb_cache.borrow().is_some()
    }

    /// Destroys the mesh with its variables, constraints and observers.
    pub fn destroy(self, graph: &mut SlotGraph) -> Result<()> {
        graph.remove_component(self.component)?;
        for constraint in [self.uniform, self.varying, self.facevarying] {
            graph.remove_constraint(constraint)?;
        }
        for observer in self.observers {
            graph.remove_observer(observer)?;
        }
        Ok(())
    }
}

impl GeomObject for TriMesh {
    fn component(&self) -> ComponentKey {
        self.component
    }

    fn prim_vars(&self) -> &PrimVars {
        &self.prim_vars
    }

    fn prim_vars_mut(&mut self) -> &mut PrimVars {
        &mut self.prim_vars
    }

    fn slot_size_constraint(&self, graph: &mut SlotGraph, storage: VarStorage) -> ConstraintKey {
        match storage {
            VarStorage::Uniform => self.uniform,
            VarStorage::Varying | VarStorage::Vertex => self.varying,
            VarStorage::FaceVarying | VarStorage::FaceVertex => self.facevarying,
            VarStorage::Constant | VarStorage::User => graph.fixed_size_constraint(0),
        }
    }

    fn bounding_box(&self, graph: &SlotGraph) -> Result<BoundingBox> {
        if let Some(bb) = *self.bb_cache.borrow() {
            return Ok(bb);
        }
        let bb = BoundingBox::from_points(graph.values(self.verts)?);
        *self.bb_cache.borrow_mut() = Some(bb);
        Ok(bb)
    }
}

fn cached_mass_properties(
    graph: &SlotGraph,
    cache: &RefCell<Option<MassProperties>>,
    verts: ArraySlot<DVec3>,
    faces: ArraySlot<i32>,
) -> Result<MassProperties> {
    if let Some(props) = *cache.borrow() {
        return Ok(props);
    }
    log::trace!("computing mass properties");
    let props = mass_properties(graph.values(verts)?, graph.values(faces)?)?;
    *cache.borrow_mut() = Some(props);
    Ok(props)
}

/// Covariance of the tetrahedron spanned by the origin and the unit axes.
const CANONICAL_COVARIANCE: DMat3 = DMat3::from_cols_array(&[
    2.0 / 120.0, 1.0 / 120.0, 1.0 / 120.0,
    1.0 / 120.0, 2.0 / 120.0, 1.0 / 120.0,
    1.0 / 120.0, 1.0 / 120.0, 2.0 / 120.0,
]);

/// Integrates over the signed tetrahedra spanned by the origin and each
/// triangle. Open or flat meshes (no volume) fall back to the area weighted
/// centroid of the surface and a zero tensor.
pub fn mass_properties(verts: &[DVec3], faces: &[i32]) -> Result<MassProperties> {
    let vertex = |index: i32| -> Result<DVec3> {
        usize::try_from(index)
            .ok()
            .and_then(|i| verts.get(i).copied())
            .ok_or(GraphError::Index {
                context: "face vertex index".into(),
                index: usize::try_from(index).unwrap_or(usize::MAX),
                len: verts.len(),
            })
    };

    let mut volume = 0.0;
    let mut moment = DVec3::ZERO;
    let mut covariance = DMat3::ZERO;
    let mut area = 0.0;
    let mut area_moment = DVec3::ZERO;

    for tri in faces.chunks_exact(3) {
        let (a, b, c) = (vertex(tri[0])?, vertex(tri[1])?, vertex(tri[2])?);

        let det = a.dot(b.cross(c));
        volume += det / 6.0;
        moment += det / 24.0 * (a + b + c);
        let m = DMat3::from_cols(a, b, c);
        covariance += m * CANONICAL_COVARIANCE * m.transpose() * det;

        let tri_area = 0.5 * (b - a).cross(c - a).length();
        area += tri_area;
        area_moment += tri_area / 3.0 * (a + b + c);
    }

    if volume.abs() <= f64::EPSILON {
        let cog = if area > 0.0 { area_moment / area } else { DVec3::ZERO };
        return Ok(MassProperties {
            volume: 0.0,
            cog,
            inertia: DMat3::ZERO,
        });
    }

    let cog = moment / volume;
    // Covariance about the centre of gravity, scaled to unit mass.
    let outer = DMat3::from_cols(cog * cog.x, cog * cog.y, cog * cog.z);
    let c = (covariance - outer * volume) * (1.0 / volume);
    let trace = c.x_axis.x + c.y_axis.y + c.z_axis.z;
    let inertia = DMat3::from_diagonal(DVec3::splat(trace)) - c;

    Ok(MassProperties {
        volume: volume.abs(),
        cog,
        inertia,
    })
}
