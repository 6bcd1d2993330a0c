//! Contacts between fixture pairs: type dispatch, manifold updates with
//! warm-start transfer, listener callbacks and pooled storage.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::{
    collision::{
        manifold::{test_overlap, Manifold, WorldManifold},
        narrowphase::NarrowPhase,
    },
    config::MAX_MANIFOLD_POINTS,
    core::{
        fixed::Fp,
        shape::{Shape, ShapeType},
        types::{Material, Transform},
    },
    dynamics::friction::MixedMaterial,
    utils::allocator::{Arena, EntityId},
};

/// Manifold routine for an ordered shape-type pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContactKind {
    CircleCircle,
    PolygonCircle,
    PolygonPolygon,
    EdgeCircle,
    EdgePolygon,
    ChainCircle,
    ChainPolygon,
}

impl ContactKind {
    pub const COUNT: usize = 7;

    pub const ALL: [ContactKind; Self::COUNT] = [
        ContactKind::CircleCircle,
        ContactKind::PolygonCircle,
        ContactKind::PolygonPolygon,
        ContactKind::EdgeCircle,
        ContactKind::EdgePolygon,
        ContactKind::ChainCircle,
        ContactKind::ChainPolygon,
    ];

    /// Routine registered for `(a, b)` in that order.
    fn registered(a: ShapeType, b: ShapeType) -> Option<ContactKind> {
        use ShapeType::*;
        match (a, b) {
            (Circle, Circle) => Some(ContactKind::CircleCircle),
            (Polygon, Circle) => Some(ContactKind::PolygonCircle),
            (Polygon, Polygon) => Some(ContactKind::PolygonPolygon),
            (Edge, Circle) => Some(ContactKind::EdgeCircle),
            (Edge, Polygon) => Some(ContactKind::EdgePolygon),
            (Chain, Circle) => Some(ContactKind::ChainCircle),
            (Chain, Polygon) => Some(ContactKind::ChainPolygon),
            _ => None,
        }
    }

    /// Looks up the routine for a pair. The flag is true when the fixtures
    /// must be swapped so that A is the shape the routine expects first.
    /// Pairs without a routine, such as edge against edge, never collide.
    pub fn for_pair(a: ShapeType, b: ShapeType) -> Option<(ContactKind, bool)> {
        Self::registered(a, b)
            .map(|kind| (kind, false))
            .or_else(|| Self::registered(b, a).map(|kind| (kind, true)))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Runs the manifold routine. Chain children are expanded to their
    /// one-sided edge.
    ///
    /// # Panics
    /// Panics if the shapes do not match the kind.
    pub fn evaluate(
        self,
        manifold: &mut Manifold,
        shape_a: &Shape,
        child_a: usize,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) {
        match (self, shape_a, shape_b) {
            (ContactKind::CircleCircle, Shape::Circle(a), Shape::Circle(b)) => {
                NarrowPhase::collide_circles(manifold, a, xf_a, b, xf_b)
            }
            (ContactKind::PolygonCircle, Shape::Polygon(a), Shape::Circle(b)) => {
                NarrowPhase::collide_polygon_and_circle(manifold, a, xf_a, b, xf_b)
            }
            (ContactKind::PolygonPolygon, Shape::Polygon(a), Shape::Polygon(b)) => {
                NarrowPhase::collide_polygons(manifold, a, xf_a, b, xf_b)
            }
            (ContactKind::EdgeCircle, Shape::Edge(a), Shape::Circle(b)) => {
                NarrowPhase::collide_edge_and_circle(manifold, a, xf_a, b, xf_b)
            }
            (ContactKind::EdgePolygon, Shape::Edge(a), Shape::Polygon(b)) => {
                NarrowPhase::collide_edge_and_polygon(manifold, a, xf_a, b, xf_b)
            }
            (ContactKind::ChainCircle, Shape::Chain(chain), Shape::Circle(b)) => {
                let edge = chain.child_edge(child_a);
                NarrowPhase::collide_edge_and_circle(manifold, &edge, xf_a, b, xf_b)
            }
            (ContactKind::ChainPolygon, Shape::Chain(chain), Shape::Polygon(b)) => {
                let edge = chain.child_edge(child_a);
                NarrowPhase::collide_edge_and_polygon(manifold, &edge, xf_a, b, xf_b)
            }
            (kind, a, b) => panic!(
                "contact kind {kind:?} cannot collide {:?} with {:?}",
                a.shape_type(),
                b.shape_type()
            ),
        }
    }
}

/// One side of a contact: which fixture, on which body, and which child of
/// its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixtureHandle {
    pub fixture: EntityId,
    pub body: EntityId,
    pub child_index: usize,
}

/// Solver impulses for each manifold point, reported after solving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactImpulse {
    pub normal_impulses: [Fp; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [Fp; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Callbacks for contact lifecycle events. Every method defaults to a
/// no-op.
///
/// `pre_solve` runs after a manifold update and before solving, with the
/// previous manifold for comparison; disabling the contact there skips it
/// for the current step. `post_solve` reports the impulses the solver
/// applied.
pub trait ContactListener {
    fn begin_contact(&mut self, _contact: &Contact) {}

    fn end_contact(&mut self, _contact: &Contact) {}

    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {}

    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl ContactListener for NullListener {}

/// Persistent contact between two fixture children whose bounds overlap.
/// The manifold is empty while the shapes are apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub kind: ContactKind,
    pub a: FixtureHandle,
    pub b: FixtureHandle,
    pub manifold: Manifold,

    pub friction: Fp,
    pub restitution: Fp,
    pub restitution_threshold: Fp,
    /// Surface speed along the tangent, for conveyor-belt effects.
    pub tangent_speed: Fp,

    touching: bool,
    enabled: bool,
    /// Cached time of impact for the current sub-step sweep.
    pub toi: Option<Fp>,
    pub toi_count: u32,
}

impl Contact {
    pub fn new(kind: ContactKind, a: FixtureHandle, b: FixtureHandle, mixed: MixedMaterial) -> Self {
        Self {
            kind,
            a,
            b,
            manifold: Manifold::default(),
            friction: mixed.friction,
            restitution: mixed.restitution,
            restitution_threshold: mixed.restitution_threshold,
            tangent_speed: Fp::ZERO,
            touching: false,
            enabled: true,
            toi: None,
            toi_count: 0,
        }
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the contact for the current step. Re-enabled on
    /// every update.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn reset_friction(&mut self, a: &Material, b: &Material) {
        self.friction = MixedMaterial::new(a, b).friction;
    }

    pub fn reset_restitution(&mut self, a: &Material, b: &Material) {
        self.restitution = MixedMaterial::new(a, b).restitution;
    }

    pub fn world_manifold(
        &self,
        xf_a: &Transform,
        radius_a: Fp,
        xf_b: &Transform,
        radius_b: Fp,
    ) -> WorldManifold {
        WorldManifold::new(&self.manifold, xf_a, radius_a, xf_b, radius_b)
    }

    /// Re-evaluates the manifold at the given transforms and carries the
    /// stored impulses over to points with a matching id. Sensors only test
    /// for overlap and keep an empty manifold.
    ///
    /// Fires `begin_contact`/`end_contact` on touch transitions and
    /// `pre_solve` while a solid contact is touching. Returns whether the
    /// touching state changed.
    pub fn update(
        &mut self,
        shape_a: &Shape,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
        sensor: bool,
        listener: &mut dyn ContactListener,
    ) -> bool {
        let old_manifold = self.manifold;

        self.enabled = true;
        let was_touching = self.touching;

        let touching = if sensor {
            self.manifold.point_count = 0;
            test_overlap(shape_a, self.a.child_index, shape_b, self.b.child_index, xf_a, xf_b)
        } else {
            self.kind
                .evaluate(&mut self.manifold, shape_a, self.a.child_index, xf_a, shape_b, xf_b);

            for mp2 in self.manifold.points_mut() {
                mp2.normal_impulse = Fp::ZERO;
                mp2.tangent_impulse = Fp::ZERO;
                if let Some(mp1) = old_manifold.points().iter().find(|mp1| mp1.id == mp2.id) {
                    mp2.normal_impulse = mp1.normal_impulse;
                    mp2.tangent_impulse = mp1.tangent_impulse;
                }
            }
            self.manifold.point_count > 0
        };

        self.touching = touching;

        if !was_touching && touching {
            trace!("begin contact {:?} / {:?}", self.a.fixture, self.b.fixture);
            listener.begin_contact(self);
        }
        if was_touching && !touching {
            trace!("end contact {:?} / {:?}", self.a.fixture, self.b.fixture);
            listener.end_contact(self);
        }
        if !sensor && touching {
            listener.pre_solve(self, &old_manifold);
        }

        was_touching != touching
    }
}

/// Handle of a pooled contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactHandle {
    pub kind: ContactKind,
    pub id: EntityId,
}

/// Contacts stored in one arena per [`ContactKind`]. Destroyed slots are
/// recycled through each arena's free list.
#[derive(Debug, Clone, Default)]
pub struct ContactPool {
    arenas: [Arena<Contact>; ContactKind::COUNT],
}

impl ContactPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a contact for two fixture children, swapping them when the
    /// routine expects the other order. Returns `None` for pairs that never
    /// collide.
    pub fn create(
        &mut self,
        type_a: ShapeType,
        a: FixtureHandle,
        material_a: &Material,
        type_b: ShapeType,
        b: FixtureHandle,
        material_b: &Material,
    ) -> Option<ContactHandle> {
        let (kind, swap) = ContactKind::for_pair(type_a, type_b)?;
        let mixed = MixedMaterial::new(material_a, material_b);
        let contact = if swap {
            Contact::new(kind, b, a, mixed)
        } else {
            Contact::new(kind, a, b, mixed)
        };
        let id = self.arenas[kind.index()].insert(contact);
        Some(ContactHandle { kind, id })
    }

    pub fn destroy(&mut self, handle: ContactHandle) -> Option<Contact> {
        self.arenas[handle.kind.index()].remove(handle.id)
    }

    pub fn get(&self, handle: ContactHandle) -> Option<&Contact> {
        self.arenas[handle.kind.index()].get(handle.id)
    }

    pub fn get_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.arenas[handle.kind.index()].get_mut(handle.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> + '_ {
        ContactKind::ALL.into_iter().flat_map(move |kind| {
            self.arenas[kind.index()]
                .iter()
                .map(move |(id, contact)| (ContactHandle { kind, id }, contact))
        })
    }

    pub fn handles(&self) -> Vec<ContactHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    pub fn len(&self) -> usize {
        self.arenas.iter().map(Arena::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.arenas = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::shape::EdgeShape, utils::math::Vec2};

    fn handle(index: usize) -> FixtureHandle {
        FixtureHandle {
            fixture: EntityId::new(index, 0),
            body: EntityId::new(index, 0),
            child_index: 0,
        }
    }

    #[derive(Default)]
    struct Recorder {
        begins: usize,
        ends: usize,
        pre_solves: usize,
    }

    impl ContactListener for Recorder {
        fn begin_contact(&mut self, _contact: &Contact) {
            self.begins += 1;
        }

        fn end_contact(&mut self, _contact: &Contact) {
            self.ends += 1;
        }

        fn pre_solve(&mut self, _contact: &mut Contact, _old: &Manifold) {
            self.pre_solves += 1;
        }
    }

    #[test]
    fn dispatch_swaps_reversed_pairs() {
        use ShapeType::*;
        assert_eq!(
            ContactKind::for_pair(Circle, Polygon),
            Some((ContactKind::PolygonCircle, true))
        );
        assert_eq!(
            ContactKind::for_pair(Chain, Polygon),
            Some((ContactKind::ChainPolygon, false))
        );
        assert_eq!(
            ContactKind::for_pair(Circle, Edge),
            Some((ContactKind::EdgeCircle, true))
        );
        assert_eq!(ContactKind::for_pair(Edge, Edge), None);
        assert_eq!(ContactKind::for_pair(Chain, Edge), None);
    }

    #[test]
    fn pool_creates_swapped_contact_and_reuses_slots() {
        let mut pool = ContactPool::new();
        let material = Material::default();
        let h = pool
            .create(
                ShapeType::Circle,
                handle(1),
                &material,
                ShapeType::Polygon,
                handle(2),
                &material,
            )
            .expect("circle vs polygon collides");
        let contact = pool.get(h).expect("contact");
        assert_eq!(contact.kind, ContactKind::PolygonCircle);
        assert_eq!(contact.a, handle(2));
        assert_eq!(contact.b, handle(1));

        assert!(pool
            .create(ShapeType::Edge, handle(3), &material, ShapeType::Edge, handle(4), &material)
            .is_none());
        assert_eq!(pool.len(), 1);

        pool.destroy(h);
        assert!(pool.get(h).is_none());
        let again = pool
            .create(
                ShapeType::Polygon,
                handle(2),
                &material,
                ShapeType::Circle,
                handle(1),
                &material,
            )
            .expect("contact");
        assert_eq!(again.id.index(), h.id.index());
        assert_ne!(again, h);
    }

    #[test]
    fn update_fires_begin_and_end_once() {
        let circle = Shape::circle(Fp::HALF).expect("circle");
        let ground = Shape::Edge(EdgeShape::two_sided(
            Vec2::from_ints(-5, 0),
            Vec2::from_ints(5, 0),
        ));
        let mut contact = Contact::new(
            ContactKind::EdgeCircle,
            handle(0),
            handle(1),
            MixedMaterial::new(&Material::default(), &Material::default()),
        );
        let mut recorder = Recorder::default();
        let above = Transform::from_position(Vec2::from_ints(0, 3));
        let resting = Transform::from_position(Vec2::from_f32(0.0, 0.45));

        assert!(!contact.update(&ground, &Transform::IDENTITY, &circle, &above, false, &mut recorder));
        assert_eq!(recorder.begins, 0);

        assert!(contact.update(&ground, &Transform::IDENTITY, &circle, &resting, false, &mut recorder));
        assert!(!contact.update(&ground, &Transform::IDENTITY, &circle, &resting, false, &mut recorder));
        assert_eq!(recorder.begins, 1);
        assert_eq!(recorder.pre_solves, 2);

        assert!(contact.update(&ground, &Transform::IDENTITY, &circle, &above, false, &mut recorder));
        assert_eq!(recorder.ends, 1);
    }

    #[test]
    fn update_keeps_impulses_for_matching_ids() {
        let block = Shape::boxed(Fp::HALF, Fp::HALF);
        let mut contact = Contact::new(
            ContactKind::PolygonPolygon,
            handle(0),
            handle(1),
            MixedMaterial::new(&Material::default(), &Material::default()),
        );
        let xf_b = Transform::from_position(Vec2::from_f32(0.0, 0.99));
        let mut listener = NullListener;
        contact.update(&block, &Transform::IDENTITY, &block, &xf_b, false, &mut listener);
        assert_eq!(contact.manifold.point_count, 2);
        for mp in contact.manifold.points_mut() {
            mp.normal_impulse = Fp::ONE;
        }

        contact.update(&block, &Transform::IDENTITY, &block, &xf_b, false, &mut listener);
        assert!(contact
            .manifold
            .points()
            .iter()
            .all(|mp| mp.normal_impulse == Fp::ONE));
    }

    #[test]
    fn sensors_report_overlap_without_points() {
        let circle = Shape::circle(Fp::ONE).expect("circle");
        let mut contact = Contact::new(
            ContactKind::CircleCircle,
            handle(0),
            handle(1),
            MixedMaterial::new(&Material::default(), &Material::default()),
        );
        let xf_b = Transform::from_position(Vec2::from_f32(1.5, 0.0));
        let mut recorder = Recorder::default();
        contact.update(&circle, &Transform::IDENTITY, &circle, &xf_b, true, &mut recorder);
        assert!(contact.is_touching());
        assert!(contact.manifold.is_empty());
        assert_eq!(recorder.begins, 1);
        assert_eq!(recorder.pre_solves, 0);
    }
}
