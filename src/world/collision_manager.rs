use std::collections::BTreeMap;

use log::trace;

use crate::{
    collision::contact::{ContactHandle, ContactListener, ContactPool, FixtureHandle},
    config::AABB_EXTENSION,
    core::{aabb::Aabb, collider::Fixture, rigidbody::RigidBody},
    utils::allocator::{Arena, EntityId},
};

/// Ordered key for one pair of fixture children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PairKey {
    first: (EntityId, usize),
    second: (EntityId, usize),
}

impl PairKey {
    fn new(a: (EntityId, usize), b: (EntityId, usize)) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    fn of(a: &FixtureHandle, b: &FixtureHandle) -> Self {
        Self::new((a.fixture, a.child_index), (b.fixture, b.child_index))
    }
}

struct Proxy {
    handle: FixtureHandle,
    aabb: Aabb,
}

/// Owns the contact pool and pairs fixture children by brute-force AABB
/// overlap.
#[derive(Debug, Default)]
pub struct CollisionManager {
    pub contacts: ContactPool,
    pairs: BTreeMap<PairKey, ContactHandle>,
}

impl CollisionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds of a fixture child over the body's current sweep, fattened so
    /// contacts appear slightly before the shapes touch.
    pub fn proxy_aabb(body: &RigidBody, fixture: &Fixture, child_index: usize) -> Aabb {
        let start = fixture.compute_aabb(&body.start_transform(), child_index);
        let end = fixture.compute_aabb(body.transform(), child_index);
        start.combine(&end).fattened(AABB_EXTENSION)
    }

    /// Creates contacts for overlapping child pairs that do not have one yet.
    /// Returns the number of contacts created.
    pub fn find_new_contacts(
        &mut self,
        bodies: &Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
    ) -> usize {
        let mut proxies = Vec::new();
        for (fixture_id, fixture) in fixtures.iter() {
            let Some(body) = bodies.get(fixture.body) else {
                continue;
            };
            for child_index in 0..fixture.shape.child_count() {
                proxies.push(Proxy {
                    handle: FixtureHandle {
                        fixture: fixture_id,
                        body: fixture.body,
                        child_index,
                    },
                    aabb: Self::proxy_aabb(body, fixture, child_index),
                });
            }
        }

        let mut created = 0;
        for (i, proxy_a) in proxies.iter().enumerate() {
            for proxy_b in &proxies[i + 1..] {
                let (a, b) = (&proxy_a.handle, &proxy_b.handle);
                if a.body == b.body || !proxy_a.aabb.overlaps(&proxy_b.aabb) {
                    continue;
                }

                let key = PairKey::of(a, b);
                if self.pairs.contains_key(&key) {
                    continue;
                }

                let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(a.fixture), fixtures.get(b.fixture))
                else {
                    continue;
                };
                if !fixture_a.filter.should_collide(&fixture_b.filter) {
                    continue;
                }
                let (Some(body_a), Some(body_b)) = (bodies.get(a.body), bodies.get(b.body)) else {
                    continue;
                };
                if !body_a.should_collide(body_b) {
                    continue;
                }

                let Some(handle) = self.contacts.create(
                    fixture_a.shape.shape_type(),
                    *a,
                    &fixture_a.material,
                    fixture_b.shape.shape_type(),
                    *b,
                    &fixture_b.material,
                ) else {
                    continue;
                };
                trace!("pair {:?}/{} + {:?}/{}", a.fixture, a.child_index, b.fixture, b.child_index);
                self.pairs.insert(key, handle);
                created += 1;
            }
        }
        created
    }

    /// Refreshes every contact: pairs whose bounds separated are destroyed,
    /// the rest re-evaluate their manifolds. Returns the touching count.
    pub fn collide(
        &mut self,
        bodies: &Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        listener: &mut dyn ContactListener,
    ) -> usize {
        let mut touching = 0;
        for handle in self.contacts.handles() {
            let Some(contact) = self.contacts.get(handle) else {
                continue;
            };
            let (a, b) = (contact.a, contact.b);

            let resolved = fixtures
                .get(a.fixture)
                .zip(fixtures.get(b.fixture))
                .zip(bodies.get(a.body).zip(bodies.get(b.body)));
            let Some(((fixture_a, fixture_b), (body_a, body_b))) = resolved else {
                self.destroy(handle, listener);
                continue;
            };

            let overlap = Self::proxy_aabb(body_a, fixture_a, a.child_index)
                .overlaps(&Self::proxy_aabb(body_b, fixture_b, b.child_index));
            if !overlap {
                self.destroy(handle, listener);
                continue;
            }

            let sensor = fixture_a.is_sensor || fixture_b.is_sensor;
            if let Some(contact) = self.contacts.get_mut(handle) {
                contact.update(
                    &fixture_a.shape,
                    body_a.transform(),
                    &fixture_b.shape,
                    body_b.transform(),
                    sensor,
                    listener,
                );
                if contact.is_touching() {
                    touching += 1;
                }
            }
        }
        touching
    }

    /// Removes a contact, firing `end_contact` when it was touching.
    pub fn destroy(&mut self, handle: ContactHandle, listener: &mut dyn ContactListener) {
        let Some(contact) = self.contacts.destroy(handle) else {
            return;
        };
        self.pairs.remove(&PairKey::of(&contact.a, &contact.b));
        if contact.is_touching() {
            listener.end_contact(&contact);
        }
    }

    /// Removes every contact that involves `fixture`.
    pub fn destroy_fixture_contacts(
        &mut self,
        fixture: EntityId,
        listener: &mut dyn ContactListener,
    ) {
        let doomed: Vec<_> = self
            .contacts
            .iter()
            .filter(|(_, contact)| contact.a.fixture == fixture || contact.b.fixture == fixture)
            .map(|(handle, _)| handle)
            .collect();
        for handle in doomed {
            self.destroy(handle, listener);
        }
    }

    /// Contacts attached to `body`, in pool order.
    pub fn body_contacts(&self, body: EntityId) -> Vec<ContactHandle> {
        self.contacts
            .iter()
            .filter(|(_, contact)| contact.a.body == body || contact.b.body == body)
            .map(|(handle, _)| handle)
            .collect()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
        self.pairs.clear();
    }
}
