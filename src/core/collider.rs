use serde::{Deserialize, Serialize};

use crate::{
    core::{
        aabb::Aabb,
        fixed::Fp,
        shape::Shape,
        types::{MassData, Material, Transform},
    },
    utils::allocator::EntityId,
};

/// Layer/mask collision filtering. Two fixtures collide when each one's
/// mask contains the other's layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn should_collide(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.layer) != 0 && (other.mask & self.layer) != 0
    }
}

/// Shape attached to a body, with its material and filtering data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: EntityId,
    pub body: EntityId,
    pub shape: Shape,
    pub material: Material,
    /// Sensors report overlaps but generate no contact response.
    pub is_sensor: bool,
    pub filter: CollisionFilter,
}

impl Fixture {
    pub fn builder(shape: Shape) -> FixtureBuilder {
        FixtureBuilder::new(shape)
    }

    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        self.shape.compute_aabb(xf, child_index)
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.material.density)
    }
}

pub struct FixtureBuilder {
    shape: Shape,
    material: Material,
    is_sensor: bool,
    filter: CollisionFilter,
}

impl FixtureBuilder {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            material: Material::default(),
            is_sensor: false,
            filter: CollisionFilter::default(),
        }
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn density(mut self, density: Fp) -> Self {
        self.material.density = density;
        self
    }

    pub fn friction(mut self, friction: Fp) -> Self {
        self.material.friction = friction;
        self
    }

    pub fn restitution(mut self, restitution: Fp) -> Self {
        self.material.restitution = restitution;
        self
    }

    pub fn restitution_threshold(mut self, threshold: Fp) -> Self {
        self.material.restitution_threshold = threshold;
        self
    }

    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn filter(mut self, layer: u32, mask: u32) -> Self {
        self.filter = CollisionFilter { layer, mask };
        self
    }

    pub fn build(self) -> Fixture {
        Fixture {
            id: EntityId::NULL,
            body: EntityId::NULL,
            shape: self.shape,
            material: self.material,
            is_sensor: self.is_sensor,
            filter: self.filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_requires_both_masks() {
        let player = CollisionFilter {
            layer: 0b01,
            mask: 0b10,
        };
        let wall = CollisionFilter {
            layer: 0b10,
            mask: 0b01,
        };
        let ghost = CollisionFilter {
            layer: 0b10,
            mask: 0,
        };
        assert!(player.should_collide(&wall));
        assert!(!player.should_collide(&ghost));
        assert!(CollisionFilter::default().should_collide(&CollisionFilter::default()));
    }

    #[test]
    fn builder_sets_material() {
        let fixture = Fixture::builder(Shape::boxed(Fp::ONE, Fp::ONE))
            .density(Fp::TWO)
            .friction(Fp::HALF)
            .sensor(true)
            .build();
        assert_eq!(fixture.material.density, Fp::TWO);
        assert_eq!(fixture.material.friction, Fp::HALF);
        assert!(fixture.is_sensor);
        assert_eq!(fixture.mass_data().mass, Fp::from_int(8));
    }
}
