use crate::{
    config::MAX_POLYGON_VERTICES,
    core::{fixed::Fp, shape::Shape},
    utils::math::Vec2,
};

/// Convex point cloud plus skin radius. This is the only view of a shape that
/// GJK, shape cast and time of impact ever see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: Fp,
}

impl DistanceProxy {
    /// Proxy for `shape`, or for its `index`-th segment when it is a chain.
    ///
    /// # Panics
    /// Panics if `index` is not below the chain's `child_count()`.
    pub fn new(shape: &Shape, index: usize) -> Self {
        match shape {
            Shape::Circle(circle) => Self::from_vertices(&[circle.position], circle.radius),
            Shape::Polygon(poly) => Self::from_vertices(poly.vertices(), poly.radius),
            Shape::Edge(edge) => Self::from_vertices(&[edge.vertex1, edge.vertex2], edge.radius),
            Shape::Chain(chain) => {
                debug_assert!(
                    index < chain.child_count(),
                    "chain child {index} out of range"
                );
                let v1 = chain.vertices[index];
                let v2 = chain.vertices[index + 1];
                Self::from_vertices(&[v1, v2], chain.radius)
            }
        }
    }

    /// # Panics
    /// Panics if `points` is empty or holds more than the polygon vertex limit.
    pub fn from_vertices(points: &[Vec2], radius: Fp) -> Self {
        assert!(
            !points.is_empty() && points.len() <= MAX_POLYGON_VERTICES,
            "proxy needs 1..={MAX_POLYGON_VERTICES} vertices, got {}",
            points.len()
        );
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..points.len()].copy_from_slice(points);
        Self {
            vertices,
            count: points.len(),
            radius,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.count);
        self.vertices[index]
    }

    /// Index of the vertex furthest along `d`. Ties keep the lowest index.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices().iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    pub fn support_vertex(&self, d: Vec2) -> Vec2 {
        self.vertices[self.support(d)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::ChainShape;

    #[test]
    fn chain_proxy_uses_segment_endpoints() {
        let chain = ChainShape::new_chain(
            &[Vec2::from_ints(0, 0), Vec2::from_ints(1, 0), Vec2::from_ints(2, 1)],
            Vec2::from_ints(-1, 0),
            Vec2::from_ints(3, 1),
        )
        .expect("chain");
        let shape = Shape::Chain(chain);
        let proxy = DistanceProxy::new(&shape, 1);
        assert_eq!(proxy.vertices(), &[Vec2::from_ints(1, 0), Vec2::from_ints(2, 1)]);

        let first = DistanceProxy::new(&shape, 0);
        assert_eq!(first.vertices(), &[Vec2::from_ints(0, 0), Vec2::from_ints(1, 0)]);
    }

    #[test]
    fn loop_proxy_closes_through_repeated_vertex() {
        let square = [
            Vec2::from_ints(0, 0),
            Vec2::from_ints(1, 0),
            Vec2::from_ints(1, 1),
            Vec2::from_ints(0, 1),
        ];
        let shape = Shape::Chain(ChainShape::new_loop(&square).expect("loop"));
        assert_eq!(shape.child_count(), 4);
        let closing = DistanceProxy::new(&shape, 3);
        assert_eq!(closing.vertices(), &[Vec2::from_ints(0, 1), Vec2::from_ints(0, 0)]);
    }

    #[test]
    #[should_panic]
    fn chain_proxy_rejects_index_past_last_segment() {
        let chain = ChainShape::new_chain(
            &[Vec2::from_ints(0, 0), Vec2::from_ints(1, 0), Vec2::from_ints(2, 1)],
            Vec2::from_ints(-1, 0),
            Vec2::from_ints(3, 1),
        )
        .expect("chain");
        DistanceProxy::new(&Shape::Chain(chain), 2);
    }

    #[test]
    fn support_picks_extreme_vertex() {
        let shape = Shape::boxed(Fp::ONE, Fp::TWO);
        let proxy = DistanceProxy::new(&shape, 0);
        assert_eq!(proxy.count(), 4);
        assert_eq!(proxy.support_vertex(Vec2::from_ints(1, 1)), Vec2::from_ints(1, 2));
        assert_eq!(proxy.support_vertex(Vec2::from_ints(-1, -3)), Vec2::from_ints(-1, -2));
    }
}
