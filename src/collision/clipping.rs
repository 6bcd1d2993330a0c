use crate::{
    collision::manifold::{ContactFeature, ContactId, FeatureType},
    core::fixed::Fp,
    utils::math::Vec2,
};

/// Segment endpoint carried through clipping together with its feature id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Clips a segment against the half-plane `dot(normal, x) <= offset`
/// (Sutherland-Hodgman for a single edge). Points created on the clip line
/// take `vertex_index_a` as their A feature. Returns the output points and
/// how many of them are valid.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: Fp,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    // Signed distances of the end points to the line.
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    if distance0 <= Fp::ZERO {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= Fp::ZERO {
        v_out[count] = v_in[1];
        count += 1;
    }

    // Sign test instead of a product, which can underflow to zero.
    let straddles = (distance0 < Fp::ZERO && distance1 > Fp::ZERO)
        || (distance0 > Fp::ZERO && distance1 < Fp::ZERO);
    if straddles && count < 2 {
        let interp = distance0 / (distance0 - distance1);
        let feature = ContactFeature::new(
            vertex_index_a as u8,
            FeatureType::Vertex,
            v_in[0].id.feature().index_b,
            FeatureType::Face,
        );
        v_out[count] = ClipVertex {
            v: v_in[0].v + (v_in[1].v - v_in[0].v) * interp,
            id: feature.into(),
        };
        count += 1;
    }

    (v_out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(a: Vec2, b: Vec2) -> [ClipVertex; 2] {
        let id = |i| ContactFeature::new(0, FeatureType::Face, i, FeatureType::Vertex).into();
        [ClipVertex { v: a, id: id(4) }, ClipVertex { v: b, id: id(5) }]
    }

    #[test]
    fn keeps_segment_fully_inside() {
        let input = segment(Vec2::from_ints(-1, 0), Vec2::from_ints(1, 0));
        let (out, count) = clip_segment_to_line(&input, Vec2::X, Fp::TWO, 1);
        assert_eq!(count, 2);
        assert_eq!(out, input);
    }

    #[test]
    fn drops_segment_fully_outside() {
        let input = segment(Vec2::from_ints(3, 0), Vec2::from_ints(4, 1));
        let (_, count) = clip_segment_to_line(&input, Vec2::X, Fp::TWO, 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn crossing_segment_gets_new_vertex_feature() {
        let input = segment(Vec2::from_ints(0, 0), Vec2::from_ints(4, 2));
        let (out, count) = clip_segment_to_line(&input, Vec2::X, Fp::TWO, 6);
        assert_eq!(count, 2);
        assert_eq!(out[0], input[0]);
        assert_eq!(out[1].v, Vec2::from_ints(2, 1));

        let feature = out[1].id.feature();
        assert_eq!(feature.index_a, 6);
        assert_eq!(feature.type_a, FeatureType::Vertex);
        assert_eq!(feature.index_b, 4);
        assert_eq!(feature.type_b, FeatureType::Face);
    }
}
