//! Material mixing for contact pairs.

use serde::{Deserialize, Serialize};

use crate::core::{fixed::Fp, types::Material};

/// How two per-fixture coefficients are combined into one contact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixingMode {
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    pub fn mix(self, a: Fp, b: Fp) -> Fp {
        match self {
            MixingMode::Average => (a + b) * Fp::HALF,
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a * b).sqrt(),
        }
    }
}

/// Friction mixing law. The geometric mean lets a zero-friction surface
/// make any pair slide.
pub fn mix_friction(friction1: Fp, friction2: Fp) -> Fp {
    MixingMode::GeometricMean.mix(friction1, friction2)
}

/// Restitution mixing law. Anything bouncing on a bouncy surface bounces.
pub fn mix_restitution(restitution1: Fp, restitution2: Fp) -> Fp {
    MixingMode::Max.mix(restitution1, restitution2)
}

pub fn mix_restitution_threshold(threshold1: Fp, threshold2: Fp) -> Fp {
    MixingMode::Min.mix(threshold1, threshold2)
}

/// Mixed coefficients for one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixedMaterial {
    pub friction: Fp,
    pub restitution: Fp,
    pub restitution_threshold: Fp,
}

impl MixedMaterial {
    /// Combines two fixture materials. A mode override set on either
    /// material replaces the default law; when both set one, `a` wins.
    pub fn new(a: &Material, b: &Material) -> Self {
        let friction = match a.mixing.friction.or(b.mixing.friction) {
            Some(mode) => mode.mix(a.friction, b.friction),
            None => mix_friction(a.friction, b.friction),
        };
        let restitution = match a.mixing.restitution.or(b.mixing.restitution) {
            Some(mode) => mode.mix(a.restitution, b.restitution),
            None => mix_restitution(a.restitution, b.restitution),
        };
        Self {
            friction,
            restitution,
            restitution_threshold: mix_restitution_threshold(
                a.restitution_threshold,
                b.restitution_threshold,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MaterialMixing;

    #[test]
    fn default_laws() {
        assert_eq!(mix_friction(Fp::from_int(4), Fp::ONE), Fp::TWO);
        assert_eq!(mix_friction(Fp::ZERO, Fp::ONE), Fp::ZERO);
        assert_eq!(mix_restitution(Fp::HALF, Fp::ZERO), Fp::HALF);
        assert_eq!(mix_restitution_threshold(Fp::ONE, Fp::TWO), Fp::ONE);
    }

    #[test]
    fn override_replaces_default_law() {
        let ice = Material::default()
            .with_friction(Fp::ZERO)
            .with_restitution(Fp::ratio(1, 4));
        let rubber = Material::default()
            .with_friction(Fp::ONE)
            .with_restitution(Fp::ratio(3, 4));

        let plain = MixedMaterial::new(&ice, &rubber);
        assert_eq!(plain.friction, Fp::ZERO);
        assert_eq!(plain.restitution, Fp::ratio(3, 4));

        let averaged = Material {
            mixing: MaterialMixing::default()
                .with_friction(MixingMode::Average)
                .with_restitution(MixingMode::Min),
            ..ice
        };
        let mixed = MixedMaterial::new(&rubber, &averaged);
        assert_eq!(mixed.friction, Fp::HALF);
        assert_eq!(mixed.restitution, Fp::ratio(1, 4));
    }
}
