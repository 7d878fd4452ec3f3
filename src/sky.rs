//! Analytic daylight sky (Preetham model) evaluated per view direction.

use std::f64::consts::PI;

use crate::color::Color;
use crate::math::{dot, normalize, smoothstep};

const UP: [f64; 3] = [0.0, 1.0, 0.0];

const TOTAL_RAYLEIGH: [f64; 3] = [
    5.804542996261093e-6,
    1.3562911419845635e-5,
    3.0265902468824876e-5,
];
const MIE_CONST: [f64; 3] = [
    1.8399918514433978e14,
    2.7798023919660528e14,
    4.0790479543861094e14,
];

const CUTOFF_ANGLE: f64 = 1.6110731556870734;
const STEEPNESS: f64 = 1.5;
const SUN_INTENSITY: f64 = 1000.0;
const RAYLEIGH_ZENITH_LENGTH: f64 = 8.4e3;
const MIE_ZENITH_LENGTH: f64 = 1.25e3;
const SUN_ANGULAR_DIAMETER_COS: f64 = 0.999956676946448;

#[derive(Clone, Copy, Debug)]
pub struct Sky {
    pub turbidity: f64,
    pub rayleigh: f64,
    pub mie_coefficient: f64,
    pub mie_directional_g: f64,
    pub sun_position: [f64; 3],
}

/// Per-sun-position terms shared by every pixel
struct SunTerms {
    direction: [f64; 3],
    energy: f64,
    fade: f64,
    beta_r: [f64; 3],
    beta_m: [f64; 3],
}

impl Sky {
    fn sun_terms(&self) -> SunTerms {
        let direction = normalize(&self.sun_position);
        let zenith_angle_cos = dot(&direction, &UP).clamp(-1.0, 1.0);
        let energy = SUN_INTENSITY
            * (1.0 - (-((CUTOFF_ANGLE - zenith_angle_cos.acos()) / STEEPNESS)).exp()).max(0.0);
        let fade = 1.0 - (1.0 - (self.sun_position[1] / 450000.0).exp()).clamp(0.0, 1.0);

        let rayleigh_coefficient = self.rayleigh - (1.0 - fade);
        let total_mie = 0.434 * (0.2 * self.turbidity) * 10e-18;
        let beta_r = TOTAL_RAYLEIGH.map(|c| c * rayleigh_coefficient);
        let beta_m = MIE_CONST.map(|c| c * total_mie * self.mie_coefficient);

        SunTerms {
            direction,
            energy,
            fade,
            beta_r,
            beta_m,
        }
    }

    /// Sky radiance seen along `direction` (need not be normalized)
    #[cfg(test)]
    pub fn color(&self, direction: &[f64; 3]) -> Color {
        self.color_with(&self.sun_terms(), direction)
    }

    /// Fills `out` with one colour per direction, sharing the sun terms
    pub fn fill(&self, directions: impl Iterator<Item = [f64; 3]>, out: &mut Vec<Color>) {
        let terms = self.sun_terms();
        out.clear();
        out.extend(directions.map(|d| self.color_with(&terms, &d)));
    }

    fn color_with(&self, sun: &SunTerms, direction: &[f64; 3]) -> Color {
        let direction = normalize(direction);

        // Optical length through the atmosphere
        let zenith_angle = dot(&UP, &direction).max(0.0).acos();
        let inverse = 1.0
            / (zenith_angle.cos() + 0.15 * (93.885 - zenith_angle * 180.0 / PI).powf(-1.253));
        let s_r = RAYLEIGH_ZENITH_LENGTH * inverse;
        let s_m = MIE_ZENITH_LENGTH * inverse;

        let cos_theta = dot(&direction, &sun.direction);
        let r_phase = 3.0 / (16.0 * PI) * (1.0 + (cos_theta * 0.5 + 0.5).powi(2));
        let g = self.mie_directional_g;
        let m_phase = 1.0 / (4.0 * PI) * ((1.0 - g * g)
            / (1.0 - 2.0 * g * cos_theta + g * g).powf(1.5));

        let horizon_mix = (1.0 - dot(&UP, &sun.direction)).powi(5).clamp(0.0, 1.0);
        let sundisk = smoothstep(
            SUN_ANGULAR_DIAMETER_COS,
            SUN_ANGULAR_DIAMETER_COS + 0.00002,
            cos_theta,
        );
        let gamma = 1.0 / (1.2 + 1.2 * sun.fade);
        let tint = [0.0, 0.0003, 0.00075];

        let mut rgb = [0.0; 3];
        for i in 0..3 {
            let extinction = (-(sun.beta_r[i] * s_r + sun.beta_m[i] * s_m)).exp();
            let beta_theta = sun.beta_r[i] * r_phase + sun.beta_m[i] * m_phase;
            let ratio = beta_theta / (sun.beta_r[i] + sun.beta_m[i]);

            let mut lin = (sun.energy * ratio * (1.0 - extinction)).max(0.0).powf(1.5);
            lin *= 1.0 + ((sun.energy * ratio * extinction).max(0.0).sqrt() - 1.0) * horizon_mix;

            let l0 = 0.1 * extinction + sun.energy * 19000.0 * extinction * sundisk;
            let tex = (lin + l0) * 0.04 + tint[i];
            rgb[i] = tex.max(0.0).powf(gamma);
        }
        Color::rgb(rgb[0], rgb[1], rgb[2]).clamped()
    }
}
