//! Deterministic value noise.
//!
//! Same idea as the twinkle hash: no RNG state, the same (seed, slot)
//! always produces the same value, so compilation stays reproducible.

/// Mix a seed and an integer slot into a unit value.
fn hash_slot(seed: u64, slot: u64) -> f64 {
    let mut x = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(slot.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    x ^= x >> 30;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    (x & 0xFFFF_FFFF) as f64 / f64::from(u32::MAX)
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Smooth value noise over normalized time: `cycles` control points are
/// hashed from the seed and interpolated with smoothstep. Output in
/// [0, 1].
pub fn value_noise(t: f64, cycles: f64, seed: u64) -> f64 {
    let x = t.clamp(0.0, 1.0) * cycles.max(1.0);
    let slot = x.floor() as u64;
    let a = hash_slot(seed, slot);
    let b = hash_slot(seed, slot + 1);
    let frac = smoothstep(x - x.floor());
    a + (b - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        for t in [0.0, 0.3, 0.77, 1.0] {
            assert!((value_noise(t, 8.0, 42) - value_noise(t, 8.0, 42)).abs() < 1e-12);
        }
    }

    #[test]
    fn seeds_decorrelate() {
        let a = value_noise(0.4, 8.0, 1);
        let b = value_noise(0.4, 8.0, 2);
        assert!((a - b).abs() > 1e-6);
    }

    #[test]
    fn stays_in_unit_range() {
        for i in 0..=100 {
            let v = value_noise(f64::from(i) / 100.0, 16.0, 7);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn continuous_at_slot_edges() {
        // Just below and above a control point should nearly agree.
        let eps = 1e-6;
        let cycles = 8.0;
        let edge = 3.0 / cycles;
        let below = value_noise(edge - eps, cycles, 5);
        let above = value_noise(edge + eps, cycles, 5);
        assert!((below - above).abs() < 1e-3);
    }
}
