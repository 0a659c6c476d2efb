//! Periodic unit waveforms.
//!
//! Every function maps normalized time `t` to a value in [0, 1], with
//! `cycles` full periods over the unit interval and `phase` expressed in
//! cycles. Bipolar shapes are centered on 0.5 so the offset-centered
//! convention (0.5 = neutral, ±amplitude around it) holds everywhere.

use std::f64::consts::TAU;

/// Sine wave centered on 0.5.
pub fn sine(t: f64, cycles: f64, phase: f64) -> f64 {
    0.5 + 0.5 * (TAU * (t * cycles + phase)).sin()
}

/// Rectified sine: arches from 0 to 1 and back, `cycles` arches.
pub fn abs_sine(t: f64, cycles: f64, phase: f64) -> f64 {
    (std::f64::consts::PI * (t * cycles + phase)).sin().abs()
}

/// Triangle wave centered on 0.5, starting at the midpoint rising.
pub fn triangle(t: f64, cycles: f64, phase: f64) -> f64 {
    let x = (t * cycles + phase).rem_euclid(1.0);
    if x < 0.25 {
        0.5 + 2.0 * x
    } else if x < 0.75 {
        1.0 - 2.0 * (x - 0.25)
    } else {
        2.0 * (x - 0.75)
    }
}

/// Square gate: 1 for the first `duty` fraction of each cycle, else 0.
pub fn square(t: f64, cycles: f64, phase: f64, duty: f64) -> f64 {
    let duty = duty.clamp(0.0, 1.0);
    let x = (t * cycles + phase).rem_euclid(1.0);
    if x < duty {
        1.0
    } else {
        0.0
    }
}

/// Rising sawtooth, resetting each cycle.
pub fn sawtooth(t: f64, cycles: f64, phase: f64) -> f64 {
    (t * cycles + phase).rem_euclid(1.0)
}

/// Single parabolic arch over the unit interval: 0 at the ends, 1 at the
/// midpoint.
pub fn parabola(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    4.0 * t * (1.0 - t)
}

/// Rescale a unit value around the neutral midpoint: `amount` of 1.0
/// keeps the full swing, 0.0 collapses to 0.5.
pub fn scale_about_neutral(v: f64, amount: f64) -> f64 {
    0.5 + (v - 0.5) * amount
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sine_is_neutral_centered() {
        assert!(approx(sine(0.0, 1.0, 0.0), 0.5));
        assert!(approx(sine(0.25, 1.0, 0.0), 1.0));
        assert!(approx(sine(0.75, 1.0, 0.0), 0.0));
        assert!(approx(sine(1.0, 1.0, 0.0), 0.5));
    }

    #[test]
    fn sine_cycles_compress_period() {
        assert!(approx(sine(0.125, 2.0, 0.0), 1.0));
        assert!(approx(sine(0.5, 2.0, 0.0), 0.5));
    }

    #[test]
    fn phase_shifts_in_cycles() {
        // A quarter-cycle phase turns sine into cosine-like start at peak.
        assert!(approx(sine(0.0, 1.0, 0.25), 1.0));
    }

    #[test]
    fn abs_sine_arches() {
        assert!(approx(abs_sine(0.0, 1.0, 0.0), 0.0));
        assert!(approx(abs_sine(0.5, 1.0, 0.0), 1.0));
        assert!(approx(abs_sine(1.0, 1.0, 0.0), 0.0));
    }

    #[test]
    fn triangle_loops_cleanly() {
        assert!(approx(triangle(0.0, 1.0, 0.0), 0.5));
        assert!(approx(triangle(0.25, 1.0, 0.0), 1.0));
        assert!(approx(triangle(0.5, 1.0, 0.0), 0.5));
        assert!(approx(triangle(0.75, 1.0, 0.0), 0.0));
        assert!(approx(triangle(1.0, 1.0, 0.0), 0.5));
    }

    #[test]
    fn square_duty_cycle() {
        assert!(approx(square(0.1, 1.0, 0.0, 0.5), 1.0));
        assert!(approx(square(0.6, 1.0, 0.0, 0.5), 0.0));
        assert!(approx(square(0.1, 1.0, 0.0, 0.0), 0.0));
    }

    #[test]
    fn sawtooth_resets() {
        assert!(approx(sawtooth(0.0, 2.0, 0.0), 0.0));
        assert!(approx(sawtooth(0.25, 2.0, 0.0), 0.5));
        assert!(approx(sawtooth(0.75, 2.0, 0.0), 0.5));
    }

    #[test]
    fn parabola_arch() {
        assert!(approx(parabola(0.0), 0.0));
        assert!(approx(parabola(0.5), 1.0));
        assert!(approx(parabola(1.0), 0.0));
    }

    #[test]
    fn neutral_scaling() {
        assert!(approx(scale_about_neutral(1.0, 0.5), 0.75));
        assert!(approx(scale_about_neutral(0.0, 0.5), 0.25));
        assert!(approx(scale_about_neutral(0.7, 0.0), 0.5));
    }
}
