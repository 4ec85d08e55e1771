//! Level and stereo-position primitives.

/*
Level Curves and Panning
========================

Vocabulary
----------

  level code    A 7-bit value (0-127) stored in ROM or set by the player.
                It is not a gain; it has to go through the volume curve.

  gain          A multiplier applied to amplitude. 1.0 = unchanged.

  panpot        A 7-bit stereo position code, 64 = center.

  position      The panpot mapped to -1.0 (hard left) .. +1.0 (hard right).


The Volume Curve
----------------

The hardware turns level codes into gain through an undocumented table. This
exponential fit stands in for it and must be used as written:

    gain(v) = 0.1 · 2^(v / 36.7111) - 0.1

    v = 0    →  0.0     (silence)
    v = 64   →  ~0.24
    v = 127  →  ~1.0    (unity)

Roughly every 36.7 steps doubles (gain + 0.1), so the curve is close to
linear in decibels across most of its range.


Pan Law
-------

The signal starts out identical on both channels. Panning only ever
attenuates the channel on the far side; the near side is left untouched:

    position < 0   right *= 1 + position
    position > 0   left  *= 1 - position
    position = 0   both channels unchanged

    position   left   right
      -1.0     1.0    0.0
      -0.5     1.0    0.5
       0.0     1.0    1.0
      +0.5     0.5    1.0
      +1.0     0.0    1.0

This is not constant-power; a centered partial is as loud on each side as a
hard-panned one is on its near side.
*/

/// Convert a 7-bit level code into a linear gain.
#[inline]
pub fn volume_curve(level: u8) -> f64 {
    0.1 * 2.0_f64.powf(f64::from(level) / 36.7111) - 0.1
}

/// Map a 7-bit panpot code to a position in -1.0..=1.0.
#[inline]
pub fn panpot_position(panpot: u8) -> f64 {
    (f64::from(panpot) - 64.0) / 64.0
}

/// Left and right gains for a stereo position.
#[inline]
pub fn pan_gains(position: f64) -> (f64, f64) {
    if position < 0.0 {
        (1.0, 1.0 + position)
    } else if position > 0.0 {
        (1.0 - position, 1.0)
    } else {
        (1.0, 1.0)
    }
}
