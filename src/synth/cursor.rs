use tracing::trace;

use crate::{
    dsp::filter::SmoothingFilter,
    rom::{LoopMode, SampleInfo, ROM_SAMPLE_RATE},
    synth::PlaybackState,
};

/*
Wave Cursor
===========

Reads a recorded waveform at a continuously varying rate and handles what
happens at its end.

Vocabulary
----------

  position    Fractional read position in native ROM frames. Moves by the
              playback rate every output sample.

  last_pos    Integer index of the next raw frame to push through the
              smoothing filters. It chases `round(position)`; every frame it
              passes over is filtered exactly once per pass.

  end         Last frame the cursor may stand on: sample_len - 1. The very
              last frame is kept as look-ahead and never consumed going
              forward.

  loop start  sample_len - loop_len - 1. The loop is [loop start, end].


The Loop State Machine
----------------------

              position > end                      position < loop start
    ┌─────────┐ ─────────────────→ ┌──────────┐ ───────────────────────┐
    │ Forward │   (ForwardBackward) │ Backward │                       │
    └─────────┘ ←──────────────────────────────────────────────────────┘
      │   │
      │   └── Forward loop: jump to loop start + overshoot, stay Forward
      └────── Forward stop: playback is over

Overshoot is the distance the position travelled past the boundary during
this sample. It is carried into the new segment unchanged, so no fraction of
a frame is lost at a wrap or a reversal:

    forward loop     new = loop_start + overshoot
    bounce at end    new = end - overshoot
    bounce at start  new = loop_start + overshoot

An overshoot longer than the loop itself (absurd pitch) is reduced modulo the
loop length to keep the position inside the sample.


Output
------

The sample used for synthesis is the most recently filtered frame, not an
interpolation between two filtered frames at the fractional position. This
stair-step reconstruction is what the hardware emulation has always done and
is kept for compatibility.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub struct WaveCursor<'rom> {
    pcm: &'rom [f32],
    loop_mode: LoopMode,
    end: usize,
    loop_start: usize,
    loop_len: usize,

    position: f64,
    direction: Direction,
    last_pos: usize,

    stages: [SmoothingFilter; 2],
    current: f64,
}

impl<'rom> WaveCursor<'rom> {
    pub fn new(pcm: &'rom [f32], info: &SampleInfo) -> Self {
        let end = (info.sample_len as usize).saturating_sub(1);
        let loop_len = (info.loop_len as usize).min(end);

        Self {
            pcm,
            loop_mode: info.loop_mode,
            end,
            loop_start: end - loop_len,
            loop_len,

            position: 0.0,
            direction: Direction::Forward,
            last_pos: 0,

            stages: [
                SmoothingFilter::for_native_rate(ROM_SAMPLE_RATE),
                SmoothingFilter::for_native_rate(ROM_SAMPLE_RATE),
            ],
            current: 0.0,
        }
    }

    /// Move the cursor by `rate` native frames.
    ///
    /// Returns `Finished` when a forward-stop sample runs off its end.
    pub fn advance(&mut self, rate: f64) -> PlaybackState {
        match self.direction {
            Direction::Forward => self.advance_forward(rate),
            Direction::Backward => {
                self.advance_backward(rate);
                PlaybackState::Playing
            }
        }
    }

    fn advance_forward(&mut self, rate: f64) -> PlaybackState {
        self.position += rate;

        while self.position.round() > self.last_pos as f64 && self.last_pos < self.end {
            self.consume_forward();
        }

        let boundary = self.end as f64;
        if self.position <= boundary {
            return PlaybackState::Playing;
        }

        let overshoot = self.wrap(self.position - boundary);

        match self.loop_mode {
            LoopMode::Forward => {
                self.position = self.loop_start as f64 + overshoot;
                self.last_pos = self.loop_start;

                while self.position.round() > self.last_pos as f64 && self.last_pos < self.end {
                    self.consume_forward();
                }
                trace!(position = self.position, "wave cursor looped");
            }
            LoopMode::ForwardBackward => {
                self.position = boundary - overshoot;
                self.direction = Direction::Backward;

                while self.position.round() < self.last_pos as f64
                    && self.last_pos > self.loop_start
                {
                    self.consume_backward();
                }
                trace!(position = self.position, "wave cursor reversed at end");
            }
            LoopMode::ForwardStop => {
                trace!(position = self.position, "wave cursor reached end");
                return PlaybackState::Finished;
            }
        }

        PlaybackState::Playing
    }

    fn advance_backward(&mut self, rate: f64) {
        self.position -= rate;

        while self.position.round() < self.last_pos as f64 && self.last_pos > self.loop_start + 1 {
            self.consume_backward();
        }

        let boundary = self.loop_start as f64;
        if self.position >= boundary {
            return;
        }

        // Flush what is left of the backward pass
        while self.last_pos > self.loop_start {
            self.consume_backward();
        }

        let overshoot = self.wrap(boundary - self.position);
        self.position = boundary + overshoot;
        self.direction = Direction::Forward;

        self.last_pos = (self.loop_start + 1).min(self.end);
        while self.position.round() > self.last_pos as f64 && self.last_pos < self.end {
            self.consume_forward();
        }
        trace!(position = self.position, "wave cursor reversed at loop start");
    }

    #[inline]
    fn wrap(&self, overshoot: f64) -> f64 {
        if self.loop_len == 0 {
            0.0
        } else {
            overshoot % self.loop_len as f64
        }
    }

    #[inline]
    fn consume_forward(&mut self) {
        self.consume(self.last_pos);
        self.last_pos += 1;
    }

    #[inline]
    fn consume_backward(&mut self) {
        self.consume(self.last_pos);
        self.last_pos -= 1;
    }

    #[inline]
    fn consume(&mut self, index: usize) {
        let raw = self.pcm.get(index).copied().map_or(0.0, f64::from);
        let [first, second] = &mut self.stages;
        self.current = second.apply(first.apply(raw));
    }

    /// Most recently filtered frame.
    pub fn sample(&self) -> f64 {
        self.current
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Index of the next frame to be filtered.
    pub fn last_pos(&self) -> usize {
        self.last_pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn loop_start(&self) -> usize {
        self.loop_start
    }
}
