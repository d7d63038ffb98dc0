//! Linear volume ramps. The arithmetic lives in [`FadeRamp`], a plain
//! iterator over volume levels; the browser layer drives it from a timer
//! it owns and cancels (see `FadeTask`), never from a timer clearing
//! itself from inside its own callback.

/// Precomputed linear ramp from one volume to another.
///
/// The tick count is fixed up front and the final tick emits the target
/// exactly, so float accumulation can neither overshoot nor leave a ramp
/// running one tick too long.
#[derive(Debug, Clone)]
pub struct FadeRamp {
    current: f64,
    target: f64,
    step: f64,
    remaining: u32,
}

impl FadeRamp {
    /// Ramp from `from` to `target` over `duration_ms`, emitting one level
    /// per `step_ms` tick. A zero duration (or step) jumps straight to the
    /// target on the first tick.
    pub fn new(from: f64, target: f64, duration_ms: u32, step_ms: u32) -> Self {
        let from = from.clamp(0.0, 1.0);
        let target = target.clamp(0.0, 1.0);
        let ticks = if step_ms == 0 || (target - from).abs() < f64::EPSILON {
            1
        } else {
            (duration_ms / step_ms).max(1)
        };
        Self {
            current: from,
            target,
            step: (target - from) / f64::from(ticks),
            remaining: ticks,
        }
    }
}

impl Iterator for FadeRamp {
    type Item = f64;

    /// The next volume level, or `None` once the target has been emitted.
    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.current = self.target;
        } else {
            self.current += self.step;
            // Clamp mid-ramp drift toward the target side.
            if self.step >= 0.0 {
                self.current = self.current.min(self.target);
            } else {
                self.current = self.current.max(self.target);
            }
        }
        Some(self.current)
    }
}

#[cfg(target_arch = "wasm32")]
pub use task::FadeTask;

#[cfg(target_arch = "wasm32")]
mod task {
    use super::FadeRamp;
    use gloo_timers::callback::Interval;
    use std::cell::RefCell;
    use std::rc::Rc;
    use web_sys::HtmlAudioElement;

    /// A cancellable fade driving an audio element's volume.
    ///
    /// Starting a new fade supersedes (and cancels) the previous one, and
    /// the interval is released as soon as the ramp finishes. The timer
    /// handle is shared with the tick closure so completion can drop it
    /// deterministically.
    pub struct FadeTask {
        slot: Rc<RefCell<Option<Interval>>>,
    }

    impl FadeTask {
        pub fn new() -> Self {
            Self {
                slot: Rc::new(RefCell::new(None)),
            }
        }

        pub fn start(&mut self, audio: HtmlAudioElement, mut ramp: FadeRamp, step_ms: u32) {
            self.cancel();
            let slot = Rc::clone(&self.slot);
            let interval = Interval::new(step_ms.max(1), move || match ramp.next() {
                Some(level) => audio.set_volume(level),
                None => {
                    // Dropping the handle clears the underlying interval.
                    slot.borrow_mut().take();
                }
            });
            *self.slot.borrow_mut() = Some(interval);
        }

        pub fn cancel(&mut self) {
            self.slot.borrow_mut().take();
        }
    }

    impl Default for FadeTask {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for FadeTask {
        fn drop(&mut self) {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_reaches_target_exactly() {
        let levels: Vec<f64> = FadeRamp::new(0.0, 0.55, 1200, 30).collect();
        assert_eq!(levels.len(), 40);
        assert_eq!(*levels.last().unwrap(), 0.55);
        assert!(levels.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn ramp_never_overshoots() {
        let levels: Vec<f64> = FadeRamp::new(0.0, 0.5, 1000, 300).collect();
        assert!(levels.iter().all(|&v| v <= 0.5));
        assert_eq!(*levels.last().unwrap(), 0.5);
    }

    #[test]
    fn zero_duration_jumps_to_target() {
        let levels: Vec<f64> = FadeRamp::new(0.0, 0.55, 0, 30).collect();
        assert_eq!(levels, vec![0.55]);
    }

    #[test]
    fn zero_step_interval_jumps_to_target() {
        let levels: Vec<f64> = FadeRamp::new(0.2, 0.8, 1200, 0).collect();
        assert_eq!(levels, vec![0.8]);
    }

    #[test]
    fn downward_ramp_terminates() {
        let levels: Vec<f64> = FadeRamp::new(0.55, 0.0, 600, 30).collect();
        assert_eq!(*levels.last().unwrap(), 0.0);
        assert!(levels.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn flat_ramp_emits_once() {
        let levels: Vec<f64> = FadeRamp::new(0.55, 0.55, 1200, 30).collect();
        assert_eq!(levels, vec![0.55]);
    }

    #[test]
    fn inputs_are_clamped_to_volume_range() {
        let levels: Vec<f64> = FadeRamp::new(-0.5, 1.5, 300, 30).collect();
        assert!(levels.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(*levels.last().unwrap(), 1.0);
    }
}
