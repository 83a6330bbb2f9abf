//! Stepping through acquisitions on a timer.
//!
//! The driver is a pure state machine; the host owns the actual timer and
//! feeds ticks back together with the generation it was started with, so a
//! tick from a cancelled timer is ignored.

use crate::config::MAX_ANIMATION_SPEED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Stopped,
    Running { delay_ms: u32, generation: u64 },
}

/// What the host must schedule after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStart {
    pub delay_ms: u32,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct AnimationDriver {
    state: AnimationState,
    speed: u8,
    generation: u64,
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Tick delay: 1000 ms at speed 0 down to 100 ms at speed 9.
pub fn delay_for_speed(speed: u8) -> u32 {
    1000 - u32::from(speed.min(MAX_ANIMATION_SPEED)) * 100
}

impl AnimationDriver {
    pub fn new(speed: u8) -> Self {
        Self {
            state: AnimationState::Stopped,
            speed: speed.min(MAX_ANIMATION_SPEED),
            generation: 0,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, AnimationState::Running { .. })
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn start(&mut self) -> TimerStart {
        self.generation += 1;
        let delay_ms = delay_for_speed(self.speed);
        self.state = AnimationState::Running { delay_ms, generation: self.generation };
        TimerStart { delay_ms, generation: self.generation }
    }

    pub fn stop(&mut self) {
        self.generation += 1;
        self.state = AnimationState::Stopped;
    }

    /// Stores the new speed; a running animation is restarted with the new delay.
    pub fn set_speed(&mut self, speed: u8) -> Option<TimerStart> {
        self.speed = speed.min(MAX_ANIMATION_SPEED);
        if self.is_running() {
            self.stop();
            Some(self.start())
        } else {
            None
        }
    }

    /// Next acquisition index for a tick of timer `generation`, wrapping past
    /// the last index. `None` when the tick is stale or there is nothing to step.
    pub fn tick(&self, generation: u64, current_index: Option<usize>, len: usize) -> Option<usize> {
        match self.state {
            AnimationState::Running { generation: running, .. } if running == generation && len > 0 => {
                Some(current_index.map_or(0, |index| (index + 1) % len))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_follows_speed() {
        assert_eq!(delay_for_speed(0), 1000);
        assert_eq!(delay_for_speed(5), 500);
        assert_eq!(delay_for_speed(9), 100);
        assert_eq!(delay_for_speed(200), 100);
    }

    #[test]
    fn last_index_wraps_to_zero() {
        let mut driver = AnimationDriver::new(5);
        let timer = driver.start();
        assert_eq!(driver.tick(timer.generation, Some(3), 4), Some(0));
        assert_eq!(driver.tick(timer.generation, Some(1), 4), Some(2));
        assert_eq!(driver.tick(timer.generation, None, 4), Some(0));
    }

    #[test]
    fn stopping_prevents_further_ticks() {
        let mut driver = AnimationDriver::new(5);
        let timer = driver.start();
        driver.stop();
        assert!(!driver.is_running());
        assert_eq!(driver.tick(timer.generation, Some(1), 4), None);
    }

    #[test]
    fn speed_change_restarts_running_timer() {
        let mut driver = AnimationDriver::new(2);
        assert_eq!(driver.set_speed(4), None);

        let first = driver.start();
        assert_eq!(first.delay_ms, 600);
        let restarted = driver.set_speed(8).unwrap();

        assert_eq!(restarted.delay_ms, 200);
        assert_ne!(restarted.generation, first.generation);
        assert_eq!(driver.tick(first.generation, Some(0), 3), None);
        assert_eq!(driver.tick(restarted.generation, Some(0), 3), Some(1));
    }

    #[test]
    fn empty_axis_never_steps() {
        let mut driver = AnimationDriver::default();
        let timer = driver.start();
        assert_eq!(driver.tick(timer.generation, None, 0), None);
    }
}
