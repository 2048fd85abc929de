use std::cell::RefCell;
use std::rc::Rc;

use crate::math::Vec2;
use crate::task::{Task, TaskFault};

/// Per-entity motion state mutated by temporal patterns. A pattern holds the
/// single target it owns for its lifetime; the surrounding simulation calls
/// `integrate` once per tick to turn the state into movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Vec2,
    pub velocity: Vec2,
    pub speed: f32,
    pub angle_radians: f32,
}

impl Motion {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            speed: 0.0,
            angle_radians: 0.0,
        }
    }

    pub fn aimed(position: Vec2, speed: f32, angle_radians: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            speed,
            angle_radians,
        }
    }

    /// One tick of movement: polar speed/angle plus the cartesian velocity.
    pub fn integrate(&mut self) {
        self.position += Vec2::from_angle(self.angle_radians, self.speed);
        self.position += self.velocity;
    }
}

pub type MotionRef = Rc<RefCell<Motion>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EasingCurve {
    Linear,
    EaseIn,
    EaseOut,
    SmoothStep,
}

impl EasingCurve {
    /// Maps normalized progress to eased progress. Every curve maps 0 to 0
    /// and 1 to exactly 1.
    fn apply(self, t: f32) -> f32 {
        match self {
            EasingCurve::Linear => t,
            EasingCurve::EaseIn => t * t,
            EasingCurve::EaseOut => {
                let inverse = 1.0 - t;
                1.0 - inverse * inverse
            }
            EasingCurve::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Remaining-duration bookkeeping shared by the delta patterns: `None` is
/// unbounded, `Some(0)` is dead and stays dead.
#[derive(Debug, Clone, Copy)]
struct RemainingFrames {
    remaining: Option<u32>,
}

impl RemainingFrames {
    fn unbounded() -> Self {
        Self { remaining: None }
    }

    fn frames(frames: u32) -> Self {
        Self {
            remaining: Some(frames),
        }
    }

    fn is_alive(self) -> bool {
        self.remaining != Some(0)
    }

    fn consume_tick(&mut self) {
        if let Some(remaining) = &mut self.remaining {
            *remaining = remaining.saturating_sub(1);
        }
    }

    fn exhaust(&mut self) -> bool {
        let was_alive = self.is_alive();
        self.remaining = Some(0);
        was_alive
    }
}

/// Adds a fixed speed delta to the target once per tick.
pub struct Accelerate {
    target: MotionRef,
    delta_speed: f32,
    duration: RemainingFrames,
}

impl Accelerate {
    pub fn new(target: MotionRef, delta_speed: f32) -> Self {
        Self {
            target,
            delta_speed,
            duration: RemainingFrames::unbounded(),
        }
    }

    pub fn for_frames(target: MotionRef, delta_speed: f32, frames: u32) -> Self {
        Self {
            target,
            delta_speed,
            duration: RemainingFrames::frames(frames),
        }
    }
}

impl<W> Task<W> for Accelerate {
    fn advance(&mut self, _world: &mut W) -> Result<(), TaskFault> {
        if !self.duration.is_alive() {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        self.target.borrow_mut().speed += self.delta_speed;
        self.duration.consume_tick();
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.duration.is_alive()
    }

    fn cancel(&mut self) -> bool {
        self.duration.exhaust()
    }
}

/// Rotates the target's heading by a fixed angle once per tick.
pub struct AngularVelocity {
    target: MotionRef,
    delta_angle_radians: f32,
    duration: RemainingFrames,
}

impl AngularVelocity {
    pub fn new(target: MotionRef, delta_angle_radians: f32) -> Self {
        Self {
            target,
            delta_angle_radians,
            duration: RemainingFrames::unbounded(),
        }
    }

    pub fn for_frames(target: MotionRef, delta_angle_radians: f32, frames: u32) -> Self {
        Self {
            target,
            delta_angle_radians,
            duration: RemainingFrames::frames(frames),
        }
    }
}

impl<W> Task<W> for AngularVelocity {
    fn advance(&mut self, _world: &mut W) -> Result<(), TaskFault> {
        if !self.duration.is_alive() {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        self.target.borrow_mut().angle_radians += self.delta_angle_radians;
        self.duration.consume_tick();
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.duration.is_alive()
    }

    fn cancel(&mut self) -> bool {
        self.duration.exhaust()
    }
}

/// Adds a fixed cartesian velocity delta to the target once per tick.
pub struct CartesianAccel {
    target: MotionRef,
    delta_velocity: Vec2,
    duration: RemainingFrames,
}

impl CartesianAccel {
    pub fn new(target: MotionRef, delta_velocity: Vec2) -> Self {
        Self {
            target,
            delta_velocity,
            duration: RemainingFrames::unbounded(),
        }
    }

    pub fn for_frames(target: MotionRef, delta_velocity: Vec2, frames: u32) -> Self {
        Self {
            target,
            delta_velocity,
            duration: RemainingFrames::frames(frames),
        }
    }
}

impl<W> Task<W> for CartesianAccel {
    fn advance(&mut self, _world: &mut W) -> Result<(), TaskFault> {
        if !self.duration.is_alive() {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        self.target.borrow_mut().velocity += self.delta_velocity;
        self.duration.consume_tick();
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.duration.is_alive()
    }

    fn cancel(&mut self) -> bool {
        self.duration.exhaust()
    }
}

/// Moves the target to an absolute destination over a fixed number of
/// frames. Each tick recomputes the position from elapsed/duration instead
/// of accumulating deltas, so tick D lands exactly on the destination
/// regardless of curve or duration.
pub struct MoveTo {
    target: MotionRef,
    destination: Vec2,
    start: Option<Vec2>,
    duration_frames: u32,
    elapsed: u32,
    curve: EasingCurve,
}

impl MoveTo {
    pub fn new(
        target: MotionRef,
        destination: Vec2,
        duration_frames: u32,
        curve: EasingCurve,
    ) -> Self {
        Self {
            target,
            destination,
            start: None,
            duration_frames,
            elapsed: 0,
            curve,
        }
    }
}

impl<W> Task<W> for MoveTo {
    fn advance(&mut self, _world: &mut W) -> Result<(), TaskFault> {
        if self.elapsed >= self.duration_frames {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        let start = match self.start {
            Some(start) => start,
            None => {
                let start = self.target.borrow().position;
                self.start = Some(start);
                start
            }
        };
        self.elapsed = self.elapsed.saturating_add(1);
        let position = if self.elapsed >= self.duration_frames {
            // Exact arrival, independent of float rounding in the blend.
            self.destination
        } else {
            let progress = self.elapsed as f32 / self.duration_frames as f32;
            start + (self.destination - start) * self.curve.apply(progress)
        };
        self.target.borrow_mut().position = position;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.duration_frames > self.elapsed
    }

    fn cancel(&mut self) -> bool {
        let was_alive = self.duration_frames > self.elapsed;
        self.elapsed = self.duration_frames;
        was_alive
    }
}
