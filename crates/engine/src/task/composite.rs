use std::collections::VecDeque;

use super::{Task, TaskFault};

pub type TaskBuilder<W> = Box<dyn FnOnce(&mut W) -> Box<dyn Task<W>>>;

/// Runs members one after another: only the current member advances, and
/// the next one starts on the tick after the current one dies. An empty
/// sequence is born dead.
pub struct Sequence<W> {
    members: VecDeque<Box<dyn Task<W>>>,
    alive: bool,
}

impl<W> Sequence<W> {
    pub fn new(members: Vec<Box<dyn Task<W>>>) -> Self {
        let alive = !members.is_empty();
        Self {
            members: members.into(),
            alive,
        }
    }

    pub fn remaining(&self) -> usize {
        self.members.len()
    }

    fn discard_leading_dead(&mut self) {
        while self
            .members
            .front()
            .is_some_and(|member| !member.is_alive())
        {
            self.members.pop_front();
        }
    }
}

impl<W> Task<W> for Sequence<W> {
    fn advance(&mut self, world: &mut W) -> Result<(), TaskFault> {
        if !self.alive {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        // Members may be constructed already dead (a zero-duration pattern);
        // they are skipped without being advanced.
        self.discard_leading_dead();
        let Some(current) = self.members.front_mut() else {
            self.alive = false;
            return Ok(());
        };
        current.advance(world)?;
        if !current.is_alive() {
            self.members.pop_front();
            if self.members.is_empty() {
                self.alive = false;
            }
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn cancel(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        for member in &mut self.members {
            member.cancel();
        }
        self.members.clear();
        self.alive = false;
        true
    }
}

/// Advances every live member each tick, in list order, removing dead ones.
/// Dead exactly when no live member remains, including the moment of
/// construction with zero members.
pub struct Parallel<W> {
    members: Vec<Box<dyn Task<W>>>,
}

impl<W> Parallel<W> {
    pub fn new(members: Vec<Box<dyn Task<W>>>) -> Self {
        let mut parallel = Self { members };
        parallel.members.retain(|member| member.is_alive());
        parallel
    }

    pub fn push(&mut self, member: Box<dyn Task<W>>) {
        if member.is_alive() {
            self.members.push(member);
        }
    }

    pub fn live_count(&self) -> usize {
        self.members.len()
    }
}

impl<W> Task<W> for Parallel<W> {
    fn advance(&mut self, world: &mut W) -> Result<(), TaskFault> {
        if self.members.is_empty() {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        for member in &mut self.members {
            if member.is_alive() {
                member.advance(world)?;
            }
        }
        self.members.retain(|member| member.is_alive());
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.members.is_empty()
    }

    fn cancel(&mut self) -> bool {
        if self.members.is_empty() {
            return false;
        }
        for member in &mut self.members {
            member.cancel();
        }
        self.members.clear();
        true
    }
}

/// A sequence whose members are built only at the moment they become
/// current, so a builder may legally depend on side effects produced by the
/// member before it.
pub struct BuilderSequence<W> {
    builders: VecDeque<TaskBuilder<W>>,
    current: Option<Box<dyn Task<W>>>,
    alive: bool,
}

impl<W> BuilderSequence<W> {
    pub fn new(builders: Vec<TaskBuilder<W>>) -> Self {
        let alive = !builders.is_empty();
        Self {
            builders: builders.into(),
            current: None,
            alive,
        }
    }
}

impl<W> Task<W> for BuilderSequence<W> {
    fn advance(&mut self, world: &mut W) -> Result<(), TaskFault> {
        if !self.alive {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        loop {
            if self.current.is_none() {
                match self.builders.pop_front() {
                    Some(builder) => self.current = Some(builder(world)),
                    None => {
                        self.alive = false;
                        return Ok(());
                    }
                }
            }
            let Some(current) = self.current.as_mut() else {
                unreachable!("current populated above");
            };
            if !current.is_alive() {
                // Built dead (zero-duration member): move on to the next
                // builder within the same tick without advancing it.
                self.current = None;
                continue;
            }
            current.advance(world)?;
            if !current.is_alive() {
                self.current = None;
                if self.builders.is_empty() {
                    self.alive = false;
                }
            }
            return Ok(());
        }
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn cancel(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        if let Some(current) = self.current.as_mut() {
            current.cancel();
        }
        self.current = None;
        self.builders.clear();
        self.alive = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct World {
        log: Vec<String>,
    }

    struct CountDown {
        label: &'static str,
        remaining: u32,
    }

    impl CountDown {
        fn boxed(label: &'static str, frames: u32) -> Box<dyn Task<World>> {
            Box::new(Self {
                label,
                remaining: frames,
            })
        }
    }

    impl Task<World> for CountDown {
        fn advance(&mut self, world: &mut World) -> Result<(), TaskFault> {
            if self.remaining == 0 {
                return Err(TaskFault::AdvancedAfterDeath);
            }
            world.log.push(format!("{}:{}", self.label, self.remaining));
            self.remaining -= 1;
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.remaining > 0
        }

        fn cancel(&mut self) -> bool {
            let was_alive = self.remaining > 0;
            self.remaining = 0;
            was_alive
        }
    }

    fn world() -> World {
        World { log: Vec::new() }
    }

    #[test]
    fn empty_sequence_is_born_dead() {
        let sequence = Sequence::<World>::new(Vec::new());
        assert!(!sequence.is_alive());
    }

    #[test]
    fn sequence_advances_one_member_at_a_time() {
        let mut world = world();
        let mut sequence = Sequence::new(vec![CountDown::boxed("a", 2), CountDown::boxed("b", 1)]);

        sequence.advance(&mut world).expect("advance");
        sequence.advance(&mut world).expect("advance");
        assert!(sequence.is_alive(), "b has not started yet");
        sequence.advance(&mut world).expect("advance");
        assert!(!sequence.is_alive());
        assert_eq!(world.log, vec!["a:2", "a:1", "b:1"]);
    }

    #[test]
    fn sequence_skips_members_born_dead() {
        let mut world = world();
        let mut sequence = Sequence::new(vec![CountDown::boxed("dead", 0), CountDown::boxed("b", 1)]);

        sequence.advance(&mut world).expect("advance");
        assert!(!sequence.is_alive());
        assert_eq!(world.log, vec!["b:1"]);
    }

    #[test]
    fn empty_parallel_is_dead_immediately_not_next_tick() {
        let parallel = Parallel::<World>::new(Vec::new());
        assert!(!parallel.is_alive());
        assert_eq!(parallel.live_count(), 0);
    }

    #[test]
    fn parallel_liveness_tracks_live_child_count_exactly() {
        let mut world = world();
        let mut parallel = Parallel::new(vec![CountDown::boxed("a", 1), CountDown::boxed("b", 3)]);

        assert_eq!(parallel.live_count(), 2);
        parallel.advance(&mut world).expect("advance");
        assert_eq!(parallel.live_count(), 1);
        assert!(parallel.is_alive());

        parallel.advance(&mut world).expect("advance");
        parallel.advance(&mut world).expect("advance");
        assert_eq!(parallel.live_count(), 0);
        assert!(!parallel.is_alive());
        assert_eq!(world.log, vec!["a:1", "b:3", "b:2", "b:1"]);
    }

    #[test]
    fn parallel_advances_members_in_list_order() {
        let mut world = world();
        let mut parallel = Parallel::new(vec![
            CountDown::boxed("first", 1),
            CountDown::boxed("second", 1),
            CountDown::boxed("third", 1),
        ]);

        parallel.advance(&mut world).expect("advance");
        assert_eq!(world.log, vec!["first:1", "second:1", "third:1"]);
    }

    #[test]
    fn parallel_cancel_kills_all_members() {
        let mut parallel = Parallel::new(vec![CountDown::boxed("a", 5), CountDown::boxed("b", 5)]);
        assert!(parallel.cancel());
        assert!(!parallel.is_alive());
        assert!(!parallel.cancel());
    }

    #[test]
    fn builder_sequence_builds_lazily_and_sees_prior_side_effects() {
        let mut world = world();
        let mut sequence = BuilderSequence::new(vec![
            Box::new(|_: &mut World| CountDown::boxed("first", 1)) as TaskBuilder<World>,
            Box::new(|world: &mut World| {
                // Depends on the side effect the first member produced.
                let frames = world.log.len() as u32;
                CountDown::boxed("second", frames)
            }),
        ]);

        sequence.advance(&mut world).expect("advance");
        assert_eq!(world.log, vec!["first:1"]);
        sequence.advance(&mut world).expect("advance");
        assert!(!sequence.is_alive());
        assert_eq!(world.log, vec!["first:1", "second:1"]);
    }

    #[test]
    fn builder_sequence_empty_is_born_dead() {
        let sequence = BuilderSequence::<World>::new(Vec::new());
        assert!(!sequence.is_alive());
    }

    #[test]
    fn dead_composites_report_fault_when_advanced() {
        let mut world = world();
        let mut sequence = Sequence::new(vec![CountDown::boxed("a", 1)]);
        sequence.advance(&mut world).expect("advance");
        assert!(matches!(
            sequence.advance(&mut world),
            Err(TaskFault::AdvancedAfterDeath)
        ));
    }
}
