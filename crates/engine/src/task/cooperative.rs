use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use super::{Task, TaskFault, TaskId};

/// Where a script suspends until its next resume.
pub enum Wait<W> {
    /// Resume on the next advance.
    NextFrame,
    /// Resume on the nth subsequent advance. `Frames(0)` and `Frames(1)`
    /// both behave like `NextFrame`; a resume happens at most once per
    /// advance.
    Frames(u32),
    /// Re-checked at the top of every advance; resumes the same frame the
    /// predicate first turns true.
    Until(Box<dyn FnMut(&W) -> bool>),
    /// Resumes once the named child has finished or been cancelled.
    Child(TaskId),
    /// Resumes once every attached child has finished.
    Children,
}

pub enum Step<W> {
    Yield(Wait<W>),
    Done,
}

/// A suspendable procedure written as an explicit resumable state machine.
///
/// `resume` runs one slice of the procedure, from the previous suspension
/// point to the next one. There is no implicit suspension: the only pause
/// points are the `Wait` values the script itself yields.
pub trait Script<W, C> {
    fn resume(&mut self, cx: &mut ScriptCx<'_, W, C>) -> Result<Step<W>, TaskFault>;
}

/// Everything a script can see while resumed: the world, its task-local
/// frame counter, the context object its task carries, and the ability to
/// attach new children to its task.
pub struct ScriptCx<'a, W, C> {
    world: &'a mut W,
    frame: u64,
    ctx: &'a Rc<RefCell<C>>,
    next_child_id: &'a mut u64,
    pending: &'a mut Vec<(TaskId, Box<dyn Task<W>>)>,
}

impl<'a, W: 'static, C: 'static> ScriptCx<'a, W, C> {
    pub fn world(&mut self) -> &mut W {
        self.world
    }

    /// Frames this task has been advanced, counting the current one.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The context object this task carries (typically the entity the task
    /// is attached to).
    pub fn context(&self) -> Rc<RefCell<C>> {
        Rc::clone(self.ctx)
    }

    /// Spawns a nested cooperative task that inherits this task's context.
    pub fn spawn<S>(&mut self, script: S) -> TaskId
    where
        S: Script<W, C> + 'static,
    {
        let child = CoTask::with_shared(script, Rc::clone(self.ctx));
        self.attach(Box::new(child))
    }

    /// Spawns a nested cooperative task with an explicitly supplied context.
    pub fn spawn_with<S, C2>(&mut self, script: S, ctx: Rc<RefCell<C2>>) -> TaskId
    where
        S: Script<W, C2> + 'static,
        C2: 'static,
    {
        let child = CoTask::with_shared(script, ctx);
        self.attach(Box::new(child))
    }

    /// Attaches a pre-built task (pattern, composite, ...) as a child.
    pub fn attach(&mut self, task: Box<dyn Task<W>>) -> TaskId {
        let id = TaskId(*self.next_child_id);
        *self.next_child_id = self.next_child_id.saturating_add(1);
        self.pending.push((id, task));
        id
    }
}

enum WaitState<W> {
    Ready,
    Frames(u32),
    Until(Box<dyn FnMut(&W) -> bool>),
    Child(TaskId),
    Children,
}

impl<W> WaitState<W> {
    fn from_wait(wait: Wait<W>) -> Self {
        match wait {
            Wait::NextFrame => WaitState::Ready,
            Wait::Frames(count) => WaitState::Frames(count.max(1)),
            Wait::Until(predicate) => WaitState::Until(predicate),
            Wait::Child(id) => WaitState::Child(id),
            Wait::Children => WaitState::Children,
        }
    }
}

/// A cooperative task: a suspendable procedure plus the ordered list of
/// child tasks it exclusively owns. The procedure body always advances
/// before the children on the same tick; children advance in insertion
/// order. Children spawned during a resume join the list in spawn order and
/// receive their first advance on that same tick.
pub struct CoTask<W, C> {
    script: Option<Box<dyn Script<W, C>>>,
    wait: WaitState<W>,
    ctx: Rc<RefCell<C>>,
    frames_advanced: u64,
    next_child_id: u64,
    children: Vec<(TaskId, Box<dyn Task<W>>)>,
    alive: bool,
}

impl<W: 'static, C: 'static> CoTask<W, C> {
    pub fn new<S>(script: S, ctx: C) -> Self
    where
        S: Script<W, C> + 'static,
    {
        Self::with_shared(script, Rc::new(RefCell::new(ctx)))
    }

    /// Builds a task around an already-shared context, as `ScriptCx::spawn`
    /// does when a child inherits its parent's context.
    pub fn with_shared<S>(script: S, ctx: Rc<RefCell<C>>) -> Self
    where
        S: Script<W, C> + 'static,
    {
        Self {
            script: Some(Box::new(script)),
            wait: WaitState::Ready,
            ctx,
            frames_advanced: 0,
            next_child_id: 0,
            children: Vec::new(),
            alive: true,
        }
    }

    pub fn context(&self) -> Rc<RefCell<C>> {
        Rc::clone(&self.ctx)
    }

    pub fn frames_advanced(&self) -> u64 {
        self.frames_advanced
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Attaches a pre-built child from outside the script body.
    pub fn attach(&mut self, task: Box<dyn Task<W>>) -> TaskId {
        let id = TaskId(self.next_child_id);
        self.next_child_id = self.next_child_id.saturating_add(1);
        self.children.push((id, task));
        id
    }

    fn wait_satisfied(&mut self, world: &W) -> bool {
        match &mut self.wait {
            WaitState::Ready => true,
            WaitState::Frames(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            WaitState::Until(predicate) => predicate(world),
            WaitState::Child(id) => {
                let id = *id;
                !self
                    .children
                    .iter()
                    .any(|(child_id, child)| *child_id == id && child.is_alive())
            }
            WaitState::Children => self.children.iter().all(|(_, child)| !child.is_alive()),
        }
    }

    fn cancel_children(&mut self) {
        for (_, child) in &mut self.children {
            child.cancel();
        }
        self.children.clear();
    }

    fn fail(&mut self, fault: &TaskFault) {
        warn!(fault = %fault, "cooperative task fault");
        self.cancel_children();
        self.script = None;
        self.alive = false;
    }
}

impl<W: 'static, C: 'static> Task<W> for CoTask<W, C> {
    fn advance(&mut self, world: &mut W) -> Result<(), TaskFault> {
        if !self.alive {
            return Err(TaskFault::AdvancedAfterDeath);
        }
        self.frames_advanced = self.frames_advanced.saturating_add(1);

        if self.wait_satisfied(world) {
            let mut pending: Vec<(TaskId, Box<dyn Task<W>>)> = Vec::new();
            let step = match self.script.as_mut() {
                Some(script) => {
                    let mut cx = ScriptCx {
                        world,
                        frame: self.frames_advanced,
                        ctx: &self.ctx,
                        next_child_id: &mut self.next_child_id,
                        pending: &mut pending,
                    };
                    Some(script.resume(&mut cx))
                }
                None => None,
            };
            match step {
                Some(Ok(Step::Yield(wait))) => {
                    self.wait = WaitState::from_wait(wait);
                    self.children.append(&mut pending);
                }
                Some(Ok(Step::Done)) => {
                    // Exclusive ownership: a finished procedure takes its
                    // remaining children down with it. Scripts that want
                    // children drained yield Wait::Children first.
                    self.children.append(&mut pending);
                    self.cancel_children();
                    self.script = None;
                    self.alive = false;
                    return Ok(());
                }
                Some(Err(fault)) => {
                    self.fail(&fault);
                    return Err(fault);
                }
                None => {}
            }
        }

        let mut index = 0;
        while index < self.children.len() {
            let (_, child) = &mut self.children[index];
            if child.is_alive() {
                if let Err(fault) = child.advance(world) {
                    self.fail(&fault);
                    return Err(fault);
                }
            }
            index += 1;
        }
        self.children.retain(|(_, child)| child.is_alive());
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn cancel(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.cancel_children();
        self.script = None;
        self.alive = false;
        true
    }
}
