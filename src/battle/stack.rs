//! Resumable execution stack.
//!
//! Holds the pending steps of a battle as plain data. A step runs with the
//! stack in hand so it can push follow-up steps. When a step reports that it
//! is waiting on an outside decision, anything it pushed is discarded and
//! the step itself goes back on top, so calling `run` again picks up at the
//! same step. Completed steps are never replayed.

use serde::{Deserialize, Serialize};

/// What a step asks the stack to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Side effects applied; move on.
    Continue,
    /// Waiting on an outside decision; keep this step for the next run.
    Suspend,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Suspended,
    Exhausted,
}

/// Last-in-first-out list of pending steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStack<S> {
    frames: Vec<S>,
}

impl<S> Default for ExecutionStack<S> {
    fn default() -> Self {
        ExecutionStack { frames: Vec::new() }
    }
}

impl<S> ExecutionStack<S> {
    pub fn new() -> Self {
        ExecutionStack::default()
    }

    pub fn push(&mut self, step: S) {
        self.frames.push(step);
    }

    /// Pushes `steps` so that they execute in the given order.
    pub fn push_plan(&mut self, steps: Vec<S>) {
        self.frames.extend(steps.into_iter().rev());
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Pending frames, next to run last.
    pub fn frames(&self) -> &[S] {
        &self.frames
    }

    /// The step that runs next.
    pub fn peek(&self) -> Option<&S> {
        self.frames.last()
    }

    /// Runs steps until one suspends or none are left.
    ///
    /// A step that suspends or fails is put back on top of the stack, with
    /// any frames it pushed during the aborted attempt removed.
    pub fn run<E, F>(&mut self, mut execute: F) -> Result<StackState, E>
    where
        F: FnMut(&S, &mut Self) -> Result<Flow, E>,
    {
        while let Some(step) = self.frames.pop() {
            let depth = self.frames.len();
            match execute(&step, self) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Suspend) => {
                    self.frames.truncate(depth);
                    self.frames.push(step);
                    return Ok(StackState::Suspended);
                }
                Err(e) => {
                    self.frames.truncate(depth);
                    self.frames.push(step);
                    return Err(e);
                }
            }
        }
        Ok(StackState::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_runs_in_order() {
        let mut stack = ExecutionStack::new();
        stack.push_plan(vec![1, 2, 3]);
        let mut seen = Vec::new();
        let state = stack
            .run::<(), _>(|step, _| {
                seen.push(*step);
                Ok(Flow::Continue)
            })
            .unwrap();
        assert_eq!(state, StackState::Exhausted);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn pushed_children_run_before_siblings() {
        let mut stack = ExecutionStack::new();
        stack.push_plan(vec![10, 20]);
        let mut seen = Vec::new();
        stack
            .run::<(), _>(|step, stack| {
                seen.push(*step);
                if *step == 10 {
                    stack.push_plan(vec![11, 12]);
                }
                Ok(Flow::Continue)
            })
            .unwrap();
        assert_eq!(seen, vec![10, 11, 12, 20]);
    }

    #[test]
    fn suspended_step_is_retained_without_its_children() {
        let mut stack = ExecutionStack::new();
        stack.push_plan(vec![1, 2, 3]);
        let state = stack
            .run::<(), _>(|step, stack| {
                if *step == 2 {
                    stack.push(99);
                    return Ok(Flow::Suspend);
                }
                Ok(Flow::Continue)
            })
            .unwrap();
        assert_eq!(state, StackState::Suspended);
        assert_eq!(stack.frames(), &[3, 2]);

        let mut seen = Vec::new();
        stack
            .run::<(), _>(|step, _| {
                seen.push(*step);
                Ok(Flow::Continue)
            })
            .unwrap();
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn failing_step_stays_on_top() {
        let mut stack = ExecutionStack::new();
        stack.push_plan(vec!["a", "b"]);
        let err = stack.run(|step, _| if *step == "a" { Err("boom") } else { Ok(Flow::Continue) });
        assert_eq!(err, Err("boom"));
        assert_eq!(stack.peek(), Some(&"a"));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn survives_serialization() {
        let mut stack = ExecutionStack::new();
        stack.push_plan(vec!["roll".to_string(), "select".to_string()]);
        let json = serde_json::to_string(&stack).unwrap();
        let back: ExecutionStack<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stack);
        assert_eq!(back.peek().map(String::as_str), Some("roll"));
    }
}
