//! Termination conditions
//!
//! The run loop checks its termination condition once per iteration, before
//! selecting the next speaker. A condition returns `Some(reason)` to stop the
//! run. Conditions may keep state (a scan cursor, a start time) and are reset
//! together with the team.

pub mod conditions;

pub use conditions::{HandoffTo, MaxMessages, MaxTurns, SourceMatch, TextMention, Timeout};

use crate::conversation::Conversation;
use crate::types::StopReason;

/// Predicate over the conversation deciding whether a run stops
pub trait TerminationCondition: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Check the conversation after `turns` completed agent turns
    fn check(&mut self, conversation: &Conversation, turns: usize) -> Option<StopReason>;

    /// Forget any state accumulated during a run
    fn reset(&mut self);

    /// Stop when either condition fires
    fn or<T>(self, other: T) -> Composite
    where
        Self: Sized + 'static,
        T: TerminationCondition + 'static,
    {
        Composite::any(vec![Box::new(self), Box::new(other)])
    }

    /// Stop once both conditions have fired
    fn and<T>(self, other: T) -> Composite
    where
        Self: Sized + 'static,
        T: TerminationCondition + 'static,
    {
        Composite::all(vec![Box::new(self), Box::new(other)])
    }
}

impl TerminationCondition for Box<dyn TerminationCondition> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn check(&mut self, conversation: &Conversation, turns: usize) -> Option<StopReason> {
        (**self).check(conversation, turns)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// How a composite combines its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// Stop when any child fires (OR)
    Any,

    /// Stop once every child has fired since the last reset (AND)
    All,
}

/// Boolean combination of conditions
pub struct Composite {
    mode: CompositeMode,
    children: Vec<Box<dyn TerminationCondition>>,
    fired: Vec<Option<StopReason>>,
}

impl Composite {
    fn new(mode: CompositeMode, children: Vec<Box<dyn TerminationCondition>>) -> Self {
        let fired = vec![None; children.len()];
        Self {
            mode,
            children,
            fired,
        }
    }

    /// OR combination
    pub fn any(children: Vec<Box<dyn TerminationCondition>>) -> Self {
        Self::new(CompositeMode::Any, children)
    }

    /// AND combination
    pub fn all(children: Vec<Box<dyn TerminationCondition>>) -> Self {
        Self::new(CompositeMode::All, children)
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    fn combine(mut reasons: Vec<StopReason>) -> Option<StopReason> {
        match reasons.len() {
            0 => None,
            1 => reasons.pop(),
            _ => Some(StopReason::Composite { reasons }),
        }
    }
}

impl TerminationCondition for Composite {
    fn name(&self) -> &'static str {
        match self.mode {
            CompositeMode::Any => "any",
            CompositeMode::All => "all",
        }
    }

    fn check(&mut self, conversation: &Conversation, turns: usize) -> Option<StopReason> {
        match self.mode {
            CompositeMode::Any => {
                // Every child is checked so stateful children keep their cursors current
                let reasons: Vec<StopReason> = self
                    .children
                    .iter_mut()
                    .filter_map(|child| child.check(conversation, turns))
                    .collect();
                Self::combine(reasons)
            }
            CompositeMode::All => {
                for (child, fired) in self.children.iter_mut().zip(self.fired.iter_mut()) {
                    if fired.is_none() {
                        *fired = child.check(conversation, turns);
                    }
                }

                if self.fired.iter().all(Option::is_some) {
                    Self::combine(self.fired.iter().flatten().cloned().collect())
                } else {
                    None
                }
            }
        }
    }

    fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
        self.fired.iter_mut().for_each(|f| *f = None);
    }

    fn or<T>(mut self, other: T) -> Composite
    where
        T: TerminationCondition + 'static,
    {
        if self.mode == CompositeMode::Any {
            self.children.push(Box::new(other));
            self.fired.push(None);
            self
        } else {
            Composite::any(vec![Box::new(self), Box::new(other)])
        }
    }

    fn and<T>(mut self, other: T) -> Composite
    where
        T: TerminationCondition + 'static,
    {
        if self.mode == CompositeMode::All {
            self.children.push(Box::new(other));
            self.fired.push(None);
            self
        } else {
            Composite::all(vec![Box::new(self), Box::new(other)])
        }
    }
}
