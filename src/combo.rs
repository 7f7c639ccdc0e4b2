//! Two-handed combo recording and matching.
//!
//! Recording starts when both hands are fully open and stops when both are
//! fully closed. Every distinct (left, right) pose seen in between is
//! appended once; on stop the recorded steps are looked up in the registry.

use anyhow::Result;
use log::info;
use std::{collections::HashMap, fmt};

use crate::pattern::FingerPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GestureFramePair {
    pub left: FingerPattern,
    pub right: FingerPattern,
}

impl GestureFramePair {
    pub fn new(left: FingerPattern, right: FingerPattern) -> Self {
        Self { left, right }
    }

    pub fn both_open(&self) -> bool {
        self.left == FingerPattern::ALL_UP && self.right == FingerPattern::ALL_UP
    }

    pub fn both_closed(&self) -> bool {
        self.left == FingerPattern::ALL_DOWN && self.right == FingerPattern::ALL_DOWN
    }
}

impl fmt::Display for GestureFramePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.left, self.right)
    }
}

pub type ComboSequence = Vec<GestureFramePair>;

pub type ComboAction = Box<dyn FnMut() -> Result<()>>;

pub struct ComboBinding {
    pub name: String,
    pub action: ComboAction,
}

impl fmt::Debug for ComboBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComboBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Value-keyed table of combos, built once per session.
#[derive(Debug, Default)]
pub struct ComboRegistry {
    combos: HashMap<ComboSequence, ComboBinding>,
}

impl ComboRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and keeps the first binding) if the sequence is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        steps: ComboSequence,
        action: impl FnMut() -> Result<()> + 'static,
    ) -> bool {
        if self.combos.contains_key(&steps) {
            return false;
        }
        self.combos.insert(
            steps,
            ComboBinding {
                name: name.into(),
                action: Box::new(action),
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    fn get_mut(&mut self, steps: &[GestureFramePair]) -> Option<&mut ComboBinding> {
        self.combos.get_mut(steps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComboState {
    #[default]
    Idle,
    Recording,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComboOutcome {
    #[default]
    None,
    Started,
    Step(usize),
    Matched(String),
    NoMatch,
}

impl fmt::Display for ComboOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComboOutcome::None => Ok(()),
            ComboOutcome::Started => f.write_str("Combo Recording: ON"),
            ComboOutcome::Step(n) => write!(f, "Combo Step: {n}"),
            ComboOutcome::Matched(name) => write!(f, "Combo Triggered: {name}"),
            ComboOutcome::NoMatch => f.write_str("Combo Recording: OFF (no combo matched)"),
        }
    }
}

#[derive(Debug)]
pub struct ComboStateMachine {
    registry: ComboRegistry,
    state: ComboState,
    sequence: ComboSequence,
}

impl ComboStateMachine {
    pub fn new(registry: ComboRegistry) -> Self {
        Self {
            registry,
            state: ComboState::Idle,
            sequence: Vec::new(),
        }
    }

    pub fn state(&self) -> ComboState {
        self.state
    }

    pub fn sequence(&self) -> &[GestureFramePair] {
        &self.sequence
    }

    pub fn registry(&self) -> &ComboRegistry {
        &self.registry
    }

    /// Feed one frame. A matched action runs synchronously after the buffer
    /// has been cleared; its error is returned untouched.
    pub fn step(&mut self, pair: GestureFramePair) -> Result<ComboOutcome> {
        match self.state {
            ComboState::Idle if pair.both_open() => {
                self.state = ComboState::Recording;
                self.sequence.clear();
                info!("combo: recording started");
                Ok(ComboOutcome::Started)
            }
            ComboState::Idle => Ok(ComboOutcome::None),
            ComboState::Recording if pair.both_closed() => {
                self.state = ComboState::Idle;
                let recorded = std::mem::take(&mut self.sequence);
                info!(
                    "combo: recording stopped, sequence [{}]",
                    recorded
                        .iter()
                        .map(|p| p.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                match self.registry.get_mut(&recorded) {
                    Some(binding) => {
                        info!("combo: triggered '{}'", binding.name);
                        (binding.action)()?;
                        Ok(ComboOutcome::Matched(binding.name.clone()))
                    }
                    None => Ok(ComboOutcome::NoMatch),
                }
            }
            ComboState::Recording => {
                if self.sequence.last() == Some(&pair) {
                    return Ok(ComboOutcome::None);
                }
                self.sequence.push(pair);
                Ok(ComboOutcome::Step(self.sequence.len()))
            }
        }
    }
}
