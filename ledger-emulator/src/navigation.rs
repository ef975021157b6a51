// SPDX-License-Identifier: Apache-2.0

//! Scripted button sequences used to walk through review screens

use crate::api::Button;

/// One step of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStep {
    Right(u32),
    Left(u32),
    Both,
}

/// Sequence of button presses, a snapshot is taken after each press
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickSchedule {
    steps: Vec<ClickStep>,
}

impl ClickSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the integer notation: `n > 0` right clicks, `n < 0` left
    /// clicks, `0` both buttons
    ///
    /// `[9, -1, 0]` walks nine screens right, one back and approves.
    pub fn from_zemu(schedule: &[i32]) -> Self {
        let steps = schedule
            .iter()
            .map(|&n| match n {
                0 => ClickStep::Both,
                n if n > 0 => ClickStep::Right(n.unsigned_abs()),
                n => ClickStep::Left(n.unsigned_abs()),
            })
            .collect();
        Self { steps }
    }

    pub fn right(mut self, count: u32) -> Self {
        self.steps.push(ClickStep::Right(count));
        self
    }

    pub fn left(mut self, count: u32) -> Self {
        self.steps.push(ClickStep::Left(count));
        self
    }

    pub fn both(mut self) -> Self {
        self.steps.push(ClickStep::Both);
        self
    }

    pub fn steps(&self) -> &[ClickStep] {
        &self.steps
    }

    /// Individual presses in order
    pub fn presses(&self) -> impl Iterator<Item = Button> + '_ {
        self.steps.iter().flat_map(|step| {
            let (button, count) = match *step {
                ClickStep::Right(count) => (Button::Right, count),
                ClickStep::Left(count) => (Button::Left, count),
                ClickStep::Both => (Button::Both, 1),
            };
            std::iter::repeat(button).take(count as usize)
        })
    }

    pub fn press_count(&self) -> usize {
        self.presses().count()
    }
}

impl From<&[i32]> for ClickSchedule {
    fn from(schedule: &[i32]) -> Self {
        Self::from_zemu(schedule)
    }
}
