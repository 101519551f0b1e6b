//! Keypad routing.
//!
//! The runner owns every input token and forwards it to the pad built for the
//! active question by [`pad_for`]. A pad turns tokens into at most one
//! [`Submission`]; after that it ignores everything, including
//! [`AnswerPad::force_submit`].

use std::collections::BTreeSet;

use crate::drill_engine::models::{
    LayoutChoice, ProcedureVariant, Question, QuestionKind, QuestionMetadata,
};

/// One key press or tap from the shared keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputToken {
    Digit(u8),
    Delete,
    Enter,
    /// Tap on an on-screen target (board cell, layout choice, carry slot).
    Tap(usize),
}

impl InputToken {
    /// Keypad strings: `"0"`..`"9"`, `"DEL"`, `"ENTER"`.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "DEL" => Some(InputToken::Delete),
            "ENTER" => Some(InputToken::Enter),
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c.to_digit(10).map(|d| InputToken::Digit(d as u8)),
                    _ => None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// What the learner ended up with, in the question's answer format.
    pub answer: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PadEvent {
    /// Token has no meaning here (or the pad already submitted).
    Ignored,
    /// Accepted; more input needed.
    Pending,
    /// Accepted but wrong for the current step; the view shakes.
    Rejected,
    Submitted(Submission),
}

/// One question's input handler.
pub trait AnswerPad {
    fn handle(&mut self, token: InputToken) -> PadEvent;

    /// Timeout path: submit whatever is there. `None` once already submitted.
    fn force_submit(&mut self) -> Option<Submission>;

    fn is_submitted(&self) -> bool;
}

/// Exactly-once guard shared by every pad.
#[derive(Debug, Default)]
struct Latch {
    done: bool,
}

impl Latch {
    fn fire(&mut self, answer: impl Into<String>, correct: bool) -> Option<Submission> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(Submission { answer: answer.into(), correct })
    }

    fn event(&mut self, answer: impl Into<String>, correct: bool) -> PadEvent {
        self.fire(answer, correct).map_or(PadEvent::Ignored, PadEvent::Submitted)
    }
}

fn push_digit(buffer: &mut String, d: u8, max_len: usize) -> bool {
    if buffer.len() >= max_len || d > 9 {
        return false;
    }
    buffer.push(char::from(b'0' + d));
    true
}

// ── numeric ──────────────────────────────────────────────────────────────────

/// Free-form number entry: digits append, `DEL` backspaces, `ENTER` submits.
pub struct NumericPad {
    expected: String,
    buffer: String,
    max_len: usize,
    /// Skip-count boxes refuse an empty `ENTER`; the plain pad submits it.
    allow_empty: bool,
    latch: Latch,
}

impl NumericPad {
    pub fn new(expected: impl Into<String>) -> Self {
        Self { expected: expected.into(), buffer: String::new(), max_len: 6, allow_empty: true, latch: Latch::default() }
    }

    /// One skip-count box: at most two digits, never submitted empty.
    pub fn skip_count_box(expected: impl Into<String>) -> Self {
        Self { max_len: 2, allow_empty: false, ..Self::new(expected) }
    }

    fn check(&self) -> bool {
        self.buffer == self.expected
    }
}

impl AnswerPad for NumericPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Digit(d) => {
                if push_digit(&mut self.buffer, d, self.max_len) { PadEvent::Pending } else { PadEvent::Ignored }
            }
            InputToken::Delete => {
                self.buffer.pop();
                PadEvent::Pending
            }
            InputToken::Enter if self.buffer.is_empty() && !self.allow_empty => PadEvent::Ignored,
            InputToken::Enter => {
                let correct = self.check();
                self.latch.event(self.buffer.clone(), correct)
            }
            InputToken::Tap(_) => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let correct = self.check();
        self.latch.fire(self.buffer.clone(), correct)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── make-10 / genka-hou procedure ────────────────────────────────────────────

/// Walks the decomposition one box at a time. A box advances as soon as it
/// holds the expected value; the last box submits.
pub struct ProcedurePad {
    steps: Vec<String>,
    index: usize,
    buffer: String,
    latch: Latch,
}

impl ProcedurePad {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps, index: 0, buffer: String::new(), latch: Latch::default() }
    }

    /// Addition: complement, remainder, then the sum (split-only stops at
    /// the remainder). Subtraction: `10 - s`, then the difference.
    pub fn for_metadata(meta: &QuestionMetadata, answer: &str) -> Option<Self> {
        let steps = match meta {
            QuestionMetadata::CarryProcedure { complement, remainder, mode, .. } => {
                let mut steps = vec![complement.to_string(), remainder.to_string()];
                if *mode != Some(ProcedureVariant::SplitOnly) {
                    steps.push(answer.to_string());
                }
                steps
            }
            QuestionMetadata::BorrowProcedure { step1, step2, .. } => vec![step1.to_string(), step2.to_string()],
            _ => return None,
        };
        Some(Self::new(steps))
    }

    pub fn step_index(&self) -> usize {
        self.index
    }

    fn accept_step(&mut self) -> PadEvent {
        if self.index + 1 >= self.steps.len() {
            let answer = std::mem::take(&mut self.buffer);
            return self.latch.event(answer, true);
        }
        self.index += 1;
        self.buffer.clear();
        PadEvent::Pending
    }

    fn expected(&self) -> &str {
        self.steps.get(self.index).map_or("", String::as_str)
    }
}

impl AnswerPad for ProcedurePad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Digit(d) => {
                if !push_digit(&mut self.buffer, d, 2) {
                    return PadEvent::Ignored;
                }
                if self.buffer == self.expected() { self.accept_step() } else { PadEvent::Pending }
            }
            InputToken::Delete => {
                if self.buffer.pop().is_none() && self.index > 0 {
                    self.index -= 1;
                }
                PadEvent::Pending
            }
            InputToken::Enter if self.buffer.is_empty() => PadEvent::Ignored,
            InputToken::Enter => {
                if self.buffer == self.expected() { self.accept_step() } else { PadEvent::Rejected }
            }
            InputToken::Tap(_) => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let last = self.index + 1 == self.steps.len();
        let correct = last && self.buffer == self.expected();
        self.latch.fire(self.buffer.clone(), correct)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── one digit per slot ───────────────────────────────────────────────────────

/// A row of single-digit slots filled left to right; the answer is the
/// slots joined with commas. Filling the last slot submits.
pub struct SlotPad {
    expected: String,
    slots: Vec<Option<u8>>,
    active: usize,
    latch: Latch,
}

impl SlotPad {
    pub fn new(expected: impl Into<String>, slots: usize) -> Self {
        Self { expected: expected.into(), slots: vec![None; slots.max(1)], active: 0, latch: Latch::default() }
    }

    /// Tens/ones, or hundreds/tens/ones when the metadata carries hundreds.
    pub fn place_value(question: &Question) -> Self {
        let slots = match &question.metadata {
            Some(QuestionMetadata::PlaceValue { hundreds: Some(_), .. }) => 3,
            _ => 2,
        };
        Self::new(question.answer.clone(), slots)
    }

    fn joined(&self) -> String {
        self.slots
            .iter()
            .map(|s| s.map(|d| d.to_string()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn submit(&mut self) -> PadEvent {
        let answer = self.joined();
        let correct = answer == self.expected;
        self.latch.event(answer, correct)
    }
}

impl AnswerPad for SlotPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Digit(d) if d <= 9 => {
                self.slots[self.active] = Some(d);
                if self.active + 1 < self.slots.len() {
                    self.active += 1;
                    PadEvent::Pending
                } else {
                    self.submit()
                }
            }
            InputToken::Delete => {
                if self.slots[self.active].take().is_none() && self.active > 0 {
                    self.active -= 1;
                }
                PadEvent::Pending
            }
            InputToken::Enter if self.slots.iter().all(Option::is_some) => self.submit(),
            _ => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let answer = self.joined();
        let correct = answer == self.expected;
        self.latch.fire(answer, correct)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── stair grid ───────────────────────────────────────────────────────────────

/// One box per stair cell; `ENTER` commits a cell and moves right.
pub struct StairPad {
    expected: String,
    cells: Vec<String>,
    active: usize,
    latch: Latch,
}

impl StairPad {
    pub fn new(expected: impl Into<String>, cells: usize) -> Self {
        Self { expected: expected.into(), cells: vec![String::new(); cells.max(1)], active: 0, latch: Latch::default() }
    }

    fn joined(&self) -> String {
        self.cells.join(",")
    }
}

impl AnswerPad for StairPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        let active = self.active;
        match token {
            InputToken::Digit(d) => {
                if push_digit(&mut self.cells[active], d, 3) { PadEvent::Pending } else { PadEvent::Ignored }
            }
            InputToken::Delete => {
                if self.cells[active].pop().is_none() && active > 0 {
                    self.active -= 1;
                }
                PadEvent::Pending
            }
            InputToken::Enter if self.cells[active].is_empty() => PadEvent::Ignored,
            InputToken::Enter if self.active + 1 < self.cells.len() => {
                self.active += 1;
                PadEvent::Pending
            }
            InputToken::Enter => {
                let answer = self.joined();
                let correct = answer == self.expected;
                self.latch.event(answer, correct)
            }
            InputToken::Tap(_) => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let answer = self.joined();
        let correct = answer == self.expected;
        self.latch.fire(answer, correct)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── column arithmetic ────────────────────────────────────────────────────────

/// Column-by-column entry, ones first. When a column carries, the next
/// column stays locked until the carry mark (`Tap(column)`) is set.
pub struct WrittenCalcPad {
    expected: i32,
    /// Index 0 = ones.
    digits: [Option<u8>; 3],
    /// `carries[0]`: ones → tens, `carries[1]`: tens → hundreds.
    carries: [bool; 2],
    marks: [bool; 2],
    active: usize,
    last: usize,
    latch: Latch,
}

impl WrittenCalcPad {
    pub fn new(expected: i32, carries: [bool; 2]) -> Self {
        let width = expected.max(0).to_string().len().clamp(1, 3);
        Self {
            expected,
            digits: [None; 3],
            carries,
            marks: [false; 2],
            active: 0,
            last: width - 1,
            latch: Latch::default(),
        }
    }

    pub fn for_question(question: &Question) -> Self {
        match &question.metadata {
            Some(QuestionMetadata::WrittenAdd { sum, has_carry, tens_sum, .. }) => {
                Self::new(*sum, [*has_carry, *tens_sum >= 10])
            }
            Some(QuestionMetadata::WrittenVerify { expected_answer, .. }) => Self::new(*expected_answer, [false; 2]),
            _ => Self::new(question.answer.parse().unwrap_or(0), [false; 2]),
        }
    }

    fn value(&self) -> Option<i32> {
        let text: String = self.digits.iter().rev().flatten().map(|d| d.to_string()).collect();
        text.parse().ok()
    }

    fn blocked_at(&self, col: usize) -> bool {
        col < 2 && self.carries[col] && !self.marks[col]
    }

    fn submit(&mut self) -> PadEvent {
        let value = self.value();
        let answer = value.map(|v| v.to_string()).unwrap_or_default();
        self.latch.event(answer, value == Some(self.expected))
    }
}

impl AnswerPad for WrittenCalcPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Digit(d) if d <= 9 => {
                self.digits[self.active] = Some(d);
                if self.active >= self.last {
                    return self.submit();
                }
                if !self.blocked_at(self.active) {
                    self.active += 1;
                }
                PadEvent::Pending
            }
            InputToken::Tap(col) if col < 2 => {
                self.marks[col] = !self.marks[col];
                if self.marks[col] && self.active == col && self.digits[col].is_some() && col < self.last {
                    self.active += 1;
                }
                PadEvent::Pending
            }
            InputToken::Delete => {
                if self.digits[self.active].take().is_none() && self.active > 0 {
                    self.active -= 1;
                }
                PadEvent::Pending
            }
            InputToken::Enter if self.digits.iter().any(Option::is_some) => self.submit(),
            _ => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let value = self.value();
        let answer = value.map(|v| v.to_string()).unwrap_or_default();
        self.latch.fire(answer, value == Some(self.expected))
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── written form ─────────────────────────────────────────────────────────────

const PLACE_NAMES: [&str; 3] = ["hundreds", "tens", "ones"];

/// Place the bottom operand's digits into hundreds / tens / ones columns.
/// `Tap(column)` moves the cursor; digits fill rightwards; filling the ones
/// column submits. The reported answer is the column of the leading digit.
pub struct FormFillPad {
    expected: [Option<u8>; 3],
    cells: [Option<u8>; 3],
    active: usize,
    latch: Latch,
}

impl FormFillPad {
    pub fn new(bottom_digits: &[u8]) -> Self {
        let mut expected = [None; 3];
        for (slot, d) in expected.iter_mut().rev().zip(bottom_digits.iter().rev()) {
            *slot = Some(*d);
        }
        Self { expected, cells: [None; 3], active: 0, latch: Latch::default() }
    }

    fn submit(&mut self) -> Option<Submission> {
        let lead = self.cells.iter().position(Option::is_some);
        let answer = lead.map_or("", |i| PLACE_NAMES[i]);
        let correct = self.cells == self.expected;
        self.latch.fire(answer, correct)
    }
}

impl AnswerPad for FormFillPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Tap(col) if col < 3 => {
                self.active = col;
                PadEvent::Pending
            }
            InputToken::Digit(d) if d <= 9 => {
                self.cells[self.active] = Some(d);
                if self.active < 2 {
                    self.active += 1;
                    PadEvent::Pending
                } else {
                    self.submit().map_or(PadEvent::Ignored, PadEvent::Submitted)
                }
            }
            InputToken::Delete => {
                if self.cells[self.active].take().is_none() && self.active > 0 {
                    self.active -= 1;
                }
                PadEvent::Pending
            }
            InputToken::Enter => self.submit().map_or(PadEvent::Ignored, PadEvent::Submitted),
            _ => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        self.submit()
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

/// Pick one of the offered layouts; the first tap decides.
pub struct ChoicePad {
    choices: Vec<LayoutChoice>,
    latch: Latch,
}

impl ChoicePad {
    pub fn new(choices: Vec<LayoutChoice>) -> Self {
        Self { choices, latch: Latch::default() }
    }
}

impl AnswerPad for ChoicePad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        match token {
            InputToken::Tap(i) => match self.choices.get(i) {
                Some(choice) => {
                    let correct = choice.is_correct;
                    self.latch.event(i.to_string(), correct)
                }
                None => PadEvent::Ignored,
            },
            _ => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        self.latch.fire("", false)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

/// Toggle the tens carry mark with any tap, confirm with `ENTER`.
pub struct CarryMarkPad {
    has_carry: bool,
    marked: bool,
    latch: Latch,
}

impl CarryMarkPad {
    pub fn new(has_carry: bool) -> Self {
        Self { has_carry, marked: false, latch: Latch::default() }
    }

    fn submit(&mut self) -> Option<Submission> {
        let answer = if self.marked { "tens" } else { "none" };
        self.latch.fire(answer, self.marked == self.has_carry)
    }
}

impl AnswerPad for CarryMarkPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Tap(_) => {
                self.marked = !self.marked;
                PadEvent::Pending
            }
            InputToken::Enter => self.submit().map_or(PadEvent::Ignored, PadEvent::Submitted),
            _ => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        self.submit()
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── skip tap ─────────────────────────────────────────────────────────────────

/// Tap the multiples in counting order. A non-multiple counts as a wrong tap;
/// a multiple tapped out of order is ignored. Tapping the last target
/// submits; the round is correct only with no wrong taps.
pub struct SkipTapPad {
    board: Vec<i32>,
    targets: Vec<i32>,
    tapped: usize,
    wrong: BTreeSet<i32>,
    latch: Latch,
}

impl SkipTapPad {
    pub fn new(board: Vec<i32>, step: i32, from: i32, to: i32) -> Self {
        let targets = if step > 0 {
            std::iter::successors(Some(from), |n| Some(n + step)).take_while(|n| *n <= to).collect()
        } else {
            Vec::new()
        };
        Self { board, targets, tapped: 0, wrong: BTreeSet::new(), latch: Latch::default() }
    }

    fn score(&self) -> String {
        format!("{}/{}", self.tapped, self.targets.len())
    }

    fn complete(&self) -> bool {
        self.tapped >= self.targets.len() && self.wrong.is_empty()
    }
}

impl AnswerPad for SkipTapPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        let InputToken::Tap(i) = token else { return PadEvent::Ignored };
        let Some(&num) = self.board.get(i) else { return PadEvent::Ignored };

        if self.targets.get(self.tapped) == Some(&num) {
            self.tapped += 1;
            if self.tapped == self.targets.len() {
                let (answer, correct) = (self.score(), self.complete());
                return self.latch.event(answer, correct);
            }
            PadEvent::Pending
        } else if !self.targets.contains(&num) {
            self.wrong.insert(num);
            PadEvent::Rejected
        } else {
            PadEvent::Ignored
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let (answer, correct) = (self.score(), self.complete());
        self.latch.fire(answer, correct)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

// ── mental addition ──────────────────────────────────────────────────────────

/// Tens first, then ones. Only correct digits stick; a wrong digit is
/// rejected and cleared.
pub struct MentalAddPad {
    parts: [String; 2],
    step: usize,
    buffer: String,
    latch: Latch,
}

impl MentalAddPad {
    pub fn new(tens_part: i32, ones_part: i32) -> Self {
        Self {
            parts: [tens_part.to_string(), ones_part.to_string()],
            step: 0,
            buffer: String::new(),
            latch: Latch::default(),
        }
    }

    fn entered(&self) -> String {
        match self.step {
            0 => self.buffer.clone(),
            _ => format!("{}{}", self.parts[0], self.buffer),
        }
    }
}

impl AnswerPad for MentalAddPad {
    fn handle(&mut self, token: InputToken) -> PadEvent {
        if self.latch.done {
            return PadEvent::Ignored;
        }
        match token {
            InputToken::Digit(d) => {
                if !push_digit(&mut self.buffer, d, 2) {
                    return PadEvent::Ignored;
                }
                let expected = &self.parts[self.step];
                if &self.buffer == expected {
                    if self.step == 1 {
                        let answer = format!("{}{}", self.parts[0], self.parts[1]);
                        return self.latch.event(answer, true);
                    }
                    self.step = 1;
                    self.buffer.clear();
                    PadEvent::Pending
                } else if expected.starts_with(self.buffer.as_str()) {
                    PadEvent::Pending
                } else {
                    self.buffer.clear();
                    PadEvent::Rejected
                }
            }
            InputToken::Delete => {
                if self.buffer.pop().is_none() {
                    self.step = 0;
                }
                PadEvent::Pending
            }
            _ => PadEvent::Ignored,
        }
    }

    fn force_submit(&mut self) -> Option<Submission> {
        let answer = self.entered();
        self.latch.fire(answer, false)
    }

    fn is_submitted(&self) -> bool {
        self.latch.done
    }
}

/// Build the pad that matches `question`'s interaction kind. Questions whose
/// metadata is missing or unexpected fall back to the plain numeric pad.
pub fn pad_for(question: &Question) -> Box<dyn AnswerPad> {
    let meta = question.metadata.as_ref();
    match (question.kind, meta) {
        (QuestionKind::Fill, Some(m)) => match ProcedurePad::for_metadata(m, &question.answer) {
            Some(pad) => Box::new(pad),
            None => Box::new(NumericPad::new(question.answer.clone())),
        },
        (QuestionKind::Input, Some(QuestionMetadata::SkipCount { .. })) => {
            Box::new(NumericPad::skip_count_box(question.answer.clone()))
        }
        (QuestionKind::Input, Some(QuestionMetadata::Stair { row, .. })) => {
            Box::new(StairPad::new(question.answer.clone(), row.len()))
        }
        (QuestionKind::Tap, Some(QuestionMetadata::SkipTap { board, step, from, to, .. })) => {
            Box::new(SkipTapPad::new(board.clone(), *step, *from, *to))
        }
        (QuestionKind::PlaceValue, _) => Box::new(SlotPad::place_value(question)),
        (QuestionKind::WrittenFormFill, Some(QuestionMetadata::FormFill { bottom_digits, .. })) => {
            Box::new(FormFillPad::new(bottom_digits))
        }
        (QuestionKind::WrittenFormChoice, Some(QuestionMetadata::FormChoice { choices, .. })) => {
            Box::new(ChoicePad::new(choices.clone()))
        }
        (QuestionKind::WrittenAdd | QuestionKind::WrittenVerify, _) => Box::new(WrittenCalcPad::for_question(question)),
        (QuestionKind::CarryMarkTap, Some(QuestionMetadata::CarryMark { has_carry, .. })) => {
            Box::new(CarryMarkPad::new(*has_carry))
        }
        (QuestionKind::MentalAddStep, Some(QuestionMetadata::MentalStep { tens_part, ones_part, .. })) => {
            Box::new(MentalAddPad::new(*tens_part, *ones_part))
        }
        _ => Box::new(NumericPad::new(question.answer.clone())),
    }
}
