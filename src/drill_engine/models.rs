use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::drill_engine::curriculum::legacy_skill_spec;

/// Inclusive `[min, max]` numeric range as written in curriculum JSON.
pub type Span = [i32; 2];

// ---------------------------------------------------------------------------
// Pool specifications
// ---------------------------------------------------------------------------

/// Optional filter bag shared by most arithmetic pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_min: Option<i32>,
    pub ones_carry: bool,
    pub ones_no_carry: bool,
    pub borrow: bool,
    pub no_borrow: bool,
    pub must_contain_make10_pair: bool,
    pub fixed_order: bool,
}

impl Constraints {
    /// `true` when `sum` lies inside the optional `[sumMin, sumMax]` window.
    pub fn sum_ok(&self, sum: i32) -> bool {
        self.sum_min.map_or(true, |min| sum >= min) && self.sum_max.map_or(true, |max| sum <= max)
    }

    /// `true` when `result` lies inside the optional `[resultMin, resultMax]` window.
    pub fn result_ok(&self, result: i32) -> bool {
        self.result_min.map_or(true, |min| result >= min)
            && self.result_max.map_or(true, |max| result <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenComplementPool {
    pub numbers: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPairsPool {
    pub a_range: Span,
    pub b_range: Span,
    #[serde(default)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreeNumberTemplate {
    /// A make-10 pair is shown next to each other, plus a third addend.
    Make10Visible,
    /// The learner has to spot the make-10 pair.
    Make10Find,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddThreeNumbersPool {
    pub template: ThreeNumberTemplate,
    #[serde(default)]
    pub pairs: Vec<[i32; 2]>,
    #[serde(default)]
    pub third_range: Option<Span>,
    #[serde(default)]
    pub a_range: Option<Span>,
    #[serde(default)]
    pub b_range: Option<Span>,
    #[serde(default)]
    pub c_range: Option<Span>,
    #[serde(default)]
    pub constraints: Constraints,
}

/// Stair drills (addition and subtraction): a fixed base against a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StairPool {
    pub base_numbers: Vec<i32>,
    pub top_row_length: i32,
}

/// Two-digit and one-digit operand ranges (`add_2d_1d`, `add_1d_2d`, `sub_2d_1d`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedWidthPool {
    pub two_digit_range: Span,
    pub one_digit_range: Span,
    #[serde(default)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureVariant {
    /// Only the split is practised; the round ends on the remainder.
    SplitOnly,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarryProcedurePool {
    #[serde(default)]
    pub variant: Option<ProcedureVariant>,
    pub a_range: Span,
    pub b_range: Span,
    #[serde(default)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedSetPool {
    pub set_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPairsPool {
    pub minuend_range: Span,
    pub subtrahend_range: Span,
    #[serde(default)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowProcedurePool {
    pub minuend_range: Span,
    pub subtrahend_range: Span,
    #[serde(default)]
    pub variant: Option<ProcedureVariant>,
}

/// `base - a + b`, e.g. `10 - 8 + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAddMixedPool {
    #[serde(default = "default_base")]
    pub base: i32,
    pub subtrahend_range: Span,
    pub addend_range: Span,
}

fn default_base() -> i32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCountPool {
    pub step: i32,
    pub from: i32,
    pub to: i32,
    #[serde(default)]
    pub blanks: usize,
    /// Values printed in the sequence; defaults to `[from, to]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_numbers: Option<Vec<i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevAddPool {
    pub add: i32,
    pub start: i32,
    pub steps_range: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    Both,
    AddToMul,
    MulToAdd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulLinkPool {
    pub n: i32,
    pub range: Span,
    pub direction: LinkDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOrder {
    Asc,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulTablePool {
    pub n: i32,
    pub range: Span,
    #[serde(default)]
    pub order: Option<TableOrder>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDistribution {
    #[serde(default)]
    pub min_per_n: Option<usize>,
    #[serde(default)]
    pub rest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulReviewPool {
    pub from_n: i32,
    pub to_n: i32,
    pub range: Span,
    #[serde(default)]
    pub distribution: Option<ReviewDistribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulMixPool {
    pub from_n: i32,
    pub to_n: i32,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipTapPool {
    pub step: i32,
    pub from: i32,
    pub to: i32,
    #[serde(default)]
    pub total_numbers: Option<usize>,
    #[serde(default)]
    pub time_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceValue2dPool {
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceValue3dPool {
    pub range: Span,
    /// Bias toward numbers like 405 (zero in the tens place).
    #[serde(default)]
    pub include_zero_middle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFillFormat {
    PlaceLower,
    DragAlign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenFormFillPool {
    pub operand_a_range: Span,
    pub operand_b_range: Span,
    pub format: FormFillFormat,
}

/// Misalignments offered as wrong layouts in a written-form choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutError {
    RightShift,
    LeftShift,
    BlankShift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenFormChoicePool {
    pub operand_a_range: Span,
    pub operand_b_range: Span,
    #[serde(default)]
    pub error_types: Vec<LayoutError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOrder {
    OnesFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenAddPool {
    pub a_range: Span,
    pub b_range: Span,
    #[serde(default)]
    pub carry_required: bool,
    #[serde(default)]
    pub no_carry: bool,
    #[serde(default)]
    pub input_order: Option<InputOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarryMarkTapPool {
    pub a_range: Span,
    pub b_range: Span,
    /// Share of questions that should need a carry (0..=1).
    #[serde(default)]
    pub carry_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentalAddStepPool {
    pub a_range: Span,
    pub b_range: Span,
    #[serde(default)]
    pub step_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyType {
    SubtractA,
    SubtractB,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenVerifyPool {
    pub a_range: Span,
    pub b_range: Span,
    pub verify_type: VerifyType,
}

/// One weighted alternative of a composite pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedChoice {
    pub spec: PoolSpec,
    pub weight: f64,
}

/// Weighted mix of sub-pools.
///
/// Serialises as `{ "choices": [...] }`. Deserialisation also accepts the two
/// legacy encodings found in older curriculum files and converts them on load:
/// parallel `includes: PoolSpec[]` / `weights: number[]`, and named
/// `weights: { "NUM10_MAKE": 2, ... }` resolved through the legacy skill table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CompositeWire")]
pub struct CompositePool {
    pub choices: Vec<WeightedChoice>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CompositeWire {
    Unified {
        choices: Vec<WeightedChoice>,
    },
    Parallel {
        includes: Vec<PoolSpec>,
        weights: Vec<f64>,
    },
    Named {
        #[serde(default)]
        #[allow(dead_code)]
        includes: Vec<String>,
        weights: BTreeMap<String, f64>,
    },
}

impl From<CompositeWire> for CompositePool {
    fn from(wire: CompositeWire) -> Self {
        let choices = match wire {
            CompositeWire::Unified { choices } => choices,
            CompositeWire::Parallel { includes, weights } => includes
                .into_iter()
                .zip(weights)
                .map(|(spec, weight)| WeightedChoice { spec, weight })
                .collect(),
            CompositeWire::Named { weights, .. } => weights
                .into_iter()
                .filter_map(|(name, weight)| match legacy_skill_spec(&name) {
                    Some(spec) => Some(WeightedChoice { spec, weight }),
                    None => {
                        tracing::warn!(target: "curriculum", skill = %name, "Unknown legacy composite skill dropped.");
                        None
                    }
                })
                .collect(),
        };
        CompositePool { choices }
    }
}

/// Declarative generation recipe, selected by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolSpec {
    TenComplement(TenComplementPool),
    AddPairs(AddPairsPool),
    AddThreeNumbers(AddThreeNumbersPool),
    StairAddition(StairPool),
    #[serde(rename = "add_2d_1d")]
    Add2d1d(MixedWidthPool),
    #[serde(rename = "add_1d_2d")]
    Add1d2d(MixedWidthPool),
    Composite(CompositePool),
    AddCarryProcedure(CarryProcedurePool),
    FixedSet(FixedSetPool),
    FixedSetRandom(FixedSetPool),
    SubPairs(SubPairsPool),
    SubBorrowProcedure(BorrowProcedurePool),
    SubStair(StairPool),
    #[serde(rename = "sub_2d_1d")]
    Sub2d1d(MixedWidthPool),
    SubAddMixed(SubAddMixedPool),
    SkipCount(SkipCountPool),
    ElevAdd(ElevAddPool),
    MulLink(MulLinkPool),
    MulTable(MulTablePool),
    MulReview(MulReviewPool),
    MulMix(MulMixPool),
    SkipTap(SkipTapPool),
    #[serde(rename = "place_value_2d")]
    PlaceValue2d(PlaceValue2dPool),
    #[serde(rename = "place_value_3d")]
    PlaceValue3d(PlaceValue3dPool),
    WrittenFormFill(WrittenFormFillPool),
    WrittenFormChoice(WrittenFormChoicePool),
    #[serde(rename = "written_add_2d2d")]
    WrittenAdd2d2d(WrittenAddPool),
    WrittenAdd(WrittenAddPool),
    CarryMarkTap(CarryMarkTapPool),
    MentalAddStep(MentalAddStepPool),
    WrittenVerify(WrittenVerifyPool),
    /// Any tag this build does not know; generates nothing.
    #[serde(other)]
    Unsupported,
}

impl PoolSpec {
    /// The wire tag, used in ids and log fields.
    pub fn type_name(&self) -> &'static str {
        match self {
            PoolSpec::TenComplement(_)      => "ten_complement",
            PoolSpec::AddPairs(_)           => "add_pairs",
            PoolSpec::AddThreeNumbers(_)    => "add_three_numbers",
            PoolSpec::StairAddition(_)      => "stair_addition",
            PoolSpec::Add2d1d(_)            => "add_2d_1d",
            PoolSpec::Add1d2d(_)            => "add_1d_2d",
            PoolSpec::Composite(_)          => "composite",
            PoolSpec::AddCarryProcedure(_)  => "add_carry_procedure",
            PoolSpec::FixedSet(_)           => "fixed_set",
            PoolSpec::FixedSetRandom(_)     => "fixed_set_random",
            PoolSpec::SubPairs(_)           => "sub_pairs",
            PoolSpec::SubBorrowProcedure(_) => "sub_borrow_procedure",
            PoolSpec::SubStair(_)           => "sub_stair",
            PoolSpec::Sub2d1d(_)            => "sub_2d_1d",
            PoolSpec::SubAddMixed(_)        => "sub_add_mixed",
            PoolSpec::SkipCount(_)          => "skip_count",
            PoolSpec::ElevAdd(_)            => "elev_add",
            PoolSpec::MulLink(_)            => "mul_link",
            PoolSpec::MulTable(_)           => "mul_table",
            PoolSpec::MulReview(_)          => "mul_review",
            PoolSpec::MulMix(_)             => "mul_mix",
            PoolSpec::SkipTap(_)            => "skip_tap",
            PoolSpec::PlaceValue2d(_)       => "place_value_2d",
            PoolSpec::PlaceValue3d(_)       => "place_value_3d",
            PoolSpec::WrittenFormFill(_)    => "written_form_fill",
            PoolSpec::WrittenFormChoice(_)  => "written_form_choice",
            PoolSpec::WrittenAdd2d2d(_)     => "written_add_2d2d",
            PoolSpec::WrittenAdd(_)         => "written_add",
            PoolSpec::CarryMarkTap(_)       => "carry_mark_tap",
            PoolSpec::MentalAddStep(_)      => "mental_add_step",
            PoolSpec::WrittenVerify(_)      => "written_verify",
            PoolSpec::Unsupported           => "unsupported",
        }
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// How the question is answered; selects the input pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Input,
    /// Step-by-step make-10 / genka-hou procedure.
    Fill,
    Tap,
    PlaceValue,
    WrittenFormFill,
    WrittenFormChoice,
    WrittenAdd,
    CarryMarkTap,
    WrittenVerify,
    MentalAddStep,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionKind::Input             => "input",
            QuestionKind::Fill              => "fill",
            QuestionKind::Tap               => "tap",
            QuestionKind::PlaceValue        => "place_value",
            QuestionKind::WrittenFormFill   => "written_form_fill",
            QuestionKind::WrittenFormChoice => "written_form_choice",
            QuestionKind::WrittenAdd        => "written_add",
            QuestionKind::CarryMarkTap      => "carry_mark_tap",
            QuestionKind::WrittenVerify     => "written_verify",
            QuestionKind::MentalAddStep     => "mental_add_step",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutChoice {
    /// `None` marks the correctly aligned layout.
    pub error: Option<LayoutError>,
    pub is_correct: bool,
}

/// Variant-specific payload consumed by the view layer and the input pads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum QuestionMetadata {
    Items {
        items: Vec<i32>,
    },
    CarryProcedure {
        split_host: i32,
        split_guest: i32,
        complement: i32,
        remainder: i32,
        mode: Option<ProcedureVariant>,
    },
    BorrowProcedure {
        minuend: i32,
        subtrahend: i32,
        split_host: i32,
        split_guest: i32,
        step1: i32,
        step2: i32,
        mode: Option<ProcedureVariant>,
    },
    Stair {
        row: Vec<i32>,
        operator: char,
        base: i32,
    },
    SkipCount {
        step: i32,
        sequence: Vec<i32>,
        blank_index: usize,
        show_numbers: Vec<i32>,
    },
    Elevator {
        step: i32,
        addend: i32,
    },
    MulLink {
        n: i32,
        multiplier: i32,
        direction: LinkDirection,
    },
    MulFact {
        n: i32,
        m: i32,
    },
    SkipTap {
        step: i32,
        from: i32,
        to: i32,
        total_numbers: usize,
        time_limit: u32,
        board: Vec<i32>,
    },
    PlaceValue {
        number: i32,
        hundreds: Option<i32>,
        tens: i32,
        ones: i32,
        has_zero_middle: bool,
    },
    FormFill {
        format: FormFillFormat,
        top_number: i32,
        bottom_number: i32,
        top_digits: Vec<u8>,
        bottom_digits: Vec<u8>,
    },
    FormChoice {
        top_number: i32,
        bottom_number: i32,
        choices: Vec<LayoutChoice>,
        correct_index: usize,
    },
    WrittenAdd {
        a: i32,
        b: i32,
        sum: i32,
        a_ones: i32,
        a_tens: i32,
        b_ones: i32,
        b_tens: i32,
        ones_sum: i32,
        tens_sum: i32,
        has_carry: bool,
        carry_value: i32,
        answer_ones: i32,
        answer_tens: i32,
        answer_hundreds: Option<i32>,
        input_order: InputOrder,
    },
    CarryMark {
        a: i32,
        b: i32,
        has_carry: bool,
    },
    WrittenVerify {
        top: i32,
        bottom: i32,
        expected_answer: i32,
    },
    MentalStep {
        a: i32,
        b: i32,
        tens_part: i32,
        ones_part: i32,
        has_carry: bool,
    },
}

/// One generated drill item. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Unique within one generated batch.
    pub id: String,
    pub text: String,
    /// Canonical string form of the expected response.
    pub answer: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<QuestionMetadata>,
    #[serde(default)]
    pub is_review: bool,
}

/// One answered question inside a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question: Question,
    pub user_answer: String,
    pub is_correct: bool,
    /// Seconds spent on the question.
    pub time_taken: f64,
}

// ---------------------------------------------------------------------------
// Curriculum
// ---------------------------------------------------------------------------

/// Ordering / interaction policy of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageMode {
    Seq,
    Rnd,
    Mix,
    Fill,
    Set,
    Grid,
}

impl StageMode {
    /// Question order is shuffled for these modes.
    pub fn shuffles(self) -> bool {
        matches!(self, StageMode::Rnd | StageMode::Mix)
    }

    /// Sequential and fill-in stages are never diluted with review items.
    pub fn accepts_review(self) -> bool {
        !matches!(self, StageMode::Seq | StageMode::Fill)
    }
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageMode::Seq  => "SEQ",
            StageMode::Rnd  => "RND",
            StageMode::Mix  => "MIX",
            StageMode::Fill => "FILL",
            StageMode::Set  => "SET",
            StageMode::Grid => "GRID",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassOverride {
    #[serde(default)]
    pub accuracy: Option<u32>,
    #[serde(default)]
    pub consecutive_passes_required: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfig {
    pub questions: usize,
    pub sec_per_question: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_override: Option<PassOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCompletion {
    #[serde(default)]
    pub unlock_tracks: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One node of the progression graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub skill_id: String,
    pub mode: StageMode,
    pub pool_spec: PoolSpec,
    pub round: RoundConfig,
    #[serde(default)]
    pub next_stage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<StageCompletion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassRule {
    /// Minimum accuracy in percent.
    pub accuracy: u32,
    #[serde(default)]
    pub must_finish_within_time: bool,
    pub consecutive_passes_required: u32,
}

impl Default for PassRule {
    fn default() -> Self {
        Self { accuracy: 80, must_finish_within_time: false, consecutive_passes_required: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRule {
    pub default_questions_per_round: usize,
    pub max_same_item_streak: usize,
}

impl Default for RoundRule {
    fn default() -> Self {
        Self { default_questions_per_round: 10, max_same_item_streak: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakInjectionRule {
    pub enabled: bool,
    pub inject_ratio: f64,
    pub min_injected_per_round: usize,
    pub max_injected_per_round: usize,
    pub promote_to_weak_mini_stage_after_same_mistake_count: u32,
}

impl Default for WeakInjectionRule {
    fn default() -> Self {
        Self {
            enabled: false,
            inject_ratio: 0.3,
            min_injected_per_round: 0,
            max_injected_per_round: 3,
            promote_to_weak_mini_stage_after_same_mistake_count: 3,
        }
    }
}

/// Curriculum-wide, read-only policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRules {
    pub pass: PassRule,
    #[serde(default)]
    pub round: RoundRule,
    #[serde(default)]
    pub weak_injection: WeakInjectionRule,
}

impl GlobalRules {
    /// Accuracy threshold for `stage`, honouring its pass override.
    pub fn pass_accuracy(&self, stage: &Stage) -> u32 {
        stage
            .round
            .pass_override
            .as_ref()
            .and_then(|o| o.accuracy)
            .unwrap_or(self.pass.accuracy)
    }

    /// Consecutive passes needed to unlock the successor of `stage`.
    pub fn passes_required(&self, stage: &Stage) -> u32 {
        stage
            .round
            .pass_override
            .as_ref()
            .and_then(|o| o.consecutive_passes_required)
            .unwrap_or(self.pass.consecutive_passes_required)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageGraph {
    pub start_stage_id: String,
    pub stages: Vec<Stage>,
}

/// One independently-authored track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub version: String,
    pub domain: String,
    pub track: String,
    pub title: String,
    pub global_rules: GlobalRules,
    pub stage_graph: StageGraph,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Per-stage mastery record. `unlocked` and `cleared` never go back to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    pub stage_id: String,
    pub consecutive_passes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_time_sec: Option<f64>,
    pub unlocked: bool,
    pub cleared: bool,
}

impl StageProgress {
    pub fn locked(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            consecutive_passes: 0,
            best_time_sec: None,
            unlocked: false,
            cleared: false,
        }
    }

    pub fn unlocked(stage_id: impl Into<String>) -> Self {
        Self { unlocked: true, ..Self::locked(stage_id) }
    }
}

/// A missed question kept for spaced review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakQuestion {
    pub question_id: String,
    pub mistake_count: u32,
    /// Milliseconds since the Unix epoch.
    pub last_mistake_at: i64,
    pub solved_count: u32,
    pub data: Question,
}

impl WeakQuestion {
    /// Fresh record for a question missed at `now` (epoch ms).
    pub fn first_miss(question: &Question, now: i64) -> Self {
        Self {
            question_id: question.id.clone(),
            mistake_count: 1,
            last_mistake_at: now,
            solved_count: 0,
            data: question.clone(),
        }
    }
}

/// The whole persisted unit: read, mutated and rewritten in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub current_track_id: String,
    pub current_stage_id: String,
    pub stage_progress_map: BTreeMap<String, StageProgress>,
    #[serde(default)]
    pub weak_set: Vec<WeakQuestion>,
    /// Milliseconds since the Unix epoch.
    pub last_played_at: i64,
}

pub const DEFAULT_TRACK_ID: &str = "ES_G1_ADD";
pub const DEFAULT_STAGE_ID: &str = "G1A_NUM10_MAKE_SEQ_1_5";

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            current_track_id: DEFAULT_TRACK_ID.to_string(),
            current_stage_id: DEFAULT_STAGE_ID.to_string(),
            stage_progress_map: BTreeMap::new(),
            weak_set: Vec::new(),
            last_played_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl UserProgress {
    pub fn stage(&self, stage_id: &str) -> Option<&StageProgress> {
        self.stage_progress_map.get(stage_id)
    }

    pub fn is_unlocked(&self, stage_id: &str) -> bool {
        self.stage(stage_id).map_or(false, |p| p.unlocked)
    }
}
