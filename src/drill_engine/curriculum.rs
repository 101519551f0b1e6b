//! Curriculum loading and merging.
//!
//! Four tracks ship inside the binary (`curricula/*.json`). Extra tracks can
//! be parsed from any JSON string or file with the same shape. Several tracks
//! merge into one [`MergedCurriculum`]: a flat stage list addressable by id,
//! one shared [`GlobalRules`] (the first track's), and every track's start
//! stage.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::drill_engine::{
    error::{DrillError, Result},
    models::{
        AddPairsPool, AddThreeNumbersPool, Constraints, Curriculum, GlobalRules, MixedWidthPool,
        PoolSpec, Stage, TenComplementPool, ThreeNumberTemplate,
    },
};

/// Built-in track ids, in default load order.
pub const BUILTIN_TRACKS: [&str; 4] = ["ES_G1_ADD", "ES_G1_SUB", "ES_G2_MUL", "ES_G2_ADD_WRITTEN"];

fn builtin_source(track_id: &str) -> Option<&'static str> {
    match track_id {
        "ES_G1_ADD"         => Some(include_str!("../../curricula/es_g1_add.json")),
        "ES_G1_SUB"         => Some(include_str!("../../curricula/es_g1_sub.json")),
        "ES_G2_MUL"         => Some(include_str!("../../curricula/es_g2_mul.json")),
        "ES_G2_ADD_WRITTEN" => Some(include_str!("../../curricula/es_g2_add_written.json")),
        _ => None,
    }
}

/// Load a built-in track. Unknown ids are a configuration error.
pub fn load_curriculum(track_id: &str) -> Result<Curriculum> {
    let source = builtin_source(track_id).ok_or_else(|| DrillError::UnknownTrack(track_id.to_string()))?;
    let curriculum = parse_curriculum(source)?;
    debug!(target: "curriculum", track_id, stages = curriculum.stage_graph.stages.len(), "Loaded built-in track.");
    Ok(curriculum)
}

pub fn parse_curriculum(json: &str) -> Result<Curriculum> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_curriculum_file(path: &Path) -> Result<Curriculum> {
    let json = std::fs::read_to_string(path)?;
    let curriculum = parse_curriculum(&json)?;
    info!(target: "curriculum", path = %path.display(), track = %curriculum.track, "Loaded curriculum file.");
    Ok(curriculum)
}

/// Several tracks flattened into one stage collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCurriculum {
    /// Taken from the first track.
    pub global_rules: GlobalRules,
    pub stages: Vec<Stage>,
    /// One per track, in load order.
    pub start_stage_ids: Vec<String>,
    pub track_ids: Vec<String>,
    /// Stage id → owning track id.
    pub stage_tracks: BTreeMap<String, String>,
}

impl MergedCurriculum {
    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.id.as_str())
    }

    pub fn track_of(&self, stage_id: &str) -> Option<&str> {
        self.stage_tracks.get(stage_id).map(String::as_str)
    }

    /// Start stage of a loaded track.
    pub fn start_stage_of(&self, track_id: &str) -> Option<&str> {
        self.track_ids
            .iter()
            .zip(&self.start_stage_ids)
            .find(|(t, _)| t.as_str() == track_id)
            .map(|(_, s)| s.as_str())
    }
}

/// Concatenate stage lists. Fails on an empty input or a stage id shared by
/// two tracks.
pub fn merge_curricula(curricula: Vec<Curriculum>) -> Result<MergedCurriculum> {
    let global_rules = curricula.first().ok_or(DrillError::NoTracks)?.global_rules.clone();

    let mut merged = MergedCurriculum {
        global_rules,
        stages: Vec::new(),
        start_stage_ids: Vec::new(),
        track_ids: Vec::new(),
        stage_tracks: BTreeMap::new(),
    };
    for curriculum in curricula {
        for stage in curriculum.stage_graph.stages {
            if merged.stage_tracks.contains_key(&stage.id) {
                return Err(DrillError::DuplicateStage(stage.id));
            }
            merged.stage_tracks.insert(stage.id.clone(), curriculum.track.clone());
            merged.stages.push(stage);
        }
        merged.start_stage_ids.push(curriculum.stage_graph.start_stage_id);
        merged.track_ids.push(curriculum.track);
    }
    info!(
        target: "curriculum",
        tracks = merged.track_ids.len(),
        stages = merged.stages.len(),
        "Merged curricula."
    );
    Ok(merged)
}

/// Load and merge built-in tracks in the given order.
pub fn load_tracks<S: AsRef<str>>(track_ids: &[S]) -> Result<MergedCurriculum> {
    let curricula = track_ids
        .iter()
        .map(|id| load_curriculum(id.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    merge_curricula(curricula)
}

/// Pool recipe behind a legacy composite skill name.
pub fn legacy_skill_spec(name: &str) -> Option<PoolSpec> {
    let one_digit: [i32; 2] = [1, 9];
    let spec = match name {
        "NUM10_MAKE" => PoolSpec::TenComplement(TenComplementPool { numbers: (1..=9).collect() }),
        "ADD_1D_NO_CARRY" => PoolSpec::AddPairs(AddPairsPool {
            a_range: one_digit,
            b_range: one_digit,
            constraints: Constraints { sum_max: Some(9), ..Constraints::default() },
        }),
        "ADD_1D_CARRY" => PoolSpec::AddPairs(AddPairsPool {
            a_range: one_digit,
            b_range: one_digit,
            constraints: Constraints { sum_min: Some(10), ..Constraints::default() },
        }),
        "ADD_3NUM_MAKE10" => PoolSpec::AddThreeNumbers(AddThreeNumbersPool {
            template: ThreeNumberTemplate::Mixed,
            pairs: Vec::new(),
            third_range: None,
            a_range: Some(one_digit),
            b_range: Some(one_digit),
            c_range: Some(one_digit),
            constraints: Constraints::default(),
        }),
        "ADD_2D1D" => PoolSpec::Add2d1d(MixedWidthPool {
            two_digit_range: [11, 19],
            one_digit_range: one_digit,
            constraints: Constraints { sum_max: Some(28), ..Constraints::default() },
        }),
        _ => return None,
    };
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::models::StageMode;

    #[test]
    fn every_builtin_track_loads() {
        for id in BUILTIN_TRACKS {
            let c = load_curriculum(id).unwrap();
            assert_eq!(c.track, id);
            let start = &c.stage_graph.start_stage_id;
            assert!(c.stage_graph.stages.iter().any(|s| &s.id == start), "{id}: start stage missing");
            for stage in &c.stage_graph.stages {
                assert!(!matches!(stage.pool_spec, PoolSpec::Unsupported), "{}: unsupported pool", stage.id);
                if let Some(next) = &stage.next_stage_id {
                    assert!(c.stage_graph.stages.iter().any(|s| &s.id == next), "{}: dangling next", stage.id);
                }
            }
        }
    }

    #[test]
    fn unknown_track_is_an_error() {
        assert!(matches!(load_curriculum("NOPE"), Err(DrillError::UnknownTrack(id)) if id == "NOPE"));
    }

    #[test]
    fn merge_keeps_every_start_stage() {
        let merged = load_tracks(&BUILTIN_TRACKS).unwrap();
        assert_eq!(merged.start_stage_ids.len(), 4);
        assert_eq!(merged.start_stage_ids[0], "G1A_NUM10_MAKE_SEQ_1_5");
        for id in &merged.start_stage_ids {
            assert!(merged.stage(id).is_some());
        }
        assert_eq!(merged.track_of("G2M_SKIP_COUNT_2"), Some("ES_G2_MUL"));
        assert_eq!(merged.start_stage_of("ES_G1_SUB"), Some("G1S_SUB_WITHIN_10_SEQ"));
    }

    #[test]
    fn merge_rejects_duplicate_stage_ids() {
        let a = load_curriculum("ES_G1_ADD").unwrap();
        let b = a.clone();
        assert!(matches!(merge_curricula(vec![a, b]), Err(DrillError::DuplicateStage(_))));
        assert!(matches!(merge_curricula(Vec::new()), Err(DrillError::NoTracks)));
    }

    #[test]
    fn legacy_composite_resolves_named_skills() {
        let c = load_curriculum("ES_G1_ADD").unwrap();
        let mix = c.stage_graph.stages.iter().find(|s| s.mode == StageMode::Mix).unwrap();
        let PoolSpec::Composite(pool) = &mix.pool_spec else { panic!("expected composite") };
        assert_eq!(pool.choices.len(), 5);
        assert!(pool.choices.iter().all(|c| c.weight > 0.0));
    }

    #[test]
    fn parallel_and_unified_composites_parse() {
        let json = r#"{"type":"composite","includes":[{"type":"ten_complement","numbers":[1]}],"weights":[2]}"#;
        let spec: PoolSpec = serde_json::from_str(json).unwrap();
        let PoolSpec::Composite(pool) = spec else { panic!("expected composite") };
        assert_eq!(pool.choices[0].weight, 2.0);

        let json = r#"{"type":"composite","includes":["NUM10_MAKE","BOGUS"],"weights":{"NUM10_MAKE":1,"BOGUS":4}}"#;
        let spec: PoolSpec = serde_json::from_str(json).unwrap();
        let PoolSpec::Composite(pool) = spec else { panic!("expected composite") };
        assert_eq!(pool.choices.len(), 1, "unknown legacy names are dropped");
    }

    #[test]
    fn unknown_pool_type_still_loads() {
        let spec: PoolSpec = serde_json::from_str(r#"{"type":"long_division","digits":3}"#).unwrap();
        assert_eq!(spec, PoolSpec::Unsupported);
    }
}
