/// Authored content tests — every shipped RON file loads and hangs together.

use stage_narrator::core::manager::LevelDefinition;
use stage_narrator::core::runtime::StageRuntime;
use stage_narrator::core::wordle::{Wordle, WordleConfig};
use stage_narrator::schema::stage::{Difficulty, StageDefinition, ANY_STATE};
use std::path::Path;

fn stage_files() -> Vec<std::path::PathBuf> {
    let mut paths: Vec<_> = std::fs::read_dir("stage_data/stages")
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("ron"))
        .collect();
    paths.sort();
    paths
}

#[test]
fn every_stage_file_loads_and_validates() {
    let paths = stage_files();
    assert_eq!(paths.len(), 6);
    for path in paths {
        let stage = StageDefinition::load_from_ron(&path)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        // File name matches the stage id
        let stem = path.file_stem().unwrap().to_str().unwrap();
        assert_eq!(stage.id, stem);
        assert!(stage.terminal.is_some(), "{} never completes", stage.id);
    }
}

#[test]
fn every_non_terminal_state_has_a_way_out() {
    for path in stage_files() {
        let stage = StageDefinition::load_from_ron(&path).unwrap();
        for state in &stage.states {
            if stage.is_terminal(state) {
                continue;
            }
            let leaves = stage
                .transitions
                .iter()
                .any(|t| t.from.iter().any(|f| f == state || f == ANY_STATE));
            assert!(leaves, "{}: state {} is a dead end", stage.id, state);
        }
    }
}

#[test]
fn levels_reference_shipped_stages() {
    let levels = LevelDefinition::load_list_from_ron(Path::new("stage_data/levels.ron")).unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].stages, vec!["claw", "dont_press"]);

    let runtime = StageRuntime::builder()
        .stages_dir("stage_data/stages")
        .levels_path("stage_data/levels.ron")
        .build()
        .unwrap();
    assert!(runtime.stage_definition("minesweeper.easy").is_some());
    assert!(runtime.stage_definition("minesweeper.hard").is_some());
    assert!(runtime.stage_definition("minesweeper").is_none());
}

#[test]
fn wordle_config_matches_difficulties() {
    let config = WordleConfig::load_from_ron(Path::new("stage_data/wordle.ron")).unwrap();
    let easy = Wordle::from_config(&config, Difficulty::Easy).unwrap();
    let hard = Wordle::from_config(&config, Difficulty::Hard).unwrap();
    assert_eq!(easy.rows_allowed(), 6);
    assert_eq!(hard.rows_allowed(), 4);
}
