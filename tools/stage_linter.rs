/// Stage Linter — validates stage tables and reports authoring mistakes.
///
/// Usage: stage_linter <stages_dir|stage_file> [--levels <levels.ron>]

use stage_narrator::core::manager::LevelDefinition;
use stage_narrator::schema::stage::{Difficulty, Effect, StageDefinition, ANY_STATE};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: stage_linter <stages_dir|stage_file> [--levels <levels.ron>]");
        process::exit(0);
    }

    let stages_path = Path::new(&args[1]);
    let mut levels_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--levels" && i + 1 < args.len() {
            i += 1;
            levels_path = Some(args[i].clone());
        }
        i += 1;
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let files = if stages_path.is_file() {
        vec![stages_path.to_path_buf()]
    } else if stages_path.is_dir() {
        ron_files(stages_path)
    } else {
        eprintln!("ERROR: Path '{}' does not exist", stages_path.display());
        process::exit(1);
    };

    let mut stages: HashMap<String, StageDefinition> = HashMap::new();
    for path in &files {
        match StageDefinition::load_from_ron(path) {
            Ok(stage) => {
                println!("  Loaded: {} ({})", path.display(), stage.id);
                lint_stage(&stage, &mut warnings);
                if stages.contains_key(&stage.id) {
                    errors.push(format!("Stage id '{}' defined twice", stage.id));
                }
                stages.insert(stage.id.clone(), stage);
            }
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }

    println!("Loaded {} stages", stages.len());

    if let Some(ref path) = levels_path {
        match LevelDefinition::load_list_from_ron(Path::new(path)) {
            Ok(levels) => lint_levels(&levels, &stages, &mut errors),
            Err(e) => errors.push(format!("{}: {}", path, e)),
        }
    }

    println!("\n=== Stage Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn ron_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn lint_stage(stage: &StageDefinition, warnings: &mut Vec<String>) {
    let reachable = reachable_states(stage);
    for state in &stage.states {
        if !reachable.contains(state.as_str()) {
            warnings.push(format!(
                "Stage '{}': state '{}' is unreachable from '{}'",
                stage.id, state, stage.initial
            ));
        }
        let has_exit = stage
            .transitions
            .iter()
            .any(|t| t.from.iter().any(|f| f == state || f == ANY_STATE));
        if !stage.is_terminal(state) && !has_exit {
            warnings.push(format!(
                "Stage '{}': state '{}' has no transitions and is not terminal",
                stage.id, state
            ));
        }
    }

    if stage.terminal.is_none() {
        warnings.push(format!("Stage '{}' has no terminal state and never completes", stage.id));
    }

    let used = referenced_scripts(stage);
    let mut names: Vec<&String> = stage.scripts.keys().collect();
    names.sort();
    for name in names {
        if !used.contains(name.as_str()) {
            warnings.push(format!("Stage '{}': script '{}' is never played", stage.id, name));
        }
        if stage.scripts[name].is_empty() {
            warnings.push(format!(
                "Stage '{}': script '{}' is empty and will never report completion",
                stage.id, name
            ));
        }
    }
}

fn reachable_states(stage: &StageDefinition) -> HashSet<&str> {
    let mut reachable: HashSet<&str> = HashSet::new();
    reachable.insert(stage.initial.as_str());
    loop {
        let before = reachable.len();
        for t in &stage.transitions {
            let applies = t
                .from
                .iter()
                .any(|f| f == ANY_STATE || reachable.contains(f.as_str()));
            if let (true, Some(to)) = (applies, t.to.as_deref()) {
                reachable.insert(to);
            }
        }
        if reachable.len() == before {
            return reachable;
        }
    }
}

fn referenced_scripts(stage: &StageDefinition) -> HashSet<&str> {
    let mut used = HashSet::new();
    let effects = stage
        .on_enter
        .iter()
        .chain(stage.transitions.iter().flat_map(|t| t.effects.iter()));
    for effect in effects {
        match effect {
            Effect::Play(name) => {
                used.insert(name.as_str());
            }
            Effect::PlayNth {
                scripts, fallback, ..
            } => {
                used.extend(scripts.iter().map(|s| s.as_str()));
                used.insert(fallback.as_str());
            }
            _ => {}
        }
    }
    used
}

fn lint_levels(
    levels: &[LevelDefinition],
    stages: &HashMap<String, StageDefinition>,
    errors: &mut Vec<String>,
) {
    if levels.is_empty() {
        errors.push("Level list is empty".to_string());
    }
    for level in levels {
        if level.stages.is_empty() {
            errors.push(format!("Level '{}' has no stages", level.name));
        }
        for id in &level.stages {
            let known = stages.contains_key(id)
                || [Difficulty::Easy, Difficulty::Hard]
                    .iter()
                    .any(|d| stages.contains_key(&format!("{}.{}", id, d.suffix())));
            if !known {
                errors.push(format!("Level '{}' refers to unknown stage '{}'", level.name, id));
            }
        }
    }
}
