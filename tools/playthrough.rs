/// Playthrough — interactive shell for stepping through authored stages.
///
/// Usage: playthrough --stages <dir> --levels <path> [--progress <file>] [--opening <stage>] [--hard]
///
/// Commands:
///   act <kind>              — send a player action
///   signal <kind>           — send an external signal
///   enter <object> <region> — report an object entering a region
///   wait <seconds>          — advance the clock
///   state                   — show stage, state, and progress
///   restart                 — restart the current stage
///   difficulty <easy|hard>  — applies from the next activation
///   help                    — list commands
///   quit                    — exit

use stage_narrator::core::manager::RonProgressStore;
use stage_narrator::core::runtime::{Notice, StageRuntime};
use stage_narrator::core::surface::{AudioOutput, Presentation};
use stage_narrator::schema::dialogue::AudioClip;
use stage_narrator::schema::event::{Interaction, StageEvent};
use stage_narrator::schema::stage::Difficulty;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Prints every surface command to stdout.
struct ConsoleSurface;

impl Presentation for ConsoleSurface {
    fn show(&mut self, element: &str) {
        println!("  [show] {}", element);
    }

    fn hide(&mut self, element: &str) {
        println!("  [hide] {}", element);
    }

    fn set_input_enabled(&mut self, surface: &str, enabled: bool) {
        let verb = if enabled { "enable" } else { "disable" };
        println!("  [{}] {}", verb, surface);
    }

    fn show_line(&mut self, text: &str) {
        println!("  NARRATOR: {}", text);
    }

    fn clear_line(&mut self) {}
}

impl AudioOutput for ConsoleSurface {
    fn play_clip(&mut self, clip: &AudioClip) {
        println!("  [audio] {} ({:.1}s)", clip.id, clip.length);
    }
}

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut stages_dir = None;
    let mut levels_path = None;
    let mut progress_path = None;
    let mut opening = None;
    let mut difficulty = Difficulty::Easy;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stages" if i + 1 < args.len() => {
                i += 1;
                stages_dir = Some(args[i].clone());
            }
            "--levels" if i + 1 < args.len() => {
                i += 1;
                levels_path = Some(args[i].clone());
            }
            "--progress" if i + 1 < args.len() => {
                i += 1;
                progress_path = Some(args[i].clone());
            }
            "--opening" if i + 1 < args.len() => {
                i += 1;
                opening = Some(args[i].clone());
            }
            "--hard" => difficulty = Difficulty::Hard,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (stages_dir, levels_path) = match (stages_dir, levels_path) {
        (Some(s), Some(l)) => (s, l),
        _ => {
            eprintln!("Both --stages and --levels are required");
            print_usage();
            std::process::exit(1);
        }
    };

    let mut builder = StageRuntime::builder()
        .stages_dir(&stages_dir)
        .levels_path(&levels_path)
        .presentation(ConsoleSurface)
        .audio(ConsoleSurface)
        .difficulty(difficulty);
    if let Some(ref path) = progress_path {
        builder = builder.progress_store(RonProgressStore::new(path));
    }
    if let Some(ref stage) = opening {
        builder = builder.opening_stage(stage);
    }

    let mut runtime = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Type 'help' for commands.\n");
    print_notices(&runtime.start());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("stage> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        let notices = match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
                continue;
            }
            "act" if parts.len() >= 2 => runtime.send(StageEvent::action(parts[1])),
            "signal" if parts.len() >= 2 => runtime.send(StageEvent::signal(parts[1])),
            "enter" if parts.len() >= 3 => runtime.interact(Interaction::ObjectEnteredRegion {
                object: parts[1].to_string(),
                region: parts[2].to_string(),
            }),
            "wait" if parts.len() >= 2 => match parse_wait(parts[1]) {
                Some(dt) => runtime.advance(dt),
                None => {
                    println!("Usage: wait <seconds>");
                    continue;
                }
            },
            "state" => {
                print_state(&runtime);
                continue;
            }
            "restart" => runtime.restart(),
            "difficulty" if parts.len() >= 2 => {
                match parts[1] {
                    "easy" => runtime.set_difficulty(Difficulty::Easy),
                    "hard" => runtime.set_difficulty(Difficulty::Hard),
                    other => println!("Unknown difficulty: {}", other),
                }
                continue;
            }
            _ => {
                println!("Unknown command or missing argument. Type 'help'.");
                continue;
            }
        };
        print_notices(&notices);
        if runtime.is_finished() {
            println!("The end.");
            break;
        }
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

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::StageActivated {
                stage,
                instance,
                progress,
            } => println!(
                "== stage '{}' {} (level {}, stage {})",
                stage, instance, progress.level, progress.stage
            ),
            Notice::StageCompleted { stage } => println!("== stage '{}' complete", stage),
            Notice::LevelAdvanced { level } => println!("== level {}", level),
            Notice::GameFinished => println!("== game finished"),
            Notice::FirstLaunch => println!("== first launch"),
            Notice::Command { stage, name } => println!("== '{}' asks host to: {}", stage, name),
        }
    }
}

/// Seconds as typed at the prompt. Rejects anything a `Duration` can't hold.
fn parse_wait(arg: &str) -> Option<Duration> {
    let secs = arg.parse::<f32>().ok()?;
    Duration::try_from_secs_f32(secs).ok()
}

fn print_state(runtime: &StageRuntime) {
    let progress = runtime.progress();
    println!(
        "Stage: {}  State: {}  Level {} / Stage {}  Difficulty: {:?}",
        runtime.active_stage().unwrap_or("-"),
        runtime.state().unwrap_or("-"),
        progress.level,
        progress.stage,
        runtime.difficulty()
    );
    if let Some(narrator) = runtime.narrator() {
        if let Some(line) = narrator.current_line() {
            println!("Narrator: {}", line.text);
        }
    }
    println!("Pending timers: {}", runtime.scheduler().len());
}

fn print_usage() {
    println!(
        "Usage: playthrough --stages <dir> --levels <path> [--progress <file>] [--opening <stage>] [--hard]"
    );
}

fn print_help() {
    println!("Commands:");
    println!("  act <kind>              — send a player action");
    println!("  signal <kind>           — send an external signal");
    println!("  enter <object> <region> — report an object entering a region");
    println!("  wait <seconds>          — advance the clock");
    println!("  state                   — show stage, state, and progress");
    println!("  restart                 — restart the current stage");
    println!("  difficulty <easy|hard>  — applies from the next activation");
    println!("  help                    — list commands");
    println!("  quit                    — exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_accepts_plain_seconds() {
        assert_eq!(parse_wait("2.5"), Some(Duration::from_millis(2500)));
        assert_eq!(parse_wait("0"), Some(Duration::ZERO));
    }

    #[test]
    fn wait_rejects_what_a_duration_cannot_hold() {
        assert_eq!(parse_wait("1e30"), None);
        assert_eq!(parse_wait("-1"), None);
        assert_eq!(parse_wait("NaN"), None);
        assert_eq!(parse_wait("inf"), None);
        assert_eq!(parse_wait("soon"), None);
    }
}
