/// Don't Press demo — two runs of the button stage. The first player
/// presses and is sent back; the second waits it out.
///
/// Run with: cargo run --example dont_press

use stage_narrator::core::manager::LevelDefinition;
use stage_narrator::core::runtime::{Notice, StageRuntime};
use stage_narrator::core::surface::{Recorder, SurfaceCommand};
use stage_narrator::schema::event::StageEvent;
use stage_narrator::schema::stage::StageDefinition;
use std::time::Duration;

fn main() {
    let stage =
        StageDefinition::load_from_ron(std::path::Path::new("stage_data/stages/dont_press.ron"))
            .expect("Failed to load dont_press stage");

    let recorder = Recorder::new();
    let mut runtime = StageRuntime::builder()
        .with_stage(stage)
        .with_levels(vec![LevelDefinition {
            name: "arcade".to_string(),
            stages: vec!["dont_press".to_string()],
        }])
        .presentation(recorder.clone())
        .build()
        .expect("Failed to build runtime");

    println!("=== Don't Press The Button ===\n");
    report(&recorder, &runtime.start());
    report(&recorder, &runtime.advance(Duration::from_secs(4)));

    println!("\n> player presses the button");
    report(&recorder, &runtime.send(StageEvent::action("press")));
    report(&recorder, &runtime.advance(Duration::from_secs(2)));

    println!("\n> second attempt: player clicks around, then waits");
    report(&recorder, &runtime.advance(Duration::from_secs(4)));
    for _ in 0..3 {
        report(&recorder, &runtime.send(StageEvent::signal("background_click")));
    }

    // Waiting lets the whole B -> D -> E chain play out on its own
    for _ in 0..30 {
        report(&recorder, &runtime.advance(Duration::from_secs(1)));
        if runtime.is_finished() {
            break;
        }
    }
}

fn report(recorder: &Recorder, notices: &[Notice]) {
    for command in recorder.drain() {
        match command {
            SurfaceCommand::Line(text) => println!("  NARRATOR: {}", text),
            SurfaceCommand::Show(e) => println!("  [show] {}", e),
            SurfaceCommand::Hide(e) => println!("  [hide] {}", e),
            _ => {}
        }
    }
    for notice in notices {
        println!("  {:?}", notice);
    }
}
