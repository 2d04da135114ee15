/// Claw Machine demo — the crane drops the doll three times, then the
/// player drags it into the basket by hand.
///
/// Run with: cargo run --example claw_machine

use stage_narrator::core::manager::{LevelDefinition, MemoryProgressStore};
use stage_narrator::core::runtime::{Notice, StageRuntime};
use stage_narrator::core::surface::{Recorder, SurfaceCommand};
use stage_narrator::schema::event::{Interaction, StageEvent};
use stage_narrator::schema::stage::StageDefinition;
use std::time::Duration;

fn main() {
    let claw = StageDefinition::load_from_ron(std::path::Path::new("stage_data/stages/claw.ron"))
        .expect("Failed to load claw stage");

    let recorder = Recorder::new();
    let mut runtime = StageRuntime::builder()
        .with_stage(claw)
        .with_levels(vec![LevelDefinition {
            name: "arcade".to_string(),
            stages: vec!["claw".to_string()],
        }])
        .presentation(recorder.clone())
        .audio(recorder.clone())
        .progress_store(MemoryProgressStore::new())
        .build()
        .expect("Failed to build runtime");

    println!("=== The Claw ===\n");
    report(&recorder, &runtime.start());

    // Sit through the opening and the movement tutorial
    report(&recorder, &runtime.advance(Duration::from_secs(7)));
    println!("-- state: {:?}", runtime.state());

    println!("\n> player presses grab");
    report(&recorder, &runtime.send(StageEvent::action("grab")));

    for n in 1..=3 {
        println!("\n> the crane drops the doll ({})", n);
        report(&recorder, &runtime.send(StageEvent::signal("doll_dropped")));
    }
    report(&recorder, &runtime.advance(Duration::from_secs(4)));

    println!("\n> player waits a while");
    report(&recorder, &runtime.advance(Duration::from_secs(10)));

    println!("\n> player drags the doll into the basket");
    report(
        &recorder,
        &runtime.interact(Interaction::DragStarted {
            object: "doll".to_string(),
        }),
    );
    report(
        &recorder,
        &runtime.interact(Interaction::ObjectEnteredRegion {
            object: "doll".to_string(),
            region: "goal".to_string(),
        }),
    );
    report(&recorder, &runtime.advance(Duration::from_secs(3)));
}

fn report(recorder: &Recorder, notices: &[Notice]) {
    for command in recorder.drain() {
        match command {
            SurfaceCommand::Line(text) => println!("  NARRATOR: {}", text),
            SurfaceCommand::Show(e) => println!("  [show] {}", e),
            SurfaceCommand::Hide(e) => println!("  [hide] {}", e),
            SurfaceCommand::Input { surface, enabled } => {
                println!("  [{}] {}", if enabled { "enable" } else { "disable" }, surface)
            }
            SurfaceCommand::Clip(id) => println!("  [audio] {}", id),
            SurfaceCommand::ClearLine => {}
        }
    }
    for notice in notices {
        println!("  {:?}", notice);
    }
}
