/// Collaborator surfaces — presentation and audio boundaries.
///
/// The crate only issues commands across these traits; layout, rendering,
/// and audio decoding live on the other side.

use crate::schema::dialogue::AudioClip;

/// Shows and hides named visual elements and the narrator text box.
pub trait Presentation {
    fn show(&mut self, element: &str);
    fn hide(&mut self, element: &str);
    fn set_input_enabled(&mut self, surface: &str, enabled: bool);
    fn show_line(&mut self, text: &str);
    fn clear_line(&mut self);
}

/// Fire-and-forget clip playback.
pub trait AudioOutput {
    fn play_clip(&mut self, clip: &AudioClip);
}

/// Discards every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl Presentation for NullSurface {
    fn show(&mut self, _element: &str) {}
    fn hide(&mut self, _element: &str) {}
    fn set_input_enabled(&mut self, _surface: &str, _enabled: bool) {}
    fn show_line(&mut self, _text: &str) {}
    fn clear_line(&mut self) {}
}

impl AudioOutput for NullSurface {
    fn play_clip(&mut self, _clip: &AudioClip) {}
}

/// A command that crossed a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
    Show(String),
    Hide(String),
    Input { surface: String, enabled: bool },
    Line(String),
    ClearLine,
    Clip(String),
}

/// Records every command, in order, on a shared log so the caller can
/// inspect it after handing a clone to the runtime.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: std::rc::Rc<std::cell::RefCell<Vec<SurfaceCommand>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<SurfaceCommand> {
        self.log.borrow().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Narrator lines shown so far.
    pub fn lines(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                SurfaceCommand::Line(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether `element` is currently shown according to the log.
    pub fn is_shown(&self, element: &str) -> bool {
        let mut shown = false;
        for c in self.log.borrow().iter() {
            match c {
                SurfaceCommand::Show(e) if e == element => shown = true,
                SurfaceCommand::Hide(e) if e == element => shown = false,
                _ => {}
            }
        }
        shown
    }

    fn push(&self, command: SurfaceCommand) {
        self.log.borrow_mut().push(command);
    }
}

impl Presentation for Recorder {
    fn show(&mut self, element: &str) {
        self.push(SurfaceCommand::Show(element.to_string()));
    }

    fn hide(&mut self, element: &str) {
        self.push(SurfaceCommand::Hide(element.to_string()));
    }

    fn set_input_enabled(&mut self, surface: &str, enabled: bool) {
        self.push(SurfaceCommand::Input {
            surface: surface.to_string(),
            enabled,
        });
    }

    fn show_line(&mut self, text: &str) {
        self.push(SurfaceCommand::Line(text.to_string()));
    }

    fn clear_line(&mut self) {
        self.push(SurfaceCommand::ClearLine);
    }
}

impl AudioOutput for Recorder {
    fn play_clip(&mut self, clip: &AudioClip) {
        self.push(SurfaceCommand::Clip(clip.id.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_clones_share_a_log() {
        let recorder = Recorder::new();
        let mut handle = recorder.clone();
        handle.show("panel");
        handle.show_line("Hello.");
        handle.hide("panel");
        assert_eq!(recorder.commands().len(), 3);
        assert_eq!(recorder.lines(), vec!["Hello.".to_string()]);
        assert!(!recorder.is_shown("panel"));
    }

    #[test]
    fn drain_empties_the_log() {
        let recorder = Recorder::new();
        let mut handle = recorder.clone();
        handle.play_clip(&AudioClip {
            id: "beep".to_string(),
            length: 0.1,
        });
        assert_eq!(recorder.drain(), vec![SurfaceCommand::Clip("beep".to_string())]);
        assert!(recorder.commands().is_empty());
    }
}
