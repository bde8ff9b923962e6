//! Interactive pose preview
//!
//! Event-driven navigation over a library: up/down steps through the active
//! book's poses, left/right steps through books, and the newly selected pose
//! is shown solo on the rig after every step. Any other key press, a mode
//! change, or the pointer leaving the viewport ends the session.

use crate::error::{PoseLibError, Result};
use crate::model::PoseLibrary;
use crate::rig::Rig;

/// Input delivered to a running preview
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewEvent {
    /// Up arrow, page up, wheel up
    PoseUp,
    /// Down arrow, page down, wheel down
    PoseDown,
    /// Left arrow, end
    BookPrev,
    /// Right arrow, home
    BookNext,
    /// Any other key press
    OtherKey,
    /// Non-press input (mouse move, key release); ignored
    Idle,
    /// Host left pose mode
    ModeChanged,
    /// Pointer left the viewport
    PointerLeft,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewState {
    /// Event consumed, preview keeps running
    Running,
    /// Event not for us, preview keeps running
    PassThrough,
    /// Preview ended
    Finished,
}

pub struct PreviewSession<'a, R: Rig + ?Sized> {
    library: &'a mut PoseLibrary,
    rig: &'a mut R,
    finished: bool,
}

impl<'a, R: Rig + ?Sized> PreviewSession<'a, R> {
    /// Show the active pose of the active book and start navigating
    pub fn start(library: &'a mut PoseLibrary, rig: &'a mut R) -> Result<Self> {
        if library.active_book().is_none() {
            return Err(PoseLibError::NoActiveBook);
        }
        let mut session = Self {
            library,
            rig,
            finished: false,
        };
        session.show_active()?;
        Ok(session)
    }

    fn show_active(&mut self) -> Result<()> {
        let book = self.library.active_book_mut().ok_or(PoseLibError::NoActiveBook)?;
        let index = book.active_pose_index();
        book.apply_single_pose(index, self.rig)
    }

    pub fn handle(&mut self, event: PreviewEvent) -> Result<PreviewState> {
        if self.finished {
            return Ok(PreviewState::Finished);
        }

        match event {
            PreviewEvent::PoseUp | PreviewEvent::PoseDown => {
                let book = self.library.active_book_mut().ok_or(PoseLibError::NoActiveBook)?;
                let current = book.active_pose_index().unwrap_or(0);
                let next = match event {
                    PreviewEvent::PoseUp => current.saturating_sub(1),
                    _ => current + 1,
                };
                book.set_active_pose_index(Some(next));
            }
            PreviewEvent::BookPrev | PreviewEvent::BookNext => {
                let current = self.library.active_book_index().unwrap_or(0);
                let next = match event {
                    PreviewEvent::BookPrev => current.saturating_sub(1),
                    _ => current + 1,
                };
                self.library.set_active_book_index(Some(next));
            }
            PreviewEvent::Idle => return Ok(PreviewState::PassThrough),
            PreviewEvent::OtherKey | PreviewEvent::ModeChanged | PreviewEvent::PointerLeft => {
                self.finished = true;
                return Ok(PreviewState::Finished);
            }
        }

        self.show_active()?;
        Ok(PreviewState::Running)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Status lines for an on-screen overlay, top to bottom
    pub fn overlay(&self) -> Vec<String> {
        let (book, pose) = match self.library.active_book() {
            Some(book) => (
                book.name().to_string(),
                book.active_pose().map_or("None".to_string(), |p| p.name().to_string()),
            ),
            None => ("None".to_string(), "None".to_string()),
        };
        vec![
            "Pose Preview".to_string(),
            format!("PoseBook: {book}  Pose: {pose}"),
            "Up/Down: Change Pose, Left/Right: Change PoseBook".to_string(),
        ]
    }
}
