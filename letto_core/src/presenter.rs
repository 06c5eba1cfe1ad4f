//! Presentation layer boundary.
//!
//! The core never renders anything. It hands snapshots and events to a
//! [`Presenter`]; whatever sits behind it (a console, a web page) owns
//! how they look.

use crate::controller::DrawRecord;
use crate::draw_state::HistoryEntry;
use serde::Serialize;
use std::sync::Mutex;

/// Snapshot of everything a front end needs to redraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawView {
    pub tier_index: usize,
    pub tier_name: String,

    /// Winners drawn so far for the active tier
    pub tier_count: u64,

    /// True while a draw is rolling; start/next controls are disabled
    pub rolling: bool,

    /// Draw order, oldest first
    pub history: Vec<HistoryEntry>,

    pub distinct_winners: usize,
}

impl DrawView {
    /// Label for the active tier, e.g. `参与奖 (3 drawn)`.
    pub fn tier_label(&self) -> String {
        format!("{} ({} drawn)", self.tier_name, self.tier_count)
    }

    /// History newest first, as the winners list shows it.
    pub fn history_newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().rev()
    }
}

/// Receives notifications from the lifecycle controller.
///
/// Only [`state_changed`](Presenter::state_changed) is required; the
/// event hooks default to no-ops.
pub trait Presenter: Send + Sync {
    /// The draw state or rolling status changed.
    fn state_changed(&self, view: &DrawView);

    /// Transient name to flash while rolling. Never the real winner.
    fn rolling_display(&self, _name: &str) {}

    /// A rolling draw resolved.
    fn winner_drawn(&self, _record: &DrawRecord) {}

    /// A draw was requested but nobody is left for `tier`.
    fn no_eligible_participants(&self, _tier: &str) {}
}

/// Presenter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn state_changed(&self, _view: &DrawView) {}
}

/// One notification captured by [`RecordingPresenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    StateChanged(DrawView),
    RollingDisplay(String),
    WinnerDrawn(DrawRecord),
    NoEligibleParticipants(String),
}

/// Presenter that keeps every notification, for tests and simulation.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: PresenterEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Copies out everything recorded so far.
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of rolling display updates seen.
    pub fn rolling_updates(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PresenterEvent::RollingDisplay(_)))
            .count()
    }

    /// Index of the first winner event, if any.
    pub fn first_winner_position(&self) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| matches!(e, PresenterEvent::WinnerDrawn(_)))
    }

    pub fn last_view(&self) -> Option<DrawView> {
        self.events().into_iter().rev().find_map(|e| match e {
            PresenterEvent::StateChanged(view) => Some(view),
            _ => None,
        })
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Presenter for RecordingPresenter {
    fn state_changed(&self, view: &DrawView) {
        self.push(PresenterEvent::StateChanged(view.clone()));
    }

    fn rolling_display(&self, name: &str) {
        self.push(PresenterEvent::RollingDisplay(name.to_string()));
    }

    fn winner_drawn(&self, record: &DrawRecord) {
        self.push(PresenterEvent::WinnerDrawn(record.clone()));
    }

    fn no_eligible_participants(&self, tier: &str) {
        self.push(PresenterEvent::NoEligibleParticipants(tier.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> DrawView {
        DrawView {
            tier_index: 0,
            tier_name: "参与奖".to_string(),
            tier_count: 2,
            rolling: false,
            history: vec![HistoryEntry::new("A", "参与奖"), HistoryEntry::new("B", "参与奖")],
            distinct_winners: 2,
        }
    }

    #[test]
    fn test_label_and_history_order() {
        let view = view();
        assert_eq!(view.tier_label(), "参与奖 (2 drawn)");

        let names: Vec<&str> = view.history_newest_first().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_recording_presenter_keeps_order() {
        let presenter = RecordingPresenter::new();
        presenter.rolling_display("X");
        presenter.state_changed(&view());
        presenter.no_eligible_participants("参与奖");

        assert_eq!(presenter.rolling_updates(), 1);
        assert_eq!(presenter.last_view(), Some(view()));
        assert_eq!(presenter.first_winner_position(), None);
        assert_eq!(
            presenter.events().last(),
            Some(&PresenterEvent::NoEligibleParticipants("参与奖".to_string()))
        );

        presenter.clear();
        assert!(presenter.events().is_empty());
    }
}
