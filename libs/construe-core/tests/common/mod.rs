//! Common test utilities for integration tests.
//!
//! `TestContext` wraps a practice session backed by an in-memory mastery
//! repository and an in-memory attempt log.

pub mod fixtures;

use construe_core::{
    corpus_totals, AttemptLog, Excerpt, GradingSettings, InMemoryMasteryRepository, MasterySet, PracticeMode,
    PracticeSession, Target,
};

pub type Session = PracticeSession<InMemoryMasteryRepository, AttemptLog>;

pub struct TestContext {
    pub session: Session,
}

impl TestContext {
    pub fn new(mode: PracticeMode) -> Self {
        Self::with_mastered(mode, MasterySet::new())
    }

    pub fn with_mastered(mode: PracticeMode, mastered: MasterySet) -> Self {
        let session = PracticeSession::new(
            InMemoryMasteryRepository::with_mastered(mastered),
            AttemptLog::new(),
            GradingSettings::default(),
            mode,
        );
        Self { session }
    }

    /// Load `excerpt`, using it as the whole corpus for totals.
    pub fn load(&mut self, excerpt: Excerpt) {
        let settings = self.session.effective_settings();
        self.session
            .set_totals(corpus_totals([&excerpt], settings.unmarked_pairing));
        self.session
            .load_excerpt(excerpt)
            .expect("Failed to load excerpt");
    }

    pub fn target(&self, prefix: &str) -> &Target {
        self.session
            .targets()
            .iter()
            .find(|t| t.id.contains(prefix))
            .unwrap_or_else(|| panic!("no target matching {}", prefix))
    }
}
