//! Mock registration source for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::registration::{RegistrationError, RegistrationSource};

use super::journal::CallJournal;

#[derive(Debug, Default)]
struct SourceState {
    eligible: BTreeSet<String>,
    group_codes: BTreeMap<String, Vec<String>>,
    mega_codes: BTreeMap<String, Vec<String>>,
    profiles: BTreeMap<String, String>,
    phones: BTreeMap<String, String>,
    fail_queries: bool,
    list_calls: usize,
    closed: bool,
}

/// In-memory registration source.
///
/// Clones share state, so a test can keep one handle while the pipeline
/// owns another.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockRegistrationSource::new();
/// source.add_registration("R1", &["CBC"], &[]);
/// source.set_phone("R1", "01012345678");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRegistrationSource {
    state: Arc<Mutex<SourceState>>,
    journal: CallJournal,
}

impl MockRegistrationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that records its calls into `journal`.
    pub fn with_journal(journal: CallJournal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    fn state(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an eligible registration with its group and mega codes.
    pub fn add_registration(&self, key: &str, group_codes: &[&str], mega_codes: &[&str]) {
        let mut state = self.state();
        state.eligible.insert(key.to_string());
        state.group_codes.insert(
            key.to_string(),
            group_codes.iter().map(|c| c.to_string()).collect(),
        );
        state.mega_codes.insert(
            key.to_string(),
            mega_codes.iter().map(|c| c.to_string()).collect(),
        );
    }

    /// Maps a mega code to a template name.
    pub fn set_profile(&self, mega_code: &str, template: &str) {
        self.state()
            .profiles
            .insert(mega_code.to_string(), template.to_string());
    }

    pub fn set_phone(&self, key: &str, phone: &str) {
        self.state()
            .phones
            .insert(key.to_string(), phone.to_string());
    }

    /// Makes every query fail with a database error.
    pub fn set_fail_queries(&self, fail: bool) {
        self.state().fail_queries = fail;
    }

    /// Removes a registration from the eligible set.
    pub fn mark_processed(&self, key: &str) -> bool {
        self.state().eligible.remove(key)
    }

    pub fn is_eligible(&self, key: &str) -> bool {
        self.state().eligible.contains(key)
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn check(&self, state: &SourceState) -> Result<(), RegistrationError> {
        if state.closed {
            return Err(RegistrationError::Closed);
        }
        if state.fail_queries {
            return Err(RegistrationError::Database("mock query failure".to_string()));
        }
        Ok(())
    }
}

impl RegistrationSource for MockRegistrationSource {
    fn list_eligible(&self) -> Result<Vec<String>, RegistrationError> {
        self.journal.record("list_eligible");
        let mut state = self.state();
        state.list_calls += 1;
        self.check(&state)?;
        Ok(state.eligible.iter().cloned().collect())
    }

    fn group_codes(&self, key: &str) -> Result<Vec<String>, RegistrationError> {
        let state = self.state();
        self.check(&state)?;
        Ok(state.group_codes.get(key).cloned().unwrap_or_default())
    }

    fn mega_codes(&self, key: &str) -> Result<Vec<String>, RegistrationError> {
        let state = self.state();
        self.check(&state)?;
        Ok(state.mega_codes.get(key).cloned().unwrap_or_default())
    }

    fn resolve_mega_template(&self, code: &str) -> Result<Option<String>, RegistrationError> {
        let state = self.state();
        self.check(&state)?;
        Ok(state.profiles.get(code).cloned())
    }

    fn contact_phone(&self, key: &str) -> Result<Option<String>, RegistrationError> {
        let state = self.state();
        self.check(&state)?;
        Ok(state.phones.get(key).cloned())
    }

    fn close(&self) {
        self.journal.record("close");
        self.state().closed = true;
    }
}
