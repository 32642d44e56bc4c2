//! Scripted mock collaborators shared by the integration tests.
//!
//! `MockFactory` hands out scripted portal sessions and instruments the
//! session lifecycle (live count, peak concurrency, open/close tallies) so
//! the tests can check the invariants the orchestrator promises.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use url::Url;

use sei_process_search::{
    AdmissionPolicy, AppError, AppResult, ChallengeSolver, PortalSession, ProcessCtx,
    ResultRecord, SessionFactory, SubmitOutcome,
};

pub fn record(title: &str) -> ResultRecord {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    ResultRecord {
        title: title.to_string(),
        link: Url::parse(&format!("https://sei.anm.gov.br/processo/{}", slug)).unwrap(),
    }
}

fn mock_error(message: &str) -> AppError {
    AppError::Other(message.to_string())
}

/// Scripted behavior for one identifier's session
#[derive(Clone, Default)]
pub struct SessionScript {
    /// The first N navigate calls fail
    pub navigate_failures: usize,
    /// Outcome of each challenge submission in order; submissions past the
    /// end of the list land on a results page
    pub submit_outcomes: Vec<SubmitOutcome>,
    /// Result rows per page; an empty list models a zero-row results page
    pub pages: Vec<Vec<ResultRecord>>,
    /// Artificial delay inside navigate, to overlap concurrent jobs
    pub navigate_delay: Duration,
}

impl SessionScript {
    pub fn with_pages(pages: Vec<Vec<ResultRecord>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }
}

/// Per-session call tallies, kept alive by the factory for inspection
pub struct SessionState {
    pub identifier: String,
    pub navigations: AtomicUsize,
    pub prepares: AtomicUsize,
    pub images: AtomicUsize,
    pub submits: AtomicUsize,
    pub reloads: AtomicUsize,
    pub closes: AtomicUsize,
    pub next_page_flags: Mutex<Vec<bool>>,
    page_cursor: AtomicUsize,
}

impl SessionState {
    fn new(identifier: String) -> Self {
        Self {
            identifier,
            navigations: AtomicUsize::new(0),
            prepares: AtomicUsize::new(0),
            images: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            reloads: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            next_page_flags: Mutex::new(Vec::new()),
            page_cursor: AtomicUsize::new(0),
        }
    }
}

/// Factory-wide instrumentation
#[derive(Default)]
pub struct PortalCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub live_sessions: AtomicUsize,
    pub peak_sessions: AtomicUsize,
}

struct MockSession {
    script: SessionScript,
    state: Arc<SessionState>,
    shared: Arc<PortalCounters>,
}

#[async_trait]
impl PortalSession for MockSession {
    async fn navigate(&self) -> AppResult<()> {
        let call = self.state.navigations.fetch_add(1, Ordering::SeqCst);
        if !self.script.navigate_delay.is_zero() {
            sleep(self.script.navigate_delay).await;
        }
        // A fresh attempt starts extraction from the first page again
        self.state.page_cursor.store(0, Ordering::SeqCst);
        if call < self.script.navigate_failures {
            return Err(mock_error("navigation timed out after 30s"));
        }
        Ok(())
    }

    async fn prepare_form(&self, _ctx: &ProcessCtx) -> AppResult<()> {
        self.state.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn challenge_image(&self) -> AppResult<Vec<u8>> {
        self.state.images.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0u8; 16])
    }

    async fn submit_challenge(&self, _answer: &str) -> AppResult<SubmitOutcome> {
        let call = self.state.submits.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .submit_outcomes
            .get(call)
            .copied()
            .unwrap_or(SubmitOutcome::ResultsPage))
    }

    async fn reload(&self) -> AppResult<()> {
        self.state.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scrape_page(&self) -> AppResult<Vec<ResultRecord>> {
        let cursor = self.state.page_cursor.load(Ordering::SeqCst);
        Ok(self.script.pages.get(cursor).cloned().unwrap_or_default())
    }

    async fn next_page(&self, first_page: bool) -> AppResult<bool> {
        self.state
            .next_page_flags
            .lock()
            .unwrap()
            .push(first_page);
        let cursor = self.state.page_cursor.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(cursor < self.script.pages.len())
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        self.shared.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Hands out scripted sessions, one per open
#[derive(Default)]
pub struct MockFactory {
    pub scripts: Mutex<HashMap<String, SessionScript>>,
    pub default_script: SessionScript,
    pub shared: Arc<PortalCounters>,
    pub sessions: Mutex<Vec<Arc<SessionState>>>,
    pub opened_identifiers: Mutex<Vec<String>>,
    pub fail_open: bool,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default_script: SessionScript) -> Self {
        Self {
            default_script,
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn script_for(&self, identifier: &str, script: SessionScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(identifier.to_string(), script);
    }

    pub fn peak_sessions(&self) -> usize {
        self.shared.peak_sessions.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// The single session opened by a one-job test
    pub fn only_session(&self) -> Arc<SessionState> {
        let sessions = self.sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1, "expected exactly one session");
        sessions[0].clone()
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn open(&self, ctx: &ProcessCtx) -> AppResult<Box<dyn PortalSession>> {
        if self.fail_open {
            return Err(mock_error("browser process refused to start"));
        }
        self.opened_identifiers
            .lock()
            .unwrap()
            .push(ctx.identifier.clone());
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.shared.live_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.peak_sessions.fetch_max(live, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&ctx.identifier)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone());
        let state = Arc::new(SessionState::new(ctx.identifier.clone()));
        self.sessions.lock().unwrap().push(state.clone());

        Ok(Box::new(MockSession {
            script,
            state,
            shared: self.shared.clone(),
        }))
    }
}

/// Deterministic solver: fails the first `fail_times` calls, then answers
pub struct MockSolver {
    pub answer: String,
    pub fail_times: usize,
    pub calls: AtomicUsize,
    pub namespaces: Mutex<Vec<String>>,
}

impl MockSolver {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail_times: 0,
            calls: AtomicUsize::new(0),
            namespaces: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(answer: &str, fail_times: usize) -> Self {
        Self {
            fail_times,
            ..Self::new(answer)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeSolver for MockSolver {
    async fn solve(&self, _image_bytes: &[u8], namespace: &str) -> AppResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.namespaces
            .lock()
            .unwrap()
            .push(namespace.to_string());
        if call < self.fail_times {
            return Err(mock_error("recognition backend unavailable"));
        }
        Ok(self.answer.clone())
    }
}

/// Admission stub that counts how often it is polled
pub struct MockAdmission {
    pub allow: bool,
    pub polls: AtomicUsize,
}

impl MockAdmission {
    pub fn allowing() -> Self {
        Self {
            allow: true,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn denying() -> Self {
        Self {
            allow: false,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl AdmissionPolicy for MockAdmission {
    fn admit(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.allow
    }
}
