//! Portal session capabilities
//!
//! The state machine drives one job through these traits and never touches
//! the browser directly, so the whole flow can be exercised against mock
//! sessions.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::ResultRecord;
use crate::workflow::ProcessCtx;

/// What the portal showed after a challenge submission.
///
/// A results page (even one with zero rows) means the challenge passed;
/// only a rejected challenge (invalid-code dialog, or the search form shown
/// again) triggers a challenge retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    ResultsPage,
    ChallengeRejected,
}

/// One isolated browser session, exclusively owned by one running job
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// Opens the search endpoint within the bounded navigation timeout
    async fn navigate(&self) -> AppResult<()>;

    /// Writes the job's identifier (and optional date range) into the form
    async fn prepare_form(&self, ctx: &ProcessCtx) -> AppResult<()>;

    /// Fetches the challenge image's raw bytes from the page context
    async fn challenge_image(&self) -> AppResult<Vec<u8>>;

    /// Writes the recognized text, submits, waits for the page to settle,
    /// and reports what the portal showed
    async fn submit_challenge(&self, answer: &str) -> AppResult<SubmitOutcome>;

    /// Reloads the search form for another challenge attempt
    async fn reload(&self) -> AppResult<()>;

    /// Scrapes the current page's result rows in page order
    async fn scrape_page(&self) -> AppResult<Vec<ResultRecord>>;

    /// Clicks the pagination control when present and waits for the next
    /// page; the first page's control is structurally distinct
    async fn next_page(&self, first_page: bool) -> AppResult<bool>;

    /// Tears the session down; called exactly once on every exit path
    async fn close(&self);
}

/// Opens one exclusive session per job
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, ctx: &ProcessCtx) -> AppResult<Box<dyn PortalSession>>;
}
