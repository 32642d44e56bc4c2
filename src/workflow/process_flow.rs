//! Per-job state machine - flow layer
//!
//! Drives one process identifier through
//! navigate → fill → solve-challenge → validate → extract/paginate,
//! with the outer navigation retry and the bounded inner challenge retry.
//!
//! Terminal outcomes:
//! - `Success`: challenge solved, at least one row extracted
//! - `NoResults`: challenge solved, zero rows (a valid outcome, not a
//!   failure)
//! - `Error`: the outer retry budget is exhausted

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{PortalSession, SessionFactory, SubmitOutcome};
use crate::models::{ProcessJob, ProcessReport, ResultRecord};
use crate::services::ChallengeSolver;
use crate::workflow::process_ctx::ProcessCtx;

/// What one full attempt produced
enum AttemptOutcome {
    Rows(Vec<ResultRecord>),
    Empty,
}

/// One job's state machine
///
/// - Owns the retry policy, not the resources
/// - Talks to the portal only through the session capabilities
/// - Judges challenge success from downstream page state, never from any
///   recognition confidence
pub struct ProcessFlow {
    solver: Arc<dyn ChallengeSolver>,
    max_retries: usize,
    challenge_attempts: usize,
    retry_backoff: Duration,
}

impl ProcessFlow {
    pub fn new(config: &Config, solver: Arc<dyn ChallengeSolver>) -> Self {
        Self {
            solver,
            max_retries: config.max_retries,
            challenge_attempts: config.challenge_attempts,
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Runs the job to a terminal state.
    ///
    /// The session is opened once and torn down exactly once, whichever
    /// branch terminates the job.
    pub async fn run(&self, factory: &dyn SessionFactory, ctx: &ProcessCtx) -> ProcessReport {
        let session = match factory.open(ctx).await {
            Ok(session) => session,
            Err(e) => {
                warn!("[{}] ❌ failed to open session: {}", ctx, e);
                return ProcessReport::failed(&ctx.identifier, format!("session open failed: {}", e));
            }
        };

        let report = self.drive(session.as_ref(), ctx).await;
        session.close().await;
        report
    }

    /// Outer retry loop: every attempt restarts at Navigate, with a fixed
    /// backoff between attempts; the budget is exactly `max_retries`.
    async fn drive(&self, session: &dyn PortalSession, ctx: &ProcessCtx) -> ProcessReport {
        let mut job = ProcessJob::new(ctx.identifier.clone());

        loop {
            job.begin_attempt();
            match self.attempt(session, ctx).await {
                Ok(AttemptOutcome::Rows(records)) => {
                    info!("[{}] ✅ {} resultados extraídos", ctx, records.len());
                    return job.succeed(records);
                }
                Ok(AttemptOutcome::Empty) => {
                    info!("[{}] ✓ busca concluída sem resultados", ctx);
                    return job.no_results();
                }
                Err(e) => {
                    warn!(
                        "[{}] attempt {}/{} failed: {}",
                        ctx, job.retry_count, self.max_retries, e
                    );
                    job.record_error(e.to_string());
                    if job.retry_count >= self.max_retries {
                        return job.exhausted();
                    }
                    sleep(self.retry_backoff).await;
                }
            }
        }
    }

    /// One full attempt: navigate, fill, solve, extract, paginate
    async fn attempt(
        &self,
        session: &dyn PortalSession,
        ctx: &ProcessCtx,
    ) -> AppResult<AttemptOutcome> {
        // ========== Navigate / FillForm ==========
        session.navigate().await?;
        session.prepare_form(ctx).await?;

        // ========== SolveChallenge (bounded inner retry) ==========
        self.solve_challenge(session, ctx).await?;

        // ========== ExtractPage / Paginate ==========
        let mut records = Vec::new();
        let mut first_page = true;
        loop {
            let rows = session.scrape_page().await?;
            info!("[{}] {} linhas na página atual", ctx, rows.len());
            let page_empty = rows.is_empty();
            records.extend(rows);

            // An empty page never carries a pagination control
            if page_empty || !session.next_page(first_page).await? {
                break;
            }
            first_page = false;
        }

        if records.is_empty() {
            Ok(AttemptOutcome::Empty)
        } else {
            Ok(AttemptOutcome::Rows(records))
        }
    }

    /// Inner challenge loop.
    ///
    /// Every rejection (invalid-code dialog, or a page that is not a
    /// results page) restarts at the challenge-solve step. A reload clears
    /// the server-rendered form, so the fields are re-primed before solving
    /// again. Exhausting the bound aborts the current outer attempt.
    async fn solve_challenge(
        &self,
        session: &dyn PortalSession,
        ctx: &ProcessCtx,
    ) -> AppResult<()> {
        for attempt in 0..self.challenge_attempts {
            if attempt > 0 {
                session.reload().await?;
                session.prepare_form(ctx).await?;
            }

            match self.try_solve(session, ctx, attempt).await {
                Ok(SubmitOutcome::ResultsPage) => {
                    info!("[{}] ✓ desafio resolvido (tentativa {})", ctx, attempt + 1);
                    return Ok(());
                }
                Ok(SubmitOutcome::ChallengeRejected) => {
                    warn!(
                        "[{}] ⚠️ código de confirmação rejeitado (tentativa {}/{})",
                        ctx,
                        attempt + 1,
                        self.challenge_attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "[{}] ⚠️ falha no desafio (tentativa {}/{}): {}",
                        ctx,
                        attempt + 1,
                        self.challenge_attempts,
                        e
                    );
                }
            }
        }

        Err(AppError::challenge_retries_exhausted(self.challenge_attempts))
    }

    /// One solve attempt: fetch image, recognize, submit, judge page state
    async fn try_solve(
        &self,
        session: &dyn PortalSession,
        ctx: &ProcessCtx,
        attempt: usize,
    ) -> AppResult<SubmitOutcome> {
        let image = session.challenge_image().await?;
        let answer = self
            .solver
            .solve(&image, &ctx.artifact_namespace(attempt))
            .await?;
        session.submit_challenge(&answer).await
    }
}
