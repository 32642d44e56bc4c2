//! Chromium-backed portal session
//!
//! Owns one browser process + page per job and implements the portal
//! capabilities on top of script evaluation. The invalid-challenge dialog
//! watcher lives here: a callback registered on the session for the job's
//! lifetime, deregistered on teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use url::Url;

use crate::browser::launch_headless_browser;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::portal::{PortalSession, SessionFactory, SubmitOutcome};
use crate::models::ResultRecord;
use crate::workflow::ProcessCtx;

/// Structural locators for the portal's search pages.
///
/// The pagination control differs between the first page and subsequent
/// pages, hence the two locators.
mod selectors {
    pub const IDENTIFIER_FIELD: &str = "#txtProtocoloPesquisa";
    pub const CAPTCHA_FIELD: &str = "#txtCaptcha";
    pub const SUBMIT_BUTTON: &str = "#sbmPesquisar";
    pub const EXPLICIT_PERIOD_OPTION: &str = "#optPeriodoExplicito";
    pub const DATE_START_FIELD: &str = "#txtDataInicio";
    pub const DATE_END_FIELD: &str = "#txtDataFim";
    pub const GENERATED_DOCS_CHECKBOX: &str = "#chkSinDocumentosGerados";
    pub const RECEIVED_DOCS_CHECKBOX: &str = "#chkSinDocumentosRecebidos";
    pub const CHALLENGE_IMAGE: &str =
        r#"img[alt="Não foi possível carregar imagem de confirmação"]"#;
    pub const RESULTS_CONTAINER: &str = "#conteudo .resultado";
    pub const RESULT_ROWS: &str = ".infraAreaTabela .resultado tbody tr.resTituloRegistro";
    pub const ROW_LINK: &str = ".resTituloEsquerda a.protocoloNormal";
    pub const NEXT_PAGE_FIRST: &str = "#conteudo > div.paginas > span > a";
    pub const NEXT_PAGE_LATER: &str = "#conteudo > div.paginas > span:nth-child(14) > a";
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Interval between element-presence polls
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Row shape returned by the scrape script
#[derive(Debug, Deserialize)]
struct ScrapedRow {
    title: Option<String>,
    link: Option<String>,
}

/// One Chromium process + page, exclusively owned by one job
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    search_url: String,
    navigation_timeout: Duration,
    post_submit_delay: Duration,
    invalid_challenge_seen: Arc<AtomicBool>,
    dialog_watcher: JoinHandle<()>,
    label: String,
}

impl ChromeSession {
    /// Evaluates JS on the page and returns the JSON result
    async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(AppError::script_failed)?;
        result.into_value().map_err(AppError::script_failed)
    }

    /// Evaluates JS and deserializes the result into a concrete type
    async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(AppError::script_failed)
    }

    async fn element_exists(&self, selector: &str) -> AppResult<bool> {
        self.eval_as::<bool>(format!(
            "!!document.querySelector({})",
            serde_json::to_string(selector).map_err(AppError::script_failed)?
        ))
        .await
    }

    /// Polls until the element appears, bounded by `timeout_after`
    async fn wait_for_selector(&self, selector: &str, timeout_after: Duration) -> AppResult<()> {
        let deadline = tokio::time::Instant::now() + timeout_after;
        loop {
            if self.element_exists(selector).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::element_not_found(selector));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits for either navigation completion or the invalid-challenge
    /// dialog. When navigation signaling is unreliable, falls back to a
    /// fixed delay.
    async fn settle_after_submit(&self) {
        let nav = timeout(self.navigation_timeout, self.page.wait_for_navigation());
        tokio::pin!(nav);
        let dialog_seen = async {
            loop {
                if self.invalid_challenge_seen.load(Ordering::Relaxed) {
                    break;
                }
                sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::select! {
            result = &mut nav => {
                if !matches!(result, Ok(Ok(_))) {
                    debug!("[{}] navigation signal unreliable, using fixed delay", self.label);
                    sleep(self.post_submit_delay).await;
                }
            }
            _ = dialog_seen => {
                debug!("[{}] invalid-challenge dialog observed", self.label);
            }
        }
    }
}

#[async_trait]
impl PortalSession for ChromeSession {
    async fn navigate(&self) -> AppResult<()> {
        debug!("[{}] navigating to search endpoint", self.label);
        match timeout(self.navigation_timeout, self.page.goto(self.search_url.as_str())).await {
            Err(_) => {
                return Err(AppError::navigation_timeout(
                    &self.search_url,
                    self.navigation_timeout.as_secs(),
                ))
            }
            Ok(Err(e)) => return Err(AppError::navigation_failed(&self.search_url, e)),
            Ok(Ok(_)) => {}
        }
        self.wait_for_selector(selectors::IDENTIFIER_FIELD, self.navigation_timeout)
            .await?;
        self.wait_for_selector(selectors::CAPTCHA_FIELD, self.navigation_timeout)
            .await?;
        Ok(())
    }

    async fn prepare_form(&self, ctx: &ProcessCtx) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                const field = document.querySelector('{identifier_field}');
                if (!field) return false;
                field.value = {identifier};
                const generated = document.querySelector('{generated}');
                if (generated && !generated.checked) generated.click();
                const received = document.querySelector('{received}');
                if (received && !received.checked) received.click();
                return true;
            }})()
            "#,
            identifier_field = selectors::IDENTIFIER_FIELD,
            identifier = serde_json::to_string(&ctx.identifier).map_err(AppError::script_failed)?,
            generated = selectors::GENERATED_DOCS_CHECKBOX,
            received = selectors::RECEIVED_DOCS_CHECKBOX,
        );
        if !self.eval_as::<bool>(js_code).await? {
            return Err(AppError::element_not_found(selectors::IDENTIFIER_FIELD));
        }

        if let Some(range) = &ctx.date_range {
            let js_code = format!(
                r#"
                (() => {{
                    const option = document.querySelector('{option}');
                    if (!option) return false;
                    option.click();
                    const start = document.querySelector('{start_field}');
                    const end = document.querySelector('{end_field}');
                    if (!start || !end) return false;
                    start.value = {start};
                    end.value = {end};
                    return true;
                }})()
                "#,
                option = selectors::EXPLICIT_PERIOD_OPTION,
                start_field = selectors::DATE_START_FIELD,
                end_field = selectors::DATE_END_FIELD,
                start = serde_json::to_string(&range.start).map_err(AppError::script_failed)?,
                end = serde_json::to_string(&range.end).map_err(AppError::script_failed)?,
            );
            if !self.eval_as::<bool>(js_code).await? {
                return Err(AppError::element_not_found(selectors::DATE_START_FIELD));
            }
        }
        Ok(())
    }

    async fn challenge_image(&self) -> AppResult<Vec<u8>> {
        if !self.element_exists(selectors::CHALLENGE_IMAGE).await? {
            return Err(AppError::challenge_not_found());
        }
        // Fetch inside the page context so session cookies apply
        let js_code = format!(
            r#"
            (async () => {{
                const img = document.querySelector('{image}');
                const response = await fetch(img.src);
                const buffer = await response.arrayBuffer();
                return Array.from(new Uint8Array(buffer));
            }})()
            "#,
            image = selectors::CHALLENGE_IMAGE,
        );
        self.eval_as::<Vec<u8>>(js_code).await
    }

    async fn submit_challenge(&self, answer: &str) -> AppResult<SubmitOutcome> {
        self.invalid_challenge_seen.store(false, Ordering::Relaxed);

        let js_code = format!(
            r#"
            (() => {{
                const field = document.querySelector('{captcha_field}');
                if (!field) return false;
                field.value = {answer};
                const button = document.querySelector('{submit}');
                if (!button) return false;
                button.click();
                return true;
            }})()
            "#,
            captcha_field = selectors::CAPTCHA_FIELD,
            answer = serde_json::to_string(answer).map_err(AppError::script_failed)?,
            submit = selectors::SUBMIT_BUTTON,
        );
        if !self.eval_as::<bool>(js_code).await? {
            return Err(AppError::element_not_found(selectors::CAPTCHA_FIELD));
        }

        self.settle_after_submit().await;

        if self.invalid_challenge_seen.load(Ordering::Relaxed) {
            return Ok(SubmitOutcome::ChallengeRejected);
        }
        // A results area, even an empty one, means the challenge passed
        let results_page = self.element_exists(selectors::RESULTS_CONTAINER).await?
            || self.element_exists(selectors::RESULT_ROWS).await?;
        if results_page {
            Ok(SubmitOutcome::ResultsPage)
        } else {
            Ok(SubmitOutcome::ChallengeRejected)
        }
    }

    async fn reload(&self) -> AppResult<()> {
        self.invalid_challenge_seen.store(false, Ordering::Relaxed);
        match timeout(self.navigation_timeout, self.page.reload()).await {
            Ok(Ok(_)) => {}
            _ => sleep(self.post_submit_delay).await,
        }
        self.wait_for_selector(selectors::IDENTIFIER_FIELD, self.navigation_timeout)
            .await
    }

    async fn scrape_page(&self) -> AppResult<Vec<ResultRecord>> {
        let js_code = format!(
            r#"
            (() => {{
                const rows = Array.from(document.querySelectorAll('{rows}'));
                return rows.map(row => {{
                    const link = row.querySelector('{row_link}');
                    return {{
                        title: link ? link.textContent.trim() : null,
                        link: link ? link.href : null,
                    }};
                }});
            }})()
            "#,
            rows = selectors::RESULT_ROWS,
            row_link = selectors::ROW_LINK,
        );
        let rows: Vec<ScrapedRow> = self.eval_as(js_code).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match (row.title, row.link) {
                (Some(title), Some(link)) => match Url::parse(&link) {
                    Ok(link) => records.push(ResultRecord { title, link }),
                    Err(e) => warn!("[{}] skipping row with bad link {}: {}", self.label, link, e),
                },
                _ => warn!("[{}] skipping malformed result row", self.label),
            }
        }
        Ok(records)
    }

    async fn next_page(&self, first_page: bool) -> AppResult<bool> {
        let selector = if first_page {
            selectors::NEXT_PAGE_FIRST
        } else {
            selectors::NEXT_PAGE_LATER
        };
        if !self.element_exists(selector).await? {
            return Ok(false);
        }
        let js_code = format!(
            r#"
            (() => {{
                document.querySelector({}).click();
                return true;
            }})()
            "#,
            serde_json::to_string(selector).map_err(AppError::script_failed)?
        );
        self.eval_as::<bool>(js_code).await?;
        match timeout(self.navigation_timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            _ => sleep(self.post_submit_delay).await,
        }
        Ok(true)
    }

    async fn close(&self) {
        self.dialog_watcher.abort();
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("[{}] failed to close browser: {}", self.label, e);
            }
            debug!("[{}] session closed", self.label);
        }
    }
}

/// Opens one Chromium session per job, with the dialog watcher installed
pub struct ChromeSessionFactory {
    config: Config,
    invalid_pattern: Regex,
}

impl ChromeSessionFactory {
    pub fn new(config: Config) -> AppResult<Self> {
        let invalid_pattern = Regex::new(&config.invalid_challenge_pattern).map_err(|e| {
            AppError::Other(format!(
                "invalid dialog pattern '{}': {}",
                config.invalid_challenge_pattern, e
            ))
        })?;
        Ok(Self {
            config,
            invalid_pattern,
        })
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, ctx: &ProcessCtx) -> AppResult<Box<dyn PortalSession>> {
        let (browser, page) =
            launch_headless_browser(self.config.chrome_executable.as_deref()).await?;
        page.set_user_agent(USER_AGENT)
            .await
            .map_err(AppError::script_failed)?;

        let invalid_challenge_seen = Arc::new(AtomicBool::new(false));
        let dialog_watcher = spawn_dialog_watcher(
            &page,
            self.invalid_pattern.clone(),
            invalid_challenge_seen.clone(),
            ctx.to_string(),
        )
        .await?;

        Ok(Box::new(ChromeSession {
            browser: Mutex::new(Some(browser)),
            page,
            search_url: self.config.search_url.clone(),
            navigation_timeout: self.config.navigation_timeout(),
            post_submit_delay: self.config.post_submit_delay(),
            invalid_challenge_seen,
            dialog_watcher,
            label: ctx.to_string(),
        }))
    }
}

/// Registers the per-session dialog callback: an invalid-challenge dialog is
/// dismissed and flagged; every other dialog is accepted untouched.
async fn spawn_dialog_watcher(
    page: &Page,
    pattern: Regex,
    flag: Arc<AtomicBool>,
    label: String,
) -> AppResult<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(AppError::script_failed)?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let message = event.message.clone();
            let invalid = pattern.is_match(&message);
            debug!("[{}] dialog: {}", label, message);
            if invalid {
                flag.store(true, Ordering::Relaxed);
            }
            match HandleJavaScriptDialogParams::builder()
                .accept(!invalid)
                .build()
            {
                Ok(params) => {
                    if let Err(e) = page.execute(params).await {
                        warn!("[{}] failed to handle dialog: {}", label, e);
                    }
                }
                Err(e) => warn!("[{}] failed to build dialog response: {}", label, e),
            }
        }
    }))
}
