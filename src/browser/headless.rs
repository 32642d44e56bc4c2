use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::error::{AppError, AppResult, BrowserError};

/// Launches a headless browser with a blank page
///
/// One browser process per call; the caller owns both handles and is
/// responsible for closing the browser when the job finishes.
pub async fn launch_headless_browser(
    chrome_executable: Option<&str>,
) -> AppResult<(Browser, Page)> {
    debug!("launching headless browser");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-web-security",
        "--disable-gpu",
        "--remote-debugging-port=0",
    ]);
    if let Some(executable) = chrome_executable {
        builder = builder.chrome_executable(Path::new(executable));
    }
    let config = builder.build().map_err(|message| {
        error!("browser configuration rejected: {}", message);
        AppError::Browser(BrowserError::ConfigurationFailed { message })
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("failed to launch headless browser: {}", e);
        AppError::launch_failed(e)
    })?;
    debug!("headless browser launched");

    // Drain CDP events in the background; the loop ends when the
    // connection drops.
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // Short delay to let the browser state settle
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| {
            error!("failed to create page: {}", e);
            AppError::page_creation_failed(e)
        })?;

    Ok((browser, page))
}
