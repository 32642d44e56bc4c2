use std::fmt;

/// Top-level application error type
#[derive(Debug)]
pub enum AppError {
    /// Browser / session errors
    Browser(BrowserError),
    /// Challenge resolution errors
    Captcha(CaptchaError),
    /// File and persistence errors
    File(FileError),
    /// Per-job flow errors
    Flow(FlowError),
    /// Configuration errors
    Config(ConfigError),
    /// Anything else (wrapping third-party errors)
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "browser error: {}", e),
            AppError::Captcha(e) => write!(f, "challenge error: {}", e),
            AppError::File(e) => write!(f, "file error: {}", e),
            AppError::Flow(e) => write!(f, "flow error: {}", e),
            AppError::Config(e) => write!(f, "config error: {}", e),
            AppError::Other(msg) => write!(f, "error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::Captcha(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Flow(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// Browser / session errors
#[derive(Debug)]
pub enum BrowserError {
    /// Launching the browser process failed
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Creating a page failed
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Navigation failed
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Navigation did not complete within the bounded timeout
    NavigationTimeout { url: String, secs: u64 },
    /// Script evaluation on the page failed
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// An expected element never appeared
    ElementNotFound { selector: String },
    /// Browser configuration was rejected
    ConfigurationFailed { message: String },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::LaunchFailed { source } => {
                write!(f, "failed to launch browser: {}", source)
            }
            BrowserError::PageCreationFailed { source } => {
                write!(f, "failed to create page: {}", source)
            }
            BrowserError::NavigationFailed { url, source } => {
                write!(f, "navigation to {} failed: {}", url, source)
            }
            BrowserError::NavigationTimeout { url, secs } => {
                write!(f, "navigation to {} timed out after {}s", url, secs)
            }
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "script evaluation failed: {}", source)
            }
            BrowserError::ElementNotFound { selector } => {
                write!(f, "element not found: {}", selector)
            }
            BrowserError::ConfigurationFailed { message } => {
                write!(f, "browser configuration failed: {}", message)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::LaunchFailed { source }
            | BrowserError::PageCreationFailed { source }
            | BrowserError::NavigationFailed { source, .. }
            | BrowserError::ScriptExecutionFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// Challenge resolution errors
#[derive(Debug)]
pub enum CaptchaError {
    /// The challenge image element is missing from the page
    ImageNotFound,
    /// The fetched image bytes could not be decoded
    ImageDecodeFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Text recognition itself failed
    RecognitionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Reading or writing a temp artifact failed
    ArtifactIo {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for CaptchaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptchaError::ImageNotFound => {
                write!(f, "challenge image not found on page")
            }
            CaptchaError::ImageDecodeFailed { source } => {
                write!(f, "failed to decode challenge image: {}", source)
            }
            CaptchaError::RecognitionFailed { source } => {
                write!(f, "text recognition failed: {}", source)
            }
            CaptchaError::ArtifactIo { path, source } => {
                write!(f, "temp artifact I/O failed ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for CaptchaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptchaError::ImageDecodeFailed { source }
            | CaptchaError::RecognitionFailed { source }
            | CaptchaError::ArtifactIo { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// File and persistence errors
#[derive(Debug)]
pub enum FileError {
    /// File does not exist
    NotFound { path: String },
    /// Reading a file failed
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Writing a file failed
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Parsing a persisted JSON document failed
    JsonParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Parsing the CSV input failed
    CsvParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The CSV input is missing a required column
    MissingColumn { path: String, column: String },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "file not found: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path, source)
            }
            FileError::JsonParseFailed { path, source } => {
                write!(f, "failed to parse JSON ({}): {}", path, source)
            }
            FileError::CsvParseFailed { path, source } => {
                write!(f, "failed to parse CSV ({}): {}", path, source)
            }
            FileError::MissingColumn { path, column } => {
                write!(f, "CSV {} is missing column '{}'", path, column)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::JsonParseFailed { source, .. }
            | FileError::CsvParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// Per-job flow errors
#[derive(Debug)]
pub enum FlowError {
    /// The bounded challenge-retry count was exhausted within one attempt
    ChallengeRetriesExhausted { attempts: usize },
    /// The outer retry budget was exhausted; carries the last failure
    RetriesExhausted { attempts: usize, last_error: String },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::ChallengeRetriesExhausted { attempts } => {
                write!(f, "failed to solve challenge after {} attempts", attempts)
            }
            FlowError::RetriesExhausted {
                attempts,
                last_error,
            } => {
                write!(f, "failed after {} attempts: {}", attempts, last_error)
            }
        }
    }
}

impl std::error::Error for FlowError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "environment variable {} has value '{}' which is not a valid {}",
                    var_name, value, expected_type
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== Conversions from common error types ==========
// anyhow already blanket-converts anything implementing std::error::Error,
// so only the inbound direction is implemented here.

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::JsonParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== Convenience constructors ==========

impl AppError {
    /// Browser launch failure
    pub fn launch_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::LaunchFailed {
            source: Box::new(source),
        })
    }

    /// Page creation failure
    pub fn page_creation_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(source),
        })
    }

    /// Navigation failure for a concrete URL
    pub fn navigation_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// Navigation timed out
    pub fn navigation_timeout(url: impl Into<String>, secs: u64) -> Self {
        AppError::Browser(BrowserError::NavigationTimeout {
            url: url.into(),
            secs,
        })
    }

    /// Script evaluation failure
    pub fn script_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(source),
        })
    }

    /// An expected element never appeared
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        AppError::Browser(BrowserError::ElementNotFound {
            selector: selector.into(),
        })
    }

    /// The challenge image element is missing
    pub fn challenge_not_found() -> Self {
        AppError::Captcha(CaptchaError::ImageNotFound)
    }

    /// Text recognition failure
    pub fn recognition_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Captcha(CaptchaError::RecognitionFailed {
            source: Box::new(source),
        })
    }

    /// Temp artifact I/O failure
    pub fn artifact_io(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Captcha(CaptchaError::ArtifactIo {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// Inner challenge-retry bound exhausted (escalates to the outer retry)
    pub fn challenge_retries_exhausted(attempts: usize) -> Self {
        AppError::Flow(FlowError::ChallengeRetriesExhausted { attempts })
    }

    /// File read failure for a concrete path
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// File write failure for a concrete path
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result type alias ==========

/// Application result type
pub type AppResult<T> = Result<T, AppError>;
