use std::time::Duration;

/// How the process runs: HTTP endpoint or CSV-driven batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Serve the search endpoint
    Server,
    /// Read identifiers from a CSV file and run one batch
    Csv,
}

/// Application configuration
///
/// Every tunable is explicit here; the degenerate sequential mode is just
/// `max_concurrent = 1` with `admission_enabled = false`.
#[derive(Clone, Debug)]
pub struct Config {
    /// Run mode (server or CSV batch)
    pub run_mode: RunMode,
    /// Port for the search endpoint
    pub server_port: u16,
    /// Portal search endpoint
    pub search_url: String,
    /// Jobs dispatched concurrently per slice
    pub max_concurrent: usize,
    /// Outer retry budget per job (navigate/fill/solve/extract attempts)
    pub max_retries: usize,
    /// Challenge solve attempts per outer attempt
    pub challenge_attempts: usize,
    /// Fixed backoff between outer attempts (ms)
    pub retry_backoff_ms: u64,
    /// Bounded navigation timeout (s)
    pub navigation_timeout_secs: u64,
    /// Fallback delay when navigation signaling is unreliable (ms)
    pub post_submit_delay_ms: u64,
    /// Minimum free memory required to admit a new slice (MB)
    pub min_free_memory_mb: u64,
    /// Interval between admission re-checks (s)
    pub admission_poll_secs: u64,
    /// Whether admission control gates slice dispatch
    pub admission_enabled: bool,
    /// Persisted result store path
    pub results_file: String,
    /// CSV input path for batch mode
    pub csv_file: String,
    /// Directory for job-namespaced challenge artifacts
    pub captcha_temp_dir: String,
    /// Luminance threshold for challenge binarization
    pub captcha_threshold: u8,
    /// Enable the enhanced challenge transform (upscale/denoise/contrast)
    pub enhanced_captcha: bool,
    /// Dialog message pattern identifying an invalid challenge code
    pub invalid_challenge_pattern: String,
    /// Explicit Chromium/Chrome executable (auto-detected when unset)
    pub chrome_executable: Option<String>,
    /// Show verbose per-row logs
    pub verbose_logging: bool,
    /// Plain-text run log file
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Server,
            server_port: 3000,
            search_url: "https://sei.anm.gov.br/sei/modulos/pesquisa/md_pesq_processo_pesquisar.php?acao_externa=protocolo_pesquisar&acao_origem_externa=protocolo_pesquisar&id_orgao_acesso_externo=0".to_string(),
            max_concurrent: 10,
            max_retries: 100,
            challenge_attempts: 3,
            retry_backoff_ms: 2000,
            navigation_timeout_secs: 30,
            post_submit_delay_ms: 2000,
            min_free_memory_mb: 500,
            admission_poll_secs: 5,
            admission_enabled: true,
            results_file: "resultados.json".to_string(),
            csv_file: "processos.csv".to_string(),
            captcha_temp_dir: "tmp/captcha".to_string(),
            captcha_threshold: 130,
            enhanced_captcha: false,
            invalid_challenge_pattern: "Código de confirmação inválido".to_string(),
            chrome_executable: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            run_mode: match std::env::var("RUN_MODE").as_deref() {
                Ok("csv") => RunMode::Csv,
                Ok("server") => RunMode::Server,
                _ => default.run_mode,
            },
            server_port: std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.server_port),
            search_url: std::env::var("SEARCH_URL").unwrap_or(default.search_url),
            max_concurrent: std::env::var("MAX_CONCURRENT_JOBS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            challenge_attempts: std::env::var("CHALLENGE_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.challenge_attempts),
            retry_backoff_ms: std::env::var("RETRY_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_backoff_ms),
            navigation_timeout_secs: std::env::var("NAVIGATION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.navigation_timeout_secs),
            post_submit_delay_ms: std::env::var("POST_SUBMIT_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.post_submit_delay_ms),
            min_free_memory_mb: std::env::var("MIN_FREE_MEMORY_MB").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_free_memory_mb),
            admission_poll_secs: std::env::var("ADMISSION_POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.admission_poll_secs),
            admission_enabled: std::env::var("ADMISSION_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.admission_enabled),
            results_file: std::env::var("RESULTS_FILE").unwrap_or(default.results_file),
            csv_file: std::env::var("CSV_FILE").unwrap_or(default.csv_file),
            captcha_temp_dir: std::env::var("CAPTCHA_TEMP_DIR").unwrap_or(default.captcha_temp_dir),
            captcha_threshold: std::env::var("CAPTCHA_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.captcha_threshold),
            enhanced_captcha: std::env::var("ENHANCED_CAPTCHA").ok().and_then(|v| v.parse().ok()).unwrap_or(default.enhanced_captcha),
            invalid_challenge_pattern: std::env::var("INVALID_CHALLENGE_PATTERN").unwrap_or(default.invalid_challenge_pattern),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn post_submit_delay(&self) -> Duration {
        Duration::from_millis(self.post_submit_delay_ms)
    }

    pub fn admission_poll_interval(&self) -> Duration {
        Duration::from_secs(self.admission_poll_secs)
    }
}
