//! Text-generation providers: OpenAI / Gemini behind one trait, plus a file
//! cache with a per-day call limit.
//!
//! Used twice by the analyzer: as a generative judge (JSON verdict) and as the
//! explainer for classifier results.

use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const USER_AGENT: &str = "factflow-backend/0.1";

/// Boxed future returned by [`TextGenerator::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Anything that turns a prompt into text. `None` means "no usable answer".
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a>;
    /// Provider name for diagnostics/logs.
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap_or_default()
}

/// OpenAI Chat Completions. Requires `OPENAI_API_KEY`.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// `model_override`: defaults to gpt-4o-mini.
    pub fn new(model_override: Option<&str>) -> Self {
        Self {
            http: http_client(),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

impl TextGenerator for OpenAiProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: "You are a fact-checking expert. Respond concisely and factually.",
                    },
                    Msg {
                        role: "user",
                        content: prompt,
                    },
                ],
                temperature: 0.2,
                max_tokens: 400,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| warn!(provider = "openai", error = %e, "request failed"))
                .ok()?;

            if !resp.status().is_success() {
                warn!(provider = "openai", status = %resp.status(), "non-success status");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.trim().to_string())
                .unwrap_or_default();
            (!content.is_empty()).then_some(content)
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Google Gemini `generateContent`. Requires `GEMINI_API_KEY`.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// `model_override`: defaults to gemini-2.5-flash.
    pub fn new(model_override: Option<&str>) -> Self {
        Self {
            http: http_client(),
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: model_override.unwrap_or("gemini-2.5-flash").to_string(),
        }
    }
}

impl TextGenerator for GeminiProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Part<'a> {
                text: &'a str,
            }
            #[derive(Serialize)]
            struct Content<'a> {
                parts: Vec<Part<'a>>,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                contents: Vec<Content<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                candidates: Vec<Candidate>,
            }
            #[derive(Deserialize)]
            struct Candidate {
                content: CandidateContent,
            }
            #[derive(Deserialize)]
            struct CandidateContent {
                #[serde(default)]
                parts: Vec<CandidatePart>,
            }
            #[derive(Deserialize)]
            struct CandidatePart {
                #[serde(default)]
                text: String,
            }

            let full = format!(
                "You are a fact-checking expert. Respond concisely and factually. {prompt}"
            );
            let req = Req {
                contents: vec![Content {
                    parts: vec![Part { text: &full }],
                }],
            };
            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            );

            let resp = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| warn!(provider = "gemini", error = %e, "request failed"))
                .ok()?;

            if !resp.status().is_success() {
                warn!(provider = "gemini", status = %resp.status(), "non-success status");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let text = body
                .candidates
                .first()
                .map(|c| {
                    c.content
                        .parts
                        .iter()
                        .map(|p| p.text.as_str())
                        .collect::<String>()
                })
                .unwrap_or_default();
            let text = text.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }
    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Returns `None` always; used when generation is disabled.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate<'a>(&'a self, _prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async { None })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed answer for tests/local runs.
#[derive(Clone)]
pub struct MockGenerator {
    pub fixed: String,
}

impl MockGenerator {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
        }
    }
}

impl TextGenerator for MockGenerator {
    fn generate<'a>(&'a self, _prompt: &'a str) -> GenerateFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Some(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching wrapper (file cache + daily limit)
// ------------------------------------------------------------

/// Counter state is guarded by a `Mutex`; cache files are written atomically.
pub struct CachingGenerator<P: TextGenerator> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Arc<Mutex<DailyCounter>>,
}

impl<P: TextGenerator> CachingGenerator<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir); // best-effort
        let counter = Arc::new(Mutex::new(
            load_daily_counter(&cache_dir).unwrap_or_default(),
        ));
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    /// Real calls made today (cache hits excluded).
    pub fn calls_today(&self) -> u32 {
        self.counter.lock().map(|g| g.count).unwrap_or(0)
    }

    async fn generate_impl(&self, prompt: &str) -> Option<String> {
        let key = cache_key(prompt);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            debug!(provider = self.inner.name(), %key, "generation cache hit");
            return Some(hit.text);
        }

        // Only real calls count against the limit.
        {
            let mut g = self.counter.lock().ok()?;
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit_max {
                warn!(provider = self.inner.name(), limit = self.daily_limit_max, "daily generation limit reached");
                return None;
            }
        }

        let fresh = self.inner.generate(prompt).await?;
        let _ = write_cache_file(
            &self.cache_dir,
            &key,
            &CachedText {
                text: fresh.clone(),
            },
        );
        if let Ok(mut g) = self.counter.lock() {
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
        Some(fresh)
    }
}

impl<P: TextGenerator> TextGenerator for CachingGenerator<P> {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(self.generate_impl(prompt))
    }
    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedText {
    text: String,
}

fn cache_key(prompt: &str) -> String {
    crate::storage::sha256_hex(prompt)
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<CachedText> {
    let buf = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&buf).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &CachedText) -> io::Result<()> {
    let path = cache_path(dir, key);
    let json = serde_json::to_string(value).map_err(io::Error::other)?;
    write_atomic(&path, json.as_bytes())
}

/// Write via a sibling temp file and rename, so readers never see half a file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

// ------------------------------------------------------------
// Daily counter
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let s = serde_json::to_string(dc).map_err(io::Error::other)?;
    write_atomic(&counter_path(dir), s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn cache_key_is_stable_sha256() {
        assert_eq!(
            cache_key("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(cache_key("hello"), cache_key("hello "));
    }

    struct Counting {
        calls: Arc<AtomicU32>,
    }

    impl TextGenerator for Counting {
        fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = format!("echo: {prompt}");
            Box::pin(async move { Some(out) })
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn cache_hits_skip_provider_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let gen = CachingGenerator::new(
            Counting {
                calls: calls.clone(),
            },
            dir.path().to_path_buf(),
            1,
        );

        assert_eq!(gen.generate("a").await.as_deref(), Some("echo: a"));
        assert_eq!(gen.generate("a").await.as_deref(), Some("echo: a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(gen.calls_today(), 1);

        // limit of 1 reached: a new prompt is refused
        assert!(gen.generate("b").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_returns_none() {
        assert!(DisabledGenerator.generate("x").await.is_none());
    }
}
