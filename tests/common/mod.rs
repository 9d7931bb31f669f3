//! Shared test harness for integration tests.
//!
//! [`TestHarness`] wires a [`JobManager`] over a DB (in memory unless a
//! test asks for a file), temp storage
//! directories and a [`ManualClock`], starts the worker pool and serves the
//! router on a random port. Conversions go through a [`StubConverter`]
//! unless a test asks for the real [`SystemConverter`].

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nb_convert::{
    Capability, CapabilityRegistry, ConversionRequest, Converter, Dispatcher, SystemConverter,
    ToolRegistry,
};
use nb_core::config::Config;
use nb_core::{Clock, Error, JobId, ManualClock};
use nb_db::pool::{init_memory_pool, init_pool, DbPool};
use nb_server::context::AppContext;
use nb_server::jobs::queue::TaskReceiver;
use nb_server::jobs::worker::spawn_workers;
use nb_server::jobs::JobManager;
use nb_server::router::build_router;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Key accepted by every harness server.
pub const API_KEY: &str = "test-key";
/// Second accepted key, for per-key tests.
pub const OTHER_KEY: &str = "other-key";

/// What a [`StubConverter`] does when asked to convert.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write `converted:` followed by the input bytes.
    Copy,
    /// Report success without writing anything.
    Silent,
    /// Fail with the given message.
    Fail(String),
    /// Sleep, then behave like `Copy`.
    Sleep(Duration),
    /// Wait for [`StubConverter::release`], then behave like `Copy`.
    Gated,
    /// Panic with the given message on the first call, then behave like
    /// `Copy`.
    PanicOnce(String),
}

/// Scriptable converter that counts its calls.
#[derive(Debug)]
pub struct StubConverter {
    behavior: Behavior,
    gate: Semaphore,
    calls: AtomicUsize,
}

impl StubConverter {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Let `n` gated conversions proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn write_copy(request: &ConversionRequest) -> nb_core::Result<()> {
    let mut bytes = b"converted:".to_vec();
    bytes.extend(tokio::fs::read(&request.input).await?);
    tokio::fs::write(&request.output, bytes).await?;
    Ok(())
}

#[async_trait]
impl Converter for StubConverter {
    async fn convert(&self, capability: Capability, request: &ConversionRequest) -> nb_core::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Copy => write_copy(request).await,
            Behavior::Silent => Ok(()),
            Behavior::Fail(message) => Err(Error::conversion(capability, message)),
            Behavior::Sleep(d) => {
                tokio::time::sleep(*d).await;
                write_copy(request).await
            }
            Behavior::Gated => {
                self.gate
                    .acquire()
                    .await
                    .map_err(|e| Error::Internal(e.to_string()))?
                    .forget();
                write_copy(request).await
            }
            Behavior::PanicOnce(message) => {
                if call == 0 {
                    panic!("{message}");
                }
                write_copy(request).await
            }
        }
    }
}

/// Configuration used by every harness, rooted in a temp directory.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.server.db_path = root.join("nodeblack.db");
    config.storage.input_dir = root.join("input");
    config.storage.output_dir = root.join("output");
    config.auth.enabled = true;
    config.auth.api_keys = vec![API_KEY.into(), OTHER_KEY.into()];
    config.auth.rate_limit_per_minute = 0;
    config.jobs.workers = 2;
    config.jobs.queue_capacity = 16;
    config
}

/// Builder for [`TestHarness`].
pub struct HarnessBuilder {
    dirs: TempDir,
    config: Config,
    registry: CapabilityRegistry,
    stub: Option<Arc<StubConverter>>,
    workers: bool,
    file_db: bool,
}

impl HarnessBuilder {
    pub fn config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.stub = Some(Arc::new(StubConverter::new(behavior)));
        self
    }

    /// Convert with the real backends (image conversion needs no tools).
    pub fn system_converter(mut self) -> Self {
        self.stub = None;
        self
    }

    /// Leave the queue undrained; the receiver is kept on the harness.
    pub fn without_workers(mut self) -> Self {
        self.workers = false;
        self
    }

    /// Use a WAL database file under the temp dir instead of memory.
    pub fn file_db(mut self) -> Self {
        self.file_db = true;
        self
    }

    pub async fn start(self) -> TestHarness {
        let db = if self.file_db {
            init_pool(&self.config.server.db_path).expect("failed to create file pool")
        } else {
            init_memory_pool().expect("failed to create in-memory pool")
        };
        let clock = Arc::new(ManualClock::starting_now());
        let tools = Arc::new(ToolRegistry::empty());
        let converter: Arc<dyn Converter> = match &self.stub {
            Some(stub) => stub.clone(),
            None => Arc::new(SystemConverter::new(tools.clone())),
        };

        let (manager, rx) = JobManager::new(
            &self.config,
            db.clone(),
            clock.clone() as Arc<dyn Clock>,
            Dispatcher::new(Arc::new(self.registry)),
            converter,
        );
        let jobs = Arc::new(manager);
        let ctx = AppContext::new(Arc::new(self.config), db.clone(), jobs.clone(), tools);

        let cancel = CancellationToken::new();
        let rx = if self.workers {
            let workers = ctx.config.jobs.workers;
            spawn_workers(jobs.clone(), rx, workers, cancel.clone());
            None
        } else {
            Some(rx)
        };

        let app = build_router(ctx.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        TestHarness {
            addr,
            ctx,
            db,
            jobs,
            clock,
            stub: self.stub,
            rx,
            client: reqwest::Client::new(),
            cancel,
            _dirs: self.dirs,
        }
    }
}

/// A running server plus handles on its internals.
pub struct TestHarness {
    pub addr: SocketAddr,
    pub ctx: AppContext,
    pub db: DbPool,
    pub jobs: Arc<JobManager>,
    pub clock: Arc<ManualClock>,
    pub stub: Option<Arc<StubConverter>>,
    pub rx: Option<TaskReceiver>,
    pub client: reqwest::Client,
    cancel: CancellationToken,
    _dirs: TempDir,
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        let dirs = tempfile::tempdir().expect("failed to create temp dir");
        let config = test_config(dirs.path());
        HarnessBuilder {
            dirs,
            config,
            registry: CapabilityRegistry::all_available(),
            stub: Some(Arc::new(StubConverter::new(Behavior::Copy))),
            workers: true,
            file_db: false,
        }
    }

    /// Copy converter, default config.
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn stub(&self) -> &StubConverter {
        self.stub.as_deref().expect("harness uses the system converter")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// POST /api/convert with `key`.
    pub async fn submit_with_key(
        &self,
        key: Option<&str>,
        filename: &str,
        bytes: Vec<u8>,
        target: &str,
    ) -> reqwest::Response {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("target_format", target.to_string());
        let mut req = self.client.post(self.url("/api/convert")).multipart(form);
        if let Some(key) = key {
            req = req.header("X-API-Key", key);
        }
        req.send().await.expect("submit request failed")
    }

    pub async fn submit(&self, filename: &str, bytes: &[u8], target: &str) -> reqwest::Response {
        self.submit_with_key(Some(API_KEY), filename, bytes.to_vec(), target)
            .await
    }

    /// Submit and return the task id, asserting 202.
    pub async fn submit_ok(&self, filename: &str, bytes: &[u8], target: &str) -> String {
        let resp = self.submit(filename, bytes, target).await;
        assert_eq!(resp.status(), 202, "submit of {filename} -> {target} rejected");
        let body: Value = resp.json().await.expect("submit body");
        body["task_id"].as_str().expect("task_id").to_string()
    }

    pub async fn status(&self, task_id: &str) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/api/status/{task_id}")))
            .send()
            .await
            .expect("status request failed");
        assert_eq!(resp.status(), 200);
        resp.json().await.expect("status body")
    }

    /// Poll status until it reports `want`, failing after five seconds.
    pub async fn wait_for(&self, task_id: &str, want: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let body = self.status(task_id).await;
            if body["status"] == want {
                return body;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task {task_id} never reached {want}; last status {body}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn download(&self, task_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/download/{task_id}")))
            .send()
            .await
            .expect("download request failed")
    }

    pub fn job_id(task_id: &str) -> JobId {
        task_id.parse().expect("valid task id")
    }

    pub fn output_path(&self, task_id: &str, target: &str) -> std::path::PathBuf {
        self.jobs.output_path(Self::job_id(task_id), target)
    }
}

/// A small PNG with an alpha channel.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(8, 8, |x, y| {
        image::Rgba([(x * 30) as u8, (y * 30) as u8, 128, if x < 4 { 255 } else { 64 }])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
