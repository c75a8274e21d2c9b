//! Shared in-process fakes for the controller integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use company_logo_cache::client::{LogoBlob, LogoBlobFetcher, LogoFetch, SettingsClient};
use company_logo_cache::errors::{LogoCacheError, LogoCacheResult};
use company_logo_cache::models::{CompanySettings, LogoSettings};
use company_logo_cache::services::logo_cache::{CacheConfig, LogoCacheController};
use company_logo_cache::storage::{DEFAULT_STORAGE_KEY, MemoryKeyValueStore, PersistentLogoStore};
use company_logo_cache::utils::ManualClock;

pub const NOW: i64 = 1_700_000_000_000;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Replies are consumed in order; the last one repeats
pub struct FakeSettingsClient {
    replies: Mutex<VecDeque<Result<LogoSettings, String>>>,
    calls: AtomicUsize,
}

impl FakeSettingsClient {
    pub fn returning(settings: LogoSettings) -> Self {
        Self::with_replies(vec![Ok(settings)])
    }

    pub fn failing(message: &str) -> Self {
        Self::with_replies(vec![Err(message.to_string())])
    }

    pub fn with_replies(replies: Vec<Result<LogoSettings, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsClient for FakeSettingsClient {
    async fn get_company_settings(&self) -> LogoCacheResult<CompanySettings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        };
        reply
            .map(|logo_settings| CompanySettings { logo_settings })
            .map_err(LogoCacheError::settings)
    }
}

#[derive(Clone)]
pub enum FetchReply {
    Image { bytes: Vec<u8>, content_type: String },
    NotFound,
    Status(u16),
}

impl FetchReply {
    pub fn png(width: u32, height: u32) -> Self {
        Self::Image {
            bytes: png(width, height),
            content_type: "image/png".to_string(),
        }
    }
}

/// Blob fetcher whose downloads of selected ids wait for [`Self::release`]
pub struct FakeLogoFetcher {
    reply: Mutex<FetchReply>,
    calls: AtomicUsize,
    gated_ids: Mutex<HashSet<String>>,
    gate: Semaphore,
}

impl FakeLogoFetcher {
    pub fn new(reply: FetchReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            gated_ids: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
        }
    }

    pub fn set_reply(&self, reply: FetchReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn hold(&self, file_id: &str) {
        self.gated_ids.lock().unwrap().insert(file_id.to_string());
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetcher was not called in time");
    }
}

#[async_trait]
impl LogoBlobFetcher for FakeLogoFetcher {
    async fn fetch_logo(&self, file_id: &str) -> LogoCacheResult<LogoFetch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gated = self.gated_ids.lock().unwrap().contains(file_id);
        if gated {
            self.gate.acquire().await.unwrap().forget();
        }

        match self.reply.lock().unwrap().clone() {
            FetchReply::Image {
                bytes,
                content_type,
            } => Ok(LogoFetch::Found(LogoBlob {
                bytes,
                content_type,
            })),
            FetchReply::NotFound => Ok(LogoFetch::NotFound),
            FetchReply::Status(status) => Err(LogoCacheError::remote(status, "server error")),
        }
    }
}

pub struct Harness {
    pub controller: LogoCacheController,
    pub settings: Arc<FakeSettingsClient>,
    pub fetcher: Arc<FakeLogoFetcher>,
    pub backend: Arc<MemoryKeyValueStore>,
    pub store: PersistentLogoStore,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(settings: FakeSettingsClient, fetcher: FakeLogoFetcher) -> Self {
        Self::with_config(settings, fetcher, CacheConfig::embedded())
    }

    pub fn with_config(
        settings: FakeSettingsClient,
        fetcher: FakeLogoFetcher,
        config: CacheConfig,
    ) -> Self {
        let settings = Arc::new(settings);
        let fetcher = Arc::new(fetcher);
        let backend = Arc::new(MemoryKeyValueStore::new());
        let store = PersistentLogoStore::new(backend.clone(), DEFAULT_STORAGE_KEY);
        let clock = Arc::new(ManualClock::new(NOW));

        let controller =
            LogoCacheController::builder(settings.clone(), fetcher.clone(), store.clone())
                .clock(clock.clone())
                .config(config)
                .build();

        Self {
            controller,
            settings,
            fetcher,
            backend,
            store,
            clock,
        }
    }
}
