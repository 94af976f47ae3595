// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{round_rating, Extraction, ScrapeError, ScrapeStrategy};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// 页面加载完成的标记
pub const READY_MARKER: &str = ".Roku-User-Channels";
const NAME_SELECTOR: &str = r#"h1[itemprop="name"]"#;
const RATING_SELECTOR: &str = r#"span[itemprop="averageRating"]"#;
const RATING_COUNT_SELECTOR: &str = r#"small[itemprop="starRating"]"#;
const RATING_COUNT_SUFFIX: &str = "ratings";
const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// 解析远程浏览器的调试地址
///
/// `ws://` 与 `wss://` 地址原样返回；`http(s)://` 地址通过 `/json/version` 查询，
/// 并把返回地址中的 `localhost` 替换为端点自身的主机与端口
///
/// # 参数
///
/// * `endpoint` - 配置的浏览器端点
///
/// # 返回值
///
/// * `Ok(String)` - 可直接连接的 WebSocket 地址
/// * `Err(ScrapeError)` - 端点无效或查询失败
pub async fn resolve_debugger_url(endpoint: &str) -> Result<String, ScrapeError> {
    let parsed = Url::parse(endpoint).map_err(|e| ScrapeError::Browser(format!("invalid endpoint {}: {}", endpoint, e)))?;

    match parsed.scheme() {
        "ws" | "wss" => return Ok(endpoint.to_string()),
        "http" | "https" => {}
        other => {
            return Err(ScrapeError::Browser(format!(
                "unsupported endpoint scheme: {}",
                other
            )))
        }
    }

    let authority = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(ScrapeError::Browser(format!("endpoint has no host: {}", endpoint))),
    };

    let version_url = parsed
        .join("/json/version")
        .map_err(|e| ScrapeError::Browser(e.to_string()))?;

    // Chrome only answers the discovery endpoint for a localhost Host header
    let info: VersionInfo = reqwest::Client::new()
        .get(version_url)
        .header(reqwest::header::HOST, "localhost")
        .send()
        .await
        .map_err(|e| ScrapeError::Browser(format!("browser discovery failed: {}", e)))?
        .json()
        .await
        .map_err(|e| ScrapeError::Browser(format!("browser discovery failed: {}", e)))?;

    Ok(info.web_socket_debugger_url.replacen("localhost", &authority, 1))
}

/// 从三个文本节点中解析频道字段
///
/// 评分人数文本中包含评分值与 `ratings` 后缀，各去除第一次出现后再解析整数
pub fn parse_channel_fields(
    name: &str,
    rating_text: &str,
    count_text: &str,
) -> Result<Extraction, ScrapeError> {
    let rating: f64 = rating_text
        .trim()
        .parse()
        .map_err(|e| ScrapeError::Parse(format!("rating {:?}: {}", rating_text, e)))?;

    let remainder = count_text
        .replacen(rating_text, "", 1)
        .replacen(RATING_COUNT_SUFFIX, "", 1);
    let remainder = remainder.trim_matches(|c| c == ' ' || c == '\n');

    let rating_count: u32 = remainder
        .parse()
        .map_err(|e| ScrapeError::Parse(format!("rating count {:?}: {}", count_text, e)))?;

    Ok(Extraction {
        app_name: name.trim().to_string(),
        rating: round_rating(rating),
        rating_count,
    })
}

/// 可关闭的页面
#[async_trait]
pub trait ClosePage: Send + 'static {
    async fn close_page(self) -> Result<(), String>;
}

#[async_trait]
impl ClosePage for Page {
    async fn close_page(self) -> Result<(), String> {
        self.close().await.map_err(|e| e.to_string())
    }
}

/// 页面守卫
///
/// 抓取被超时或取消打断时，守卫在析构中派发关闭任务，保证远程标签页被关闭
pub struct PageGuard<P: ClosePage> {
    page: Option<P>,
}

impl<P: ClosePage> PageGuard<P> {
    pub fn new(page: P) -> Self {
        Self { page: Some(page) }
    }

    /// 正常路径：等待页面关闭
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close_page().await {
                tracing::debug!("Failed to close page: {}", e);
            }
        }
    }
}

impl<P: ClosePage> Drop for PageGuard<P> {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close_page().await {
                        tracing::debug!("Failed to close abandoned page: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime available, abandoned page left open"),
        }
    }
}

struct LiveConnection<T> {
    value: Arc<T>,
    alive: Arc<AtomicBool>,
}

/// 共享连接槽
///
/// 连接断开（事件循环退出）或被标记失效后，下一次获取会重新建立连接
pub struct ConnectionSlot<T> {
    slot: Mutex<Option<LiveConnection<T>>>,
}

impl<T> Default for ConnectionSlot<T> {
    fn default() -> Self {
        Self { slot: Mutex::new(None) }
    }
}

impl<T> ConnectionSlot<T> {
    /// 获取当前连接，不存在或已断开时调用 `connect` 重建
    ///
    /// # 参数
    ///
    /// * `connect` - 建立连接，返回连接及其存活标志
    pub async fn get_or_connect<F, Fut>(&self, connect: F) -> Result<Arc<T>, ScrapeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, Arc<AtomicBool>), ScrapeError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.as_ref() {
            if conn.alive.load(Ordering::SeqCst) {
                return Ok(conn.value.clone());
            }
            tracing::warn!("Browser connection lost, reconnecting");
        }

        let (value, alive) = connect().await?;
        let value = Arc::new(value);
        *slot = Some(LiveConnection {
            value: value.clone(),
            alive,
        });
        Ok(value)
    }

    /// 丢弃失效连接；槽中已换成新连接时不做任何事
    pub async fn invalidate(&self, stale: &Arc<T>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|conn| Arc::ptr_eq(&conn.value, stale)) {
            *slot = None;
        }
    }
}

/// 浏览器抓取策略
///
/// 连接远程 Chrome 实例，等待频道页面渲染后读取评分节点。
/// 浏览器连接在首次使用时建立，由同一策略实例的所有调用共享，断开后自动重连。
pub struct BrowserEngine {
    endpoint: String,
    wait_timeout: Duration,
    browser: ConnectionSlot<Browser>,
}

impl BrowserEngine {
    pub fn new(endpoint: impl Into<String>, wait_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            wait_timeout,
            browser: ConnectionSlot::default(),
        }
    }

    async fn connect(&self) -> Result<(Browser, Arc<AtomicBool>), ScrapeError> {
        let ws_url = resolve_debugger_url(&self.endpoint).await?;
        tracing::info!("Connecting to remote Chrome instance at: {}", ws_url);

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| ScrapeError::Browser(format!("failed to connect to remote Chrome: {}", e)))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = alive.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
            tracing::warn!("Browser event loop stopped");
        });

        Ok((browser, alive))
    }

    async fn wait_for_marker(&self, page: &Page) -> Result<(), ScrapeError> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        loop {
            if page.find_element(READY_MARKER).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Wait(READY_MARKER.to_string()));
            }
            tokio::time::sleep(MARKER_POLL_INTERVAL).await;
        }
    }

    async fn read_text(page: &Page, selector: &str) -> Result<String, ScrapeError> {
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::Parse(format!("element {} not found: {}", selector, e)))?;

        let text = element
            .inner_text()
            .await
            .map_err(|e| ScrapeError::Parse(format!("read {} failed: {}", selector, e)))?;

        Ok(text.unwrap_or_default())
    }

    async fn scrape_page(&self, page: &Page, url: &str) -> Result<Extraction, ScrapeError> {
        page.goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;
        self.wait_for_marker(page).await?;

        let name = Self::read_text(page, NAME_SELECTOR).await?;
        let rating = Self::read_text(page, RATING_SELECTOR).await?;
        let count = Self::read_text(page, RATING_COUNT_SELECTOR).await?;

        parse_channel_fields(&name, &rating, &count)
    }
}

#[async_trait]
impl ScrapeStrategy for BrowserEngine {
    async fn extract(&self, url: &str) -> Result<Extraction, ScrapeError> {
        let browser = self.browser.get_or_connect(|| self.connect()).await?;

        // Open a blank tab first so the guard owns it before navigation starts
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                self.browser.invalidate(&browser).await;
                return Err(ScrapeError::Browser(format!("failed to open page: {}", e)));
            }
        };
        let guard = PageGuard::new(page.clone());

        let result = self.scrape_page(&page, url).await;
        guard.close().await;

        result
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
