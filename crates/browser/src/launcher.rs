//! Launches the shell's Chrome instance and hands out one page target per tab.

use async_trait::async_trait;
use sentoogle_core::config::WindowConfig;
use sentoogle_core::{Error, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::cdp::CdpClient;
use crate::cdp_surface::CdpSurface;
use crate::registry::TabId;
use crate::surface::{RenderSurface, SurfaceEventSender, SurfaceFactory, BLANK_URL};

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit browser binary; searched on the system when `None`.
    pub browser_path: Option<String>,
    pub profile_dir: PathBuf,
    pub headless: bool,
    pub window: WindowConfig,
}

/// A running Chrome connected at the browser level.
pub struct BrowserHost {
    process: Child,
    debug_port: u16,
    browser: Arc<CdpClient>,
    window: WindowConfig,
}

impl BrowserHost {
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let browser_path = match options.browser_path.clone() {
            Some(p) => p,
            None => find_browser_binary()
                .ok_or_else(|| Error::Launch("Chrome, Chromium or Edge not found. Please install one or set shell.browserPath.".to_string()))?,
        };

        std::fs::create_dir_all(&options.profile_dir)?;
        let debug_port = find_free_port().await?;
        let args = build_browser_args(debug_port, &options.profile_dir, options.headless, &options.window);

        info!(
            browser = %browser_path,
            port = debug_port,
            headless = options.headless,
            "Launching browser"
        );

        let process = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Launch(format!("Failed to launch {}: {}", browser_path, e)))?;

        let browser_ws_url = wait_for_cdp_ready(debug_port, Duration::from_secs(15)).await?;
        let browser = Arc::new(CdpClient::connect(&browser_ws_url).await?);

        let host = Self {
            process,
            debug_port,
            browser,
            window: options.window,
        };
        host.minimize_startup_windows().await;
        info!(port = debug_port, "Browser ready");
        Ok(host)
    }

    /// The startup window is never a tab; keep it out of the way.
    async fn minimize_startup_windows(&self) {
        let targets = match self.browser.send_command("Target.getTargets", json!({})).await {
            Ok(v) => v.get("targetInfos").and_then(|t| t.as_array()).cloned().unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "Could not list startup targets");
                return;
            }
        };
        for target in targets.iter().filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page")) {
            let Some(target_id) = target.get("targetId").and_then(|v| v.as_str()) else {
                continue;
            };
            let window = self
                .browser
                .send_command("Browser.getWindowForTarget", json!({ "targetId": target_id }))
                .await
                .ok()
                .and_then(|v| v.get("windowId").and_then(|w| w.as_i64()));
            if let Some(window_id) = window {
                let _ = self
                    .browser
                    .send_command(
                        "Browser.setWindowBounds",
                        json!({ "windowId": window_id, "bounds": { "windowState": "minimized" } }),
                    )
                    .await;
            }
        }
    }

    /// Ask Chrome to exit; the process is killed on drop if it lingers.
    pub async fn shutdown(&self) {
        if let Err(e) = self.browser.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

#[async_trait]
impl SurfaceFactory for BrowserHost {
    async fn create_surface(
        &self,
        tab_id: &TabId,
        events: SurfaceEventSender,
    ) -> Result<Box<dyn RenderSurface>> {
        let created = self
            .browser
            .send_command(
                "Target.createTarget",
                json!({
                    "url": BLANK_URL,
                    "newWindow": true,
                    "background": true,
                    "width": self.window.width,
                    "height": self.window.height,
                }),
            )
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Surface("No targetId returned from createTarget".to_string()))?
            .to_string();

        let page_ws_url = format!("ws://127.0.0.1:{}/devtools/page/{}", self.debug_port, target_id);
        debug!(tab = %tab_id, target = %target_id, "Created page target");

        let surface =
            CdpSurface::attach_to_target(tab_id, target_id, &page_ws_url, self.browser.clone(), events).await?;
        // Hidden until the compositor attaches it.
        if let Err(e) = surface.detach().await {
            debug!(tab = %tab_id, error = %e, "Could not minimize new surface");
        }
        Ok(Box::new(surface))
    }
}

fn build_browser_args(debug_port: u16, profile_dir: &Path, headless: bool, window: &WindowConfig) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--password-store=basic".to_string(),
        format!("--window-size={},{}", window.width, window.height),
        format!("--window-position={},{}", window.x, window.y),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    args.push(BLANK_URL.to_string());
    args
}

/// Find a Chromium-family browser binary on the system.
pub fn find_browser_binary() -> Option<String> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "microsoft-edge",
        ]
    } else {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the browser endpoint answers.
async fn wait_for_cdp_ready(port: u16, timeout: Duration) -> Result<String> {
    let start = Instant::now();
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "Browser CDP not ready after {}s on port {}",
                timeout.as_secs(),
                port
            )));
        }

        match reqwest::get(&url).await {
            Ok(resp) => {
                if let Ok(body) = resp.json::<Value>().await {
                    if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                        return Ok(ws_url.to_string());
                    }
                }
            }
            Err(e) => debug!(error = %e, "CDP endpoint not up yet"),
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_args() {
        let window = WindowConfig {
            x: 10,
            y: 20,
            width: 1200,
            height: 800,
        };
        let args = build_browser_args(9333, Path::new("/tmp/profile"), true, &window);
        assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
        assert!(args.contains(&"--window-size=1200,800".to_string()));
        assert!(args.contains(&"--window-position=10,20".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(BLANK_URL));

        let headed = build_browser_args(9333, Path::new("/tmp/profile"), false, &window);
        assert!(!headed.iter().any(|a| a.starts_with("--headless")));
    }

    #[tokio::test]
    async fn test_find_free_port() {
        assert!(find_free_port().await.unwrap() > 0);
    }
}
