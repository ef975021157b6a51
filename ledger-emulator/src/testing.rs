// SPDX-License-Identifier: Apache-2.0

//! In-process stand-in for the emulator: REST API, APDU port and a sleeping
//! child process

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
};

use crate::config::{DeviceModel, SessionConfig, SnapshotConfig};

pub const MAIN_MENU_SHADE: u8 = 0;
pub const CONFIGURATION: [u8; 4] = [0x00, 1, 9, 17];

pub fn png(shade: u8) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([shade, shade, shade])))
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out
}

/// Signature answer `v || r || s`
pub fn vrs(v: u8) -> Vec<u8> {
    let mut data = vec![v];
    data.extend([0x11; 32]);
    data.extend([0x22; 32]);
    data
}

/// Reads one HTTP request, headers and body
pub async fn read_http_request(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request_complete(&request) {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&request).to_string()
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..end]
        .lines()
        .find_map(|line| {
            line.to_ascii_lowercase()
                .strip_prefix("content-length:")
                .and_then(|value| value.trim().parse::<usize>().ok())
        })
        .unwrap_or(0);
    request.len() >= end + 4 + content_length
}

pub async fn write_http_response(socket: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let mut response = format!(
        "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    socket.write_all(&response).await.unwrap();
}

/// Device side of the fake
#[derive(Default)]
pub struct FakeDevice {
    screen: Mutex<Vec<u8>>,
    presses: Mutex<Vec<String>>,
    reviewing: AtomicBool,
    /// Answer signing requests with `0x6a80` instead of opening a review
    pub reject_signing: AtomicBool,
    approved: Notify,
}

impl FakeDevice {
    pub fn presses(&self) -> Vec<String> {
        self.presses.lock().unwrap().clone()
    }

    fn set_screen(&self, shade: u8) {
        *self.screen.lock().unwrap() = png(shade);
    }

    fn press(&self, button: &str) {
        let mut presses = self.presses.lock().unwrap();
        presses.push(button.to_string());

        if !self.reviewing.load(Ordering::SeqCst) {
            return;
        }
        if button == "both" {
            self.reviewing.store(false, Ordering::SeqCst);
            self.set_screen(MAIN_MENU_SHADE);
            self.approved.notify_one();
        } else {
            // every press lands on a new review screen
            self.set_screen(50 + 10 * presses.len() as u8);
        }
    }

    async fn answer(&self, frame: &[u8]) -> (Vec<u8>, u16) {
        match frame[1] {
            0x06 => (CONFIGURATION.to_vec(), 0x9000),
            0x04 | 0x08 if self.reject_signing.load(Ordering::SeqCst) => (vec![], 0x6a80),
            0x04 | 0x08 => {
                self.reviewing.store(true, Ordering::SeqCst);
                self.set_screen(50);
                self.approved.notified().await;
                (vrs(0x26), 0x9000)
            }
            _ => (vec![], 0x6d00),
        }
    }
}

pub struct FakeSpeculos {
    pub config: SessionConfig,
    pub device: Arc<FakeDevice>,
    root: PathBuf,
}

impl FakeSpeculos {
    pub async fn start(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "ledger-emulator-fake-{}-{}",
            name,
            std::process::id()
        ));
        tokio::fs::create_dir_all(&root).await.unwrap();

        // run through `sh`, which ignores the emulator flags
        let script = root.join("speculos.sh");
        tokio::fs::write(&script, "exec sleep 60\n").await.unwrap();

        let device = Arc::new(FakeDevice::default());
        device.set_screen(MAIN_MENU_SHADE);

        let api = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let apdu = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_port = api.local_addr().unwrap().port();
        let apdu_port = apdu.local_addr().unwrap().port();

        tokio::spawn(serve_api(api, device.clone()));
        tokio::spawn(serve_apdu(apdu, device.clone()));

        let config = SessionConfig::new(DeviceModel::NanoS, root.join("elfs"))
            .with_speculos_bin("sh")
            .with_app(&script)
            .with_ports(apdu_port, api_port)
            .with_start_delay(Duration::ZERO)
            .with_start_timeout(Duration::from_secs(5))
            .with_screen_change_timeout(Duration::from_secs(5))
            .with_snapshots(
                SnapshotConfig::new(root.join("golden"))
                    .with_tmp_dir(root.join("tmp"))
                    .updating(true),
            );

        Self {
            config,
            device,
            root,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl Drop for FakeSpeculos {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

async fn serve_api(listener: TcpListener, device: Arc<FakeDevice>) {
    while let Ok((mut socket, _)) = listener.accept().await {
        let device = device.clone();
        tokio::spawn(async move {
            let request = read_http_request(&mut socket).await;
            let line = request.lines().next().unwrap_or_default().to_string();

            if line.starts_with("GET /events") {
                let body = br#"{"events":[{"text":"Application","x":20,"y":3},{"text":"is ready","x":35,"y":17}]}"#;
                write_http_response(&mut socket, "200 OK", "application/json", body).await;
            } else if line.starts_with("GET /screenshot") {
                let screen = device.screen.lock().unwrap().clone();
                write_http_response(&mut socket, "200 OK", "image/png", &screen).await;
            } else if let Some(rest) = line.strip_prefix("POST /button/") {
                let button = rest.split(' ').next().unwrap_or_default();
                device.press(button);
                write_http_response(&mut socket, "200 OK", "application/json", b"{}").await;
            } else {
                write_http_response(&mut socket, "404 Not Found", "text/plain", b"").await;
            }
        });
    }
}

async fn serve_apdu(listener: TcpListener, device: Arc<FakeDevice>) {
    while let Ok((mut socket, _)) = listener.accept().await {
        loop {
            let mut len = [0u8; 4];
            if socket.read_exact(&mut len).await.is_err() {
                break;
            }
            let mut frame = vec![0u8; u32::from_be_bytes(len) as usize];
            if socket.read_exact(&mut frame).await.is_err() {
                break;
            }

            let (data, sw) = device.answer(&frame).await;
            let mut out = (data.len() as u32).to_be_bytes().to_vec();
            out.extend_from_slice(&data);
            out.extend_from_slice(&sw.to_be_bytes());
            if socket.write_all(&out).await.is_err() {
                break;
            }
        }
    }
}
