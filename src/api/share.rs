//! Public share surface: an HTML result page and a 1200x630 result card
//! usable as its `og:image`.

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::store::StoredResult;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

const CARD_WIDTH: u32 = 1200;
const CARD_HEIGHT: u32 = 630;
const CARD_CACHE: &str = "public, max-age=3600";

const BACKGROUND: Rgba<u8> = Rgba([15, 15, 35, 255]);
const TRACK: Rgba<u8> = Rgba([40, 40, 70, 255]);
const DOWNLOAD_COLOR: Rgba<u8> = Rgba([0, 200, 255, 255]);
const UPLOAD_COLOR: Rgba<u8> = Rgba([170, 90, 255, 255]);
const PING_COLOR: Rgba<u8> = Rgba([255, 200, 0, 255]);

/// Ping at or above this fills the whole ping bar
const PING_SCALE_MS: f64 = 200.0;

const BAR_X: u32 = 100;
const BAR_WIDTH: u32 = 1000;
const BAR_HEIGHT: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShareFormat {
    Page,
    Png,
    Svg,
}

/// Split `abc123.png` into the code and the requested rendering
fn parse_share_path(raw: &str) -> (&str, ShareFormat) {
    if let Some(code) = raw.strip_suffix(".png") {
        (code, ShareFormat::Png)
    } else if let Some(code) = raw.strip_suffix(".svg") {
        (code, ShareFormat::Svg)
    } else {
        (raw, ShareFormat::Page)
    }
}

/// `GET /share/:code` and `GET /s/:code`, with `.png` / `.svg` suffixes
/// selecting the result card. Only page views count toward `share_views`.
pub(crate) async fn share_page(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Response> {
    let (code, format) = parse_share_path(&raw);
    let mut stored = state
        .store
        .get_by_share_code(code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("share {code}")))?;

    match format {
        ShareFormat::Page => {
            state.store.increment_share_views(code).await?;
            stored.share_views += 1;
            Ok(Html(render_share_html(code, &stored)).into_response())
        }
        ShareFormat::Svg => Ok((
            [
                (header::CONTENT_TYPE, "image/svg+xml"),
                (header::CACHE_CONTROL, CARD_CACHE),
            ],
            render_share_svg(&stored),
        )
            .into_response()),
        ShareFormat::Png => {
            let png = render_share_png(&stored)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "image/png"),
                    (header::CACHE_CONTROL, CARD_CACHE),
                ],
                png,
            )
                .into_response())
        }
    }
}

fn tested_at(stored: &StoredResult) -> String {
    stored.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn render_share_html(code: &str, stored: &StoredResult) -> String {
    let r = &stored.result;
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Speed Test Result - speedcore</title>
    <meta property="og:title" content="{down:.1} Mbps down / {up:.1} Mbps up">
    <meta property="og:image" content="/s/{code}.png">
  </head>
  <body>
    <h1>Speed Test Result</h1>
    <p>Download: {down:.1} Mbps</p>
    <p>Upload: {up:.1} Mbps</p>
    <p>Ping: {ping:.1} ms (jitter {jitter:.1} ms)</p>
    <p>Packet loss: {loss:.0}%</p>
    <p>Tested: {when}</p>
    <p>Views: {views}</p>
  </body>
</html>
"#,
        down = r.download_mbps,
        up = r.upload_mbps,
        ping = r.ping_ms,
        jitter = r.jitter_ms,
        loss = r.packet_loss_pct,
        when = tested_at(stored),
        views = stored.share_views,
    )
}

fn render_share_svg(stored: &StoredResult) -> String {
    let r = &stored.result;
    format!(
        r##"<svg width="{CARD_WIDTH}" height="{CARD_HEIGHT}" xmlns="http://www.w3.org/2000/svg">
  <rect width="{CARD_WIDTH}" height="{CARD_HEIGHT}" fill="#0f0f23"/>
  <text x="100" y="100" font-family="Arial" font-size="48" fill="white">speedcore</text>
  <text x="100" y="200" font-family="Arial" font-size="32" fill="white">Download: {down:.1} Mbps</text>
  <text x="100" y="280" font-family="Arial" font-size="32" fill="white">Upload: {up:.1} Mbps</text>
  <text x="100" y="360" font-family="Arial" font-size="32" fill="white">Ping: {ping:.1} ms</text>
  <text x="100" y="440" font-family="Arial" font-size="24" fill="#888">{when}</text>
</svg>
"##,
        down = r.download_mbps,
        up = r.upload_mbps,
        ping = r.ping_ms,
        when = tested_at(stored),
    )
}

/// Bar-chart card: download and upload share one scale, ping has its own.
fn render_share_png(stored: &StoredResult) -> Result<Vec<u8>, image::ImageError> {
    let r = &stored.result;
    let mut card = RgbaImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, BACKGROUND);

    let top_rate = r.download_mbps.max(r.upload_mbps);
    let rows = [
        (170, fraction(r.download_mbps, top_rate), DOWNLOAD_COLOR),
        (290, fraction(r.upload_mbps, top_rate), UPLOAD_COLOR),
        (410, fraction(r.ping_ms, PING_SCALE_MS), PING_COLOR),
    ];
    for (y, filled, color) in rows {
        fill_rect(&mut card, BAR_X, y, BAR_WIDTH, BAR_HEIGHT, TRACK);
        let width = (f64::from(BAR_WIDTH) * filled).round() as u32;
        fill_rect(&mut card, BAR_X, y, width, BAR_HEIGHT, color);
    }

    let mut png = Vec::new();
    card.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

fn fraction(value: f64, scale: f64) -> f64 {
    if scale <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / scale).clamp(0.0, 1.0)
}

fn fill_rect(card: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let x_end = (x + width).min(card.width());
    let y_end = (y + height).min(card.height());
    for py in y..y_end {
        for px in x..x_end {
            card.put_pixel(px, py, color);
        }
    }
}
