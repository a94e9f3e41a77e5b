#![forbid(unsafe_code)]

//! Self-contained HTML page for the sandbox surface.
//!
//! The page embeds the versioned document as JSON and draws it with Leaflet.
//! Popup and label markup is produced here, on the host side, so every
//! piece of entity-supplied text passes through HTML escaping before it
//! reaches the sandbox.
//!
//! # Outbound protocol (sandbox → host)
//!
//! Tapping a singleton marker, or a row inside a cluster popup, posts exactly
//! one message:
//!
//! ```json
//! {"type":"entitySelected","entityId":"<id>","documentVersion":<n>}
//! ```
//!
//! `documentVersion` is an optional extension; hosts that only understand
//! the base shape ignore it. The page tries the React Native WebView bridge,
//! then the `ipc` handler exposed by desktop webviews, then `parent`.

use serde::{Deserialize, Serialize};
use staymap_core::Coordinates;

use crate::document::{DocumentEnvelope, Marker, Popup, PopupEntry};

/// Text shown in place of the map when it cannot be drawn.
pub const MAP_UNAVAILABLE: &str = "map unavailable";

/// Presentation defaults for the map surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Tile URL template with `{z}`, `{x}`, `{y}` placeholders.
    pub tile_url: String,
    pub attribution: String,
    /// Zoom used when there are no markers to fit.
    pub initial_zoom: u8,
    /// Upper bound applied when fitting the view to markers.
    pub max_fit_zoom: u8,
    /// Centre used when there are no markers.
    pub fallback_center: Coordinates,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_owned(),
            attribution: "&copy; OpenStreetMap contributors".to_owned(),
            initial_zoom: 13,
            max_fit_zoom: 16,
            fallback_center: Coordinates::new(41.9981, 21.4254),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PagePayload<'a> {
    version: u64,
    tile_url: &'a str,
    attribution: &'a str,
    initial_zoom: u8,
    max_fit_zoom: u8,
    center: Coordinates,
    fallback_text: &'static str,
    markers: Vec<PageMarker<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageMarker<'a> {
    lat: f64,
    lng: f64,
    icon_html: String,
    popup_html: String,
    /// Set only for singleton markers, which select on tap.
    select_id: Option<&'a str>,
}

fn html_escape(value: &str) -> String {
    v_htmlescape::escape(value).to_string()
}

/// Serialize to JSON that is safe to inline inside a `<script>` element.
fn script_safe_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let raw = serde_json::to_string(value)?;
    let mut out = String::with_capacity(raw.len() + 16);
    for ch in raw.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn icon_html(marker: &Marker) -> String {
    let mut html = format!(
        "<div class=\"pin\"><span class=\"label\">{}</span>",
        html_escape(&marker.label)
    );
    if let Some(count) = marker.badge {
        html.push_str(&format!("<span class=\"badge\">{count}</span>"));
    }
    html.push_str("</div>");
    html
}

fn entry_row(entry: &PopupEntry) -> String {
    format!(
        "<li data-entity-id=\"{}\"><span class=\"title\">{}</span><span class=\"price\">{}</span></li>",
        html_escape(entry.entity_id.as_str()),
        html_escape(&entry.title),
        html_escape(&entry.price)
    )
}

/// Popup markup for one marker.
#[must_use]
pub fn popup_html(popup: &Popup) -> String {
    match popup {
        Popup::Detail { entry } => {
            let mut html = format!(
                "<div class=\"popup detail\"><strong>{}</strong><div class=\"price\">{}</div>",
                html_escape(&entry.title),
                html_escape(&entry.price)
            );
            if let Some(distance) = &entry.distance {
                html.push_str(&format!(
                    "<div class=\"distance\">{}</div>",
                    html_escape(distance)
                ));
            }
            html.push_str("</div>");
            html
        }
        Popup::Listing { entries, .. } => {
            let mut html = String::from("<div class=\"popup listing\"><ul>");
            for entry in entries {
                html.push_str(&entry_row(entry));
            }
            html.push_str("</ul>");
            if let Some(line) = popup.overflow_line() {
                html.push_str(&format!("<div class=\"more\">{}</div>", html_escape(&line)));
            }
            html.push_str("</div>");
            html
        }
    }
}

const PAGE_HEAD: &str = "<!doctype html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1, maximum-scale=1\">\n  <link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.css\">\n  <script src=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.js\"></script>\n  <style>\n    html, body, #map { height: 100%; margin: 0; }\n    .fallback { display: flex; align-items: center; justify-content: center; height: 100%; font-family: sans-serif; color: #666; }\n    .pin { display: inline-flex; align-items: center; gap: 4px; padding: 3px 8px; border-radius: 12px; background: #fff; box-shadow: 0 1px 4px rgba(0,0,0,.3); font: 600 12px sans-serif; white-space: nowrap; }\n    .badge { min-width: 16px; padding: 0 4px; border-radius: 8px; background: #1f6feb; color: #fff; text-align: center; }\n    .popup ul { list-style: none; margin: 0; padding: 0; max-height: 240px; overflow-y: auto; }\n    .popup li { display: flex; justify-content: space-between; gap: 12px; padding: 6px 0; border-bottom: 1px solid #eee; cursor: pointer; }\n    .popup .more { padding-top: 6px; color: #888; }\n  </style>\n</head>\n<body>\n<div id=\"map\"></div>\n<script>\n";

const PAGE_SCRIPT: &str = r#"(function () {
  var payload = window.__STAYMAP__;
  function post(entityId) {
    var message = JSON.stringify({ type: "entitySelected", entityId: entityId, documentVersion: payload.version });
    if (window.ReactNativeWebView && window.ReactNativeWebView.postMessage) {
      window.ReactNativeWebView.postMessage(message);
    } else if (window.ipc && window.ipc.postMessage) {
      window.ipc.postMessage(message);
    } else if (window.parent && window.parent !== window) {
      window.parent.postMessage(message, "*");
    }
  }
  var root = document.getElementById("map");
  if (typeof L === "undefined") {
    root.className = "fallback";
    root.textContent = payload.fallbackText;
    return;
  }
  var map = L.map(root, { zoomControl: false })
    .setView([payload.center.lat, payload.center.lng], payload.initialZoom);
  L.tileLayer(payload.tileUrl, { attribution: payload.attribution }).addTo(map);
  var bounds = [];
  payload.markers.forEach(function (m) {
    var icon = L.divIcon({ className: "pin-wrap", html: m.iconHtml, iconSize: null });
    var marker = L.marker([m.lat, m.lng], { icon: icon }).addTo(map);
    marker.bindPopup(m.popupHtml);
    if (m.selectId !== null) {
      marker.on("click", function () { post(m.selectId); });
    }
    bounds.push([m.lat, m.lng]);
  });
  root.addEventListener("click", function (event) {
    var row = event.target.closest ? event.target.closest("[data-entity-id]") : null;
    if (row) {
      event.stopPropagation();
      post(row.getAttribute("data-entity-id"));
    }
  });
  if (bounds.length > 0) {
    map.fitBounds(bounds, { padding: [32, 32], maxZoom: payload.maxFitZoom });
  }
})();
"#;

/// Render the full sandbox page for `envelope`.
pub fn render_page(
    envelope: &DocumentEnvelope,
    options: &MapOptions,
) -> Result<String, serde_json::Error> {
    let markers = envelope
        .document
        .markers
        .iter()
        .map(|m| PageMarker {
            lat: m.position.lat,
            lng: m.position.lng,
            icon_html: icon_html(m),
            popup_html: popup_html(&m.popup),
            select_id: match m.entity_ids.as_slice() {
                [only] => Some(only.as_str()),
                _ => None,
            },
        })
        .collect();

    let payload = PagePayload {
        version: envelope.version,
        tile_url: &options.tile_url,
        attribution: &options.attribution,
        initial_zoom: options.initial_zoom,
        max_fit_zoom: options.max_fit_zoom,
        center: options.fallback_center,
        fallback_text: MAP_UNAVAILABLE,
        markers,
    };

    let mut html = String::with_capacity(PAGE_HEAD.len() + PAGE_SCRIPT.len() + 1024);
    html.push_str(PAGE_HEAD);
    html.push_str("window.__STAYMAP__ = ");
    html.push_str(&script_safe_json(&payload)?);
    html.push_str(";\n");
    html.push_str(PAGE_SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    Ok(html)
}
