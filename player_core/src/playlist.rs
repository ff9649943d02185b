// Playlist document: wire DTOs in, typed slides out.
// The wire shape is loose (two generations of field names); the domain shape is a closed tagged enum.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlaylistFetchError;
use crate::types::SlideIndex;

/// Ordered, immutable list of slides plus display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    slides: Vec<Slide>,
    company_logo: Option<String>,
}

impl Playlist {
    pub fn new(slides: Vec<Slide>, company_logo: Option<String>) -> Self {
        Playlist {
            slides,
            company_logo,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, index: SlideIndex) -> Option<&Slide> {
        self.slides.get(index.as_usize())
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn company_logo(&self) -> Option<&str> {
        self.company_logo.as_deref()
    }

    /// Sources worth warming up as soon as the playlist is known.
    pub fn preload_sources(&self) -> Vec<String> {
        self.slides
            .iter()
            .filter_map(|slide| match slide {
                Slide::Model(model) => Some(model.source.clone()),
                Slide::Video(_) | Slide::CameraEffect(_) => None,
            })
            .collect()
    }
}

/// One unit of playable content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Slide {
    Model(ModelSlide),
    Video(VideoSlide),
    CameraEffect(CameraEffectSlide),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlideKind {
    Model,
    Video,
    CameraEffect,
}

impl Slide {
    pub fn kind(&self) -> SlideKind {
        match self {
            Slide::Model(_) => SlideKind::Model,
            Slide::Video(_) => SlideKind::Video,
            Slide::CameraEffect(_) => SlideKind::CameraEffect,
        }
    }


    /// How this slide leaves the screen when nobody touches it.
    ///
    /// Models and camera effects have no end of their own, so their rotation time is
    /// the primary timer. Videos end themselves; their rotation time only bounds a
    /// video that never reports its end.
    pub fn advance_policy(&self, default_rotation_secs: f64) -> AdvancePolicy {
        match self {
            Slide::Model(ModelSlide { rotation_secs, .. })
            | Slide::CameraEffect(CameraEffectSlide { rotation_secs, .. }) => {
                let secs = rotation_secs.unwrap_or(default_rotation_secs);
                AdvancePolicy::AfterDuration {
                    duration_us: secs_to_micros(secs).unwrap_or(0),
                }
            }
            Slide::Video(VideoSlide { rotation_secs, .. }) => AdvancePolicy::OnContentEnd {
                fallback_us: rotation_secs.and_then(secs_to_micros),
            },
        }
    }
}

/// Advance policy per slide kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdvancePolicy {
    /// Advance once the slide has been shown for this long.
    AfterDuration { duration_us: u64 },
    /// Advance when the viewer reports end of content; the fallback timer is a safety net.
    OnContentEnd { fallback_us: Option<u64> },
}

impl AdvancePolicy {
    /// Duration of the auto-advance timer, if this policy arms one.
    pub fn timer_us(&self) -> Option<u64> {
        match *self {
            AdvancePolicy::AfterDuration { duration_us } => Some(duration_us),
            AdvancePolicy::OnContentEnd { fallback_us } => fallback_us,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSlide {
    pub source: String,
    pub rotation_secs: Option<f64>,
    pub camera: CameraParams,
    pub hotspots: Vec<Hotspot>,
    pub audio_source: Option<String>,
    /// Present when the asset can be handed off to an AR viewer.
    pub ar_source: Option<String>,
    pub product: ProductInfo,
}

impl ModelSlide {
    pub fn hotspot(&self, id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|h| h.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSlide {
    pub source: String,
    pub rotation_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraEffectSlide {
    /// Usually empty: the picture comes from the camera.
    pub source: String,
    pub rotation_secs: Option<f64>,
    pub effect_group: String,
    pub effect_token: Option<String>,
}

/// Camera distance for the 3D view, per form factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraParams {
    pub zoom_mobile: f32,
    pub zoom_desktop: f32,
    pub shadow_opacity: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        CameraParams {
            zoom_mobile: 5.0,
            zoom_desktop: 5.0,
            shadow_opacity: 0.3,
        }
    }
}

/// Annotated point on a model; opening it shows the label and QR link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: String,
    pub label: String,
    pub link: Option<String>,
    pub position: Option<String>,
    pub qr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    #[serde(default)]
    files: Vec<Value>,
    #[serde(default, rename = "companyLogo", alias = "company_logo")]
    company_logo: Option<String>,
}

#[derive(Debug, Deserialize)]
enum RawKind {
    #[serde(rename = "model", alias = "Model", alias = "3d", alias = "3D")]
    Model,
    #[serde(rename = "video", alias = "Video")]
    Video,
    #[serde(
        rename = "cameraEffect",
        alias = "CameraEffect",
        alias = "camera",
        alias = "camera_kit",
        alias = "CameraKit"
    )]
    CameraEffect,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlide {
    #[serde(alias = "type")]
    kind: RawKind,
    #[serde(default, alias = "file")]
    source: Option<String>,
    #[serde(default, alias = "rotation_time")]
    rotation_time_seconds: Option<f64>,
    #[serde(default)]
    zoom: Value,
    #[serde(default, alias = "shadow_opacity")]
    shadow_opacity: Option<f32>,
    #[serde(default, alias = "qr_links")]
    hotspots: Vec<RawHotspot>,
    #[serde(default, alias = "audio_file")]
    audio_file: Option<String>,
    #[serde(default, alias = "ar_file")]
    ar_source: Option<String>,
    #[serde(default, alias = "product_name")]
    product_name: Option<String>,
    #[serde(default)]
    price: Value,
    #[serde(default, alias = "Product_description", alias = "product_description")]
    product_description: Option<String>,
    #[serde(default, alias = "camera_kit_lens_group")]
    effect_group: Option<String>,
    #[serde(default, alias = "camera_kit_token")]
    effect_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHotspot {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    qr: Option<String>,
}

impl RawSlide {
    fn into_slide(self, index: usize) -> Result<Slide, PlaylistFetchError> {
        let invalid = |reason: &str| PlaylistFetchError::InvalidSlide {
            index,
            reason: reason.to_string(),
        };
        let rotation_secs = self.rotation_time_seconds.filter(|s| s.is_finite() && *s > 0.0);

        match self.kind {
            RawKind::Model => {
                let source = non_empty(self.source).ok_or_else(|| invalid("model slide has no source"))?;
                let (zoom_mobile, zoom_desktop) = parse_zoom(&self.zoom);
                let defaults = CameraParams::default();
                let hotspots = self
                    .hotspots
                    .into_iter()
                    .enumerate()
                    .map(|(i, raw)| Hotspot {
                        id: non_empty(raw.id).unwrap_or_else(|| format!("hotspot-{}", i)),
                        label: raw.label,
                        link: non_empty(raw.link),
                        position: non_empty(raw.position),
                        qr: non_empty(raw.qr),
                    })
                    .collect();

                Ok(Slide::Model(ModelSlide {
                    source,
                    rotation_secs,
                    camera: CameraParams {
                        zoom_mobile: zoom_mobile.unwrap_or(defaults.zoom_mobile),
                        zoom_desktop: zoom_desktop.unwrap_or(defaults.zoom_desktop),
                        shadow_opacity: self
                            .shadow_opacity
                            .map(|o| o.clamp(0.0, 1.0))
                            .unwrap_or(defaults.shadow_opacity),
                    },
                    hotspots,
                    audio_source: non_empty(self.audio_file),
                    ar_source: non_empty(self.ar_source),
                    product: ProductInfo {
                        name: non_empty(self.product_name),
                        price: parse_number(&self.price),
                        description: non_empty(self.product_description),
                    },
                }))
            }
            RawKind::Video => {
                let source = non_empty(self.source).ok_or_else(|| invalid("video slide has no source"))?;
                Ok(Slide::Video(VideoSlide {
                    source,
                    rotation_secs,
                }))
            }
            RawKind::CameraEffect => {
                let effect_group = non_empty(self.effect_group)
                    .ok_or_else(|| invalid("camera effect slide has no effect group"))?;
                Ok(Slide::CameraEffect(CameraEffectSlide {
                    source: self.source.unwrap_or_default(),
                    rotation_secs,
                    effect_group,
                    effect_token: non_empty(self.effect_token),
                }))
            }
        }
    }
}

fn parse_slide(index: usize, value: Value) -> Result<Slide, PlaylistFetchError> {
    let raw: RawSlide =
        serde_json::from_value(value).map_err(|e| PlaylistFetchError::InvalidSlide {
            index,
            reason: e.to_string(),
        })?;
    raw.into_slide(index)
}

/// Parse a playlist document body. Invalid slides are skipped; the document only
/// fails when it lists slides and none of them parse.
pub fn parse_playlist(body: &str) -> Result<Playlist, PlaylistFetchError> {
    let raw: RawPlaylist = serde_json::from_str(body)?;
    let mut slides = Vec::with_capacity(raw.files.len());
    let mut first_error = None;

    for (index, value) in raw.files.into_iter().enumerate() {
        match parse_slide(index, value) {
            Ok(slide) => slides.push(slide),
            Err(err) => {
                tracing::warn!("skipping slide: {}", err);
                first_error.get_or_insert(err);
            }
        }
    }

    if slides.is_empty() {
        if let Some(err) = first_error {
            return Err(err);
        }
    }
    Ok(Playlist::new(slides, non_empty(raw.company_logo)))
}

/// Classify a fetch response. 404 means the token names no playlist.
pub fn playlist_from_response(status: u16, body: &str) -> Result<Playlist, PlaylistFetchError> {
    match status {
        200..=299 => parse_playlist(body),
        404 => Err(PlaylistFetchError::NotFound),
        other => Err(PlaylistFetchError::Status(other)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `zoom` is either `[mobile, desktop]` or a single number for both.
fn parse_zoom(value: &Value) -> (Option<f32>, Option<f32>) {
    match value {
        Value::Array(items) => (
            items.first().and_then(parse_number).map(|z| z as f32),
            items.get(1).and_then(parse_number).map(|z| z as f32),
        ),
        other => {
            let z = parse_number(other).map(|z| z as f32);
            (z, z)
        }
    }
}

fn secs_to_micros(secs: f64) -> Option<u64> {
    if secs.is_finite() && secs > 0.0 {
        Some((secs * 1_000_000.0).round() as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "companyLogo": "https://cdn.example.com/logo.png",
        "files": [
            {
                "kind": "model",
                "source": "https://cdn.example.com/shoe.glb",
                "rotationTimeSeconds": 5,
                "zoom": [4, 6],
                "hotspots": [{"id": "sole", "label": "Sole", "link": "https://example.com/sole"}],
                "audioFile": "https://cdn.example.com/ambient.mp3"
            },
            {"kind": "video", "source": "https://cdn.example.com/promo.mp4"},
            {"kind": "cameraEffect", "effectGroup": "lens-group-1", "rotationTimeSeconds": 20}
        ]
    }"#;

    #[test]
    fn parses_tagged_document() {
        let playlist = parse_playlist(DOCUMENT).unwrap();
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.company_logo(), Some("https://cdn.example.com/logo.png"));

        let Some(Slide::Model(model)) = playlist.get(SlideIndex::new(0)) else {
            panic!("first slide should be a model");
        };
        assert_eq!(model.camera.zoom_mobile, 4.0);
        assert_eq!(model.camera.zoom_desktop, 6.0);
        assert_eq!(model.hotspots[0].id, "sole");
        assert_eq!(model.audio_source.as_deref(), Some("https://cdn.example.com/ambient.mp3"));

        assert_eq!(playlist.get(SlideIndex::new(1)).map(Slide::kind), Some(SlideKind::Video));
        assert_eq!(
            playlist.get(SlideIndex::new(2)).map(Slide::kind),
            Some(SlideKind::CameraEffect)
        );
    }

    #[test]
    fn parses_legacy_document() {
        let body = r#"{
            "company_logo": "",
            "files": [{
                "type": "3d",
                "file": "/models/runner.glb",
                "rotation_time": 12,
                "zoom": 7,
                "wall": null,
                "Dlight": {"intensity": 1},
                "shadow_opacity": 0.5,
                "qr_links": [{"label": "Buy", "link": "https://shop", "position": "1 0 0", "qr": "data:"}],
                "product_name": "Runner",
                "price": "89.99",
                "Product_description": "Light and fast",
                "audio_file": ""
            }, {
                "type": "Video",
                "file": "/videos/intro.mp4",
                "rotation_time": 30
            }]
        }"#;

        let playlist = parse_playlist(body).unwrap();
        assert_eq!(playlist.company_logo(), None);

        let Some(Slide::Model(model)) = playlist.get(SlideIndex::new(0)) else {
            panic!("first slide should be a model");
        };
        assert_eq!(model.rotation_secs, Some(12.0));
        assert_eq!(model.camera.zoom_mobile, 7.0);
        assert_eq!(model.camera.shadow_opacity, 0.5);
        assert_eq!(model.hotspots[0].id, "hotspot-0");
        assert_eq!(model.product.price, Some(89.99));
        assert_eq!(model.product.description.as_deref(), Some("Light and fast"));
        assert!(model.audio_source.is_none(), "empty audio string means no audio");
    }

    #[test]
    fn advance_policy_per_kind() {
        let playlist = parse_playlist(DOCUMENT).unwrap();
        let policies: Vec<_> = playlist
            .slides()
            .iter()
            .map(|s| s.advance_policy(10.0))
            .collect();

        assert_eq!(policies[0], AdvancePolicy::AfterDuration { duration_us: 5_000_000 });
        assert_eq!(policies[1], AdvancePolicy::OnContentEnd { fallback_us: None });
        assert_eq!(policies[2].timer_us(), Some(20_000_000));
    }

    #[test]
    fn missing_rotation_uses_default() {
        let playlist = parse_playlist(r#"{"files": [{"kind": "model", "source": "a.glb", "rotationTimeSeconds": 0}]}"#).unwrap();
        let policy = playlist.slides()[0].advance_policy(7.5);
        assert_eq!(policy, AdvancePolicy::AfterDuration { duration_us: 7_500_000 });
    }

    #[test]
    fn slide_without_source_is_rejected() {
        let err = parse_playlist(r#"{"files": [{"kind": "video", "source": ""}]}"#).unwrap_err();
        assert_eq!(
            err,
            PlaylistFetchError::InvalidSlide {
                index: 0,
                reason: "video slide has no source".to_string()
            }
        );
    }

    #[test]
    fn unknown_kind_alone_is_an_invalid_slide() {
        let err = parse_playlist(r#"{"files": [{"kind": "hologram", "source": "x"}]}"#).unwrap_err();
        assert!(matches!(err, PlaylistFetchError::InvalidSlide { index: 0, .. }));
    }

    #[test]
    fn invalid_slides_are_skipped_beside_valid_ones() {
        let playlist = parse_playlist(
            r#"{"files": [
                {"kind": "hologram", "source": "x"},
                {"kind": "video", "source": "promo.mp4"},
                {"kind": "model", "source": ""},
                {"kind": "cameraEffect"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.slides()[0].kind(), SlideKind::Video);
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = parse_playlist(r#"{"files": "nope"}"#).unwrap_err();
        assert!(matches!(err, PlaylistFetchError::Parse(_)));
    }

    #[test]
    fn response_status_classification() {
        assert_eq!(playlist_from_response(404, "").unwrap_err(), PlaylistFetchError::NotFound);
        assert_eq!(
            playlist_from_response(503, "oops").unwrap_err(),
            PlaylistFetchError::Status(503)
        );
        assert!(playlist_from_response(200, r#"{"files": []}"#).unwrap().is_empty());
    }

    #[test]
    fn preload_lists_model_sources_only() {
        let playlist = parse_playlist(DOCUMENT).unwrap();
        assert_eq!(playlist.preload_sources(), vec!["https://cdn.example.com/shoe.glb".to_string()]);
    }
}
