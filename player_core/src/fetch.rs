// Browser fetch of the playlist document. The engine never interprets the response here:
// status and body go back through `Player::finish_load` so classification stays testable.

use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::error::PlaylistFetchError;

/// Raw HTTP outcome handed back to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// GET `url` and read the body as text. Only transport failures are errors;
/// any HTTP status, including 404, is a response.
pub async fn fetch_text(url: &str) -> Result<FetchResponse, PlaylistFetchError> {
    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(url, &opts)
        .map_err(|e| PlaylistFetchError::Network(format!("request error: {:?}", e)))?;

    let window = web_sys::window()
        .ok_or_else(|| PlaylistFetchError::Network("no window".to_string()))?;
    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| PlaylistFetchError::Network(format!("fetch error: {:?}", e)))?;

    let resp: Response = resp_value
        .dyn_into()
        .map_err(|_| PlaylistFetchError::Network("response is not a Response".to_string()))?;
    let status = resp.status();

    let text = JsFuture::from(
        resp.text()
            .map_err(|e| PlaylistFetchError::Network(format!("text promise error: {:?}", e)))?,
    )
    .await
    .map_err(|e| PlaylistFetchError::Network(format!("body error: {:?}", e)))?;

    tracing::debug!("playlist fetch {} -> {}", url, status);
    Ok(FetchResponse {
        status,
        body: text.as_string().unwrap_or_default(),
    })
}
