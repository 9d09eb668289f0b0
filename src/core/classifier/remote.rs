//! Hugging Face 推理接口分类器
//!
//! Posts JPEG-encoded frames to an `image-classification` inference endpoint
//! and reads back `[{"label": ..., "score": ...}, ...]`.

use crate::core::classifier::{ImageClassifier, ModelLoader, Prediction};
use crate::core::error::{ClassifyError, ModelLoadError};
use image::{ImageOutputFormat, RgbImage};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::thread;
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "umm-maybe/AI-image-detector";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
const TOKEN_ENV: &str = "HF_TOKEN";
/// Asks the hosted endpoint to hold the request while a cold model loads
const WAIT_FOR_MODEL_HEADER: &str = "x-wait-for-model";
const COLD_START_RETRY_DELAY: Duration = Duration::from_secs(2);
const USER_AGENT: &str = concat!("ai-video-detector/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteModelConfig {
    pub model_id: String,
    pub hub_url: String,
    pub inference_url: String,
    /// Falls back to the `HF_TOKEN` environment variable
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for RemoteModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            api_token: None,
            timeout_secs: 60,
            jpeg_quality: 90,
        }
    }
}

impl RemoteModelConfig {
    fn token(&self) -> Option<String> {
        self.api_token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.inference_url.trim_end_matches('/'), self.model_id)
    }

    fn model_info_url(&self) -> String {
        format!("{}/api/models/{}", self.hub_url.trim_end_matches('/'), self.model_id)
    }
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    pipeline_tag: Option<String>,
}

pub struct InferenceApiLoader {
    config: RemoteModelConfig,
}

impl InferenceApiLoader {
    pub fn new(config: RemoteModelConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for InferenceApiLoader {
    type Model = InferenceApiClassifier;

    fn describe(&self) -> String {
        format!("{} via {}", self.config.model_id, self.config.inference_url)
    }

    /// Resolves the model on the hub so a wrong id or missing access fails
    /// here instead of on every frame.
    fn load(&self) -> Result<InferenceApiClassifier, ModelLoadError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;
        let token = self.config.token();

        let mut request = client.get(self.config.model_info_url());
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        let resp = request.send()?;

        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ModelLoadError::NotFound(format!(
                    "{} (HTTP {})",
                    self.config.model_id,
                    resp.status()
                )));
            }
            status if !status.is_success() => {
                return Err(ModelLoadError::Runtime(format!(
                    "model lookup for {} returned HTTP {}",
                    self.config.model_id, status
                )));
            }
            _ => {}
        }

        let info: ModelInfo = serde_json::from_slice(&resp.bytes()?)
            .map_err(|e| ModelLoadError::Config(format!("model info: {}", e)))?;
        match info.pipeline_tag.as_deref() {
            Some("image-classification") | None => {}
            Some(other) => {
                return Err(ModelLoadError::Unsupported(format!(
                    "{} is a '{}' model, expected image-classification",
                    self.config.model_id, other
                )));
            }
        }

        info!("🌐 Inference endpoint ready: {}", self.config.endpoint());
        Ok(InferenceApiClassifier {
            client,
            endpoint: self.config.endpoint(),
            token,
            jpeg_quality: self.config.jpeg_quality.clamp(1, 100),
            retry_delay: COLD_START_RETRY_DELAY,
        })
    }
}

pub struct InferenceApiClassifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
    jpeg_quality: u8,
    retry_delay: Duration,
}

impl InferenceApiClassifier {
    fn post(&self, jpeg: &[u8]) -> Result<(StatusCode, Vec<u8>), ClassifyError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .header(WAIT_FOR_MODEL_HEADER, "true")
            .body(jpeg.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send()?;
        let status = resp.status();
        Ok((status, resp.bytes()?.to_vec()))
    }
}

impl ImageClassifier for InferenceApiClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ClassifyError> {
        let jpeg = encode_jpeg(image, self.jpeg_quality)?;
        debug!("Posting {} byte frame to {}", jpeg.len(), self.endpoint);

        // a cold model answers 503 until it is loaded
        let (status, body) = match self.post(&jpeg)? {
            (StatusCode::SERVICE_UNAVAILABLE, _) => {
                warn!("⏳ Model still loading, retrying in {:?}", self.retry_delay);
                thread::sleep(self.retry_delay);
                self.post(&jpeg)?
            }
            reply => reply,
        };
        if !status.is_success() {
            warn!("⚠️ Inference endpoint returned HTTP {}", status);
            return Err(match parse_service_error(&body) {
                Some(message) => ClassifyError::Service(message),
                None => ClassifyError::Service(format!("HTTP {}", status)),
            });
        }

        parse_predictions(&body)
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ClassifyError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer.into_inner())
}

fn parse_service_error(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("error").and_then(|e| e.as_str()).map(str::to_string)
}

/// Accepts both the flat `[{label, score}]` shape and the batched
/// `[[{label, score}]]` shape some endpoints return.
pub(crate) fn parse_predictions(body: &[u8]) -> Result<Vec<Prediction>, ClassifyError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ClassifyError::UnexpectedResponse(format!("invalid JSON: {}", e)))?;

    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(ClassifyError::Service(message.to_string()));
    }

    let list = match &value {
        serde_json::Value::Array(items) => match items.first() {
            Some(serde_json::Value::Array(_)) => items[0].clone(),
            _ => value.clone(),
        },
        other => {
            return Err(ClassifyError::UnexpectedResponse(format!(
                "expected a list of predictions, got {}",
                other
            )))
        }
    };

    serde_json::from_value(list)
        .map_err(|e| ClassifyError::UnexpectedResponse(format!("bad prediction entry: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_predictions() {
        let body = br#"[{"label":"artificial","score":0.93},{"label":"human","score":0.07}]"#;
        let predictions = parse_predictions(body).unwrap();

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0], Prediction::new("artificial", 0.93));
    }

    #[test]
    fn test_parse_batched_predictions() {
        let body = br#"[[{"label":"human","score":0.8},{"label":"artificial","score":0.2}]]"#;
        let predictions = parse_predictions(body).unwrap();

        assert_eq!(predictions[1].label, "artificial");
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_predictions(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_service_error_body() {
        let body = br#"{"error":"Model umm-maybe/AI-image-detector is currently loading"}"#;
        assert!(matches!(parse_predictions(body), Err(ClassifyError::Service(_))));
        assert!(parse_service_error(body).unwrap().contains("currently loading"));
    }

    #[test]
    fn test_parse_unexpected_shapes() {
        assert!(matches!(
            parse_predictions(br#"{"labels":["a"]}"#),
            Err(ClassifyError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            parse_predictions(br#"[{"label":"artificial"}]"#),
            Err(ClassifyError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            parse_predictions(b"<html>"),
            Err(ClassifyError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = RemoteModelConfig {
            inference_url: "http://localhost:8080/models/".to_string(),
            hub_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/models/umm-maybe/AI-image-detector"
        );
        assert_eq!(
            config.model_info_url(),
            "http://localhost:8080/api/models/umm-maybe/AI-image-detector"
        );
    }

    #[test]
    fn test_explicit_token_wins() {
        let config = RemoteModelConfig {
            api_token: Some("hf_explicit".to_string()),
            ..Default::default()
        };
        assert_eq!(config.token().as_deref(), Some("hf_explicit"));
    }

    #[test]
    fn test_jpeg_encoding() {
        let image = RgbImage::from_pixel(16, 16, image::Rgb([200, 10, 10]));
        let jpeg = encode_jpeg(&image, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_unreachable_hub_is_load_error() {
        let loader = InferenceApiLoader::new(RemoteModelConfig {
            hub_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        });
        assert!(loader.load().is_err());
    }

    /// Local endpoint answering each connection with the next canned reply;
    /// the join handle yields the request heads it saw.
    fn fake_endpoint(replies: Vec<(&'static str, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/models/org/detector", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut heads = Vec::new();
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 4096];
                let head_end = loop {
                    let n = stream.read(&mut chunk).unwrap();
                    request.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
                let length: usize = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse().unwrap())
                    .unwrap_or(0);
                while request.len() < head_end + length {
                    let n = stream.read(&mut chunk).unwrap();
                    request.extend_from_slice(&chunk[..n]);
                }
                heads.push(head);

                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
            heads
        });
        (url, handle)
    }

    fn classifier_for(endpoint: String) -> InferenceApiClassifier {
        InferenceApiClassifier {
            client: Client::builder().timeout(Duration::from_secs(5)).build().unwrap(),
            endpoint,
            token: Some("hf_test".to_string()),
            jpeg_quality: 80,
            retry_delay: Duration::ZERO,
        }
    }

    const LOADING: &str = r#"{"error":"Model org/detector is currently loading","estimated_time":20.0}"#;

    #[test]
    fn test_cold_model_is_retried_once() {
        let (url, server) = fake_endpoint(vec![
            ("503 Service Unavailable", LOADING),
            ("200 OK", r#"[{"label":"artificial","score":0.7},{"label":"human","score":0.3}]"#),
        ]);
        let image = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));

        let predictions = classifier_for(url).classify(&image).unwrap();
        assert_eq!(predictions[0], Prediction::new("artificial", 0.7));

        let heads = server.join().unwrap();
        assert_eq!(heads.len(), 2);
        for head in &heads {
            assert!(head.contains("x-wait-for-model: true"));
            assert!(head.contains("authorization: bearer hf_test"));
            assert!(head.contains("content-type: image/jpeg"));
        }
    }

    #[test]
    fn test_model_still_loading_after_retry_is_service_error() {
        let (url, server) = fake_endpoint(vec![
            ("503 Service Unavailable", LOADING),
            ("503 Service Unavailable", LOADING),
        ]);
        let image = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));

        let err = classifier_for(url).classify(&image).unwrap_err();
        assert!(matches!(err, ClassifyError::Service(ref m) if m.contains("currently loading")));
        assert_eq!(server.join().unwrap().len(), 2);
    }
}
