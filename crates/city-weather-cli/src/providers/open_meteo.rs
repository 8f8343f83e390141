use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CurrentConditions, ProviderError};

pub const FORECAST_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
const CURRENT_FIELDS: &str = "temperature_2m,weather_code";

#[derive(Debug, Serialize)]
struct CurrentQuery<'a> {
    latitude: f64,
    longitude: f64,
    current: &'a str,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
    weather_code: Option<i32>,
}

pub fn fetch_current(
    client: &Client,
    endpoint: &str,
    lat: f64,
    lon: f64,
) -> Result<CurrentConditions, ProviderError> {
    let query = CurrentQuery {
        latitude: lat,
        longitude: lon,
        current: CURRENT_FIELDS,
    };

    let body = execute_request(client.get(endpoint).query(&query))?;
    parse_current_response(&body)
}

fn execute_request(request: RequestBuilder) -> Result<String, ProviderError> {
    let response = request
        .send()
        .map_err(|error| ProviderError::Transport(error.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|error| ProviderError::Transport(error.to_string()))?;

    if status.is_success() {
        return Ok(body);
    }

    let message = extract_error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    Err(ProviderError::Http {
        status: status.as_u16(),
        message,
    })
}

fn parse_current_response(body: &str) -> Result<CurrentConditions, ProviderError> {
    let payload: CurrentResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("current payload: {error}")))?;

    let current = payload
        .current
        .ok_or_else(|| ProviderError::InvalidResponse("current payload: missing current".into()))?;

    let temperature_c = current
        .temperature_2m
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("current payload: missing temperature_2m".into())
        })?;
    let weather_code = current.weather_code.ok_or_else(|| {
        ProviderError::InvalidResponse("current payload: missing weather_code".into())
    })?;

    Ok(CurrentConditions {
        temperature_c,
        weather_code,
        fetched_at: Utc::now(),
    })
}

fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|json| {
            ["reason", "message", "error"].into_iter().find_map(|key| {
                json.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .map(str::to_string)
            })
        });

    from_json.or_else(|| Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn open_meteo_current_parses_temperature_and_code() {
        let body = r#"{
            "latitude": 46.2,
            "longitude": 6.14,
            "timezone": "GMT",
            "current_units": {"temperature_2m": "°C", "weather_code": "wmo code"},
            "current": {
                "time": "2026-10-16T09:00",
                "interval": 900,
                "temperature_2m": 12.4,
                "weather_code": 3
            }
        }"#;

        let current = parse_current_response(body).expect("current");
        assert_eq!(current.temperature_c, 12.4);
        assert_eq!(current.weather_code, 3);
    }

    #[test]
    fn open_meteo_current_accepts_integer_temperature() {
        let body = r#"{"current": {"temperature_2m": -3, "weather_code": 73}}"#;

        let current = parse_current_response(body).expect("current");
        assert_eq!(current.temperature_c, -3.0);
        assert_eq!(current.weather_code, 73);
    }

    #[test]
    fn open_meteo_current_rejects_missing_block() {
        let error = parse_current_response(r#"{"latitude": 1.0}"#).expect_err("must fail");
        assert!(
            matches!(error, ProviderError::InvalidResponse(message) if message.contains("missing current"))
        );
    }

    #[test]
    fn open_meteo_current_rejects_missing_fields() {
        let error = parse_current_response(r#"{"current": {"weather_code": 1}}"#)
            .expect_err("must fail");
        assert!(
            matches!(error, ProviderError::InvalidResponse(message) if message.contains("temperature_2m"))
        );

        let error = parse_current_response(r#"{"current": {"temperature_2m": 1.5}}"#)
            .expect_err("must fail");
        assert!(
            matches!(error, ProviderError::InvalidResponse(message) if message.contains("weather_code"))
        );
    }

    #[test]
    fn open_meteo_current_rejects_malformed_json() {
        let error = parse_current_response("<html>oops</html>").expect_err("must fail");
        assert!(matches!(error, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn open_meteo_extract_error_message_prefers_reason() {
        let body = r#"{"error": true, "reason": "Latitude must be in range of -90 to 90°."}"#;
        assert_eq!(
            extract_error_message(body),
            Some("Latitude must be in range of -90 to 90°.".to_string())
        );
        assert_eq!(extract_error_message("  "), None);
        assert_eq!(
            extract_error_message("Bad Gateway"),
            Some("Bad Gateway".to_string())
        );
    }

    #[test]
    fn open_meteo_fetch_current_sends_current_fields_and_parses_success() {
        let server = MockServer::spawn(MockResponse::json(
            200,
            "OK",
            r#"{"current": {"temperature_2m": 7.5, "weather_code": 74}}"#,
        ));
        let client = Client::new();

        let current =
            fetch_current(&client, &server.endpoint(), 46.2044, 6.1432).expect("current");
        assert_eq!(current.temperature_c, 7.5);
        assert_eq!(current.weather_code, 74);

        let request_line = server.request_line();
        server.join();
        assert!(request_line.starts_with("GET /v1/forecast?"), "{request_line}");
        assert!(request_line.contains("latitude=46.2044"), "{request_line}");
        assert!(request_line.contains("longitude=6.1432"), "{request_line}");
        assert!(
            request_line.contains("current=temperature_2m%2Cweather_code"),
            "{request_line}"
        );
    }

    #[test]
    fn open_meteo_fetch_current_maps_error_status_with_reason() {
        let server = MockServer::spawn(MockResponse::json(
            503,
            "Service Unavailable",
            r#"{"error": true, "reason": "down"}"#,
        ));
        let client = Client::new();

        let error = fetch_current(&client, &server.endpoint(), 46.2044, 6.1432)
            .expect_err("must fail");
        server.join();
        assert_eq!(
            error,
            ProviderError::Http {
                status: 503,
                message: "down".to_string(),
            }
        );
    }

    #[test]
    fn open_meteo_fetch_current_falls_back_to_status_reason_on_empty_body() {
        let server = MockServer::spawn(MockResponse::json(502, "Bad Gateway", ""));
        let client = Client::new();

        let error = fetch_current(&client, &server.endpoint(), 0.0, 0.0).expect_err("must fail");
        server.join();
        assert_eq!(
            error,
            ProviderError::Http {
                status: 502,
                message: "Bad Gateway".to_string(),
            }
        );
    }

    #[derive(Debug)]
    struct MockResponse {
        status: u16,
        reason: &'static str,
        body: String,
    }

    impl MockResponse {
        fn json(status: u16, reason: &'static str, body: &str) -> Self {
            Self {
                status,
                reason,
                body: body.to_string(),
            }
        }
    }

    struct MockServer {
        base_url: String,
        request_line: Arc<Mutex<String>>,
        handle: thread::JoinHandle<()>,
    }

    impl MockServer {
        fn spawn(response: MockResponse) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.set_nonblocking(true).expect("nonblocking");
            let base_url = format!("http://{}", listener.local_addr().expect("addr"));
            let request_line = Arc::new(Mutex::new(String::new()));
            let captured = Arc::clone(&request_line);

            let handle = thread::spawn(move || {
                let start = Instant::now();
                let mut stream = loop {
                    match listener.accept() {
                        Ok((stream, _)) => break stream,
                        Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                            if start.elapsed() > Duration::from_secs(3) {
                                panic!("mock server timed out waiting for request");
                            }
                            thread::sleep(Duration::from_millis(10));
                        }
                        Err(error) => panic!("mock server accept failed: {error}"),
                    }
                };
                stream.set_nonblocking(false).expect("blocking stream");

                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
                let mut first = true;
                loop {
                    let mut line = String::new();
                    let bytes = reader.read_line(&mut line).expect("read line");
                    if bytes == 0 || line == "\r\n" {
                        break;
                    }
                    if first {
                        *captured.lock().expect("request lock") =
                            line.trim_end_matches(['\r', '\n']).to_string();
                        first = false;
                    }
                }

                let head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.reason,
                    response.body.len()
                );
                stream
                    .write_all(head.as_bytes())
                    .and_then(|_| stream.write_all(response.body.as_bytes()))
                    .expect("write response");
            });

            Self {
                base_url,
                request_line,
                handle,
            }
        }

        fn endpoint(&self) -> String {
            format!("{}/v1/forecast", self.base_url)
        }

        fn request_line(&self) -> String {
            self.request_line.lock().expect("request lock").clone()
        }

        fn join(self) {
            self.handle.join().expect("mock server thread");
        }
    }
}
