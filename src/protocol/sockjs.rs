//! SockJS framing
//!
//! With framing on, the broker sends `o` (open), `h` (heartbeat), `c` (close)
//! and `a["..."]` (one message encoded as a JSON string). Outbound text is sent
//! as a one-element string array.

use rand::Rng;
use uuid::Uuid;

/// One inbound SockJS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    Open,
    Heartbeat,
    Close,
    /// Unwrapped payload of an `a[...]` frame, or any other text unchanged
    Message(String),
}

/// Classify an inbound frame by its leading character
pub fn parse_frame(frame: &str) -> SockJsFrame {
    match frame.as_bytes().first() {
        Some(b'o') => SockJsFrame::Open,
        Some(b'h') => SockJsFrame::Heartbeat,
        Some(b'c') => SockJsFrame::Close,
        Some(b'a') if frame.starts_with("a[") => {
            let inner = frame.strip_prefix("a[\"").unwrap_or(frame);
            let inner = inner.strip_suffix("\"]").unwrap_or(inner);
            SockJsFrame::Message(inner.replace("\\\"", "\""))
        }
        _ => SockJsFrame::Message(frame.to_string()),
    }
}

/// `["<text>"]` with every `"` escaped
pub fn wrap(text: &str) -> String {
    format!("[\"{}\"]", text.replace('"', "\\\""))
}

/// `/websocket/data/{server_id}/{session_id}/{transport}`
pub fn path(server_id: &str, session_id: &str, transport: &str) -> String {
    format!("/websocket/data/{}/{}/{}", server_id, session_id, transport)
}

/// A fresh websocket path: random 3-digit server id and random 32-hex-digit session id
pub fn generate_path() -> String {
    let server_id = format!("{:03}", rand::thread_rng().gen_range(0..1000u32));
    let session_id = Uuid::new_v4().simple().to_string();
    path(&server_id, &session_id, "websocket")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_frames() {
        assert_eq!(parse_frame("o"), SockJsFrame::Open);
        assert_eq!(parse_frame("h"), SockJsFrame::Heartbeat);
        assert_eq!(parse_frame("c[3000,\"Go away!\"]"), SockJsFrame::Close);
    }

    #[test]
    fn test_unwrap_array_frame() {
        assert_eq!(
            parse_frame("a[\"IO_CONNECTED\"]"),
            SockJsFrame::Message("IO_CONNECTED".to_string())
        );
        assert_eq!(
            parse_frame(r#"a["C {\"functionId\":\"F1\"}"]"#),
            SockJsFrame::Message(r#"C {"functionId":"F1"}"#.to_string())
        );
    }

    #[test]
    fn test_other_text_passes_through() {
        assert_eq!(parse_frame("IO_CONNECTED"), SockJsFrame::Message("IO_CONNECTED".to_string()));
    }

    #[test]
    fn test_wrap_escapes_quotes() {
        assert_eq!(wrap(r#"E {"a":1}"#), r#"["E {\"a\":1}"]"#);
        assert_eq!(parse_frame(&format!("a{}", wrap("R {\"x\":\"y\"}"))), SockJsFrame::Message("R {\"x\":\"y\"}".to_string()));
    }

    #[test]
    fn test_generated_path_shape() {
        let p = generate_path();
        let parts: Vec<&str> = p.trim_start_matches('/').split('/').collect();

        assert_eq!(parts.len(), 5);
        assert_eq!(&parts[..2], &["websocket", "data"]);
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[3].len(), 32);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[4], "websocket");
    }
}
