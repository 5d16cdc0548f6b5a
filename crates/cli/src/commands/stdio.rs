//! `rlmgate stdio`: One JSON request per input line, one reply per output line.
//!
//! Logs go to stderr so stdout carries replies only.

use rlmgate_agent::{RequestHandler, ToolCallRequest, ToolReply};
use rlmgate_core::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let handler = super::build_handler(&config)?;

    info!(data_dir = %config.data_dir.display(), "Serving requests on stdio");
    let served = serve_lines(&handler, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!(served, "Input closed");
    Ok(())
}

/// Answer every non-blank line of `input` until EOF. Returns the number of
/// requests answered.
///
/// A line that is not UTF-8 gets a validation reply like any other
/// malformed request; only I/O failures end the loop.
pub async fn serve_lines<R, W>(
    handler: &RequestHandler,
    mut input: R,
    mut output: W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut served = 0;

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let reply = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<ToolCallRequest>(line) {
                Ok(request) => {
                    debug!(tool = %request.name, "stdio request");
                    handler.handle_call(request).await
                }
                Err(e) => ToolReply::failure(&Error::validation(format!("malformed request: {e}"))),
            },
            Err(e) => {
                warn!(bytes = buf.len(), "Skipping request line that is not UTF-8");
                ToolReply::failure(&Error::validation(format!("request is not valid UTF-8: {e}")))
            }
        };

        let mut encoded = serde_json::to_string(&reply).map_err(std::io::Error::other)?;
        encoded.push('\n');
        output.write_all(encoded.as_bytes()).await?;
        output.flush().await?;
        served += 1;
    }

    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlmgate_agent::Orchestrator;
    use rlmgate_config::AppConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn one_reply_per_request_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let handler = RequestHandler::new(Arc::new(Orchestrator::from_config(&config).unwrap()));

        let input = concat!(
            r#"{"name":"state","arguments":{"op":"set","sessionId":"io","key":"k","value":true}}"#,
            "\n\n",
            "not json\n",
            r#"{"name":"state","arguments":{"op":"list","sessionId":"io"}}"#,
            "\n",
        );
        let mut output = Vec::new();
        let served = serve_lines(&handler, input.as_bytes(), &mut output).await.unwrap();
        assert_eq!(served, 3);

        let replies: Vec<ToolReply> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert!(!replies[0].is_error);
        assert!(replies[1].is_error);
        assert!(replies[1].joined_text().starts_with("validation error: malformed request"));
        assert!(replies[2].joined_text().contains("\"k\""));
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let handler = RequestHandler::new(Arc::new(Orchestrator::from_config(&config).unwrap()));

        let mut input = Vec::new();
        input.extend_from_slice(br#"{"name":"state","arguments":{"op":"set","sessionId":"io","key":"k","value":1}}"#);
        input.extend_from_slice(b"\n\xff\xfe{\n");
        input.extend_from_slice(br#"{"name":"state","arguments":{"op":"get","sessionId":"io","key":"k"}}"#);

        let mut output = Vec::new();
        let served = serve_lines(&handler, input.as_slice(), &mut output).await.unwrap();
        assert_eq!(served, 3);

        let replies: Vec<ToolReply> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert!(!replies[0].is_error);
        assert!(replies[1].is_error);
        assert!(replies[1].joined_text().contains("not valid UTF-8"));
        assert!(!replies[2].is_error);
        assert!(replies[2].joined_text().contains("\"found\": true"));
    }
}
