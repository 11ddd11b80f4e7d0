//! HTTP plumbing for checkpoint downloads: one agent with fixed timeouts and a
//! copy loop that refuses bodies larger than the caller's cap.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Checkpoints are hundreds of megabytes; the read timeout applies per read call.
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Return a shared HTTP agent with consistent timeouts.
pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

/// Stream a checkpoint body into `writer`, failing once it passes `max_bytes`.
///
/// A declared `Content-Length` over the cap fails before any byte is written.
/// Returns the number of bytes written.
pub(crate) fn stream_capped(
    response: ureq::Response,
    writer: &mut dyn Write,
    max_bytes: u64,
) -> Result<u64, io::Error> {
    reject_declared_oversize(&response, max_bytes)?;
    let mut limited = response.into_reader().take(max_bytes + 1);
    let mut total = 0u64;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = limited.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        if total > max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checkpoint body exceeded {max_bytes} bytes"),
            ));
        }
        writer.write_all(&buf[..read])?;
    }
    Ok(total)
}

fn reject_declared_oversize(response: &ureq::Response, max_bytes: u64) -> Result<(), io::Error> {
    let Some(length) = response.header("Content-Length") else {
        return Ok(());
    };
    let Ok(length) = length.parse::<u64>() else {
        return Ok(());
    };
    if length > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("checkpoint declares {length} bytes, over the {max_bytes} byte cap"),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Answer one request on a loopback port with a canned raw response.
    pub(crate) fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn oversized_declared_checkpoint_writes_nothing() {
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nok".to_string();
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let mut sink = Vec::new();
        let err = stream_capped(response, &mut sink, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(sink.is_empty());
    }

    #[test]
    fn checkpoint_without_length_is_cut_off_at_cap() {
        let body = "a".repeat(32);
        let url = serve_once(format!("HTTP/1.0 200 OK\r\n\r\n{body}"));
        let response = agent().get(&url).call().unwrap();
        let mut sink = Vec::new();
        let err = stream_capped(response, &mut sink, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn checkpoint_under_cap_is_copied_verbatim() {
        let body = "PK\u{3}\u{4}archive/data.pkl";
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        let response = agent().get(&url).call().unwrap();
        let mut sink = Vec::new();
        let written = stream_capped(response, &mut sink, 64).unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(sink, body.as_bytes());
    }
}
