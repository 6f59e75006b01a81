//! Canned HTTP server for the client tests.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    thread::{self, JoinHandle},
};

pub struct RecordedRequest {
    pub head: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

pub fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let headers: String =
        headers.iter().map(|(name, value)| format!("{name}: {value}\r\n")).collect();
    format!(
        "HTTP/1.1 {status}\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    )
}

/// Answer one connection per response, in order.
///
/// Returns the base URL and a handle yielding the requests received.
pub fn serve(
    responses: Vec<String>,
) -> std::io::Result<(String, JoinHandle<std::io::Result<Vec<RecordedRequest>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}", listener.local_addr()?);
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for response in responses {
            let (stream, _) = listener.accept()?;
            let mut reader = BufReader::new(&stream);
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            let mut request = RecordedRequest { head, body: String::new() };
            let length = request
                .header("content-length")
                .and_then(|length| length.parse::<usize>().ok())
                .unwrap_or_default();
            let mut body = vec![0; length];
            reader.read_exact(&mut body)?;
            request.body = String::from_utf8_lossy(&body).into_owned();
            (&stream).write_all(response.as_bytes())?;
            requests.push(request);
        }
        Ok(requests)
    });
    Ok((url, handle))
}
