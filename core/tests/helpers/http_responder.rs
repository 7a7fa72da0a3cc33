//! Raw TCP stand-in for the remote endpoints

#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
	task::JoinHandle,
};

/// Serve one JSON response per request, in order, returning the request
/// bodies once every response has been sent. Connections that close without
/// sending a request (reachability probes) are skipped.
pub async fn serve_json(responses: Vec<(u16, String)>) -> (SocketAddr, JoinHandle<Vec<String>>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let handle = tokio::spawn(async move {
		let mut bodies = Vec::new();

		for (status, body) in responses {
			let mut socket = loop {
				let (mut socket, _) = listener.accept().await.unwrap();
				if let Some(request) = read_body(&mut socket).await {
					bodies.push(request);
					break socket;
				}
			};

			let response = format!(
				"HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
				body.len()
			);
			socket.write_all(response.as_bytes()).await.ok();
			socket.shutdown().await.ok();
		}

		bodies
	});

	(addr, handle)
}

async fn read_body(socket: &mut tokio::net::TcpStream) -> Option<String> {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 4096];

	loop {
		let n = socket.read(&mut chunk).await.unwrap_or(0);
		if n == 0 {
			return None;
		}
		buf.extend_from_slice(&chunk[..n]);

		let text = String::from_utf8_lossy(&buf).into_owned();
		let Some(header_end) = text.find("\r\n\r\n") else {
			continue;
		};
		let content_length = text[..header_end]
			.lines()
			.filter_map(|line| line.split_once(':'))
			.find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
			.and_then(|(_, value)| value.trim().parse::<usize>().ok())
			.unwrap_or(0);

		if buf.len() >= header_end + 4 + content_length {
			return Some(text[header_end + 4..].to_string());
		}
	}
}
