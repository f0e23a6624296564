#![allow(dead_code)]

use serde_json::{Value, json};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf, duplex, split,
};
use wirecall::{Client, ClientOptions};

/// The server end of an in-process duplex transport.
pub struct Peer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

pub fn pair() -> (Client, Peer) {
    pair_with(&ClientOptions::default())
}

pub fn pair_with(options: &ClientOptions) -> (Client, Peer) {
    let (near, far) = duplex(4096);
    let (r0, w0) = split(near);
    let (r1, w1) = split(far);
    let client = Client::new(BufReader::new(r0), w0, options);
    (
        client,
        Peer {
            reader: BufReader::new(r1),
            writer: w1,
        },
    )
}

impl Peer {
    /// Reads the next envelope sent by the client.
    pub async fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        assert!(!line.is_empty(), "peer hit eof");
        serde_json::from_str(&line).unwrap()
    }

    pub async fn send(&mut self, message: &Value) {
        self.send_raw(&message.to_string()).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Builds a success response echoing `request`'s id.
    pub fn result_for(request: &Value, result: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": request["id"], "result": result})
    }

    /// Builds an error response echoing `request`'s id.
    pub fn error_for(request: &Value, code: i64, message: &str) -> Value {
        json!({"jsonrpc": "2.0", "id": request["id"], "error": {"code": code, "message": message}})
    }
}
