//! Scripted test server.
//!
//! Listens on an ephemeral port, accepts the client's connection and lets
//! the test read what the client sends and answer line by line.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A listening test server.
pub struct ScriptedServer {
    listener: TcpListener,
}

impl ScriptedServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or_default()
    }

    /// Wait for the client to connect.
    pub async fn accept(&self) -> anyhow::Result<Peer> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(Peer {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

/// The server side of one connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Peer {
    /// Send one raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send several lines in order.
    pub async fn send_all(&mut self, lines: &[&str]) -> anyhow::Result<()> {
        for line in lines {
            self.send_raw(line).await?;
        }
        Ok(())
    }

    /// Receive one line from the client, without terminator.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = timeout(dur, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("client closed the connection");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Receive lines until one equals `expected`; returns everything read.
    pub async fn expect(&mut self, expected: &str) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = line == expected;
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Read the login and finish registration as `nick`.
    pub async fn register(&mut self, nick: &str) -> anyhow::Result<()> {
        self.expect("CAP LS").await?;
        self.send_raw("CAP * LS :multi-prefix").await?;
        self.expect("CAP REQ :multi-prefix").await?;
        self.send_raw("CAP * ACK :multi-prefix").await?;
        self.expect("CAP END").await?;
        self.send_all(&[
            &format!(":irc.test.net 001 {nick} :Welcome to TestNet {nick}!ident@client.test"),
            &format!(":irc.test.net 002 {nick} :Your host is irc.test.net"),
            &format!(":irc.test.net 003 {nick} :This server was created today"),
            &format!(":irc.test.net 004 {nick} irc.test.net ergo-2.12.0 iow ov"),
            &format!(
                ":irc.test.net 005 {nick} NETWORK=TestNet PREFIX=(ov)@+ CHANTYPES=# :are supported"
            ),
        ])
        .await
    }

    /// Close the connection from the server side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
