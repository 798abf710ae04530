use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fastlink::demo::{DEMO_SERVICE, RAW_MESSAGE, TEXT_MESSAGE};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A decoded message as the CLI reports it.
#[derive(Debug, Clone, Copy)]
pub struct Received<'a> {
    pub service: u8,
    pub message: u8,
    pub payload: &'a [u8],
    pub peer: &'a str,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    service: u8,
    message: u8,
    kind: &'a str,
    payload_size: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(received: &Received<'_>, format: OutputFormat) {
    let kind = message_kind(received.service, received.message);
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                service: received.service,
                message: received.message,
                kind,
                payload_size: received.payload.len(),
                payload: payload_preview(received.payload),
                peer: received.peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVICE", "MESSAGE", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    received.service.to_string(),
                    kind.to_string(),
                    received.payload.len().to_string(),
                    received.peer.to_string(),
                    payload_preview(received.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "service={} message={} ({}) size={} peer={} payload={}",
                received.service,
                received.message,
                kind,
                received.payload.len(),
                received.peer,
                payload_preview(received.payload)
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(received.payload);
            let _ = out.flush();
        }
    }
}

pub fn message_kind(service: u8, message: u8) -> &'static str {
    match (service, message) {
        (DEMO_SERVICE, TEXT_MESSAGE) => "TEXT",
        (DEMO_SERVICE, RAW_MESSAGE) => "RAW",
        _ => "UNKNOWN",
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
