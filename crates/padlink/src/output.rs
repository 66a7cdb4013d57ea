use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::sample::ControllerState;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SampleOutput<'a> {
    direction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<&'a str>,
    payload_size: usize,
    sample: &'a ControllerState,
}

/// Which side of the link printed the sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

pub fn print_sample(
    sample: &ControllerState,
    direction: Direction,
    peer: Option<&str>,
    payload_size: usize,
    format: OutputFormat,
) {
    println!(
        "{}",
        render_sample(sample, direction, peer, payload_size, format)
    );
}

pub fn render_sample(
    sample: &ControllerState,
    direction: Direction,
    peer: Option<&str>,
    payload_size: usize,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => {
            let out = SampleOutput {
                direction: direction.as_str(),
                peer,
                payload_size,
                sample,
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "DIR", "PEER", "SIZE", "LX", "LY", "RX", "RY", "LT", "RT", "TS",
                ])
                .add_row(vec![
                    direction.as_str().to_string(),
                    peer.unwrap_or("-").to_string(),
                    payload_size.to_string(),
                    sample.left_x.to_string(),
                    sample.left_y.to_string(),
                    sample.right_x.to_string(),
                    sample.right_y.to_string(),
                    sample.left_trigger.to_string(),
                    sample.right_trigger.to_string(),
                    sample.timestamp.to_string(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "{} peer={} size={} L=({:3},{:3}) R=({:3},{:3}) LT={:3} RT={:3} ts={}",
            direction.as_str(),
            peer.unwrap_or("-"),
            payload_size,
            sample.left_x,
            sample.left_y,
            sample.right_x,
            sample.right_y,
            sample.left_trigger,
            sample.right_trigger,
            sample.timestamp
        ),
    }
}
