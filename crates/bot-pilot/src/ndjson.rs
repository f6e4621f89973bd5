//! Decoding of newline-delimited JSON event streams.
//!
//! The matchmaking service streams one JSON object per line and sends empty
//! lines as keep-alives. [`spawn_decoder`] turns any such byte stream into an
//! [`EventStream`] of typed events, which is what [`RemoteService`]
//! implementations hand to the bot.
//!
//! [`RemoteService`]: crate::remote::RemoteService

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::remote::EventStream;

const STREAM_BUFFER: usize = 32;

/// Spawns a task that decodes `reader` line by line into `T`.
///
/// The stream ends at EOF, on a read error, on the first line that does not
/// decode, or when the receiving side is dropped.
pub fn spawn_decoder<T, R>(reader: R) -> EventStream<T>
where
    T: DeserializeOwned + Send + 'static,
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "event stream read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let event = match serde_json::from_str::<T>(&line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, %line, "undecodable event, closing stream");
                    break;
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
        tracing::debug!("event stream ended");
    });
    rx
}
