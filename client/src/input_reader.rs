//! Standard input, read on its own OS thread.
//!
//! A terminal read cannot be cancelled, so it never runs on the runtime; the
//! thread forwards each line into a channel and the command task selects on
//! that channel next to the shutdown signal. The channel closes at end of
//! input.

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

const USER_LINES: usize = 64;

pub struct InputReader;

impl InputReader {
    pub fn spawn() -> io::Result<Receiver<String>> {
        let (tx, rx) = mpsc::channel(USER_LINES);

        thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || Self::forward_lines(io::stdin().lock(), tx))?;

        Ok(rx)
    }

    // blocking loop, returns at end of input or once the receiver is gone
    pub fn forward_lines<B: BufRead>(mut input: B, tx: Sender<String>) {
        let mut buf = String::new();

        loop {
            buf.clear();
            match input.read_line(&mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = buf.trim_end_matches(['\n', '\r']).to_owned();
                    if tx.blocking_send(line).is_err() {
                        break
                    }
                },
                Err(e) => {
                    debug!("stdin read failed: {}", e);
                    break
                },
            }
        }

        debug!("stdin reader exiting");
    }
}
