use std::io;
use std::path::PathBuf;

use thiserror::Error;

use chat_protocol::SessionError;

// client type definitions

// A parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message { recipients: Vec<String>, text: String },
    File { recipients: Vec<String>, path: PathBuf },
    List,
    Help,
    Quit,
}

// Problems with user input, shown to the user and never sent to the server
#[derive(Debug, Error)]
pub enum InputError {
    #[error("incorrect userinput format")]
    Format,

    #[error("Incorrect file path")]
    FileUnavailable { path: PathBuf, source: Option<io::Error> },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to start input reader: {0}")]
    Input(#[from] io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}
