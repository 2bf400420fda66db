//! Logical chat messages and their space-token text layout.
//!
//! Every message is a type tag followed by positional fields, joined by a
//! single space. Only the trailing free-text field (message text, file
//! content) may itself contain spaces; the receiver re-joins everything past
//! the fixed fields into that trailing field.

use crate::error::ProtocolError;

// client -> server
pub const JOIN: &str = "join";
pub const DISCONNECT: &str = "disconnect";
pub const SEND_MESSAGE: &str = "send_message";
pub const SEND_FILE: &str = "send_file";
pub const REQUEST_USERS_LIST: &str = "request_users_list";

// server -> client
pub const FORWARD_MESSAGE: &str = "forward_message";
pub const FORWARD_FILE: &str = "forward_file";
pub const RESPONSE_USERS_LIST: &str = "RESPONSE_USERS_LIST";
pub const ERR_SERVER_FULL: &str = "ERR_SERVER_FULL";
pub const ERR_USERNAME_UNAVAILABLE: &str = "ERR_USERNAME_UNAVAILABLE";
pub const ERR_UNKNOWN_MESSAGE: &str = "err_unknown_message";

const SEPARATOR: char = ' ';
const SEPARATOR_STR: &str = " ";

/// Untyped message: a type tag plus its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: String,
    pub fields: Vec<String>,
}

impl Frame {
    pub fn new(tag: impl Into<String>, fields: Vec<String>) -> Self {
        Frame {
            tag: tag.into(),
            fields,
        }
    }

    // Splitting on a single space (not whitespace runs) keeps the split lossless
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split(SEPARATOR).map(str::to_owned);
        let tag = tokens.next().unwrap_or_default();

        Frame {
            tag,
            fields: tokens.collect(),
        }
    }

    pub fn encode(&self) -> String {
        let len = self.fields.iter().map(|f| f.len() + 1).sum::<usize>();
        let mut text = String::with_capacity(self.tag.len() + len);
        text.push_str(&self.tag);

        for field in &self.fields {
            text.push(SEPARATOR);
            text.push_str(field);
        }

        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    // join <username>
    Join(String),
    // disconnect <username>
    Disconnect(String),
    // send_message <n> <user1> .. <userN> <message...>
    SendMessage {
        recipients: Vec<String>,
        text: String,
    },
    // send_file <n> <user1> .. <userN> <filename> <content...>
    SendFile {
        recipients: Vec<String>,
        filename: String,
        content: String,
    },
    // request_users_list
    UsersList,
}

impl Request {
    pub fn tag(&self) -> &'static str {
        match self {
            Request::Join(_) => JOIN,
            Request::Disconnect(_) => DISCONNECT,
            Request::SendMessage { .. } => SEND_MESSAGE,
            Request::SendFile { .. } => SEND_FILE,
            Request::UsersList => REQUEST_USERS_LIST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    // forward_message <sender> <message...>
    ForwardMessage {
        sender: String,
        text: String,
    },
    // forward_file <sender> <filename> <content...>
    ForwardFile {
        sender: String,
        filename: String,
        content: String,
    },
    // RESPONSE_USERS_LIST <user1> .. <userN>
    UsersList(Vec<String>),
    // ERR_SERVER_FULL
    ServerFull,
    // ERR_USERNAME_UNAVAILABLE
    UsernameUnavailable,
    // err_unknown_message
    UnknownMessage,
}

impl Response {
    pub fn tag(&self) -> &'static str {
        match self {
            Response::ForwardMessage { .. } => FORWARD_MESSAGE,
            Response::ForwardFile { .. } => FORWARD_FILE,
            Response::UsersList(_) => RESPONSE_USERS_LIST,
            Response::ServerFull => ERR_SERVER_FULL,
            Response::UsernameUnavailable => ERR_USERNAME_UNAVAILABLE,
            Response::UnknownMessage => ERR_UNKNOWN_MESSAGE,
        }
    }
}

impl From<Request> for Frame {
    fn from(request: Request) -> Frame {
        let tag = request.tag();

        let fields = match request {
            Request::Join(name) | Request::Disconnect(name) => vec![name],
            Request::SendMessage { recipients, text } => {
                let mut fields = counted(recipients);
                fields.push(text);
                fields
            },
            Request::SendFile { recipients, filename, content } => {
                let mut fields = counted(recipients);
                fields.push(filename);
                fields.push(content);
                fields
            },
            Request::UsersList => vec![],
        };

        Frame::new(tag, fields)
    }
}

impl From<Response> for Frame {
    fn from(response: Response) -> Frame {
        let tag = response.tag();

        let fields = match response {
            Response::ForwardMessage { sender, text } => vec![sender, text],
            Response::ForwardFile { sender, filename, content } => vec![sender, filename, content],
            Response::UsersList(names) => names,
            Response::ServerFull | Response::UsernameUnavailable | Response::UnknownMessage => vec![],
        };

        Frame::new(tag, fields)
    }
}

impl TryFrom<Frame> for Request {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let Frame { tag, fields } = frame;

        match tag.as_str() {
            JOIN => {
                if fields.len() != 1 {
                    return Err(malformed(JOIN, "expected exactly one username"));
                }
                let name = required(fields.into_iter().next(), JOIN, "missing username")?;
                Ok(Request::Join(name))
            },
            // the username is informational only, the server knows who is leaving
            DISCONNECT => Ok(Request::Disconnect(fields.into_iter().next().unwrap_or_default())),
            SEND_MESSAGE => {
                let (recipients, rest) = split_recipients(fields, SEND_MESSAGE)?;
                Ok(Request::SendMessage {
                    recipients,
                    text: trailing(rest),
                })
            },
            SEND_FILE => {
                let (recipients, rest) = split_recipients(fields, SEND_FILE)?;
                let mut rest = rest.into_iter();
                let filename = required(rest.next(), SEND_FILE, "missing filename")?;
                Ok(Request::SendFile {
                    recipients,
                    filename,
                    content: trailing(rest),
                })
            },
            REQUEST_USERS_LIST => Ok(Request::UsersList),
            _ => Err(ProtocolError::UnknownTag(tag)),
        }
    }
}

impl TryFrom<Frame> for Response {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let Frame { tag, fields } = frame;

        match tag.as_str() {
            FORWARD_MESSAGE => {
                let mut fields = fields.into_iter();
                let sender = required(fields.next(), FORWARD_MESSAGE, "missing sender")?;
                Ok(Response::ForwardMessage {
                    sender,
                    text: trailing(fields),
                })
            },
            FORWARD_FILE => {
                let mut fields = fields.into_iter();
                let sender = required(fields.next(), FORWARD_FILE, "missing sender")?;
                let filename = required(fields.next(), FORWARD_FILE, "missing filename")?;
                Ok(Response::ForwardFile {
                    sender,
                    filename,
                    content: trailing(fields),
                })
            },
            RESPONSE_USERS_LIST => {
                let names = fields.into_iter().filter(|n| !n.is_empty()).collect();
                Ok(Response::UsersList(names))
            },
            ERR_SERVER_FULL => Ok(Response::ServerFull),
            ERR_USERNAME_UNAVAILABLE => Ok(Response::UsernameUnavailable),
            ERR_UNKNOWN_MESSAGE => Ok(Response::UnknownMessage),
            _ => Err(ProtocolError::UnknownTag(tag)),
        }
    }
}

fn counted(recipients: Vec<String>) -> Vec<String> {
    let mut fields = Vec::with_capacity(recipients.len() + 3);
    fields.push(recipients.len().to_string());
    fields.extend(recipients);
    fields
}

// <n> <user1> .. <userN> <rest...>
fn split_recipients(fields: Vec<String>, tag: &'static str) -> Result<(Vec<String>, Vec<String>), ProtocolError> {
    let mut fields = fields.into_iter();

    let count: usize = fields
        .next()
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| malformed(tag, "recipient count is not a number"))?;

    let recipients: Vec<String> = fields.by_ref().take(count).collect();
    if recipients.len() < count {
        return Err(malformed(tag, "fewer recipients than announced"));
    }
    if recipients.iter().any(|r| r.is_empty()) {
        return Err(malformed(tag, "empty recipient name"));
    }

    Ok((recipients, fields.collect()))
}

fn required(field: Option<String>, tag: &'static str, reason: &'static str) -> Result<String, ProtocolError> {
    field.filter(|f| !f.is_empty()).ok_or_else(|| malformed(tag, reason))
}

fn trailing<I: IntoIterator<Item = String>>(rest: I) -> String {
    rest.into_iter().collect::<Vec<_>>().join(SEPARATOR_STR)
}

fn malformed(tag: &'static str, reason: &'static str) -> ProtocolError {
    ProtocolError::Malformed { tag, reason }
}
