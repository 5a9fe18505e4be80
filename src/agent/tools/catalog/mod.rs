use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolParam {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ToolParam],
    /// Side-effecting: requires a human decision before execution.
    pub gated: bool,
}

const fn req(name: &'static str, description: &'static str) -> ToolParam {
    ToolParam {
        name,
        kind: ParamType::String,
        required: true,
        description,
    }
}

const fn opt(name: &'static str, description: &'static str) -> ToolParam {
    ToolParam {
        name,
        kind: ParamType::String,
        required: false,
        description,
    }
}

const fn num(name: &'static str, description: &'static str) -> ToolParam {
    ToolParam {
        name,
        kind: ParamType::Number,
        required: false,
        description,
    }
}

pub const SEARCH_EMAIL: &str = "search_email";
pub const READ_EMAIL: &str = "read_email";
pub const SEND_EMAIL: &str = "send_email";
pub const LIST_EVENTS: &str = "list_events";
pub const CREATE_EVENT: &str = "create_event";
pub const SEARCH_CONTACTS: &str = "search_contacts";
pub const LIST_CHANNELS: &str = "list_channels";
pub const READ_CHANNEL: &str = "read_channel";
pub const SEARCH_MESSAGES: &str = "search_messages";
pub const SEND_MESSAGE: &str = "send_message";

pub static CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: SEARCH_EMAIL,
        description: "Search the mailbox. Returns sender, subject, date and a snippet per match.",
        params: &[
            req("query", "Gmail search query, e.g. 'from:alice newer_than:7d'"),
            num("limit", "Maximum results (default 10)"),
        ],
        gated: false,
    },
    ToolSpec {
        name: READ_EMAIL,
        description: "Read one email in full by its id.",
        params: &[req("id", "Message id from search_email")],
        gated: false,
    },
    ToolSpec {
        name: SEND_EMAIL,
        description: "Send an email. Requires user approval.",
        params: &[
            req("to", "Recipient address(es), comma separated"),
            req("subject", "Subject line"),
            req("body", "Plain-text body"),
            opt("cc", "CC address(es), comma separated"),
        ],
        gated: true,
    },
    ToolSpec {
        name: LIST_EVENTS,
        description: "List upcoming calendar events.",
        params: &[
            num("days", "How many days ahead to look (default 7)"),
            num("limit", "Maximum events (default 20)"),
        ],
        gated: false,
    },
    ToolSpec {
        name: CREATE_EVENT,
        description: "Create a calendar event. Requires user approval.",
        params: &[
            req("title", "Event title"),
            req("start", "Start time, RFC 3339 (e.g. 2025-03-01T10:00:00-05:00)"),
            req("end", "End time, RFC 3339"),
            opt("description", "Event description"),
            opt("location", "Event location"),
            opt("attendees", "Attendee emails, comma separated"),
        ],
        gated: true,
    },
    ToolSpec {
        name: SEARCH_CONTACTS,
        description: "Search contacts by name or email.",
        params: &[
            req("query", "Name or email fragment"),
            num("limit", "Maximum results (default 10)"),
        ],
        gated: false,
    },
    ToolSpec {
        name: LIST_CHANNELS,
        description: "List Slack channels you are a member of.",
        params: &[num("limit", "Maximum channels (default 100)")],
        gated: false,
    },
    ToolSpec {
        name: READ_CHANNEL,
        description: "Read recent Slack messages in a channel, including thread replies.",
        params: &[
            req("channel", "Channel name (e.g. #general) or id"),
            num("limit", "Maximum top-level messages (default 20)"),
        ],
        gated: false,
    },
    ToolSpec {
        name: SEARCH_MESSAGES,
        description: "Search Slack messages across channels.",
        params: &[
            req("query", "Slack search query, e.g. 'deploy in:#eng'"),
            num("limit", "Maximum results (default 20)"),
        ],
        gated: false,
    },
    ToolSpec {
        name: SEND_MESSAGE,
        description: "Post a Slack message. Requires user approval.",
        params: &[
            req("channel", "Channel name (e.g. #general) or id"),
            req("text", "Message text"),
            opt("thread_ts", "Reply inside this thread"),
        ],
        gated: true,
    },
];

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|t| t.name == name)
}

pub fn is_gated(name: &str) -> bool {
    find(name).is_some_and(|t| t.gated)
}

/// Render the catalog as the tool section of an agent prompt.
pub fn render_instructions() -> String {
    let mut out = String::from("Available tools:\n");
    for tool in CATALOG {
        let _ = write!(out, "\n{} - {}\n", tool.name, tool.description);
        for p in tool.params {
            let req_label = if p.required { "required" } else { "optional" };
            let _ = writeln!(
                out,
                "  - {} ({}, {}): {}",
                p.name,
                p.kind.as_str(),
                req_label,
                p.description
            );
        }
    }
    out
}
