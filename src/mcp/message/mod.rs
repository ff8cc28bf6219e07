//! Message building utilities for MCP responses.
//!
//! Every tool answers with human-readable text. The builders here keep the
//! wording of those replies in one place.

mod builder;

pub use builder::{
    CommandOutputMessageBuilder, SectionedReportBuilder, SessionListMessageBuilder,
    SessionMessageBuilder, ShellCommandMessageBuilder,
};
