//! Linux administration over SSH, served as Model Context Protocol tools.

pub mod mcp;
