//! Command codes
//!
//! One unsigned byte at the start of every message. Codes are compared as
//! plain `u8`s; no command gets special masking.

use super::codec::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Graceful end of stream, no payload
    End = 0x02,
    AddNode = 0x10,
    DelNode = 0x11,
    AddEdge = 0x12,
    DelEdge = 0x13,
    Step = 0x14,
    Cleared = 0x15,
    AddGraphAttr = 0x16,
    ChgGraphAttr = 0x17,
    DelGraphAttr = 0x18,
    AddNodeAttr = 0x19,
    ChgNodeAttr = 0x1A,
    DelNodeAttr = 0x1B,
    AddEdgeAttr = 0x1C,
    ChgEdgeAttr = 0x1D,
    DelEdgeAttr = 0x1E,
}

impl Command {
    pub const ALL: [Command; 16] = [
        Command::End,
        Command::AddNode,
        Command::DelNode,
        Command::AddEdge,
        Command::DelEdge,
        Command::Step,
        Command::Cleared,
        Command::AddGraphAttr,
        Command::ChgGraphAttr,
        Command::DelGraphAttr,
        Command::AddNodeAttr,
        Command::ChgNodeAttr,
        Command::DelNodeAttr,
        Command::AddEdgeAttr,
        Command::ChgEdgeAttr,
        Command::DelEdgeAttr,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::End => "END",
            Command::AddNode => "ADD_NODE",
            Command::DelNode => "DEL_NODE",
            Command::AddEdge => "ADD_EDGE",
            Command::DelEdge => "DEL_EDGE",
            Command::Step => "STEP",
            Command::Cleared => "CLEARED",
            Command::AddGraphAttr => "ADD_GRAPH_ATTR",
            Command::ChgGraphAttr => "CHG_GRAPH_ATTR",
            Command::DelGraphAttr => "DEL_GRAPH_ATTR",
            Command::AddNodeAttr => "ADD_NODE_ATTR",
            Command::ChgNodeAttr => "CHG_NODE_ATTR",
            Command::DelNodeAttr => "DEL_NODE_ATTR",
            Command::AddEdgeAttr => "ADD_EDGE_ATTR",
            Command::ChgEdgeAttr => "CHG_EDGE_ATTR",
            Command::DelEdgeAttr => "DEL_EDGE_ATTR",
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .into_iter()
            .find(|command| command.code() == code)
            .ok_or(CodecError::UnknownCommand(code))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for command in Command::ALL {
            assert_eq!(Command::try_from(command.code()).unwrap(), command);
        }
    }

    #[test]
    fn test_del_node_is_a_plain_byte() {
        assert_eq!(Command::try_from(0x11).unwrap(), Command::DelNode);
        // No sign-extended or masked alias decodes to DEL_NODE
        assert!(Command::try_from(0x91).is_err());
        assert!(Command::try_from(0xFF).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            Command::try_from(0x7F),
            Err(CodecError::UnknownCommand(0x7F))
        ));
    }
}
