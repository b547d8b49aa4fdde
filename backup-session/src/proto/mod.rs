//! Wire vocabulary shared by the network channel and the manifest files.
//!
//! Both carry the same record shape: a one-byte command tag, a four digit
//! uppercase hex payload length and the payload itself.

pub mod channel;
pub mod codec;

pub use channel::{FramedChannel, MessageChannel};
pub use codec::MessageCodec;

/// Largest payload a single record can carry (four hex digits).
pub const MAX_PAYLOAD: usize = 0xFFFF;

/// Length of a record header: tag byte plus four hex digits.
pub const HEADER_LEN: usize = 5;

/// Command tags. The byte values are fixed by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Generic text; every handshake message uses this.
    Gen,
    Attribs,
    Datapth,
    File,
    EncFile,
    Directory,
    SoftLink,
    HardLink,
    Special,
    Metadata,
    EncMetadata,
    EfsFile,
    EndFile,
    Sig,
    Error,
    Warning,
    Interrupt,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Gen => b'c',
            Command::Attribs => b'r',
            Command::Datapth => b't',
            Command::File => b'f',
            Command::EncFile => b'y',
            Command::Directory => b'd',
            Command::SoftLink => b'l',
            Command::HardLink => b'L',
            Command::Special => b's',
            Command::Metadata => b'm',
            Command::EncMetadata => b'n',
            Command::EfsFile => b'k',
            Command::EndFile => b'x',
            Command::Sig => b'S',
            Command::Error => b'e',
            Command::Warning => b'W',
            Command::Interrupt => b'i',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        let cmd = match b {
            b'c' => Command::Gen,
            b'r' => Command::Attribs,
            b't' => Command::Datapth,
            b'f' => Command::File,
            b'y' => Command::EncFile,
            b'd' => Command::Directory,
            b'l' => Command::SoftLink,
            b'L' => Command::HardLink,
            b's' => Command::Special,
            b'm' => Command::Metadata,
            b'n' => Command::EncMetadata,
            b'k' => Command::EfsFile,
            b'x' => Command::EndFile,
            b'S' => Command::Sig,
            b'e' => Command::Error,
            b'W' => Command::Warning,
            b'i' => Command::Interrupt,
            _ => return None,
        };
        Some(cmd)
    }

    pub fn as_char(self) -> char {
        self.as_byte() as char
    }

    pub fn is_link(self) -> bool {
        matches!(self, Command::SoftLink | Command::HardLink)
    }

    /// Commands that name something in the backed-up namespace and may
    /// therefore appear in a directory listing.
    pub fn is_listable(self) -> bool {
        matches!(
            self,
            Command::Directory
                | Command::File
                | Command::EncFile
                | Command::EfsFile
                | Command::Special
        ) || self.is_link()
    }

    /// Path commands that carry file data and may be followed by an
    /// end-file record.
    pub fn has_data(self) -> bool {
        matches!(
            self,
            Command::File
                | Command::EncFile
                | Command::EfsFile
                | Command::Metadata
                | Command::EncMetadata
        )
    }

    /// Any command that can follow an attributes record.
    pub fn is_path(self) -> bool {
        self.is_listable() || matches!(self, Command::Metadata | Command::EncMetadata)
    }
}

/// One framed message. The payload is owned; whoever receives a message
/// consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub cmd: Command,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(cmd: Command, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            cmd,
            payload: payload.into(),
        }
    }

    pub fn gen(text: impl Into<String>) -> Self {
        Self::new(Command::Gen, text.into().into_bytes())
    }

    /// Payload as text, replacing invalid UTF-8.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Consume the message and return its payload as a `String`.
    pub fn into_text(self) -> String {
        match String::from_utf8(self.payload) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Build a record header for `cmd` with a payload of `len` bytes.
pub fn encode_header(cmd: Command, len: usize) -> Option<[u8; HEADER_LEN]> {
    if len > MAX_PAYLOAD {
        return None;
    }
    let mut header = [0u8; HEADER_LEN];
    header[0] = cmd.as_byte();
    let hex = format!("{len:04X}");
    header[1..].copy_from_slice(hex.as_bytes());
    Some(header)
}

/// Parse a record header into its command and payload length.
pub fn decode_header(header: &[u8]) -> std::result::Result<(Command, usize), String> {
    if header.len() < HEADER_LEN {
        return Err(format!("short header ({} bytes)", header.len()));
    }
    let cmd = Command::from_byte(header[0])
        .ok_or_else(|| format!("unknown command byte 0x{:02x}", header[0]))?;
    let digits = std::str::from_utf8(&header[1..HEADER_LEN])
        .map_err(|_| "length is not ASCII".to_string())?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("length {digits:?} is not hex"));
    }
    let len = usize::from_str_radix(digits, 16).map_err(|e| e.to_string())?;
    Ok((cmd, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = encode_header(Command::Gen, 5).unwrap();
        assert_eq!(&header, b"c0005");

        let header = encode_header(Command::Directory, 0xABC).unwrap();
        assert_eq!(&header, b"d0ABC");
    }

    #[test]
    fn test_header_rejects_oversized_payload() {
        assert!(encode_header(Command::Gen, MAX_PAYLOAD).is_some());
        assert!(encode_header(Command::Gen, MAX_PAYLOAD + 1).is_none());
    }

    #[test]
    fn test_decode_header_errors() {
        assert!(decode_header(b"c00").is_err());
        assert!(decode_header(b"?0005").is_err());
        assert!(decode_header(b"c00G5").is_err());
        assert_eq!(decode_header(b"f00ff").unwrap(), (Command::File, 255));
    }

    #[test]
    fn test_listable_commands() {
        for cmd in [
            Command::Directory,
            Command::File,
            Command::EncFile,
            Command::EfsFile,
            Command::Special,
            Command::SoftLink,
            Command::HardLink,
        ] {
            assert!(cmd.is_listable(), "{cmd:?} should be listable");
        }
        for cmd in [Command::Gen, Command::Metadata, Command::EndFile, Command::Attribs] {
            assert!(!cmd.is_listable(), "{cmd:?} should not be listable");
        }
    }

    #[test]
    fn test_every_command_byte_is_unique() {
        let all = [
            Command::Gen,
            Command::Attribs,
            Command::Datapth,
            Command::File,
            Command::EncFile,
            Command::Directory,
            Command::SoftLink,
            Command::HardLink,
            Command::Special,
            Command::Metadata,
            Command::EncMetadata,
            Command::EfsFile,
            Command::EndFile,
            Command::Sig,
            Command::Error,
            Command::Warning,
            Command::Interrupt,
        ];
        for cmd in all {
            assert_eq!(Command::from_byte(cmd.as_byte()), Some(cmd));
        }
    }
}
