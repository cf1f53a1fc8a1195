#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusWord {
    /// Rejected by user
    Deny = 0x6985,
    /// Incorrect Data
    IncorrectData = 0x6A80,
    /// Wrong DataLength
    WrongDataLength = 0x6A87,
    /// Ins not supported
    InsNotSupported = 0x6D00,
    /// Cla not supported
    ClaNotSupported = 0x6E00,
    /// Bad state
    BadState = 0xB007,
    /// Success
    OK = 0x9000,

    /// Unknown
    Unknown,
}

impl TryFrom<u16> for StatusWord {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x6985 => Ok(StatusWord::Deny),
            0x6A80 => Ok(StatusWord::IncorrectData),
            0x6A87 => Ok(StatusWord::WrongDataLength),
            0x6D00 => Ok(StatusWord::InsNotSupported),
            0x6E00 => Ok(StatusWord::ClaNotSupported),
            0xB007 => Ok(StatusWord::BadState),
            0x9000 => Ok(StatusWord::OK),
            _ => Err(()),
        }
    }
}

impl StatusWord {
    /// Decodes the two trailing bytes of a device answer.
    pub fn from_bytes(hi: u8, lo: u8) -> Self {
        StatusWord::try_from(u16::from_be_bytes([hi, lo])).unwrap_or(StatusWord::Unknown)
    }

    /// Raw 16-bit value; `Unknown` maps to 0x6F00.
    pub fn to_u16(self) -> u16 {
        match self {
            StatusWord::Unknown => 0x6F00,
            sw => sw as u16,
        }
    }
}

/// Class byte of the signer application.
pub const CLA: u8 = 0xE0;
/// Carries one chunk of a length-prefixed request.
pub const INS_MESSAGE: u8 = 0x10;
/// Asks for the next chunk of a pending response.
pub const INS_CONTINUE: u8 = 0xFF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct APDUCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl APDUCommand {
    pub fn encode(&self) -> Vec<u8> {
        if self.data.len() <= 255 {
            let mut vec = vec![self.cla, self.ins, self.p1, self.p2, self.data.len() as u8];
            vec.extend(self.data.iter());
            vec
        } else {
            let len_lo = (self.data.len() as u16 & 0xFF) as u8;
            let len_hi = ((self.data.len() as u16 >> 8) & 0xFF) as u8;
            let mut vec = vec![self.cla, self.ins, self.p1, self.p2, 0, len_hi, len_lo];
            vec.extend(self.data.iter());
            vec
        }
    }
}

pub fn apdu_message(chunk: Vec<u8>) -> APDUCommand {
    APDUCommand {
        cla: CLA,
        ins: INS_MESSAGE,
        p1: 0,
        p2: 0,
        data: chunk,
    }
}

pub fn apdu_continue() -> APDUCommand {
    APDUCommand {
        cla: CLA,
        ins: INS_CONTINUE,
        p1: 0,
        p2: 0,
        data: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_short_apdu() {
        let apdu = apdu_message(vec![0xAA, 0xBB]);
        assert_eq!(apdu.encode(), vec![0xE0, 0x10, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn test_status_word_from_bytes() {
        assert_eq!(StatusWord::from_bytes(0x90, 0x00), StatusWord::OK);
        assert_eq!(StatusWord::from_bytes(0x69, 0x85), StatusWord::Deny);
        assert_eq!(StatusWord::from_bytes(0x12, 0x34), StatusWord::Unknown);
    }
}
