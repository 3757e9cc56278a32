// MIT License - Copyright (c) 2026 Peter Wright
// EnvisaLink TPI constants

/// Frame terminators. Either one ends a frame on the inbound side.
pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

/// Outbound frame terminator.
pub const TERMINATOR: &str = "\r\n";

/// Default TPI port on EnvisaLink modules.
pub const DEFAULT_PORT: u16 = 4025;

/// Width of the command code prefix on every frame.
pub const CODE_LEN: usize = 3;

/// Width of the checksum trailer (two hex digits).
pub const CHECKSUM_LEN: usize = 2;

/// Largest unterminated tail kept between reads before it is discarded.
pub const MAX_PENDING_FRAME: usize = 1024;

/// `001`: Status report: asks the panel to dump all zone/partition state.
pub const CMD_STATUS_REQUEST: &str = "001";

/// `005`: Network login: followed by the module password.
pub const CMD_SEND_PASSWORD: &str = "005";

/// `652`: Partition armed. Carries the arm mode digit after the partition.
pub const CODE_PARTITION_ARMED: &str = "652";

/// Fixed-width field layout of inbound status frames.
///
/// ```text
/// 609001CS        zone frame:      code, zone(3), checksum
/// 65210CS         armed frame:     code, partition(1), mode(1), checksum
/// 70010001CS      user frame:      code, partition(1), user(4), checksum
/// 5053CS          login frame:     code, status(1), checksum
/// ```
pub mod layout {
    pub const ZONE: (usize, usize) = (3, 3);
    pub const PARTITION: (usize, usize) = (3, 1);
    pub const ARM_MODE: (usize, usize) = (4, 1);
    pub const USER: (usize, usize) = (4, 4);
    pub const LOGIN_STATUS: (usize, usize) = (3, 1);
}
