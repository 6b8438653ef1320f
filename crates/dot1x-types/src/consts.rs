//! Protocol constants and managed-object defaults.

/// Largest EAPOL or RADIUS PDU the engine handles (one Ethernet payload).
pub const MAX_FRAME_SIZE: usize = 1500;

/// `quietPeriod` default (IEEE 802.1X-2004 §8.2.4.1.2).
pub const QUIET_PERIOD_DEFAULT: u16 = 60;

/// `reAuthMax` default.
pub const RE_AUTH_MAX_DEFAULT: u32 = 2;

/// `reAuthPeriod` default and permitted range, seconds.
pub const RE_AUTH_PERIOD_DEFAULT: u32 = 3600;
/// Lower bound of `reAuthPeriod`.
pub const RE_AUTH_PERIOD_MIN: u32 = 10;
/// Upper bound of `reAuthPeriod`.
pub const RE_AUTH_PERIOD_MAX: u32 = 86_400;

/// `serverTimeout` default and permitted range, seconds.
pub const SERVER_TIMEOUT_DEFAULT: u32 = 30;
/// Lower bound of `serverTimeout`.
pub const SERVER_TIMEOUT_MIN: u32 = 1;
/// Upper bound of `serverTimeout`.
pub const SERVER_TIMEOUT_MAX: u32 = 3600;

/// EAP request retransmit limit (`maxRetrans`, RFC 4137 default).
pub const MAX_RETRANS_DEFAULT: u32 = 4;

/// Supplicant `maxStart` default (IEEE 802.1X-2004 §8.2.11.1.2).
pub const MAX_START_DEFAULT: u32 = 3;

/// Supplicant `startPeriod` default, seconds.
pub const START_PERIOD_DEFAULT: u32 = 30;

/// Supplicant `heldPeriod` default, seconds.
pub const HELD_PERIOD_DEFAULT: u32 = 60;

/// Supplicant backend `authPeriod` default, seconds.
pub const AUTH_PERIOD_DEFAULT: u32 = 30;

/// RADIUS Access-Request retransmit interval, seconds.
pub const RADIUS_TIMEOUT: u32 = 5;

/// RADIUS Access-Request retransmit limit.
pub const MAX_RADIUS_RETRANS: u32 = 4;

/// Longest State attribute value echoed back to the server.
pub const MAX_STATE_SIZE: usize = 64;

/// Longest identity copied from an EAP-Response/Identity.
pub const MAX_IDENTITY_LEN: usize = 64;

/// Longest RADIUS shared secret.
pub const MAX_SECRET_LEN: usize = 64;

/// Longest single RADIUS attribute value (RFC 2865 §5).
pub const RADIUS_MAX_ATTR_VALUE_LEN: usize = 253;

/// MD5 digest size, octets.
pub const MD5_DIGEST_SIZE: usize = 16;

/// Default RADIUS authentication port.
pub const RADIUS_AUTH_PORT: u16 = 1812;

/// Default EAP retransmit timeout for locally generated requests, seconds
/// (RFC 3748 §4.3 recommends 3-5 s; Identity uses 5 s).
pub const METHOD_TIMEOUT_DEFAULT: u32 = 5;
