//! Endpoint role, which decides masking on the wire.

/// Which end of the connection a codec speaks for.
///
/// The engine always runs as [`Role::Server`]; [`Role::Client`] exists so
/// the same codec can drive test clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Masks every outgoing frame, expects unmasked frames.
    Client,
    /// Never masks, expects every incoming frame masked.
    Server,
}

impl Role {
    /// Clients must mask all frames sent to servers.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Servers expect masked frames from clients.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "Client"),
            Role::Server => write!(f, "Server"),
        }
    }
}
