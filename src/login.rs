/*
 * Client Login and Identity
 *
 * Opening a session carries two meta parameters synthesized by the driver:
 * the target identity (trusted application UUID) and the client identity
 * (client UUID + login method). Login methods are a fixed GlobalPlatform
 * enumeration; anything outside it is refused before the message is sent.
 *
 * Login methods:
 * - Public: client is neither identified nor authenticated, nil UUID
 * - User: UUID reflects the user running the calling application
 * - Group: UUID reflects a group executing the calling application
 * - Application: UUID identifies the calling application
 * - UserApplication: UUID identifies both the application and its user
 * - GroupApplication: UUID identifies both the application and a group
 *
 * The driver does not authenticate clients. For every login except Public it
 * forwards the client UUID handed in by the session layer above, which is
 * responsible for deriving it. A caller that leaves it unset sends the nil
 * UUID, the same as a public login.
 */

use crate::msg::{AttrFlags, MsgParam, ParamType};

/// 128-bit UUID in wire byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub const NIL: Uuid = Uuid([0; 16]);

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Split into the two 64-bit words of a value parameter (memory order)
    fn to_words(self) -> (u64, u64) {
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&self.0[..8]);
        hi.copy_from_slice(&self.0[8..]);
        (u64::from_le_bytes(lo), u64::from_le_bytes(hi))
    }
}

impl core::fmt::Display for Uuid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Client login method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LoginType {
    Public = 0,
    User = 1,
    Group = 2,
    Application = 4,
    UserApplication = 5,
    GroupApplication = 6,
}

impl LoginType {
    /// Membership test against the supported login methods
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LoginType::Public),
            1 => Some(LoginType::User),
            2 => Some(LoginType::Group),
            4 => Some(LoginType::Application),
            5 => Some(LoginType::UserApplication),
            6 => Some(LoginType::GroupApplication),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub const ALL: [LoginType; 6] = [
        LoginType::Public,
        LoginType::User,
        LoginType::Group,
        LoginType::Application,
        LoginType::UserApplication,
        LoginType::GroupApplication,
    ];
}

/// Meta parameter 0: the trusted application to open
pub fn target_identity(uuid: &Uuid) -> MsgParam {
    let (a, b) = uuid.to_words();
    MsgParam::new(ParamType::ValueInput, AttrFlags::META, a, b, 0)
}

/// Meta parameter 1: who is asking, and how they logged in
///
/// A public login has no identity, so the client UUID is forced to nil.
pub fn client_identity(login: LoginType, client: &Uuid) -> MsgParam {
    let client = match login {
        LoginType::Public => Uuid::NIL,
        _ => *client,
    };
    let (a, b) = client.to_words();
    MsgParam::new(
        ParamType::ValueInput,
        AttrFlags::META,
        a,
        b,
        login.as_raw() as u64,
    )
}
