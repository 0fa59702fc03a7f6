use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Error codes reported to the client inside a `FinishedMessage`.
///
/// These cover failures with a defined business meaning; anything else is
/// surfaced as a server-side error and never reaches the client as a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A certificate in the judged chain has expired.
    CertificateExpired,
    /// A certificate in the judged chain has been revoked.
    CertificateRevoked,
    /// Generic certificate failure.
    Certificate,
    /// The chain does not terminate at a trusted root.
    CertificateNotTrusted,
    /// The citizen cancelled the operation on the client.
    UserCanceled,
    /// The citizen is not authorized for the requested operation.
    Authorization,
}
