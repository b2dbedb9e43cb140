use ark_serialize::SerializationError;
use schnorr_pok::error::SchnorrError;
use serde::{Deserialize, Serialize};

/// The kinds of revocation lists, in the order a verifier consults them
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
pub enum RevocationListKind {
    Group,
    PrivateKey,
    Signature,
    Verifier,
}

/// Why a verifier did not accept a signature. Revocation findings are distinguishable from
/// signatures that are invalid by [`Rejection::is_revocation`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Rejection {
    MalformedSignature,
    InvalidProof,
    BasenameMismatch,
    /// Signature does not carry one non-revoked proof per entry of the loaded signature revocation list
    MissingNonRevokedProof,
    /// Signature was created against a different version of the signature revocation list
    SigRlVersionMismatch,
    InvalidNonRevokedProof,
    RevokedBy(RevocationListKind),
    Cancelled,
}

impl Rejection {
    pub fn is_revocation(&self) -> bool {
        matches!(self, Self::RevokedBy(_))
    }
}

#[derive(Debug)]
pub enum EpidError {
    InvalidCredential,
    InvalidGroupPublicKey,
    InvalidJoinRequest,
    GroupIdMismatch,
    UnsupportedGroupIdScheme(u8),
    UnsupportedHashAlg(u8),
    TooManyBasenames(usize),
    BasenameNotRegistered,
    BasenameRequired,
    /// (size, maximum allowed)
    RevocationListTooLarge(usize, usize),
    InvalidRevocationList,
    StaleRevocationList {
        kind: RevocationListKind,
        current: u64,
        incoming: u64,
    },
    PrecompNotInGroup,
    PreSignaturePoolEmpty,
    OutOfPreSignatures,
    /// (requested, capacity)
    PoolCapacityExceeded(usize, usize),
    InsufficientEntropy,
    SecretUnavailable,
    StateAlreadyConsumed,
    CommitmentKindMismatch,
    InvalidCommitRequest,
    MemberRevokedInSigRl,
    MalformedSignerMessage,
    /// Status code returned by a remote secret signer that does not map to any error
    Transport(u8),
    Rejected(Rejection),
    SchnorrError(SchnorrError),
    Serialization(SerializationError),
}

impl From<SchnorrError> for EpidError {
    fn from(e: SchnorrError) -> Self {
        Self::SchnorrError(e)
    }
}

impl From<SerializationError> for EpidError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}

impl From<Rejection> for EpidError {
    fn from(r: Rejection) -> Self {
        Self::Rejected(r)
    }
}
