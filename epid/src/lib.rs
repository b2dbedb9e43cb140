#![cfg_attr(not(feature = "std"), no_std)]
#![allow(non_snake_case)]

//! Enhanced Privacy ID (EPID 2.0) anonymous group signatures.
//!
//! A member of a group signs messages such that a verifier learns only that the signer is a
//! non-revoked member of the group. Signatures of one member are unlinkable unless created with the
//! same basename.
//!
//! The member secret `f` is held by a [`SecretSigner`], which may run in the same process or behind
//! a transport on a separate device. The member (host) never sees `f` and only exchanges
//! commitments, challenges and responses with the secret signer.
//!
//! ## Modules
//!
//! 1. Group id, public parameters and group public key - [`common`]
//! 2. Member secret, credential and join request - [`credential`]
//! 3. Secret signer protocol and an in-process implementation - [`secret_signer`]
//! 4. Secret signer over a byte transport - [`remote_signer`]
//! 5. Pre-signatures and their pool - [`pre_signature`]
//! 6. Signatures and non-revoked proofs - [`signature`]
//! 7. Member, the signing side - [`member`]
//! 8. Revocation lists and their checks - [`revocation`]
//! 9. Verifier - [`verifier`]
//!
//! The implementation uses the variable names of the EPID papers and thus violates Rust's naming
//! conventions at places.
//!
//! [`SecretSigner`]: crate::secret_signer::SecretSigner
//! [`common`]: crate::common
//! [`credential`]: crate::credential
//! [`secret_signer`]: crate::secret_signer
//! [`remote_signer`]: crate::remote_signer
//! [`pre_signature`]: crate::pre_signature
//! [`signature`]: crate::signature
//! [`member`]: crate::member
//! [`revocation`]: crate::revocation
//! [`verifier`]: crate::verifier

pub mod common;
pub mod credential;
pub mod error;
pub mod member;
pub mod pre_signature;
pub mod remote_signer;
pub mod revocation;
pub mod secret_signer;
pub mod signature;
pub mod verifier;

pub mod prelude {
    pub use crate::{
        common::{Epid2Params, GroupId, GroupPublicKey, HashAlg},
        credential::{JoinChallenge, JoinRequest, MemberCredential, MemberSecret},
        error::{EpidError, Rejection, RevocationListKind},
        member::{Member, MemberConfig},
        pre_signature::{PreSignature, PreSignaturePool},
        remote_signer::{LoopbackTransport, RemoteSecretSigner, SecretSignerService, SignerTransport},
        revocation::{GroupRl, PrivRl, SigRl, SigRlEntry, VerifierRl},
        secret_signer::{InProcessSecretSigner, SecretSigner},
        signature::{signatures_linked, BasicSignature, NonRevokedProof, Signature},
        verifier::{Verifier, VerifierConfig, VerifierPrecomp},
    };
}

#[cfg(test)]
mod test_support;
