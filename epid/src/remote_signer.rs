//! Secret signer living in another process or device.
//!
//! [`RemoteSecretSigner`] encodes every [`SecretSigner`] call as a request message and sends it through
//! a [`SignerTransport`]. On the other end [`SecretSignerService`] decodes requests, runs them on the
//! actual signer and encodes the replies. Commitment states stay inside the service and are referred
//! to by id on the wire.
//!
//! Request: an opcode byte followed by the compressed canonical encoding of the arguments.
//! Reply: a status byte, 0 for success, followed by the encoded result on success.

use crate::{
    common::{GroupId, HashAlg},
    credential::{JoinChallenge, JoinRequest},
    error::EpidError,
    secret_signer::{CommitRequest, Commitment, CommitmentKind, CommitmentState, SecretSigner},
};
use ark_ec::pairing::Pairing;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{collections::BTreeMap, marker::PhantomData, vec, vec::Vec};
use schnorr_pok::SchnorrResponse;

const OP_JOIN: u8 = 1;
const OP_COMMIT: u8 = 2;
const OP_RESPOND: u8 = 3;

const STATUS_OK: u8 = 0;
const STATUS_SECRET_UNAVAILABLE: u8 = 1;
const STATUS_STATE_ALREADY_CONSUMED: u8 = 2;
const STATUS_COMMITMENT_KIND_MISMATCH: u8 = 3;
const STATUS_INSUFFICIENT_ENTROPY: u8 = 4;
const STATUS_MEMBER_REVOKED: u8 = 5;
const STATUS_INVALID_COMMIT_REQUEST: u8 = 6;
const STATUS_MALFORMED_MESSAGE: u8 = 7;
const STATUS_UNKNOWN_ERROR: u8 = 0xff;

pub const DEFAULT_MAX_TRACKED_STATES: usize = 1024;

/// Carries one request to the secret signer and returns its reply
pub trait SignerTransport {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, EpidError>;
}

fn status_code(error: &EpidError) -> u8 {
    match error {
        EpidError::SecretUnavailable => STATUS_SECRET_UNAVAILABLE,
        EpidError::StateAlreadyConsumed => STATUS_STATE_ALREADY_CONSUMED,
        EpidError::CommitmentKindMismatch => STATUS_COMMITMENT_KIND_MISMATCH,
        EpidError::InsufficientEntropy => STATUS_INSUFFICIENT_ENTROPY,
        EpidError::MemberRevokedInSigRl => STATUS_MEMBER_REVOKED,
        EpidError::InvalidCommitRequest => STATUS_INVALID_COMMIT_REQUEST,
        EpidError::MalformedSignerMessage
        | EpidError::UnsupportedHashAlg(_)
        | EpidError::Serialization(_) => STATUS_MALFORMED_MESSAGE,
        _ => STATUS_UNKNOWN_ERROR,
    }
}

fn status_error(status: u8) -> EpidError {
    match status {
        STATUS_SECRET_UNAVAILABLE => EpidError::SecretUnavailable,
        STATUS_STATE_ALREADY_CONSUMED => EpidError::StateAlreadyConsumed,
        STATUS_COMMITMENT_KIND_MISMATCH => EpidError::CommitmentKindMismatch,
        STATUS_INSUFFICIENT_ENTROPY => EpidError::InsufficientEntropy,
        STATUS_MEMBER_REVOKED => EpidError::MemberRevokedInSigRl,
        STATUS_INVALID_COMMIT_REQUEST => EpidError::InvalidCommitRequest,
        STATUS_MALFORMED_MESSAGE => EpidError::MalformedSignerMessage,
        s => EpidError::Transport(s),
    }
}

fn read<T: CanonicalDeserialize>(reader: &mut &[u8]) -> Result<T, EpidError> {
    T::deserialize_compressed(reader).map_err(|_| EpidError::MalformedSignerMessage)
}

fn finish(reader: &[u8]) -> Result<(), EpidError> {
    if !reader.is_empty() {
        return Err(EpidError::MalformedSignerMessage);
    }
    Ok(())
}

pub struct RemoteSecretSigner<E: Pairing, T: SignerTransport> {
    transport: T,
    max_pending: usize,
    _phantom: PhantomData<E>,
}

impl<E: Pairing, T: SignerTransport> RemoteSecretSigner<E, T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_pending: DEFAULT_MAX_TRACKED_STATES,
            _phantom: PhantomData,
        }
    }

    /// The number of commitment states the other end keeps, it is not queried over the transport
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send the request and return the payload of a successful reply
    fn call(&mut self, request: &[u8]) -> Result<Vec<u8>, EpidError> {
        let mut reply = self.transport.exchange(request)?;
        match reply.first() {
            Some(&STATUS_OK) => Ok(reply.split_off(1)),
            Some(&status) => Err(status_error(status)),
            None => Err(EpidError::MalformedSignerMessage),
        }
    }
}

impl<E: Pairing, T: SignerTransport> SecretSigner<E> for RemoteSecretSigner<E, T> {
    fn join(&mut self, challenge: &JoinChallenge) -> Result<JoinRequest<E>, EpidError> {
        let mut request = vec![OP_JOIN];
        challenge.gid.serialize_compressed(&mut request)?;
        (challenge.hash_alg as u8).serialize_compressed(&mut request)?;
        challenge.issuer_nonce.serialize_compressed(&mut request)?;
        let reply = self.call(&request)?;
        let mut reader = reply.as_slice();
        let join_request = read(&mut reader)?;
        finish(reader)?;
        Ok(join_request)
    }

    fn commit(
        &mut self,
        commit_request: CommitRequest<E>,
    ) -> Result<(Commitment<E>, CommitmentState), EpidError> {
        let expected_kind = commit_request.kind();
        let mut request = vec![OP_COMMIT, expected_kind as u8];
        match &commit_request {
            CommitRequest::Sign { base } => base.serialize_compressed(&mut request)?,
            CommitRequest::NonRevoked { B, K, entry } => {
                B.serialize_compressed(&mut request)?;
                K.serialize_compressed(&mut request)?;
                entry.serialize_compressed(&mut request)?;
            }
        }
        let reply = self.call(&request)?;
        let mut reader = reply.as_slice();
        let id: u64 = read(&mut reader)?;
        let kind = CommitmentKind::try_from(read::<u8>(&mut reader)?)?;
        if kind != expected_kind {
            return Err(EpidError::MalformedSignerMessage);
        }
        let commitment = match kind {
            CommitmentKind::Sign => Commitment::Sign(read(&mut reader)?),
            CommitmentKind::NonRevoked => Commitment::NonRevoked(read(&mut reader)?),
        };
        finish(reader)?;
        Ok((commitment, CommitmentState::new(id, kind)))
    }

    fn respond(
        &mut self,
        state: CommitmentState,
        challenge: &E::ScalarField,
    ) -> Result<SchnorrResponse<E::G1Affine>, EpidError> {
        let mut request = vec![OP_RESPOND];
        state.id().serialize_compressed(&mut request)?;
        (state.kind() as u8).serialize_compressed(&mut request)?;
        challenge.serialize_compressed(&mut request)?;
        let reply = self.call(&request)?;
        let mut reader = reply.as_slice();
        let response = read(&mut reader)?;
        finish(reader)?;
        Ok(response)
    }

    fn max_pending_commitments(&self) -> Option<usize> {
        Some(self.max_pending)
    }
}

/// Serves requests from a [`RemoteSecretSigner`] using a local signer
pub struct SecretSignerService<E: Pairing, S: SecretSigner<E>> {
    signer: S,
    states: BTreeMap<u64, CommitmentState>,
    max_states: usize,
    _phantom: PhantomData<E>,
}

impl<E: Pairing, S: SecretSigner<E>> SecretSignerService<E, S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            states: BTreeMap::new(),
            max_states: DEFAULT_MAX_TRACKED_STATES,
            _phantom: PhantomData,
        }
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn signer_mut(&mut self) -> &mut S {
        &mut self.signer
    }

    pub fn into_inner(self) -> S {
        self.signer
    }

    /// Process one request. Errors are reported in the reply.
    pub fn handle(&mut self, request: &[u8]) -> Vec<u8> {
        match self.dispatch(request) {
            Ok(mut payload) => {
                let mut reply = Vec::with_capacity(payload.len() + 1);
                reply.push(STATUS_OK);
                reply.append(&mut payload);
                reply
            }
            Err(e) => vec![status_code(&e)],
        }
    }

    fn dispatch(&mut self, request: &[u8]) -> Result<Vec<u8>, EpidError> {
        let (op, mut reader) = request
            .split_first()
            .ok_or(EpidError::MalformedSignerMessage)?;
        let mut reply = vec![];
        match *op {
            OP_JOIN => {
                let gid: GroupId = read(&mut reader)?;
                let hash_alg = HashAlg::try_from(read::<u8>(&mut reader)?)?;
                let issuer_nonce: Vec<u8> = read(&mut reader)?;
                finish(reader)?;
                let join_request = self.signer.join(&JoinChallenge {
                    gid,
                    hash_alg,
                    issuer_nonce,
                })?;
                join_request.serialize_compressed(&mut reply)?;
            }
            OP_COMMIT => {
                let commit_request = match CommitmentKind::try_from(read::<u8>(&mut reader)?)? {
                    CommitmentKind::Sign => CommitRequest::Sign {
                        base: read(&mut reader)?,
                    },
                    CommitmentKind::NonRevoked => CommitRequest::NonRevoked {
                        B: read(&mut reader)?,
                        K: read(&mut reader)?,
                        entry: read(&mut reader)?,
                    },
                };
                finish(reader)?;
                let (commitment, state) = self.signer.commit(commit_request)?;
                state.id().serialize_compressed(&mut reply)?;
                (state.kind() as u8).serialize_compressed(&mut reply)?;
                match &commitment {
                    Commitment::Sign(c) => c.serialize_compressed(&mut reply)?,
                    Commitment::NonRevoked(c) => c.serialize_compressed(&mut reply)?,
                }
                self.track(state);
            }
            OP_RESPOND => {
                let id: u64 = read(&mut reader)?;
                let kind = CommitmentKind::try_from(read::<u8>(&mut reader)?)?;
                let challenge: E::ScalarField = read(&mut reader)?;
                finish(reader)?;
                let state = self
                    .states
                    .remove(&id)
                    .ok_or(EpidError::StateAlreadyConsumed)?;
                if state.kind() != kind {
                    return Err(EpidError::CommitmentKindMismatch);
                }
                self.signer
                    .respond(state, &challenge)?
                    .serialize_compressed(&mut reply)?;
            }
            _ => return Err(EpidError::MalformedSignerMessage),
        }
        Ok(reply)
    }

    fn track(&mut self, state: CommitmentState) {
        while self.states.len() >= self.max_states {
            self.states.pop_first();
        }
        self.states.insert(state.id(), state);
    }
}

/// Transport delivering requests to a service in the same process
pub struct LoopbackTransport<E: Pairing, S: SecretSigner<E>> {
    pub service: SecretSignerService<E, S>,
}

impl<E: Pairing, S: SecretSigner<E>> LoopbackTransport<E, S> {
    pub fn new(signer: S) -> Self {
        Self {
            service: SecretSignerService::new(signer),
        }
    }
}

impl<E: Pairing, S: SecretSigner<E>> SignerTransport for LoopbackTransport<E, S> {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, EpidError> {
        Ok(self.service.handle(request))
    }
}
