use near_sdk::{env, near, CryptoHash};

/// A 32-byte preimage. Generated off-chain by the order signer, never here.
pub type Secret = [u8; 32];

/// Hashlock of a swap and, once disclosed, the secret that opens it.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub hashlock: CryptoHash,
    pub secret: Option<Secret>,
}

impl Commitment {
    /// Wraps a hashlock received from the order signer.
    pub fn from_hashlock(hashlock: CryptoHash) -> Self {
        Self {
            hashlock,
            secret: None,
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.secret.is_some()
    }
}

/// `hashlock = SHA-256(secret)`.
pub fn commit(secret: &Secret) -> Commitment {
    Commitment::from_hashlock(env::sha256_array(secret))
}

/// Checks a disclosed secret against the stored hashlock.
/// Every byte is compared; the loop never exits early.
pub fn verify(commitment: &Commitment, candidate: &Secret) -> bool {
    let digest = env::sha256_array(candidate);
    digest
        .iter()
        .zip(commitment.hashlock.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
