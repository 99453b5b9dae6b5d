//! Secrets and hash locks of cross-chain orders.
//!
//! One secret is generated per partial fill. Only hashes leave the engine
//! when the order is submitted; a plaintext secret is sent once the relay
//! reports its fill index ready.

use alloy::primitives::{keccak256, B256};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
	pub secret: B256,
	pub hash: B256,
}

impl Secret {
	pub fn random() -> Self {
		let mut bytes = [0u8; 32];
		OsRng.fill_bytes(&mut bytes);
		Self::from_bytes(B256::from(bytes))
	}

	pub fn from_bytes(secret: B256) -> Self {
		Self {
			secret,
			hash: keccak256(secret),
		}
	}
}

// Secrets never show up in logs.
impl std::fmt::Debug for Secret {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Secret")
			.field("hash", &self.hash)
			.finish_non_exhaustive()
	}
}

pub fn generate_secrets(count: usize) -> Vec<Secret> {
	(0..count.max(1)).map(|_| Secret::random()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashLock {
	/// Hash of the only secret.
	SingleFill(B256),
	/// Merkle root over the secret leaves, with the part count minus one in
	/// the top 16 bits.
	MultipleFills(B256),
}

impl HashLock {
	pub fn for_secrets(secrets: &[Secret]) -> Self {
		if let [single] = secrets {
			return HashLock::SingleFill(single.hash);
		}
		let hashes: Vec<B256> = secrets.iter().map(|s| s.hash).collect();
		let mut root = merkle_root(merkle_leaves(&hashes)).0;
		let parts = (hashes.len().saturating_sub(1) as u16).to_be_bytes();
		root[..2].copy_from_slice(&parts);
		HashLock::MultipleFills(B256::from(root))
	}

	pub fn value(&self) -> B256 {
		match self {
			HashLock::SingleFill(value) | HashLock::MultipleFills(value) => *value,
		}
	}
}

/// `keccak256(abi.encodePacked(uint64 index, bytes32 secretHash))` per secret.
pub fn merkle_leaves(secret_hashes: &[B256]) -> Vec<B256> {
	secret_hashes
		.iter()
		.enumerate()
		.map(|(index, hash)| {
			let mut packed = [0u8; 40];
			packed[..8].copy_from_slice(&(index as u64).to_be_bytes());
			packed[8..].copy_from_slice(hash.as_slice());
			keccak256(packed)
		})
		.collect()
}

fn hash_pair(a: B256, b: B256) -> B256 {
	let (low, high) = if a <= b { (a, b) } else { (b, a) };
	let mut packed = [0u8; 64];
	packed[..32].copy_from_slice(low.as_slice());
	packed[32..].copy_from_slice(high.as_slice());
	keccak256(packed)
}

/// Root of a sorted-leaf binary tree with commutative pair hashing, laid out
/// as a heap with the leaves at the end.
pub fn merkle_root(mut leaves: Vec<B256>) -> B256 {
	match leaves.len() {
		0 => return B256::ZERO,
		1 => return leaves[0],
		_ => {}
	}
	leaves.sort();
	let count = leaves.len();
	let mut tree = vec![B256::ZERO; 2 * count - 1];
	let last = tree.len() - 1;
	for (i, leaf) in leaves.into_iter().enumerate() {
		tree[last - i] = leaf;
	}
	for i in (0..count - 1).rev() {
		tree[i] = hash_pair(tree[2 * i + 1], tree[2 * i + 2]);
	}
	tree[0]
}
