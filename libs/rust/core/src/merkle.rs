//! Sorted-pair Merkle commitments.
//!
//! Parent = H(min(x, y) || max(x, y)). Because each level is order independent,
//! a proof is just the bottom-up list of siblings; no left/right flags.
//!
//! Leaves by convention:
//! - dataset leaf: H(file bytes)
//! - inference leaf: H(inputHash || outputHash || xaiHash)
//!
//! The off-ledger `MerkleTree` uses the same rule at every internal node. A node
//! left without a partner on an odd-sized level is promoted unchanged, so its
//! proof simply has no entry for that level.

use crate::hashing::{keccak256, keccak256_concat};
use crate::types::Digest;

pub fn file_leaf(bytes: &[u8]) -> Digest {
    keccak256(bytes)
}

pub fn inference_leaf(input_hash: &Digest, output_hash: &Digest, xai_hash: &Digest) -> Digest {
    keccak256_concat(&[input_hash.as_bytes(), output_hash.as_bytes(), xai_hash.as_bytes()])
}

pub fn hash_sorted_pair(a: &Digest, b: &Digest) -> Digest {
    if a <= b {
        keccak256_concat(&[a.as_bytes(), b.as_bytes()])
    } else {
        keccak256_concat(&[b.as_bytes(), a.as_bytes()])
    }
}

/// Fold `leaf` with each sibling in turn.
pub fn process_proof(proof: &[Digest], leaf: Digest) -> Digest {
    proof.iter().fold(leaf, |acc, sibling| hash_sorted_pair(&acc, sibling))
}

pub fn verify(proof: &[Digest], root: &Digest, leaf: &Digest) -> bool {
    process_proof(proof, *leaf) == *root
}

/// In-memory sorted-pair tree for off-ledger commitment and proof generation.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    // levels[0] = leaves, last = [root]
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// `None` for an empty leaf set; there is no meaningful root to commit.
    pub fn from_leaves(leaves: Vec<Digest>) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }
        let mut levels = vec![leaves];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next: Vec<Digest> = current
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => hash_sorted_pair(a, b),
                    [lone] => *lone,
                    _ => unreachable!("chunks(2) yields 1 or 2 items"),
                })
                .collect();
            levels.push(next);
        }
        Some(Self { levels })
    }

    /// Build from raw file contents, hashing each with [`file_leaf`].
    pub fn from_files<I, B>(files: I) -> Option<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::from_leaves(files.into_iter().map(|f| file_leaf(f.as_ref())).collect())
    }

    pub fn root(&self) -> Digest {
        self.levels.last().and_then(|l| l.first()).copied().unwrap_or(Digest::ZERO)
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn leaf(&self, index: usize) -> Option<Digest> {
        self.levels[0].get(index).copied()
    }

    pub fn proof(&self, index: usize) -> Option<Vec<Digest>> {
        if index >= self.len() {
            return None;
        }
        let mut idx = index;
        let mut proof = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = idx ^ 1;
            if sibling < level.len() {
                proof.push(level[sibling]);
            }
            idx /= 2;
        }
        Some(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Digest> {
        (0..n as u64).map(|i| keccak256(&i.to_be_bytes())).collect()
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let l = leaves(1);
        let tree = MerkleTree::from_leaves(l.clone()).unwrap();
        assert_eq!(tree.root(), l[0]);
        assert!(tree.proof(0).unwrap().is_empty());
        assert!(verify(&[], &tree.root(), &l[0]));
    }

    #[test]
    fn pair_rule_is_commutative() {
        let l = leaves(2);
        assert_eq!(hash_sorted_pair(&l[0], &l[1]), hash_sorted_pair(&l[1], &l[0]));
    }

    #[test]
    fn odd_tree_promotes_last_node() {
        let l = leaves(3);
        let tree = MerkleTree::from_leaves(l.clone()).unwrap();
        let expected = hash_sorted_pair(&hash_sorted_pair(&l[0], &l[1]), &l[2]);
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.proof(2).unwrap(), vec![hash_sorted_pair(&l[0], &l[1])]);
        for i in 0..3 {
            assert!(verify(&tree.proof(i).unwrap(), &tree.root(), &l[i]));
        }
    }

    #[test]
    fn empty_tree_is_none_and_out_of_range_proof_is_none() {
        assert!(MerkleTree::from_leaves(vec![]).is_none());
        let tree = MerkleTree::from_leaves(leaves(4)).unwrap();
        assert!(tree.proof(4).is_none());
    }

    #[test]
    fn inference_leaf_binds_all_three_hashes() {
        let (a, b, c) = (Digest([1; 32]), Digest([2; 32]), Digest([3; 32]));
        assert_ne!(inference_leaf(&a, &b, &c), inference_leaf(&b, &a, &c));
    }

    #[test]
    fn file_tree_matches_manual_leaves() {
        let files: Vec<&[u8]> = vec![b"alpha", b"beta"];
        let tree = MerkleTree::from_files(files).unwrap();
        assert_eq!(tree.root(), hash_sorted_pair(&keccak256(b"alpha"), &keccak256(b"beta")));
    }
}
